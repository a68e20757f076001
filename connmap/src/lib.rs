//! ConnMap - live map of outbound firewall connections
//!
//! This library receives firewall syslog over UDP, picks out connection
//! open/close messages, geolocates the remote address and keeps a live
//! count of open connections per cell of a latitude/longitude grid.
//!
//! ```text
//! UDP unicast ──┐                       ┌─ classify ─ geolocate ─ bucketize ─┐
//!               ├─► EventQueue ─► loop ─┤                                    ├─► AggregationStore
//! UDP multicast ┘                       └────────────────────────────────────┘        │
//!                                                                          snapshot ──► render / JSON
//! ```
//!
//! [`app::ConnMapApp`] wires the pieces together; each module can also be
//! used on its own.

pub mod app;
pub mod config;
pub mod event;
pub mod geo;
pub mod grid;
pub mod logging;
pub mod pipeline;
pub mod queue;
pub mod receiver;
pub mod render;
pub mod store;
pub mod telemetry;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
