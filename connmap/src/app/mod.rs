//! Application bootstrap and lifecycle management.
//!
//! `ConnMapApp` owns everything a live map needs and starts it in order:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         ConnMapApp                          │
//! │                                                             │
//! │  1. AggregationStore + PipelineMetrics (shared, Arc)        │
//! │  2. EventQueue ──► ProcessingLoop thread                    │
//! │  3. Receivers (each optional, independently started/stopped)│
//! │       unicast   ──► recv thread ──┐                         │
//! │       multicast ──► recv thread ──┴──► EventQueue           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Shutdown runs the other way: receivers first, then the loop.

mod bootstrap;
mod config;
mod error;

pub use bootstrap::{open_geolocator, ConnMapApp};
pub use config::{AppConfig, MulticastTarget};
pub use error::AppError;

use std::fmt;

/// The two receiver slots an application can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceiverKind {
    Unicast,
    Multicast,
}

impl fmt::Display for ReceiverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiverKind::Unicast => write!(f, "unicast"),
            ReceiverKind::Multicast => write!(f, "multicast"),
        }
    }
}
