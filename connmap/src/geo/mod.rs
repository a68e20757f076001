//! Geolocation of remote addresses.
//!
//! The pipeline only depends on the [`Geolocator`] trait: given an address
//! string, return a coordinate or fail. Two adapters are provided:
//!
//! - [`MaxMindGeolocator`] - MaxMind GeoLite2/GeoIP2 City database
//! - [`StaticGeolocator`] - fixed address table, for replays and tests
//!
//! Callers treat every error the same way (the event is dropped), but the
//! variants let them log a plain miss differently from a broken lookup.

mod maxmind;
mod table;

pub use maxmind::MaxMindGeolocator;
pub use table::StaticGeolocator;

use std::net::IpAddr;

use thiserror::Error;

use crate::grid::GeoCoordinate;

/// Errors from geolocation lookups.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    /// The address is valid but has no known location (private ranges,
    /// unallocated space, records without coordinates).
    #[error("No location for {0}")]
    NotFound(String),

    /// The string is not an IP address literal.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// The lookup itself failed.
    #[error("Lookup failed for {address}: {reason}")]
    Lookup { address: String, reason: String },

    /// A location database could not be opened or parsed.
    #[error("Geolocation database error: {0}")]
    Database(String),
}

impl GeoError {
    /// Whether this is a plain miss (no location, or not an address)
    /// rather than a failing lookup.
    pub fn is_miss(&self) -> bool {
        matches!(self, GeoError::NotFound(_) | GeoError::InvalidAddress(_))
    }
}

/// Resolves an address to a geographic coordinate.
///
/// Implementations must be `Send + Sync`; the processing loop owns an
/// `Arc<dyn Geolocator>` on its own thread.
pub trait Geolocator: Send + Sync {
    /// Resolve `address` (an IPv4 or IPv6 literal) to a coordinate.
    fn resolve(&self, address: &str) -> Result<GeoCoordinate, GeoError>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Parse an address literal, mapping failures to [`GeoError::InvalidAddress`].
pub(crate) fn parse_address(address: &str) -> Result<IpAddr, GeoError> {
    address
        .trim()
        .parse::<IpAddr>()
        .map_err(|_| GeoError::InvalidAddress(address.to_string()))
}
