//! Application error types.

use thiserror::Error;

use super::ReceiverKind;
use crate::geo::GeoError;
use crate::grid::CoordError;
use crate::receiver::ReceiverError;

/// Errors that can occur during application lifecycle.
#[derive(Debug, Error)]
pub enum AppError {
    /// Grid dimensions were rejected.
    #[error("Invalid grid: {0}")]
    Grid(#[from] CoordError),

    /// Neither a database nor a table was configured.
    #[error("No geolocation source configured (set [geoip] database or table)")]
    NoGeolocator,

    /// The geolocation source could not be opened.
    #[error("Failed to open geolocation source: {0}")]
    Geolocator(#[from] GeoError),

    /// The processing loop thread could not be spawned.
    #[error("Failed to start processing loop: {0}")]
    ProcessorStart(#[source] std::io::Error),

    /// A receiver could not be started.
    #[error("Failed to start {kind} receiver: {source}")]
    ReceiverStart {
        kind: ReceiverKind,
        #[source]
        source: ReceiverError,
    },

    /// A receiver of this kind is already running.
    #[error("The {0} receiver is already running")]
    ReceiverRunning(ReceiverKind),
}
