//! Per-line event processing: classify, geolocate, bucketize, count.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::event::{Classifier, ParsedEvent};
use crate::geo::{GeoError, Geolocator};
use crate::grid::{bucketize, GeoCoordinate, GridCell, GridDimensions};
use crate::store::AggregationStore;
use crate::telemetry::PipelineMetrics;

/// What happened to one line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    /// Not an open/close line; dropped without further work.
    Ignored,
    /// Open counted in `cell`, which now holds `count`.
    Opened { cell: GridCell, count: u64 },
    /// Close counted against `cell`, which now holds `remaining`.
    Closed { cell: GridCell, remaining: u64 },
    /// Close for a cell with no open connections; store unchanged.
    CloseUnmatched { cell: GridCell },
    /// Address could not be placed on the map; store unchanged.
    Dropped(GeoError),
}

/// Drives one line through Classifier → Geolocator → Bucketizer → Store.
///
/// Every failure is contained here: geolocation misses and errors are logged
/// and counted, never propagated.
pub struct EventProcessor {
    classifier: Classifier,
    geolocator: Arc<dyn Geolocator>,
    dims: GridDimensions,
    store: Arc<AggregationStore>,
    metrics: Arc<PipelineMetrics>,
}

impl EventProcessor {
    /// Create a processor writing into `store`.
    pub fn new(
        classifier: Classifier,
        geolocator: Arc<dyn Geolocator>,
        dims: GridDimensions,
        store: Arc<AggregationStore>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Self {
            classifier,
            geolocator,
            dims,
            store,
            metrics,
        }
    }

    /// The store this processor mutates.
    pub fn store(&self) -> &Arc<AggregationStore> {
        &self.store
    }

    /// Process a single raw line.
    pub fn process_line(&self, line: &str) -> LineOutcome {
        let outcome = match self.classifier.classify(line) {
            ParsedEvent::Unrecognized => {
                trace!(line, "Ignoring unrecognized line");
                self.metrics.line_ignored();
                LineOutcome::Ignored
            }
            ParsedEvent::Open(address) => match self.locate(&address) {
                Ok(cell) => {
                    let count = self.store.increment(cell);
                    self.metrics.open_applied();
                    trace!(%address, %cell, count, "Connection opened");
                    LineOutcome::Opened { cell, count }
                }
                Err(e) => LineOutcome::Dropped(e),
            },
            ParsedEvent::Close(address) => match self.locate(&address) {
                Ok(cell) => match self.store.decrement(cell) {
                    Some(remaining) => {
                        self.metrics.close_applied();
                        trace!(%address, %cell, remaining, "Connection closed");
                        LineOutcome::Closed { cell, remaining }
                    }
                    None => {
                        self.metrics.close_unmatched();
                        trace!(%address, %cell, "Close without matching open");
                        LineOutcome::CloseUnmatched { cell }
                    }
                },
                Err(e) => LineOutcome::Dropped(e),
            },
        };

        self.metrics.line_processed();
        outcome
    }

    /// Resolve an address and bucketize it, logging and counting failures.
    fn locate(&self, address: &str) -> Result<GridCell, GeoError> {
        let coord = self.geolocator.resolve(address).map_err(|e| {
            if e.is_miss() {
                debug!(%address, error = %e, "No location for address, dropping event");
                self.metrics.geo_not_found();
            } else {
                warn!(
                    %address,
                    geolocator = self.geolocator.name(),
                    error = %e,
                    "Geolocation failed, dropping event"
                );
                self.metrics.geo_error();
            }
            e
        })?;

        // Fields are public, so the range is not guaranteed
        let coord = GeoCoordinate::new(coord.latitude, coord.longitude).map_err(|e| {
            warn!(%address, error = %e, "Geolocator returned an invalid coordinate");
            self.metrics.invalid_coordinate();
            GeoError::Lookup {
                address: address.to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(bucketize(coord, self.dims))
    }
}
