//! Point-in-time telemetry snapshot.

use std::fmt;
use std::time::Duration;

/// Copy of [`super::PipelineMetrics`] at one instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub uptime: Duration,
    pub datagrams_received: u64,
    pub datagrams_dropped: u64,
    pub lines_processed: u64,
    pub lines_ignored: u64,
    pub opens_applied: u64,
    pub closes_applied: u64,
    pub closes_unmatched: u64,
    pub geo_not_found: u64,
    pub geo_errors: u64,
    pub invalid_coordinates: u64,
    pub receivers_failed: u64,
    pub processor_running: bool,
}

impl TelemetrySnapshot {
    /// Open and close events whose address could not be placed on the map.
    pub fn events_dropped(&self) -> u64 {
        self.geo_not_found + self.geo_errors + self.invalid_coordinates
    }

    /// Uptime formatted as `1h 02m 03s`.
    pub fn uptime_human(&self) -> String {
        let secs = self.uptime.as_secs();
        let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
        if hours > 0 {
            format!("{}h {:02}m {:02}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {:02}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }
}

impl fmt::Display for TelemetrySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] datagrams: {} | opens: {} | closes: {} ({} unmatched) | ignored: {} | dropped: {}",
            self.uptime_human(),
            self.datagrams_received,
            self.opens_applied,
            self.closes_applied,
            self.closes_unmatched,
            self.lines_ignored,
            self.events_dropped()
        )
    }
}
