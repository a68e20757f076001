//! Types for the world grid.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Minimum valid latitude in degrees.
pub const MIN_LAT: f64 = -90.0;

/// Maximum valid latitude in degrees.
pub const MAX_LAT: f64 = 90.0;

/// Minimum valid longitude in degrees.
pub const MIN_LON: f64 = -180.0;

/// Maximum valid longitude in degrees.
pub const MAX_LON: f64 = 180.0;

/// Default grid width: 360 degrees at 2 cells per degree.
pub const DEFAULT_WIDTH: u32 = 360 * 2;

/// Default grid height: 180 degrees at 2 cells per degree.
pub const DEFAULT_HEIGHT: u32 = 180 * 2;

/// Errors produced while building coordinates or bucketizing them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordError {
    /// Latitude outside [-90, 90] or not finite.
    #[error("Invalid latitude: {0}")]
    InvalidLatitude(f64),

    /// Longitude outside [-180, 180] or not finite.
    #[error("Invalid longitude: {0}")]
    InvalidLongitude(f64),

    /// Grid with a zero-sized axis.
    #[error("Invalid grid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

/// A geographic position in degrees, as produced by a geolocator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoCoordinate {
    /// Latitude in degrees, positive north.
    pub latitude: f64,
    /// Longitude in degrees, positive east.
    pub longitude: f64,
}

impl GeoCoordinate {
    /// Create a coordinate, validating both axes.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, CoordError> {
        if !latitude.is_finite() || !(MIN_LAT..=MAX_LAT).contains(&latitude) {
            return Err(CoordError::InvalidLatitude(latitude));
        }
        if !longitude.is_finite() || !(MIN_LON..=MAX_LON).contains(&longitude) {
            return Err(CoordError::InvalidLongitude(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

impl fmt::Display for GeoCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.latitude, self.longitude)
    }
}

/// One discretized unit of the world grid.
///
/// Column 0 is the antimeridian at 180°W and grows eastward. Row 0 is the
/// south pole and grows northward; renderers flip it to put north up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct GridCell {
    /// Horizontal index, derived from longitude.
    pub column: u32,
    /// Vertical index, derived from latitude.
    pub row: u32,
}

impl GridCell {
    /// Create a new grid cell.
    pub fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.column, self.row)
    }
}

/// Size of the world grid in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDimensions {
    width: u32,
    height: u32,
}

impl GridDimensions {
    /// Create grid dimensions; both axes must be non-zero.
    pub fn new(width: u32, height: u32) -> Result<Self, CoordError> {
        if width == 0 || height == 0 {
            return Err(CoordError::InvalidDimensions { width, height });
        }
        Ok(Self { width, height })
    }

    /// Number of columns.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether a cell lies inside this grid.
    pub fn contains(&self, cell: GridCell) -> bool {
        cell.column < self.width && cell.row < self.height
    }
}

impl Default for GridDimensions {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl fmt::Display for GridDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
