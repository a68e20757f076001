//! World grid and geo bucketizing
//!
//! Converts geographic coordinates into cells of a fixed equirectangular grid.
//! The reference grid is 720x360, two cells per degree on both axes.
//!
//! Coordinates are rounded to the nearest whole degree *before* scaling. The
//! land pixel data the grid is drawn over was generated at one-degree
//! granularity, and truncating first shifts every point by up to one cell.

mod types;

pub use types::{
    CoordError, GeoCoordinate, GridCell, GridDimensions, DEFAULT_HEIGHT, DEFAULT_WIDTH, MAX_LAT,
    MAX_LON, MIN_LAT, MIN_LON,
};

/// Converts a geographic coordinate to a grid cell.
///
/// ```text
/// row    = round(latitude + 90)  * H / 180
/// column = round(longitude + 180) * W / 360
/// ```
///
/// Integer division truncates after the rounding step. The two inclusive upper
/// boundaries (latitude +90, longitude +180) would land one past the last cell,
/// so they are clamped onto the last row/column. No wraparound is applied;
/// renderers wrap when panning.
///
/// # Arguments
///
/// * `coord` - A validated coordinate (see [`GeoCoordinate::new`])
/// * `dims` - Grid size in cells
///
/// # Returns
///
/// A cell with `column < width` and `row < height`.
#[inline]
pub fn bucketize(coord: GeoCoordinate, dims: GridDimensions) -> GridCell {
    let lat_degrees = (coord.latitude - MIN_LAT).round() as u64;
    let lon_degrees = (coord.longitude - MIN_LON).round() as u64;

    let row = lat_degrees * dims.height() as u64 / 180;
    let column = lon_degrees * dims.width() as u64 / 360;

    GridCell {
        column: column.min(dims.width() as u64 - 1) as u32,
        row: row.min(dims.height() as u64 - 1) as u32,
    }
}

/// Validates a raw latitude/longitude pair and bucketizes it.
///
/// # Errors
///
/// Returns [`CoordError`] when either axis is out of range or not finite.
#[inline]
pub fn bucketize_lat_lon(
    latitude: f64,
    longitude: f64,
    dims: GridDimensions,
) -> Result<GridCell, CoordError> {
    let coord = GeoCoordinate::new(latitude, longitude)?;
    Ok(bucketize(coord, dims))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell_for(lat: f64, lon: f64) -> GridCell {
        bucketize_lat_lon(lat, lon, GridDimensions::default()).unwrap()
    }

    #[test]
    fn test_san_francisco_bay() {
        // 37.5 + 90 = 127.5 rounds to 128 -> 256; -122.3 + 180 = 57.7 -> 58 -> 116
        assert_eq!(cell_for(37.5, -122.3), GridCell::new(116, 256));
    }

    #[test]
    fn test_origin_maps_to_grid_center() {
        assert_eq!(cell_for(0.0, 0.0), GridCell::new(360, 180));
    }

    #[test]
    fn test_rounds_before_scaling() {
        // -89.6 rounds to -90 -> row 0; truncating first would give -89 -> row 2
        assert_eq!(cell_for(-89.6, 0.0).row, 0);
        assert_eq!(cell_for(-89.4, 0.0).row, 2);
        assert_eq!(cell_for(0.4, 0.0).row, 180);
        assert_eq!(cell_for(0.6, 0.0).row, 182);
    }

    #[test]
    fn test_south_west_corner() {
        assert_eq!(cell_for(-90.0, -180.0), GridCell::new(0, 0));
    }

    #[test]
    fn test_north_east_corner_is_clamped() {
        let dims = GridDimensions::default();
        let cell = cell_for(90.0, 180.0);
        assert_eq!(cell, GridCell::new(dims.width() - 1, dims.height() - 1));
        assert!(dims.contains(cell));
    }

    #[test]
    fn test_custom_dimensions() {
        let dims = GridDimensions::new(360, 180).unwrap();
        let cell = bucketize_lat_lon(37.5, -122.3, dims).unwrap();
        assert_eq!(cell, GridCell::new(58, 128));
    }

    #[test]
    fn test_invalid_latitude() {
        let result = bucketize_lat_lon(91.0, 0.0, GridDimensions::default());
        assert!(matches!(result, Err(CoordError::InvalidLatitude(_))));
    }

    #[test]
    fn test_invalid_longitude() {
        let result = bucketize_lat_lon(0.0, -180.5, GridDimensions::default());
        assert!(matches!(result, Err(CoordError::InvalidLongitude(_))));
    }

    #[test]
    fn test_nan_is_rejected() {
        assert!(bucketize_lat_lon(f64::NAN, 0.0, GridDimensions::default()).is_err());
        assert!(bucketize_lat_lon(0.0, f64::INFINITY, GridDimensions::default()).is_err());
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(matches!(
            GridDimensions::new(0, 360),
            Err(CoordError::InvalidDimensions { .. })
        ));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_cells_in_bounds(
                lat in -90.0..=90.0_f64,
                lon in -180.0..=180.0_f64,
                width in 1u32..4000,
                height in 1u32..2000
            ) {
                let dims = GridDimensions::new(width, height).unwrap();
                let cell = bucketize_lat_lon(lat, lon, dims)?;
                prop_assert!(
                    dims.contains(cell),
                    "Cell {} outside grid {} for ({}, {})",
                    cell, dims, lat, lon
                );
            }

            #[test]
            fn test_bucketize_is_deterministic(
                lat in -90.0..=90.0_f64,
                lon in -180.0..=180.0_f64
            ) {
                let dims = GridDimensions::default();
                prop_assert_eq!(
                    bucketize_lat_lon(lat, lon, dims)?,
                    bucketize_lat_lon(lat, lon, dims)?
                );
            }
        }
    }
}
