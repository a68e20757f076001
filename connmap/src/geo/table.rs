//! Static address table geolocator.
//!
//! Table file format, one entry per line:
//!
//! ```text
//! # address, latitude, longitude
//! 93.184.216.34, 37.5, -122.3
//! 2001:db8::1,   51.5, -0.13
//! ```

use std::collections::HashMap;
use std::net::IpAddr;
use std::path::Path;

use super::{parse_address, GeoError, Geolocator};
use crate::grid::GeoCoordinate;

/// Geolocator backed by a fixed in-memory table.
#[derive(Debug, Clone, Default)]
pub struct StaticGeolocator {
    entries: HashMap<IpAddr, GeoCoordinate>,
}

impl StaticGeolocator {
    /// Create an empty table; every lookup is a miss.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, replacing any previous one for the same address.
    pub fn insert(&mut self, address: IpAddr, coord: GeoCoordinate) {
        self.entries.insert(address, coord);
    }

    /// Builder-style [`insert`](Self::insert) from an address literal.
    ///
    /// # Errors
    ///
    /// Fails on an invalid address or coordinate.
    pub fn with_entry(mut self, address: &str, latitude: f64, longitude: f64) -> Result<Self, GeoError> {
        let ip = parse_address(address)?;
        let coord = GeoCoordinate::new(latitude, longitude)
            .map_err(|e| GeoError::Database(e.to_string()))?;
        self.insert(ip, coord);
        Ok(self)
    }

    /// Parse table text.
    pub fn parse(contents: &str) -> Result<Self, GeoError> {
        let mut table = Self::new();

        for (index, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let [address, lat, lon] = fields.as_slice() else {
                return Err(GeoError::Database(format!(
                    "line {}: expected 'address, latitude, longitude'",
                    index + 1
                )));
            };

            let latitude = lat.parse::<f64>().map_err(|_| {
                GeoError::Database(format!("line {}: invalid latitude '{}'", index + 1, lat))
            })?;
            let longitude = lon.parse::<f64>().map_err(|_| {
                GeoError::Database(format!("line {}: invalid longitude '{}'", index + 1, lon))
            })?;

            table = table
                .with_entry(address, latitude, longitude)
                .map_err(|e| GeoError::Database(format!("line {}: {}", index + 1, e)))?;
        }

        Ok(table)
    }

    /// Load a table file.
    pub fn from_file(path: &Path) -> Result<Self, GeoError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| GeoError::Database(format!("{}: {}", path.display(), e)))?;
        Self::parse(&contents)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Geolocator for StaticGeolocator {
    fn resolve(&self, address: &str) -> Result<GeoCoordinate, GeoError> {
        let ip = parse_address(address)?;
        self.entries
            .get(&ip)
            .copied()
            .ok_or_else(|| GeoError::NotFound(address.to_string()))
    }

    fn name(&self) -> &str {
        "static-table"
    }
}
