//! MaxMind City database geolocator.
//!
//! GeoLite2 database: https://dev.maxmind.com/geoip/geoip2/geolite2/

use std::path::{Path, PathBuf};

use maxminddb::{geoip2, MaxMindDBError, Reader};
use tracing::info;

use super::{parse_address, GeoError, Geolocator};
use crate::grid::GeoCoordinate;

/// Geolocator reading a MaxMind GeoLite2/GeoIP2 City database.
///
/// The database is loaded into memory once; lookups are lock-free reads.
pub struct MaxMindGeolocator {
    reader: Reader<Vec<u8>>,
    path: PathBuf,
}

impl MaxMindGeolocator {
    /// Open a `.mmdb` City database.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError::Database`] if the file is missing or malformed.
    pub fn open(path: &Path) -> Result<Self, GeoError> {
        let reader = Reader::open_readfile(path)
            .map_err(|e| GeoError::Database(format!("{}: {}", path.display(), e)))?;

        info!(
            path = %path.display(),
            database_type = %reader.metadata.database_type,
            build_epoch = reader.metadata.build_epoch,
            "Opened geolocation database"
        );

        Ok(Self {
            reader,
            path: path.to_path_buf(),
        })
    }

    /// Path the database was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for MaxMindGeolocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaxMindGeolocator")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Geolocator for MaxMindGeolocator {
    fn resolve(&self, address: &str) -> Result<GeoCoordinate, GeoError> {
        let ip = parse_address(address)?;

        let city: geoip2::City = match self.reader.lookup(ip) {
            Ok(city) => city,
            Err(MaxMindDBError::AddressNotFoundError(_)) => {
                return Err(GeoError::NotFound(address.to_string()))
            }
            Err(e) => {
                return Err(GeoError::Lookup {
                    address: address.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        let location = city
            .location
            .ok_or_else(|| GeoError::NotFound(address.to_string()))?;

        match (location.latitude, location.longitude) {
            (Some(latitude), Some(longitude)) => {
                GeoCoordinate::new(latitude, longitude).map_err(|e| GeoError::Lookup {
                    address: address.to_string(),
                    reason: e.to_string(),
                })
            }
            _ => Err(GeoError::NotFound(address.to_string())),
        }
    }

    fn name(&self) -> &str {
        "maxmind"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_database() {
        let result = MaxMindGeolocator::open(Path::new("/nonexistent/GeoLite2-City.mmdb"));
        assert!(matches!(result, Err(GeoError::Database(_))));
    }

    #[test]
    fn test_open_garbage_database() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"not a maxmind database").unwrap();
        let result = MaxMindGeolocator::open(file.path());
        assert!(matches!(result, Err(GeoError::Database(_))));
    }
}
