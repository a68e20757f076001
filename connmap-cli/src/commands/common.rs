//! Common utilities shared across CLI commands.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use connmap::config::{ConfigFile, GeoIpSettings};

use crate::error::CliError;

/// Load the configuration file.
///
/// An explicit path must exist; the default path falls back to defaults
/// when missing.
pub fn load_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    match path {
        Some(path) if !path.exists() => Err(CliError::Config(format!(
            "Config file not found: {}",
            path.display()
        ))),
        Some(path) => Ok(ConfigFile::load_from(path)?),
        None => Ok(ConfigFile::load()?),
    }
}

/// Geolocation source flags shared by `run` and `replay`.
#[derive(Debug, Clone, Default)]
pub struct GeoOverrides {
    pub geoip: Option<PathBuf>,
    pub geo_table: Option<PathBuf>,
}

impl GeoOverrides {
    /// Apply over the configured `[geoip]` section.
    ///
    /// A flag replaces the whole section so the chosen source is the one used.
    pub fn apply(&self, settings: &mut GeoIpSettings) {
        if let Some(database) = &self.geoip {
            *settings = GeoIpSettings {
                database: Some(database.clone()),
                table: None,
            };
        } else if let Some(table) = &self.geo_table {
            *settings = GeoIpSettings {
                database: None,
                table: Some(table.clone()),
            };
        }
    }
}

/// Receiver flags for `run`.
#[derive(Debug, Clone, Default)]
pub struct ReceiverOverrides {
    pub unicast_port: Option<u16>,
    pub multicast: Option<SocketAddr>,
    pub no_multicast: bool,
}

impl ReceiverOverrides {
    /// Apply over the configured `[unicast]` and `[multicast]` sections.
    pub fn apply(&self, config: &mut ConfigFile) -> Result<(), CliError> {
        if let Some(port) = self.unicast_port {
            config.unicast.enabled = true;
            config.unicast.port = port;
        }

        if let Some(target) = self.multicast {
            if !target.ip().is_multicast() {
                return Err(CliError::Config(format!(
                    "--multicast {} is not a multicast group",
                    target
                )));
            }
            config.multicast.enabled = true;
            config.multicast.group = target.ip();
            config.multicast.port = target.port();
        }

        if self.no_multicast {
            config.multicast.enabled = false;
        }
        Ok(())
    }
}
