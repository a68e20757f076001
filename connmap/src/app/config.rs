//! Application configuration for `ConnMapApp`.
//!
//! `AppConfig` is the resolved, validated form of the settings the
//! application needs at startup. It is usually built from a [`ConfigFile`]
//! and then adjusted by command-line overrides.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use super::error::AppError;
use crate::config::{ConfigFile, MulticastSettings};
use crate::event::EventShapes;
use crate::grid::GridDimensions;

/// Multicast receiver parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MulticastTarget {
    pub group: IpAddr,
    pub port: u16,
    /// IPv4 interface address; ignored for IPv6 groups.
    pub interface: Ipv4Addr,
    /// IPv6 interface index; ignored for IPv4 groups.
    pub interface_index: u32,
}

/// Top-level configuration passed to `ConnMapApp::start()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Unicast bind address; `None` leaves the unicast receiver off.
    pub unicast: Option<SocketAddr>,

    /// Multicast group to join; `None` leaves the multicast receiver off.
    pub multicast: Option<MulticastTarget>,

    /// Which syslog messages count as opens and closes.
    pub shapes: EventShapes,

    /// Grid resolution.
    pub dims: GridDimensions,
}

impl Default for AppConfig {
    fn default() -> Self {
        let multicast = MulticastSettings::default();
        Self {
            unicast: None,
            multicast: Some(MulticastTarget {
                group: multicast.group,
                port: multicast.port,
                interface: multicast.interface,
                interface_index: multicast.interface_index,
            }),
            shapes: EventShapes::default(),
            dims: GridDimensions::default(),
        }
    }
}

impl AppConfig {
    /// Resolve application settings from a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Grid`] if the grid dimensions are invalid.
    pub fn from_config_file(config: &ConfigFile) -> Result<Self, AppError> {
        let unicast = config
            .unicast
            .enabled
            .then(|| SocketAddr::new(config.unicast.bind, config.unicast.port));

        let multicast = config.multicast.enabled.then(|| MulticastTarget {
            group: config.multicast.group,
            port: config.multicast.port,
            interface: config.multicast.interface,
            interface_index: config.multicast.interface_index,
        });

        Ok(Self {
            unicast,
            multicast,
            shapes: config.classifier.shapes(),
            dims: config.grid.dimensions()?,
        })
    }
}
