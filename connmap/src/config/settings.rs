//! Settings sections and their defaults.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use crate::event::EventShapes;
use crate::grid::{CoordError, GridDimensions, DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::render::{Color, RenderConfig};

/// Default syslog port.
pub const DEFAULT_SYSLOG_PORT: u16 = 514;

/// Default multicast group the firewall logs to.
pub const DEFAULT_MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 5, 1, 4);

/// Default seconds between snapshot renders.
pub const DEFAULT_RENDER_INTERVAL_SECS: u64 = 5;

/// `[unicast]` receiver settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnicastSettings {
    pub enabled: bool,
    pub bind: IpAddr,
    pub port: u16,
}

impl Default for UnicastSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_SYSLOG_PORT,
        }
    }
}

/// `[multicast]` receiver settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MulticastSettings {
    pub enabled: bool,
    pub group: IpAddr,
    pub port: u16,
    /// Local IPv4 address to join on; only used for IPv4 groups.
    pub interface: Ipv4Addr,
    /// Interface index to join on; only used for IPv6 groups.
    pub interface_index: u32,
}

impl Default for MulticastSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            group: IpAddr::V4(DEFAULT_MULTICAST_GROUP),
            port: DEFAULT_SYSLOG_PORT,
            interface: Ipv4Addr::UNSPECIFIED,
            interface_index: 0,
        }
    }
}

/// `[classifier]` settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifierSettings {
    /// Also count UDP built/teardown messages.
    pub include_udp: bool,
}

impl ClassifierSettings {
    pub fn shapes(&self) -> EventShapes {
        EventShapes::from_include_udp(self.include_udp)
    }
}

/// `[geoip]` settings. The database takes precedence over the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoIpSettings {
    pub database: Option<PathBuf>,
    pub table: Option<PathBuf>,
}

/// `[grid]` settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridSettings {
    pub width: u32,
    pub height: u32,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

impl GridSettings {
    pub fn dimensions(&self) -> Result<GridDimensions, CoordError> {
        GridDimensions::new(self.width, self.height)
    }
}

/// `[render]` settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    /// Where to write the PNG snapshot; unset disables rendering.
    pub snapshot_path: Option<PathBuf>,
    pub interval_secs: u64,
    pub point_color: Color,
    pub background_color: Color,
    pub x_offset: i64,
    pub y_offset: i64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        let render = RenderConfig::default();
        Self {
            snapshot_path: None,
            interval_secs: DEFAULT_RENDER_INTERVAL_SECS,
            point_color: render.point_color,
            background_color: render.background_color,
            x_offset: render.x_offset,
            y_offset: render.y_offset,
        }
    }
}

impl RenderSettings {
    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            point_color: self.point_color,
            background_color: self.background_color,
            x_offset: self.x_offset,
            y_offset: self.y_offset,
        }
    }
}

/// `[logging]` settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Directory for the log file; unset logs to stderr only.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}
