//! Configuration file handling.
//!
//! Settings live in an INI file, by default `~/.connmap/config.ini`. Every key
//! is optional; a missing file or key falls back to the defaults below.
//!
//! ```ini
//! [unicast]
//! enabled = false
//! bind = 0.0.0.0
//! port = 514
//!
//! [multicast]
//! enabled = true
//! group = 239.5.1.4
//! port = 514
//! interface = 0.0.0.0
//! interface_index = 0
//!
//! [classifier]
//! include_udp = false
//!
//! [geoip]
//! database = ~/.connmap/GeoLite2-City.mmdb
//! table =
//!
//! [grid]
//! width = 720
//! height = 360
//!
//! [render]
//! snapshot_path =
//! interval_secs = 5
//! point_color = #ffffff
//! background_color = #000000
//! x_offset = 0
//! y_offset = 0
//!
//! [logging]
//! level = info
//! directory =
//! ```

mod settings;

pub use settings::{
    ClassifierSettings, GeoIpSettings, GridSettings, LoggingSettings, MulticastSettings,
    RenderSettings, UnicastSettings,
};

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use thiserror::Error;

/// Name of the per-user configuration directory under `$HOME`.
pub const CONFIG_DIR_NAME: &str = ".connmap";

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Errors loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid value for {section}.{key}: '{value}' ({reason})")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    #[error("Could not determine home directory")]
    NoHomeDirectory,
}

/// Per-user configuration directory (`~/.connmap`).
pub fn config_directory() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME))
        .ok_or(ConfigError::NoHomeDirectory)
}

/// Default configuration file path (`~/.connmap/config.ini`).
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_directory()?.join(CONFIG_FILE_NAME))
}

/// Expand a leading `~/` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

/// All application settings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub unicast: UnicastSettings,
    pub multicast: MulticastSettings,
    pub classifier: ClassifierSettings,
    pub geoip: GeoIpSettings,
    pub grid: GridSettings,
    pub render: RenderSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load from the default path; a missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path()?)
    }

    /// Load from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Parse INI text.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(contents).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<string>"),
            message: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let reader = IniReader { ini };
        let mut config = Self::default();

        reader.read("unicast", "enabled", &mut config.unicast.enabled)?;
        reader.read("unicast", "bind", &mut config.unicast.bind)?;
        reader.read("unicast", "port", &mut config.unicast.port)?;

        reader.read("multicast", "enabled", &mut config.multicast.enabled)?;
        reader.read("multicast", "group", &mut config.multicast.group)?;
        reader.read("multicast", "port", &mut config.multicast.port)?;
        reader.read("multicast", "interface", &mut config.multicast.interface)?;
        reader.read("multicast", "interface_index", &mut config.multicast.interface_index)?;

        reader.read("classifier", "include_udp", &mut config.classifier.include_udp)?;

        config.geoip.database = reader.path("geoip", "database");
        config.geoip.table = reader.path("geoip", "table");

        reader.read("grid", "width", &mut config.grid.width)?;
        reader.read("grid", "height", &mut config.grid.height)?;
        config.grid.dimensions().map_err(|e| ConfigError::InvalidValue {
            section: "grid".to_string(),
            key: "width/height".to_string(),
            value: format!("{}x{}", config.grid.width, config.grid.height),
            reason: e.to_string(),
        })?;

        config.render.snapshot_path = reader.path("render", "snapshot_path");
        reader.read("render", "interval_secs", &mut config.render.interval_secs)?;
        reader.read("render", "point_color", &mut config.render.point_color)?;
        reader.read("render", "background_color", &mut config.render.background_color)?;
        reader.read("render", "x_offset", &mut config.render.x_offset)?;
        reader.read("render", "y_offset", &mut config.render.y_offset)?;

        reader.read("logging", "level", &mut config.logging.level)?;
        config.logging.directory = reader.path("logging", "directory");

        Ok(config)
    }

    /// Save to the default path, creating the directory if needed.
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = config_file_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save to `path`, creating parent directories if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.to_ini().write_to_file(path)?;
        Ok(())
    }

    fn to_ini(&self) -> Ini {
        let path_str = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default()
        };

        let mut ini = Ini::new();
        ini.with_section(Some("unicast"))
            .set("enabled", self.unicast.enabled.to_string())
            .set("bind", self.unicast.bind.to_string())
            .set("port", self.unicast.port.to_string());
        ini.with_section(Some("multicast"))
            .set("enabled", self.multicast.enabled.to_string())
            .set("group", self.multicast.group.to_string())
            .set("port", self.multicast.port.to_string())
            .set("interface", self.multicast.interface.to_string())
            .set("interface_index", self.multicast.interface_index.to_string());
        ini.with_section(Some("classifier"))
            .set("include_udp", self.classifier.include_udp.to_string());
        ini.with_section(Some("geoip"))
            .set("database", path_str(&self.geoip.database))
            .set("table", path_str(&self.geoip.table));
        ini.with_section(Some("grid"))
            .set("width", self.grid.width.to_string())
            .set("height", self.grid.height.to_string());
        ini.with_section(Some("render"))
            .set("snapshot_path", path_str(&self.render.snapshot_path))
            .set("interval_secs", self.render.interval_secs.to_string())
            .set("point_color", self.render.point_color.to_string())
            .set("background_color", self.render.background_color.to_string())
            .set("x_offset", self.render.x_offset.to_string())
            .set("y_offset", self.render.y_offset.to_string());
        ini.with_section(Some("logging"))
            .set("level", self.logging.level.clone())
            .set("directory", path_str(&self.logging.directory));
        ini
    }
}

/// Typed lookups over a parsed INI document.
struct IniReader<'a> {
    ini: &'a Ini,
}

impl IniReader<'_> {
    fn raw(&self, section: &str, key: &str) -> Option<&str> {
        self.ini
            .get_from(Some(section), key)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }

    /// Overwrite `target` when the key is present and parses.
    fn read<T>(&self, section: &str, key: &str, target: &mut T) -> Result<(), ConfigError>
    where
        T: FromStr,
        T::Err: Display,
    {
        if let Some(value) = self.raw(section, key) {
            *target = value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                section: section.to_string(),
                key: key.to_string(),
                value: value.to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Optional path; empty means unset.
    fn path(&self, section: &str, key: &str) -> Option<PathBuf> {
        self.raw(section, key).map(expand_tilde)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Color;
    use std::net::Ipv4Addr;

    #[test]
    fn test_defaults() {
        let config = ConfigFile::default();
        assert!(!config.unicast.enabled);
        assert_eq!(config.unicast.port, 514);
        assert!(config.multicast.enabled);
        assert_eq!(config.multicast.group.to_string(), "239.5.1.4");
        assert_eq!(config.grid.width, 720);
        assert_eq!(config.grid.height, 360);
        assert_eq!(config.logging.level, "info");
        assert!(config.geoip.database.is_none());
    }

    #[test]
    fn test_parse_overrides() {
        let config = ConfigFile::parse(
            "[unicast]\nenabled = true\nport = 5514\n\n[multicast]\nenabled = false\n\n[classifier]\ninclude_udp = true\n\n[render]\npoint_color = #ff0000\n",
        )
        .unwrap();

        assert!(config.unicast.enabled);
        assert_eq!(config.unicast.port, 5514);
        assert!(!config.multicast.enabled);
        assert!(config.classifier.include_udp);
        assert_eq!(config.render.point_color, Color([0xff, 0, 0, 0xff]));
        // Untouched keys keep defaults
        assert_eq!(config.multicast.port, 514);
    }

    #[test]
    fn test_parse_ipv6_multicast() {
        let config =
            ConfigFile::parse("[multicast]\ngroup = ff15::5:1:4\ninterface_index = 2\n").unwrap();

        assert_eq!(config.multicast.group.to_string(), "ff15::5:1:4");
        assert_eq!(config.multicast.interface_index, 2);
        assert_eq!(config.multicast.interface, Ipv4Addr::UNSPECIFIED);
    }

    #[test]
    fn test_parse_invalid_port() {
        let err = ConfigFile::parse("[unicast]\nport = seventy\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "port"));
    }

    #[test]
    fn test_parse_zero_grid_rejected() {
        assert!(ConfigFile::parse("[grid]\nwidth = 0\n").is_err());
    }

    #[test]
    fn test_empty_path_is_unset() {
        let config = ConfigFile::parse("[geoip]\ndatabase =\n").unwrap();
        assert!(config.geoip.database.is_none());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("nope.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.unicast.enabled = true;
        config.unicast.bind = Ipv4Addr::LOCALHOST.into();
        config.geoip.table = Some(PathBuf::from("/etc/connmap/table.txt"));
        config.render.x_offset = -20;
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/x.mmdb"), home.join("x.mmdb"));
        }
    }
}
