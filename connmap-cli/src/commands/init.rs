//! Init command - write the default configuration file.

use std::path::{Path, PathBuf};

use connmap::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Run the init command.
///
/// Writes to `path`, or the default location when `None`. An existing file
/// is only replaced with `force`.
pub fn run(path: Option<PathBuf>, force: bool) -> Result<(), CliError> {
    let path = match path {
        Some(path) => path,
        None => config_file_path()?,
    };
    write_default(&path, force)?;

    println!("Configuration file: {}", path.display());
    println!();
    println!("Set [geoip] database to a MaxMind City database before running.");
    println!("CLI arguments override config file values when specified.");
    Ok(())
}

fn write_default(path: &Path, force: bool) -> Result<(), CliError> {
    if path.exists() && !force {
        return Err(CliError::Config(format!(
            "{} already exists; use --force to overwrite",
            path.display()
        )));
    }
    ConfigFile::default().save_to(path)?;
    Ok(())
}
