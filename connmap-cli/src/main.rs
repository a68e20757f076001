//! ConnMap CLI - Command-line interface
//!
//! This binary provides a command-line interface to the ConnMap library.

mod commands;
mod error;

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::common::{GeoOverrides, ReceiverOverrides};
use commands::replay::ReplayArgs;
use commands::run::RunArgs;
use error::CliError;

#[derive(Parser)]
#[command(name = "connmap")]
#[command(version = connmap::VERSION)]
#[command(about = "Live world map of firewall connections, built from ASA syslog", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Receive syslog and keep the map live until Ctrl+C
    Run {
        /// Configuration file (default: ~/.connmap/config.ini)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Enable the unicast receiver on this port
        #[arg(long)]
        unicast_port: Option<u16>,

        /// Join this multicast group, as GROUP:PORT
        #[arg(long, value_name = "GROUP:PORT", conflicts_with = "no_multicast")]
        multicast: Option<SocketAddr>,

        /// Disable the multicast receiver
        #[arg(long)]
        no_multicast: bool,

        /// MaxMind City database
        #[arg(long, value_name = "PATH", conflicts_with = "geo_table")]
        geoip: Option<PathBuf>,

        /// Static address,latitude,longitude table
        #[arg(long, value_name = "PATH")]
        geo_table: Option<PathBuf>,

        /// Write a PNG snapshot of the map here periodically
        #[arg(long, value_name = "PATH")]
        snapshot: Option<PathBuf>,
    },

    /// Replay a saved syslog file and export the resulting map
    Replay {
        /// Syslog capture, one message per line
        file: PathBuf,

        /// Configuration file (default: ~/.connmap/config.ini)
        #[arg(long)]
        config: Option<PathBuf>,

        /// MaxMind City database
        #[arg(long, value_name = "PATH", conflicts_with = "geo_table")]
        geoip: Option<PathBuf>,

        /// Static address,latitude,longitude table
        #[arg(long, value_name = "PATH")]
        geo_table: Option<PathBuf>,

        /// Write cell counts as JSON
        #[arg(long, value_name = "PATH")]
        json: Option<PathBuf>,

        /// Write the map as PNG
        #[arg(long, value_name = "PATH")]
        png: Option<PathBuf>,
    },

    /// Write the default configuration file
    Init {
        /// Where to write (default: ~/.connmap/config.ini)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let result: Result<(), CliError> = match cli.command {
        Commands::Run {
            config,
            unicast_port,
            multicast,
            no_multicast,
            geoip,
            geo_table,
            snapshot,
        } => commands::run::run(RunArgs {
            config,
            receivers: ReceiverOverrides {
                unicast_port,
                multicast,
                no_multicast,
            },
            geo: GeoOverrides { geoip, geo_table },
            snapshot,
        }),

        Commands::Replay {
            file,
            config,
            geoip,
            geo_table,
            json,
            png,
        } => commands::replay::run(ReplayArgs {
            file,
            config,
            geo: GeoOverrides { geoip, geo_table },
            json,
            png,
        }),

        Commands::Init { path, force } => commands::init::run(path, force),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_flags() {
        let cli = Cli::try_parse_from([
            "connmap",
            "run",
            "--unicast-port",
            "5514",
            "--multicast",
            "239.5.1.4:514",
            "--geo-table",
            "table.txt",
        ])
        .unwrap();

        match cli.command {
            Commands::Run {
                unicast_port,
                multicast,
                geo_table,
                ..
            } => {
                assert_eq!(unicast_port, Some(5514));
                assert_eq!(multicast, Some("239.5.1.4:514".parse().unwrap()));
                assert_eq!(geo_table, Some(PathBuf::from("table.txt")));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_geo_flags_conflict() {
        let result = Cli::try_parse_from([
            "connmap", "replay", "cap.log", "--geoip", "a.mmdb", "--geo-table", "t.txt",
        ]);
        assert!(result.is_err());
    }
}
