//! Run command - live ingestion until Ctrl+C.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use connmap::app::{open_geolocator, AppConfig, ConnMapApp, ReceiverKind};
use connmap::logging::init_logging;
use connmap::render::{write_png, GridRenderer};
use tracing::{error, info, warn};

use super::common::{load_config, GeoOverrides, ReceiverOverrides};
use crate::error::CliError;

/// How often telemetry is logged while running.
const TELEMETRY_INTERVAL: Duration = Duration::from_secs(30);

/// Arguments for the run command.
pub struct RunArgs {
    pub config: Option<PathBuf>,
    pub receivers: ReceiverOverrides,
    pub geo: GeoOverrides,
    pub snapshot: Option<PathBuf>,
}

/// Run the run command.
pub fn run(args: RunArgs) -> Result<(), CliError> {
    let mut config = load_config(args.config.as_deref())?;
    args.receivers.apply(&mut config)?;
    args.geo.apply(&mut config.geoip);
    if args.snapshot.is_some() {
        config.render.snapshot_path = args.snapshot;
    }

    let _log_guard = init_logging(&config.logging)?;
    info!(version = connmap::VERSION, "ConnMap starting");

    let geolocator = open_geolocator(&config.geoip)?;
    let app_config = AppConfig::from_config_file(&config)?;
    let app = ConnMapApp::start(app_config, geolocator)?;

    println!("ConnMap v{}", connmap::VERSION);
    println!("==============");
    println!();
    for kind in [ReceiverKind::Unicast, ReceiverKind::Multicast] {
        match app.receiver_addr(kind) {
            Some(addr) => println!("{:<10} listening on {}", kind.to_string(), addr),
            None => println!("{:<10} off", kind.to_string()),
        }
    }
    println!(
        "Grid:      {}x{}",
        app.dimensions().width(),
        app.dimensions().height()
    );
    if let Some(path) = &config.render.snapshot_path {
        println!(
            "Snapshot:  {} (every {}s)",
            path.display(),
            config.render.interval_secs
        );
    }
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    if app.active_receivers().is_empty() {
        warn!("No receivers are running; no connections will be counted");
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    })
    .map_err(|e| CliError::Config(format!("Failed to set signal handler: {}", e)))?;

    let renderer = GridRenderer::new(app.dimensions(), config.render.render_config());
    let render_interval = Duration::from_secs(config.render.interval_secs.max(1));
    let mut last_render = Instant::now();
    let mut last_telemetry = Instant::now();

    while !shutdown.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));

        if !app.is_processing() {
            error!("Processing loop has stopped; exiting");
            break;
        }

        if let Some(path) = &config.render.snapshot_path {
            if last_render.elapsed() >= render_interval {
                if let Err(e) = write_png(&renderer.render(&app.snapshot()), path) {
                    warn!(path = %path.display(), error = %e, "Failed to write snapshot");
                }
                last_render = Instant::now();
            }
        }

        if last_telemetry.elapsed() >= TELEMETRY_INTERVAL {
            let snapshot = app.snapshot();
            info!(
                cells = snapshot.len(),
                open_connections = snapshot.total(),
                "{}",
                app.telemetry()
            );
            last_telemetry = Instant::now();
        }
    }

    println!();
    println!("Stopping...");

    let final_grid = app.snapshot();
    let telemetry = app.telemetry();
    app.shutdown();

    if let Some(path) = &config.render.snapshot_path {
        write_png(&renderer.render(&final_grid), path)?;
    }

    println!();
    println!("Session Summary");
    println!("───────────────");
    println!("  Datagrams received: {}", telemetry.datagrams_received);
    println!(
        "  Opens / closes:     {} / {} ({} unmatched)",
        telemetry.opens_applied, telemetry.closes_applied, telemetry.closes_unmatched
    );
    println!("  Dropped (no geo):   {}", telemetry.events_dropped());
    println!(
        "  Open connections:   {} in {} cells",
        final_grid.total(),
        final_grid.len()
    );
    println!("  Uptime: {}", telemetry.uptime_human());
    Ok(())
}
