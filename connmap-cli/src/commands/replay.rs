//! Replay command - feed a saved syslog file through the pipeline.
//!
//! Lines go through the same [`EventProcessor`] the live loop uses, on the
//! calling thread, so a capture replays to exactly the counts it produced
//! live.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;

use connmap::app::open_geolocator;
use connmap::event::Classifier;
use connmap::logging::init_logging;
use connmap::pipeline::EventProcessor;
use connmap::receiver::decode_datagram;
use connmap::render::{write_json, write_png, GridRenderer};
use connmap::store::AggregationStore;
use connmap::telemetry::PipelineMetrics;
use tracing::info;

use super::common::{load_config, GeoOverrides};
use crate::error::CliError;

/// How many of the busiest cells the summary lists.
const TOP_CELLS: usize = 5;

/// Arguments for the replay command.
pub struct ReplayArgs {
    pub file: PathBuf,
    pub config: Option<PathBuf>,
    pub geo: GeoOverrides,
    pub json: Option<PathBuf>,
    pub png: Option<PathBuf>,
}

/// Feed every line of `reader` to `processor`. Returns the line count.
///
/// Lines are decoded like datagrams: lossy UTF-8 with one trailing
/// framing byte trimmed.
pub fn replay_lines<R: BufRead>(mut reader: R, processor: &EventProcessor) -> std::io::Result<u64> {
    let mut buf = Vec::new();
    let mut lines = 0;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        processor.process_line(&decode_datagram(&buf));
        lines += 1;
    }

    Ok(lines)
}

/// Run the replay command.
pub fn run(args: ReplayArgs) -> Result<(), CliError> {
    let mut config = load_config(args.config.as_deref())?;
    args.geo.apply(&mut config.geoip);

    let _log_guard = init_logging(&config.logging)?;

    let dims = config.grid.dimensions().map_err(|e| CliError::Config(e.to_string()))?;
    let geolocator = open_geolocator(&config.geoip)?;
    let store = Arc::new(AggregationStore::new());
    let metrics = Arc::new(PipelineMetrics::new());
    let processor = EventProcessor::new(
        Classifier::new(config.classifier.shapes()),
        geolocator,
        dims,
        Arc::clone(&store),
        Arc::clone(&metrics),
    );

    let file = File::open(&args.file).map_err(|e| {
        CliError::Config(format!("Cannot open {}: {}", args.file.display(), e))
    })?;
    info!(path = %args.file.display(), "Replaying capture");
    let lines = replay_lines(BufReader::new(file), &processor)?;

    let snapshot = store.snapshot();
    if let Some(path) = &args.json {
        write_json(&snapshot, dims, path)?;
        println!("Wrote {}", path.display());
    }
    if let Some(path) = &args.png {
        let renderer = GridRenderer::new(dims, config.render.render_config());
        write_png(&renderer.render(&snapshot), path)?;
        println!("Wrote {}", path.display());
    }

    let telemetry = metrics.snapshot();
    println!();
    println!("Replay Summary");
    println!("──────────────");
    println!("  Lines:            {}", lines);
    println!("  Ignored:          {}", telemetry.lines_ignored);
    println!(
        "  Opens / closes:   {} / {} ({} unmatched)",
        telemetry.opens_applied, telemetry.closes_applied, telemetry.closes_unmatched
    );
    println!("  Dropped (no geo): {}", telemetry.events_dropped());
    println!(
        "  Open connections: {} in {} cells",
        snapshot.total(),
        snapshot.len()
    );

    let mut busiest = snapshot.sorted();
    busiest.sort_by(|a, b| b.count.cmp(&a.count));
    if !busiest.is_empty() {
        println!();
        println!("  Busiest cells (column x row):");
        for cell in busiest.iter().take(TOP_CELLS) {
            println!("    {:>4}x{:<4} {}", cell.column, cell.row, cell.count);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use connmap::geo::StaticGeolocator;
    use connmap::grid::{GridCell, GridDimensions};

    const CAPTURE: &str = "\
%ASA-6-302013: Built outbound TCP connection 1 for outside:93.184.216.34/443 (93.184.216.34/443) to inside:10.0.0.2/5000 (10.0.0.2/5000)
%ASA-6-302013: Built outbound TCP connection 2 for outside:93.184.216.34/80 (93.184.216.34/80) to inside:10.0.0.3/5001 (10.0.0.3/5001)
%ASA-6-305011: Built dynamic TCP translation from inside:10.0.0.2/5000 to outside:203.0.113.5/5000
%ASA-6-302014: Teardown TCP connection 1 for outside:93.184.216.34/443 to inside:10.0.0.2/5000 duration 0:00:01 bytes 10 TCP FINs
";

    #[test]
    fn test_replay_lines_counts_net_opens() {
        let store = Arc::new(AggregationStore::new());
        let metrics = Arc::new(PipelineMetrics::new());
        let geo = StaticGeolocator::new()
            .with_entry("93.184.216.34", 37.5, -122.3)
            .unwrap();
        let processor = EventProcessor::new(
            Classifier::default(),
            Arc::new(geo),
            GridDimensions::default(),
            Arc::clone(&store),
            Arc::clone(&metrics),
        );

        let lines = replay_lines(CAPTURE.as_bytes(), &processor).unwrap();

        assert_eq!(lines, 4);
        assert_eq!(store.count(GridCell::new(116, 256)), 1);
        let telemetry = metrics.snapshot();
        assert_eq!(telemetry.lines_ignored, 1);
        assert_eq!(telemetry.closes_applied, 1);
    }
}
