//! Application bootstrap implementation.
//!
//! `ConnMapApp` starts the pieces in dependency order: store and metrics,
//! then the processing loop, then whichever receivers are configured.

use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info, warn};

use super::config::{AppConfig, MulticastTarget};
use super::error::AppError;
use super::ReceiverKind;
use crate::config::GeoIpSettings;
use crate::event::Classifier;
use crate::geo::{Geolocator, MaxMindGeolocator, StaticGeolocator};
use crate::grid::GridDimensions;
use crate::pipeline::{EventProcessor, ProcessingLoop, ProcessorHandle};
use crate::queue::{EventQueue, EventSender, ShutdownReason};
use crate::receiver::{DatagramReceiver, MulticastSocket, ReceiverHandle, UnicastSocket};
use crate::store::{AggregationStore, GridSnapshot};
use crate::telemetry::{PipelineMetrics, TelemetrySnapshot};

/// Open the geolocation source named by the settings.
///
/// A MaxMind database takes precedence over a static table.
///
/// # Errors
///
/// Returns [`AppError::NoGeolocator`] if neither is configured, or
/// [`AppError::Geolocator`] if the source cannot be read.
pub fn open_geolocator(settings: &GeoIpSettings) -> Result<Arc<dyn Geolocator>, AppError> {
    if let Some(database) = &settings.database {
        let geolocator = MaxMindGeolocator::open(database)?;
        return Ok(Arc::new(geolocator));
    }
    if let Some(table) = &settings.table {
        let geolocator = StaticGeolocator::from_file(table)?;
        info!(path = %table.display(), entries = geolocator.len(), "Loaded static location table");
        return Ok(Arc::new(geolocator));
    }
    Err(AppError::NoGeolocator)
}

/// A running receiver and what it was started as.
struct RunningReceiver {
    kind: ReceiverKind,
    handle: ReceiverHandle,
}

/// Live ingestion pipeline with receiver lifecycle management.
///
/// # Example
///
/// ```ignore
/// use connmap::app::{AppConfig, ConnMapApp};
///
/// let app = ConnMapApp::start(AppConfig::default(), geolocator)?;
///
/// // Renderer side
/// let snapshot = app.snapshot();
///
/// app.shutdown();
/// ```
pub struct ConnMapApp {
    config: AppConfig,
    store: Arc<AggregationStore>,
    metrics: Arc<PipelineMetrics>,
    sender: EventSender,
    processor: ProcessorHandle,
    receivers: Mutex<Vec<RunningReceiver>>,
}

impl ConnMapApp {
    /// Start the pipeline and the configured receivers.
    ///
    /// A receiver that fails to start is logged and counted but does not
    /// fail startup; the other receiver and the processing loop keep running.
    ///
    /// # Arguments
    ///
    /// * `config` - Resolved application configuration
    /// * `geolocator` - Address to coordinate lookup used by the loop
    ///
    /// # Errors
    ///
    /// Returns an error only if the processing loop cannot be started.
    pub fn start(config: AppConfig, geolocator: Arc<dyn Geolocator>) -> Result<Self, AppError> {
        let store = Arc::new(AggregationStore::new());
        let metrics = Arc::new(PipelineMetrics::new());
        let (queue, sender, interrupter) = EventQueue::new();

        info!(
            geolocator = geolocator.name(),
            width = config.dims.width(),
            height = config.dims.height(),
            shapes = ?config.shapes,
            "Starting ConnMap pipeline"
        );

        let processor = EventProcessor::new(
            Classifier::new(config.shapes),
            geolocator,
            config.dims,
            Arc::clone(&store),
            Arc::clone(&metrics),
        );
        let processor = ProcessingLoop::spawn(processor, queue, interrupter, Arc::clone(&metrics))
            .map_err(AppError::ProcessorStart)?;

        let app = Self {
            config,
            store,
            metrics,
            sender,
            processor,
            receivers: Mutex::new(Vec::new()),
        };

        if let Some(bind) = app.config.unicast {
            if let Err(e) = app.start_unicast(bind) {
                error!(error = %e, "Unicast receiver not started");
            }
        }
        if let Some(target) = app.config.multicast {
            if let Err(e) = app.start_multicast(target) {
                error!(error = %e, "Multicast receiver not started");
            }
        }

        Ok(app)
    }

    /// Start the unicast receiver on `bind`.
    ///
    /// Returns the bound local address.
    pub fn start_unicast(&self, bind: SocketAddr) -> Result<SocketAddr, AppError> {
        self.start_receiver(ReceiverKind::Unicast, |sender, metrics| {
            DatagramReceiver::spawn(UnicastSocket::with_bind(bind), sender, metrics)
        })
    }

    /// Start the multicast receiver.
    ///
    /// Returns the bound local address.
    pub fn start_multicast(&self, target: MulticastTarget) -> Result<SocketAddr, AppError> {
        self.start_receiver(ReceiverKind::Multicast, |sender, metrics| {
            let socket =
                MulticastSocket::with_interface(target.group, target.port, target.interface)?
                    .with_ipv6_interface(target.interface_index);
            DatagramReceiver::spawn(socket, sender, metrics)
        })
    }

    fn start_receiver<F>(&self, kind: ReceiverKind, spawn: F) -> Result<SocketAddr, AppError>
    where
        F: FnOnce(
            EventSender,
            Arc<PipelineMetrics>,
        ) -> Result<ReceiverHandle, crate::receiver::ReceiverError>,
    {
        let mut receivers = self.receivers.lock();

        // A receiver whose thread died can be started again
        if let Some(pos) = receivers.iter().position(|r| r.kind == kind) {
            if !receivers[pos].handle.is_finished() {
                return Err(AppError::ReceiverRunning(kind));
            }
            let dead = receivers.swap_remove(pos);
            dead.handle.stop_and_join();
        }

        match spawn(self.sender.clone(), Arc::clone(&self.metrics)) {
            Ok(handle) => {
                let addr = handle.local_addr();
                receivers.push(RunningReceiver { kind, handle });
                Ok(addr)
            }
            Err(source) => {
                self.metrics.receiver_failed();
                Err(AppError::ReceiverStart { kind, source })
            }
        }
    }

    /// Stop one receiver and wait for its thread. Returns `false` if it was
    /// not running.
    pub fn stop_receiver(&self, kind: ReceiverKind) -> bool {
        let running = {
            let mut receivers = self.receivers.lock();
            let pos = receivers.iter().position(|r| r.kind == kind);
            pos.map(|pos| receivers.swap_remove(pos))
        };

        match running {
            Some(receiver) => {
                info!(receiver = receiver.handle.name(), "Stopping receiver");
                receiver.handle.stop_and_join();
                true
            }
            None => false,
        }
    }

    /// Local address of a live receiver of this kind.
    pub fn receiver_addr(&self, kind: ReceiverKind) -> Option<SocketAddr> {
        self.receivers
            .lock()
            .iter()
            .find(|r| r.kind == kind && !r.handle.is_finished())
            .map(|r| r.handle.local_addr())
    }

    /// Kinds of receivers whose threads are still running.
    pub fn active_receivers(&self) -> Vec<ReceiverKind> {
        self.receivers
            .lock()
            .iter()
            .filter(|r| !r.handle.is_finished())
            .map(|r| r.kind)
            .collect()
    }

    /// The shared aggregation store.
    pub fn store(&self) -> &Arc<AggregationStore> {
        &self.store
    }

    /// Point-in-time copy of the grid counts.
    pub fn snapshot(&self) -> GridSnapshot {
        self.store.snapshot()
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.metrics.snapshot()
    }

    pub fn dimensions(&self) -> GridDimensions {
        self.config.dims
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Whether the processing loop is still consuming.
    pub fn is_processing(&self) -> bool {
        !self.processor.is_finished()
    }

    /// Stop all receivers, then interrupt and join the processing loop.
    ///
    /// Lines queued before the interrupt are still counted.
    pub fn shutdown(self) -> Option<ShutdownReason> {
        info!("Shutting down ConnMap pipeline");

        let receivers = std::mem::take(&mut *self.receivers.lock());
        for receiver in receivers {
            receiver.handle.stop_and_join();
        }

        drop(self.sender);
        let reason = self.processor.shutdown();
        if reason.is_none() {
            warn!("Processing loop did not report a shutdown reason");
        }
        reason
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, UdpSocket};
    use std::time::{Duration, Instant};

    use crate::grid::GridCell;

    const OPEN: &str = "%ASA-6-302013: Built outbound TCP connection 1 for outside:8.8.8.8/443 (8.8.8.8/443) to inside:10.0.0.2/5000 (10.0.0.2/5000)";

    fn loopback_config() -> AppConfig {
        AppConfig {
            unicast: Some("127.0.0.1:0".parse().unwrap()),
            multicast: None,
            ..AppConfig::default()
        }
    }

    fn geolocator() -> Arc<dyn Geolocator> {
        Arc::new(
            StaticGeolocator::new()
                .with_entry("8.8.8.8", 37.5, -122.3)
                .unwrap(),
        )
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    #[test]
    fn test_open_geolocator_requires_a_source() {
        let result = open_geolocator(&GeoIpSettings::default());
        assert!(matches!(result, Err(AppError::NoGeolocator)));
    }

    #[test]
    fn test_open_geolocator_prefers_database() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("table.txt");
        std::fs::write(&table, "8.8.8.8,1.0,2.0\n").unwrap();

        let settings = GeoIpSettings {
            database: Some(dir.path().join("missing.mmdb")),
            table: Some(table.clone()),
        };
        assert!(matches!(
            open_geolocator(&settings),
            Err(AppError::Geolocator(_))
        ));

        let settings = GeoIpSettings {
            database: None,
            table: Some(table),
        };
        let geo = open_geolocator(&settings).unwrap();
        assert_eq!(geo.name(), "static-table");
    }

    #[test]
    fn test_app_counts_unicast_datagrams() {
        let app = ConnMapApp::start(loopback_config(), geolocator()).unwrap();
        let addr = app.receiver_addr(ReceiverKind::Unicast).unwrap();

        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        client.send_to(format!("{}\n", OPEN).as_bytes(), addr).unwrap();

        let cell = GridCell::new(116, 256);
        assert!(wait_for(|| app.store().count(cell) == 1));
        assert!(app.is_processing());

        assert_eq!(app.shutdown(), Some(ShutdownReason::Interrupted));
    }

    #[test]
    fn test_receivers_start_and_stop_independently() {
        let app = ConnMapApp::start(loopback_config(), geolocator()).unwrap();
        assert_eq!(app.active_receivers(), vec![ReceiverKind::Unicast]);

        let second = app.start_unicast("127.0.0.1:0".parse().unwrap());
        assert!(matches!(
            second,
            Err(AppError::ReceiverRunning(ReceiverKind::Unicast))
        ));

        assert!(app.stop_receiver(ReceiverKind::Unicast));
        assert!(!app.stop_receiver(ReceiverKind::Unicast));
        assert!(app.active_receivers().is_empty());
        assert!(app.is_processing());

        app.start_unicast("127.0.0.1:0".parse().unwrap()).unwrap();
        assert_eq!(app.active_receivers(), vec![ReceiverKind::Unicast]);
        app.shutdown();
    }

    #[test]
    fn test_failed_receiver_does_not_stop_startup() {
        let config = AppConfig {
            unicast: None,
            multicast: Some(MulticastTarget {
                group: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
                port: 0,
                interface: Ipv4Addr::UNSPECIFIED,
                interface_index: 0,
            }),
            ..AppConfig::default()
        };

        let app = ConnMapApp::start(config, geolocator()).unwrap();
        assert!(app.active_receivers().is_empty());
        assert_eq!(app.telemetry().receivers_failed, 1);
        assert!(app.is_processing());
        app.shutdown();
    }
}
