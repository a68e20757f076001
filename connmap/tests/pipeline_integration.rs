//! Integration tests for the live ingestion pipeline.
//!
//! These tests drive real UDP datagrams over loopback through:
//! - receiver → event queue → processing loop → aggregation store
//! - two receivers feeding one loop concurrently
//! - unicast and multicast receivers sharing one port
//! - geolocation misses and unmatched closes
//!
//! Run with: `cargo test --test pipeline_integration`

use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::{Duration, Instant};

use connmap::app::{AppConfig, ConnMapApp, MulticastTarget, ReceiverKind};
use connmap::event::Classifier;
use connmap::geo::{Geolocator, StaticGeolocator};
use connmap::grid::{bucketize_lat_lon, GridCell, GridDimensions};
use connmap::pipeline::{EventProcessor, ProcessingLoop};
use connmap::queue::{EventQueue, ShutdownReason};
use connmap::receiver::{DatagramReceiver, UnicastSocket};
use connmap::store::AggregationStore;
use connmap::telemetry::PipelineMetrics;

// ============================================================================
// Helper Functions
// ============================================================================

const REMOTE: &str = "93.184.216.34";
const OTHER_REMOTE: &str = "1.1.1.1";

fn open_line(remote: &str, id: u32) -> String {
    format!(
        "<166>Oct 17 2026 10:00:00 fw01 : %ASA-6-302013: Built outbound TCP connection {id} for outside:{remote}/443 ({remote}/443) to inside:192.168.1.10/51000 (203.0.113.5/51000)\n"
    )
}

fn close_line(remote: &str, id: u32) -> String {
    format!(
        "<166>Oct 17 2026 10:05:00 fw01 : %ASA-6-302014: Teardown TCP connection {id} for outside:{remote}/443 to inside:192.168.1.10/51000 duration 0:05:00 bytes 1024 TCP FINs\n"
    )
}

fn geolocator() -> Arc<dyn Geolocator> {
    Arc::new(
        StaticGeolocator::new()
            .with_entry(REMOTE, 37.5, -122.3)
            .unwrap()
            .with_entry(OTHER_REMOTE, -33.9, 151.2)
            .unwrap(),
    )
}

fn remote_cell() -> GridCell {
    bucketize_lat_lon(37.5, -122.3, GridDimensions::default()).unwrap()
}

fn other_cell() -> GridCell {
    bucketize_lat_lon(-33.9, 151.2, GridDimensions::default()).unwrap()
}

/// Start an app with only a loopback unicast receiver.
fn start_app() -> (ConnMapApp, SocketAddr) {
    let config = AppConfig {
        unicast: Some("127.0.0.1:0".parse().unwrap()),
        multicast: None,
        ..AppConfig::default()
    };
    let app = ConnMapApp::start(config, geolocator()).unwrap();
    let addr = app.receiver_addr(ReceiverKind::Unicast).unwrap();
    (app, addr)
}

fn send(addr: SocketAddr, line: &str) {
    let client = UdpSocket::bind("127.0.0.1:0").unwrap();
    client.send_to(line.as_bytes(), addr).unwrap();
}

/// Poll until `condition` holds or five seconds pass.
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

/// Wait until the loop has processed `n` lines.
fn wait_for_lines(app: &ConnMapApp, n: u64) {
    assert!(
        wait_for(|| app.metrics().lines_processed() >= n),
        "timed out waiting for {} lines, processed {}",
        n,
        app.metrics().lines_processed()
    );
}

// ============================================================================
// Integration Tests
// ============================================================================

#[test]
fn test_open_increments_cell() {
    let (app, addr) = start_app();

    send(addr, &open_line(REMOTE, 1));
    wait_for_lines(&app, 1);

    let snapshot = app.snapshot();
    assert_eq!(remote_cell(), GridCell::new(116, 256));
    assert_eq!(snapshot.count(remote_cell()), 1);
    assert_eq!(snapshot.len(), 1);

    assert_eq!(app.shutdown(), Some(ShutdownReason::Interrupted));
}

#[test]
fn test_close_removes_only_occupant() {
    let (app, addr) = start_app();

    send(addr, &open_line(REMOTE, 1));
    wait_for_lines(&app, 1);
    assert_eq!(app.store().count(remote_cell()), 1);

    send(addr, &close_line(REMOTE, 1));
    wait_for_lines(&app, 2);

    assert!(app.snapshot().is_empty());
    assert_eq!(app.telemetry().closes_applied, 1);
    app.shutdown();
}

#[test]
fn test_close_without_open_is_noop() {
    let (app, addr) = start_app();

    send(addr, &close_line(REMOTE, 7));
    wait_for_lines(&app, 1);

    assert!(app.snapshot().is_empty());
    let telemetry = app.telemetry();
    assert_eq!(telemetry.closes_unmatched, 1);
    assert!(telemetry.processor_running);
    app.shutdown();
}

#[test]
fn test_geo_miss_then_unrelated_open() {
    let (app, addr) = start_app();

    send(addr, &open_line("10.20.30.40", 1));
    wait_for_lines(&app, 1);
    assert!(app.snapshot().is_empty());
    assert_eq!(app.telemetry().geo_not_found, 1);

    send(addr, &open_line(OTHER_REMOTE, 2));
    wait_for_lines(&app, 2);

    let snapshot = app.snapshot();
    assert_eq!(snapshot.count(other_cell()), 1);
    assert_eq!(snapshot.len(), 1);
    app.shutdown();
}

#[test]
fn test_noise_changes_nothing() {
    let (app, addr) = start_app();

    send(addr, "<166>%ASA-6-305011: Built dynamic TCP translation from inside:10.0.0.1/1 to outside:1.2.3.4/2\n");
    send(addr, "");
    wait_for_lines(&app, 2);

    assert!(app.snapshot().is_empty());
    assert_eq!(app.telemetry().lines_ignored, 2);
    app.shutdown();
}

#[test]
fn test_two_receivers_feed_one_loop() {
    let store = Arc::new(AggregationStore::new());
    let metrics = Arc::new(PipelineMetrics::new());
    let (queue, sender, interrupter) = EventQueue::new();

    let processor = EventProcessor::new(
        Classifier::default(),
        geolocator(),
        GridDimensions::default(),
        Arc::clone(&store),
        Arc::clone(&metrics),
    );
    let processing =
        ProcessingLoop::spawn(processor, queue, interrupter, Arc::clone(&metrics)).unwrap();

    let receivers: Vec<_> = (0..2)
        .map(|_| {
            DatagramReceiver::spawn(
                UnicastSocket::with_bind("127.0.0.1:0".parse().unwrap()),
                sender.clone(),
                Arc::clone(&metrics),
            )
            .unwrap()
        })
        .collect();
    drop(sender);

    let senders: Vec<_> = receivers
        .iter()
        .map(|receiver| {
            let target = receiver.local_addr();
            std::thread::spawn(move || {
                for id in 0..50 {
                    send(target, &open_line(REMOTE, id));
                    if id % 10 == 0 {
                        std::thread::sleep(Duration::from_millis(1));
                    }
                }
            })
        })
        .collect();
    for sender in senders {
        sender.join().unwrap();
    }
    std::thread::sleep(Duration::from_millis(300));

    // Loopback UDP may still drop under load; whatever arrived must be
    // counted exactly once.
    assert!(wait_for(|| {
        let received = metrics.snapshot().datagrams_received;
        received > 0 && metrics.lines_processed() == received
    }));
    let received = metrics.snapshot().datagrams_received;
    assert_eq!(store.count(remote_cell()), received);

    for receiver in receivers {
        receiver.stop_and_join();
    }
    assert_eq!(processing.shutdown(), Some(ShutdownReason::Interrupted));
}

#[test]
fn test_stopped_receiver_leaves_loop_running() {
    let (app, addr) = start_app();

    send(addr, &open_line(REMOTE, 1));
    wait_for_lines(&app, 1);

    assert!(app.stop_receiver(ReceiverKind::Unicast));
    assert!(app.is_processing());

    let new_addr = app
        .start_unicast("127.0.0.1:0".parse().unwrap())
        .unwrap();
    send(new_addr, &open_line(REMOTE, 2));
    wait_for_lines(&app, 2);

    assert_eq!(app.store().count(remote_cell()), 2);
    app.shutdown();
}

#[cfg(target_os = "linux")]
#[test]
fn test_shared_port_counts_each_datagram_once() {
    use socket2::{Domain, Protocol, Socket, Type};

    let group = Ipv4Addr::new(239, 255, 77, 14);
    let config = AppConfig {
        unicast: Some("0.0.0.0:0".parse().unwrap()),
        multicast: None,
        ..AppConfig::default()
    };
    let app = ConnMapApp::start(config, geolocator()).unwrap();
    let port = app.receiver_addr(ReceiverKind::Unicast).unwrap().port();
    app.start_multicast(MulticastTarget {
        group: group.into(),
        port,
        interface: Ipv4Addr::LOCALHOST,
        interface_index: 0,
    })
    .unwrap();

    let client = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).unwrap();
    client.set_multicast_if_v4(&Ipv4Addr::LOCALHOST).unwrap();
    client.set_multicast_loop_v4(true).unwrap();
    let group_addr = SocketAddr::new(group.into(), port);
    client
        .send_to(open_line(REMOTE, 1).as_bytes(), &group_addr.into())
        .unwrap();
    send(
        SocketAddr::new(Ipv4Addr::LOCALHOST.into(), port),
        &open_line(OTHER_REMOTE, 2),
    );

    wait_for_lines(&app, 2);
    // A duplicate delivery would land shortly after
    std::thread::sleep(Duration::from_millis(200));

    let telemetry = app.telemetry();
    assert_eq!(telemetry.datagrams_received, 2);
    assert_eq!(telemetry.opens_applied, 2);
    assert_eq!(app.store().count(remote_cell()), 1);
    assert_eq!(app.store().count(other_cell()), 1);
    app.shutdown();
}
