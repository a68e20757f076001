//! Datagram receivers for the syslog stream.
//!
//! A receiver owns one UDP socket on its own OS thread. It blocks on receive,
//! decodes each datagram to text and pushes it onto the [`EventQueue`].
//!
//! Socket setup is a [`SocketStrategy`]; the receive loop is shared:
//!
//! ```text
//! UnicastSocket   ──┐
//!                   ├──► DatagramReceiver::spawn() ──► thread: recv → decode → push
//! MulticastSocket ──┘
//! ```
//!
//! # Failure model
//!
//! A bind failure is returned from [`DatagramReceiver::spawn`]. An I/O error
//! while receiving ends that receiver's thread after logging it. Neither
//! affects other receivers or the processing loop, and nothing is retried.
//!
//! [`EventQueue`]: crate::queue::EventQueue

mod socket;

pub use socket::{MulticastSocket, SocketStrategy, UnicastSocket};

use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::queue::EventSender;
use crate::telemetry::PipelineMetrics;

/// Receive buffer size; one full Ethernet-sized UDP payload.
pub const RECEIVE_BUFFER_SIZE: usize = 1500;

/// How often a blocked receive wakes to check for a stop request.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Errors setting up a receiver.
#[derive(Debug, Error)]
pub enum ReceiverError {
    /// Creating or binding the socket failed.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Joining the multicast group failed.
    #[error("Failed to join multicast group {group}: {source}")]
    Join {
        group: IpAddr,
        #[source]
        source: std::io::Error,
    },

    /// The configured group is not a multicast address.
    #[error("Not a multicast address: {0}")]
    NotMulticast(IpAddr),

    /// Socket options or thread spawn failed after binding.
    #[error("Receiver setup failed: {0}")]
    Setup(#[from] std::io::Error),
}

/// Decode a datagram payload into a syslog line.
///
/// Invalid UTF-8 is replaced rather than rejected. A single trailing framing
/// byte (`\n`, `\r` or NUL) is trimmed; anything else is kept.
pub fn decode_datagram(payload: &[u8]) -> String {
    let payload = match payload.last() {
        Some(b'\n' | b'\r' | b'\0') => &payload[..payload.len() - 1],
        _ => payload,
    };
    String::from_utf8_lossy(payload).into_owned()
}

/// Factory for receiver threads.
pub struct DatagramReceiver;

impl DatagramReceiver {
    /// Open the socket and start the receive loop on a new thread.
    ///
    /// # Arguments
    ///
    /// * `strategy` - Socket construction (unicast or multicast join)
    /// * `sender` - Producer handle onto the event queue
    /// * `metrics` - Shared pipeline counters
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be opened; no thread is started.
    pub fn spawn<S: SocketStrategy>(
        strategy: S,
        sender: EventSender,
        metrics: Arc<PipelineMetrics>,
    ) -> Result<ReceiverHandle, ReceiverError> {
        let socket = strategy.open()?;
        socket.set_read_timeout(Some(STOP_POLL_INTERVAL))?;
        let local_addr = socket.local_addr()?;
        let name = strategy.to_string();

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let thread_name = name.clone();

        let thread = thread::Builder::new()
            .name(format!("recv-{}", local_addr.port()))
            .spawn(move || receive_loop(socket, &thread_name, sender, metrics, thread_stop))?;

        info!(receiver = %name, local_addr = %local_addr, "Syslog receiver started");

        Ok(ReceiverHandle {
            name,
            local_addr,
            stop,
            thread: Some(thread),
        })
    }
}

/// Blocking receive loop shared by every socket strategy.
fn receive_loop(
    socket: UdpSocket,
    name: &str,
    sender: EventSender,
    metrics: Arc<PipelineMetrics>,
    stop: Arc<AtomicBool>,
) {
    let mut buf = [0u8; RECEIVE_BUFFER_SIZE];
    let mut consumer_gone_logged = false;

    while !stop.load(Ordering::SeqCst) {
        let len = match socket.recv(&mut buf) {
            Ok(len) => len,
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) =>
            {
                continue;
            }
            Err(e) => {
                error!(receiver = %name, error = %e, "Receive failed, receiver stopping");
                metrics.receiver_failed();
                return;
            }
        };

        metrics.datagram_received();
        let line = decode_datagram(&buf[..len]);

        if sender.push(line).is_err() {
            metrics.datagram_dropped();
            if !consumer_gone_logged {
                warn!(receiver = %name, "Processing loop has shut down; datagrams are being dropped");
                consumer_gone_logged = true;
            }
        }
    }

    debug!(receiver = %name, "Syslog receiver stopped");
}

/// Handle to a running receiver thread.
#[derive(Debug)]
pub struct ReceiverHandle {
    name: String,
    local_addr: SocketAddr,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ReceiverHandle {
    /// Description of the socket, e.g. `multicast 239.5.1.4:514`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Ask the thread to stop; takes effect within [`STOP_POLL_INTERVAL`].
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Whether the thread has exited (stopped or failed).
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Stop the thread and wait for it to exit.
    pub fn stop_and_join(mut self) {
        self.stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!(receiver = %self.name, "Receiver thread panicked");
            }
        }
    }
}
