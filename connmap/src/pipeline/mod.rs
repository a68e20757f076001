//! Processing loop: the single consumer of the event queue.
//!
//! ```text
//!          ┌──────────────────┐  push   ┌──────────────────────┐
//!          │  WaitForWork     │◄────────│ receivers (wake)     │
//!          └────────┬─────────┘         └──────────────────────┘
//!                   │ batch
//!                   ▼
//!          ┌──────────────────┐
//!          │ DrainAndProcess  │── per line: classify → geolocate → bucketize → store
//!          └────────┬─────────┘
//!                   │ interrupted / disconnected
//!                   ▼
//!          ┌──────────────────┐
//!          │    Shutdown      │  thread exits, store stops updating
//!          └──────────────────┘
//! ```
//!
//! The loop wakes once per batch, not once per line, and drains the whole
//! queue before waiting again. Only an interruption of its own wait is
//! terminal; every per-line failure is contained in [`EventProcessor`].

mod processor;

pub use processor::{EventProcessor, LineOutcome};

use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, error, info};

use crate::queue::{EventQueue, QueueInterrupter, ShutdownReason};
use crate::telemetry::PipelineMetrics;

/// States of the processing loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    WaitForWork,
    DrainAndProcess,
    Shutdown(ShutdownReason),
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::WaitForWork => write!(f, "WAIT_FOR_WORK"),
            LoopState::DrainAndProcess => write!(f, "DRAIN_AND_PROCESS"),
            LoopState::Shutdown(reason) => write!(f, "SHUTDOWN ({})", reason),
        }
    }
}

/// Starts the processing loop thread.
pub struct ProcessingLoop;

impl ProcessingLoop {
    /// Spawn the consumer thread.
    ///
    /// # Arguments
    ///
    /// * `processor` - Per-line pipeline
    /// * `queue` - Consumer end of the event queue
    /// * `interrupter` - Kept by the returned handle to stop the loop
    /// * `metrics` - Shared pipeline counters
    pub fn spawn(
        processor: EventProcessor,
        queue: EventQueue,
        interrupter: QueueInterrupter,
        metrics: Arc<PipelineMetrics>,
    ) -> std::io::Result<ProcessorHandle> {
        metrics.set_processor_running(true);
        let thread_metrics = Arc::clone(&metrics);

        let thread = thread::Builder::new()
            .name("processing-loop".to_string())
            .spawn(move || {
                let reason = run(&processor, queue);
                thread_metrics.set_processor_running(false);
                reason
            });

        let thread = match thread {
            Ok(thread) => thread,
            Err(e) => {
                metrics.set_processor_running(false);
                return Err(e);
            }
        };

        info!("Processing loop started");
        Ok(ProcessorHandle {
            interrupter,
            thread: Some(thread),
        })
    }
}

/// Run the loop on the current thread until shutdown.
///
/// Returns why the loop stopped.
pub fn run(processor: &EventProcessor, mut queue: EventQueue) -> ShutdownReason {
    let mut state = LoopState::WaitForWork;

    loop {
        debug_assert_eq!(state, LoopState::WaitForWork);
        let batch = queue.wait_and_drain();

        state = LoopState::DrainAndProcess;
        if !batch.lines.is_empty() {
            debug!(lines = batch.lines.len(), %state, "Processing batch");
        }
        for line in &batch.lines {
            processor.process_line(line);
        }

        match batch.shutdown {
            Some(reason) => {
                state = LoopState::Shutdown(reason);
                queue.close();
                let dropped = queue.drain_all().lines.len();
                error!(
                    %state,
                    dropped_lines = dropped,
                    "Processing loop stopped; the map will no longer update"
                );
                return reason;
            }
            None => state = LoopState::WaitForWork,
        }
    }
}

/// Handle to the running processing loop.
#[derive(Debug)]
pub struct ProcessorHandle {
    interrupter: QueueInterrupter,
    thread: Option<JoinHandle<ShutdownReason>>,
}

impl ProcessorHandle {
    /// Whether the loop thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Interrupt the loop's wait. Lines already queued are processed first.
    pub fn interrupt(&self) {
        self.interrupter.interrupt();
    }

    /// Interrupt the loop and wait for it to exit.
    ///
    /// Returns the shutdown reason, or `None` if the thread panicked or was
    /// already joined.
    pub fn shutdown(mut self) -> Option<ShutdownReason> {
        self.interrupt();
        let thread = self.thread.take()?;
        match thread.join() {
            Ok(reason) => Some(reason),
            Err(_) => {
                error!("Processing loop thread panicked");
                None
            }
        }
    }
}
