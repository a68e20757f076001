//! Event queue between datagram receivers and the processing loop.
//!
//! Any number of producer threads push raw lines; exactly one consumer waits
//! for work and drains everything queued before waiting again.
//!
//! ```text
//! Receiver ──push──┐
//!                  ├──► unbounded channel ──► EventQueue::wait_and_drain()
//! Receiver ──push──┘          ▲
//!                             │
//!                     QueueInterrupter::interrupt()
//! ```
//!
//! Ordering is FIFO in receipt order. Lines from different producers are
//! interleaved in the order the channel accepted them, not the order their
//! senders emitted them. The queue is unbounded: the expected syslog rate of
//! a single firewall is far below what one consumer drains.

use std::fmt;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TryRecvError};

/// Errors when pushing onto the queue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The consumer has shut down and dropped its end of the queue.
    #[error("Event queue consumer has shut down")]
    ConsumerGone,
}

/// A message on the channel: a raw line or a wake-with-interrupt.
#[derive(Debug)]
enum Envelope {
    Line(String),
    Interrupt,
}

/// Why the consumer stopped waiting for work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The consumer's wait was interrupted.
    Interrupted,
    /// Every producer and interrupter handle was dropped.
    Disconnected,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Interrupted => write!(f, "interrupted while waiting"),
            ShutdownReason::Disconnected => write!(f, "all producers disconnected"),
        }
    }
}

/// Everything drained by one wake of the consumer.
#[derive(Debug, Default)]
pub struct Batch {
    /// Lines in receipt order.
    pub lines: Vec<String>,
    /// Set when the consumer must stop after processing `lines`.
    pub shutdown: Option<ShutdownReason>,
}

/// Producer handle. Cheap to clone; one per receiver thread.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl EventSender {
    /// Append a line to the tail of the queue and wake the consumer.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::ConsumerGone`] once the consumer has shut down.
    pub fn push(&self, line: impl Into<String>) -> Result<(), QueueError> {
        self.tx
            .send(Envelope::Line(line.into()))
            .map_err(|_| QueueError::ConsumerGone)
    }

    /// Whether the consumer has shut down.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Handle that interrupts the consumer's wait.
#[derive(Debug, Clone)]
pub struct QueueInterrupter {
    tx: mpsc::UnboundedSender<Envelope>,
}

impl QueueInterrupter {
    /// Interrupt the consumer.
    ///
    /// Lines pushed before the interrupt are still delivered; anything pushed
    /// after it is dropped with the consumer. Returns `false` if the consumer
    /// had already shut down.
    pub fn interrupt(&self) -> bool {
        self.tx.send(Envelope::Interrupt).is_ok()
    }
}

/// Consumer end of the queue.
#[derive(Debug)]
pub struct EventQueue {
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl EventQueue {
    /// Create a queue, returning the consumer, a producer handle and an interrupter.
    pub fn new() -> (Self, EventSender, QueueInterrupter) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self { rx },
            EventSender { tx: tx.clone() },
            QueueInterrupter { tx },
        )
    }

    /// Number of messages currently queued.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Block until work arrives, then remove and return everything queued.
    ///
    /// Must be called from a plain thread, not from inside an async runtime.
    pub fn wait_and_drain(&mut self) -> Batch {
        let mut batch = Batch::default();

        match self.rx.blocking_recv() {
            Some(Envelope::Line(line)) => batch.lines.push(line),
            Some(Envelope::Interrupt) => {
                batch.shutdown = Some(ShutdownReason::Interrupted);
                return batch;
            }
            None => {
                batch.shutdown = Some(ShutdownReason::Disconnected);
                return batch;
            }
        }

        self.drain_into(&mut batch);
        batch
    }

    /// Remove and return everything queued without blocking.
    pub fn drain_all(&mut self) -> Batch {
        let mut batch = Batch::default();
        self.drain_into(&mut batch);
        batch
    }

    fn drain_into(&mut self, batch: &mut Batch) {
        loop {
            match self.rx.try_recv() {
                Ok(Envelope::Line(line)) => batch.lines.push(line),
                Ok(Envelope::Interrupt) => {
                    batch.shutdown = Some(ShutdownReason::Interrupted);
                    break;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    batch.shutdown = Some(ShutdownReason::Disconnected);
                    break;
                }
            }
        }
    }

    /// Stop accepting pushes; producers see [`QueueError::ConsumerGone`].
    pub fn close(&mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_drain_preserves_order() {
        let (mut queue, sender, _interrupter) = EventQueue::new();
        for i in 0..5 {
            sender.push(format!("line {}", i)).unwrap();
        }

        let batch = queue.wait_and_drain();
        assert_eq!(
            batch.lines,
            vec!["line 0", "line 1", "line 2", "line 3", "line 4"]
        );
        assert!(batch.shutdown.is_none());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_wait_blocks_until_push() {
        let (mut queue, sender, _interrupter) = EventQueue::new();

        let producer = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(50));
            sender.push("late line").unwrap();
        });

        let batch = queue.wait_and_drain();
        assert_eq!(batch.lines, vec!["late line"]);
        producer.join().unwrap();
    }

    #[test]
    fn test_interrupt_delivers_earlier_lines() {
        let (mut queue, sender, interrupter) = EventQueue::new();
        sender.push("before").unwrap();
        assert!(interrupter.interrupt());
        sender.push("after").unwrap();

        let batch = queue.wait_and_drain();
        assert_eq!(batch.lines, vec!["before"]);
        assert_eq!(batch.shutdown, Some(ShutdownReason::Interrupted));
    }

    #[test]
    fn test_interrupt_while_empty() {
        let (mut queue, _sender, interrupter) = EventQueue::new();
        interrupter.interrupt();

        let batch = queue.wait_and_drain();
        assert!(batch.lines.is_empty());
        assert_eq!(batch.shutdown, Some(ShutdownReason::Interrupted));
    }

    #[test]
    fn test_disconnect_when_all_handles_dropped() {
        let (mut queue, sender, interrupter) = EventQueue::new();
        sender.push("last").unwrap();
        drop(sender);
        drop(interrupter);

        let batch = queue.wait_and_drain();
        assert_eq!(batch.lines, vec!["last"]);
        assert_eq!(batch.shutdown, Some(ShutdownReason::Disconnected));
    }

    #[test]
    fn test_push_after_close_fails() {
        let (mut queue, sender, _interrupter) = EventQueue::new();
        queue.close();
        assert_eq!(sender.push("x"), Err(QueueError::ConsumerGone));
        assert!(sender.is_closed());
    }

    #[test]
    fn test_concurrent_producers_lose_nothing() {
        let (mut queue, sender, _interrupter) = EventQueue::new();
        const PER_PRODUCER: usize = 500;

        let handles: Vec<_> = ["a", "b"]
            .iter()
            .map(|tag| {
                let sender = sender.clone();
                let tag = tag.to_string();
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        sender.push(format!("{}-{}", tag, i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.len(), 2 * PER_PRODUCER);
        let batch = queue.drain_all();
        assert_eq!(batch.lines.len(), 2 * PER_PRODUCER);
        assert!(queue.is_empty());

        // Per-producer order survives interleaving
        for tag in ["a", "b"] {
            let indices: Vec<usize> = batch
                .lines
                .iter()
                .filter_map(|line| line.strip_prefix(&format!("{}-", tag)))
                .map(|n| n.parse().unwrap())
                .collect();
            assert_eq!(indices, (0..PER_PRODUCER).collect::<Vec<_>>());
        }
    }
}
