//! Connection lifecycle events from Cisco ASA syslog.
//!
//! Classifies raw syslog lines into connection open/close events and extracts
//! the remote (outside interface) address.
//!
//! Relevant message IDs:
//! - `%ASA-6-302013`: Built {inbound|outbound} TCP connection
//! - `%ASA-6-302014`: Teardown TCP connection
//! - `%ASA-6-302015`: Built {inbound|outbound} UDP connection
//! - `%ASA-6-302016`: Teardown UDP connection
//!
//! Example line:
//!
//! ```text
//! <166>%ASA-6-302013: Built inbound TCP connection 4242 for outside:93.184.216.34/443 (93.184.216.34/443) to inside:10.1.1.5/51234 (10.1.1.5/51234)
//! ```

mod classify;

pub use classify::{Classifier, EventShapes};

use std::fmt;

/// A classified syslog line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedEvent {
    /// A connection was built to/from `address`.
    Open(String),
    /// A connection to/from `address` was torn down.
    Close(String),
    /// Any other message type; carries no information for the map.
    Unrecognized,
}

impl fmt::Display for ParsedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParsedEvent::Open(address) => write!(f, "open {}", address),
            ParsedEvent::Close(address) => write!(f, "close {}", address),
            ParsedEvent::Unrecognized => write!(f, "unrecognized"),
        }
    }
}
