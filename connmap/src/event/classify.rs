//! Line classifier for connection built/teardown messages.

use std::sync::OnceLock;

use regex::Regex;

use super::ParsedEvent;

/// Which message IDs count as connection lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventShapes {
    /// TCP built/teardown only (302013/302014).
    #[default]
    Tcp,
    /// TCP and UDP built/teardown (302013-302016).
    TcpAndUdp,
}

impl EventShapes {
    /// Select shapes from the `include_udp` configuration flag.
    pub fn from_include_udp(include_udp: bool) -> Self {
        if include_udp {
            EventShapes::TcpAndUdp
        } else {
            EventShapes::Tcp
        }
    }
}

/// Open/close pattern pair.
struct ShapePatterns {
    open: Regex,
    close: Regex,
}

/// Build an anchored pattern for a message ID marker.
///
/// Pattern breakdown:
/// - `^.*MARKER`   - message ID anywhere before the address clause
/// - `.+outside:`  - greedy, so the last `outside:` clause wins
/// - `(.+?)/`      - address token up to the first `/` (port separator)
/// - `.*$`         - rest of the line
fn shape_pattern(marker: &str) -> Regex {
    Regex::new(&format!(r"^.*{}.+outside:(.+?)/.*$", marker)).unwrap()
}

fn tcp_patterns() -> &'static ShapePatterns {
    static PATTERNS: OnceLock<ShapePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| ShapePatterns {
        open: shape_pattern("302013"),
        close: shape_pattern("302014"),
    })
}

fn tcp_udp_patterns() -> &'static ShapePatterns {
    static PATTERNS: OnceLock<ShapePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| ShapePatterns {
        open: shape_pattern("30201[35]"),
        close: shape_pattern("30201[46]"),
    })
}

/// Classifies raw syslog lines into [`ParsedEvent`]s.
///
/// Matching is on the whole line, so a marker appearing somewhere without a
/// following `outside:ADDRESS/PORT` clause is not an event.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier {
    shapes: EventShapes,
}

impl Classifier {
    /// Create a classifier for the given event shapes.
    pub fn new(shapes: EventShapes) -> Self {
        Self { shapes }
    }

    /// The shapes this classifier recognizes.
    pub fn shapes(&self) -> EventShapes {
        self.shapes
    }

    /// Classify a single line.
    ///
    /// Lines that match neither shape are [`ParsedEvent::Unrecognized`]. This is
    /// the common case: the syslog stream carries many unrelated message types.
    ///
    /// # Examples
    ///
    /// ```
    /// use connmap::event::{Classifier, ParsedEvent};
    ///
    /// let classifier = Classifier::default();
    /// let line = "%ASA-6-302013: Built inbound TCP connection 7 for outside:93.184.216.34/443 (93.184.216.34/443) to inside:10.1.1.5/51234 (10.1.1.5/51234)";
    /// assert_eq!(classifier.classify(line), ParsedEvent::Open("93.184.216.34".to_string()));
    ///
    /// assert_eq!(classifier.classify("%ASA-5-111008: User 'enable_15' executed the 'write memory' command."), ParsedEvent::Unrecognized);
    /// ```
    pub fn classify(&self, line: &str) -> ParsedEvent {
        let patterns = match self.shapes {
            EventShapes::Tcp => tcp_patterns(),
            EventShapes::TcpAndUdp => tcp_udp_patterns(),
        };

        if let Some(captures) = patterns.open.captures(line) {
            return ParsedEvent::Open(captures[1].to_string());
        }
        if let Some(captures) = patterns.close.captures(line) {
            return ParsedEvent::Close(captures[1].to_string());
        }
        ParsedEvent::Unrecognized
    }
}
