//! Destination types for mqweb
//!
//! A destination is either a queue or a topic. Destination strings may carry
//! a kind marker (`topic://orders`, `topic:orders`, `queue://orders`,
//! `queue:orders`); without one the destination is a queue.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const QUEUE_MARKER: &str = "queue:";
const TOPIC_MARKER: &str = "topic:";

/// Kind of a destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationKind {
    /// Point-to-point
    Queue,
    /// Publish/subscribe
    Topic,
}

impl fmt::Display for DestinationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DestinationKind::Queue => write!(f, "queue"),
            DestinationKind::Topic => write!(f, "topic"),
        }
    }
}

/// A resolved destination
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Destination {
    Queue(String),
    Topic(String),
}

impl Destination {
    /// Create a queue destination
    pub fn queue(name: impl Into<String>) -> Self {
        Self::Queue(name.into())
    }

    /// Create a topic destination
    pub fn topic(name: impl Into<String>) -> Self {
        Self::Topic(name.into())
    }

    /// Parse a destination string, defaulting to a queue when no marker is present
    pub fn resolve(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            return Err(Error::InvalidDestination(input.to_string()));
        }

        let (kind, name) = if let Some(rest) = strip_marker(input, TOPIC_MARKER) {
            (DestinationKind::Topic, rest)
        } else if let Some(rest) = strip_marker(input, QUEUE_MARKER) {
            (DestinationKind::Queue, rest)
        } else {
            (DestinationKind::Queue, input)
        };

        if name.trim().is_empty() {
            return Err(Error::InvalidDestination(input.to_string()));
        }

        Ok(match kind {
            DestinationKind::Queue => Self::Queue(name.to_string()),
            DestinationKind::Topic => Self::Topic(name.to_string()),
        })
    }

    pub fn kind(&self) -> DestinationKind {
        match self {
            Destination::Queue(_) => DestinationKind::Queue,
            Destination::Topic(_) => DestinationKind::Topic,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Destination::Queue(name) | Destination::Topic(name) => name,
        }
    }

    pub fn is_queue(&self) -> bool {
        matches!(self, Destination::Queue(_))
    }

    pub fn is_topic(&self) -> bool {
        matches!(self, Destination::Topic(_))
    }
}

/// Case-insensitive marker match; `//` after the marker is optional.
fn strip_marker<'a>(input: &'a str, marker: &str) -> Option<&'a str> {
    let head = input.get(..marker.len())?;
    if !head.eq_ignore_ascii_case(marker) {
        return None;
    }
    let rest = &input[marker.len()..];
    Some(rest.strip_prefix("//").unwrap_or(rest))
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.kind(), self.name())
    }
}

impl FromStr for Destination {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::resolve(s)
    }
}

impl From<Destination> for String {
    fn from(destination: Destination) -> Self {
        destination.to_string()
    }
}

impl TryFrom<String> for Destination {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::resolve(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_name_is_queue() {
        let dest = Destination::resolve("orders").unwrap();
        assert_eq!(dest, Destination::queue("orders"));
        assert_eq!(dest.kind(), DestinationKind::Queue);
        assert_eq!(dest.name(), "orders");
    }

    #[test]
    fn test_topic_markers_are_stripped() {
        for input in ["topic:t1", "topic://t1", "TOPIC://t1"] {
            let dest = Destination::resolve(input).unwrap();
            assert_eq!(dest, Destination::topic("t1"), "input {input}");
        }
    }

    #[test]
    fn test_queue_marker_is_stripped() {
        assert_eq!(
            Destination::resolve("queue://q1").unwrap(),
            Destination::queue("q1")
        );
        assert_eq!(
            Destination::resolve("queue:q1").unwrap(),
            Destination::queue("q1")
        );
    }

    #[test]
    fn test_names_without_marker_are_unchanged() {
        for input in ["a.b.c", "topics", "my topic:x", "q-1/2"] {
            let dest = Destination::resolve(input).unwrap();
            assert!(dest.is_queue());
            assert_eq!(dest.name(), input);
        }
    }

    #[test]
    fn test_empty_input_is_rejected() {
        for input in ["", "   ", "topic:", "topic://", "queue://"] {
            assert!(
                matches!(Destination::resolve(input), Err(Error::InvalidDestination(_))),
                "input {input:?}"
            );
        }
    }

    #[test]
    fn test_display_is_qualified() {
        assert_eq!(Destination::topic("t1").to_string(), "topic://t1");
        assert_eq!(Destination::queue("q1").to_string(), "queue://q1");
    }

    #[test]
    fn test_serde_uses_qualified_string() {
        let json = serde_json::to_string(&Destination::topic("prices")).unwrap();
        assert_eq!(json, "\"topic://prices\"");

        let parsed: Destination = serde_json::from_str("\"replies\"").unwrap();
        assert_eq!(parsed, Destination::queue("replies"));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        /// Names that do not themselves start with `/` or a kind marker
        fn plain_name() -> impl Strategy<Value = String> {
            "[A-Za-z0-9._-][A-Za-z0-9._/ -]{0,30}"
        }

        proptest! {
            #[test]
            fn topic_marker_is_stripped(
                marker in prop::sample::select(vec!["topic:", "topic://", "TOPIC:", "Topic://", "tOpIc:"]),
                name in plain_name(),
            ) {
                let dest = Destination::resolve(&format!("{marker}{name}")).unwrap();
                prop_assert_eq!(dest, Destination::Topic(name));
            }

            #[test]
            fn queue_marker_is_stripped(
                marker in prop::sample::select(vec!["queue:", "queue://", "QUEUE:", "Queue://"]),
                name in plain_name(),
            ) {
                let dest = Destination::resolve(&format!("{marker}{name}")).unwrap();
                prop_assert_eq!(dest, Destination::Queue(name));
            }

            #[test]
            fn unmarked_input_is_queue_with_name_unchanged(input in "\\PC{1,40}") {
                let lower = input.to_ascii_lowercase();
                prop_assume!(!input.trim().is_empty());
                prop_assume!(!lower.starts_with(TOPIC_MARKER) && !lower.starts_with(QUEUE_MARKER));

                let dest = Destination::resolve(&input).unwrap();
                prop_assert!(dest.is_queue());
                prop_assert_eq!(dest.name(), input.as_str());
            }

            #[test]
            fn blank_input_is_rejected(input in "[ \\t]{0,8}") {
                prop_assert!(matches!(
                    Destination::resolve(&input),
                    Err(Error::InvalidDestination(_))
                ));
            }
        }
    }
}
