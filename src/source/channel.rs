//! Channel-based graph source.
//!
//! Receives graph payloads via a tokio watch channel. Useful when another
//! task (or a test) produces the snapshots.

use meshwatch_types::GraphPayload;
use tokio::sync::watch;

use super::GraphSource;

/// A source fed through a watch channel.
///
/// Only the newest payload is kept; a slow UI loop skips intermediate ones.
///
/// # Example
///
/// ```
/// use meshwatch::source::{ChannelSource, GraphSource};
/// use meshwatch_types::GraphPayload;
///
/// let (tx, mut source) = ChannelSource::create("fixture");
/// tx.send(GraphPayload::builder().node("a", |n| n.app("a")).build()).unwrap();
/// assert_eq!(source.poll().unwrap().node_count(), 1);
/// ```
#[derive(Debug)]
pub struct ChannelSource {
    receiver: watch::Receiver<GraphPayload>,
    description: String,
    initial_returned: bool,
}

impl ChannelSource {
    pub fn new(receiver: watch::Receiver<GraphPayload>, source_description: &str) -> Self {
        Self {
            receiver,
            description: format!("channel: {}", source_description),
            initial_returned: false,
        }
    }

    /// Create a `(sender, source)` pair.
    pub fn create(source_description: &str) -> (watch::Sender<GraphPayload>, Self) {
        let (tx, rx) = watch::channel(GraphPayload::default());
        (tx, Self::new(rx, source_description))
    }
}

impl GraphSource for ChannelSource {
    fn poll(&mut self) -> Option<GraphPayload> {
        if !self.initial_returned {
            self.initial_returned = true;
            self.receiver.mark_changed();
        }

        if self.receiver.has_changed().unwrap_or(false) {
            Some(self.receiver.borrow_and_update().clone())
        } else {
            None
        }
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        None
    }

    fn refresh(&mut self) {
        self.receiver.mark_changed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_source_poll() {
        let (tx, mut source) = ChannelSource::create("test");

        // The initial empty payload is delivered once.
        assert!(source.poll().unwrap().is_empty());
        assert!(source.poll().is_none());

        tx.send(
            GraphPayload::builder()
                .node("a", |n| n.node_type("app").app("a"))
                .node("b", |n| n.node_type("service").service("b"))
                .build(),
        )
        .unwrap();

        assert_eq!(source.poll().unwrap().node_count(), 2);
        assert!(source.poll().is_none());

        source.refresh();
        assert_eq!(source.poll().unwrap().node_count(), 2);
        assert_eq!(source.description(), "channel: test");
    }
}
