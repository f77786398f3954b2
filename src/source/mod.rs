//! Graph sources.
//!
//! A source hands the UI loop raw graph payloads without blocking it.
//! Three backends ship:
//!
//! - [`FileSource`] polls a JSON file by modification time
//! - [`ChannelSource`] receives payloads pushed through a tokio watch channel
//! - [`HttpSource`] fetches from the mesh console on a refresh interval

mod channel;
mod file;
mod http;

pub use channel::ChannelSource;
pub use file::FileSource;
pub use http::{GraphFetcher, HttpSource};

use std::fmt::Debug;

use meshwatch_client::GraphQuery;
use meshwatch_types::GraphPayload;

/// Trait for receiving topology snapshots from various sources.
///
/// # Example
///
/// ```
/// use meshwatch::source::{FileSource, GraphSource};
///
/// let mut source = FileSource::new("graph.json");
/// if let Some(payload) = source.poll() {
///     println!("Got {} nodes", payload.node_count());
/// }
/// ```
pub trait GraphSource: Send + Debug {
    /// Poll for the latest payload.
    ///
    /// Returns `Some(payload)` if new data is available, `None` otherwise.
    /// This method must not block.
    fn poll(&mut self) -> Option<GraphPayload>;

    /// Human-readable description, shown in the status bar.
    fn description(&self) -> &str;

    /// The error from the last fetch or read, if it failed.
    fn error(&self) -> Option<&str>;

    /// Change the scope of future payloads.
    ///
    /// Sources that cannot be rescoped ignore this.
    fn set_query(&mut self, _query: &GraphQuery) {}

    /// Ask for a fresh payload as soon as possible.
    fn refresh(&mut self) {}
}
