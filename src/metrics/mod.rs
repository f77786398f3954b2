//! Per-entity metrics: query building, fetching and series conversion.
//!
//! ## Submodules
//!
//! - [`query`]: Selected node/edge -> [`MetricsRequest`] and its request path
//! - [`window`]: The [`TimeWindow`] a query covers
//! - [`convert`]: Raw response -> [`MetricsSeries`]
//! - [`fetch`]: [`MetricsCoordinator`], which runs one fetch per selection

pub mod convert;
pub mod fetch;
pub mod query;
pub mod window;

pub use convert::{convert, convert_response, LabelResolver, MeshLabels, MetricPoint, MetricsSeries};
pub use fetch::{FetchOutcome, MetricsCoordinator, MetricsFetcher, MetricsPanel};
pub use query::{
    build, filters_for, Direction, EntityKind, MetricsRequest, MetricsTarget, NoQueryReason,
    PeerFilter, QueryOptions, QuerySpec, Reporter,
};
pub use window::TimeWindow;
