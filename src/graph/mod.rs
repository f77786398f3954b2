//! Topology graph normalization and analysis.
//!
//! ## Submodules
//!
//! - [`model`]: Normalized types ([`TopologyGraph`], [`Node`], [`Edge`])
//! - [`adapter`]: Raw payload -> [`TopologyGraph`] with a data-quality report
//! - [`classify`]: Badges, titles, flags and box membership
//! - [`traffic`]: Rate and error aggregation for detail panels
//! - [`health`]: Error-rate [`Thresholds`] and [`HealthStatus`]
//!
//! ## Data Flow
//!
//! ```text
//! GraphPayload (raw JSON)
//!        │
//!        ▼
//! adapter::normalize()
//!        │
//!        ├──▶ TopologyGraph (shared as Arc)
//!        │        ├──▶ classify::classify()      badges / titles
//!        │        └──▶ traffic::node_traffic()   detail panel figures
//!        │
//!        └──▶ NormalizeReport (dropped edges, malformed numbers)
//! ```

pub mod adapter;
pub mod classify;
pub mod health;
pub mod model;
pub mod traffic;

pub use adapter::{normalize, DataQualityWarning, NormalizeReport, NormalizedGraph};
pub use classify::{classify, classify_id, flags, member_edges, Badge, Classification, MemberEdges};
pub use health::{HealthStatus, Thresholds};
pub use model::{
    BoxKind, Edge, EdgeTraffic, Node, NodeFlags, NodeKind, Protocol, ProtocolRates,
    RequestRates, ResponseBreakdown, ServiceEntry, TopologyGraph,
};
pub use traffic::{
    aggregate, edge_summary, node_traffic, DirectionalTraffic, EdgeSummary, FlagRow, HostRow,
    NodeTraffic, TrafficSummary,
};
