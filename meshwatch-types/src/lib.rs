//! # meshwatch-types
//!
//! Wire types for service-mesh observability. This crate describes the two
//! payloads meshwatch consumes from a mesh console backend: the topology
//! graph (`elements.nodes[]` / `elements.edges[]`, each wrapped in `{data}`)
//! and the per-entity metrics response (metric family -> series).
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Types work without any serialization framework
//! - **Optional serialization**: Enable the `serde` feature to decode backend JSON
//! - **Lossless**: Raw fields are kept as the backend sends them (rates stay
//!   strings); interpretation happens in the engine, not here
//! - **Ergonomic builders**: Fluent API for constructing fixture graphs
//!
//! ## Example
//!
//! ```rust
//! use meshwatch_types::GraphPayload;
//!
//! let payload = GraphPayload::builder()
//!     .node("reviews", |n| n.node_type("service").namespace("bookinfo").service("reviews"))
//!     .node("productpage", |n| {
//!         n.node_type("app").namespace("bookinfo").app("productpage").workload("productpage-v1")
//!     })
//!     .edge("e0", "productpage", "reviews", |e| e.http("12.5", "0.4"))
//!     .build();
//!
//! assert_eq!(payload.node_count(), 2);
//! assert_eq!(payload.edge_count(), 1);
//! ```

mod graph;
mod metrics;
mod number;

pub use graph::*;
pub use metrics::*;
pub use number::*;
