//! # meshwatch-client
//!
//! Transport for fetching service-mesh topology graphs and per-entity
//! metrics from a mesh console backend.
//!
//! The crate always provides the request-side types ([`GraphQuery`]) and the
//! error taxonomy ([`ClientError`]). The HTTP client itself is behind the
//! `http` feature so the engine can be built and tested without a network
//! stack.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "http")]
//! # async fn demo() -> Result<(), meshwatch_client::ClientError> {
//! use meshwatch_client::{GraphQuery, MeshClient};
//! use std::time::Duration;
//!
//! let client = MeshClient::builder()
//!     .graph_endpoint("http://localhost:20001/kiali/api/namespaces/graph")
//!     .timeout(Duration::from_secs(10))
//!     .build()?;
//!
//! let query = GraphQuery::new(["bookinfo"]).with_duration(Duration::from_secs(300));
//! let payload = client.fetch_graph(&query).await?;
//! println!("{} nodes", payload.node_count());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod query;

#[cfg(feature = "http")]
pub mod client;

pub use error::ClientError;
pub use query::{GraphQuery, GraphType, DEFAULT_APPENDERS};

#[cfg(feature = "http")]
pub use client::{MeshClient, MeshClientBuilder};

// Re-export types for convenience
pub use meshwatch_types::{GraphPayload, MetricsResponse};
