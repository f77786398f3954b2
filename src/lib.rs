//! # meshwatch
//!
//! A terminal viewer and library for service-mesh topology graphs.
//!
//! The crate turns the loosely-typed graph payload served by a mesh console
//! into a validated topology, classifies and aggregates it, and drives an
//! interactive drawer with per-entity traffic and time-series metrics.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                           Application                            │
//! │  ┌─────────┐    ┌──────────┐    ┌──────────┐    ┌─────────────┐  │
//! │  │ source  │───▶│  graph   │───▶│  render  │───▶│     ui      │  │
//! │  │ (input) │    │(normalize│    │ (layout, │    │  (ratatui)  │  │
//! │  └─────────┘    │ classify)│    │   taps)  │    └─────────────┘  │
//! │       ▲         └──────────┘    └────┬─────┘                     │
//! │       │                              │ tap                       │
//! │  File | Channel | Http               ▼                           │
//! │                               ┌────────────┐    ┌────────────┐   │
//! │                               │ selection  │───▶│  metrics   │   │
//! │                               └────────────┘    │(query,fetch│   │
//! │                                                 │ convert)   │   │
//! │                                                 └────────────┘   │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`source`]**: where graph payloads come from ([`GraphSource`] trait)
//!   with file polling, channel and HTTP implementations
//! - **[`graph`]**: payload normalization, node classification, health and
//!   traffic aggregation
//! - **[`metrics`]**: metrics query building, fetch coordination and series
//!   conversion
//! - **[`render`]**: the [`GraphRenderer`] port with terminal and headless
//!   implementations
//! - **[`selection`]**: the detail drawer state machine
//! - **[`ui`]**: terminal rendering using ratatui
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Watch a namespace through the mesh console
//! meshwatch --endpoint http://localhost:20001/kiali/api/namespaces/graph -n bookinfo
//!
//! # Replay a saved graph
//! meshwatch --file graph.json
//! ```
//!
//! ### As a library
//!
//! ```
//! use meshwatch::graph::normalize;
//! use meshwatch_types::GraphPayload;
//!
//! let payload = GraphPayload::builder()
//!     .node("pp", |n| n.node_type("app").namespace("bookinfo").app("productpage"))
//!     .node("reviews", |n| n.node_type("service").namespace("bookinfo").service("reviews"))
//!     .edge("e1", "pp", "reviews", |e| e.http("12.5", "0"))
//!     .build();
//!
//! let normalized = normalize(&payload);
//! assert_eq!(normalized.graph.edge_count(), 1);
//! ```
//!
//! ### Driving the app without a terminal
//!
//! ```
//! use meshwatch::{App, ChannelSource, HeadlessRenderer, RenderTheme, Thresholds};
//! use meshwatch_client::GraphQuery;
//!
//! let (_tx, source) = ChannelSource::create("bus");
//! let mut app = App::new(
//!     Box::new(source),
//!     GraphQuery::new(["bookinfo"]),
//!     HeadlessRenderer::new(),
//!     RenderTheme::dark(),
//!     Thresholds::default(),
//! )
//! .unwrap();
//! app.reload_data().unwrap();
//! ```

pub mod app;
pub mod duration;
pub mod events;
pub mod export;
pub mod graph;
pub mod metrics;
pub mod render;
pub mod selection;
pub mod settings;
pub mod source;
pub mod ui;

// Re-export main types for convenience
pub use app::{App, GraphState};
pub use graph::{normalize, HealthStatus, NormalizedGraph, Thresholds, TopologyGraph};
pub use metrics::{MetricsCoordinator, MetricsFetcher, MetricsPanel, MetricsRequest};
pub use render::{GraphRenderer, HeadlessRenderer, RenderTheme, TerminalRenderer};
pub use selection::{SelectionController, SelectionEvent, Transition};
pub use settings::Settings;
pub use source::{ChannelSource, FileSource, GraphFetcher, GraphSource, HttpSource};
