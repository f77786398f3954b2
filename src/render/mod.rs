//! The renderer port.
//!
//! The engine never drives a concrete drawing surface directly. It hands
//! a [`GraphRenderer`] a full element set with styling hints and listens
//! for taps:
//!
//! ```text
//!            mount(theme)
//!   engine ──set_elements(RenderElements)──▶ GraphRenderer ──▶ surface
//!          ──relayout(Viewport)───────────▶   (terminal | headless)
//!          ◀──────────── on_tap(TapTarget) ──┘
//! ```
//!
//! Two renderers ship: [`TerminalRenderer`] draws into the ratatui
//! terminal, [`HeadlessRenderer`] records calls for tests.

pub mod debounce;
pub mod headless;
pub mod layout;
pub mod terminal;
pub mod theme;

pub use debounce::Debouncer;
pub use headless::HeadlessRenderer;
pub use layout::{layered, Layout, Position};
pub use terminal::{Row, TerminalRenderer};
pub use theme::RenderTheme;

use thiserror::Error;

use crate::graph::{
    classify, member_edges, Badge, Edge, HealthStatus, Node, Protocol, Thresholds, TopologyGraph,
};

/// The normalized entity a user tapped.
#[derive(Debug, Clone, PartialEq)]
pub enum TapTarget {
    Node(Node),
    Edge(Edge),
}

impl TapTarget {
    pub fn id(&self) -> &str {
        match self {
            TapTarget::Node(node) => &node.id,
            TapTarget::Edge(edge) => &edge.id,
        }
    }
}

/// Callback invoked once per tap.
pub type TapHandler = Box<dyn FnMut(TapTarget) + Send>;

/// Drawing area in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub width: u16,
    pub height: u16,
}

impl Viewport {
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("renderer is not mounted")]
    NotMounted,
    #[error("renderer is already mounted")]
    AlreadyMounted,
}

/// A node with its styling hints.
#[derive(Debug, Clone, PartialEq)]
pub struct StyledNode {
    pub node: Node,
    pub badge: Badge,
    pub title: String,
    /// Worst health of the node's inbound traffic.
    pub health: HealthStatus,
    /// Box the node is drawn inside, if any.
    pub group: Option<String>,
    /// Idle nodes are drawn dimmed.
    pub dimmed: bool,
}

/// An edge with its styling hints.
#[derive(Debug, Clone, PartialEq)]
pub struct StyledEdge {
    pub edge: Edge,
    pub protocol: Protocol,
    pub health: HealthStatus,
    /// Short traffic label, e.g. `3.50rps 10.0%`.
    pub label: String,
}

/// A complete element set for one snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderElements {
    pub nodes: Vec<StyledNode>,
    pub edges: Vec<StyledEdge>,
}

impl RenderElements {
    /// Style every node and edge of a snapshot.
    pub fn from_graph(graph: &TopologyGraph, thresholds: &Thresholds) -> Self {
        let edges: Vec<StyledEdge> = graph
            .edges()
            .iter()
            .map(|edge| StyledEdge {
                edge: edge.clone(),
                protocol: edge.protocol(),
                health: thresholds.edge_status(&edge.traffic.rates),
                label: edge_label(edge),
            })
            .collect();

        let nodes = graph
            .nodes()
            .iter()
            .map(|node| {
                let classification = classify(node);
                StyledNode {
                    node: node.clone(),
                    badge: classification.badge,
                    title: classification.title,
                    health: node_health(graph, node, thresholds),
                    group: node.parent_id.clone().filter(|p| graph.contains_node(p)),
                    dimmed: node.flags.is_dead,
                }
            })
            .collect();

        Self { nodes, edges }
    }

    pub fn node(&self, id: &str) -> Option<&StyledNode> {
        self.nodes.iter().find(|n| n.node.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&StyledEdge> {
        self.edges.iter().find(|e| e.edge.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn node_health(graph: &TopologyGraph, node: &Node, thresholds: &Thresholds) -> HealthStatus {
    let status = |edge: &Edge| thresholds.edge_status(&edge.traffic.rates);
    if node.is_box() {
        member_edges(node, graph.nodes(), graph.edges())
            .incoming
            .into_iter()
            .map(status)
            .max()
            .unwrap_or(HealthStatus::Healthy)
    } else {
        graph
            .inbound_edges(&node.id)
            .map(status)
            .max()
            .unwrap_or(HealthStatus::Healthy)
    }
}

/// Short traffic label for an edge.
pub fn edge_label(edge: &Edge) -> String {
    match edge.traffic.rates.request_rates() {
        Some(rates) => match (rates.total, rates.error_pct) {
            (Some(total), Some(err)) if err > 0.0 => format!("{:.2}rps {:.1}%", total, err),
            (Some(total), _) => format!("{:.2}rps", total),
            (None, _) => "-".to_string(),
        },
        None => match edge.throughput {
            Some(bytes) => format!("tcp {}", format_bytes(bytes)),
            None => "tcp".to_string(),
        },
    }
}

/// Format a byte rate for display (e.g., 2048 -> "2.0KiB/s").
pub fn format_bytes(bytes_per_sec: f64) -> String {
    if bytes_per_sec >= 1024.0 * 1024.0 {
        format!("{:.1}MiB/s", bytes_per_sec / (1024.0 * 1024.0))
    } else if bytes_per_sec >= 1024.0 {
        format!("{:.1}KiB/s", bytes_per_sec / 1024.0)
    } else {
        format!("{:.0}B/s", bytes_per_sec)
    }
}

/// Lifecycle of a graph drawing surface.
pub trait GraphRenderer {
    /// Attach to the surface with the given theme.
    fn mount(&mut self, theme: &RenderTheme) -> Result<(), RenderError>;

    /// Replace the element set. Always a full snapshot, never a patch.
    fn set_elements(&mut self, elements: RenderElements) -> Result<(), RenderError>;

    /// Recompute positions for a new viewport.
    fn relayout(&mut self, viewport: Viewport) -> Result<(), RenderError>;

    /// Register the tap callback, replacing any previous one.
    fn on_tap(&mut self, handler: TapHandler);

    /// Detach from the surface and drop all elements.
    fn unmount(&mut self);
}
