//! Normalized topology types.
//!
//! Everything downstream of the adapter works on these types. Raw payload
//! quirks (string-encoded numbers, optional blocks, loosely-typed node
//! types) are resolved once, in [`super::adapter`], and never seen again.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// The kind of a topology node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Application,
    Service,
    ServiceEntry,
    Box,
    Workload,
    Unknown,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Application => "app",
            NodeKind::Service => "service",
            NodeKind::ServiceEntry => "serviceEntry",
            NodeKind::Box => "box",
            NodeKind::Workload => "workload",
            NodeKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a box node groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoxKind {
    App,
    Namespace,
    Cluster,
}

impl BoxKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "app" => Some(BoxKind::App),
            "namespace" => Some(BoxKind::Namespace),
            "cluster" => Some(BoxKind::Cluster),
            _ => None,
        }
    }
}

/// Traffic protocol of an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Protocol {
    Http,
    Grpc,
    Tcp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Grpc => "grpc",
            Protocol::Tcp => "tcp",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Some(Protocol::Http),
            "grpc" => Some(Protocol::Grpc),
            "tcp" => Some(Protocol::Tcp),
            _ => None,
        }
    }

    /// True for request-based protocols that carry rate and error figures.
    pub fn is_request_based(&self) -> bool {
        !matches!(self, Protocol::Tcp)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service entry details of a node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServiceEntry {
    pub node_label: Option<String>,
    pub location: Option<String>,
    pub hosts: Vec<String>,
}

/// Boolean markers carried by a node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeFlags {
    pub is_root: bool,
    pub is_gateway: bool,
    pub has_circuit_breaker: bool,
    pub has_missing_sidecar: bool,
    pub has_request_timeout: bool,
    /// Hostnames of the virtual service routing to this node, if any.
    pub virtual_service: Option<Vec<String>>,
    pub has_request_routing: bool,
    pub is_outside_mesh: bool,
    pub is_dead: bool,
}

impl NodeFlags {
    /// Human-readable labels for every flag that is set, in a fixed order.
    pub fn labels(&self) -> Vec<String> {
        let mut labels = Vec::new();
        if self.is_root {
            labels.push("Traffic Source".to_string());
        }
        if self.is_gateway {
            labels.push("Gateway".to_string());
        }
        if self.has_circuit_breaker {
            labels.push("Circuit Breaker".to_string());
        }
        if self.has_missing_sidecar {
            labels.push("Missing Sidecar".to_string());
        }
        if self.has_request_timeout {
            labels.push("Request Timeout".to_string());
        }
        if let Some(ref hosts) = self.virtual_service {
            if hosts.is_empty() {
                labels.push("Virtual Service".to_string());
            } else {
                labels.push(format!("Virtual Service ({})", hosts.join(", ")));
            }
        }
        if self.has_request_routing {
            labels.push("Request Routing".to_string());
        }
        if self.is_outside_mesh {
            labels.push("Outside Mesh".to_string());
        }
        if self.is_dead {
            labels.push("Idle".to_string());
        }
        labels
    }

    pub fn is_empty(&self) -> bool {
        self.labels().is_empty()
    }
}

/// A topology node.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub namespace: String,
    pub cluster: String,
    pub parent_id: Option<String>,
    pub display_name: String,
    pub app: Option<String>,
    pub service: Option<String>,
    pub workload: Option<String>,
    pub version: Option<String>,
    pub service_entry: Option<ServiceEntry>,
    pub box_kind: Option<BoxKind>,
    pub flags: NodeFlags,
}

impl Node {
    /// A bare node of the given kind, for tests and synthetic fixtures.
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            kind,
            namespace: String::new(),
            cluster: String::new(),
            parent_id: None,
            app: None,
            service: None,
            workload: None,
            version: None,
            service_entry: None,
            box_kind: None,
            flags: NodeFlags::default(),
        }
    }

    pub fn is_box(&self) -> bool {
        self.kind == NodeKind::Box
    }
}

/// Request rate and error percentage of an HTTP or gRPC edge.
///
/// `None` means the backend did not report the figure; malformed figures
/// have already been coerced to `Some(0.0)` by the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RequestRates {
    pub total: Option<f64>,
    pub error_pct: Option<f64>,
}

/// Protocol-specific traffic figures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProtocolRates {
    Http(RequestRates),
    Grpc(RequestRates),
    /// TCP edges carry no rate scalar.
    Tcp,
}

impl ProtocolRates {
    pub fn protocol(&self) -> Protocol {
        match self {
            ProtocolRates::Http(_) => Protocol::Http,
            ProtocolRates::Grpc(_) => Protocol::Grpc,
            ProtocolRates::Tcp => Protocol::Tcp,
        }
    }

    pub fn request_rates(&self) -> Option<&RequestRates> {
        match self {
            ProtocolRates::Http(r) | ProtocolRates::Grpc(r) => Some(r),
            ProtocolRates::Tcp => None,
        }
    }
}

/// Per-code breakdown of responses on an edge.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResponseBreakdown {
    /// Response flag -> percentage.
    pub flags: BTreeMap<String, f64>,
    /// Destination host -> percentage.
    pub hosts: BTreeMap<String, f64>,
}

/// Traffic carried by an edge.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeTraffic {
    pub rates: ProtocolRates,
    /// Response code -> breakdown.
    pub responses: BTreeMap<String, ResponseBreakdown>,
}

impl Default for EdgeTraffic {
    fn default() -> Self {
        Self {
            rates: ProtocolRates::Http(RequestRates::default()),
            responses: BTreeMap::new(),
        }
    }
}

/// A directed edge between two nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub traffic: EdgeTraffic,
    pub response_time_ms: Option<f64>,
    pub throughput: Option<f64>,
    pub mtls_pct: Option<f64>,
}

impl Edge {
    pub fn protocol(&self) -> Protocol {
        self.traffic.rates.protocol()
    }
}

/// A normalized topology snapshot.
///
/// Immutable once built; shared behind an `Arc` by the app and the
/// renderer. Node and edge order is the payload's order.
#[derive(Debug, Clone, Default)]
pub struct TopologyGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    node_index: HashMap<String, usize>,
    edge_index: HashMap<String, usize>,
    timestamp: Option<i64>,
    duration_secs: Option<i64>,
}

impl TopologyGraph {
    /// Build a graph from already-validated nodes and edges.
    ///
    /// Callers are expected to have dropped edges with missing endpoints
    /// and repeated ids; [`super::adapter::normalize`] does this. Lookups
    /// resolve a repeated id to its first occurrence.
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let mut node_index = HashMap::with_capacity(nodes.len());
        for (i, n) in nodes.iter().enumerate() {
            node_index.entry(n.id.clone()).or_insert(i);
        }
        let mut edge_index = HashMap::with_capacity(edges.len());
        for (i, e) in edges.iter().enumerate() {
            edge_index.entry(e.id.clone()).or_insert(i);
        }
        Self {
            nodes,
            edges,
            node_index,
            edge_index,
            timestamp: None,
            duration_secs: None,
        }
    }

    pub(crate) fn with_window(mut self, timestamp: Option<i64>, duration_secs: Option<i64>) -> Self {
        self.timestamp = timestamp;
        self.duration_secs = duration_secs;
        self
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.node_index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edge_index.get(id).map(|&i| &self.edges[i])
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    pub fn contains_edge(&self, id: &str) -> bool {
        self.edge_index.contains_key(id)
    }

    /// Edges whose target is `id`.
    pub fn inbound_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == id)
    }

    /// Edges whose source is `id`.
    pub fn outbound_edges<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == id)
    }

    /// Nodes directly grouped by the box `id`.
    pub fn children<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes
            .iter()
            .filter(move |n| n.parent_id.as_deref() == Some(id))
    }

    /// Unix timestamp the backend computed the snapshot at.
    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    /// Duration in seconds the snapshot covers.
    pub fn duration_secs(&self) -> Option<i64> {
        self.duration_secs
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(id: &str, source: &str, target: &str) -> Edge {
        Edge {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            traffic: EdgeTraffic::default(),
            response_time_ms: None,
            throughput: None,
            mtls_pct: None,
        }
    }

    #[test]
    fn test_indexes_and_adjacency() {
        let mut child = Node::new("c", NodeKind::Application);
        child.parent_id = Some("box".to_string());
        let graph = TopologyGraph::new(
            vec![
                Node::new("box", NodeKind::Box),
                child,
                Node::new("s", NodeKind::Service),
            ],
            vec![edge("e1", "c", "s"), edge("e2", "s", "c")],
        );

        assert_eq!(graph.node("s").map(|n| n.kind), Some(NodeKind::Service));
        assert!(graph.edge("e2").is_some());
        assert!(graph.node("missing").is_none());
        assert_eq!(graph.inbound_edges("s").count(), 1);
        assert_eq!(graph.outbound_edges("s").next().map(|e| e.id.as_str()), Some("e2"));
        assert_eq!(graph.children("box").map(|n| n.id.as_str()).collect::<Vec<_>>(), vec!["c"]);
    }

    #[test]
    fn test_repeated_edge_id_resolves_to_first() {
        let graph = TopologyGraph::new(
            vec![Node::new("a", NodeKind::Application), Node::new("b", NodeKind::Service)],
            vec![edge("e", "a", "b"), edge("e", "b", "a")],
        );
        assert_eq!(graph.edge("e").map(|e| e.source.as_str()), Some("a"));
    }

    #[test]
    fn test_flag_labels() {
        let flags = NodeFlags {
            is_gateway: true,
            virtual_service: Some(vec!["reviews".to_string()]),
            is_dead: true,
            ..Default::default()
        };
        assert_eq!(
            flags.labels(),
            vec!["Gateway", "Virtual Service (reviews)", "Idle"]
        );
        assert!(NodeFlags::default().is_empty());
    }

    #[test]
    fn test_protocol_parse() {
        assert_eq!(Protocol::parse("GRPC"), Some(Protocol::Grpc));
        assert_eq!(Protocol::parse("udp"), None);
        assert!(!Protocol::Tcp.is_request_based());
    }
}
