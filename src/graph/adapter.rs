//! Payload normalization.
//!
//! Turns a raw [`GraphPayload`] into a [`TopologyGraph`]:
//!
//! ```text
//! GraphPayload ──normalize──> NormalizedGraph { graph, report }
//!   nodes:  resolve kind, display name, flags; first id wins
//!   edges:  parse rates; drop edges whose endpoints are unknown
//!   report: every data-quality issue found on the way
//! ```
//!
//! Normalization never fails. Missing collections become empty, missing
//! numbers stay absent and malformed numbers read as zero with a warning.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use meshwatch_types::{EdgeData, GraphPayload, NodeData, RawNumber, TrafficData};
use tracing::{debug, warn};

use super::model::{
    BoxKind, Edge, EdgeTraffic, Node, NodeFlags, NodeKind, Protocol, ProtocolRates,
    RequestRates, ResponseBreakdown, ServiceEntry, TopologyGraph,
};

/// Which endpoint of an edge could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Source,
    Target,
}

/// A data-quality issue found while normalizing.
#[derive(Debug, Clone, PartialEq)]
pub enum DataQualityWarning {
    /// An edge referenced a node id that is not in the payload.
    DanglingEdge {
        edge_id: String,
        endpoint: Endpoint,
        node_id: String,
    },
    /// A node referenced a parent id that is not in the payload.
    DanglingParent { node_id: String, parent_id: String },
    /// A second node used an id already taken.
    DuplicateNode { node_id: String },
    /// A second edge used an id already taken.
    DuplicateEdge { edge_id: String },
    /// A numeric field could not be read as a non-negative number.
    MalformedNumber {
        element_id: String,
        field: String,
        value: String,
    },
    /// An edge named a protocol other than http, grpc or tcp.
    UnknownProtocol { edge_id: String, protocol: String },
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityWarning::DanglingEdge {
                edge_id,
                endpoint,
                node_id,
            } => {
                let end = match endpoint {
                    Endpoint::Source => "source",
                    Endpoint::Target => "target",
                };
                write!(f, "edge {} dropped: unknown {} node {}", edge_id, end, node_id)
            }
            DataQualityWarning::DanglingParent { node_id, parent_id } => {
                write!(f, "node {} references unknown parent {}", node_id, parent_id)
            }
            DataQualityWarning::DuplicateNode { node_id } => {
                write!(f, "duplicate node id {} ignored", node_id)
            }
            DataQualityWarning::DuplicateEdge { edge_id } => {
                write!(f, "duplicate edge id {} ignored", edge_id)
            }
            DataQualityWarning::MalformedNumber {
                element_id,
                field,
                value,
            } => write!(f, "{}: malformed {} {:?} read as 0", element_id, field, value),
            DataQualityWarning::UnknownProtocol { edge_id, protocol } => {
                write!(f, "edge {}: unknown protocol {:?}", edge_id, protocol)
            }
        }
    }
}

/// Everything normalization had to work around.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeReport {
    pub warnings: Vec<DataQualityWarning>,
}

impl NormalizeReport {
    /// Ids of edges dropped for referencing unknown nodes.
    pub fn dropped_edges(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.warnings
            .iter()
            .filter_map(|w| match w {
                DataQualityWarning::DanglingEdge { edge_id, .. } => Some(edge_id.as_str()),
                _ => None,
            })
            .filter(|id| seen.insert(*id))
            .collect()
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    fn push(&mut self, warning: DataQualityWarning) {
        warn!(%warning, "graph data quality");
        self.warnings.push(warning);
    }
}

/// Output of [`normalize`].
#[derive(Debug, Clone, Default)]
pub struct NormalizedGraph {
    pub graph: TopologyGraph,
    pub report: NormalizeReport,
}

/// Normalize a raw payload.
pub fn normalize(payload: &GraphPayload) -> NormalizedGraph {
    let mut report = NormalizeReport::default();

    let mut seen = HashSet::new();
    let mut nodes = Vec::with_capacity(payload.node_count());
    for element in payload.nodes() {
        let data = &element.data;
        if !seen.insert(data.id.clone()) {
            report.push(DataQualityWarning::DuplicateNode {
                node_id: data.id.clone(),
            });
            continue;
        }
        nodes.push(normalize_node(data));
    }

    for node in &mut nodes {
        let dangling = matches!(node.parent_id, Some(ref parent) if !seen.contains(parent));
        if dangling {
            if let Some(parent_id) = node.parent_id.take() {
                report.push(DataQualityWarning::DanglingParent {
                    node_id: node.id.clone(),
                    parent_id,
                });
            }
        }
    }

    let mut edge_ids = HashSet::new();
    let mut edges = Vec::with_capacity(payload.edge_count());
    for element in payload.edges() {
        let data = &element.data;
        if !edge_ids.insert(data.id.clone()) {
            report.push(DataQualityWarning::DuplicateEdge {
                edge_id: data.id.clone(),
            });
            continue;
        }
        let mut dangling = false;
        for (endpoint, node_id) in [(Endpoint::Source, &data.source), (Endpoint::Target, &data.target)] {
            if !seen.contains(node_id) {
                report.push(DataQualityWarning::DanglingEdge {
                    edge_id: data.id.clone(),
                    endpoint,
                    node_id: node_id.clone(),
                });
                dangling = true;
            }
        }
        if dangling {
            continue;
        }
        edges.push(normalize_edge(data, &mut report));
    }

    debug!(
        nodes = nodes.len(),
        edges = edges.len(),
        warnings = report.warnings.len(),
        "normalized graph"
    );

    NormalizedGraph {
        graph: TopologyGraph::new(nodes, edges).with_window(payload.timestamp, payload.duration),
        report,
    }
}

fn normalize_node(data: &NodeData) -> Node {
    let kind = resolve_kind(data);
    let service_entry = data.service_entry.as_ref().map(|se| ServiceEntry {
        node_label: se.node_label.clone(),
        location: se.location.clone(),
        hosts: se.hosts.clone(),
    });

    Node {
        id: data.id.clone(),
        kind,
        namespace: data.namespace.clone().unwrap_or_default(),
        cluster: data.cluster.clone().unwrap_or_default(),
        parent_id: data.parent.clone(),
        display_name: display_name(data),
        app: non_empty(&data.app),
        service: non_empty(&data.service),
        workload: non_empty(&data.workload),
        version: non_empty(&data.version),
        service_entry,
        box_kind: data.is_box.as_deref().and_then(BoxKind::parse),
        flags: NodeFlags {
            is_root: data.is_root.unwrap_or(false),
            is_gateway: data.is_gateway.unwrap_or(false),
            has_circuit_breaker: data.has_cb.unwrap_or(false),
            has_missing_sidecar: data.has_missing_sc.unwrap_or(false),
            has_request_timeout: data.has_request_timeout.unwrap_or(false),
            virtual_service: data.has_vs.as_ref().map(|vs| vs.hostnames.clone()),
            has_request_routing: data.has_request_routing.unwrap_or(false),
            is_outside_mesh: data.is_outside.unwrap_or(false),
            is_dead: data.is_dead.unwrap_or(false),
        },
    }
}

fn resolve_kind(data: &NodeData) -> NodeKind {
    match data.node_type.as_deref() {
        Some("serviceEntry") => NodeKind::ServiceEntry,
        Some("service") if data.service_entry.is_some() => NodeKind::ServiceEntry,
        Some("service") => NodeKind::Service,
        Some("app") => NodeKind::Application,
        Some("workload") => NodeKind::Workload,
        Some("box") => NodeKind::Box,
        Some("unknown") => NodeKind::Unknown,
        Some(other) => {
            debug!(node = %data.id, node_type = other, "unrecognized node type");
            NodeKind::Unknown
        }
        None => {
            if data.service_entry.is_some() {
                NodeKind::ServiceEntry
            } else if data.is_box.is_some() {
                NodeKind::Box
            } else if data.service.is_some() {
                NodeKind::Service
            } else if data.app.is_some() {
                NodeKind::Application
            } else if data.workload.is_some() {
                NodeKind::Workload
            } else {
                NodeKind::Unknown
            }
        }
    }
}

fn display_name(data: &NodeData) -> String {
    data.service_entry
        .as_ref()
        .and_then(|se| non_empty(&se.node_label))
        .or_else(|| non_empty(&data.service))
        .or_else(|| non_empty(&data.app))
        .or_else(|| non_empty(&data.workload))
        .unwrap_or_else(|| data.id.clone())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.is_empty()).cloned()
}

fn normalize_edge(data: &EdgeData, report: &mut NormalizeReport) -> Edge {
    let traffic = match data.traffic {
        Some(ref traffic) => normalize_traffic(&data.id, traffic, report),
        None => EdgeTraffic::default(),
    };

    Edge {
        id: data.id.clone(),
        source: data.source.clone(),
        target: data.target.clone(),
        traffic,
        response_time_ms: parse_number(&data.id, "responseTime", data.response_time.as_ref(), report),
        throughput: parse_number(&data.id, "throughput", data.throughput.as_ref(), report),
        mtls_pct: parse_number(&data.id, "isMTLS", data.is_mtls.as_ref(), report),
    }
}

fn normalize_traffic(edge_id: &str, traffic: &TrafficData, report: &mut NormalizeReport) -> EdgeTraffic {
    let protocol = if traffic.protocol.is_empty() {
        Protocol::Http
    } else {
        Protocol::parse(&traffic.protocol).unwrap_or_else(|| {
            report.push(DataQualityWarning::UnknownProtocol {
                edge_id: edge_id.to_string(),
                protocol: traffic.protocol.clone(),
            });
            Protocol::Http
        })
    };

    let mut rates_for = |total_key: &str, err_key: &str| RequestRates {
        total: parse_number(edge_id, total_key, traffic.rates.get(total_key), report),
        error_pct: parse_number(edge_id, err_key, traffic.rates.get(err_key), report),
    };

    let rates = match protocol {
        Protocol::Http => ProtocolRates::Http(rates_for("http", "httpPercentErr")),
        Protocol::Grpc => ProtocolRates::Grpc(rates_for("grpc", "grpcPercentErr")),
        Protocol::Tcp => ProtocolRates::Tcp,
    };

    let mut responses = BTreeMap::new();
    for (code, detail) in &traffic.responses {
        let mut breakdown = ResponseBreakdown::default();
        for (flag, pct) in &detail.flags {
            let field = format!("responses[{}].flags[{}]", code, flag);
            let value = parse_number(edge_id, &field, Some(pct), report).unwrap_or(0.0);
            breakdown.flags.insert(flag.clone(), value);
        }
        for (host, pct) in &detail.hosts {
            let field = format!("responses[{}].hosts[{}]", code, host);
            let value = parse_number(edge_id, &field, Some(pct), report).unwrap_or(0.0);
            breakdown.hosts.insert(host.clone(), value);
        }
        responses.insert(code.clone(), breakdown);
    }

    EdgeTraffic { rates, responses }
}

/// Absent stays absent; anything that is not a finite non-negative number
/// reads as zero and is reported.
fn parse_number(
    element_id: &str,
    field: &str,
    raw: Option<&RawNumber>,
    report: &mut NormalizeReport,
) -> Option<f64> {
    let raw = raw?;
    match raw.to_f64() {
        Some(v) if v.is_finite() && v >= 0.0 => Some(v),
        _ => {
            let value = match raw {
                RawNumber::Number(n) => n.to_string(),
                RawNumber::Text(s) => s.clone(),
            };
            report.push(DataQualityWarning::MalformedNumber {
                element_id: element_id.to_string(),
                field: field.to_string(),
                value,
            });
            Some(0.0)
        }
    }
}
