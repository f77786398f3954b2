//! Traffic aggregation across edge sets.

use super::classify::member_edges;
use super::model::{Edge, Node, Protocol, TopologyGraph};

/// Summed traffic over a set of edges for one protocol.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrafficSummary {
    /// Number of edges that reported a rate.
    pub edge_count: usize,
    /// Sum of reported rates.
    pub total_rate: f64,
    /// Sum of reported error percentages.
    ///
    /// This is a plain sum, not a weighted mean, and may exceed 100.
    pub aggregate_error_pct: f64,
}

impl TrafficSummary {
    pub fn is_empty(&self) -> bool {
        self.edge_count == 0
    }
}

/// Aggregate the edges of `protocol` in `edges`.
///
/// Edges of other protocols are ignored. Absent figures contribute zero;
/// only edges with a reported rate count towards `edge_count`. TCP edges
/// carry no rate and always aggregate to an empty summary.
pub fn aggregate<'a, I>(edges: I, protocol: Protocol) -> TrafficSummary
where
    I: IntoIterator<Item = &'a Edge>,
{
    let mut summary = TrafficSummary::default();
    for edge in edges {
        if edge.protocol() != protocol {
            continue;
        }
        let Some(rates) = edge.traffic.rates.request_rates() else {
            continue;
        };
        if let Some(total) = rates.total {
            summary.edge_count += 1;
            summary.total_rate += total;
        }
        summary.aggregate_error_pct += rates.error_pct.unwrap_or(0.0);
    }
    summary
}

/// HTTP and gRPC summaries in one direction.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DirectionalTraffic {
    pub http: TrafficSummary,
    pub grpc: TrafficSummary,
}

impl DirectionalTraffic {
    fn from_edges(edges: &[&Edge]) -> Self {
        Self {
            http: aggregate(edges.iter().copied(), Protocol::Http),
            grpc: aggregate(edges.iter().copied(), Protocol::Grpc),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.http.is_empty() && self.grpc.is_empty()
    }
}

/// Inbound and outbound traffic of a node.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NodeTraffic {
    pub inbound: DirectionalTraffic,
    pub outbound: DirectionalTraffic,
}

/// Traffic for a node's detail panel.
///
/// Box nodes aggregate the edges touching their children instead of their
/// own, since boxes are never edge endpoints.
pub fn node_traffic(graph: &TopologyGraph, node: &Node) -> NodeTraffic {
    if node.is_box() {
        let members = member_edges(node, graph.nodes(), graph.edges());
        return NodeTraffic {
            inbound: DirectionalTraffic::from_edges(&members.incoming),
            outbound: DirectionalTraffic::from_edges(&members.outgoing),
        };
    }

    let inbound: Vec<&Edge> = graph.inbound_edges(&node.id).collect();
    let outbound: Vec<&Edge> = graph.outbound_edges(&node.id).collect();
    NodeTraffic {
        inbound: DirectionalTraffic::from_edges(&inbound),
        outbound: DirectionalTraffic::from_edges(&outbound),
    }
}

/// One `(code, flag, pct)` row of an edge's response breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagRow {
    pub code: String,
    pub flag: String,
    pub pct: f64,
}

/// One `(code, host, pct)` row of an edge's response breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct HostRow {
    pub code: String,
    pub host: String,
    pub pct: f64,
}

/// Figures for an edge's detail panel.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSummary {
    pub protocol: Protocol,
    pub rate: Option<f64>,
    pub error_pct: Option<f64>,
    /// `100 - error_pct`, floored at zero.
    pub success_pct: Option<f64>,
    pub flag_rows: Vec<FlagRow>,
    pub host_rows: Vec<HostRow>,
}

/// Summarize one edge.
pub fn edge_summary(edge: &Edge) -> EdgeSummary {
    let rates = edge.traffic.rates.request_rates();
    let rate = rates.and_then(|r| r.total);
    let error_pct = rates.and_then(|r| r.error_pct);
    let success_pct = match (rate, error_pct) {
        (_, Some(err)) => Some((100.0 - err).max(0.0)),
        (Some(_), None) => Some(100.0),
        (None, None) => None,
    };

    let mut flag_rows = Vec::new();
    let mut host_rows = Vec::new();
    for (code, breakdown) in &edge.traffic.responses {
        for (flag, pct) in &breakdown.flags {
            flag_rows.push(FlagRow {
                code: code.clone(),
                flag: flag.clone(),
                pct: *pct,
            });
        }
        for (host, pct) in &breakdown.hosts {
            host_rows.push(HostRow {
                code: code.clone(),
                host: host.clone(),
                pct: *pct,
            });
        }
    }

    EdgeSummary {
        protocol: edge.protocol(),
        rate,
        error_pct,
        success_pct,
        flag_rows,
        host_rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::adapter::normalize;
    use meshwatch_types::GraphPayload;

    fn sample() -> TopologyGraph {
        let payload = GraphPayload::builder()
            .node("box", |n| n.node_type("box").boxed("app").app("reviews"))
            .node("r1", |n| n.node_type("app").app("reviews").parent("box"))
            .node("r2", |n| n.node_type("app").app("reviews").parent("box"))
            .node("pp", |n| n.node_type("app").app("productpage"))
            .node("db", |n| n.node_type("service").service("mysql"))
            .edge("e1", "pp", "r1", |e| e.http("2", "10"))
            .edge("e2", "pp", "r2", |e| e.http("3", "95"))
            .edge("e3", "r1", "db", |e| e.tcp("500"))
            .edge("e4", "r2", "db", |e| e.grpc("1.5", "0"))
            .edge("e5", "pp", "db", |e| e.protocol("http"))
            .build();
        normalize(&payload).graph
    }

    #[test]
    fn test_aggregate_sums_without_clamping() {
        let graph = sample();
        let summary = aggregate(graph.edges(), Protocol::Http);
        assert_eq!(summary.edge_count, 2);
        assert_eq!(summary.total_rate, 5.0);
        assert_eq!(summary.aggregate_error_pct, 105.0);
    }

    #[test]
    fn test_aggregate_ignores_other_protocols_and_tcp() {
        let graph = sample();
        let grpc = aggregate(graph.edges(), Protocol::Grpc);
        assert_eq!(grpc.edge_count, 1);
        assert_eq!(grpc.total_rate, 1.5);
        assert!(aggregate(graph.edges(), Protocol::Tcp).is_empty());
        assert!(aggregate(std::iter::empty(), Protocol::Http).is_empty());
    }

    #[test]
    fn test_box_uses_member_edges() {
        let graph = sample();
        let traffic = node_traffic(&graph, graph.node("box").unwrap());
        assert_eq!(traffic.inbound.http.total_rate, 5.0);
        assert_eq!(traffic.outbound.grpc.total_rate, 1.5);
        assert!(traffic.outbound.http.is_empty());
    }

    #[test]
    fn test_plain_node_uses_own_edges() {
        let graph = sample();
        let traffic = node_traffic(&graph, graph.node("db").unwrap());
        assert_eq!(traffic.inbound.grpc.edge_count, 1);
        assert!(traffic.inbound.http.is_empty());
        assert!(traffic.outbound.is_empty());
    }

    #[test]
    fn test_edge_summary_rows() {
        let payload = GraphPayload::builder()
            .node("a", |n| n.node_type("app").app("a"))
            .node("b", |n| n.node_type("service").service("b"))
            .edge("e", "a", "b", |e| {
                e.http("4", "25")
                    .response("200", &[("-", "75")], &[("b.svc", "75")])
                    .response("503", &[("UO", "25")], &[("b.svc", "25")])
            })
            .build();
        let graph = normalize(&payload).graph;

        let summary = edge_summary(graph.edge("e").unwrap());
        assert_eq!(summary.rate, Some(4.0));
        assert_eq!(summary.success_pct, Some(75.0));
        assert_eq!(summary.flag_rows.len(), 2);
        assert_eq!(summary.flag_rows[1].flag, "UO");
        assert_eq!(summary.host_rows[0].code, "200");
    }
}
