//! Metrics query building.
//!
//! Picks which mesh entity to ask about, from which reporter's point of
//! view, for a selected node or edge. The routing is easy to get subtly
//! wrong, so it lives in one place:
//!
//! ```text
//! target                      entity          direction  reporter     peer filter
//! ─────────────────────────── ─────────────── ────────── ──────────── ─────────────────────────────
//! node: service               services/svc    in | out   dst | src    -
//! node: app/workload/box      workloads|apps  in | out   dst | src    -
//! edge: * -> serviceEntry     source entity   outbound   destination  destination_service_name=SE
//! edge: * -> service          services/dst    inbound    destination  source_workload=src
//! edge: service -> workload   dst entity      inbound    destination  destination_service_name=src
//! edge: workload -> workload  dst entity      inbound    destination  source_workload=src
//! ```

use std::fmt;

use url::form_urlencoded;

use crate::graph::{BoxKind, Edge, Node, NodeKind, Protocol, TopologyGraph};

use super::window::TimeWindow;

/// Families requested for TCP traffic.
pub const TCP_METRICS: &[&str] = &["tcp_sent", "tcp_received"];

/// Families requested for HTTP and gRPC traffic.
pub const REQUEST_METRICS: &[&str] = &[
    "request_count",
    "request_error_count",
    "request_duration_millis",
];

/// Which collection the queried entity lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Workloads,
    Services,
    Apps,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Workloads => "workloads",
            EntityKind::Services => "services",
            EntityKind::Apps => "apps",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Which side of a connection reported the metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reporter {
    Source,
    Destination,
}

impl Reporter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reporter::Source => "source",
            Reporter::Destination => "destination",
        }
    }
}

/// Label match applied to returned series, keeping only the edge's peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerFilter {
    pub label: String,
    pub value: String,
}

impl PeerFilter {
    fn new(label: &str, value: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            value: value.into(),
        }
    }
}

/// A fully-resolved metrics query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuerySpec {
    pub namespace: String,
    pub cluster: Option<String>,
    pub entity_kind: EntityKind,
    pub entity_name: String,
    pub by_labels: Vec<String>,
    pub direction: Direction,
    pub reporter: Reporter,
    /// Metric families to request, in the order series are presented.
    pub filters: Vec<String>,
    /// `http` or `grpc`; absent for TCP.
    pub request_protocol: Option<Protocol>,
    /// Set for edge queries.
    pub peer_filter: Option<PeerFilter>,
}

/// Why no query could be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoQueryReason {
    /// The entity's namespace is empty or `unknown`.
    UnknownNamespace,
    /// No workload, app or service name could be resolved.
    UnresolvedEntity,
    /// The entity is an unknown node.
    UnknownNode,
}

impl fmt::Display for NoQueryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            NoQueryReason::UnknownNamespace => "namespace is unknown",
            NoQueryReason::UnresolvedEntity => "no workload or service to query",
            NoQueryReason::UnknownNode => "traffic from outside the mesh has no metrics",
        };
        f.write_str(msg)
    }
}

/// Result of [`build`]: a query, or the reason there is none.
///
/// `NoQuery` is not an error. Callers show an empty metrics panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricsRequest {
    Query(QuerySpec),
    NoQuery(NoQueryReason),
}

impl MetricsRequest {
    pub fn spec(&self) -> Option<&QuerySpec> {
        match self {
            MetricsRequest::Query(spec) => Some(spec),
            MetricsRequest::NoQuery(_) => None,
        }
    }
}

/// The entity a query is built for.
#[derive(Debug, Clone, Copy)]
pub enum MetricsTarget<'a> {
    Node(&'a Node),
    Edge {
        edge: &'a Edge,
        source: &'a Node,
        target: &'a Node,
    },
}

impl<'a> MetricsTarget<'a> {
    /// Resolve an edge's endpoints in `graph`.
    pub fn edge(graph: &'a TopologyGraph, edge: &'a Edge) -> Option<Self> {
        Some(MetricsTarget::Edge {
            edge,
            source: graph.node(&edge.source)?,
            target: graph.node(&edge.target)?,
        })
    }
}

/// Rendering options for [`QuerySpec::path`].
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    /// Approximate number of datapoints per series.
    pub step_points: u32,
    /// Prometheus rate interval, e.g. `1m`.
    pub rate_interval: String,
    /// Quantiles requested for duration histograms.
    pub quantiles: Vec<String>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            step_points: 30,
            rate_interval: "1m".to_string(),
            quantiles: vec!["0.5".to_string(), "0.95".to_string(), "0.99".to_string()],
        }
    }
}

/// Metric families for a protocol.
pub fn filters_for(protocol: Protocol) -> Vec<String> {
    let families = match protocol {
        Protocol::Tcp => TCP_METRICS,
        Protocol::Http | Protocol::Grpc => REQUEST_METRICS,
    };
    families.iter().map(|f| f.to_string()).collect()
}

/// Build the metrics query for a target.
///
/// For node targets `direction` picks inbound or outbound traffic. Edge
/// targets always resolve their own direction from the endpoint kinds, so
/// `direction` is ignored for them.
pub fn build(target: &MetricsTarget<'_>, direction: Direction, protocol: Protocol) -> MetricsRequest {
    match *target {
        MetricsTarget::Node(node) => build_for_node(node, direction, protocol),
        MetricsTarget::Edge { source, target, .. } => build_for_edge(source, target, protocol),
    }
}

fn build_for_node(node: &Node, direction: Direction, protocol: Protocol) -> MetricsRequest {
    let (reporter, by_label) = match (node.kind, direction) {
        (NodeKind::Unknown, _) => return MetricsRequest::NoQuery(NoQueryReason::UnknownNode),
        (NodeKind::Service, Direction::Inbound) => (Reporter::Destination, "source_workload"),
        (NodeKind::Service, Direction::Outbound) => (Reporter::Source, "destination_workload"),
        // Service entries have no proxy of their own; only callers report.
        (NodeKind::ServiceEntry, _) => (Reporter::Source, "source_workload"),
        (
            NodeKind::Application | NodeKind::Workload | NodeKind::Box,
            Direction::Inbound,
        ) => (Reporter::Destination, "source_workload"),
        (
            NodeKind::Application | NodeKind::Workload | NodeKind::Box,
            Direction::Outbound,
        ) => (Reporter::Source, "destination_service_name"),
    };

    query_for(node, direction, reporter, vec![by_label.to_string()], None, protocol)
}

fn build_for_edge(source: &Node, target: &Node, protocol: Protocol) -> MetricsRequest {
    match (source.kind, target.kind) {
        (_, NodeKind::ServiceEntry) => {
            let peer = PeerFilter::new("destination_service_name", service_name(target));
            query_for(
                source,
                Direction::Outbound,
                Reporter::Destination,
                vec![peer.label.clone()],
                Some(peer),
                protocol,
            )
        }
        (_, NodeKind::Service) => {
            let peer = source_peer(source);
            query_for(
                target,
                Direction::Inbound,
                Reporter::Destination,
                vec![peer.label.clone()],
                Some(peer),
                protocol,
            )
        }
        (NodeKind::Service, _) => {
            let peer = PeerFilter::new("destination_service_name", service_name(source));
            query_for(
                target,
                Direction::Inbound,
                Reporter::Destination,
                vec![peer.label.clone()],
                Some(peer),
                protocol,
            )
        }
        _ => {
            let peer = source_peer(source);
            query_for(
                target,
                Direction::Inbound,
                Reporter::Destination,
                vec![peer.label.clone()],
                Some(peer),
                protocol,
            )
        }
    }
}

fn query_for(
    node: &Node,
    direction: Direction,
    reporter: Reporter,
    by_labels: Vec<String>,
    peer_filter: Option<PeerFilter>,
    protocol: Protocol,
) -> MetricsRequest {
    if !is_resolved(&node.namespace) {
        return MetricsRequest::NoQuery(NoQueryReason::UnknownNamespace);
    }
    let Some((entity_kind, entity_name)) = entity_of(node) else {
        return MetricsRequest::NoQuery(NoQueryReason::UnresolvedEntity);
    };

    MetricsRequest::Query(QuerySpec {
        namespace: node.namespace.clone(),
        cluster: Some(node.cluster.clone()).filter(|c| is_resolved(c)),
        entity_kind,
        entity_name,
        by_labels,
        direction,
        reporter,
        filters: filters_for(protocol),
        request_protocol: Some(protocol).filter(Protocol::is_request_based),
        peer_filter,
    })
}

/// The collection and name a node is queried under.
fn entity_of(node: &Node) -> Option<(EntityKind, String)> {
    let resolved = |name: &Option<String>| name.clone().filter(|n| is_resolved(n));
    match node.kind {
        NodeKind::Service => resolved(&node.service).map(|s| (EntityKind::Services, s)),
        NodeKind::ServiceEntry => resolved(&node.service)
            .or_else(|| node.service_entry.as_ref().and_then(|se| resolved(&se.node_label)))
            .map(|s| (EntityKind::Services, s)),
        NodeKind::Workload => resolved(&node.workload).map(|w| (EntityKind::Workloads, w)),
        NodeKind::Application => resolved(&node.workload)
            .map(|w| (EntityKind::Workloads, w))
            .or_else(|| resolved(&node.app).map(|a| (EntityKind::Apps, a))),
        NodeKind::Box => match node.box_kind {
            Some(BoxKind::App) => resolved(&node.app).map(|a| (EntityKind::Apps, a)),
            Some(BoxKind::Namespace | BoxKind::Cluster) | None => None,
        },
        NodeKind::Unknown => None,
    }
}

fn source_peer(source: &Node) -> PeerFilter {
    if let Some(ref workload) = source.workload {
        PeerFilter::new("source_workload", workload.clone())
    } else if let Some(ref app) = source.app {
        PeerFilter::new("source_app", app.clone())
    } else {
        PeerFilter::new("source_workload", "unknown")
    }
}

fn service_name(node: &Node) -> String {
    node.service
        .clone()
        .or_else(|| node.service_entry.as_ref().and_then(|se| se.node_label.clone()))
        .unwrap_or_else(|| node.display_name.clone())
}

fn is_resolved(value: &str) -> bool {
    !value.is_empty() && value != "unknown"
}

impl QuerySpec {
    /// Relative path of this query on the mesh metrics API.
    ///
    /// The metrics proxy receives this, url-encoded, as its `url` parameter.
    pub fn path(&self, window: &TimeWindow, options: &QueryOptions) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        query.append_pair("queryTime", &window.query_time().to_string());
        query.append_pair("duration", &window.duration_secs().to_string());
        query.append_pair("step", &window.step_secs(options.step_points).to_string());
        query.append_pair("rateInterval", &options.rate_interval);
        for filter in &self.filters {
            query.append_pair("filters[]", filter);
        }
        for label in &self.by_labels {
            query.append_pair("byLabels[]", label);
        }
        if self.filters.iter().any(|f| f == "request_duration_millis") {
            query.append_pair("avg", "true");
            for quantile in &options.quantiles {
                query.append_pair("quantiles[]", quantile);
            }
        }
        query.append_pair("direction", self.direction.as_str());
        query.append_pair("reporter", self.reporter.as_str());
        if let Some(protocol) = self.request_protocol {
            query.append_pair("requestProtocol", protocol.as_str());
        }
        if let Some(ref cluster) = self.cluster {
            query.append_pair("clusterName", cluster);
        }

        format!(
            "namespaces/{}/{}/{}/metrics?{}",
            path_segment(&self.namespace),
            self.entity_kind.as_str(),
            path_segment(&self.entity_name),
            query.finish()
        )
    }

    /// Short description for logs and panel titles.
    pub fn describe(&self) -> String {
        format!(
            "{}/{}/{} {} ({})",
            self.namespace,
            self.entity_kind.as_str(),
            self.entity_name,
            self.direction.as_str(),
            self.reporter.as_str()
        )
    }
}

fn path_segment(s: &str) -> String {
    form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{normalize, TopologyGraph};
    use chrono::{TimeZone, Utc};
    use meshwatch_types::GraphPayload;
    use std::time::Duration;

    fn bookinfo() -> TopologyGraph {
        let payload = GraphPayload::builder()
            .node("pp", |n| {
                n.node_type("app")
                    .namespace("bookinfo")
                    .cluster("east")
                    .app("productpage")
                    .workload("productpage-v1")
            })
            .node("reviews", |n| n.node_type("service").namespace("bookinfo").service("reviews"))
            .node("r1", |n| {
                n.node_type("app")
                    .namespace("bookinfo")
                    .app("reviews")
                    .workload("reviews-v1")
                    .parent("rbox")
            })
            .node("rbox", |n| n.node_type("box").boxed("app").namespace("bookinfo").app("reviews"))
            .node("ext", |n| {
                n.node_type("serviceEntry")
                    .namespace("bookinfo")
                    .service("api.example.com")
                    .service_entry("api.example.com")
            })
            .node("ratings", |n| n.node_type("app").namespace("bookinfo").app("ratings"))
            .node("outside", |n| n.node_type("unknown").namespace("unknown"))
            .edge("pp-reviews", "pp", "reviews", |e| e.http("5", "0"))
            .edge("reviews-r1", "reviews", "r1", |e| e.http("5", "0"))
            .edge("r1-ext", "r1", "ext", |e| e.tcp("300"))
            .edge("r1-ratings", "r1", "ratings", |e| e.grpc("2", "0"))
            .edge("outside-pp", "outside", "pp", |e| e.http("1", "0"))
            .build();
        normalize(&payload).graph
    }

    fn edge_query(graph: &TopologyGraph, id: &str) -> MetricsRequest {
        let edge = graph.edge(id).unwrap();
        let target = MetricsTarget::edge(graph, edge).unwrap();
        build(&target, Direction::Inbound, edge.protocol())
    }

    fn spec(request: MetricsRequest) -> QuerySpec {
        match request {
            MetricsRequest::Query(spec) => spec,
            MetricsRequest::NoQuery(reason) => panic!("expected a query, got {:?}", reason),
        }
    }

    #[test]
    fn test_service_node_reporter_follows_direction() {
        let graph = bookinfo();
        let node = MetricsTarget::Node(graph.node("reviews").unwrap());

        let inbound = spec(build(&node, Direction::Inbound, Protocol::Http));
        assert_eq!(inbound.entity_kind, EntityKind::Services);
        assert_eq!(inbound.entity_name, "reviews");
        assert_eq!(inbound.reporter, Reporter::Destination);
        assert_eq!(inbound.by_labels, vec!["source_workload"]);

        let outbound = spec(build(&node, Direction::Outbound, Protocol::Http));
        assert_eq!(outbound.reporter, Reporter::Source);
        assert_eq!(outbound.by_labels, vec!["destination_workload"]);
    }

    #[test]
    fn test_app_nodes_prefer_workload() {
        let graph = bookinfo();

        let pp = spec(build(
            &MetricsTarget::Node(graph.node("pp").unwrap()),
            Direction::Outbound,
            Protocol::Http,
        ));
        assert_eq!(pp.entity_kind, EntityKind::Workloads);
        assert_eq!(pp.entity_name, "productpage-v1");
        assert_eq!(pp.reporter, Reporter::Source);
        assert_eq!(pp.cluster.as_deref(), Some("east"));

        let ratings = spec(build(
            &MetricsTarget::Node(graph.node("ratings").unwrap()),
            Direction::Inbound,
            Protocol::Http,
        ));
        assert_eq!(ratings.entity_kind, EntityKind::Apps);
        assert_eq!(ratings.reporter, Reporter::Destination);

        let rbox = spec(build(
            &MetricsTarget::Node(graph.node("rbox").unwrap()),
            Direction::Inbound,
            Protocol::Http,
        ));
        assert_eq!(rbox.entity_kind, EntityKind::Apps);
        assert_eq!(rbox.entity_name, "reviews");
    }

    #[test]
    fn test_service_entry_edge_queries_source_workload() {
        let graph = bookinfo();
        let query = spec(edge_query(&graph, "r1-ext"));

        assert_eq!(query.entity_kind, EntityKind::Workloads);
        assert_eq!(query.entity_name, "reviews-v1");
        assert_eq!(query.direction, Direction::Outbound);
        assert_eq!(query.reporter, Reporter::Destination);
        assert_eq!(query.filters, vec!["tcp_sent", "tcp_received"]);
        assert_eq!(query.request_protocol, None);
        assert_eq!(
            query.peer_filter,
            Some(PeerFilter::new("destination_service_name", "api.example.com"))
        );
    }

    #[test]
    fn test_edge_into_service() {
        let graph = bookinfo();
        let query = spec(edge_query(&graph, "pp-reviews"));

        assert_eq!(query.entity_kind, EntityKind::Services);
        assert_eq!(query.entity_name, "reviews");
        assert_eq!(query.reporter, Reporter::Destination);
        assert_eq!(query.request_protocol, Some(Protocol::Http));
        assert_eq!(
            query.peer_filter,
            Some(PeerFilter::new("source_workload", "productpage-v1"))
        );
    }

    #[test]
    fn test_edge_out_of_service() {
        let graph = bookinfo();
        let query = spec(edge_query(&graph, "reviews-r1"));

        assert_eq!(query.entity_kind, EntityKind::Workloads);
        assert_eq!(query.entity_name, "reviews-v1");
        assert_eq!(query.by_labels, vec!["destination_service_name"]);
        assert_eq!(
            query.peer_filter,
            Some(PeerFilter::new("destination_service_name", "reviews"))
        );
    }

    #[test]
    fn test_workload_to_app_without_workload() {
        let graph = bookinfo();
        let query = spec(edge_query(&graph, "r1-ratings"));

        assert_eq!(query.entity_kind, EntityKind::Apps);
        assert_eq!(query.entity_name, "ratings");
        assert_eq!(query.request_protocol, Some(Protocol::Grpc));
        assert_eq!(
            query.peer_filter,
            Some(PeerFilter::new("source_workload", "reviews-v1"))
        );
    }

    #[test]
    fn test_unknown_namespace_is_no_query() {
        let graph = bookinfo();
        let outside = MetricsTarget::Node(graph.node("outside").unwrap());
        assert_eq!(
            build(&outside, Direction::Outbound, Protocol::Http),
            MetricsRequest::NoQuery(NoQueryReason::UnknownNode)
        );

        let mut nameless = graph.node("pp").unwrap().clone();
        nameless.namespace = "unknown".to_string();
        assert_eq!(
            build(&MetricsTarget::Node(&nameless), Direction::Inbound, Protocol::Http),
            MetricsRequest::NoQuery(NoQueryReason::UnknownNamespace)
        );

        // Traffic from outside the mesh still queries the known destination.
        let query = spec(edge_query(&graph, "outside-pp"));
        assert_eq!(query.entity_name, "productpage-v1");
        assert_eq!(query.peer_filter, Some(PeerFilter::new("source_workload", "unknown")));
    }

    #[test]
    fn test_path_encoding() {
        let graph = bookinfo();
        let query = spec(edge_query(&graph, "pp-reviews"));
        let end = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let window = TimeWindow::ending_at(end, Duration::from_secs(600));

        let path = query.path(&window, &QueryOptions::default());
        assert!(path.starts_with("namespaces/bookinfo/services/reviews/metrics?"));
        assert!(path.contains("queryTime=1700000000"));
        assert!(path.contains("duration=600"));
        assert!(path.contains("step=20"));
        assert!(path.contains("rateInterval=1m"));
        assert!(path.contains("filters%5B%5D=request_count"));
        assert!(path.contains("byLabels%5B%5D=source_workload"));
        assert!(path.contains("quantiles%5B%5D=0.95"));
        assert!(path.contains("reporter=destination"));
        assert!(path.contains("requestProtocol=http"));
        assert!(!path.contains("clusterName"));
    }
}
