//! Topology graph payload as returned by the mesh console's graph endpoint.

use std::collections::BTreeMap;

use crate::RawNumber;

/// Top-level graph response.
///
/// Every level is optional: a backend that has nothing to show may omit
/// `elements`, or either of its arrays. Consumers treat absence as
/// "no data", never as an error.
///
/// # Example
///
/// ```rust
/// use meshwatch_types::GraphPayload;
///
/// let empty = GraphPayload::default();
/// assert!(empty.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct GraphPayload {
    /// Unix timestamp (seconds) at which the backend computed the graph.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub timestamp: Option<i64>,

    /// Query duration in seconds the graph covers.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub duration: Option<i64>,

    /// Graph flavour (`app`, `versionedApp`, `workload`, `service`).
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub graph_type: Option<String>,

    /// The node and edge collections.
    pub elements: Option<Elements>,
}

impl GraphPayload {
    /// Create a builder for fixture graphs.
    pub fn builder() -> GraphPayloadBuilder {
        GraphPayloadBuilder::new()
    }

    /// Raw nodes, or an empty slice when absent.
    pub fn nodes(&self) -> &[Element<NodeData>] {
        self.elements
            .as_ref()
            .and_then(|e| e.nodes.as_deref())
            .unwrap_or(&[])
    }

    /// Raw edges, or an empty slice when absent.
    pub fn edges(&self) -> &[Element<EdgeData>] {
        self.elements
            .as_ref()
            .and_then(|e| e.edges.as_deref())
            .unwrap_or(&[])
    }

    /// Number of raw nodes.
    pub fn node_count(&self) -> usize {
        self.nodes().len()
    }

    /// Number of raw edges.
    pub fn edge_count(&self) -> usize {
        self.edges().len()
    }

    /// True when the payload carries no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes().is_empty()
    }
}

/// The `elements` object of a graph response.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Elements {
    pub nodes: Option<Vec<Element<NodeData>>>,
    pub edges: Option<Vec<Element<EdgeData>>>,
}

/// The `{data: ...}` wrapper each node and edge arrives in.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Element<T> {
    pub data: T,
}

/// Raw node fields.
///
/// Flag fields are `Option<bool>` because backends only emit them when set.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct NodeData {
    pub id: String,
    /// Id of the enclosing box node, if grouped.
    pub parent: Option<String>,
    pub cluster: Option<String>,
    pub namespace: Option<String>,
    /// `app`, `service`, `serviceEntry`, `workload`, `box`, `unknown`.
    pub node_type: Option<String>,
    pub app: Option<String>,
    pub service: Option<String>,
    pub workload: Option<String>,
    pub version: Option<String>,
    pub service_entry: Option<ServiceEntryData>,
    /// Box flavour for `box` nodes: `app`, `namespace` or `cluster`.
    pub is_box: Option<String>,
    pub is_root: Option<bool>,
    pub is_gateway: Option<bool>,
    #[cfg_attr(feature = "serde", serde(rename = "hasCB"))]
    pub has_cb: Option<bool>,
    #[cfg_attr(feature = "serde", serde(rename = "hasMissingSC"))]
    pub has_missing_sc: Option<bool>,
    pub has_request_timeout: Option<bool>,
    #[cfg_attr(feature = "serde", serde(rename = "hasVS"))]
    pub has_vs: Option<VirtualServiceData>,
    pub has_request_routing: Option<bool>,
    pub is_outside: Option<bool>,
    pub is_dead: Option<bool>,
}

/// Service entry details attached to a node.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct ServiceEntryData {
    /// Human label for the entry (usually the external host).
    pub node_label: Option<String>,
    /// `MESH_EXTERNAL` or `MESH_INTERNAL`.
    pub location: Option<String>,
    pub hosts: Vec<String>,
}

/// Virtual service marker attached to a node.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct VirtualServiceData {
    pub hostnames: Vec<String>,
}

/// Raw edge fields.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default, rename_all = "camelCase"))]
pub struct EdgeData {
    pub id: String,
    pub source: String,
    pub target: String,
    pub traffic: Option<TrafficData>,
    /// Response time in milliseconds (when the responseTime appender ran).
    pub response_time: Option<RawNumber>,
    /// Throughput in bytes per second (when the throughput appender ran).
    pub throughput: Option<RawNumber>,
    /// Percentage of requests carried over mTLS.
    #[cfg_attr(feature = "serde", serde(rename = "isMTLS"))]
    pub is_mtls: Option<RawNumber>,
}

/// The traffic block of an edge.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrafficData {
    /// `http`, `grpc` or `tcp`.
    pub protocol: String,
    /// Rate figures keyed by name (`http`, `httpPercentErr`, `grpc`, ...).
    pub rates: BTreeMap<String, RawNumber>,
    /// Response breakdown keyed by response code.
    pub responses: BTreeMap<String, ResponseDetail>,
}

/// Breakdown of one response code.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ResponseDetail {
    /// Response flag -> percentage of requests with that code.
    pub flags: BTreeMap<String, RawNumber>,
    /// Destination host -> percentage of requests with that code.
    pub hosts: BTreeMap<String, RawNumber>,
}

// ============================================================================
// Builders
// ============================================================================

/// Builder for `GraphPayload` fixtures.
#[derive(Debug, Default)]
pub struct GraphPayloadBuilder {
    timestamp: Option<i64>,
    duration: Option<i64>,
    graph_type: Option<String>,
    nodes: Vec<Element<NodeData>>,
    edges: Vec<Element<EdgeData>>,
}

impl GraphPayloadBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the snapshot timestamp (Unix seconds).
    pub fn timestamp(mut self, ts: i64) -> Self {
        self.timestamp = Some(ts);
        self
    }

    /// Set the covered duration in seconds.
    pub fn duration(mut self, secs: i64) -> Self {
        self.duration = Some(secs);
        self
    }

    /// Set the graph type.
    pub fn graph_type(mut self, graph_type: impl Into<String>) -> Self {
        self.graph_type = Some(graph_type.into());
        self
    }

    /// Add a node built using a closure.
    pub fn node<F>(mut self, id: impl Into<String>, f: F) -> Self
    where
        F: FnOnce(NodeDataBuilder) -> NodeDataBuilder,
    {
        let data = f(NodeDataBuilder::new(id)).build();
        self.nodes.push(Element { data });
        self
    }

    /// Add an edge built using a closure.
    pub fn edge<F>(
        mut self,
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
        f: F,
    ) -> Self
    where
        F: FnOnce(EdgeDataBuilder) -> EdgeDataBuilder,
    {
        let data = f(EdgeDataBuilder::new(id, source, target)).build();
        self.edges.push(Element { data });
        self
    }

    /// Build the payload.
    pub fn build(self) -> GraphPayload {
        GraphPayload {
            timestamp: self.timestamp,
            duration: self.duration,
            graph_type: self.graph_type,
            elements: Some(Elements {
                nodes: Some(self.nodes),
                edges: Some(self.edges),
            }),
        }
    }
}

/// Builder for `NodeData`.
#[derive(Debug)]
pub struct NodeDataBuilder {
    data: NodeData,
}

impl NodeDataBuilder {
    /// Create a builder for a node with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            data: NodeData {
                id: id.into(),
                ..Default::default()
            },
        }
    }

    pub fn node_type(mut self, node_type: impl Into<String>) -> Self {
        self.data.node_type = Some(node_type.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.data.namespace = Some(namespace.into());
        self
    }

    pub fn cluster(mut self, cluster: impl Into<String>) -> Self {
        self.data.cluster = Some(cluster.into());
        self
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.data.parent = Some(parent.into());
        self
    }

    pub fn app(mut self, app: impl Into<String>) -> Self {
        self.data.app = Some(app.into());
        self
    }

    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.data.service = Some(service.into());
        self
    }

    pub fn workload(mut self, workload: impl Into<String>) -> Self {
        self.data.workload = Some(workload.into());
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.data.version = Some(version.into());
        self
    }

    /// Mark the node as a service entry with the given label.
    pub fn service_entry(mut self, node_label: impl Into<String>) -> Self {
        self.data.service_entry = Some(ServiceEntryData {
            node_label: Some(node_label.into()),
            location: Some("MESH_EXTERNAL".to_string()),
            hosts: Vec::new(),
        });
        self
    }

    /// Mark the node as a box of the given flavour.
    pub fn boxed(mut self, kind: impl Into<String>) -> Self {
        self.data.is_box = Some(kind.into());
        self
    }

    pub fn root(mut self) -> Self {
        self.data.is_root = Some(true);
        self
    }

    pub fn gateway(mut self) -> Self {
        self.data.is_gateway = Some(true);
        self
    }

    pub fn circuit_breaker(mut self) -> Self {
        self.data.has_cb = Some(true);
        self
    }

    pub fn missing_sidecar(mut self) -> Self {
        self.data.has_missing_sc = Some(true);
        self
    }

    pub fn request_timeout(mut self) -> Self {
        self.data.has_request_timeout = Some(true);
        self
    }

    pub fn virtual_service<I, S>(mut self, hostnames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data.has_vs = Some(VirtualServiceData {
            hostnames: hostnames.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn request_routing(mut self) -> Self {
        self.data.has_request_routing = Some(true);
        self
    }

    pub fn outside(mut self) -> Self {
        self.data.is_outside = Some(true);
        self
    }

    pub fn dead(mut self) -> Self {
        self.data.is_dead = Some(true);
        self
    }

    /// Build the node data.
    pub fn build(self) -> NodeData {
        self.data
    }
}

/// Builder for `EdgeData`.
#[derive(Debug)]
pub struct EdgeDataBuilder {
    data: EdgeData,
}

impl EdgeDataBuilder {
    /// Create a builder for an edge.
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            data: EdgeData {
                id: id.into(),
                source: source.into(),
                target: target.into(),
                ..Default::default()
            },
        }
    }

    fn traffic_mut(&mut self) -> &mut TrafficData {
        self.data.traffic.get_or_insert_with(TrafficData::default)
    }

    /// Set the protocol without any rates.
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.traffic_mut().protocol = protocol.into();
        self
    }

    /// Set a single named rate.
    pub fn rate(mut self, key: impl Into<String>, value: impl Into<RawNumber>) -> Self {
        self.traffic_mut().rates.insert(key.into(), value.into());
        self
    }

    /// HTTP traffic with a request rate and error percentage.
    pub fn http(self, total: &str, error_pct: &str) -> Self {
        self.protocol("http")
            .rate("http", total)
            .rate("httpPercentErr", error_pct)
    }

    /// gRPC traffic with a request rate and error percentage.
    pub fn grpc(self, total: &str, error_pct: &str) -> Self {
        self.protocol("grpc")
            .rate("grpc", total)
            .rate("grpcPercentErr", error_pct)
    }

    /// TCP traffic with a byte rate.
    pub fn tcp(self, bytes: &str) -> Self {
        self.protocol("tcp").rate("tcp", bytes)
    }

    /// Add a response-code breakdown.
    pub fn response(
        mut self,
        code: impl Into<String>,
        flags: &[(&str, &str)],
        hosts: &[(&str, &str)],
    ) -> Self {
        let detail = ResponseDetail {
            flags: flags
                .iter()
                .map(|(k, v)| (k.to_string(), RawNumber::from(*v)))
                .collect(),
            hosts: hosts
                .iter()
                .map(|(k, v)| (k.to_string(), RawNumber::from(*v)))
                .collect(),
        };
        self.traffic_mut().responses.insert(code.into(), detail);
        self
    }

    pub fn response_time(mut self, millis: &str) -> Self {
        self.data.response_time = Some(millis.into());
        self
    }

    pub fn throughput(mut self, bytes_per_sec: &str) -> Self {
        self.data.throughput = Some(bytes_per_sec.into());
        self
    }

    pub fn mtls(mut self, pct: &str) -> Self {
        self.data.is_mtls = Some(pct.into());
        self
    }

    /// Build the edge data.
    pub fn build(self) -> EdgeData {
        self.data
    }
}
