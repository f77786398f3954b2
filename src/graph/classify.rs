//! Node classification for display.
//!
//! Maps a node to a short badge and a title, and answers the box
//! membership question used by traffic aggregation.

use std::collections::HashSet;
use std::fmt;

use super::model::{Edge, Node, NodeKind, TopologyGraph};

/// Short classification badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Badge {
    App,
    Service,
    ServiceEntry,
    Unknown,
}

impl Badge {
    pub fn as_str(&self) -> &'static str {
        match self {
            Badge::App => "A",
            Badge::Service => "S",
            Badge::ServiceEntry => "SE",
            Badge::Unknown => "U",
        }
    }
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Badge plus display title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub badge: Badge,
    pub title: String,
}

impl Classification {
    pub fn unknown() -> Self {
        Self {
            badge: Badge::Unknown,
            title: "Unknown".to_string(),
        }
    }
}

/// Classify a node.
pub fn classify(node: &Node) -> Classification {
    if node.id.is_empty() {
        return Classification::unknown();
    }

    match node.kind {
        NodeKind::ServiceEntry => Classification {
            badge: Badge::ServiceEntry,
            title: node
                .service_entry
                .as_ref()
                .and_then(|se| se.node_label.clone())
                .or_else(|| node.service.clone())
                .unwrap_or_default(),
        },
        NodeKind::Service => Classification {
            badge: Badge::Service,
            title: node.service.clone().unwrap_or_default(),
        },
        NodeKind::Application | NodeKind::Workload | NodeKind::Box | NodeKind::Unknown => {
            match node.app {
                Some(ref app) => Classification {
                    badge: Badge::App,
                    title: app.clone(),
                },
                None => Classification::unknown(),
            }
        }
    }
}

/// Classify an edge endpoint by id.
///
/// Ids that do not resolve in `graph` classify as unknown.
pub fn classify_id(graph: &TopologyGraph, id: &str) -> Classification {
    graph
        .node(id)
        .map(classify)
        .unwrap_or_else(Classification::unknown)
}

/// Edges crossing into or out of a box's children.
#[derive(Debug, Default)]
pub struct MemberEdges<'a> {
    /// Edges whose target is a child of the box.
    pub incoming: Vec<&'a Edge>,
    /// Edges whose source is a child of the box.
    pub outgoing: Vec<&'a Edge>,
}

/// Collect the edges touching the direct children of `box_node`.
///
/// An edge between two children appears in both lists. Non-box nodes have
/// no members and yield empty lists.
pub fn member_edges<'a>(box_node: &Node, nodes: &[Node], edges: &'a [Edge]) -> MemberEdges<'a> {
    if !box_node.is_box() {
        return MemberEdges::default();
    }

    let children: HashSet<&str> = nodes
        .iter()
        .filter(|n| n.parent_id.as_deref() == Some(box_node.id.as_str()))
        .map(|n| n.id.as_str())
        .collect();

    MemberEdges {
        incoming: edges
            .iter()
            .filter(|e| children.contains(e.target.as_str()))
            .collect(),
        outgoing: edges
            .iter()
            .filter(|e| children.contains(e.source.as_str()))
            .collect(),
    }
}

/// Display labels for a node's flags.
pub fn flags(node: &Node) -> Vec<String> {
    node.flags.labels()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::{EdgeTraffic, ServiceEntry};

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

    fn child(id: &str, parent: &str) -> Node {
        let mut node = Node::new(id, NodeKind::Application);
        node.app = Some(id.to_string());
        node.parent_id = Some(parent.to_string());
        node
    }

    #[test]
    fn test_service_entry_prefers_label() {
        let mut node = Node::new("se", NodeKind::ServiceEntry);
        node.service = Some("ext".to_string());
        node.service_entry = Some(ServiceEntry {
            node_label: Some("api.example.com".to_string()),
            ..Default::default()
        });
        assert_eq!(
            classify(&node),
            Classification {
                badge: Badge::ServiceEntry,
                title: "api.example.com".to_string()
            }
        );

        node.service_entry = Some(ServiceEntry::default());
        assert_eq!(classify(&node).title, "ext");
    }

    #[test]
    fn test_service_and_app() {
        let mut svc = Node::new("s", NodeKind::Service);
        svc.service = Some("reviews".to_string());
        assert_eq!(classify(&svc).badge, Badge::Service);
        assert_eq!(classify(&svc).title, "reviews");

        let mut app = Node::new("a", NodeKind::Workload);
        app.app = Some("ratings".to_string());
        assert_eq!(classify(&app).badge, Badge::App);
        assert_eq!(classify(&app).title, "ratings");
    }

    #[test]
    fn test_unknown_fallbacks() {
        assert_eq!(classify(&Node::new("u", NodeKind::Unknown)), Classification::unknown());
        assert_eq!(classify(&Node::new("w", NodeKind::Workload)), Classification::unknown());
        assert_eq!(classify(&Node::new("", NodeKind::Service)), Classification::unknown());

        let graph = TopologyGraph::new(vec![], vec![]);
        assert_eq!(classify_id(&graph, "ghost"), Classification::unknown());
        assert_eq!(Classification::unknown().badge.as_str(), "U");
    }

    #[test]
    fn test_unrecognized_type_with_app() {
        let mut node = Node::new("agg", NodeKind::Unknown);
        node.app = Some("reviews".to_string());

        let classification = classify(&node);
        assert_eq!(classification.badge, Badge::App);
        assert_eq!(classification.title, "reviews");
    }

    #[test]
    fn test_member_edges() {
        let nodes = vec![
            Node::new("box", NodeKind::Box),
            child("c1", "box"),
            child("c2", "box"),
            Node::new("out", NodeKind::Service),
        ];
        let edges = vec![
            edge("in", "out", "c1"),
            edge("internal", "c1", "c2"),
            edge("exit", "c2", "out"),
            edge("unrelated", "out", "out"),
        ];

        let members = member_edges(&nodes[0], &nodes, &edges);
        let ids = |v: &[&Edge]| v.iter().map(|e| e.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(members.incoming.as_slice()), vec!["in", "internal"]);
        assert_eq!(ids(members.outgoing.as_slice()), vec!["internal", "exit"]);

        let none = member_edges(&nodes[3], &nodes, &edges);
        assert!(none.incoming.is_empty() && none.outgoing.is_empty());
    }
}
