//! Selection state machine.
//!
//! Owns the one piece of mutable UI state shared by the graph view and the
//! detail panel: what is selected and which tab of its panel is showing.
//!
//! ```text
//!            Tap(entity)                 Tap(other) / ChangeTab
//!   Idle ──────────────────▶ DetailOpen ◀──────────────────────┐
//!    ▲                          │  └──────────────────────────────┘
//!    └──── Close / refetch ─────┘
//!          with new identity
//! ```
//!
//! A tap always opens the panel directly, and a tap while open replaces the
//! target without passing through `Idle`. Every change of target bumps the
//! selection epoch; async work started for an older epoch is stale.

use meshwatch_client::GraphQuery;
use tracing::debug;

use crate::graph::{Protocol, TopologyGraph};
use crate::render::TapTarget;

/// Tabs of the detail panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DetailTab {
    #[default]
    Traffic,
    Flags,
    Hosts,
}

impl DetailTab {
    pub const ALL: [DetailTab; 3] = [DetailTab::Traffic, DetailTab::Flags, DetailTab::Hosts];

    pub fn title(&self) -> &'static str {
        match self {
            DetailTab::Traffic => "Traffic",
            DetailTab::Flags => "Flags",
            DetailTab::Hosts => "Hosts",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            DetailTab::Traffic => DetailTab::Flags,
            DetailTab::Flags => DetailTab::Hosts,
            DetailTab::Hosts => DetailTab::Traffic,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            DetailTab::Traffic => DetailTab::Hosts,
            DetailTab::Flags => DetailTab::Traffic,
            DetailTab::Hosts => DetailTab::Flags,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            DetailTab::Traffic => 0,
            DetailTab::Flags => 1,
            DetailTab::Hosts => 2,
        }
    }
}

/// What kind of entity is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionKind {
    None,
    Node,
    Edge,
}

/// Reference to a selected entity, by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Node(String),
    Edge(String),
}

impl EntityRef {
    pub fn id(&self) -> &str {
        match self {
            EntityRef::Node(id) | EntityRef::Edge(id) => id,
        }
    }

    pub fn kind(&self) -> SelectionKind {
        match self {
            EntityRef::Node(_) => SelectionKind::Node,
            EntityRef::Edge(_) => SelectionKind::Edge,
        }
    }

    fn exists_in(&self, graph: &TopologyGraph) -> bool {
        match self {
            EntityRef::Node(id) => graph.contains_node(id),
            EntityRef::Edge(id) => graph.contains_edge(id),
        }
    }
}

/// The selected entity and, for edges, its protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedTarget {
    pub entity: EntityRef,
    pub protocol: Option<Protocol>,
}

impl SelectedTarget {
    fn from_tap(tap: &TapTarget) -> Self {
        match tap {
            TapTarget::Node(node) => Self {
                entity: EntityRef::Node(node.id.clone()),
                protocol: None,
            },
            TapTarget::Edge(edge) => Self {
                entity: EntityRef::Edge(edge.id.clone()),
                protocol: Some(edge.protocol()),
            },
        }
    }

    /// TCP edges open on the flags tab; everything else on traffic.
    fn default_tab(&self) -> DetailTab {
        match self.protocol {
            Some(Protocol::Tcp) => DetailTab::Flags,
            Some(Protocol::Http | Protocol::Grpc) | None => DetailTab::Traffic,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SelectionState {
    #[default]
    Idle,
    DetailOpen {
        target: SelectedTarget,
        tab: DetailTab,
    },
}

/// Read-only view of the selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionView {
    pub kind: SelectionKind,
    pub target_id: Option<String>,
    pub active_tab: Option<DetailTab>,
    pub drawer_open: bool,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy)]
pub enum SelectionEvent<'a> {
    Tap(&'a TapTarget),
    ChangeTab(DetailTab),
    Close,
    /// A new snapshot was published for `identity`.
    GraphRefetched {
        identity: &'a GraphQuery,
        graph: &'a TopologyGraph,
    },
}

/// What a dispatched event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Idle -> DetailOpen.
    Opened,
    /// DetailOpen -> DetailOpen with a different target.
    Replaced,
    TabChanged,
    /// DetailOpen -> Idle.
    Closed,
    Unchanged,
}

impl Transition {
    /// True when the selected target changed and metrics must be refetched
    /// or cancelled.
    pub fn changes_target(&self) -> bool {
        matches!(
            self,
            Transition::Opened | Transition::Replaced | Transition::Closed
        )
    }
}

/// The selection state machine.
#[derive(Debug, Default)]
pub struct SelectionController {
    state: SelectionState,
    epoch: u64,
    identity: Option<GraphQuery>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an event.
    pub fn dispatch(&mut self, event: SelectionEvent<'_>) -> Transition {
        let transition = match event {
            SelectionEvent::Tap(tap) => self.on_tap(tap),
            SelectionEvent::ChangeTab(tab) => self.on_change_tab(tab),
            SelectionEvent::Close => self.on_close(),
            SelectionEvent::GraphRefetched { identity, graph } => self.on_refetch(identity, graph),
        };

        if transition.changes_target() {
            self.epoch += 1;
        }
        if transition != Transition::Unchanged {
            debug!(?transition, epoch = self.epoch, "selection changed");
        }
        transition
    }

    fn on_tap(&mut self, tap: &TapTarget) -> Transition {
        let target = SelectedTarget::from_tap(tap);
        let transition = match self.state {
            SelectionState::Idle => Transition::Opened,
            SelectionState::DetailOpen {
                target: ref current,
                ..
            } if *current == target => return Transition::Unchanged,
            SelectionState::DetailOpen { .. } => Transition::Replaced,
        };

        let tab = target.default_tab();
        self.state = SelectionState::DetailOpen { target, tab };
        transition
    }

    fn on_change_tab(&mut self, new_tab: DetailTab) -> Transition {
        match self.state {
            SelectionState::DetailOpen { ref mut tab, .. } if *tab != new_tab => {
                *tab = new_tab;
                Transition::TabChanged
            }
            _ => Transition::Unchanged,
        }
    }

    fn on_close(&mut self) -> Transition {
        match std::mem::take(&mut self.state) {
            SelectionState::Idle => Transition::Unchanged,
            SelectionState::DetailOpen { .. } => Transition::Closed,
        }
    }

    fn on_refetch(&mut self, identity: &GraphQuery, graph: &TopologyGraph) -> Transition {
        let same_identity = self.identity.as_ref() == Some(identity);
        if !same_identity {
            self.identity = Some(identity.clone());
        }

        match self.state {
            SelectionState::Idle => Transition::Unchanged,
            SelectionState::DetailOpen { ref target, .. }
                if same_identity && target.entity.exists_in(graph) =>
            {
                Transition::Unchanged
            }
            SelectionState::DetailOpen { .. } => {
                self.state = SelectionState::Idle;
                Transition::Closed
            }
        }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    /// The selected target, if the panel is open.
    pub fn target(&self) -> Option<&SelectedTarget> {
        match self.state {
            SelectionState::DetailOpen { ref target, .. } => Some(target),
            SelectionState::Idle => None,
        }
    }

    pub fn active_tab(&self) -> Option<DetailTab> {
        match self.state {
            SelectionState::DetailOpen { tab, .. } => Some(tab),
            SelectionState::Idle => None,
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, SelectionState::DetailOpen { .. })
    }

    pub fn view(&self) -> SelectionView {
        match self.state {
            SelectionState::Idle => SelectionView {
                kind: SelectionKind::None,
                target_id: None,
                active_tab: None,
                drawer_open: false,
            },
            SelectionState::DetailOpen { ref target, tab } => SelectionView {
                kind: target.entity.kind(),
                target_id: Some(target.entity.id().to_string()),
                active_tab: Some(tab),
                drawer_open: true,
            },
        }
    }

    /// Current selection epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// True if work started at `epoch` still belongs to the current target.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.epoch == epoch
    }

    /// The graph identity the selection belongs to.
    pub fn identity(&self) -> Option<&GraphQuery> {
        self.identity.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::normalize;
    use meshwatch_types::GraphPayload;
    use std::time::Duration;

    fn graph() -> TopologyGraph {
        let payload = GraphPayload::builder()
            .node("a", |n| n.node_type("app").namespace("ns").app("a"))
            .node("b", |n| n.node_type("service").namespace("ns").service("b"))
            .edge("http", "a", "b", |e| e.http("1", "0"))
            .edge("tcp", "b", "a", |e| e.tcp("10"))
            .build();
        normalize(&payload).graph
    }

    fn node_tap(graph: &TopologyGraph, id: &str) -> TapTarget {
        TapTarget::Node(graph.node(id).unwrap().clone())
    }

    fn edge_tap(graph: &TopologyGraph, id: &str) -> TapTarget {
        TapTarget::Edge(graph.edge(id).unwrap().clone())
    }

    #[test]
    fn test_tap_opens_with_protocol_default_tab() {
        let graph = graph();
        let mut selection = SelectionController::new();
        assert_eq!(selection.view().kind, SelectionKind::None);

        assert_eq!(
            selection.dispatch(SelectionEvent::Tap(&edge_tap(&graph, "tcp"))),
            Transition::Opened
        );
        assert_eq!(selection.active_tab(), Some(DetailTab::Flags));

        selection.dispatch(SelectionEvent::Tap(&edge_tap(&graph, "http")));
        assert_eq!(selection.active_tab(), Some(DetailTab::Traffic));
    }

    #[test]
    fn test_replace_never_passes_through_idle() {
        let graph = graph();
        let mut selection = SelectionController::new();
        let mut observed = Vec::new();

        for tap in [edge_tap(&graph, "http"), node_tap(&graph, "b")] {
            selection.dispatch(SelectionEvent::Tap(&tap));
            observed.push(selection.view());
        }

        assert!(observed.iter().all(|v| v.drawer_open));
        let last = observed.last().unwrap();
        assert_eq!(last.kind, SelectionKind::Node);
        assert_eq!(last.target_id.as_deref(), Some("b"));
    }

    #[test]
    fn test_tab_change_keeps_target_and_epoch() {
        let graph = graph();
        let mut selection = SelectionController::new();
        selection.dispatch(SelectionEvent::Tap(&node_tap(&graph, "a")));
        let epoch = selection.epoch();

        assert_eq!(
            selection.dispatch(SelectionEvent::ChangeTab(DetailTab::Hosts)),
            Transition::TabChanged
        );
        assert_eq!(selection.view().target_id.as_deref(), Some("a"));
        assert!(selection.is_current(epoch));

        assert_eq!(
            selection.dispatch(SelectionEvent::ChangeTab(DetailTab::Hosts)),
            Transition::Unchanged
        );
    }

    #[test]
    fn test_epoch_bumps_on_target_change() {
        let graph = graph();
        let mut selection = SelectionController::new();

        selection.dispatch(SelectionEvent::Tap(&node_tap(&graph, "a")));
        let first = selection.epoch();
        assert_eq!(
            selection.dispatch(SelectionEvent::Tap(&node_tap(&graph, "a"))),
            Transition::Unchanged
        );
        assert!(selection.is_current(first));

        selection.dispatch(SelectionEvent::Tap(&node_tap(&graph, "b")));
        assert!(!selection.is_current(first));

        let second = selection.epoch();
        assert_eq!(selection.dispatch(SelectionEvent::Close), Transition::Closed);
        assert!(!selection.is_current(second));
        assert_eq!(selection.dispatch(SelectionEvent::Close), Transition::Unchanged);
        assert_eq!(selection.state(), &SelectionState::Idle);
    }

    #[test]
    fn test_refetch_with_new_identity_closes() {
        let graph = graph();
        let query = GraphQuery::new(["ns"]);
        let mut selection = SelectionController::new();

        selection.dispatch(SelectionEvent::GraphRefetched {
            identity: &query,
            graph: &graph,
        });
        selection.dispatch(SelectionEvent::Tap(&node_tap(&graph, "a")));

        // Same identity, target still present: selection survives.
        assert_eq!(
            selection.dispatch(SelectionEvent::GraphRefetched {
                identity: &query,
                graph: &graph,
            }),
            Transition::Unchanged
        );
        assert!(selection.is_open());

        let wider = query.clone().with_duration(Duration::from_secs(3600));
        assert_eq!(
            selection.dispatch(SelectionEvent::GraphRefetched {
                identity: &wider,
                graph: &graph,
            }),
            Transition::Closed
        );
        assert!(!selection.is_open());
        assert_eq!(selection.identity(), Some(&wider));
    }

    #[test]
    fn test_refetch_without_target_closes() {
        let graph = graph();
        let query = GraphQuery::new(["ns"]);
        let mut selection = SelectionController::new();
        selection.dispatch(SelectionEvent::GraphRefetched {
            identity: &query,
            graph: &graph,
        });
        selection.dispatch(SelectionEvent::Tap(&edge_tap(&graph, "tcp")));

        let empty = TopologyGraph::default();
        assert_eq!(
            selection.dispatch(SelectionEvent::GraphRefetched {
                identity: &query,
                graph: &empty,
            }),
            Transition::Closed
        );
    }

    #[test]
    fn test_tab_cycling() {
        assert_eq!(DetailTab::Hosts.next(), DetailTab::Traffic);
        assert_eq!(DetailTab::Traffic.prev(), DetailTab::Hosts);
        assert_eq!(DetailTab::ALL[DetailTab::Flags.index()], DetailTab::Flags);
    }
}
