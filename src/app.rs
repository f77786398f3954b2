//! Application state.
//!
//! Glue between the engine pieces. One tick of the UI loop:
//!
//! ```text
//! source.poll() ──> normalize ──> Arc<TopologyGraph> ──> renderer.set_elements
//!                                       │                       │ tap
//!                                       ▼                       ▼
//!                        selection.dispatch(GraphRefetched)  selection.dispatch(Tap)
//!                                                               │ target changed
//!                                                               ▼
//!                                            metrics.request(epoch, build(..))
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;
use meshwatch_client::GraphQuery;
use meshwatch_types::GraphPayload;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::duration::{format_window, next_window};
use crate::graph::{normalize, Node, NodeKind, NormalizeReport, Thresholds, TopologyGraph};
use crate::metrics::{
    build, Direction, MetricsCoordinator, MetricsPanel, MetricsRequest, MetricsTarget, NoQueryReason,
    TimeWindow,
};
use crate::render::{
    Debouncer, GraphRenderer, RenderElements, RenderTheme, TapTarget, TerminalRenderer, Viewport,
};
use crate::selection::{DetailTab, EntityRef, SelectionController, SelectionEvent, Transition};
use crate::source::GraphSource;

/// Quiet period before a burst of resizes triggers a relayout.
pub const RESIZE_DEBOUNCE: Duration = Duration::from_millis(150);

/// Load state of the topology pane.
#[derive(Debug, Clone)]
pub enum GraphState {
    /// Nothing received yet.
    Loading,
    /// The backend answered with no elements.
    NoData,
    /// The first fetch failed; nothing to show.
    Failed(String),
    Ready(Arc<TopologyGraph>),
}

/// Main application state.
pub struct App<R: GraphRenderer = TerminalRenderer> {
    pub running: bool,
    pub show_help: bool,

    source: Box<dyn GraphSource>,
    query: GraphQuery,
    graph: GraphState,
    report: NormalizeReport,
    /// Error from the most recent poll, shown while older data stays up.
    pub load_error: Option<String>,

    selection: SelectionController,
    metrics: Option<MetricsCoordinator>,
    direction: Direction,

    renderer: R,
    taps: mpsc::UnboundedReceiver<TapTarget>,
    resize: Debouncer<Viewport>,

    theme: RenderTheme,
    thresholds: Thresholds,

    // Status message (temporary feedback)
    pub status_message: Option<(String, Instant)>,
}

impl<R: GraphRenderer> App<R> {
    /// Mount `renderer` and wire its taps back into the app.
    pub fn new(
        source: Box<dyn GraphSource>,
        query: GraphQuery,
        mut renderer: R,
        theme: RenderTheme,
        thresholds: Thresholds,
    ) -> Result<Self> {
        renderer.mount(&theme)?;
        let (tap_tx, taps) = mpsc::unbounded_channel();
        renderer.on_tap(Box::new(move |target| {
            let _ = tap_tx.send(target);
        }));

        Ok(Self {
            running: true,
            show_help: false,
            source,
            query,
            graph: GraphState::Loading,
            report: NormalizeReport::default(),
            load_error: None,
            selection: SelectionController::new(),
            metrics: None,
            direction: Direction::Inbound,
            renderer,
            taps,
            resize: Debouncer::new(RESIZE_DEBOUNCE),
            theme,
            thresholds,
            status_message: None,
        })
    }

    /// Attach a metrics coordinator. Without one the detail panel shows
    /// traffic figures only.
    pub fn with_metrics(mut self, metrics: MetricsCoordinator) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn source_description(&self) -> &str {
        self.source.description()
    }

    pub fn query(&self) -> &GraphQuery {
        &self.query
    }

    pub fn graph_state(&self) -> &GraphState {
        &self.graph
    }

    /// The published snapshot, if any.
    pub fn graph(&self) -> Option<&Arc<TopologyGraph>> {
        match self.graph {
            GraphState::Ready(ref graph) => Some(graph),
            _ => None,
        }
    }

    pub fn report(&self) -> &NormalizeReport {
        &self.report
    }

    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    /// Metrics panel state, or `None` when no metrics backend is configured.
    pub fn metrics_panel(&self) -> Option<&MetricsPanel> {
        self.metrics.as_ref().map(MetricsCoordinator::panel)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn theme(&self) -> &RenderTheme {
        &self.theme
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired (3 seconds).
    pub fn get_status_message(&self) -> Option<&str> {
        if let Some((msg, time)) = &self.status_message {
            if time.elapsed() < Duration::from_secs(3) {
                return Some(msg);
            }
        }
        None
    }

    /// Poll the source for a new snapshot.
    ///
    /// Returns Ok(true) if a snapshot was published.
    pub fn reload_data(&mut self) -> Result<bool> {
        if let Some(payload) = self.source.poll() {
            self.publish(&payload)?;
            return Ok(true);
        }

        if let Some(err) = self.source.error() {
            let err = err.to_string();
            if matches!(self.graph, GraphState::Loading | GraphState::Failed(_)) {
                self.graph = GraphState::Failed(err.clone());
            }
            self.load_error = Some(err);
        }
        Ok(false)
    }

    /// Normalize and publish a snapshot as a whole.
    pub fn publish(&mut self, payload: &GraphPayload) -> Result<()> {
        let normalized = normalize(payload);
        self.report = normalized.report;
        self.load_error = None;

        let graph = Arc::new(normalized.graph);
        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            warnings = self.report.warnings.len(),
            "published graph"
        );

        let transition = self.selection.dispatch(SelectionEvent::GraphRefetched {
            identity: &self.query,
            graph: &graph,
        });
        if transition == Transition::Closed {
            self.cancel_metrics();
        }

        self.renderer
            .set_elements(RenderElements::from_graph(&graph, &self.thresholds))?;
        self.graph = if graph.is_empty() {
            GraphState::NoData
        } else {
            GraphState::Ready(graph)
        };
        Ok(())
    }

    /// Drain taps, finished metrics fetches and pending resizes.
    pub fn tick(&mut self, now: Instant) -> Result<()> {
        while let Ok(target) = self.taps.try_recv() {
            self.handle_tap(&target);
        }

        let epoch = self.selection.epoch();
        if let Some(ref mut metrics) = self.metrics {
            metrics.poll(epoch);
        }

        if let Some(viewport) = self.resize.poll(now) {
            debug!(?viewport, "relayout");
            self.renderer.relayout(viewport)?;
        }
        Ok(())
    }

    /// Record a terminal resize; the relayout happens once resizes stop.
    pub fn resize(&mut self, width: u16, height: u16, now: Instant) {
        self.resize.push(Viewport::new(width, height), now);
    }

    pub fn handle_tap(&mut self, target: &TapTarget) {
        let transition = self.selection.dispatch(SelectionEvent::Tap(target));
        if transition.changes_target() {
            self.direction = Direction::Inbound;
            self.request_metrics();
        }
    }

    pub fn close_detail(&mut self) {
        if self.selection.dispatch(SelectionEvent::Close) == Transition::Closed {
            self.cancel_metrics();
        }
    }

    pub fn set_tab(&mut self, tab: DetailTab) {
        self.selection.dispatch(SelectionEvent::ChangeTab(tab));
    }

    pub fn next_tab(&mut self) {
        if let Some(tab) = self.selection.active_tab() {
            self.set_tab(tab.next());
        }
    }

    pub fn prev_tab(&mut self) {
        if let Some(tab) = self.selection.active_tab() {
            self.set_tab(tab.prev());
        }
    }

    /// Switch a selected node's metrics between inbound and outbound.
    pub fn toggle_direction(&mut self) {
        let is_node = matches!(
            self.selection.target().map(|t| &t.entity),
            Some(EntityRef::Node(_))
        );
        if !is_node {
            return;
        }
        self.direction = match self.direction {
            Direction::Inbound => Direction::Outbound,
            Direction::Outbound => Direction::Inbound,
        };
        self.request_metrics();
    }

    /// Retry failed metrics, otherwise ask the source for a fresh graph.
    pub fn retry(&mut self) {
        let retried = match self.metrics {
            Some(ref mut metrics) if matches!(metrics.panel(), MetricsPanel::Failed(_)) => {
                metrics.retry()
            }
            _ => false,
        };
        if retried {
            self.set_status_message("Retrying metrics".to_string());
        } else {
            self.source.refresh();
            self.set_status_message("Refreshing graph".to_string());
        }
    }

    /// Move to the next query window. The selection closes once the
    /// rescoped snapshot arrives.
    pub fn cycle_duration(&mut self) {
        let duration = next_window(self.query.duration);
        self.set_query(self.query.clone().with_duration(duration));
        self.set_status_message(format!("Window: {}", format_window(duration)));
    }

    /// Change the graph scope.
    pub fn set_query(&mut self, query: GraphQuery) {
        if query == self.query {
            return;
        }
        self.cancel_metrics();
        self.query = query;
        self.source.set_query(&self.query);
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    fn cancel_metrics(&mut self) {
        if let Some(ref mut metrics) = self.metrics {
            metrics.cancel();
        }
    }

    fn request_metrics(&mut self) {
        let Some(metrics) = self.metrics.as_mut() else {
            return;
        };
        let (Some(target), GraphState::Ready(graph)) = (self.selection.target(), &self.graph)
        else {
            metrics.cancel();
            return;
        };

        let request = match target.entity {
            EntityRef::Node(ref id) => match graph.node(id) {
                Some(node) => build(
                    &MetricsTarget::Node(node),
                    self.direction,
                    node_protocol(graph, node),
                ),
                None => MetricsRequest::NoQuery(NoQueryReason::UnknownNode),
            },
            EntityRef::Edge(ref id) => {
                match graph.edge(id).and_then(|edge| {
                    MetricsTarget::edge(graph, edge).map(|target| (target, edge.protocol()))
                }) {
                    Some((target, protocol)) => build(&target, Direction::Inbound, protocol),
                    None => MetricsRequest::NoQuery(NoQueryReason::UnknownNode),
                }
            }
        };

        let window = TimeWindow::for_graph(graph, self.query.duration, Utc::now());
        metrics.request(self.selection.epoch(), request, window);
    }
}

impl App<TerminalRenderer> {
    pub fn select_prev(&mut self) {
        self.renderer.move_up();
    }

    pub fn select_next(&mut self) {
        self.renderer.move_down();
    }

    /// Select a row by index and tap it.
    pub fn click_row(&mut self, index: usize) {
        if self.renderer.select_row(index) {
            self.tap_selected();
        }
    }

    /// Tap the row under the cursor; the tap is handled on the next tick.
    pub fn tap_selected(&mut self) {
        self.renderer.tap_selected();
        while let Ok(target) = self.taps.try_recv() {
            self.handle_tap(&target);
        }
    }
}

/// Request metrics follow the node's traffic: TCP only when it has no
/// request-based edges, gRPC when every request-based edge is gRPC.
fn node_protocol(graph: &TopologyGraph, node: &Node) -> crate::graph::Protocol {
    use crate::graph::Protocol;

    if node.kind == NodeKind::Unknown {
        return Protocol::Http;
    }
    let requests: Vec<Protocol> = graph
        .inbound_edges(&node.id)
        .chain(graph.outbound_edges(&node.id))
        .map(|edge| edge.protocol())
        .filter(|p| p.is_request_based())
        .collect();
    let has_edges = graph.inbound_edges(&node.id).next().is_some()
        || graph.outbound_edges(&node.id).next().is_some();

    if requests.is_empty() {
        if has_edges {
            Protocol::Tcp
        } else {
            Protocol::Http
        }
    } else if requests.iter().all(|p| *p == Protocol::Grpc) {
        Protocol::Grpc
    } else {
        Protocol::Http
    }
}
