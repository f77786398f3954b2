//! Metrics fetch coordination.
//!
//! Each selection change issues at most one fetch. Results travel back over
//! a channel tagged with the selection epoch and the request sequence that
//! produced them:
//!
//! ```text
//! request(epoch, MetricsRequest) ──spawn──> fetcher.fetch_metrics(path)
//!        │ aborts previous task                 │ timeout -> ClientError::Timeout
//!        ▼                                      ▼
//!   MetricsPanel::Loading       mpsc ──> FetchOutcome { epoch, seq, result }
//!                                               │
//! poll(current_epoch) <─────────────────────────┘  stale epochs or seqs are dropped
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use meshwatch_client::ClientError;
use meshwatch_types::MetricsResponse;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::convert::{convert_response, MeshLabels, MetricsSeries};
use super::query::{MetricsRequest, NoQueryReason, QueryOptions, QuerySpec};
use super::window::TimeWindow;

/// Anything that can answer a metrics query path.
#[async_trait]
pub trait MetricsFetcher: Send + Sync {
    async fn fetch_metrics(&self, path: &str) -> Result<Option<MetricsResponse>, ClientError>;
}

#[cfg(feature = "http")]
#[async_trait]
impl MetricsFetcher for meshwatch_client::MeshClient {
    async fn fetch_metrics(&self, path: &str) -> Result<Option<MetricsResponse>, ClientError> {
        meshwatch_client::MeshClient::fetch_metrics(self, path).await
    }
}

/// State of the metrics section of the detail panel.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsPanel {
    /// Nothing selected.
    Idle,
    /// The selection has no metrics to query.
    Unavailable(NoQueryReason),
    Loading(QuerySpec),
    /// The query succeeded with zero series.
    NoData,
    /// The query failed; the user may retry.
    Failed(ClientError),
    Ready(Vec<MetricsSeries>),
}

/// A completed fetch.
#[derive(Debug)]
pub struct FetchOutcome {
    pub epoch: u64,
    /// Sequence of the request within the coordinator; a re-request under
    /// the same epoch gets a new one.
    pub seq: u64,
    pub result: Result<Vec<MetricsSeries>, ClientError>,
}

/// Issues metrics fetches and folds their results into a [`MetricsPanel`].
pub struct MetricsCoordinator {
    fetcher: Arc<dyn MetricsFetcher>,
    options: QueryOptions,
    timeout: Duration,
    runtime: Handle,
    tx: mpsc::UnboundedSender<FetchOutcome>,
    rx: mpsc::UnboundedReceiver<FetchOutcome>,
    in_flight: Option<JoinHandle<()>>,
    pending_epoch: Option<u64>,
    next_seq: u64,
    pending_seq: Option<u64>,
    last_request: Option<(u64, QuerySpec, TimeWindow)>,
    panel: MetricsPanel,
}

impl std::fmt::Debug for MetricsCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCoordinator")
            .field("timeout", &self.timeout)
            .field("pending_epoch", &self.pending_epoch)
            .field("pending_seq", &self.pending_seq)
            .field("panel", &self.panel)
            .finish()
    }
}

impl MetricsCoordinator {
    pub fn new(
        fetcher: Arc<dyn MetricsFetcher>,
        options: QueryOptions,
        timeout: Duration,
        runtime: Handle,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            fetcher,
            options,
            timeout,
            runtime,
            tx,
            rx,
            in_flight: None,
            pending_epoch: None,
            next_seq: 0,
            pending_seq: None,
            last_request: None,
            panel: MetricsPanel::Idle,
        }
    }

    pub fn panel(&self) -> &MetricsPanel {
        &self.panel
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.panel, MetricsPanel::Loading(_))
    }

    /// Start fetching for the selection identified by `epoch`.
    ///
    /// Any fetch still running for an earlier selection is aborted.
    pub fn request(&mut self, epoch: u64, request: MetricsRequest, window: TimeWindow) {
        self.abort_in_flight();

        match request {
            MetricsRequest::NoQuery(reason) => {
                debug!(epoch, %reason, "no metrics query for selection");
                self.last_request = None;
                self.panel = MetricsPanel::Unavailable(reason);
            }
            MetricsRequest::Query(spec) => self.spawn(epoch, spec, window),
        }
    }

    /// Re-issue the last query after a failure.
    pub fn retry(&mut self) -> bool {
        match self.last_request.take() {
            Some((epoch, spec, window)) => {
                self.abort_in_flight();
                self.spawn(epoch, spec, window);
                true
            }
            None => false,
        }
    }

    /// Drop whatever is in flight and return to idle.
    pub fn cancel(&mut self) {
        self.abort_in_flight();
        self.last_request = None;
        self.panel = MetricsPanel::Idle;
    }

    /// Apply finished fetches without blocking.
    ///
    /// Returns true if the panel changed.
    pub fn poll(&mut self, current_epoch: u64) -> bool {
        let mut changed = false;
        while let Ok(outcome) = self.rx.try_recv() {
            changed |= self.apply(outcome, current_epoch);
        }
        changed
    }

    /// Wait for the next finished fetch and apply it.
    ///
    /// Returns true if the outcome was current and changed the panel.
    pub async fn recv(&mut self, current_epoch: u64) -> bool {
        match self.rx.recv().await {
            Some(outcome) => self.apply(outcome, current_epoch),
            None => false,
        }
    }

    fn spawn(&mut self, epoch: u64, spec: QuerySpec, window: TimeWindow) {
        let path = spec.path(&window, &self.options);
        self.next_seq += 1;
        let seq = self.next_seq;
        debug!(epoch, seq, query = %spec.describe(), "fetching metrics");

        let fetcher = self.fetcher.clone();
        let tx = self.tx.clone();
        let timeout = self.timeout;
        let task_spec = spec.clone();

        let handle = self.runtime.spawn(async move {
            let result = match tokio::time::timeout(timeout, fetcher.fetch_metrics(&path)).await {
                Ok(Ok(response)) => Ok(convert_response(response.as_ref(), &task_spec, &MeshLabels)),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(ClientError::Timeout),
            };
            // The coordinator may be gone by now; nothing to report to.
            let _ = tx.send(FetchOutcome { epoch, seq, result });
        });

        self.in_flight = Some(handle);
        self.pending_epoch = Some(epoch);
        self.pending_seq = Some(seq);
        self.panel = MetricsPanel::Loading(spec.clone());
        self.last_request = Some((epoch, spec, window));
    }

    fn abort_in_flight(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
        self.pending_epoch = None;
        self.pending_seq = None;
    }

    fn apply(&mut self, outcome: FetchOutcome, current_epoch: u64) -> bool {
        if outcome.epoch != current_epoch
            || self.pending_epoch != Some(outcome.epoch)
            || self.pending_seq != Some(outcome.seq)
        {
            debug!(
                epoch = outcome.epoch,
                seq = outcome.seq,
                current_epoch,
                "discarding stale metrics result"
            );
            return false;
        }

        self.in_flight = None;
        self.pending_epoch = None;
        self.pending_seq = None;
        self.panel = match outcome.result {
            Ok(series) if series.is_empty() => MetricsPanel::NoData,
            Ok(series) => MetricsPanel::Ready(series),
            Err(e) => {
                warn!(error = %e, retryable = e.is_retryable(), "metrics fetch failed");
                MetricsPanel::Failed(e)
            }
        };
        true
    }
}

impl Drop for MetricsCoordinator {
    fn drop(&mut self) {
        self.abort_in_flight();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Protocol;
    use crate::metrics::query::{filters_for, Direction, EntityKind, Reporter};
    use chrono::{TimeZone, Utc};
    use meshwatch_types::RawMetric;
    use std::sync::Mutex;

    enum Reply {
        Series(Option<MetricsResponse>),
        Fail(ClientError),
        Hang,
        /// Hang on paths containing the marker, answer everything else.
        HangOn(&'static str, MetricsResponse),
    }

    struct FakeFetcher {
        reply: Reply,
        paths: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                paths: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MetricsFetcher for FakeFetcher {
        async fn fetch_metrics(&self, path: &str) -> Result<Option<MetricsResponse>, ClientError> {
            self.paths.lock().unwrap().push(path.to_string());
            match self.reply {
                Reply::Series(ref response) => Ok(response.clone()),
                Reply::Fail(ref e) => Err(e.clone()),
                Reply::Hang => std::future::pending().await,
                Reply::HangOn(marker, _) if path.contains(marker) => {
                    std::future::pending().await
                }
                Reply::HangOn(_, ref response) => Ok(Some(response.clone())),
            }
        }
    }

    fn spec() -> QuerySpec {
        QuerySpec {
            namespace: "bookinfo".to_string(),
            cluster: None,
            entity_kind: EntityKind::Services,
            entity_name: "reviews".to_string(),
            by_labels: vec!["source_workload".to_string()],
            direction: Direction::Inbound,
            reporter: Reporter::Destination,
            filters: filters_for(Protocol::Tcp),
            request_protocol: None,
            peer_filter: None,
        }
    }

    fn window() -> TimeWindow {
        TimeWindow::ending_at(
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            Duration::from_secs(600),
        )
    }

    fn coordinator(fetcher: Arc<FakeFetcher>, timeout: Duration) -> MetricsCoordinator {
        MetricsCoordinator::new(fetcher, QueryOptions::default(), timeout, Handle::current())
    }

    fn tcp_response() -> MetricsResponse {
        let mut response = MetricsResponse::new();
        response.insert(
            "tcp_sent".to_string(),
            vec![RawMetric::new("tcp_sent").with_point(1_700_000_000.0, "10")],
        );
        response
    }

    #[tokio::test]
    async fn test_ready_after_fetch() {
        let fetcher = FakeFetcher::new(Reply::Series(Some(tcp_response())));
        let mut metrics = coordinator(fetcher.clone(), Duration::from_secs(5));

        metrics.request(1, MetricsRequest::Query(spec()), window());
        assert!(metrics.is_loading());
        assert!(metrics.recv(1).await);

        match metrics.panel() {
            MetricsPanel::Ready(series) => assert_eq!(series[0].name, "TCP Sent"),
            other => panic!("unexpected panel {:?}", other),
        }
        let paths = fetcher.paths.lock().unwrap();
        assert!(paths[0].starts_with("namespaces/bookinfo/services/reviews/metrics?"));
    }

    #[tokio::test]
    async fn test_null_response_is_no_data() {
        let fetcher = FakeFetcher::new(Reply::Series(None));
        let mut metrics = coordinator(fetcher, Duration::from_secs(5));

        metrics.request(1, MetricsRequest::Query(spec()), window());
        assert!(metrics.recv(1).await);
        assert_eq!(metrics.panel(), &MetricsPanel::NoData);
    }

    #[tokio::test]
    async fn test_failure_then_retry() {
        let fetcher = FakeFetcher::new(Reply::Fail(ClientError::Status(503)));
        let mut metrics = coordinator(fetcher.clone(), Duration::from_secs(5));

        metrics.request(4, MetricsRequest::Query(spec()), window());
        assert!(metrics.recv(4).await);
        assert_eq!(metrics.panel(), &MetricsPanel::Failed(ClientError::Status(503)));

        assert!(metrics.retry());
        assert!(metrics.is_loading());
        assert!(metrics.recv(4).await);
        assert_eq!(fetcher.paths.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stale_result_is_discarded() {
        let fetcher = FakeFetcher::new(Reply::Series(Some(tcp_response())));
        let mut metrics = coordinator(fetcher, Duration::from_secs(5));

        metrics.request(1, MetricsRequest::Query(spec()), window());
        // The selection moved on before the result was applied.
        assert!(!metrics.recv(2).await);
        assert!(metrics.is_loading());
    }

    #[tokio::test]
    async fn test_timeout_surfaces_as_failure() {
        let fetcher = FakeFetcher::new(Reply::Hang);
        let mut metrics = coordinator(fetcher, Duration::from_millis(20));

        metrics.request(1, MetricsRequest::Query(spec()), window());
        assert!(metrics.recv(1).await);
        assert_eq!(metrics.panel(), &MetricsPanel::Failed(ClientError::Timeout));
    }

    #[tokio::test]
    async fn test_no_query_and_cancel() {
        let fetcher = FakeFetcher::new(Reply::Hang);
        let mut metrics = coordinator(fetcher.clone(), Duration::from_secs(5));

        metrics.request(1, MetricsRequest::NoQuery(NoQueryReason::UnknownNamespace), window());
        assert_eq!(
            metrics.panel(),
            &MetricsPanel::Unavailable(NoQueryReason::UnknownNamespace)
        );
        assert!(!metrics.retry());

        metrics.request(2, MetricsRequest::Query(spec()), window());
        metrics.cancel();
        assert_eq!(metrics.panel(), &MetricsPanel::Idle);
        assert!(!metrics.poll(2));
    }

    #[tokio::test]
    async fn test_rerequest_same_epoch_drops_earlier_result() {
        let fetcher = FakeFetcher::new(Reply::HangOn("direction=outbound", tcp_response()));
        let mut metrics = coordinator(fetcher.clone(), Duration::from_secs(5));

        metrics.request(1, MetricsRequest::Query(spec()), window());
        // Let the inbound answer reach the channel before switching direction.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let outbound = QuerySpec {
            direction: Direction::Outbound,
            reporter: Reporter::Source,
            ..spec()
        };
        metrics.request(1, MetricsRequest::Query(outbound), window());

        assert!(!metrics.poll(1));
        assert!(matches!(
            metrics.panel(),
            MetricsPanel::Loading(pending) if pending.direction == Direction::Outbound
        ));
        assert_eq!(fetcher.paths.lock().unwrap().len(), 2);
    }
}
