//! Polling graph source backed by the mesh console.
//!
//! A background task fetches on a fixed interval and whenever the UI asks
//! for a refresh or a new scope. Every result is tagged with the query it
//! answered; results for a query the UI has since moved away from are
//! dropped in `poll`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use meshwatch_client::{ClientError, GraphQuery};
use meshwatch_types::GraphPayload;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

use super::GraphSource;

/// Anything that can answer a graph query.
#[async_trait]
pub trait GraphFetcher: Send + Sync {
    async fn fetch_graph(&self, query: &GraphQuery) -> Result<GraphPayload, ClientError>;
}

#[cfg(feature = "http")]
#[async_trait]
impl GraphFetcher for meshwatch_client::MeshClient {
    async fn fetch_graph(&self, query: &GraphQuery) -> Result<GraphPayload, ClientError> {
        meshwatch_client::MeshClient::fetch_graph(self, query).await
    }
}

type Answer = (GraphQuery, Result<GraphPayload, ClientError>);

/// A source that polls a [`GraphFetcher`] from a background task.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use async_trait::async_trait;
/// use meshwatch::source::{GraphFetcher, GraphSource, HttpSource};
/// use meshwatch_client::{ClientError, GraphQuery};
/// use meshwatch_types::GraphPayload;
///
/// struct Fixture;
///
/// #[async_trait]
/// impl GraphFetcher for Fixture {
///     async fn fetch_graph(&self, _query: &GraphQuery) -> Result<GraphPayload, ClientError> {
///         Ok(GraphPayload::builder().node("a", |n| n.app("a")).build())
///     }
/// }
///
/// # tokio_test::block_on(async {
/// let mut source = HttpSource::with_fetcher(
///     Arc::new(Fixture),
///     GraphQuery::new(["bookinfo"]),
///     Duration::from_secs(15),
///     &tokio::runtime::Handle::current(),
///     "fixture",
/// );
/// tokio::time::sleep(Duration::from_millis(10)).await;
/// assert!(source.poll().is_some());
/// # });
/// ```
#[derive(Debug)]
pub struct HttpSource {
    description: String,
    query: GraphQuery,
    commands: mpsc::UnboundedSender<GraphQuery>,
    answers: mpsc::UnboundedReceiver<Answer>,
    task: JoinHandle<()>,
    last_error: Option<String>,
}

impl HttpSource {
    /// Start polling `client` for `query` every `refresh`.
    #[cfg(feature = "http")]
    pub fn new(
        client: meshwatch_client::MeshClient,
        query: GraphQuery,
        refresh: Duration,
        runtime: &Handle,
    ) -> Self {
        let description = format!("http: {}", client.graph_endpoint());
        Self::with_fetcher(Arc::new(client), query, refresh, runtime, description)
    }

    /// Start polling any [`GraphFetcher`].
    pub fn with_fetcher(
        fetcher: Arc<dyn GraphFetcher>,
        query: GraphQuery,
        refresh: Duration,
        runtime: &Handle,
        description: impl Into<String>,
    ) -> Self {
        let (commands, mut command_rx) = mpsc::unbounded_channel::<GraphQuery>();
        let (answer_tx, answers) = mpsc::unbounded_channel::<Answer>();
        let refresh = refresh.max(Duration::from_millis(100));
        let initial = query.clone();

        let task = runtime.spawn(async move {
            let mut current = initial;
            let mut ticker = tokio::time::interval(refresh);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    command = command_rx.recv() => match command {
                        Some(query) => {
                            current = query;
                            ticker.reset();
                        }
                        None => break,
                    },
                }

                debug!(query = %current.describe(), "fetching graph");
                let result = fetcher.fetch_graph(&current).await;
                if answer_tx.send((current.clone(), result)).is_err() {
                    break;
                }
            }
        });

        Self {
            description: description.into(),
            query,
            commands,
            answers,
            task,
            last_error: None,
        }
    }

    pub fn query(&self) -> &GraphQuery {
        &self.query
    }
}

impl GraphSource for HttpSource {
    fn poll(&mut self) -> Option<GraphPayload> {
        let mut latest = None;
        while let Ok((query, result)) = self.answers.try_recv() {
            if query != self.query {
                trace!(query = %query.describe(), "dropping graph for previous scope");
                continue;
            }
            match result {
                Ok(payload) => {
                    self.last_error = None;
                    latest = Some(payload);
                }
                Err(e) => {
                    warn!(error = %e, "graph fetch failed");
                    self.last_error = Some(e.to_string());
                }
            }
        }
        latest
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn set_query(&mut self, query: &GraphQuery) {
        self.query = query.clone();
        self.last_error = None;
        let _ = self.commands.send(query.clone());
    }

    fn refresh(&mut self) {
        let _ = self.commands.send(self.query.clone());
    }
}

impl Drop for HttpSource {
    fn drop(&mut self) {
        self.task.abort();
    }
}
