//! Mesh console client using the console's HTTP API.
//!
//! Two endpoints are consumed:
//!
//! - **Graph**: `GET <graph-endpoint>?namespaces=..&duration=..&appenders=..`
//!   returning `{elements: {nodes, edges}}`
//! - **Metrics**: `GET <metrics-endpoint>?url=<urlencoded query path>`
//!   returning a map of metric family -> series (or `null`)
//!
//! ## Example
//!
//! ```rust,no_run
//! use meshwatch_client::{GraphQuery, MeshClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = MeshClient::builder()
//!         .graph_endpoint("http://localhost:20001/kiali/api/namespaces/graph")
//!         .metrics_endpoint("http://localhost:20001/proxy/metrics")
//!         .build()?;
//!
//!     let payload = client.fetch_graph(&GraphQuery::new(["bookinfo"])).await?;
//!     println!("Fetched {} nodes", payload.node_count());
//!     Ok(())
//! }
//! ```

use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use tracing::debug;

use meshwatch_types::{GraphPayload, MetricsResponse};

use crate::{ClientError, GraphQuery};

/// Client for the mesh console graph and metrics endpoints.
#[derive(Debug, Clone)]
pub struct MeshClient {
    client: Client,
    graph_endpoint: String,
    metrics_endpoint: String,
    token: Option<String>,
}

impl MeshClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> MeshClientBuilder {
        MeshClientBuilder::default()
    }

    /// The configured graph endpoint.
    pub fn graph_endpoint(&self) -> &str {
        &self.graph_endpoint
    }

    /// Fetch a topology snapshot.
    pub async fn fetch_graph(&self, query: &GraphQuery) -> Result<GraphPayload, ClientError> {
        debug!(endpoint = %self.graph_endpoint, query = %query.describe(), "fetching graph");

        let request = self.client.get(&self.graph_endpoint).query(&query.params());
        let response = self.authorize(request).send().await?;
        let response = check_status(response)?;

        response
            .json::<GraphPayload>()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    /// Fetch metrics for a mesh-metrics query path.
    ///
    /// A `null` body resolves to `Ok(None)`; callers treat it as zero series.
    pub async fn fetch_metrics(&self, path: &str) -> Result<Option<MetricsResponse>, ClientError> {
        debug!(endpoint = %self.metrics_endpoint, path, "fetching metrics");

        let request = self.client.get(&self.metrics_endpoint).query(&[("url", path)]);
        let response = self.authorize(request).send().await?;
        let response = check_status(response)?;

        response
            .json::<Option<MetricsResponse>>()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => request.bearer_auth(token),
            None => request,
        }
    }
}

fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(ClientError::Auth(format!("API returned status {}", status)));
    }

    if !status.is_success() {
        return Err(ClientError::Status(status.as_u16()));
    }

    Ok(response)
}

/// Builder for MeshClient.
#[derive(Debug, Default)]
pub struct MeshClientBuilder {
    graph_endpoint: Option<String>,
    metrics_endpoint: Option<String>,
    token: Option<String>,
    timeout: Option<Duration>,
}

impl MeshClientBuilder {
    /// Set the graph endpoint (e.g., "http://localhost:20001/kiali/api/namespaces/graph").
    pub fn graph_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.graph_endpoint = Some(endpoint.into());
        self
    }

    /// Set the metrics proxy endpoint.
    pub fn metrics_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.metrics_endpoint = Some(endpoint.into());
        self
    }

    /// Set a bearer token sent with every request.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the request timeout (default: 30 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<MeshClient, ClientError> {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(30));

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        let graph_endpoint = self
            .graph_endpoint
            .unwrap_or_else(|| "http://localhost:20001/kiali/api/namespaces/graph".to_string());
        let metrics_endpoint = self
            .metrics_endpoint
            .unwrap_or_else(|| derive_metrics_endpoint(&graph_endpoint));

        Ok(MeshClient {
            client,
            graph_endpoint: trim_trailing_slash(graph_endpoint),
            metrics_endpoint: trim_trailing_slash(metrics_endpoint),
            token: self.token,
        })
    }
}

// The metrics proxy lives next to the graph endpoint unless configured.
fn derive_metrics_endpoint(graph_endpoint: &str) -> String {
    match graph_endpoint.find("/api/") {
        Some(idx) => format!("{}/api/metrics", &graph_endpoint[..idx]),
        None => format!("{}/metrics", graph_endpoint.trim_end_matches('/')),
    }
}

fn trim_trailing_slash(s: String) -> String {
    match s.strip_suffix('/') {
        Some(trimmed) => trimmed.to_string(),
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let client = MeshClient::builder().build().unwrap();
        assert_eq!(
            client.graph_endpoint,
            "http://localhost:20001/kiali/api/namespaces/graph"
        );
        assert_eq!(client.metrics_endpoint, "http://localhost:20001/kiali/api/metrics");
        assert!(client.token.is_none());
    }

    #[test]
    fn test_builder_custom() {
        let client = MeshClient::builder()
            .graph_endpoint("http://mesh.local/graph/")
            .metrics_endpoint("http://mesh.local/metrics")
            .token("secret")
            .build()
            .unwrap();

        assert_eq!(client.graph_endpoint, "http://mesh.local/graph");
        assert_eq!(client.metrics_endpoint, "http://mesh.local/metrics");
        assert_eq!(client.token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_derive_metrics_endpoint() {
        assert_eq!(
            derive_metrics_endpoint("http://h/kiali/api/namespaces/graph"),
            "http://h/kiali/api/metrics"
        );
        assert_eq!(derive_metrics_endpoint("http://h/graph"), "http://h/graph/metrics");
    }
}
