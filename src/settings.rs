//! Layered settings.
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. an optional TOML file (`--config`)
//! 3. `MESHWATCH_*` environment variables, `__` between sections
//!    (`MESHWATCH_GRAPH__ENDPOINT`, `MESHWATCH_METRICS__TIMEOUT`)
//! 4. command-line flags, applied by the binary after loading
//!
//! ```toml
//! [graph]
//! endpoint = "http://localhost:20001/kiali/api/namespaces/graph"
//! namespaces = ["bookinfo"]
//! duration = "10m"
//! refresh = "15s"
//!
//! [metrics]
//! timeout = "30s"
//! rate_interval = "1m"
//!
//! [ui]
//! theme = "auto"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File};
use meshwatch_client::{GraphQuery, GraphType};
use serde::Deserialize;

use crate::duration::parse_duration;
use crate::graph::Thresholds;
use crate::metrics::QueryOptions;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub graph: GraphSettings,
    pub metrics: MetricsSettings,
    pub ui: UiSettings,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraphSettings {
    /// Graph endpoint of the mesh console. Unset means file mode.
    pub endpoint: Option<String>,
    /// Read snapshots from this JSON file instead of the network.
    pub file: Option<PathBuf>,
    pub namespaces: Vec<String>,
    pub application: Option<String>,
    pub duration: String,
    pub graph_type: String,
    /// Interval between graph fetches.
    pub refresh: String,
    /// Bearer token sent with every request.
    pub token: Option<String>,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            file: None,
            namespaces: Vec::new(),
            application: None,
            duration: "10m".to_string(),
            graph_type: GraphType::default().as_str().to_string(),
            refresh: "15s".to_string(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsSettings {
    /// Metrics proxy endpoint; derived from the graph endpoint when unset.
    pub endpoint: Option<String>,
    pub timeout: String,
    pub rate_interval: String,
    pub step_points: u32,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        let options = QueryOptions::default();
        Self {
            endpoint: None,
            timeout: "30s".to_string(),
            rate_interval: options.rate_interval,
            step_points: options.step_points,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct UiSettings {
    /// `auto`, `dark` or `light`.
    pub theme: String,
    pub degraded_pct: f64,
    pub failure_pct: f64,
}

impl Default for UiSettings {
    fn default() -> Self {
        let thresholds = Thresholds::default();
        Self {
            theme: "auto".to_string(),
            degraded_pct: thresholds.degraded_pct,
            failure_pct: thresholds.failure_pct,
        }
    }
}

impl Settings {
    /// Load defaults, then the optional file, then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::from_sources(path, environment())
    }

    fn from_sources(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config = builder
            .add_source(env)
            .build()
            .with_context(|| match path {
                Some(p) => format!("Failed to load settings from {}", p.display()),
                None => "Failed to load settings".to_string(),
            })?;
        Ok(config.try_deserialize()?)
    }

    pub fn graph_query(&self) -> Result<GraphQuery> {
        let duration = parse_duration(&self.graph.duration)
            .with_context(|| format!("Invalid graph.duration {:?}", self.graph.duration))?;
        let graph_type = GraphType::parse(&self.graph.graph_type)
            .ok_or_else(|| anyhow!("Unknown graph.graph_type {:?}", self.graph.graph_type))?;

        let mut query = GraphQuery::new(self.graph.namespaces.iter().cloned())
            .with_duration(duration)
            .with_graph_type(graph_type);
        if let Some(ref app) = self.graph.application {
            query = query.with_application(app.clone());
        }
        Ok(query)
    }

    pub fn refresh_interval(&self) -> Result<Duration> {
        parse_duration(&self.graph.refresh)
            .with_context(|| format!("Invalid graph.refresh {:?}", self.graph.refresh))
    }

    pub fn metrics_timeout(&self) -> Result<Duration> {
        parse_duration(&self.metrics.timeout)
            .with_context(|| format!("Invalid metrics.timeout {:?}", self.metrics.timeout))
    }

    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            step_points: self.metrics.step_points.max(1),
            rate_interval: self.metrics.rate_interval.clone(),
            ..QueryOptions::default()
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            degraded_pct: self.ui.degraded_pct,
            failure_pct: self.ui.failure_pct,
        }
    }
}

fn environment() -> Environment {
    Environment::with_prefix("MESHWATCH")
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("graph.namespaces")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::Builder;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        environment().source(Some(map))
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_sources(None, env(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.graph_query().unwrap().duration, Duration::from_secs(600));
        assert_eq!(settings.metrics_timeout().unwrap(), Duration::from_secs(30));
        assert_eq!(settings.refresh_interval().unwrap(), Duration::from_secs(15));
        assert_eq!(settings.thresholds(), Thresholds::default());
    }

    #[test]
    fn test_file_then_env() {
        let mut file = Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [graph]
            endpoint = "http://mesh.local/api/namespaces/graph"
            namespaces = ["bookinfo", "travel"]
            duration = "5m"

            [metrics]
            timeout = "10s"
            "#
        )
        .unwrap();

        let settings = Settings::from_sources(
            Some(file.path()),
            env(&[
                ("MESHWATCH_METRICS__TIMEOUT", "2s"),
                ("MESHWATCH_UI__THEME", "light"),
            ]),
        )
        .unwrap();

        assert_eq!(
            settings.graph.endpoint.as_deref(),
            Some("http://mesh.local/api/namespaces/graph")
        );
        let query = settings.graph_query().unwrap();
        assert_eq!(query.namespaces, vec!["bookinfo", "travel"]);
        assert_eq!(query.duration, Duration::from_secs(300));
        assert_eq!(settings.metrics_timeout().unwrap(), Duration::from_secs(2));
        assert_eq!(settings.ui.theme, "light");
    }

    #[test]
    fn test_env_namespace_list() {
        let settings =
            Settings::from_sources(None, env(&[("MESHWATCH_GRAPH__NAMESPACES", "a,b")])).unwrap();
        assert_eq!(settings.graph.namespaces, vec!["a", "b"]);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = Settings::from_sources(Some(Path::new("/nonexistent/meshwatch.toml")), env(&[]))
            .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/meshwatch.toml"));
    }

    #[test]
    fn test_bad_values_are_reported() {
        let mut settings = Settings::default();
        settings.graph.duration = "forever".to_string();
        assert!(settings.graph_query().is_err());

        let mut settings = Settings::default();
        settings.graph.graph_type = "mesh".to_string();
        assert!(settings.graph_query().is_err());
    }
}
