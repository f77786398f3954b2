//! Graph query parameters.

use std::time::Duration;

/// Appenders requested when none are configured.
///
/// Each appender decorates the graph with one family of fields
/// (dead nodes, sidecar checks, service entries, ...).
pub const DEFAULT_APPENDERS: &[&str] = &[
    "deadNode",
    "istio",
    "serviceEntry",
    "sidecarsCheck",
    "responseTime",
    "throughput",
    "securityPolicy",
];

/// Graph flavour requested from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GraphType {
    App,
    #[default]
    VersionedApp,
    Workload,
    Service,
}

impl GraphType {
    /// Query-string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            GraphType::App => "app",
            GraphType::VersionedApp => "versionedApp",
            GraphType::Workload => "workload",
            GraphType::Service => "service",
        }
    }

    /// Parse a query-string value.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "app" => Some(GraphType::App),
            "versionedApp" => Some(GraphType::VersionedApp),
            "workload" => Some(GraphType::Workload),
            "service" => Some(GraphType::Service),
            _ => None,
        }
    }
}

/// The scoping parameters of a graph fetch.
///
/// Two queries with the same identity produce comparable snapshots; a
/// change in namespaces, application or duration invalidates whatever the
/// user had selected in the previous snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GraphQuery {
    pub namespaces: Vec<String>,
    pub application: Option<String>,
    pub duration: Duration,
    pub graph_type: GraphType,
    pub appenders: Vec<String>,
}

impl GraphQuery {
    /// Query a set of namespaces over the default ten-minute window.
    pub fn new<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            namespaces: namespaces.into_iter().map(Into::into).collect(),
            application: None,
            duration: Duration::from_secs(600),
            graph_type: GraphType::default(),
            appenders: DEFAULT_APPENDERS.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Scope the graph to one application.
    pub fn with_application(mut self, app: impl Into<String>) -> Self {
        self.application = Some(app.into());
        self
    }

    /// Set the covered duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set the graph type.
    pub fn with_graph_type(mut self, graph_type: GraphType) -> Self {
        self.graph_type = graph_type;
        self
    }

    /// Query-string parameters for the graph endpoint.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("namespaces", self.namespaces.join(",")),
            ("duration", format!("{}s", self.duration.as_secs())),
            ("graphType", self.graph_type.as_str().to_string()),
            ("injectServiceNodes", "true".to_string()),
        ];
        if !self.appenders.is_empty() {
            params.push(("appenders", self.appenders.join(",")));
        }
        if let Some(ref app) = self.application {
            params.push(("app", app.clone()));
        }
        params
    }

    /// Short human description, e.g. `bookinfo (10m)`.
    pub fn describe(&self) -> String {
        let scope = match self.application {
            Some(ref app) => format!("{}/{}", self.namespaces.join(","), app),
            None => self.namespaces.join(","),
        };
        let secs = self.duration.as_secs();
        let window = if secs % 3600 == 0 && secs > 0 {
            format!("{}h", secs / 3600)
        } else if secs % 60 == 0 && secs > 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        };
        format!("{} ({})", scope, window)
    }
}
