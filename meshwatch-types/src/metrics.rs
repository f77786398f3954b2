//! Metrics response returned by the mesh console's metrics endpoint.

use std::collections::BTreeMap;

use crate::RawNumber;

/// Metric family name -> series.
///
/// Families are `request_count`, `request_error_count`,
/// `request_duration_millis`, `tcp_sent` and `tcp_received`.
pub type MetricsResponse = BTreeMap<String, Vec<RawMetric>>;

/// One series of a metric family.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RawMetric {
    /// Family name, e.g. `tcp_received`.
    pub name: String,
    /// Statistic for histogram families (`avg`, `0.5`, `0.95`, `0.99`).
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub stat: Option<String>,
    /// Label set identifying the series (`source_workload`, ...).
    pub labels: BTreeMap<String, String>,
    /// `[timestamp_seconds, value]` pairs.
    pub datapoints: Vec<Datapoint>,
}

impl RawMetric {
    /// Create an empty series for the given family.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the statistic.
    pub fn with_stat(mut self, stat: impl Into<String>) -> Self {
        self.stat = Some(stat.into());
        self
    }

    /// Add a label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add a datapoint.
    pub fn with_point(mut self, timestamp: f64, value: impl Into<RawNumber>) -> Self {
        self.datapoints.push(Datapoint(timestamp, value.into()));
        self
    }
}

/// A `[timestamp_seconds, value]` pair.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Datapoint(pub f64, pub RawNumber);

impl Datapoint {
    /// Timestamp in seconds since the Unix epoch.
    pub fn timestamp(&self) -> f64 {
        self.0
    }

    /// The value as sent.
    pub fn value(&self) -> &RawNumber {
        &self.1
    }
}
