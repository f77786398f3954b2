//! Raw metrics -> chart-ready series.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use meshwatch_types::{MetricsResponse, RawMetric, RawNumber};
use tracing::debug;

use super::query::QuerySpec;

/// One datapoint of a series.
///
/// `value` is `None` where the backend reported a non-numeric value
/// (usually `"NaN"`); charts show a gap there, never a zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricPoint {
    pub timestamp: DateTime<Utc>,
    pub value: Option<f64>,
}

/// A labelled series.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSeries {
    /// Human label, e.g. `TCP Received`.
    pub name: String,
    /// Metric family the series came from, e.g. `tcp_received`.
    pub family: String,
    pub labels: BTreeMap<String, String>,
    pub points: Vec<MetricPoint>,
}

impl MetricsSeries {
    /// Most recent numeric value.
    pub fn latest(&self) -> Option<f64> {
        self.points.iter().rev().find_map(|p| p.value)
    }

    /// Numeric values only, for sparklines.
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().filter_map(|p| p.value).collect()
    }
}

/// Names a raw series for display.
pub trait LabelResolver {
    fn resolve(&self, metric: &RawMetric) -> String;
}

impl<F> LabelResolver for F
where
    F: Fn(&RawMetric) -> String,
{
    fn resolve(&self, metric: &RawMetric) -> String {
        self(metric)
    }
}

/// Labels for the mesh's standard metric families.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeshLabels;

impl LabelResolver for MeshLabels {
    fn resolve(&self, metric: &RawMetric) -> String {
        match (metric.name.as_str(), metric.stat.as_deref()) {
            ("request_duration_millis", Some(stat)) => stat_label(stat),
            ("request_duration_millis", None) => "Request Duration".to_string(),
            ("request_count", _) => "Request Count".to_string(),
            ("request_error_count", _) => "Request Error Count".to_string(),
            ("tcp_sent", _) => "TCP Sent".to_string(),
            ("tcp_received", _) => "TCP Received".to_string(),
            (other, _) => other.to_string(),
        }
    }
}

fn stat_label(stat: &str) -> String {
    match stat {
        "avg" => "Average".to_string(),
        "0.5" => "Median".to_string(),
        "0.95" => "95th Percentile".to_string(),
        "0.99" => "99th Percentile".to_string(),
        "0.999" => "99.9th Percentile".to_string(),
        other => other.to_string(),
    }
}

/// Convert raw series, preserving their order.
pub fn convert(raw: &[RawMetric], resolver: &dyn LabelResolver) -> Vec<MetricsSeries> {
    raw.iter().map(|metric| convert_one(metric, resolver)).collect()
}

fn convert_one(metric: &RawMetric, resolver: &dyn LabelResolver) -> MetricsSeries {
    let points = metric
        .datapoints
        .iter()
        .filter_map(|dp| {
            let timestamp = to_timestamp(dp.timestamp());
            if timestamp.is_none() {
                debug!(family = %metric.name, ts = dp.timestamp(), "dropping datapoint with invalid timestamp");
            }
            Some(MetricPoint {
                timestamp: timestamp?,
                value: to_value(dp.value()),
            })
        })
        .collect();

    MetricsSeries {
        name: resolver.resolve(metric),
        family: metric.name.clone(),
        labels: metric.labels.clone(),
        points,
    }
}

fn to_timestamp(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.trunc();
    let nanos = ((secs - whole) * 1e9).round().clamp(0.0, 999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

fn to_value(raw: &RawNumber) -> Option<f64> {
    raw.to_f64().filter(|v| !v.is_nan())
}

/// Convert a whole metrics response for `spec`.
///
/// Families are taken in the order of `spec.filters`, so a chart always
/// lists e.g. sent before received. For edge queries, series whose peer
/// label does not match are dropped. A missing response is zero series.
pub fn convert_response(
    response: Option<&MetricsResponse>,
    spec: &QuerySpec,
    resolver: &dyn LabelResolver,
) -> Vec<MetricsSeries> {
    let Some(response) = response else {
        return Vec::new();
    };

    let mut series = Vec::new();
    for family in &spec.filters {
        let Some(raw) = response.get(family) else {
            continue;
        };
        let matching: Vec<RawMetric> = raw
            .iter()
            .filter(|m| match spec.peer_filter {
                Some(ref peer) => m.labels.get(&peer.label) == Some(&peer.value),
                None => true,
            })
            .cloned()
            .collect();
        series.extend(convert(&matching, resolver));
    }
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Protocol;
    use crate::metrics::query::{Direction, EntityKind, PeerFilter, Reporter};

    fn tcp_spec(peer: Option<PeerFilter>) -> QuerySpec {
        QuerySpec {
            namespace: "bookinfo".to_string(),
            cluster: None,
            entity_kind: EntityKind::Workloads,
            entity_name: "ratings-v1".to_string(),
            by_labels: vec!["source_workload".to_string()],
            direction: Direction::Inbound,
            reporter: Reporter::Destination,
            filters: crate::metrics::query::filters_for(Protocol::Tcp),
            request_protocol: None,
            peer_filter: peer,
        }
    }

    #[test]
    fn test_nan_is_null_and_numbers_parse() {
        let raw = vec![RawMetric::new("tcp_received")
            .with_point(1_700_000_000.0, "NaN")
            .with_point(1_700_000_015.0, "12.5")
            .with_point(1_700_000_030.0, "garbage")
            .with_point(1_700_000_045.0, 3.0)];

        let series = convert(&raw, &MeshLabels);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].name, "TCP Received");
        let values: Vec<Option<f64>> = series[0].points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![None, Some(12.5), None, Some(3.0)]);
        assert_eq!(series[0].points[1].timestamp.timestamp(), 1_700_000_015);
        assert_eq!(series[0].latest(), Some(3.0));
    }

    #[test]
    fn test_order_is_preserved() {
        let raw = vec![
            RawMetric::new("request_duration_millis").with_stat("0.99"),
            RawMetric::new("request_duration_millis").with_stat("avg"),
            RawMetric::new("custom_family"),
        ];
        let names: Vec<String> = convert(&raw, &MeshLabels).into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["99th Percentile", "Average", "custom_family"]);
    }

    #[test]
    fn test_closure_resolver() {
        let raw = vec![RawMetric::new("tcp_sent")];
        let resolver = |m: &RawMetric| m.name.to_uppercase();
        assert_eq!(convert(&raw, &resolver)[0].name, "TCP_SENT");
    }

    #[test]
    fn test_response_filters_by_peer_in_family_order() {
        let mut response = MetricsResponse::new();
        response.insert(
            "tcp_received".to_string(),
            vec![
                RawMetric::new("tcp_received").with_label("source_workload", "reviews-v1"),
                RawMetric::new("tcp_received").with_label("source_workload", "other"),
            ],
        );
        response.insert(
            "tcp_sent".to_string(),
            vec![RawMetric::new("tcp_sent").with_label("source_workload", "reviews-v1")],
        );

        let peer = PeerFilter {
            label: "source_workload".to_string(),
            value: "reviews-v1".to_string(),
        };
        let series = convert_response(Some(&response), &tcp_spec(Some(peer)), &MeshLabels);
        let names: Vec<&str> = series.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["TCP Sent", "TCP Received"]);

        let unfiltered = convert_response(Some(&response), &tcp_spec(None), &MeshLabels);
        assert_eq!(unfiltered.len(), 3);
    }

    #[test]
    fn test_missing_response_is_zero_series() {
        assert!(convert_response(None, &tcp_spec(None), &MeshLabels).is_empty());
    }
}
