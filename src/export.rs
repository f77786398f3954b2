//! Non-interactive export of a normalized snapshot.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{json, Value};

use crate::graph::{
    classify, edge_summary, node_traffic, DirectionalTraffic, HealthStatus, NormalizedGraph,
    Thresholds, TrafficSummary,
};

/// Summarize a snapshot: totals, per-node traffic, per-edge figures and
/// the data-quality warnings raised while normalizing.
pub fn summary(normalized: &NormalizedGraph, thresholds: &Thresholds) -> Value {
    let graph = &normalized.graph;

    let edges: Vec<Value> = graph
        .edges()
        .iter()
        .map(|edge| {
            let summary = edge_summary(edge);
            let health = thresholds.edge_status(&edge.traffic.rates);
            json!({
                "id": edge.id,
                "source": edge.source,
                "target": edge.target,
                "protocol": summary.protocol.as_str(),
                "rate": summary.rate,
                "error_pct": summary.error_pct,
                "success_pct": summary.success_pct,
                "response_time_ms": edge.response_time_ms,
                "throughput": edge.throughput,
                "health": format!("{:?}", health),
            })
        })
        .collect();

    let nodes: Vec<Value> = graph
        .nodes()
        .iter()
        .map(|node| {
            let classification = classify(node);
            let traffic = node_traffic(graph, node);
            json!({
                "id": node.id,
                "kind": node.kind.as_str(),
                "badge": classification.badge.as_str(),
                "title": classification.title,
                "namespace": node.namespace,
                "parent": node.parent_id,
                "flags": node.flags.labels(),
                "inbound": directional(&traffic.inbound),
                "outbound": directional(&traffic.outbound),
            })
        })
        .collect();

    let count = |status: HealthStatus| {
        graph
            .edges()
            .iter()
            .filter(|e| thresholds.edge_status(&e.traffic.rates) == status)
            .count()
    };

    json!({
        "summary": {
            "nodes": graph.node_count(),
            "edges": graph.edge_count(),
            "healthy_edges": count(HealthStatus::Healthy),
            "warning_edges": count(HealthStatus::Warning),
            "critical_edges": count(HealthStatus::Critical),
            "timestamp": graph.timestamp(),
            "duration_secs": graph.duration_secs(),
        },
        "nodes": nodes,
        "edges": edges,
        "warnings": normalized
            .report
            .warnings
            .iter()
            .map(|w| w.to_string())
            .collect::<Vec<_>>(),
    })
}

fn directional(traffic: &DirectionalTraffic) -> Value {
    json!({
        "http": totals(&traffic.http),
        "grpc": totals(&traffic.grpc),
    })
}

fn totals(summary: &TrafficSummary) -> Value {
    json!({
        "edges": summary.edge_count,
        "rate": summary.total_rate,
        "error_pct": summary.aggregate_error_pct,
    })
}

/// Write an export as pretty JSON.
pub fn write(path: &Path, value: &Value) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write export to {}", path.display()))?;
    Ok(())
}
