//! Error-rate health classification.

use super::model::ProtocolRates;

/// Error-percentage thresholds for health status computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Error percentage at or above which traffic is degraded.
    pub degraded_pct: f64,
    /// Error percentage at or above which traffic is failing.
    pub failure_pct: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            degraded_pct: 0.1,
            failure_pct: 20.0,
        }
    }
}

impl Thresholds {
    /// Status for an error percentage. Absent figures are healthy.
    pub fn status(&self, error_pct: Option<f64>) -> HealthStatus {
        match error_pct {
            Some(pct) if pct >= self.failure_pct => HealthStatus::Critical,
            Some(pct) if pct >= self.degraded_pct => HealthStatus::Warning,
            _ => HealthStatus::Healthy,
        }
    }

    /// Status for an edge's traffic.
    pub fn edge_status(&self, rates: &ProtocolRates) -> HealthStatus {
        self.status(rates.request_rates().and_then(|r| r.error_pct))
    }
}

/// Health status for a node or edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "OK",
            HealthStatus::Warning => "WARN",
            HealthStatus::Critical => "CRIT",
        }
    }
}
