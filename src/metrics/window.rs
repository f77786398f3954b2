//! Query time windows.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::graph::TopologyGraph;

/// The interval a metrics query covers, as `(end, duration)`.
///
/// Windows are plain values. Nothing here reads the clock; callers pass
/// `now` in so that query building stays a pure function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    end: DateTime<Utc>,
    duration: Duration,
}

impl TimeWindow {
    pub fn ending_at(end: DateTime<Utc>, duration: Duration) -> Self {
        Self { end, duration }
    }

    /// The window a graph snapshot describes.
    ///
    /// Uses the snapshot's own timestamp and duration when present, falling
    /// back to `now` and `default_duration`.
    pub fn for_graph(graph: &TopologyGraph, default_duration: Duration, now: DateTime<Utc>) -> Self {
        let end = graph
            .timestamp()
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or(now);
        let duration = graph
            .duration_secs()
            .filter(|&secs| secs > 0)
            .map(|secs| Duration::from_secs(secs as u64))
            .unwrap_or(default_duration);
        Self { end, duration }
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn start(&self) -> DateTime<Utc> {
        chrono::Duration::from_std(self.duration)
            .ok()
            .and_then(|d| self.end.checked_sub_signed(d))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Query time as Unix seconds.
    pub fn query_time(&self) -> i64 {
        self.end.timestamp()
    }

    pub fn duration_secs(&self) -> u64 {
        self.duration.as_secs()
    }

    /// Step in seconds that yields roughly `points` datapoints; at least 1.
    pub fn step_secs(&self, points: u32) -> u64 {
        (self.duration_secs() / u64::from(points.max(1))).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::normalize;
    use meshwatch_types::GraphPayload;

    #[test]
    fn test_step_never_zero() {
        let end = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(TimeWindow::ending_at(end, Duration::from_secs(600)).step_secs(30), 20);
        assert_eq!(TimeWindow::ending_at(end, Duration::from_secs(10)).step_secs(30), 1);
        assert_eq!(TimeWindow::ending_at(end, Duration::from_secs(60)).step_secs(0), 60);
    }

    #[test]
    fn test_start_precedes_end() {
        let end = Utc.timestamp_opt(1_700_000_600, 0).unwrap();
        let window = TimeWindow::ending_at(end, Duration::from_secs(600));
        assert_eq!(window.start().timestamp(), 1_700_000_000);
        assert_eq!(window.query_time(), 1_700_000_600);
    }

    #[test]
    fn test_window_from_graph() {
        let now = Utc.timestamp_opt(42, 0).unwrap();
        let stamped = normalize(&GraphPayload::builder().timestamp(1000).duration(300).build()).graph;
        let window = TimeWindow::for_graph(&stamped, Duration::from_secs(600), now);
        assert_eq!(window.query_time(), 1000);
        assert_eq!(window.duration_secs(), 300);

        let bare = normalize(&GraphPayload::default()).graph;
        let window = TimeWindow::for_graph(&bare, Duration::from_secs(600), now);
        assert_eq!(window.query_time(), 42);
        assert_eq!(window.duration_secs(), 600);
    }
}
