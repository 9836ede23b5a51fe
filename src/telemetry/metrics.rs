// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-process metrics.
//!
//! Tracks gateway calls per method, tool invocations, timed operations and
//! plain event counters (spawn statuses, announce outcomes). Nothing is
//! exported; `sidekick --verbose` prints a report on exit.

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

/// Global metrics instance.
pub static GLOBAL_METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Central metrics collection.
#[derive(Debug)]
pub struct Metrics {
    /// Gateway calls by RPC method.
    gateway: RwLock<HashMap<String, CallMetrics>>,

    /// Tool invocations by tool name.
    tools: RwLock<HashMap<String, CallMetrics>>,

    operations: RwLock<HashMap<String, OperationMetrics>>,

    events: RwLock<HashMap<String, u64>>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            gateway: RwLock::new(HashMap::new()),
            tools: RwLock::new(HashMap::new()),
            operations: RwLock::new(HashMap::new()),
            events: RwLock::new(HashMap::new()),
            start_time: Instant::now(),
        }
    }

    /// Record one gateway RPC.
    pub fn record_gateway_call(&self, method: &str, duration: Duration, success: bool) {
        write(&self.gateway)
            .entry(method.to_string())
            .or_default()
            .record(duration, success);
    }

    /// Record a tool execution.
    pub fn record_tool(&self, name: &str, duration: Duration, success: bool) {
        write(&self.tools)
            .entry(name.to_string())
            .or_default()
            .record(duration, success);
    }

    /// Record a timed operation.
    pub fn record_operation(&self, name: &str, duration: Duration) {
        write(&self.operations)
            .entry(name.to_string())
            .or_default()
            .record(duration);
    }

    /// Count one occurrence of `name`.
    pub fn record_event(&self, name: &str) {
        *write(&self.events).entry(name.to_string()).or_insert(0) += 1;
    }

    pub fn gateway_metrics(&self, method: &str) -> Option<CallMetrics> {
        read(&self.gateway).get(method).cloned()
    }

    pub fn tool_metrics(&self, name: &str) -> Option<CallMetrics> {
        read(&self.tools).get(name).cloned()
    }

    pub fn operation_metrics(&self, name: &str) -> Option<OperationMetrics> {
        read(&self.operations).get(name).cloned()
    }

    pub fn event_count(&self, name: &str) -> u64 {
        read(&self.events).get(name).copied().unwrap_or(0)
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Take a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            gateway: read(&self.gateway).clone().into_iter().collect(),
            tools: read(&self.tools).clone().into_iter().collect(),
            operations: read(&self.operations).clone().into_iter().collect(),
            events: read(&self.events).clone().into_iter().collect(),
            uptime: self.uptime(),
        }
    }

    pub fn reset(&self) {
        write(&self.gateway).clear();
        write(&self.tools).clear();
        write(&self.operations).clear();
        write(&self.events).clear();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts and latency for a named call (gateway method or tool).
#[derive(Debug, Clone)]
pub struct CallMetrics {
    pub invocations: u64,
    pub successes: u64,
    pub failures: u64,
    pub total_duration: Duration,
    pub max_duration: Duration,
    pub histogram: Histogram,
}

impl CallMetrics {
    pub fn new() -> Self {
        Self {
            invocations: 0,
            successes: 0,
            failures: 0,
            total_duration: Duration::ZERO,
            max_duration: Duration::ZERO,
            histogram: Histogram::default(),
        }
    }

    pub fn record(&mut self, duration: Duration, success: bool) {
        self.invocations += 1;
        if success {
            self.successes += 1;
        } else {
            self.failures += 1;
        }
        self.total_duration += duration;
        self.max_duration = self.max_duration.max(duration);
        self.histogram.record(duration);
    }

    pub fn avg_duration(&self) -> Duration {
        average(self.total_duration, self.invocations)
    }

    /// Fraction of successful calls (0.0 to 1.0).
    pub fn success_rate(&self) -> f64 {
        if self.invocations == 0 {
            1.0
        } else {
            self.successes as f64 / self.invocations as f64
        }
    }
}

impl Default for CallMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Timing for an operation without a success flag.
#[derive(Debug, Clone, Default)]
pub struct OperationMetrics {
    pub count: u64,
    pub total_duration: Duration,
    pub histogram: Histogram,
}

impl OperationMetrics {
    pub fn record(&mut self, duration: Duration) {
        self.count += 1;
        self.total_duration += duration;
        self.histogram.record(duration);
    }

    pub fn avg_duration(&self) -> Duration {
        average(self.total_duration, self.count)
    }
}

fn average(total: Duration, count: u64) -> Duration {
    if count == 0 {
        Duration::ZERO
    } else {
        Duration::from_nanos((total.as_nanos() / u128::from(count)) as u64)
    }
}

/// Fixed-bucket latency histogram.
#[derive(Debug, Clone)]
pub struct Histogram {
    /// Upper bounds in milliseconds; one overflow bucket follows.
    bounds_ms: Vec<u64>,
    counts: Vec<u64>,
}

impl Histogram {
    pub fn with_bounds(bounds_ms: Vec<u64>) -> Self {
        let counts = vec![0; bounds_ms.len() + 1];
        Self { bounds_ms, counts }
    }

    pub fn record(&mut self, duration: Duration) {
        let ms = duration.as_millis() as u64;
        let idx = self
            .bounds_ms
            .iter()
            .position(|&b| ms <= b)
            .unwrap_or(self.bounds_ms.len());
        self.counts[idx] += 1;
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Upper bound of the bucket holding the `p`th percentile.
    ///
    /// The overflow bucket reports ten times the last bound.
    pub fn percentile(&self, p: f64) -> Duration {
        let total: u64 = self.counts.iter().sum();
        if total == 0 {
            return Duration::ZERO;
        }

        let target = ((total as f64 * p / 100.0).ceil() as u64).max(1);
        let mut seen = 0;
        for (i, &count) in self.counts.iter().enumerate() {
            seen += count;
            if seen >= target {
                let ms = match self.bounds_ms.get(i) {
                    Some(&bound) => bound,
                    None => self.bounds_ms.last().copied().unwrap_or(0) * 10,
                };
                return Duration::from_millis(ms);
            }
        }
        Duration::ZERO
    }

    pub fn p50(&self) -> Duration {
        self.percentile(50.0)
    }

    pub fn p99(&self) -> Duration {
        self.percentile(99.0)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        // Gateway calls range from local round trips to multi-minute waits.
        Self::with_bounds(vec![5, 50, 250, 1_000, 10_000, 60_000, 600_000])
    }
}

/// Metrics at a point in time, sorted by name.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub gateway: BTreeMap<String, CallMetrics>,
    pub tools: BTreeMap<String, CallMetrics>,
    pub operations: BTreeMap<String, OperationMetrics>,
    pub events: BTreeMap<String, u64>,
    pub uptime: Duration,
}

impl MetricsSnapshot {
    /// Format as a human-readable report.
    pub fn format_report(&self) -> String {
        let mut report = String::new();
        report.push_str("=== Metrics Report ===\n\n");
        report.push_str(&format!("Uptime: {:.2?}\n\n", self.uptime));

        for (title, calls) in [("Gateway Calls", &self.gateway), ("Tool Calls", &self.tools)] {
            if calls.is_empty() {
                continue;
            }
            report.push_str(&format!("{}:\n", title));
            for (name, m) in calls {
                report.push_str(&format!(
                    "  {}: {} calls, {:.1}% success, avg {:.2?}, p99 {:.2?}\n",
                    name,
                    m.invocations,
                    m.success_rate() * 100.0,
                    m.avg_duration(),
                    m.histogram.p99()
                ));
            }
            report.push('\n');
        }

        if !self.operations.is_empty() {
            report.push_str("Operations:\n");
            for (name, m) in &self.operations {
                report.push_str(&format!("  {}: {} ops, avg {:.2?}\n", name, m.count, m.avg_duration()));
            }
            report.push('\n');
        }

        if !self.events.is_empty() {
            report.push_str("Events:\n");
            for (name, count) in &self.events {
                report.push_str(&format!("  {}: {}\n", name, count));
            }
        }

        report
    }
}

/// Record an operation on the global collector.
pub fn record_operation(name: &str, duration: Duration) {
    GLOBAL_METRICS.record_operation(name, duration);
}

/// Count an event on the global collector.
pub fn record_event(name: &str) {
    GLOBAL_METRICS.record_event(name);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_metrics() {
        let mut metrics = CallMetrics::new();
        metrics.record(Duration::from_millis(100), true);
        metrics.record(Duration::from_millis(200), true);
        metrics.record(Duration::from_millis(60), false);

        assert_eq!(metrics.invocations, 3);
        assert_eq!(metrics.failures, 1);
        assert_eq!(metrics.avg_duration(), Duration::from_millis(120));
        assert_eq!(metrics.max_duration, Duration::from_millis(200));
        assert!((metrics.success_rate() - 0.666).abs() < 0.01);
    }

    #[test]
    fn test_histogram_buckets() {
        let mut hist = Histogram::default();
        hist.record(Duration::from_millis(1));
        hist.record(Duration::from_millis(30));
        hist.record(Duration::from_secs(2));
        hist.record(Duration::from_secs(3_600));

        assert_eq!(hist.counts()[0], 1);
        assert_eq!(hist.counts()[1], 1);
        assert_eq!(hist.counts()[4], 1);
        assert_eq!(hist.counts()[7], 1);
        assert_eq!(hist.p99(), Duration::from_secs(6_000));
    }

    #[test]
    fn test_histogram_percentiles() {
        let mut hist = Histogram::default();
        for _ in 0..100 {
            hist.record(Duration::from_millis(20));
        }
        assert_eq!(hist.p50(), Duration::from_millis(50));
        assert_eq!(Histogram::default().p50(), Duration::ZERO);
    }

    #[test]
    fn test_gateway_and_events() {
        let metrics = Metrics::new();
        metrics.record_gateway_call("agent.wait", Duration::from_millis(40), true);
        metrics.record_gateway_call("agent.wait", Duration::from_millis(10), false);
        metrics.record_event("spawn.ok");
        metrics.record_event("spawn.ok");
        metrics.record_event("announce.delivered");

        let wait = metrics.gateway_metrics("agent.wait").unwrap();
        assert_eq!(wait.invocations, 2);
        assert_eq!(wait.successes, 1);
        assert_eq!(metrics.event_count("spawn.ok"), 2);
        assert_eq!(metrics.event_count("spawn.error"), 0);

        let report = metrics.snapshot().format_report();
        assert!(report.contains("Gateway Calls:"));
        assert!(report.contains("agent.wait: 2 calls"));
        assert!(report.contains("announce.delivered: 1"));
    }

    #[test]
    fn test_metrics_reset() {
        let metrics = Metrics::new();
        metrics.record_tool("sessions_spawn", Duration::from_millis(5), true);
        metrics.record_operation("session.store.load", Duration::from_millis(1));
        metrics.record_event("spawn.ok");

        metrics.reset();

        assert!(metrics.tool_metrics("sessions_spawn").is_none());
        assert!(metrics.operation_metrics("session.store.load").is_none());
        assert_eq!(metrics.event_count("spawn.ok"), 0);
    }
}
