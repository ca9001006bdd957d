use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::rc::Rc;

use super::clock::Clock;
use super::history::RingHistory;
use super::types::{EventTypeMetrics, ProcessingMetrics};

/// Bounded number of retained metrics snapshots.
const SNAPSHOT_HISTORY_LIMIT: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertSeverity {
    Warning,
    Error,
}

/// A threshold violation raised toward dashboard consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
    pub message: String,
    pub timestamp: u64,
}

/// Alerting thresholds. The defaults encode the engine's latency budget.
#[derive(Debug, Clone)]
pub struct ThresholdConfig {
    /// Minimum acceptable throughput in events per second.
    pub throughput_min: f64,
    /// Maximum acceptable average event latency in milliseconds.
    pub latency_max_ms: f64,
    /// Maximum acceptable estimated memory footprint in megabytes.
    pub memory_max_mb: f64,
    /// Batches below this size suggest the pipeline is starving.
    pub batch_size_min: usize,
    /// Maximum acceptable processing time per batch in milliseconds.
    pub processing_time_max_ms: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            throughput_min: 100_000.0,
            latency_max_ms: 200.0,
            memory_max_mb: 512.0,
            batch_size_min: 25,
            processing_time_max_ms: 100.0,
        }
    }
}

/// One observed point in the processor's metrics stream.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub metrics: ProcessingMetrics,
    pub type_metrics: HashMap<String, EventTypeMetrics>,
    pub throughput: f64,
    pub timestamp: u64,
}

pub type MetricsCallback = Box<dyn FnMut(&MetricsSnapshot)>;
pub type AlertCallback = Box<dyn FnMut(&Alert)>;

/// Observer for processing metrics: derives throughput from consecutive
/// snapshots and raises threshold alerts.
///
/// Constructed once by the composition root and injected wherever needed;
/// there is no hidden module-level instance.
pub struct PerformanceMonitor {
    clock: Rc<dyn Clock>,
    history: RingHistory<MetricsSnapshot>,
    thresholds: ThresholdConfig,
    metrics_callbacks: Vec<MetricsCallback>,
    alert_callbacks: Vec<AlertCallback>,
}

impl PerformanceMonitor {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self::with_thresholds(clock, ThresholdConfig::default())
    }

    pub fn with_thresholds(clock: Rc<dyn Clock>, thresholds: ThresholdConfig) -> Self {
        Self {
            clock,
            history: RingHistory::new(SNAPSHOT_HISTORY_LIMIT),
            thresholds,
            metrics_callbacks: Vec::new(),
            alert_callbacks: Vec::new(),
        }
    }

    /// Record a metrics snapshot, derive throughput, check thresholds, and
    /// notify metrics subscribers.
    pub fn update_metrics(&mut self, metrics: ProcessingMetrics) {
        let timestamp = self.clock.now_ms();
        let throughput = self.calculate_throughput(&metrics, timestamp);

        let snapshot = MetricsSnapshot {
            metrics,
            type_metrics: HashMap::new(),
            throughput,
            timestamp,
        };

        self.history.push(snapshot.clone());
        self.check_thresholds(&snapshot);

        for callback in &mut self.metrics_callbacks {
            callback(&snapshot);
        }
    }

    /// Attach per-type latency statistics to the most recent snapshot.
    pub fn update_type_metrics(&mut self, event_type: &str, metrics: EventTypeMetrics) {
        if let Some(snapshot) = self.history.latest_mut() {
            snapshot.type_metrics.insert(event_type.to_string(), metrics);
        }
    }

    /// Events per second between the two most recent snapshots. Zero until
    /// two snapshots exist.
    fn calculate_throughput(&self, metrics: &ProcessingMetrics, now: u64) -> f64 {
        match self.history.latest() {
            Some(previous) if now > previous.timestamp => {
                let elapsed_ms = (now - previous.timestamp) as f64;
                let events = metrics
                    .events_processed
                    .saturating_sub(previous.metrics.events_processed)
                    as f64;
                events / elapsed_ms * 1_000.0
            }
            _ => 0.0,
        }
    }

    fn check_thresholds(&mut self, snapshot: &MetricsSnapshot) {
        let metrics = &snapshot.metrics;

        // Throughput is meaningless before two snapshots exist.
        if self.history.len() >= 2 && snapshot.throughput < self.thresholds.throughput_min {
            self.emit_alert(
                AlertSeverity::Warning,
                "throughput",
                snapshot.throughput,
                self.thresholds.throughput_min,
                format!(
                    "throughput dropped below {} events/sec",
                    self.thresholds.throughput_min
                ),
            );
        }

        if metrics.average_latency_ms > self.thresholds.latency_max_ms {
            self.emit_alert(
                AlertSeverity::Warning,
                "latency",
                metrics.average_latency_ms,
                self.thresholds.latency_max_ms,
                format!("latency exceeded {}ms", self.thresholds.latency_max_ms),
            );
        }

        let memory_mb = metrics.memory_usage_bytes as f64 / (1024.0 * 1024.0);
        if memory_mb > self.thresholds.memory_max_mb {
            self.emit_alert(
                AlertSeverity::Error,
                "memory",
                memory_mb,
                self.thresholds.memory_max_mb,
                format!("memory usage exceeded {}MB", self.thresholds.memory_max_mb),
            );
        }

        if metrics.last_batch_size < self.thresholds.batch_size_min {
            self.emit_alert(
                AlertSeverity::Warning,
                "batch_size",
                metrics.last_batch_size as f64,
                self.thresholds.batch_size_min as f64,
                format!(
                    "batch size below {} events",
                    self.thresholds.batch_size_min
                ),
            );
        }

        if metrics.batches_processed > 0 {
            let per_batch =
                metrics.total_processing_time_ms as f64 / metrics.batches_processed as f64;
            if per_batch > self.thresholds.processing_time_max_ms {
                self.emit_alert(
                    AlertSeverity::Warning,
                    "processing_time",
                    per_batch,
                    self.thresholds.processing_time_max_ms,
                    format!(
                        "processing time per batch exceeded {}ms",
                        self.thresholds.processing_time_max_ms
                    ),
                );
            }
        }
    }

    fn emit_alert(
        &mut self,
        severity: AlertSeverity,
        metric: &str,
        value: f64,
        threshold: f64,
        message: String,
    ) {
        warn!("performance alert [{}]: {}", metric, message);
        let alert = Alert {
            severity,
            metric: metric.to_string(),
            value,
            threshold,
            message,
            timestamp: self.clock.now_ms(),
        };
        for callback in &mut self.alert_callbacks {
            callback(&alert);
        }
    }

    /// Subscribe to every recorded metrics snapshot.
    pub fn on_metrics(&mut self, callback: MetricsCallback) {
        self.metrics_callbacks.push(callback);
    }

    /// Subscribe to threshold alerts.
    pub fn on_alert(&mut self, callback: AlertCallback) {
        self.alert_callbacks.push(callback);
    }

    pub fn get_metrics_history(&self) -> Vec<MetricsSnapshot> {
        self.history.get_all()
    }

    pub fn get_thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    pub fn update_thresholds(&mut self, thresholds: ThresholdConfig) {
        self.thresholds = thresholds;
    }

    /// Drop all retained snapshots and subscribers.
    pub fn reset(&mut self) {
        self.history.clear();
        self.metrics_callbacks.clear();
        self.alert_callbacks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clock::ManualClock;
    use std::cell::RefCell;

    fn sample_metrics(events: u64) -> ProcessingMetrics {
        ProcessingMetrics {
            events_processed: events,
            batches_processed: 1,
            total_processing_time_ms: 5,
            average_latency_ms: 2.0,
            last_batch_size: 100,
            max_batch_size: 100,
            memory_usage_bytes: 1024,
        }
    }

    #[test]
    fn test_throughput_from_consecutive_snapshots() {
        let clock = ManualClock::new(0);
        let mut monitor = PerformanceMonitor::new(clock.clone());

        monitor.update_metrics(sample_metrics(0));
        clock.advance(1_000);
        monitor.update_metrics(sample_metrics(500));

        let history = monitor.get_metrics_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].throughput, 0.0);
        assert!((history[1].throughput - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_latency_threshold_raises_alert() {
        let clock = ManualClock::new(0);
        let mut monitor = PerformanceMonitor::with_thresholds(
            clock.clone(),
            ThresholdConfig {
                throughput_min: 0.0,
                latency_max_ms: 200.0,
                memory_max_mb: 512.0,
                batch_size_min: 0,
                processing_time_max_ms: 1_000.0,
            },
        );

        let alerts = Rc::new(RefCell::new(Vec::new()));
        let sink = alerts.clone();
        monitor.on_alert(Box::new(move |alert| {
            sink.borrow_mut().push(alert.clone());
        }));

        let mut slow = sample_metrics(100);
        slow.average_latency_ms = 350.0;
        monitor.update_metrics(slow);

        let alerts = alerts.borrow();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].metric, "latency");
        assert_eq!(alerts[0].severity, AlertSeverity::Warning);
        assert!((alerts[0].value - 350.0).abs() < 1e-9);
    }

    #[test]
    fn test_metrics_callbacks_see_every_snapshot() {
        let clock = ManualClock::new(0);
        let mut monitor = PerformanceMonitor::new(clock.clone());

        let seen = Rc::new(RefCell::new(0u32));
        let counter = seen.clone();
        monitor.on_metrics(Box::new(move |_| {
            *counter.borrow_mut() += 1;
        }));

        monitor.update_metrics(sample_metrics(1));
        clock.advance(10);
        monitor.update_metrics(sample_metrics(2));
        assert_eq!(*seen.borrow(), 2);
    }

    #[test]
    fn test_type_metrics_attach_to_latest_snapshot() {
        let clock = ManualClock::new(0);
        let mut monitor = PerformanceMonitor::new(clock);
        monitor.update_metrics(sample_metrics(10));
        monitor.update_type_metrics(
            "market_shift",
            EventTypeMetrics {
                count: 10,
                average_latency_ms: 1.5,
                max_latency_ms: 4.0,
                min_latency_ms: 0.0,
            },
        );
        let history = monitor.get_metrics_history();
        assert_eq!(history.len(), 1);
        assert!(history[0].type_metrics.contains_key("market_shift"));
    }

    #[test]
    fn test_reset_clears_history_and_subscribers() {
        let clock = ManualClock::new(0);
        let mut monitor = PerformanceMonitor::new(clock);
        monitor.update_metrics(sample_metrics(1));
        monitor.reset();
        assert!(monitor.get_metrics_history().is_empty());
    }
}
