use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Event types are free-form strings so producers can introduce new market
/// scenarios without touching the engine.
pub type EventType = String;
pub type DepartmentId = String;

/// A single external shock directed at one department.
///
/// Events are immutable once enqueued. A zero `timestamp` means "not yet
/// stamped"; ingestion assigns the current clock value in that case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketEvent {
    pub id: Uuid,
    pub event_type: EventType,
    pub department_id: DepartmentId,
    /// Directional shock magnitude. Unbounded; downstream metric updates
    /// are clamped, not the impact itself.
    pub impact: f64,
    /// Epoch milliseconds. Zero until assigned at ingestion.
    pub timestamp: u64,
    pub priority: u32,
    pub metadata: Option<HashMap<String, String>>,
}

impl MarketEvent {
    pub fn new(event_type: &str, department_id: &str, impact: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type: event_type.to_string(),
            department_id: department_id.to_string(),
            impact,
            timestamp: 0,
            priority: 0,
            metadata: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// The three tracked department metrics, each held within `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepartmentMetrics {
    pub performance: f64,
    pub efficiency: f64,
    pub satisfaction: f64,
}

impl DepartmentMetrics {
    pub fn new(performance: f64, efficiency: f64, satisfaction: f64) -> Self {
        Self {
            performance,
            efficiency,
            satisfaction,
        }
    }
}

/// One node in the dependency graph. Created once at network construction
/// and mutated only through `DepartmentNetwork::manage_departments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Department {
    pub id: DepartmentId,
    pub name: String,
    pub metrics: DepartmentMetrics,
    pub dependencies: Vec<DepartmentId>,
}

impl Department {
    pub fn new(id: &str, name: &str, metrics: DepartmentMetrics, dependencies: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            metrics,
            dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
        }
    }
}

/// Cumulative processing counters owned by the `EventProcessor`.
/// One instance per processor lifetime; reset only by reconstruction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingMetrics {
    pub events_processed: u64,
    pub batches_processed: u64,
    pub total_processing_time_ms: u64,
    /// Exponential moving average over per-event latency.
    pub average_latency_ms: f64,
    pub last_batch_size: usize,
    pub max_batch_size: usize,
    /// Estimated from live container sizes, refreshed every 10 batches.
    pub memory_usage_bytes: usize,
}

/// Rolling latency statistics for one event type, flushed to the
/// `PerformanceMonitor` once per flush interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventTypeMetrics {
    pub count: u64,
    pub average_latency_ms: f64,
    pub max_latency_ms: f64,
    pub min_latency_ms: f64,
}

/// A cached aggregation result keyed by department id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub timestamp: u64,
    pub metrics: HashMap<String, f64>,
}

/// A KPI series as supplied by dashboard consumers for trend analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kpi {
    pub id: String,
    pub value: f64,
    pub history: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

/// Current-vs-previous comparison for one KPI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendComparison {
    pub kpi_id: String,
    pub current: f64,
    pub previous: f64,
    pub percent_change: f64,
    pub direction: TrendDirection,
}
