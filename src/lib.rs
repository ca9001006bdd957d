//! Real-time business simulation engine: market events perturb a weighted
//! graph of interdependent departments, batched event processing feeds
//! typed subscribers, and aggregation produces smoothed metrics, trends,
//! and threshold alerts under a 200ms processing-cycle budget.

pub mod core;

// Re-export commonly used types
pub use crate::core::aggregator::MetricsAggregator;
pub use crate::core::clock::{Clock, ManualClock, SystemClock};
pub use crate::core::config::EngineConfig;
pub use crate::core::errors::SimulationError;
pub use crate::core::event_processor::EventProcessor;
pub use crate::core::history::RingHistory;
pub use crate::core::monitor::{Alert, AlertSeverity, PerformanceMonitor, ThresholdConfig};
pub use crate::core::network::DepartmentNetwork;
pub use crate::core::simulator::{AuthGate, MarketSimulator, RequestLimiter, SimulationState};
pub use crate::core::types::{
    Department, DepartmentMetrics, EventTypeMetrics, Kpi, MarketEvent, MetricSnapshot,
    ProcessingMetrics, TrendComparison, TrendDirection,
};
