use log::warn;
use std::collections::HashMap;
use std::rc::Rc;

use super::clock::Clock;
use super::history::RingHistory;
use super::types::{
    DepartmentId, Kpi, MarketEvent, MetricSnapshot, TrendComparison, TrendDirection,
};

/// Retained samples per department series.
const SERIES_WINDOW: usize = 100;
/// Exponential blend weights: smoothed = 0.7 * previous + 0.3 * incoming.
const EMA_PREVIOUS_WEIGHT: f64 = 0.7;
const EMA_INCOMING_WEIGHT: f64 = 0.3;
/// Neutral starting point for a department that has no samples yet.
const BASELINE_VALUE: f64 = 50.0;
/// Percent-change band inside which a trend counts as stable.
const STABILITY_BAND_PCT: f64 = 1.0;
/// Aggregation must finish inside the processing-cycle budget.
const AGGREGATION_BUDGET_MS: u64 = 200;

/// Impact multiplier by event type; unknown types take the default.
fn type_multiplier(event_type: &str) -> f64 {
    match event_type {
        "market_shift" => 0.8,
        "rapid_change" => 0.5,
        "stress_test" => 0.3,
        _ => 0.6,
    }
}

/// Smoothed scalar series for one department.
#[derive(Debug, Clone)]
pub struct DepartmentSeries {
    pub current_value: f64,
    pub previous_values: RingHistory<f64>,
    pub last_update_ms: u64,
}

impl DepartmentSeries {
    fn new() -> Self {
        Self {
            current_value: BASELINE_VALUE,
            previous_values: RingHistory::new(SERIES_WINDOW),
            last_update_ms: 0,
        }
    }
}

/// Converts the impact-event stream into smoothed, cacheable per-department
/// metric values and classifies KPI trend direction.
///
/// Snapshots are cached with a short TTL; recomputation is O(active
/// departments), never O(event history).
pub struct MetricsAggregator {
    clock: Rc<dyn Clock>,
    series: HashMap<DepartmentId, DepartmentSeries>,
    cache: Option<MetricSnapshot>,
    cache_ttl_ms: u64,
}

impl MetricsAggregator {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self::with_cache_ttl(clock, AGGREGATION_BUDGET_MS)
    }

    pub fn with_cache_ttl(clock: Rc<dyn Clock>, cache_ttl_ms: u64) -> Self {
        Self {
            clock,
            series: HashMap::new(),
            cache: None,
            cache_ttl_ms,
        }
    }

    /// Fold a slice of events into the per-department series and refresh
    /// the cached snapshot.
    pub fn aggregate_metrics(&mut self, events: &[MarketEvent]) {
        let start = self.clock.now_ms();

        for event in events {
            self.update_series(event);
        }

        if !events.is_empty() {
            self.recompute_snapshot();
        }

        let elapsed = self.clock.now_ms().saturating_sub(start);
        if elapsed > AGGREGATION_BUDGET_MS {
            warn!(
                "metrics aggregation took {}ms, exceeding the {}ms budget",
                elapsed, AGGREGATION_BUDGET_MS
            );
        }
    }

    fn update_series(&mut self, event: &MarketEvent) {
        let now = self.clock.now_ms();
        let series = self
            .series
            .entry(event.department_id.clone())
            .or_insert_with(DepartmentSeries::new);

        let shifted =
            (series.current_value + event.impact * type_multiplier(&event.event_type))
                .clamp(0.0, 100.0);
        let smoothed =
            series.current_value * EMA_PREVIOUS_WEIGHT + shifted * EMA_INCOMING_WEIGHT;

        series.previous_values.push(series.current_value);
        series.current_value = smoothed;
        series.last_update_ms = now;
    }

    fn recompute_snapshot(&mut self) {
        let mut metrics = HashMap::new();
        for (id, series) in &self.series {
            metrics.insert(id.clone(), series.current_value);
        }
        self.cache = Some(MetricSnapshot {
            timestamp: self.clock.now_ms(),
            metrics,
        });
    }

    /// The latest snapshot, recomputed only when the cached copy is older
    /// than the TTL.
    pub fn get_metrics(&mut self) -> MetricSnapshot {
        let now = self.clock.now_ms();
        let stale = match &self.cache {
            Some(snapshot) => now.saturating_sub(snapshot.timestamp) >= self.cache_ttl_ms,
            None => true,
        };
        if stale {
            self.recompute_snapshot();
        }
        self.cache.clone().unwrap_or(MetricSnapshot {
            timestamp: now,
            metrics: HashMap::new(),
        })
    }

    /// Classify each KPI against the last value of its history series.
    /// KPIs without history are skipped.
    pub fn analyze_trends(&self, kpis: &[Kpi]) -> Vec<TrendComparison> {
        kpis.iter()
            .filter_map(|kpi| {
                let previous = *kpi.history.last()?;
                let percent_change = if previous == 0.0 {
                    0.0
                } else {
                    (kpi.value - previous) / previous * 100.0
                };
                let direction = if percent_change > STABILITY_BAND_PCT {
                    TrendDirection::Up
                } else if percent_change < -STABILITY_BAND_PCT {
                    TrendDirection::Down
                } else {
                    TrendDirection::Stable
                };
                Some(TrendComparison {
                    kpi_id: kpi.id.clone(),
                    current: kpi.value,
                    previous,
                    percent_change,
                    direction,
                })
            })
            .collect()
    }

    pub fn get_department_series(&self, department_id: &str) -> Option<&DepartmentSeries> {
        self.series.get(department_id)
    }

    /// Clear all cached and per-department state.
    pub fn reset(&mut self) {
        self.series.clear();
        self.cache = None;
    }
}
