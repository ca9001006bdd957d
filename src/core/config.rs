/// Cadence and capacity settings for the engine.
///
/// The defaults below are part of the functional contract (tests assert
/// behavior at these values); the `with_*` builders exist for benchmarks
/// and load tests, not for production tuning.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Inputs at or below this size are dispatched synchronously.
    pub min_batch_size: usize,
    /// Upper bound for the adaptive batch size.
    pub max_batch_size: usize,
    /// Capacity of the processed-event ring history.
    pub history_capacity: usize,
    /// Cadence of the cooperative batch cycle.
    pub batch_interval_ms: u64,
    /// Cadence of the per-type metrics flush into the monitor.
    pub flush_interval_ms: u64,
    /// TTL for cached aggregation snapshots.
    pub cache_ttl_ms: u64,
    /// Orchestrator tick interval (the 200 ms latency budget).
    pub tick_interval_ms: u64,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            min_batch_size: 100,
            max_batch_size: 1_000,
            history_capacity: 10_000,
            batch_interval_ms: 1,
            flush_interval_ms: 1_000,
            cache_ttl_ms: 200,
            tick_interval_ms: 200,
        }
    }

    pub fn with_batch_bounds(mut self, min: usize, max: usize) -> Self {
        self.min_batch_size = min;
        self.max_batch_size = max;
        self
    }

    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    pub fn with_tick_interval_ms(mut self, interval: u64) -> Self {
        self.tick_interval_ms = interval;
        self
    }

    pub fn with_cache_ttl_ms(mut self, ttl: u64) -> Self {
        self.cache_ttl_ms = ttl;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}
