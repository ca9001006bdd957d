use log::{debug, info, warn};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::mem;
use std::rc::Rc;

use super::clock::Clock;
use super::config::EngineConfig;
use super::history::RingHistory;
use super::monitor::PerformanceMonitor;
use super::types::{EventType, EventTypeMetrics, MarketEvent, ProcessingMetrics};

/// Smoothing factor for the average-latency EMA.
const LATENCY_EMA_ALPHA: f64 = 0.1;
/// Multiplicative growth applied under queue backpressure.
const BATCH_GROWTH: f64 = 1.2;
/// Multiplicative shrink applied once the queue drains.
const BATCH_SHRINK: f64 = 0.8;
/// Memory estimate refresh cadence, in batches.
const MEMORY_SAMPLE_EVERY: u64 = 10;

/// Subscriber callback. Errors are logged and isolated per invocation;
/// they never abort the batch or reach the producer.
pub type ListenerFn = Box<dyn FnMut(&MarketEvent) -> Result<(), String>>;

/// Rolling per-type latency samples between monitor flushes.
#[derive(Debug, Default)]
struct LatencyBuffer {
    samples: Vec<f64>,
}

/// Turns an unbounded, bursty event stream into ordered, typed batches
/// delivered to subscribers, while bounding end-to-end latency.
///
/// Small inputs (at or below `min_batch_size`) are dispatched synchronously.
/// Larger inputs land on a pending queue consumed by a cooperative batch
/// cycle whose size adapts multiplicatively to queue pressure. The cycle is
/// driven by `poll`, not by an OS timer, so cadence and cancellation are
/// deterministic.
pub struct EventProcessor {
    clock: Rc<dyn Clock>,
    monitor: Rc<RefCell<PerformanceMonitor>>,
    config: EngineConfig,

    /// event type -> listener id -> callback. BTreeMap keeps dispatch order
    /// deterministic across runs.
    listeners: HashMap<EventType, BTreeMap<String, ListenerFn>>,
    pending: VecDeque<MarketEvent>,
    history: RingHistory<MarketEvent>,
    metrics: ProcessingMetrics,
    type_latencies: HashMap<EventType, LatencyBuffer>,

    dynamic_batch_size: usize,
    /// Single-writer discipline: batch dispatch never overlaps itself, even
    /// when a listener re-enters `process_events`.
    is_processing: bool,
    last_batch_ms: u64,
    last_flush_ms: u64,
    disposed: bool,
}

impl EventProcessor {
    pub fn new(clock: Rc<dyn Clock>, monitor: Rc<RefCell<PerformanceMonitor>>) -> Self {
        Self::with_config(clock, monitor, EngineConfig::default())
    }

    pub fn with_config(
        clock: Rc<dyn Clock>,
        monitor: Rc<RefCell<PerformanceMonitor>>,
        config: EngineConfig,
    ) -> Self {
        let now = clock.now_ms();
        Self {
            clock,
            monitor,
            listeners: HashMap::new(),
            pending: VecDeque::new(),
            history: RingHistory::new(config.history_capacity),
            metrics: ProcessingMetrics::default(),
            type_latencies: HashMap::new(),
            dynamic_batch_size: config.min_batch_size,
            is_processing: false,
            last_batch_ms: now,
            last_flush_ms: now,
            disposed: false,
            config,
        }
    }

    /// Ingest a slice of events.
    ///
    /// Missing timestamps are stamped with the current clock value. Inputs
    /// at or below `min_batch_size` are dispatched before this call
    /// returns; larger inputs are queued for the cooperative batch cycle.
    /// No-op after `dispose`.
    pub fn process_events(&mut self, mut events: Vec<MarketEvent>) {
        if self.disposed || events.is_empty() {
            return;
        }

        let now = self.clock.now_ms();
        for event in &mut events {
            if event.timestamp == 0 {
                event.timestamp = now;
            }
        }

        // Immediate path: small inputs skip the queue entirely, unless a
        // batch is already in flight (a listener feeding events back in).
        if events.len() <= self.config.min_batch_size && !self.is_processing {
            self.dispatch_batch(events, now);
            return;
        }

        self.pending.extend(events);
    }

    /// Drive the cooperative batch cycle and the periodic metrics flush.
    /// Call this on every orchestrator tick (or faster under load).
    pub fn poll(&mut self, now: u64) {
        if self.disposed {
            return;
        }

        if now.saturating_sub(self.last_batch_ms) >= self.config.batch_interval_ms {
            self.run_batch_cycle(now);
        }

        if now.saturating_sub(self.last_flush_ms) >= self.config.flush_interval_ms {
            self.flush_type_metrics();
            self.last_flush_ms = now;
        }
    }

    /// Run batch cycles until the pending queue is empty, ignoring the
    /// batch cadence. Used by shutdown paths and load tests.
    pub fn drain(&mut self, now: u64) {
        if self.disposed {
            return;
        }
        while !self.pending.is_empty() && !self.is_processing {
            self.run_batch_cycle(now);
        }
    }

    fn run_batch_cycle(&mut self, now: u64) {
        if self.pending.is_empty() || self.is_processing {
            return;
        }

        let take = self.dynamic_batch_size.min(self.pending.len());
        let batch: Vec<MarketEvent> = self.pending.drain(..take).collect();
        self.last_batch_ms = now;
        self.dispatch_batch(batch, now);
        self.adapt_batch_size();
    }

    /// Grow under backpressure, shrink once drained. The thresholds are
    /// deliberately two-sided (more than double / less than half) so the
    /// size does not oscillate around a steady queue.
    fn adapt_batch_size(&mut self) {
        let queue_len = self.pending.len();
        if queue_len > self.dynamic_batch_size * 2 {
            let grown = (self.dynamic_batch_size as f64 * BATCH_GROWTH) as usize;
            self.dynamic_batch_size = grown.min(self.config.max_batch_size);
        } else if queue_len < self.dynamic_batch_size / 2 {
            let shrunk = (self.dynamic_batch_size as f64 * BATCH_SHRINK) as usize;
            self.dynamic_batch_size = shrunk.max(self.config.min_batch_size);
        }
    }

    /// Dispatch one batch: group by type, invoke every listener for every
    /// event of its type, and account latency. Once dequeued, every event
    /// is attempted against all matching listeners; a failing listener is
    /// logged and skipped, never aborting the batch.
    fn dispatch_batch(&mut self, batch: Vec<MarketEvent>, now: u64) {
        self.is_processing = true;
        let batch_start = self.clock.now_ms();
        let batch_size = batch.len();

        let mut by_type: HashMap<EventType, Vec<MarketEvent>> = HashMap::new();
        for event in batch {
            self.history.push(event.clone());
            by_type.entry(event.event_type.clone()).or_default().push(event);
        }

        let mut latency_sum = 0.0;
        let mut event_count = 0u64;
        for (event_type, events) in &by_type {
            for event in events {
                let latency = now.saturating_sub(event.timestamp) as f64;
                latency_sum += latency;
                event_count += 1;
                self.type_latencies
                    .entry(event_type.clone())
                    .or_default()
                    .samples
                    .push(latency);
            }

            let Some(subscribers) = self.listeners.get_mut(event_type) else {
                continue;
            };
            for (listener_id, callback) in subscribers.iter_mut() {
                for event in events {
                    if let Err(err) = callback(event) {
                        warn!(
                            "listener '{}' failed on event {} ({}): {}",
                            listener_id, event.id, event_type, err
                        );
                    }
                }
            }
        }

        let elapsed = self.clock.now_ms().saturating_sub(batch_start);
        self.update_metrics(batch_size, event_count, latency_sum, elapsed);
        self.is_processing = false;

        debug!(
            "dispatched batch of {} events across {} types in {}ms (queue: {}, batch size: {})",
            batch_size,
            by_type.len(),
            elapsed,
            self.pending.len(),
            self.dynamic_batch_size
        );
    }

    fn update_metrics(
        &mut self,
        batch_size: usize,
        event_count: u64,
        latency_sum: f64,
        elapsed_ms: u64,
    ) {
        let m = &mut self.metrics;
        m.events_processed += event_count;
        m.batches_processed += 1;
        m.total_processing_time_ms += elapsed_ms;
        m.last_batch_size = batch_size;
        m.max_batch_size = m.max_batch_size.max(batch_size);

        if event_count > 0 {
            let batch_average = latency_sum / event_count as f64;
            m.average_latency_ms = if m.events_processed == event_count {
                batch_average
            } else {
                m.average_latency_ms * (1.0 - LATENCY_EMA_ALPHA) + batch_average * LATENCY_EMA_ALPHA
            };
        }

        if self.metrics.batches_processed % MEMORY_SAMPLE_EVERY == 0 {
            self.metrics.memory_usage_bytes = self.estimate_memory_usage();
        }
    }

    /// Rough live-footprint estimate from container sizes. Good enough for
    /// threshold alerting; not an allocator measurement.
    fn estimate_memory_usage(&self) -> usize {
        let event_size = mem::size_of::<MarketEvent>();
        (self.pending.len() + self.history.len()) * event_size
            + self.listeners.len() * mem::size_of::<ListenerFn>()
    }

    /// Push accumulated per-type latency stats and a metrics snapshot into
    /// the monitor, then reset the rolling buffers.
    fn flush_type_metrics(&mut self) {
        let mut monitor = self.monitor.borrow_mut();
        monitor.update_metrics(self.metrics.clone());

        for (event_type, buffer) in &mut self.type_latencies {
            if buffer.samples.is_empty() {
                continue;
            }
            let count = buffer.samples.len() as u64;
            let sum: f64 = buffer.samples.iter().sum();
            let max = buffer.samples.iter().cloned().fold(f64::MIN, f64::max);
            let min = buffer.samples.iter().cloned().fold(f64::MAX, f64::min);
            monitor.update_type_metrics(
                event_type,
                EventTypeMetrics {
                    count,
                    average_latency_ms: sum / count as f64,
                    max_latency_ms: max,
                    min_latency_ms: min,
                },
            );
            buffer.samples.clear();
        }
    }

    /// Register a subscriber for one event type. Listener ids give set
    /// semantics: re-registering an existing `(type, id)` pair is a no-op.
    pub fn add_event_listener(&mut self, event_type: &str, listener_id: &str, callback: ListenerFn) {
        if self.disposed {
            return;
        }
        self.listeners
            .entry(event_type.to_string())
            .or_default()
            .entry(listener_id.to_string())
            .or_insert(callback);
    }

    /// Remove a subscriber. Unknown `(type, id)` pairs are a no-op.
    pub fn remove_event_listener(&mut self, event_type: &str, listener_id: &str) {
        if let Some(subscribers) = self.listeners.get_mut(event_type) {
            subscribers.remove(listener_id);
            if subscribers.is_empty() {
                self.listeners.remove(event_type);
            }
        }
    }

    pub fn get_metrics(&self) -> ProcessingMetrics {
        self.metrics.clone()
    }

    /// Processed events in chronological order, oldest first.
    pub fn get_event_history(&self) -> Vec<MarketEvent> {
        self.history.get_all()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn queue_len(&self) -> usize {
        self.pending.len()
    }

    pub fn dynamic_batch_size(&self) -> usize {
        self.dynamic_batch_size
    }

    /// Stop the cooperative loop and release listeners, queued events, and
    /// history. Idempotent; the processor is unusable afterwards.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        info!(
            "disposing event processor after {} events in {} batches",
            self.metrics.events_processed, self.metrics.batches_processed
        );
        self.disposed = true;
        self.listeners.clear();
        self.pending.clear();
        self.history.clear();
        self.type_latencies.clear();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}
