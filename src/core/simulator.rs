use log::{debug, info};
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use super::aggregator::MetricsAggregator;
use super::clock::Clock;
use super::config::EngineConfig;
use super::errors::SimulationError;
use super::event_processor::EventProcessor;
use super::network::DepartmentNetwork;
use super::types::MarketEvent;

/// Authorization boundary consumed before the tick loop may start.
/// Implemented by the session layer outside the engine.
pub trait AuthGate {
    fn is_authenticated(&self, credential: Option<&str>) -> bool;
}

/// Request-budget boundary consumed alongside the auth gate.
pub trait RequestLimiter {
    fn allow_request(&self, token: &str) -> bool;
}

/// Mutable run state owned by the simulator.
#[derive(Debug, Clone, Default)]
pub struct SimulationState {
    pub current_tick: u64,
    /// Every event submitted during the run, append-only, never reordered.
    pub events: Vec<MarketEvent>,
    /// Watermark: ticks only consume events newer than this timestamp, so
    /// each event is picked up by exactly one tick.
    pub last_processed_event: u64,
}

/// Drives time-stepped execution: on each tick, queued events inside the
/// time window are fed to the department network and the event processor,
/// then the aggregator folds the run's event set.
///
/// The tick cadence is owned by the caller: `tick` advances one step
/// against the injected clock, `run_for` is the wall-clock driver.
pub struct MarketSimulator {
    network: DepartmentNetwork,
    processor: EventProcessor,
    aggregator: MetricsAggregator,
    clock: Rc<dyn Clock>,

    state: SimulationState,
    tick_interval_ms: u64,
    running: bool,

    auth_gate: Option<Box<dyn AuthGate>>,
    limiter: Option<Box<dyn RequestLimiter>>,
}

impl MarketSimulator {
    pub fn new(
        network: DepartmentNetwork,
        processor: EventProcessor,
        aggregator: MetricsAggregator,
        clock: Rc<dyn Clock>,
    ) -> Self {
        Self {
            network,
            processor,
            aggregator,
            clock,
            state: SimulationState::default(),
            tick_interval_ms: EngineConfig::default().tick_interval_ms,
            running: false,
            auth_gate: None,
            limiter: None,
        }
    }

    /// Install the production gates. Without them `start` behaves like
    /// `start_unchecked`.
    pub fn with_gates(
        mut self,
        auth_gate: Box<dyn AuthGate>,
        limiter: Box<dyn RequestLimiter>,
    ) -> Self {
        self.auth_gate = Some(auth_gate);
        self.limiter = Some(limiter);
        self
    }

    pub fn with_tick_interval_ms(mut self, interval: u64) -> Self {
        self.tick_interval_ms = interval;
        self
    }

    /// Begin a run after consulting the authorization gate and the rate
    /// limiter. On gate failure no tick loop starts. Starting an already
    /// running simulator is a no-op.
    pub fn start(&mut self, credential: Option<&str>) -> Result<(), SimulationError> {
        if self.running {
            return Ok(());
        }

        if let Some(gate) = &self.auth_gate {
            if !gate.is_authenticated(credential) {
                return Err(SimulationError::Unauthorized);
            }
        }
        if let Some(limiter) = &self.limiter {
            if !limiter.allow_request(credential.unwrap_or_default()) {
                return Err(SimulationError::RateLimitExceeded);
            }
        }

        info!("simulation started");
        self.running = true;
        Ok(())
    }

    /// Test/bypass mode: start without consulting the gates.
    pub fn start_unchecked(&mut self) {
        if !self.running {
            info!("simulation started (gates bypassed)");
            self.running = true;
        }
    }

    /// Stamp the submitted events with the current time and append them to
    /// the run's event list.
    pub fn add_events(&mut self, events: Vec<MarketEvent>) {
        let now = self.clock.now_ms();
        self.state.events.extend(
            events
                .into_iter()
                .map(|event| event.with_timestamp(now)),
        );
    }

    /// One simulation step: drain the time window of queued events into the
    /// network and the processor, advance the watermark, and refresh
    /// aggregated metrics. No-op while stopped.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        self.state.current_tick += 1;
        let now = self.clock.now_ms();

        let due: Vec<MarketEvent> = self
            .state
            .events
            .iter()
            .filter(|e| e.timestamp <= now && e.timestamp > self.state.last_processed_event)
            .cloned()
            .collect();

        for event in &due {
            self.network.manage_departments(event);
            self.processor.process_events(vec![event.clone()]);
        }
        if !due.is_empty() {
            self.state.last_processed_event = now;
        }

        self.aggregator.aggregate_metrics(&self.state.events);
        self.processor.poll(now);

        debug!(
            "tick {}: {} events consumed, watermark {}",
            self.state.current_tick,
            due.len(),
            self.state.last_processed_event
        );
    }

    /// Wall-clock driver: run `ticks` steps, sleeping the tick interval
    /// between them. Returns early if `stop` was called.
    pub fn run_for(&mut self, ticks: u64) {
        for _ in 0..ticks {
            if !self.running {
                break;
            }
            self.tick();
            thread::sleep(Duration::from_millis(self.tick_interval_ms));
        }
    }

    /// Cancel the tick loop. Subsequent `tick` calls are no-ops until
    /// `start` is called again.
    pub fn stop(&mut self) {
        if self.running {
            info!("simulation stopped at tick {}", self.state.current_tick);
        }
        self.running = false;
    }

    /// Stop and reinitialize the run state to its zero value.
    pub fn reset(&mut self) {
        self.stop();
        self.state = SimulationState::default();
        self.aggregator.reset();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn get_simulation_state(&self) -> SimulationState {
        self.state.clone()
    }

    pub fn network(&self) -> &DepartmentNetwork {
        &self.network
    }

    pub fn processor(&self) -> &EventProcessor {
        &self.processor
    }

    pub fn processor_mut(&mut self) -> &mut EventProcessor {
        &mut self.processor
    }

    pub fn aggregator_mut(&mut self) -> &mut MetricsAggregator {
        &mut self.aggregator
    }
}
