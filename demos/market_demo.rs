//! Demo driver: a seeded stream of market events over a three-department
//! network, run for a fixed number of ticks with metrics printed at the end.
//!
//! Run with `RUST_LOG=debug` to watch batch cycles and ticks.

use marketsim::{
    Department, DepartmentMetrics, DepartmentNetwork, EventProcessor, MarketEvent,
    MarketSimulator, MetricsAggregator, PerformanceMonitor, SystemClock,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::cell::RefCell;
use std::rc::Rc;

const SEED: u64 = 42;
const TICKS: u64 = 25;
const EVENTS_PER_TICK: usize = 40;

fn initial_departments() -> Vec<Department> {
    vec![
        Department::new(
            "sales",
            "Sales",
            DepartmentMetrics::new(80.0, 75.0, 85.0),
            &["marketing", "operations"],
        ),
        Department::new(
            "marketing",
            "Marketing",
            DepartmentMetrics::new(85.0, 80.0, 75.0),
            &["sales"],
        ),
        Department::new(
            "operations",
            "Operations",
            DepartmentMetrics::new(90.0, 85.0, 80.0),
            &["sales", "marketing"],
        ),
    ]
}

fn main() {
    env_logger::init();

    println!("Market Simulation Demo");
    println!("======================");
    println!("Seed: {}", SEED);
    println!("Ticks: {}", TICKS);
    println!();

    let clock = SystemClock::new();
    let monitor = Rc::new(RefCell::new(PerformanceMonitor::new(clock.clone())));
    monitor.borrow_mut().on_alert(Box::new(|alert| {
        println!("  [alert] {}: {}", alert.metric, alert.message);
    }));

    let mut simulator = MarketSimulator::new(
        DepartmentNetwork::with_seed(initial_departments(), SEED),
        EventProcessor::new(clock.clone(), monitor.clone()),
        MetricsAggregator::new(clock.clone()),
        clock,
    )
    .with_tick_interval_ms(200);

    simulator
        .processor_mut()
        .add_event_listener(
            "market_shift",
            "console",
            Box::new(|event| {
                log::debug!("market_shift on {}: {:+.3}", event.department_id, event.impact);
                Ok(())
            }),
        );

    simulator.start_unchecked();

    let mut rng = SmallRng::seed_from_u64(SEED);
    let impact_dist = Normal::new(0.0, 0.6).expect("valid distribution parameters");
    let event_types = ["market_shift", "rapid_change", "stress_test", "news_cycle"];
    let departments = ["sales", "marketing", "operations"];

    for tick in 0..TICKS {
        let events: Vec<MarketEvent> = (0..EVENTS_PER_TICK)
            .map(|_| {
                let event_type = event_types[rng.gen_range(0..event_types.len())];
                let department = departments[rng.gen_range(0..departments.len())];
                MarketEvent::new(event_type, department, impact_dist.sample(&mut rng))
            })
            .collect();
        simulator.add_events(events);
        simulator.run_for(1);

        if (tick + 1) % 5 == 0 {
            println!("tick {:>3}: departments:", tick + 1);
            let mut all = simulator.network().get_all_departments();
            all.sort_by(|a, b| a.id.cmp(&b.id));
            for dept in all {
                println!(
                    "  {:<12} perf {:>6.2}  eff {:>6.2}  sat {:>6.2}",
                    dept.name,
                    dept.metrics.performance,
                    dept.metrics.efficiency,
                    dept.metrics.satisfaction
                );
            }
        }
    }

    simulator.stop();

    println!();
    let metrics = simulator.processor().get_metrics();
    println!("Processing metrics:");
    println!("  events processed:  {}", metrics.events_processed);
    println!("  batches processed: {}", metrics.batches_processed);
    println!("  average latency:   {:.2}ms", metrics.average_latency_ms);
    println!("  max batch size:    {}", metrics.max_batch_size);

    let snapshot = simulator.aggregator_mut().get_metrics();
    println!();
    println!("Aggregated department values:");
    let mut entries: Vec<_> = snapshot.metrics.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    for (id, value) in entries {
        println!("  {:<12} {:>6.2}", id, value);
    }
}
