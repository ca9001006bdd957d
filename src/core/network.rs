use log::debug;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};

use super::types::{Department, DepartmentId, MarketEvent};

/// Fraction of an impact applied to each department metric.
const PERFORMANCE_FACTOR: f64 = 0.6;
const EFFICIENCY_FACTOR: f64 = 0.4;
const SATISFACTION_FACTOR: f64 = 0.3;

/// Per-hop multiplicative decay applied during propagation.
const DIMINISHING_BASE: f64 = 0.7;
/// Dampening applied when a propagation path re-enters a visited node.
const CIRCULAR_DAMPENING: f64 = 0.4;
/// Propagation stops once a path reaches this depth.
const MAX_PROPAGATION_DEPTH: f64 = 3.0;
/// Depth cost of traversing into a node with more than one dependency.
const DENSE_NODE_DEPTH_STEP: f64 = 1.5;

/// Edge weight derivation: reciprocal relationships bind tighter.
const RECIPROCAL_BASE_WEIGHT: f64 = 0.75;
const ONE_WAY_BASE_WEIGHT: f64 = 0.5;
const WEIGHT_JITTER: f64 = 0.15;
const MIN_EDGE_WEIGHT: f64 = 0.3;
const MAX_EDGE_WEIGHT: f64 = 1.0;

/// Holds department state and a weighted dependency adjacency map, and
/// computes the total decaying effect of a single event across the graph.
///
/// Edge weights are derived once at construction and never re-weighted
/// during a run. Departments are never destroyed during a run.
pub struct DepartmentNetwork {
    departments: HashMap<DepartmentId, Department>,
    /// source id -> target id -> weight in [0.3, 1.0].
    adjacency: HashMap<DepartmentId, HashMap<DepartmentId, f64>>,
}

impl DepartmentNetwork {
    /// Build the network with entropy-seeded edge jitter.
    pub fn new(initial_departments: Vec<Department>) -> Self {
        Self::build(initial_departments, SmallRng::from_entropy())
    }

    /// Build the network with deterministic edge jitter, for tests and
    /// reproducible runs.
    pub fn with_seed(initial_departments: Vec<Department>, seed: u64) -> Self {
        Self::build(initial_departments, SmallRng::seed_from_u64(seed))
    }

    fn build(initial_departments: Vec<Department>, mut rng: SmallRng) -> Self {
        let mut departments = HashMap::new();
        for dept in initial_departments {
            departments.insert(dept.id.clone(), dept);
        }

        let mut adjacency: HashMap<DepartmentId, HashMap<DepartmentId, f64>> = HashMap::new();
        // Deterministic edge derivation order so a fixed seed yields fixed
        // weights regardless of map iteration.
        let mut ids: Vec<DepartmentId> = departments.keys().cloned().collect();
        ids.sort();

        for id in &ids {
            let mut edges = HashMap::new();
            let mut deps = departments[id].dependencies.clone();
            deps.sort();
            for target in deps {
                if !departments.contains_key(&target) {
                    continue;
                }
                let reciprocal = departments[&target].dependencies.contains(id);
                let base = if reciprocal {
                    RECIPROCAL_BASE_WEIGHT
                } else {
                    ONE_WAY_BASE_WEIGHT
                };
                let jitter = rng.gen_range(-WEIGHT_JITTER..=WEIGHT_JITTER);
                let weight = (base + jitter).clamp(MIN_EDGE_WEIGHT, MAX_EDGE_WEIGHT);
                edges.insert(target, weight);
            }
            adjacency.insert(id.clone(), edges);
        }

        Self {
            departments,
            adjacency,
        }
    }

    /// Apply an event's direct impact to its target department and cascade
    /// the diminishing effect through the dependency graph.
    ///
    /// Unknown department ids are a silent no-op.
    pub fn manage_departments(&mut self, event: &MarketEvent) {
        if !self.departments.contains_key(&event.department_id) {
            debug!(
                "ignoring event {} for unknown department '{}'",
                event.id, event.department_id
            );
            return;
        }

        self.apply_impact(&event.department_id, event.impact);

        let mut visited = HashSet::new();
        visited.insert(event.department_id.clone());
        self.propagate(&event.department_id, event.impact, visited, 0.0);
    }

    /// Walk outgoing edges from `source`, applying `original_impact`
    /// attenuated by edge weight and `0.7^depth`. Each path carries its own
    /// visited-set copy; re-entering a visited node applies a dampened
    /// impact and terminates that path.
    fn propagate(
        &mut self,
        source: &str,
        original_impact: f64,
        visited: HashSet<DepartmentId>,
        depth: f64,
    ) {
        if depth >= MAX_PROPAGATION_DEPTH {
            return;
        }

        let edges: Vec<(DepartmentId, f64)> = match self.adjacency.get(source) {
            Some(map) => {
                let mut list: Vec<_> = map.iter().map(|(t, w)| (t.clone(), *w)).collect();
                list.sort_by(|a, b| a.0.cmp(&b.0));
                list
            }
            None => return,
        };

        for (target, weight) in edges {
            let diminishing = DIMINISHING_BASE.powf(depth);
            let propagated = original_impact * weight * diminishing;

            if visited.contains(&target) {
                self.apply_impact(&target, propagated * CIRCULAR_DAMPENING);
                continue;
            }

            self.apply_impact(&target, propagated);

            let step = if self
                .departments
                .get(&target)
                .map_or(false, |d| d.dependencies.len() > 1)
            {
                DENSE_NODE_DEPTH_STEP
            } else {
                1.0
            };

            let mut path_visited = visited.clone();
            path_visited.insert(target.clone());
            self.propagate(&target, original_impact, path_visited, depth + step);
        }
    }

    fn apply_impact(&mut self, department_id: &str, impact: f64) {
        if let Some(dept) = self.departments.get_mut(department_id) {
            let m = &mut dept.metrics;
            m.performance = (m.performance + impact * PERFORMANCE_FACTOR).clamp(0.0, 100.0);
            m.efficiency = (m.efficiency + impact * EFFICIENCY_FACTOR).clamp(0.0, 100.0);
            m.satisfaction = (m.satisfaction + impact * SATISFACTION_FACTOR).clamp(0.0, 100.0);
        }
    }

    pub fn get_department_state(&self, department_id: &str) -> Option<&Department> {
        self.departments.get(department_id)
    }

    /// Snapshot of all departments, in no particular order.
    pub fn get_all_departments(&self) -> Vec<Department> {
        self.departments.values().cloned().collect()
    }

    /// Edge weight from `source` to `target`, if that edge exists.
    pub fn edge_weight(&self, source: &str, target: &str) -> Option<f64> {
        self.adjacency.get(source).and_then(|m| m.get(target)).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DepartmentMetrics;

    fn three_departments() -> Vec<Department> {
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
                &["sales"],
            ),
        ]
    }

    fn seeded_network() -> DepartmentNetwork {
        DepartmentNetwork::with_seed(three_departments(), 42)
    }

    #[test]
    fn test_initial_state_preserved() {
        let network = seeded_network();
        let sales = network.get_department_state("sales").unwrap();
        assert_eq!(sales.metrics, DepartmentMetrics::new(80.0, 75.0, 85.0));
        assert_eq!(network.get_all_departments().len(), 3);
    }

    #[test]
    fn test_edge_weights_within_contract_band() {
        let network = seeded_network();
        for source in ["sales", "marketing", "operations"] {
            for target in ["sales", "marketing", "operations"] {
                if let Some(w) = network.edge_weight(source, target) {
                    assert!((0.3..=1.0).contains(&w), "weight {} out of band", w);
                }
            }
        }
        // sales <-> marketing is reciprocal, sales -> operations is one-way,
        // so the reciprocal edge carries the higher base weight.
        let reciprocal = network.edge_weight("sales", "marketing").unwrap();
        assert!(reciprocal >= RECIPROCAL_BASE_WEIGHT - WEIGHT_JITTER);
    }

    #[test]
    fn test_direct_impact_split() {
        // An isolated department receives exactly the 0.6/0.4/0.3 split.
        let departments = vec![Department::new(
            "finance",
            "Finance",
            DepartmentMetrics::new(80.0, 75.0, 85.0),
            &[],
        )];
        let mut network = DepartmentNetwork::with_seed(departments, 42);
        let event = MarketEvent::new("market_change", "finance", 10.0).with_timestamp(1);
        network.manage_departments(&event);
        let finance = network.get_department_state("finance").unwrap();
        assert!((finance.metrics.performance - (80.0 + 10.0 * 0.6)).abs() < 1e-9);
        assert!((finance.metrics.efficiency - (75.0 + 10.0 * 0.4)).abs() < 1e-9);
        assert!((finance.metrics.satisfaction - (85.0 + 10.0 * 0.3)).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_department_is_noop() {
        let mut network = seeded_network();
        let before = network.get_all_departments();
        let event = MarketEvent::new("market_change", "does_not_exist", 5.0);
        network.manage_departments(&event);
        for dept in before {
            let after = network.get_department_state(&dept.id).unwrap();
            assert_eq!(after.metrics, dept.metrics);
        }
    }

    #[test]
    fn test_metrics_clamped_under_repeated_impact() {
        let mut network = seeded_network();
        for _ in 0..50 {
            let event = MarketEvent::new("market_change", "operations", 2.0);
            network.manage_departments(&event);
        }
        for dept in network.get_all_departments() {
            assert!(dept.metrics.performance <= 100.0);
            assert!(dept.metrics.efficiency <= 100.0);
            assert!(dept.metrics.satisfaction <= 100.0);
        }
        let mut network = seeded_network();
        for _ in 0..50 {
            let event = MarketEvent::new("market_change", "operations", -2.0);
            network.manage_departments(&event);
        }
        for dept in network.get_all_departments() {
            assert!(dept.metrics.performance >= 0.0);
            assert!(dept.metrics.efficiency >= 0.0);
            assert!(dept.metrics.satisfaction >= 0.0);
        }
    }

    #[test]
    fn test_cascade_reaches_dependents() {
        let mut network = seeded_network();
        let marketing_before = network
            .get_department_state("marketing")
            .unwrap()
            .metrics
            .performance;
        let event = MarketEvent::new("market_shift", "sales", 0.8);
        network.manage_departments(&event);
        let marketing_after = network
            .get_department_state("marketing")
            .unwrap()
            .metrics
            .performance;
        assert_ne!(marketing_after, marketing_before);
    }

    #[test]
    fn test_decay_ordering_direct_exceeds_hops() {
        // Two-node reciprocal cycle: sales <-> marketing.
        let departments = vec![
            Department::new(
                "sales",
                "Sales",
                DepartmentMetrics::new(50.0, 50.0, 50.0),
                &["marketing"],
            ),
            Department::new(
                "marketing",
                "Marketing",
                DepartmentMetrics::new(50.0, 50.0, 50.0),
                &["sales"],
            ),
        ];
        let mut network = DepartmentNetwork::with_seed(departments, 7);
        let event = MarketEvent::new("market_shift", "sales", 0.8);
        network.manage_departments(&event);

        let w_sm = network.edge_weight("sales", "marketing").unwrap();
        let w_ms = network.edge_weight("marketing", "sales").unwrap();

        let direct: f64 = 0.8;
        let one_hop = 0.8 * w_sm;
        // Second hop returns to the visited source, so it is decayed and
        // circular-dampened.
        let two_hop = 0.8 * w_ms * 0.7 * 0.4;
        assert!(direct.abs() > one_hop.abs());
        assert!(one_hop.abs() > two_hop.abs());

        let sales = network.get_department_state("sales").unwrap();
        let marketing = network.get_department_state("marketing").unwrap();
        let delta_sales = sales.metrics.performance - 50.0;
        let delta_marketing = marketing.metrics.performance - 50.0;
        assert!((delta_sales - (direct + two_hop) * 0.6).abs() < 1e-9);
        assert!((delta_marketing - one_hop * 0.6).abs() < 1e-9);
        assert!(delta_sales > delta_marketing);
    }

    #[test]
    fn test_cyclic_graph_terminates() {
        // Dense cycle: every department depends on every other.
        let departments = vec![
            Department::new("a", "A", DepartmentMetrics::new(50.0, 50.0, 50.0), &["b", "c"]),
            Department::new("b", "B", DepartmentMetrics::new(50.0, 50.0, 50.0), &["a", "c"]),
            Department::new("c", "C", DepartmentMetrics::new(50.0, 50.0, 50.0), &["a", "b"]),
        ];
        let mut network = DepartmentNetwork::with_seed(departments, 3);
        let event = MarketEvent::new("stress_test", "a", 1.0);
        // Must return rather than recurse unboundedly.
        network.manage_departments(&event);
        for dept in network.get_all_departments() {
            assert!((0.0..=100.0).contains(&dept.metrics.performance));
        }
    }

    #[test]
    fn test_missing_dependency_edges_skipped() {
        let departments = vec![Department::new(
            "solo",
            "Solo",
            DepartmentMetrics::new(50.0, 50.0, 50.0),
            &["ghost"],
        )];
        let mut network = DepartmentNetwork::with_seed(departments, 1);
        assert_eq!(network.edge_weight("solo", "ghost"), None);
        let event = MarketEvent::new("market_change", "solo", 1.0);
        network.manage_departments(&event);
        let solo = network.get_department_state("solo").unwrap();
        assert!((solo.metrics.performance - 50.6).abs() < 1e-9);
    }
}
