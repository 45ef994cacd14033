#![allow(dead_code)]

use coffee_network::decisions::{ActivationDecision, DisruptionOutcome};
use coffee_network::scenario::{DisruptionRisks, ScenarioSet};
use coffee_network::topology::Topology;
use std::collections::HashMap;

pub fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

pub fn disruptions(pairs: &[(&str, bool)]) -> HashMap<String, bool> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// The decision shown to participants as the optimal one
pub fn provided(topology: &Topology) -> ActivationDecision {
    decision(
        topology,
        &[
            ("supplier1", "activate"),
            ("supplier2", "do not activate"),
            ("supplier3", "activate"),
            ("roastery1", "activate (high)"),
            ("roastery2", "do not activate"),
        ],
    )
}

pub fn decision(topology: &Topology, pairs: &[(&str, &str)]) -> ActivationDecision {
    ActivationDecision::from_labels(topology, &labels(pairs)).unwrap()
}

pub fn outcome(topology: &Topology, pairs: &[(&str, bool)]) -> DisruptionOutcome {
    DisruptionOutcome::from_map(topology, &disruptions(pairs)).unwrap()
}

/// supplier1 fails with probability 0.3, roastery1 with 0.1
pub fn experiment_scenarios(topology: &Topology, count: usize) -> ScenarioSet {
    let risks: HashMap<&str, f64> = [("supplier1", 0.3), ("roastery1", 0.1)].into_iter().collect();
    let risks = DisruptionRisks::from_map(topology, &risks).unwrap();
    ScenarioSet::sample(42, &risks, count).unwrap()
}
