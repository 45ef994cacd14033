use crate::error::Result;
use crate::models::stochastic::StochasticModel;
use crate::scenario::{DisruptionRisks, ScenarioSet};
use crate::topology::Topology;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Settings of one experiment round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Seed of the scenario sampler
    pub seed: u32,
    /// Number of scenarios in the stochastic model
    pub scenarios: usize,
    /// Disruption probability per node. Nodes that are left out are never disrupted.
    pub disruption_risks: BTreeMap<String, f64>,
    /// Network description; the built-in coffee network if absent
    pub topology: Option<PathBuf>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            scenarios: 1000,
            disruption_risks: [("supplier1".to_string(), 0.3), ("roastery1".to_string(), 0.1)]
                .into_iter()
                .collect(),
            topology: None,
        }
    }
}

impl ExperimentConfig {
    pub fn from_json(string: &str) -> Result<Self> {
        Ok(serde_json::from_str(string)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }

    pub fn topology(&self) -> Result<Topology> {
        match &self.topology {
            Some(path) => Topology::from_path(path),
            None => Ok(Topology::coffee()),
        }
    }

    pub fn risks(&self, topology: &Topology) -> Result<DisruptionRisks> {
        let mut risks = DisruptionRisks::none(topology);
        for (node, &probability) in &self.disruption_risks {
            risks.set(topology, node, probability)?;
        }
        Ok(risks)
    }

    pub fn scenario_set(&self, topology: &Topology) -> Result<ScenarioSet> {
        ScenarioSet::sample(self.seed, &self.risks(topology)?, self.scenarios)
    }

    pub fn stochastic_model(&self, topology: Arc<Topology>) -> Result<StochasticModel> {
        let scenarios = self.scenario_set(&topology)?;
        StochasticModel::build(topology, scenarios)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::topology::{RoasteryIndex, SupplierIndex};

    #[test]
    fn defaults() {
        let config = ExperimentConfig::from_json("{}").unwrap();
        assert_eq!(config, ExperimentConfig::default());
        assert_eq!(config.seed, 42);
        assert_eq!(config.scenarios, 1000);

        let topology = config.topology().unwrap();
        let risks = config.risks(&topology).unwrap();
        assert_eq!(risks.supplier(SupplierIndex::from(0)), 0.3);
        assert_eq!(risks.supplier(SupplierIndex::from(1)), 0.0);
        assert_eq!(risks.roastery(RoasteryIndex::from(0)), 0.1);
    }

    #[test]
    fn overrides() {
        let config = ExperimentConfig::from_json(
            r#"{"seed": 7, "scenarios": 10, "disruption_risks": {"roastery2": 0.5}}"#,
        )
        .unwrap();
        assert_eq!(config.seed, 7);
        let topology = config.topology().unwrap();
        let risks = config.risks(&topology).unwrap();
        assert_eq!(risks.supplier(SupplierIndex::from(0)), 0.0);
        assert_eq!(risks.roastery(RoasteryIndex::from(1)), 0.5);
        assert_eq!(config.scenario_set(&topology).unwrap().len(), 10);
    }

    #[test]
    fn rejects_zero_scenarios() {
        let config = ExperimentConfig::from_json(r#"{"scenarios": 0}"#).unwrap();
        let topology = config.topology().unwrap();
        assert!(matches!(config.scenario_set(&topology), Err(Error::NoScenarios)));
    }

    #[test]
    fn rejects_bad_risks() {
        let config = ExperimentConfig::from_json(r#"{"disruption_risks": {"warehouse": 0.5}}"#).unwrap();
        let topology = config.topology().unwrap();
        assert!(matches!(config.risks(&topology), Err(Error::UnknownNode(_))));
    }
}
