use crate::decisions::ActivationDecision;
use crate::distribution::ProfitDistribution;
use crate::error::{Error, Result};
use crate::models::network::{ActivationVariables, FlowValues, FlowVariables};
use crate::models::utils::{self, ConvertVars};
use crate::scenario::{DisruptionRisks, ScenarioSet};
use crate::topology::{PerLevel, Topology};
use grb::prelude::*;
use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;

/// Where the activation variables of a stochastic model stand
#[derive(Debug, Clone, PartialEq)]
pub enum ModelState {
    /// Every activation variable is free
    Built,
    /// Solved with free activation variables
    Solved,
    /// Solved with the activation variables fixed to a decision
    Pinned(ActivationDecision),
}

/// The result of solving the stochastic model for one activation decision
#[derive(Debug, Clone, PartialEq)]
pub struct StochasticEvaluation {
    pub decision: ActivationDecision,
    /// Objective value: the average profit over all scenarios
    pub expected_profit: f64,
    pub distribution: ProfitDistribution,
}

/// Two-stage recourse model over a fixed scenario set.
///
/// Activation variables are shared by all scenarios, while every scenario has its own
/// flows. A scenario's disruptions remove the flow through the disrupted nodes
/// whether or not they end up activated.
pub struct StochasticModel {
    topology: Arc<Topology>,
    scenarios: ScenarioSet,
    model: Model,
    activation: ActivationVariables,
    flows: Vec<FlowVariables>,
    state: ModelState,
}

impl StochasticModel {
    pub fn build(topology: Arc<Topology>, scenarios: ScenarioSet) -> Result<Self> {
        if scenarios.is_empty() {
            return Err(Error::NoScenarios);
        }
        for scenario in scenarios.iter() {
            scenario.validate(&topology)?;
        }
        info!("Building stochastic model with {} scenarios.", scenarios.len());

        let mut model = Model::new("coffee_stochastic")?;
        utils::configure(&mut model)?;

        //*****************CREATE VARIABLES*****************//
        let activation = ActivationVariables::new(&mut model, &topology)?;
        let mut flows = Vec::with_capacity(scenarios.len());
        for n in 0..scenarios.len() {
            flows.push(FlowVariables::new(&mut model, &topology, &format!("[{}]", n))?);
        }

        //*****************SET OBJECTIVE*****************//
        let contribution = flows.iter().map(|f| f.contribution(&topology)).grb_sum();
        let expected = topology.bonus_pool() + scenarios.probability() * contribution
            - activation.fixed_costs(&topology);
        model.set_objective(expected, Maximize)?;

        //*****************ADD CONSTRAINTS*****************//
        activation.add_consistency_constraints(&mut model, &topology)?;
        for (n, (scenario, f)) in scenarios.iter().zip(&flows).enumerate() {
            let tag = format!("[{}]", n);
            f.add_structural_constraints(&mut model, &topology, &activation, &tag)?;

            for s in topology.supplier_indices().filter(|&s| scenario.supplier(s)) {
                f.add_supplier_disruption(&mut model, &topology, s, &tag)?;
            }
            for r in topology.roastery_indices().filter(|&r| scenario.roastery(r)) {
                f.add_roastery_disruption(&mut model, &topology, r, &tag)?;
            }
        }

        model.update()?;
        info!("Successfully built stochastic model");

        Ok(Self {
            topology,
            scenarios,
            model,
            activation,
            flows,
            state: ModelState::Built,
        })
    }

    /// Samples `count` scenarios with `seed` and builds the model over them
    pub fn sample(topology: Arc<Topology>, seed: u32, risks: &DisruptionRisks, count: usize) -> Result<Self> {
        let scenarios = ScenarioSet::sample(seed, risks, count)?;
        Self::build(topology, scenarios)
    }

    /// The activation decision with the highest expected profit
    pub fn optimize(&mut self) -> Result<StochasticEvaluation> {
        self.activation.release(&mut self.model)?;
        self.state = ModelState::Built;

        let expected_profit = utils::solve(&mut self.model)?.map_err(Error::Unsolved)?;
        let decision = self.activation.values(&self.model)?;
        self.state = ModelState::Solved;

        info!("Optimal decision {} with expected profit {:.2}", decision.key(), expected_profit);
        self.evaluation(decision, expected_profit)
    }

    /// Fixes the activation variables to `decision` and solves the recourse of every
    /// scenario. Pins from earlier calls never carry over, and a failed solve leaves the
    /// model released.
    pub fn evaluate_under_decisions(&mut self, decision: &ActivationDecision) -> Result<StochasticEvaluation> {
        decision.validate(&self.topology)?;
        self.activation.pin(&mut self.model, decision)?;

        let expected_profit = match utils::solve(&mut self.model) {
            Ok(Ok(objective)) => objective,
            Ok(Err(diagnosis)) => {
                self.release()?;
                return Err(Error::Unsolved(diagnosis));
            }
            Err(err) => {
                self.release()?;
                return Err(err.into());
            }
        };
        self.state = ModelState::Pinned(decision.clone());
        debug!("Expected profit of {}: {:.2}", decision.key(), expected_profit);
        self.evaluation(decision.clone(), expected_profit)
    }

    /// [`evaluate_under_decisions`](Self::evaluate_under_decisions) for decision labels
    /// keyed by node name
    pub fn evaluate_labels<K, V>(&mut self, labels: &HashMap<K, V>) -> Result<StochasticEvaluation>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let decision = ActivationDecision::from_labels(&self.topology, labels)?;
        self.evaluate_under_decisions(&decision)
    }

    /// Frees every activation variable again
    pub fn release(&mut self) -> Result<()> {
        self.activation.release(&mut self.model)?;
        self.state = ModelState::Built;
        Ok(())
    }

    fn evaluation(&self, decision: ActivationDecision, expected_profit: f64) -> Result<StochasticEvaluation> {
        let profits = self.scenario_profits(&decision)?;
        Ok(StochasticEvaluation {
            decision,
            expected_profit,
            distribution: ProfitDistribution::from_profits(&profits),
        })
    }

    /// Realized profit of every scenario in the last solution
    fn scenario_profits(&self, decision: &ActivationDecision) -> Result<Vec<f64>> {
        Ok(self
            .flow_values()?
            .iter()
            .map(|flows| self.topology.scenario_profit(decision, flows))
            .collect())
    }

    /// Solved flows of every scenario
    pub fn flow_values(&self) -> Result<Vec<FlowValues>> {
        let mut out = Vec::with_capacity(self.flows.len());
        for f in &self.flows {
            out.push(f.values(&self.model)?);
        }
        Ok(out)
    }

    /// Solved values of the (low, high) activation variables of every roastery
    pub fn roastery_levels(&self) -> Result<Vec<PerLevel<f64>>> {
        Ok(self.activation.roastery.convert(&self.model)?)
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    pub fn scenarios(&self) -> &ScenarioSet {
        &self.scenarios
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }
}
