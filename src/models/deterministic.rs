use crate::decisions::{ActivationDecision, DisruptionOutcome};
use crate::error::Result;
use crate::models::network::{ActivationVariables, FlowVariables};
use crate::models::utils::{self, Diagnosis};
use crate::topology::Topology;
use grb::prelude::*;
use log::{debug, info};
use std::collections::HashMap;
use std::fmt;

/// Outcome of a deterministic evaluation. A model without an optimal solution is a
/// regular result, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// Optimal profit, rounded to whole currency units
    Profit(i64),
    Diagnosis(Diagnosis),
}

impl Evaluation {
    pub fn profit(&self) -> Option<i64> {
        match self {
            Evaluation::Profit(profit) => Some(*profit),
            Evaluation::Diagnosis(_) => None,
        }
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluation::Profit(profit) => write!(f, "{}", profit),
            Evaluation::Diagnosis(diagnosis) => write!(f, "{}", diagnosis),
        }
    }
}

/// Solves the network for one fixed activation decision under one disruption outcome
pub struct DeterministicEvaluator {}

impl DeterministicEvaluator {
    /// Builds the single-scenario model. Disruptions only remove flow from nodes the
    /// decision activates.
    pub fn build(
        topology: &Topology,
        decision: &ActivationDecision,
        disruption: &DisruptionOutcome,
    ) -> Result<Model> {
        decision.validate(topology)?;
        disruption.validate(topology)?;
        debug!("Building deterministic model for {}", decision.key());

        let mut model = Model::new("coffee_deterministic")?;
        utils::configure(&mut model)?;

        //*****************CREATE VARIABLES*****************//
        let flows = FlowVariables::new(&mut model, topology, "")?;
        let activation = ActivationVariables::new(&mut model, topology)?;

        //*****************SET OBJECTIVE*****************//
        let profit = topology.bonus_pool() + flows.contribution(topology) - activation.fixed_costs(topology);
        model.set_objective(profit, Maximize)?;

        //*****************ADD CONSTRAINTS*****************//
        activation.add_consistency_constraints(&mut model, topology)?;
        flows.add_structural_constraints(&mut model, topology, &activation, "")?;
        activation.enforce(&mut model, topology, decision)?;

        for s in topology.supplier_indices() {
            if decision.supplier(s).is_active() && disruption.supplier(s) {
                flows.add_supplier_disruption(&mut model, topology, s, "")?;
            }
        }
        for r in topology.roastery_indices() {
            if decision.roastery(r).is_active() && disruption.roastery(r) {
                flows.add_roastery_disruption(&mut model, topology, r, "")?;
            }
        }

        model.update()?;
        Ok(model)
    }

    pub fn evaluate(
        topology: &Topology,
        decision: &ActivationDecision,
        disruption: &DisruptionOutcome,
    ) -> Result<Evaluation> {
        let mut model = Self::build(topology, decision, disruption)?;

        let evaluation = match utils::solve(&mut model)? {
            Ok(objective) => Evaluation::Profit(objective.round() as i64),
            Err(diagnosis) => Evaluation::Diagnosis(diagnosis),
        };

        match &evaluation {
            Evaluation::Profit(profit) => info!("Deterministic profit of {}: {}", decision.key(), profit),
            Evaluation::Diagnosis(diagnosis) => info!("No optimal solution for {}: {:?}", decision.key(), diagnosis),
        }
        Ok(evaluation)
    }

    /// Evaluates decision labels and a (possibly partial) disruption map, as supplied
    /// by callers outside the crate. Malformed input fails before any model is built.
    pub fn evaluate_labels<K, V, D>(
        topology: &Topology,
        decisions: &HashMap<K, V>,
        disruptions: &HashMap<D, bool>,
    ) -> Result<Evaluation>
    where
        K: AsRef<str>,
        V: AsRef<str>,
        D: AsRef<str>,
    {
        let decision = ActivationDecision::from_labels(topology, decisions)?;
        let disruption = DisruptionOutcome::from_map(topology, disruptions)?;
        Self::evaluate(topology, &decision, &disruption)
    }
}
