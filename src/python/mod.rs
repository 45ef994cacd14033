use crate::decisions::ActivationDecision;
use crate::distribution::{self, ProfitDistribution};
use crate::models::deterministic::{DeterministicEvaluator, Evaluation};
use crate::models::stochastic::{StochasticEvaluation, StochasticModel};
use crate::scenario::{DisruptionRisks, ScenarioSet};
use crate::topology::Topology;
use log::trace;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

pub fn pyerr<D: Debug>(err: D) -> PyErr {
    PyErr::new::<PyValueError, _>(format!("{:?}", err))
}

/// Optimal profit of the decisions under one disruption outcome, or a diagnosis string
/// when the model has no optimal solution. Nodes missing from `disruptions` are not
/// disrupted.
#[pyfunction(disruptions = "None")]
pub fn evaluate_deterministic(
    py: Python,
    decisions: HashMap<String, String>,
    disruptions: Option<HashMap<String, bool>>,
) -> PyResult<PyObject> {
    let topology = Topology::coffee();
    let disruptions = disruptions.unwrap_or_default();
    let evaluation = DeterministicEvaluator::evaluate_labels(&topology, &decisions, &disruptions).map_err(pyerr)?;

    Ok(match evaluation {
        Evaluation::Profit(profit) => (profit as f64).into_py(py),
        Evaluation::Diagnosis(diagnosis) => diagnosis.to_string().into_py(py),
    })
}

/// The fixed-width key of a decision, e.g. `S1____S3___R1-h_____`
#[pyfunction]
pub fn decisions_str(decisions: HashMap<String, String>) -> PyResult<String> {
    let decision = ActivationDecision::from_labels(&Topology::coffee(), &decisions).map_err(pyerr)?;
    Ok(decision.key())
}

/// Rounds shares to two decimals such that they sum to exactly 1
#[pyfunction]
pub fn round_shares(shares: Vec<f64>) -> Vec<f64> {
    distribution::round_shares(&shares)
        .into_iter()
        .map(|cents| cents as f64 / 100.0)
        .collect()
}

fn distribution_dict(py: Python, distribution: &ProfitDistribution) -> PyResult<PyObject> {
    let dict = PyDict::new(py);
    for &(profit, probability) in distribution.entries() {
        dict.set_item(profit, probability)?;
    }
    Ok(dict.to_object(py))
}

#[pyclass(name = "StochasticModel", unsendable)]
pub struct PyStochasticModel {
    inner: StochasticModel,
}

#[pymethods]
impl PyStochasticModel {
    #[new]
    #[args(disruption_risks = "None", seed = "42", scenarios = "1000")]
    pub fn new(disruption_risks: Option<HashMap<String, f64>>, seed: u32, scenarios: usize) -> PyResult<Self> {
        let topology = Arc::new(Topology::coffee());
        let risks = disruption_risks.unwrap_or_else(|| {
            [("supplier1".to_string(), 0.3), ("roastery1".to_string(), 0.1)]
                .into_iter()
                .collect()
        });
        let risks = DisruptionRisks::from_map(&topology, &risks).map_err(pyerr)?;
        let scenarios = ScenarioSet::sample(seed, &risks, scenarios).map_err(pyerr)?;
        let inner = StochasticModel::build(topology, scenarios).map_err(pyerr)?;
        Ok(Self { inner })
    }

    /// Profit distribution of the decisions across all scenarios, highest profit first
    pub fn evaluate_stochastic(&mut self, py: Python, decisions: HashMap<String, String>) -> PyResult<PyObject> {
        trace!("evaluate_stochastic({:?})", decisions);
        let evaluation = self.inner.evaluate_labels(&decisions).map_err(pyerr)?;
        distribution_dict(py, &evaluation.distribution)
    }

    /// The decisions with the highest expected profit, with that profit and its distribution
    pub fn optimize(&mut self, py: Python) -> PyResult<PyObject> {
        let StochasticEvaluation {
            decision,
            expected_profit,
            distribution,
        } = self.inner.optimize().map_err(pyerr)?;

        let decisions = PyDict::new(py);
        for (node, label) in decision.labels(self.inner.topology()) {
            decisions.set_item(node, label)?;
        }

        let result = PyDict::new(py);
        result.set_item("decisions", decisions)?;
        result.set_item("expected_profit", expected_profit)?;
        result.set_item("distribution", distribution_dict(py, &distribution)?)?;
        result.set_item("key", decision.key())?;
        Ok(result.to_object(py))
    }

    /// Frees the activation variables pinned by earlier evaluations
    pub fn release(&mut self) -> PyResult<()> {
        self.inner.release().map_err(pyerr)
    }
}
