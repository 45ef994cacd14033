//! Per-participant stochastic models.

use crate::decisions::ActivationDecision;
use crate::error::{Error, Result};
use crate::models::stochastic::{StochasticEvaluation, StochasticModel};
use crate::scenario::ScenarioSet;
use crate::topology::Topology;
use log::{debug, info};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

/// Owns one stochastic model per participant. A model is built on the first
/// evaluation of its session and dropped when the session is closed.
pub struct SessionRegistry<K> {
    topology: Arc<Topology>,
    scenarios: ScenarioSet,
    sessions: HashMap<K, Option<StochasticModel>>,
}

impl<K: Eq + Hash + Debug> SessionRegistry<K> {
    /// Every session evaluates against the same scenarios
    pub fn new(topology: Arc<Topology>, scenarios: ScenarioSet) -> Self {
        Self {
            topology,
            scenarios,
            sessions: HashMap::new(),
        }
    }

    /// Opens a session for `key`. Returns false if one was already open.
    pub fn open(&mut self, key: K) -> bool {
        if self.sessions.contains_key(&key) {
            return false;
        }
        debug!("Opening session {:?}", key);
        self.sessions.insert(key, None);
        true
    }

    pub fn evaluate(&mut self, key: &K, decision: &ActivationDecision) -> Result<StochasticEvaluation> {
        let slot = self
            .sessions
            .get_mut(key)
            .ok_or_else(|| Error::UnknownSession(format!("{:?}", key)))?;

        if slot.is_none() {
            info!("Building model for session {:?}", key);
            *slot = Some(StochasticModel::build(self.topology.clone(), self.scenarios.clone())?);
        }

        match slot {
            Some(model) => model.evaluate_under_decisions(decision),
            None => Err(Error::UnknownSession(format!("{:?}", key))),
        }
    }

    /// Whether the session of `key` has built its model yet
    pub fn is_built(&self, key: &K) -> bool {
        matches!(self.sessions.get(key), Some(Some(_)))
    }

    /// Closes the session and drops its model. Returns false if it was not open.
    pub fn close(&mut self, key: &K) -> bool {
        debug!("Closing session {:?}", key);
        self.sessions.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
