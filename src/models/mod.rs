pub mod deterministic;
pub mod network;
pub mod stochastic;
pub mod utils;

pub use deterministic::{DeterministicEvaluator, Evaluation};
pub use stochastic::{ModelState, StochasticEvaluation, StochasticModel};
