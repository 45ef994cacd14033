use crate::models::utils::Diagnosis;
use derive_more::Display;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display)]
pub enum Error {
    /// The name does not belong to any supplier, roastery or customer
    #[display(fmt = "unknown node `{}`", _0)]
    UnknownNode(String),
    /// The label is outside the closed set of decisions for the node's kind
    #[display(fmt = "unknown decision `{}` for node `{}`", label, node)]
    UnknownDecision { node: String, label: String },
    /// An activation decision must cover every supplier and roastery
    #[display(fmt = "no activation decision given for `{}`", _0)]
    MissingDecision(String),
    /// Only suppliers and roasteries can be disrupted
    #[display(fmt = "node `{}` cannot be disrupted", _0)]
    NotDisruptable(String),
    #[display(fmt = "disruption probability {} of `{}` is outside [0, 1]", probability, node)]
    InvalidProbability { node: String, probability: f64 },
    #[display(fmt = "malformed topology: {}", _0)]
    MalformedTopology(String),
    /// A decision key that does not follow the fixed-width layout
    #[display(fmt = "malformed decision key `{}`", _0)]
    MalformedKey(String),
    #[display(fmt = "malformed profit distribution `{}`", _0)]
    MalformedDistribution(String),
    /// A decision or disruption outcome built for a network with a different number of nodes
    #[display(
        fmt = "{} covers {} suppliers and {} roasteries, the network has {} and {}",
        what,
        suppliers,
        roasteries,
        expected_suppliers,
        expected_roasteries
    )]
    ShapeMismatch {
        what: &'static str,
        suppliers: usize,
        roasteries: usize,
        expected_suppliers: usize,
        expected_roasteries: usize,
    },
    /// A stochastic model needs at least one scenario
    #[display(fmt = "the scenario set is empty")]
    NoScenarios,
    /// No session is open under the key
    #[display(fmt = "no open session `{}`", _0)]
    UnknownSession(String),
    /// The solver finished without an optimal solution
    #[display(fmt = "{}", _0)]
    Unsolved(Diagnosis),
    #[display(fmt = "solver error: {:?}", _0)]
    Solver(grb::Error),
    #[display(fmt = "{}", _0)]
    Io(std::io::Error),
    #[display(fmt = "{}", _0)]
    Json(serde_json::Error),
}

impl std::error::Error for Error {}

impl From<grb::Error> for Error {
    fn from(err: grb::Error) -> Self {
        Error::Solver(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}
