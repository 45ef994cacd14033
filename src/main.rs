use clap::{Parser, Subcommand};
use coffee_network::config::ExperimentConfig;
use coffee_network::decisions::{ActivationDecision, DisruptionOutcome};
use coffee_network::distribution::{dollars, ProfitDistribution};
use coffee_network::lookup::ScenarioLookup;
use coffee_network::models::{DeterministicEvaluator, StochasticEvaluation};
use coffee_network::scenario::Mt19937;
use coffee_network::topology::Topology;
use coffee_network::Result;
use log::info;
use rand::SeedableRng;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[clap(name = "coffee_network", version, about = "Evaluates activation decisions on a coffee supply network")]
struct Cli {
    /// Experiment configuration (JSON)
    #[clap(long)]
    config: Option<PathBuf>,
    /// Overrides the scenario seed of the configuration
    #[clap(long)]
    seed: Option<u32>,
    /// Overrides the scenario count of the configuration
    #[clap(long)]
    scenarios: Option<usize>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Optimal profit of the decisions under one disruption outcome
    Deterministic {
        /// Decision label per node, e.g. '{"supplier1": "activate", ...}'
        #[clap(long)]
        decisions: String,
        /// Disrupted nodes, e.g. '{"supplier1": true}'
        #[clap(long, default_value = "{}")]
        disruptions: String,
    },
    /// Profit distribution of the decisions across all scenarios
    Stochastic {
        #[clap(long)]
        decisions: String,
    },
    /// Decisions with the highest expected profit
    Optimize,
    /// Draws one disruption outcome from the configured risks and evaluates the decisions under it
    Realize {
        #[clap(long)]
        decisions: String,
        /// Seed of the draw; random if absent
        #[clap(long)]
        draw_seed: Option<u64>,
    },
    /// Writes the profit distribution of every decision to a JSON file
    Export {
        #[clap(long)]
        output: PathBuf,
    },
}

fn parse_decisions(topology: &Topology, json: &str) -> Result<ActivationDecision> {
    let labels: HashMap<String, String> = serde_json::from_str(json)?;
    ActivationDecision::from_labels(topology, &labels)
}

fn object<V: Into<serde_json::Value>>(pairs: Vec<(String, V)>) -> serde_json::Value {
    pairs
        .into_iter()
        .map(|(key, value)| (key, value.into()))
        .collect::<serde_json::Map<_, _>>()
        .into()
}

fn distribution_json(distribution: &ProfitDistribution) -> serde_json::Value {
    distribution
        .entries()
        .iter()
        .map(|(profit, probability)| (profit.to_string(), json!(probability)))
        .collect::<serde_json::Map<_, _>>()
        .into()
}

fn evaluation_json(topology: &Topology, evaluation: &StochasticEvaluation) -> serde_json::Value {
    let distribution = &evaluation.distribution;
    json!({
        "key": evaluation.decision.key(),
        "decisions": object(evaluation.decision.labels(topology)),
        "expected_profit": evaluation.expected_profit,
        "std_dev": distribution.std_dev(),
        "coefficient_of_variation": distribution.coefficient_of_variation(),
        "distribution": distribution_json(distribution),
        "summary": distribution.to_string(),
    })
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => ExperimentConfig::from_path(path)?,
        None => ExperimentConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(scenarios) = cli.scenarios {
        config.scenarios = scenarios;
    }

    let topology = Arc::new(config.topology()?);
    info!("Running with seed {} and {} scenarios", config.seed, config.scenarios);

    match cli.command {
        Command::Deterministic {
            decisions,
            disruptions,
        } => {
            let decision = parse_decisions(&topology, &decisions)?;
            let disruptions: HashMap<String, bool> = serde_json::from_str(&disruptions)?;
            let disruption = DisruptionOutcome::from_map(&topology, &disruptions)?;
            println!("{}", DeterministicEvaluator::evaluate(&topology, &decision, &disruption)?);
        }
        Command::Stochastic { decisions } => {
            let decision = parse_decisions(&topology, &decisions)?;
            let mut model = config.stochastic_model(topology.clone())?;
            let evaluation = model.evaluate_under_decisions(&decision)?;
            println!("{}", serde_json::to_string_pretty(&evaluation_json(&topology, &evaluation))?);
        }
        Command::Optimize => {
            let mut model = config.stochastic_model(topology.clone())?;
            let evaluation = model.optimize()?;
            info!(
                "Provided solution: {} with expected profit {}",
                evaluation.decision.summary(&topology),
                dollars(evaluation.expected_profit.round() as i64)
            );
            println!("{}", serde_json::to_string_pretty(&evaluation_json(&topology, &evaluation))?);
        }
        Command::Realize {
            decisions,
            draw_seed,
        } => {
            let decision = parse_decisions(&topology, &decisions)?;
            let risks = config.risks(&topology)?;
            let outcome = match draw_seed {
                Some(seed) => risks.realize(&mut Mt19937::seed_from_u64(seed)),
                None => risks.realize(&mut rand::thread_rng()),
            };
            let evaluation = DeterministicEvaluator::evaluate(&topology, &decision, &outcome)?;
            let output = json!({
                "disruptions": object(outcome.to_map(&topology)),
                "profit": evaluation.to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Export { output } => {
            let mut model = config.stochastic_model(topology.clone())?;
            let lookup = ScenarioLookup::build(&mut model)?;
            lookup.write_json(&output)?;
            info!("Wrote {} distributions to {}", lookup.len(), output.display());
        }
    }

    Ok(())
}

pub fn main() {
    env_logger::init();

    if let Err(err) = run(Cli::parse()) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
