use crate::decisions::ActivationDecision;
use crate::distribution::ProfitDistribution;
use crate::error::Result;
use crate::models::stochastic::StochasticModel;
use log::info;
use std::collections::BTreeMap;
use std::path::Path;

/// Precomputed profit distribution of every activation decision, keyed by decision key
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScenarioLookup {
    entries: BTreeMap<String, ProfitDistribution>,
}

impl ScenarioLookup {
    /// Evaluates every decision of the model's topology. The model is released afterwards.
    pub fn build(model: &mut StochasticModel) -> Result<Self> {
        let decisions = ActivationDecision::all(model.topology());
        info!("Evaluating {} decisions", decisions.len());

        let mut entries = BTreeMap::new();
        for decision in decisions {
            let evaluation = model.evaluate_under_decisions(&decision)?;
            info!("{}: {}", decision.key(), evaluation.distribution);
            entries.insert(decision.key(), evaluation.distribution);
        }
        model.release()?;

        Ok(Self { entries })
    }

    pub fn get(&self, decision: &ActivationDecision) -> Option<&ProfitDistribution> {
        self.entries.get(&decision.key())
    }

    pub fn get_key(&self, key: &str) -> Option<&ProfitDistribution> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProfitDistribution)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes a flat JSON object from decision key to the stored text form of its distribution
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let rendered = self
            .entries
            .iter()
            .map(|(key, distribution)| (key.as_str(), distribution.render()))
            .collect::<BTreeMap<_, _>>();

        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(std::io::BufWriter::new(file), &rendered)?;
        Ok(())
    }

    /// Reads a file written by [`write_json`](Self::write_json). Probabilities are rounded
    /// to whole percent.
    pub fn read_json(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let rendered: BTreeMap<String, String> = serde_json::from_reader(std::io::BufReader::new(file))?;

        let entries = rendered
            .into_iter()
            .map(|(key, text)| Ok((key, ProfitDistribution::parse(&text)?.rounded())))
            .collect::<Result<_>>()?;
        Ok(Self { entries })
    }
}
