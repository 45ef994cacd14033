//! Disruption scenarios.
//!
//! Scenarios are drawn from a 32-bit Mersenne Twister seeded the way the experiment's
//! reference distributions were generated, so that a seed reproduces the published
//! scenario set bit for bit. Within a scenario every supplier is drawn before every
//! roastery, in topology order, and each node consumes exactly one uniform draw even
//! when its disruption probability is zero.

use crate::decisions::DisruptionOutcome;
use crate::error::{Error, Result};
use crate::topology::{NodeRef, RoasteryIndex, SupplierIndex, Topology};
use log::debug;
use rand::{Rng, RngCore, SeedableRng};
use std::collections::HashMap;
use typed_index_collections::TiVec;

const N: usize = 624;
const M: usize = 397;
const MATRIX_A: u32 = 0x9908_b0df;
const UPPER_MASK: u32 = 0x8000_0000;
const LOWER_MASK: u32 = 0x7fff_ffff;

/// MT19937 with the classic `init_genrand` seeding
#[derive(Clone)]
pub struct Mt19937 {
    state: [u32; N],
    index: usize,
}

impl Mt19937 {
    pub fn new(seed: u32) -> Self {
        let mut state = [0u32; N];
        state[0] = seed;
        for i in 1..N {
            let prev = state[i - 1];
            state[i] = 1_812_433_253u32
                .wrapping_mul(prev ^ (prev >> 30))
                .wrapping_add(i as u32);
        }
        Mt19937 { state, index: N }
    }

    fn twist(&mut self) {
        for i in 0..N {
            let y = (self.state[i] & UPPER_MASK) | (self.state[(i + 1) % N] & LOWER_MASK);
            let mut next = self.state[(i + M) % N] ^ (y >> 1);
            if y & 1 != 0 {
                next ^= MATRIX_A;
            }
            self.state[i] = next;
        }
        self.index = 0;
    }

    /// A uniform double in [0, 1) with 53 bits of randomness, built from two
    /// consecutive outputs (27 high bits of the first, 26 of the second).
    pub fn next_f64(&mut self) -> f64 {
        let a = (self.next_u32() >> 5) as f64;
        let b = (self.next_u32() >> 6) as f64;
        (a * 67_108_864.0 + b) / 9_007_199_254_740_992.0
    }
}

impl std::fmt::Debug for Mt19937 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mt19937").field("index", &self.index).finish()
    }
}

impl RngCore for Mt19937 {
    fn next_u32(&mut self) -> u32 {
        if self.index >= N {
            self.twist();
        }
        let mut y = self.state[self.index];
        self.index += 1;

        y ^= y >> 11;
        y ^= (y << 7) & 0x9d2c_5680;
        y ^= (y << 15) & 0xefc6_0000;
        y ^ (y >> 18)
    }

    fn next_u64(&mut self) -> u64 {
        let hi = self.next_u32() as u64;
        let lo = self.next_u32() as u64;
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for Mt19937 {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Mt19937::new(u32::from_le_bytes(seed))
    }

    fn seed_from_u64(state: u64) -> Self {
        Mt19937::new(state as u32)
    }
}

/// Disruption probability of every supplier and roastery
#[derive(Debug, Clone, PartialEq)]
pub struct DisruptionRisks {
    suppliers: TiVec<SupplierIndex, f64>,
    roasteries: TiVec<RoasteryIndex, f64>,
}

impl DisruptionRisks {
    /// No node is ever disrupted
    pub fn none(topology: &Topology) -> Self {
        Self {
            suppliers: topology.supplier_indices().map(|_| 0.0).collect(),
            roasteries: topology.roastery_indices().map(|_| 0.0).collect(),
        }
    }

    /// Risk-free network, except for the nodes named in `risks`
    pub fn from_map<K: AsRef<str>>(topology: &Topology, risks: &HashMap<K, f64>) -> Result<Self> {
        let mut out = Self::none(topology);
        for (node, &probability) in risks {
            out.set(topology, node.as_ref(), probability)?;
        }
        Ok(out)
    }

    pub fn set(&mut self, topology: &Topology, node: &str, probability: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&probability) {
            return Err(Error::InvalidProbability {
                node: node.to_string(),
                probability,
            });
        }
        match topology.node(node) {
            Some(NodeRef::Supplier(s)) => self.suppliers[s] = probability,
            Some(NodeRef::Roastery(r)) => self.roasteries[r] = probability,
            Some(NodeRef::Customer(_)) => return Err(Error::NotDisruptable(node.to_string())),
            None => return Err(Error::UnknownNode(node.to_string())),
        }
        Ok(())
    }

    pub fn supplier(&self, s: SupplierIndex) -> f64 {
        self.suppliers[s]
    }

    pub fn roastery(&self, r: RoasteryIndex) -> f64 {
        self.roasteries[r]
    }

    /// One disruption outcome, drawing only for nodes at risk
    pub fn realize<R: Rng + ?Sized>(&self, rng: &mut R) -> DisruptionOutcome {
        let mut draw = |p: f64| p > 0.0 && rng.gen::<f64>() < p;
        let suppliers = self.suppliers.iter().map(|&p| draw(p)).collect();
        let roasteries = self.roasteries.iter().map(|&p| draw(p)).collect();
        DisruptionOutcome::new(suppliers, roasteries)
    }
}

/// The ordered, immutable set of sampled scenarios
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioSet {
    scenarios: Vec<DisruptionOutcome>,
}

impl ScenarioSet {
    /// Samples `count` scenarios from a fresh generator seeded with `seed`. At least one
    /// scenario is required.
    pub fn sample(seed: u32, risks: &DisruptionRisks, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(Error::NoScenarios);
        }
        let mut rng = Mt19937::new(seed);
        let scenarios = (0..count)
            .map(|_| {
                let suppliers = risks.suppliers.iter().map(|&p| rng.next_f64() < p).collect();
                let roasteries = risks.roasteries.iter().map(|&p| rng.next_f64() < p).collect();
                DisruptionOutcome::new(suppliers, roasteries)
            })
            .collect::<Vec<_>>();

        debug!(
            "Sampled {} scenarios with seed {} ({} with at least one disruption)",
            count,
            seed,
            scenarios
                .iter()
                .filter(|s| s.suppliers().iter().chain(s.roasteries().iter()).any(|d| *d))
                .count()
        );

        Ok(ScenarioSet { scenarios })
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DisruptionOutcome> {
        self.scenarios.iter()
    }

    /// Weight of each scenario in the expected profit
    pub fn probability(&self) -> f64 {
        1.0 / self.scenarios.len() as f64
    }
}

impl std::ops::Index<usize> for ScenarioSet {
    type Output = DisruptionOutcome;

    fn index(&self, index: usize) -> &DisruptionOutcome {
        &self.scenarios[index]
    }
}
