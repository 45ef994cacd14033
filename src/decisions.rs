use crate::error::{Error, Result};
use crate::topology::{Level, NodeRef, PerLevel, RoasteryIndex, SupplierIndex, Topology};
use itertools::Itertools;
use std::collections::HashMap;
use typed_index_collections::TiVec;

/// What to do with a supplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupplierDecision {
    Activate,
    DoNotActivate,
}

impl SupplierDecision {
    pub const ALL: [SupplierDecision; 2] = [SupplierDecision::DoNotActivate, SupplierDecision::Activate];

    pub fn label(&self) -> &'static str {
        match self {
            SupplierDecision::Activate => "activate",
            SupplierDecision::DoNotActivate => "do not activate",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "activate" => Some(SupplierDecision::Activate),
            "do not activate" => Some(SupplierDecision::DoNotActivate),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, SupplierDecision::Activate)
    }
}

/// What to do with a roastery: keep it closed, or run it at one of its levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoasteryDecision {
    DoNotActivate,
    Activate(Level),
}

impl RoasteryDecision {
    pub const ALL: [RoasteryDecision; 3] = [
        RoasteryDecision::DoNotActivate,
        RoasteryDecision::Activate(Level::Low),
        RoasteryDecision::Activate(Level::High),
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RoasteryDecision::DoNotActivate => "do not activate",
            RoasteryDecision::Activate(Level::Low) => "activate (low)",
            RoasteryDecision::Activate(Level::High) => "activate (high)",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "do not activate" => Some(RoasteryDecision::DoNotActivate),
            "activate (low)" => Some(RoasteryDecision::Activate(Level::Low)),
            "activate (high)" => Some(RoasteryDecision::Activate(Level::High)),
            _ => None,
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self {
            RoasteryDecision::DoNotActivate => None,
            RoasteryDecision::Activate(level) => Some(*level),
        }
    }

    pub fn is_active(&self) -> bool {
        self.level().is_some()
    }

    /// The values of the (low, high) activation variables
    pub fn binary(&self) -> PerLevel<f64> {
        let on = |level| if self.level() == Some(level) { 1.0 } else { 0.0 };
        PerLevel {
            low: on(Level::Low),
            high: on(Level::High),
        }
    }
}

fn check_shape(what: &'static str, suppliers: usize, roasteries: usize, topology: &Topology) -> Result<()> {
    let expected_suppliers = topology.suppliers().len();
    let expected_roasteries = topology.roasteries().len();
    if suppliers == expected_suppliers && roasteries == expected_roasteries {
        Ok(())
    } else {
        Err(Error::ShapeMismatch {
            what,
            suppliers,
            roasteries,
            expected_suppliers,
            expected_roasteries,
        })
    }
}

/// One decision for every supplier and roastery of a topology.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActivationDecision {
    suppliers: TiVec<SupplierIndex, SupplierDecision>,
    roasteries: TiVec<RoasteryIndex, RoasteryDecision>,
}

impl ActivationDecision {
    pub fn new(
        suppliers: TiVec<SupplierIndex, SupplierDecision>,
        roasteries: TiVec<RoasteryIndex, RoasteryDecision>,
    ) -> Self {
        Self {
            suppliers,
            roasteries,
        }
    }

    /// Fails unless the decision has one entry per supplier and roastery of `topology`
    pub fn validate(&self, topology: &Topology) -> Result<()> {
        check_shape("activation decision", self.suppliers.len(), self.roasteries.len(), topology)
    }

    /// Nothing is activated
    pub fn inactive(topology: &Topology) -> Self {
        Self {
            suppliers: topology.supplier_indices().map(|_| SupplierDecision::DoNotActivate).collect(),
            roasteries: topology.roastery_indices().map(|_| RoasteryDecision::DoNotActivate).collect(),
        }
    }

    /// Parses a mapping from node name to decision label. Every supplier and roastery
    /// of the topology must be present.
    pub fn from_labels<K, V>(topology: &Topology, labels: &HashMap<K, V>) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut suppliers: TiVec<SupplierIndex, Option<SupplierDecision>> =
            topology.supplier_indices().map(|_| None).collect();
        let mut roasteries: TiVec<RoasteryIndex, Option<RoasteryDecision>> =
            topology.roastery_indices().map(|_| None).collect();

        for (node, label) in labels {
            let (node, label) = (node.as_ref(), label.as_ref());
            let unknown = || Error::UnknownDecision {
                node: node.to_string(),
                label: label.to_string(),
            };
            match topology.node(node) {
                Some(NodeRef::Supplier(s)) => {
                    suppliers[s] = Some(SupplierDecision::from_label(label).ok_or_else(unknown)?)
                }
                Some(NodeRef::Roastery(r)) => {
                    roasteries[r] = Some(RoasteryDecision::from_label(label).ok_or_else(unknown)?)
                }
                Some(NodeRef::Customer(_)) => return Err(unknown()),
                None => return Err(Error::UnknownNode(node.to_string())),
            }
        }

        let suppliers = suppliers
            .into_iter_enumerated()
            .map(|(s, d)| d.ok_or_else(|| Error::MissingDecision(topology.suppliers()[s].name().to_string())))
            .collect::<Result<_>>()?;
        let roasteries = roasteries
            .into_iter_enumerated()
            .map(|(r, d)| d.ok_or_else(|| Error::MissingDecision(topology.roasteries()[r].name().to_string())))
            .collect::<Result<_>>()?;

        Ok(Self {
            suppliers,
            roasteries,
        })
    }

    /// The decision labels, suppliers first, in topology order
    pub fn labels(&self, topology: &Topology) -> Vec<(String, String)> {
        let suppliers = self
            .suppliers
            .iter_enumerated()
            .map(|(s, d)| (topology.suppliers()[s].name().to_string(), d.label().to_string()));
        let roasteries = self
            .roasteries
            .iter_enumerated()
            .map(|(r, d)| (topology.roasteries()[r].name().to_string(), d.label().to_string()));
        suppliers.chain(roasteries).collect()
    }

    /// Reads a decision back from the values of the activation variables
    pub fn from_binary(
        suppliers: &TiVec<SupplierIndex, f64>,
        roasteries: &TiVec<RoasteryIndex, PerLevel<f64>>,
    ) -> Self {
        let suppliers = suppliers
            .iter()
            .map(|&x| match x > 0.5 {
                true => SupplierDecision::Activate,
                false => SupplierDecision::DoNotActivate,
            })
            .collect();
        let roasteries = roasteries
            .iter()
            .map(|x| match (x.low > 0.5, x.high > 0.5) {
                (_, true) => RoasteryDecision::Activate(Level::High),
                (true, false) => RoasteryDecision::Activate(Level::Low),
                (false, false) => RoasteryDecision::DoNotActivate,
            })
            .collect();

        Self {
            suppliers,
            roasteries,
        }
    }

    pub fn supplier_binary(&self) -> TiVec<SupplierIndex, f64> {
        self.suppliers
            .iter()
            .map(|d| if d.is_active() { 1.0 } else { 0.0 })
            .collect()
    }

    pub fn roastery_binary(&self) -> TiVec<RoasteryIndex, PerLevel<f64>> {
        self.roasteries.iter().map(|d| d.binary()).collect()
    }

    pub fn supplier(&self, s: SupplierIndex) -> SupplierDecision {
        self.suppliers[s]
    }

    pub fn roastery(&self, r: RoasteryIndex) -> RoasteryDecision {
        self.roasteries[r]
    }

    pub fn suppliers(&self) -> &TiVec<SupplierIndex, SupplierDecision> {
        &self.suppliers
    }

    pub fn roasteries(&self) -> &TiVec<RoasteryIndex, RoasteryDecision> {
        &self.roasteries
    }

    /// Every decision for the topology. Supplier combinations vary slowest, and the
    /// last node varies fastest.
    pub fn all(topology: &Topology) -> Vec<ActivationDecision> {
        let suppliers = topology
            .supplier_indices()
            .map(|_| SupplierDecision::ALL.iter().copied())
            .multi_cartesian_product()
            .collect::<Vec<_>>();
        let roasteries = topology
            .roastery_indices()
            .map(|_| RoasteryDecision::ALL.iter().copied())
            .multi_cartesian_product()
            .collect::<Vec<_>>();

        suppliers
            .iter()
            .cartesian_product(roasteries.iter())
            .map(|(s, r)| ActivationDecision {
                suppliers: s.clone().into(),
                roasteries: r.clone().into(),
            })
            .collect()
    }

    /// The fixed-width key of the decision, e.g. `S1____S3___R1-h_____`.
    ///
    /// Supplier `i` occupies the two-character slot `Si` (or `__` when inactive),
    /// roastery `i` the four-character slot `Ri-l`/`Ri-h` (or `____`). Slots are
    /// separated by `_`, and the supplier and roastery blocks by `___`. Topologies
    /// are limited to [`MAX_KEYED_NODES`](crate::topology::MAX_KEYED_NODES) suppliers and roasteries so every index
    /// is a single digit.
    pub fn key(&self) -> String {
        let suppliers = self
            .suppliers
            .iter()
            .enumerate()
            .map(|(i, d)| match d {
                SupplierDecision::Activate => format!("S{}", i + 1),
                SupplierDecision::DoNotActivate => "__".to_string(),
            })
            .join("_");
        let roasteries = self
            .roasteries
            .iter()
            .enumerate()
            .map(|(i, d)| match d {
                RoasteryDecision::DoNotActivate => "____".to_string(),
                RoasteryDecision::Activate(Level::Low) => format!("R{}-l", i + 1),
                RoasteryDecision::Activate(Level::High) => format!("R{}-h", i + 1),
            })
            .join("_");

        format!("{}___{}", suppliers, roasteries)
    }

    /// Parses a key produced by [`ActivationDecision::key`]
    pub fn from_key(topology: &Topology, key: &str) -> Result<Self> {
        let malformed = || Error::MalformedKey(key.to_string());
        let n = topology.suppliers().len();
        let m = topology.roasteries().len();

        let bytes = key.as_bytes();
        let split = 3 * n - 1;
        if bytes.len() != split + 3 + 5 * m - 1 || &bytes[split..split + 3] != b"___" {
            return Err(malformed());
        }
        let (supplier_block, roastery_block) = (&bytes[..split], &bytes[split + 3..]);

        let suppliers = supplier_block
            .chunks(3)
            .enumerate()
            .map(|(i, slot)| match &slot[..2] {
                b"__" => Ok(SupplierDecision::DoNotActivate),
                s if s == format!("S{}", i + 1).as_bytes() => Ok(SupplierDecision::Activate),
                _ => Err(malformed()),
            })
            .collect::<Result<_>>()?;

        let roasteries = roastery_block
            .chunks(5)
            .enumerate()
            .map(|(i, slot)| {
                let prefix = format!("R{}-", i + 1);
                match &slot[..4] {
                    b"____" => Ok(RoasteryDecision::DoNotActivate),
                    s if s.starts_with(prefix.as_bytes()) && s[3] == b'l' => {
                        Ok(RoasteryDecision::Activate(Level::Low))
                    }
                    s if s.starts_with(prefix.as_bytes()) && s[3] == b'h' => {
                        Ok(RoasteryDecision::Activate(Level::High))
                    }
                    _ => Err(malformed()),
                }
            })
            .collect::<Result<_>>()?;

        Ok(Self {
            suppliers,
            roasteries,
        })
    }

    /// Activated nodes, e.g. `supplier1, supplier3, roastery1 (high)`
    pub fn summary(&self, topology: &Topology) -> String {
        let suppliers = self
            .suppliers
            .iter_enumerated()
            .filter(|(_, d)| d.is_active())
            .map(|(s, _)| topology.suppliers()[s].name().to_string());
        let roasteries = self
            .roasteries
            .iter_enumerated()
            .filter_map(|(r, d)| d.level().map(|level| (r, level)))
            .map(|(r, level)| format!("{} ({})", topology.roasteries()[r].name(), level.name()));
        let active = suppliers.chain(roasteries).join(", ");

        if active.is_empty() {
            "nothing activated".to_string()
        } else {
            active
        }
    }
}

/// Which suppliers and roasteries are disrupted. Nodes that are not mentioned are
/// not disrupted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisruptionOutcome {
    suppliers: TiVec<SupplierIndex, bool>,
    roasteries: TiVec<RoasteryIndex, bool>,
}

impl DisruptionOutcome {
    pub fn new(suppliers: TiVec<SupplierIndex, bool>, roasteries: TiVec<RoasteryIndex, bool>) -> Self {
        Self {
            suppliers,
            roasteries,
        }
    }

    /// Fails unless the outcome has one flag per supplier and roastery of `topology`
    pub fn validate(&self, topology: &Topology) -> Result<()> {
        check_shape("disruption outcome", self.suppliers.len(), self.roasteries.len(), topology)
    }

    /// No node is disrupted
    pub fn none(topology: &Topology) -> Self {
        Self {
            suppliers: topology.supplier_indices().map(|_| false).collect(),
            roasteries: topology.roastery_indices().map(|_| false).collect(),
        }
    }

    /// Parses a (possibly partial) mapping from node name to disruption flag.
    pub fn from_map<K: AsRef<str>>(topology: &Topology, map: &HashMap<K, bool>) -> Result<Self> {
        let mut outcome = Self::none(topology);
        for (node, &disrupted) in map {
            match topology.node(node.as_ref()) {
                Some(NodeRef::Supplier(s)) => outcome.suppliers[s] = disrupted,
                Some(NodeRef::Roastery(r)) => outcome.roasteries[r] = disrupted,
                Some(NodeRef::Customer(_)) => return Err(Error::NotDisruptable(node.as_ref().to_string())),
                None => return Err(Error::UnknownNode(node.as_ref().to_string())),
            }
        }
        Ok(outcome)
    }

    pub fn supplier(&self, s: SupplierIndex) -> bool {
        self.suppliers[s]
    }

    pub fn roastery(&self, r: RoasteryIndex) -> bool {
        self.roasteries[r]
    }

    pub fn suppliers(&self) -> &TiVec<SupplierIndex, bool> {
        &self.suppliers
    }

    pub fn roasteries(&self) -> &TiVec<RoasteryIndex, bool> {
        &self.roasteries
    }

    /// The disruption flags keyed by node name, suppliers first
    pub fn to_map(&self, topology: &Topology) -> Vec<(String, bool)> {
        let suppliers = self
            .suppliers
            .iter_enumerated()
            .map(|(s, &d)| (topology.suppliers()[s].name().to_string(), d));
        let roasteries = self
            .roasteries
            .iter_enumerated()
            .map(|(r, &d)| (topology.roasteries()[r].name().to_string(), d));
        suppliers.chain(roasteries).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn provided() -> HashMap<String, String> {
        labels(&[
            ("supplier1", "activate"),
            ("supplier2", "do not activate"),
            ("supplier3", "activate"),
            ("roastery1", "activate (high)"),
            ("roastery2", "do not activate"),
        ])
    }

    #[test]
    fn parses_labels_into_binary_view() {
        let topology = Topology::coffee();
        let decision = ActivationDecision::from_labels(&topology, &provided()).unwrap();

        assert_eq!(decision.supplier_binary().raw, vec![1.0, 0.0, 1.0]);
        let roasteries = decision.roastery_binary();
        assert_eq!(roasteries.raw, vec![PerLevel { low: 0.0, high: 1.0 }, PerLevel { low: 0.0, high: 0.0 }]);

        let back = ActivationDecision::from_binary(&decision.supplier_binary(), &roasteries);
        assert_eq!(back, decision);
    }

    #[test]
    fn labels_follow_topology_order() {
        let topology = Topology::coffee();
        let decision = ActivationDecision::from_labels(&topology, &provided()).unwrap();
        let names = decision.labels(&topology).into_iter().map(|(n, _)| n).collect::<Vec<_>>();
        assert_eq!(names, vec!["supplier1", "supplier2", "supplier3", "roastery1", "roastery2"]);
        assert_eq!(decision.summary(&topology), "supplier1, supplier3, roastery1 (high)");
    }

    #[test]
    fn rejects_unknown_node() {
        let topology = Topology::coffee();
        let mut map = provided();
        map.insert("supplier9".to_string(), "activate".to_string());
        let err = ActivationDecision::from_labels(&topology, &map).unwrap_err();
        assert!(matches!(err, Error::UnknownNode(ref n) if n == "supplier9"), "{}", err);
    }

    #[test]
    fn rejects_label_outside_enumeration() {
        let topology = Topology::coffee();
        let mut map = provided();
        map.insert("supplier2".to_string(), "activate (high)".to_string());
        let err = ActivationDecision::from_labels(&topology, &map).unwrap_err();
        assert!(matches!(err, Error::UnknownDecision { .. }), "{}", err);

        let mut map = provided();
        map.insert("roastery2".to_string(), "activate".to_string());
        assert!(ActivationDecision::from_labels(&topology, &map).is_err());
    }

    #[test]
    fn requires_every_node() {
        let topology = Topology::coffee();
        let mut map = provided();
        map.remove("roastery2");
        let err = ActivationDecision::from_labels(&topology, &map).unwrap_err();
        assert!(matches!(err, Error::MissingDecision(ref n) if n == "roastery2"), "{}", err);
    }

    #[test]
    fn keys_match_fixed_layout() {
        let topology = Topology::coffee();
        let decision = ActivationDecision::from_labels(&topology, &provided()).unwrap();
        assert_eq!(decision.key(), "S1____S3___R1-h_____");
        assert_eq!(ActivationDecision::inactive(&topology).key(), "____________________");

        let mixed = labels(&[
            ("supplier1", "do not activate"),
            ("supplier2", "activate"),
            ("supplier3", "activate"),
            ("roastery1", "activate (low)"),
            ("roastery2", "activate (high)"),
        ]);
        let decision = ActivationDecision::from_labels(&topology, &mixed).unwrap();
        assert_eq!(decision.key(), "___S2_S3___R1-l_R2-h");
    }

    #[test]
    fn every_decision_has_a_distinct_key() {
        let topology = Topology::coffee();
        let all = ActivationDecision::all(&topology);
        assert_eq!(all.len(), 72);
        assert_eq!(all[0], ActivationDecision::inactive(&topology));

        let keys = all.iter().map(|d| d.key()).collect::<std::collections::HashSet<_>>();
        assert_eq!(keys.len(), 72);

        for decision in &all {
            assert_eq!(decision.key().len(), 20);
            assert_eq!(&ActivationDecision::from_key(&topology, &decision.key()).unwrap(), decision);
        }
    }

    #[test]
    fn enumeration_varies_last_roastery_fastest() {
        let topology = Topology::coffee();
        let all = ActivationDecision::all(&topology);
        assert_eq!(all[1].key(), "________________R2-l");
        assert_eq!(all[1].roastery(RoasteryIndex::from(1)), RoasteryDecision::Activate(Level::Low));
        assert_eq!(all[3].roastery(RoasteryIndex::from(0)), RoasteryDecision::Activate(Level::Low));
        assert_eq!(all[9].supplier(SupplierIndex::from(2)), SupplierDecision::Activate);
    }

    #[test]
    fn malformed_keys_are_rejected() {
        let topology = Topology::coffee();
        for key in ["", "S1____S3___R1-h", "S2____S3___R1-h_____", "S1____S3___R1-x_____", "S1____S3__R1-h______"] {
            assert!(ActivationDecision::from_key(&topology, key).is_err(), "{}", key);
        }
    }

    #[test]
    fn shapes_are_checked_against_the_topology() {
        let topology = Topology::coffee();
        assert!(ActivationDecision::inactive(&topology).validate(&topology).is_ok());
        assert!(DisruptionOutcome::none(&topology).validate(&topology).is_ok());

        let short = ActivationDecision::new(
            vec![SupplierDecision::Activate; 2].into(),
            vec![RoasteryDecision::Activate(Level::High); 2].into(),
        );
        match short.validate(&topology) {
            Err(Error::ShapeMismatch {
                suppliers,
                expected_suppliers,
                ..
            }) => assert_eq!((suppliers, expected_suppliers), (2, 3)),
            other => panic!("expected a shape mismatch, got {:?}", other),
        }

        let long = DisruptionOutcome::new(vec![false; 3].into(), vec![true; 3].into());
        assert!(matches!(long.validate(&topology), Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn partial_disruption_outcome() {
        let topology = Topology::coffee();
        let map: HashMap<&str, bool> = [("supplier1", true)].into_iter().collect();
        let outcome = DisruptionOutcome::from_map(&topology, &map).unwrap();

        assert!(outcome.supplier(SupplierIndex::from(0)));
        assert!(!outcome.supplier(SupplierIndex::from(1)));
        assert!(outcome.roasteries().iter().all(|d| !d));

        let customer: HashMap<&str, bool> = [("customer1", true)].into_iter().collect();
        assert!(matches!(
            DisruptionOutcome::from_map(&topology, &customer),
            Err(Error::NotDisruptable(_))
        ));
    }
}
