use crate::decisions::ActivationDecision;
use crate::error::{Error, Result};
use crate::models::network::FlowValues;
use derive_more::{Deref, From, Into};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Index;
use std::path::Path;
use typed_index_collections::TiVec;

/// The type used for quantities of coffee (raw or roasted)
pub type Quantity = f64;
/// The type used for costs, prices and profits
pub type Cost = f64;

#[derive(Deref, Debug, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct SupplierIndex(usize);

#[derive(Deref, Debug, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct RoasteryIndex(usize);

#[derive(Deref, Debug, PartialEq, Eq, PartialOrd, Ord, From, Into, Clone, Copy, Hash)]
pub struct CustomerIndex(usize);

/// Activation level of a roastery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub const ALL: [Level; 2] = [Level::Low, Level::High];

    pub fn name(&self) -> &'static str {
        match self {
            Level::Low => "low",
            Level::High => "high",
        }
    }
}

/// The roasted product types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Product {
    Light,
    Dark,
}

impl Product {
    pub const ALL: [Product; 2] = [Product::Light, Product::Dark];
}

/// A value for each roastery level
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerLevel<T> {
    pub low: T,
    pub high: T,
}

impl<T> Index<Level> for PerLevel<T> {
    type Output = T;

    fn index(&self, level: Level) -> &T {
        match level {
            Level::Low => &self.low,
            Level::High => &self.high,
        }
    }
}

/// A value for each product type
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PerProduct<T> {
    pub light: T,
    pub dark: T,
}

impl<T> Index<Product> for PerProduct<T> {
    type Output = T;

    fn index(&self, product: Product) -> &T {
        match product {
            Product::Light => &self.light,
            Product::Dark => &self.dark,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Supplier {
    name: String,
    /// Raw coffee that can be shipped when active
    capacity: Quantity,
    /// Cost of activating the supplier
    fixed_cost: Cost,
}

impl Supplier {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn capacity(&self) -> Quantity {
        self.capacity
    }
    pub fn fixed_cost(&self) -> Cost {
        self.fixed_cost
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Roastery {
    name: String,
    /// Roasting capacity at each activation level
    capacity: PerLevel<Quantity>,
    /// Cost of activating the roastery at each level
    fixed_cost: PerLevel<Cost>,
    /// Per-unit roasting cost, shared by both levels
    variable_cost: PerProduct<Cost>,
}

impl Roastery {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn capacity(&self) -> &PerLevel<Quantity> {
        &self.capacity
    }
    pub fn fixed_cost(&self) -> &PerLevel<Cost> {
        &self.fixed_cost
    }
    pub fn variable_cost(&self) -> &PerProduct<Cost> {
        &self.variable_cost
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    name: String,
    demand: PerProduct<Quantity>,
}

impl Customer {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn demand(&self) -> &PerProduct<Quantity> {
        &self.demand
    }
}

/// A node of the network, as found by name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef {
    Supplier(SupplierIndex),
    Roastery(RoasteryIndex),
    Customer(CustomerIndex),
}

/// The fixed supply chain: suppliers ship raw coffee to roasteries, which roast it
/// and ship light and dark coffee to customers.
#[derive(Debug, Clone, PartialEq)]
pub struct Topology {
    suppliers: TiVec<SupplierIndex, Supplier>,
    roasteries: TiVec<RoasteryIndex, Roastery>,
    customers: TiVec<CustomerIndex, Customer>,
    /// Per-unit shipping cost from supplier to roastery
    supply_cost: TiVec<SupplierIndex, TiVec<RoasteryIndex, Cost>>,
    /// Per-unit shipping cost from roastery to customer
    delivery_cost: TiVec<RoasteryIndex, TiVec<CustomerIndex, Cost>>,
    /// Price per unit delivered, regardless of product
    selling_price: Cost,
    /// Income received regardless of any decision
    bonus_pool: Cost,
}

impl Topology {
    /// The coffee network used in the experiment
    pub fn coffee() -> Topology {
        let supplier = |name: &str, capacity, fixed_cost| Supplier {
            name: name.to_string(),
            capacity,
            fixed_cost,
        };
        let roastery = |name: &str, fixed: (Cost, Cost), light, dark| Roastery {
            name: name.to_string(),
            capacity: PerLevel {
                low: 125.0,
                high: 250.0,
            },
            fixed_cost: PerLevel {
                low: fixed.0,
                high: fixed.1,
            },
            variable_cost: PerProduct { light, dark },
        };
        let customer = |name: &str, light, dark| Customer {
            name: name.to_string(),
            demand: PerProduct { light, dark },
        };

        Topology {
            suppliers: vec![
                supplier("supplier1", 250.0, 250.0),
                supplier("supplier2", 100.0, 600.0),
                supplier("supplier3", 200.0, 750.0),
            ]
            .into(),
            roasteries: vec![
                roastery("roastery1", (400.0, 600.0), 3.0, 5.0),
                roastery("roastery2", (500.0, 700.0), 5.0, 6.0),
            ]
            .into(),
            customers: vec![
                customer("customer1", 20.0, 20.0),
                customer("customer2", 30.0, 20.0),
                customer("customer3", 40.0, 100.0),
            ]
            .into(),
            supply_cost: vec![
                vec![5.0, 4.0].into(),
                vec![6.0, 3.0].into(),
                vec![2.0, 7.0].into(),
            ]
            .into(),
            delivery_cost: vec![vec![5.0, 3.0, 6.0].into(), vec![4.0, 5.0, 2.0].into()].into(),
            selling_price: 30.0,
            bonus_pool: 2210.0,
        }
    }

    pub fn from_json(string: &str) -> Result<Topology> {
        let raw: RawTopology = serde_json::from_str(string)?;
        raw.try_into()
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Topology> {
        let file = std::fs::File::open(path)?;
        let raw: RawTopology = serde_json::from_reader(std::io::BufReader::new(file))?;
        raw.try_into()
    }

    pub fn suppliers(&self) -> &TiVec<SupplierIndex, Supplier> {
        &self.suppliers
    }

    pub fn roasteries(&self) -> &TiVec<RoasteryIndex, Roastery> {
        &self.roasteries
    }

    pub fn customers(&self) -> &TiVec<CustomerIndex, Customer> {
        &self.customers
    }

    pub fn supplier_indices(&self) -> impl Iterator<Item = SupplierIndex> + Clone {
        (0..self.suppliers.len()).map(SupplierIndex)
    }

    pub fn roastery_indices(&self) -> impl Iterator<Item = RoasteryIndex> + Clone {
        (0..self.roasteries.len()).map(RoasteryIndex)
    }

    pub fn customer_indices(&self) -> impl Iterator<Item = CustomerIndex> + Clone {
        (0..self.customers.len()).map(CustomerIndex)
    }

    /// Per-unit shipping cost on the arc supplier -> roastery
    pub fn supply_cost(&self, s: SupplierIndex, r: RoasteryIndex) -> Cost {
        self.supply_cost[s][r]
    }

    /// Per-unit shipping cost on the arc roastery -> customer
    pub fn delivery_cost(&self, r: RoasteryIndex, c: CustomerIndex) -> Cost {
        self.delivery_cost[r][c]
    }

    pub fn selling_price(&self) -> Cost {
        self.selling_price
    }

    pub fn bonus_pool(&self) -> Cost {
        self.bonus_pool
    }

    /// Margin of delivering one unit of `product` roasted at `r` to `c`,
    /// before the cost of the raw coffee.
    pub fn delivery_margin(&self, r: RoasteryIndex, c: CustomerIndex, product: Product) -> Cost {
        self.selling_price
            - self.delivery_cost(r, c)
            - self.roasteries[r].variable_cost[product]
    }

    /// Fixed cost of every supplier and roastery level switched on by `decision`
    pub fn fixed_cost(&self, decision: &ActivationDecision) -> Cost {
        let suppliers: Cost = self
            .supplier_indices()
            .filter(|&s| decision.supplier(s).is_active())
            .map(|s| self.suppliers[s].fixed_cost)
            .sum();
        let roasteries: Cost = self
            .roastery_indices()
            .filter_map(|r| decision.roastery(r).level().map(|l| self.roasteries[r].fixed_cost[l]))
            .sum();
        suppliers + roasteries
    }

    /// Profit of one scenario given the realized flows: the bonus pool plus the flow
    /// contribution, minus the fixed cost of the activated nodes.
    pub fn scenario_profit(&self, decision: &ActivationDecision, flows: &FlowValues) -> Cost {
        self.bonus_pool + flows.contribution(self) - self.fixed_cost(decision)
    }

    /// Looks up a node by name
    pub fn node(&self, name: &str) -> Option<NodeRef> {
        let supplier = self.suppliers.iter().position(|s| s.name == name);
        let roastery = self.roasteries.iter().position(|r| r.name == name);
        let customer = self.customers.iter().position(|c| c.name == name);

        match (supplier, roastery, customer) {
            (Some(s), _, _) => Some(NodeRef::Supplier(SupplierIndex(s))),
            (_, Some(r), _) => Some(NodeRef::Roastery(RoasteryIndex(r))),
            (_, _, Some(c)) => Some(NodeRef::Customer(CustomerIndex(c))),
            _ => None,
        }
    }
}

/// Decision keys number suppliers and roasteries with a single digit
pub const MAX_KEYED_NODES: usize = 9;

/// The dictionary-shaped description of a network, as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawTopology {
    pub supplier_capacity: BTreeMap<String, Quantity>,
    pub fixed_supplier_cost: BTreeMap<String, Cost>,
    pub roastery_capacity: BTreeMap<String, PerLevel<Quantity>>,
    pub fixed_roasting_cost: BTreeMap<String, PerLevel<Cost>>,
    pub variable_roasting_cost: PerProduct<BTreeMap<String, Cost>>,
    pub shipping_cost_supplier_to_roastery: BTreeMap<String, BTreeMap<String, Cost>>,
    pub shipping_cost_roastery_to_customer: BTreeMap<String, BTreeMap<String, Cost>>,
    pub coffee_demand: PerProduct<BTreeMap<String, Quantity>>,
    pub selling_price: Cost,
    pub fixed_income_bonuspool: Cost,
}

fn lookup<T: Copy>(table: &BTreeMap<String, T>, key: &str, what: &str) -> Result<T> {
    table
        .get(key)
        .copied()
        .ok_or_else(|| Error::MalformedTopology(format!("missing {} for `{}`", what, key)))
}

fn non_negative(value: f64, what: &str, key: &str) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(Error::MalformedTopology(format!(
            "{} of `{}` must be a non-negative number, got {}",
            what, key, value
        )))
    }
}

impl TryFrom<RawTopology> for Topology {
    type Error = Error;

    fn try_from(raw: RawTopology) -> Result<Topology> {
        let suppliers = raw
            .supplier_capacity
            .iter()
            .map(|(name, &capacity)| {
                Ok(Supplier {
                    name: name.clone(),
                    capacity: non_negative(capacity, "capacity", name)?,
                    fixed_cost: lookup(&raw.fixed_supplier_cost, name, "fixed supplier cost")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let roasteries = raw
            .roastery_capacity
            .iter()
            .map(|(name, capacity)| {
                non_negative(capacity.low, "low capacity", name)?;
                non_negative(capacity.high, "high capacity", name)?;
                if capacity.low > capacity.high {
                    return Err(Error::MalformedTopology(format!(
                        "low capacity of `{}` exceeds its high capacity",
                        name
                    )));
                }
                let fixed_cost = raw.fixed_roasting_cost.get(name).copied().ok_or_else(|| {
                    Error::MalformedTopology(format!("missing fixed roasting cost for `{}`", name))
                })?;
                Ok(Roastery {
                    name: name.clone(),
                    capacity: *capacity,
                    fixed_cost,
                    variable_cost: PerProduct {
                        light: lookup(&raw.variable_roasting_cost.light, name, "light roasting cost")?,
                        dark: lookup(&raw.variable_roasting_cost.dark, name, "dark roasting cost")?,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let customer_names = raw
            .coffee_demand
            .light
            .keys()
            .chain(raw.coffee_demand.dark.keys())
            .collect::<std::collections::BTreeSet<_>>();
        let customers = customer_names
            .into_iter()
            .map(|name| {
                let light = lookup(&raw.coffee_demand.light, name, "light demand")?;
                let dark = lookup(&raw.coffee_demand.dark, name, "dark demand")?;
                Ok(Customer {
                    name: name.clone(),
                    demand: PerProduct {
                        light: non_negative(light, "light demand", name)?,
                        dark: non_negative(dark, "dark demand", name)?,
                    },
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let arcs = |table: &BTreeMap<String, BTreeMap<String, Cost>>, from: &str, to: &[&str]| {
            let row = table.get(from).ok_or_else(|| {
                Error::MalformedTopology(format!("missing shipping costs from `{}`", from))
            })?;
            to.iter()
                .map(|to| {
                    row.get(*to).copied().ok_or_else(|| {
                        Error::MalformedTopology(format!("missing arc `{}` -> `{}`", from, to))
                    })
                })
                .collect::<Result<Vec<Cost>>>()
        };

        let roastery_names = roasteries.iter().map(|r| r.name.as_str()).collect::<Vec<_>>();
        let customer_names = customers.iter().map(|c| c.name.as_str()).collect::<Vec<_>>();

        let supply_cost = suppliers
            .iter()
            .map(|s| Ok(arcs(&raw.shipping_cost_supplier_to_roastery, &s.name, &roastery_names)?.into()))
            .collect::<Result<Vec<TiVec<RoasteryIndex, Cost>>>>()?;
        let delivery_cost = roasteries
            .iter()
            .map(|r| Ok(arcs(&raw.shipping_cost_roastery_to_customer, &r.name, &customer_names)?.into()))
            .collect::<Result<Vec<TiVec<CustomerIndex, Cost>>>>()?;

        if suppliers.is_empty() || roasteries.is_empty() || customers.is_empty() {
            return Err(Error::MalformedTopology(
                "the network needs at least one supplier, roastery and customer".to_string(),
            ));
        }
        if suppliers.len() > MAX_KEYED_NODES || roasteries.len() > MAX_KEYED_NODES {
            return Err(Error::MalformedTopology(format!(
                "at most {} suppliers and {} roasteries fit a decision key",
                MAX_KEYED_NODES, MAX_KEYED_NODES
            )));
        }

        let mut names = std::collections::HashSet::new();
        let all_names = suppliers
            .iter()
            .map(|s| s.name.as_str())
            .chain(roastery_names.iter().copied())
            .chain(customer_names.iter().copied());
        for name in all_names {
            if !names.insert(name) {
                return Err(Error::MalformedTopology(format!("duplicate node name `{}`", name)));
            }
        }

        Ok(Topology {
            suppliers: suppliers.into(),
            roasteries: roasteries.into(),
            customers: customers.into(),
            supply_cost: supply_cost.into(),
            delivery_cost: delivery_cost.into(),
            selling_price: raw.selling_price,
            bonus_pool: raw.fixed_income_bonuspool,
        })
    }
}

impl From<&Topology> for RawTopology {
    fn from(topology: &Topology) -> Self {
        let suppliers = move || topology.supplier_indices().map(move |s| (s, &topology.suppliers[s]));
        let roasteries = move || topology.roastery_indices().map(move |r| (r, &topology.roasteries[r]));
        let customers = move || topology.customers.iter();

        RawTopology {
            supplier_capacity: suppliers().map(|(_, s)| (s.name.clone(), s.capacity)).collect(),
            fixed_supplier_cost: suppliers().map(|(_, s)| (s.name.clone(), s.fixed_cost)).collect(),
            roastery_capacity: roasteries().map(|(_, r)| (r.name.clone(), r.capacity)).collect(),
            fixed_roasting_cost: roasteries().map(|(_, r)| (r.name.clone(), r.fixed_cost)).collect(),
            variable_roasting_cost: PerProduct {
                light: roasteries().map(|(_, r)| (r.name.clone(), r.variable_cost.light)).collect(),
                dark: roasteries().map(|(_, r)| (r.name.clone(), r.variable_cost.dark)).collect(),
            },
            shipping_cost_supplier_to_roastery: suppliers()
                .map(|(s, supplier)| {
                    let row = roasteries()
                        .map(|(r, roastery)| (roastery.name.clone(), topology.supply_cost(s, r)))
                        .collect();
                    (supplier.name.clone(), row)
                })
                .collect(),
            shipping_cost_roastery_to_customer: roasteries()
                .map(|(r, roastery)| {
                    let row = topology
                        .customer_indices()
                        .map(|c| (topology.customers[c].name.clone(), topology.delivery_cost(r, c)))
                        .collect();
                    (roastery.name.clone(), row)
                })
                .collect(),
            coffee_demand: PerProduct {
                light: customers().map(|c| (c.name.clone(), c.demand.light)).collect(),
                dark: customers().map(|c| (c.name.clone(), c.demand.dark)).collect(),
            },
            selling_price: topology.selling_price,
            fixed_income_bonuspool: topology.bonus_pool,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coffee_network_has_sorted_node_sets() {
        let topology = Topology::coffee();
        let names = |v: Vec<&str>| v.into_iter().map(String::from).collect::<Vec<_>>();

        let suppliers = topology.suppliers().iter().map(|s| s.name().to_string()).collect::<Vec<_>>();
        let roasteries = topology.roasteries().iter().map(|r| r.name().to_string()).collect::<Vec<_>>();
        let customers = topology.customers().iter().map(|c| c.name().to_string()).collect::<Vec<_>>();

        assert_eq!(suppliers, names(vec!["supplier1", "supplier2", "supplier3"]));
        assert_eq!(roasteries, names(vec!["roastery1", "roastery2"]));
        assert_eq!(customers, names(vec!["customer1", "customer2", "customer3"]));
    }

    #[test]
    fn coffee_network_tables() {
        let t = Topology::coffee();
        let s3 = SupplierIndex(2);
        let r1 = RoasteryIndex(0);
        let r2 = RoasteryIndex(1);
        let c3 = CustomerIndex(2);

        assert_eq!(t.suppliers()[s3].capacity(), 200.0);
        assert_eq!(t.suppliers()[s3].fixed_cost(), 750.0);
        assert_eq!(t.roasteries()[r2].fixed_cost()[Level::High], 700.0);
        assert_eq!(t.roasteries()[r1].variable_cost()[Product::Dark], 5.0);
        assert_eq!(t.supply_cost(s3, r1), 2.0);
        assert_eq!(t.delivery_cost(r2, c3), 2.0);
        assert_eq!(t.customers()[c3].demand()[Product::Dark], 100.0);
        assert_eq!(t.delivery_margin(r1, c3, Product::Light), 21.0);
        assert_eq!(t.selling_price(), 30.0);
        assert_eq!(t.bonus_pool(), 2210.0);
    }

    /// The evaluation-on-demand tables stated one base roasting capacity per roastery,
    /// scaled by 1 when running low and by 2 when running high, while the stochastic
    /// tables stated the per-level capacities directly. Both must describe one network.
    #[test]
    fn historical_tables_describe_the_same_network() {
        let base_capacity = [("roastery1", 125.0), ("roastery2", 125.0)];
        let historical = r#"{
            "supplier_capacity": {"supplier1": 250, "supplier2": 100, "supplier3": 200},
            "fixed_supplier_cost": {"supplier1": 250, "supplier2": 600, "supplier3": 750},
            "roastery_capacity": {
                "roastery1": {"low": 125, "high": 250},
                "roastery2": {"low": 125, "high": 250}
            },
            "fixed_roasting_cost": {
                "roastery1": {"low": 400, "high": 600},
                "roastery2": {"low": 500, "high": 700}
            },
            "variable_roasting_cost": {
                "light": {"roastery1": 3, "roastery2": 5},
                "dark": {"roastery1": 5, "roastery2": 6}
            },
            "shipping_cost_supplier_to_roastery": {
                "supplier1": {"roastery1": 5, "roastery2": 4},
                "supplier2": {"roastery1": 6, "roastery2": 3},
                "supplier3": {"roastery1": 2, "roastery2": 7}
            },
            "shipping_cost_roastery_to_customer": {
                "roastery1": {"customer1": 5, "customer2": 3, "customer3": 6},
                "roastery2": {"customer1": 4, "customer2": 5, "customer3": 2}
            },
            "coffee_demand": {
                "light": {"customer1": 20, "customer2": 30, "customer3": 40},
                "dark": {"customer1": 20, "customer2": 20, "customer3": 100}
            },
            "selling_price": 30,
            "fixed_income_bonuspool": 2210
        }"#;

        let topology = Topology::coffee();
        assert_eq!(Topology::from_json(historical).unwrap(), topology);

        for (name, base) in base_capacity {
            let r = match topology.node(name) {
                Some(NodeRef::Roastery(r)) => r,
                other => panic!("{} resolved to {:?}", name, other),
            };
            let capacity = topology.roasteries()[r].capacity();
            assert_eq!(capacity.low, 1.0 * base);
            assert_eq!(capacity.high, 2.0 * base);
        }
    }

    #[test]
    fn raw_tables_round_trip_through_json() {
        let topology = Topology::coffee();
        let json = serde_json::to_string(&RawTopology::from(&topology)).unwrap();
        assert_eq!(Topology::from_json(&json).unwrap(), topology);
    }

    #[test]
    fn missing_arc_is_rejected() {
        let mut raw = RawTopology::from(&Topology::coffee());
        raw.shipping_cost_roastery_to_customer
            .get_mut("roastery2")
            .unwrap()
            .remove("customer1");

        let err = Topology::try_from(raw).unwrap_err();
        assert!(matches!(err, Error::MalformedTopology(_)), "{}", err);
    }

    #[test]
    fn negative_demand_is_rejected() {
        let mut raw = RawTopology::from(&Topology::coffee());
        raw.coffee_demand.dark.insert("customer2".to_string(), -1.0);
        assert!(Topology::try_from(raw).is_err());
    }

    #[test]
    fn ten_suppliers_are_rejected() {
        let mut raw = RawTopology::from(&Topology::coffee());
        for i in 4..=10 {
            let name = format!("supplier{}", i);
            raw.supplier_capacity.insert(name.clone(), 10.0);
            raw.fixed_supplier_cost.insert(name.clone(), 10.0);
            let arcs = raw.shipping_cost_supplier_to_roastery["supplier1"].clone();
            raw.shipping_cost_supplier_to_roastery.insert(name, arcs);
        }

        let mut nine = raw.clone();
        nine.supplier_capacity.remove("supplier10");
        assert_eq!(Topology::try_from(nine).unwrap().suppliers().len(), 9);

        let err = Topology::try_from(raw).unwrap_err();
        assert!(matches!(err, Error::MalformedTopology(_)), "{}", err);
    }

    #[test]
    fn node_lookup() {
        let t = Topology::coffee();
        assert_eq!(t.node("supplier2"), Some(NodeRef::Supplier(SupplierIndex(1))));
        assert_eq!(t.node("roastery2"), Some(NodeRef::Roastery(RoasteryIndex(1))));
        assert_eq!(t.node("customer1"), Some(NodeRef::Customer(CustomerIndex(0))));
        assert_eq!(t.node("supplier4"), None);
    }
}
