//! Variable blocks and constraints shared by the deterministic and the stochastic model.

use crate::decisions::{ActivationDecision, RoasteryDecision};
use crate::models::utils::{AddVars, ConvertVars};
use crate::topology::{CustomerIndex, Level, PerLevel, Product, RoasteryIndex, SupplierIndex, Topology};
use grb::prelude::*;
use itertools::iproduct;
use log::trace;
use typed_index_collections::TiVec;

/// First-stage variables: which suppliers and roastery levels are active.
pub struct ActivationVariables {
    /// 1 if the supplier is active
    pub supplier: Vec<Var>,
    /// 1 if the roastery runs at the level
    pub roastery: Vec<PerLevel<Var>>,
}

impl ActivationVariables {
    pub fn new(model: &mut Model, topology: &Topology) -> grb::Result<Self> {
        let supplier = topology.suppliers().len().vars_with(|s| {
            let name = topology.suppliers()[SupplierIndex::from(s)].name();
            model.add_var(
                &format!("supplier_activation_{}", name),
                VarType::Binary,
                0.0,
                0.0,
                1.0,
                std::iter::empty(),
            )
        })?;

        let roastery = (topology.roasteries().len(), Level::ALL.len())
            .vars_with(|(r, l)| {
                let name = topology.roasteries()[RoasteryIndex::from(r)].name();
                model.add_var(
                    &format!("roastery_activation_{}_{}", name, Level::ALL[l].name()),
                    VarType::Binary,
                    0.0,
                    0.0,
                    1.0,
                    std::iter::empty(),
                )
            })?
            .into_iter()
            .map(|levels| PerLevel {
                low: levels[0],
                high: levels[1],
            })
            .collect();

        Ok(Self { supplier, roastery })
    }

    /// A roastery runs at most one level
    pub fn add_consistency_constraints(&self, model: &mut Model, topology: &Topology) -> grb::Result<()> {
        for r in topology.roastery_indices() {
            let vars = &self.roastery[*r];
            let name = topology.roasteries()[r].name();
            model.add_constr(
                &format!("roastery_activation_consistency_{}", name),
                c!(vars.low + vars.high <= 1),
            )?;
        }
        Ok(())
    }

    /// Roasting capacity made available by the active level of `r`
    pub fn capacity(&self, topology: &Topology, r: RoasteryIndex) -> Expr {
        let capacity = topology.roasteries()[r].capacity();
        let vars = &self.roastery[*r];
        capacity.low * vars.low + capacity.high * vars.high
    }

    /// Total fixed cost of the activated suppliers and roastery levels
    pub fn fixed_costs(&self, topology: &Topology) -> Expr {
        let suppliers = topology
            .supplier_indices()
            .map(|s| topology.suppliers()[s].fixed_cost() * self.supplier[*s])
            .grb_sum();
        let roasteries = iproduct!(topology.roastery_indices(), Level::ALL)
            .map(|(r, l)| topology.roasteries()[r].fixed_cost()[l] * self.roastery[*r][l])
            .grb_sum();
        suppliers + roasteries
    }

    /// Adds named equality constraints forcing the variables to `decision`. A roastery
    /// that is switched on only has its chosen level forced.
    pub fn enforce(&self, model: &mut Model, topology: &Topology, decision: &ActivationDecision) -> grb::Result<()> {
        for s in topology.supplier_indices() {
            let name = format!("enforce_{}_choice", topology.suppliers()[s].name());
            let value = if decision.supplier(s).is_active() { 1.0 } else { 0.0 };
            model.add_constr(&name, c!(self.supplier[*s] == value))?;
        }

        for r in topology.roastery_indices() {
            let name = format!("enforce_{}_choice", topology.roasteries()[r].name());
            let vars = &self.roastery[*r];
            match decision.roastery(r) {
                RoasteryDecision::DoNotActivate => model.add_constr(&name, c!(vars.low + vars.high == 0))?,
                RoasteryDecision::Activate(level) => model.add_constr(&name, c!(vars[level] == 1))?,
            };
        }

        Ok(())
    }

    /// Fixes every activation variable to `decision` through its bounds
    pub fn pin(&self, model: &mut Model, decision: &ActivationDecision) -> grb::Result<()> {
        for (var, value) in self.supplier.iter().zip(decision.supplier_binary()) {
            model.set_obj_attr(attr::LB, var, value)?;
            model.set_obj_attr(attr::UB, var, value)?;
        }

        for (vars, values) in self.roastery.iter().zip(decision.roastery_binary()) {
            for level in Level::ALL {
                model.set_obj_attr(attr::LB, &vars[level], values[level])?;
                model.set_obj_attr(attr::UB, &vars[level], values[level])?;
            }
        }

        model.update()
    }

    /// Restores the binary bounds of every activation variable
    pub fn release(&self, model: &mut Model) -> grb::Result<()> {
        let vars = self
            .supplier
            .iter()
            .chain(self.roastery.iter().flat_map(|r| [&r.low, &r.high]));
        for var in vars {
            model.set_obj_attr(attr::LB, var, 0.0)?;
            model.set_obj_attr(attr::UB, var, 1.0)?;
        }

        model.update()
    }

    /// The decision described by the solved variables
    pub fn values(&self, model: &Model) -> grb::Result<ActivationDecision> {
        let suppliers: TiVec<SupplierIndex, f64> = self.supplier.convert(model)?.into();
        let roasteries: TiVec<RoasteryIndex, PerLevel<f64>> = self.roastery.convert(model)?.into();
        Ok(ActivationDecision::from_binary(&suppliers, &roasteries))
    }
}

/// Second-stage variables: the coffee moved through the network in one scenario.
pub struct FlowVariables {
    /// Raw coffee shipped from supplier to roastery, indexed [s][r]
    pub raw: Vec<Vec<Var>>,
    /// Light coffee delivered from roastery to customer, indexed [r][c]
    pub light: Vec<Vec<Var>>,
    /// Dark coffee delivered from roastery to customer, indexed [r][c]
    pub dark: Vec<Vec<Var>>,
}

impl FlowVariables {
    /// Integer flow variables on every arc. `tag` tells the scenarios of a stochastic
    /// model apart and is empty otherwise.
    pub fn new(model: &mut Model, topology: &Topology, tag: &str) -> grb::Result<Self> {
        let suppliers = topology.suppliers().len();
        let roasteries = topology.roasteries().len();
        let customers = topology.customers().len();

        Ok(Self {
            raw: (suppliers, roasteries).int(model, &format!("coffee_flow_raw{}", tag))?,
            light: (roasteries, customers).int(model, &format!("coffee_flow_light{}", tag))?,
            dark: (roasteries, customers).int(model, &format!("coffee_flow_dark{}", tag))?,
        })
    }

    fn product(&self, product: Product) -> &Vec<Vec<Var>> {
        match product {
            Product::Light => &self.light,
            Product::Dark => &self.dark,
        }
    }

    /// Raw coffee leaving supplier `s`
    pub fn shipped(&self, topology: &Topology, s: SupplierIndex) -> Expr {
        topology.roastery_indices().map(|r| &self.raw[*s][*r]).grb_sum()
    }

    /// Raw coffee arriving at roastery `r`
    pub fn received(&self, topology: &Topology, r: RoasteryIndex) -> Expr {
        topology.supplier_indices().map(|s| &self.raw[*s][*r]).grb_sum()
    }

    /// Roasted coffee of both products leaving roastery `r`
    pub fn roasted(&self, topology: &Topology, r: RoasteryIndex) -> Expr {
        iproduct!(topology.customer_indices(), Product::ALL)
            .map(|(c, p)| &self.product(p)[*r][*c])
            .grb_sum()
    }

    /// Coffee of `product` delivered to customer `c`
    pub fn delivered(&self, topology: &Topology, c: CustomerIndex, product: Product) -> Expr {
        topology
            .roastery_indices()
            .map(|r| &self.product(product)[*r][*c])
            .grb_sum()
    }

    /// Revenue minus shipping and roasting costs
    pub fn contribution(&self, topology: &Topology) -> Expr {
        let deliveries = iproduct!(topology.roastery_indices(), topology.customer_indices(), Product::ALL)
            .map(|(r, c, p)| topology.delivery_margin(r, c, p) * self.product(p)[*r][*c])
            .grb_sum();
        let supply = iproduct!(topology.supplier_indices(), topology.roastery_indices())
            .map(|(s, r)| topology.supply_cost(s, r) * self.raw[*s][*r])
            .grb_sum();
        deliveries - supply
    }

    /// Capacity, demand and flow conservation. Constraint names carry `tag`.
    pub fn add_structural_constraints(
        &self,
        model: &mut Model,
        topology: &Topology,
        activation: &ActivationVariables,
        tag: &str,
    ) -> grb::Result<()> {
        for r in topology.roastery_indices() {
            let name = topology.roasteries()[r].name();
            model.add_constr(
                &format!("max_capacity_{}{}", name, tag),
                c!(self.roasted(topology, r) <= activation.capacity(topology, r)),
            )?;
        }

        for c in topology.customer_indices() {
            let customer = &topology.customers()[c];
            let demand = customer.demand();
            model.add_constr(
                &format!("demand_light_{}{}", customer.name(), tag),
                c!(self.delivered(topology, c, Product::Light) <= demand.light),
            )?;
            model.add_constr(
                &format!("demand_dark_{}{}", customer.name(), tag),
                c!(self.delivered(topology, c, Product::Dark) <= demand.dark),
            )?;
        }

        for r in topology.roastery_indices() {
            let name = topology.roasteries()[r].name();
            model.add_constr(
                &format!("conservation_of_flow_{}{}", name, tag),
                c!(self.received(topology, r) == self.roasted(topology, r)),
            )?;
        }

        for s in topology.supplier_indices() {
            let supplier = &topology.suppliers()[s];
            model.add_constr(
                &format!("supplier_activation_{}{}", supplier.name(), tag),
                c!(self.shipped(topology, s) <= supplier.capacity() * activation.supplier[*s]),
            )?;
        }

        Ok(())
    }

    /// Nothing leaves a disrupted supplier
    pub fn add_supplier_disruption(
        &self,
        model: &mut Model,
        topology: &Topology,
        s: SupplierIndex,
        tag: &str,
    ) -> grb::Result<()> {
        let name = topology.suppliers()[s].name();
        trace!("Zero flow through {}{}", name, tag);
        model.add_constr(
            &format!("zero_flow_{}{}", name, tag),
            c!(self.shipped(topology, s) == 0),
        )?;
        Ok(())
    }

    /// Nothing is roasted at a disrupted roastery
    pub fn add_roastery_disruption(
        &self,
        model: &mut Model,
        topology: &Topology,
        r: RoasteryIndex,
        tag: &str,
    ) -> grb::Result<()> {
        let name = topology.roasteries()[r].name();
        trace!("Zero flow through {}{}", name, tag);
        model.add_constr(
            &format!("zero_flow_{}{}", name, tag),
            c!(self.roasted(topology, r) == 0),
        )?;
        Ok(())
    }

    pub fn values(&self, model: &Model) -> grb::Result<FlowValues> {
        Ok(FlowValues {
            raw: self.raw.convert(model)?,
            light: self.light.convert(model)?,
            dark: self.dark.convert(model)?,
        })
    }
}

/// Solved flows of one scenario
#[derive(Debug, Clone, PartialEq)]
pub struct FlowValues {
    /// Indexed [s][r]
    pub raw: Vec<Vec<f64>>,
    /// Indexed [r][c]
    pub light: Vec<Vec<f64>>,
    /// Indexed [r][c]
    pub dark: Vec<Vec<f64>>,
}

impl FlowValues {
    /// No coffee moves anywhere
    pub fn empty(topology: &Topology) -> Self {
        let (s, r, c) = (
            topology.suppliers().len(),
            topology.roasteries().len(),
            topology.customers().len(),
        );
        Self {
            raw: vec![vec![0.0; r]; s],
            light: vec![vec![0.0; c]; r],
            dark: vec![vec![0.0; c]; r],
        }
    }

    fn product(&self, product: Product) -> &Vec<Vec<f64>> {
        match product {
            Product::Light => &self.light,
            Product::Dark => &self.dark,
        }
    }

    pub fn shipped(&self, s: SupplierIndex) -> f64 {
        self.raw[*s].iter().sum()
    }

    pub fn received(&self, r: RoasteryIndex) -> f64 {
        self.raw.iter().map(|row| row[*r]).sum()
    }

    pub fn roasted(&self, r: RoasteryIndex) -> f64 {
        self.light[*r].iter().chain(self.dark[*r].iter()).sum()
    }

    /// Revenue minus shipping and roasting costs
    pub fn contribution(&self, topology: &Topology) -> f64 {
        let deliveries: f64 = iproduct!(topology.roastery_indices(), topology.customer_indices(), Product::ALL)
            .map(|(r, c, p)| topology.delivery_margin(r, c, p) * self.product(p)[*r][*c])
            .sum();
        let supply: f64 = iproduct!(topology.supplier_indices(), topology.roastery_indices())
            .map(|(s, r)| topology.supply_cost(s, r) * self.raw[*s][*r])
            .sum();
        deliveries - supply
    }

    /// Whether every roastery ships out exactly what it receives
    pub fn is_conserved(&self, topology: &Topology) -> bool {
        topology
            .roastery_indices()
            .all(|r| (self.received(r) - self.roasted(r)).abs() < 1e-6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decisions::SupplierDecision;

    /// S1 and S3 supply roastery1 at high level, which serves all demand
    fn full_service(topology: &Topology) -> FlowValues {
        let mut flows = FlowValues::empty(topology);
        flows.raw[0][0] = 30.0;
        flows.raw[2][0] = 200.0;
        flows.light[0] = vec![20.0, 30.0, 40.0];
        flows.dark[0] = vec![20.0, 20.0, 100.0];
        flows
    }

    fn provided_decision() -> ActivationDecision {
        ActivationDecision::new(
            vec![
                SupplierDecision::Activate,
                SupplierDecision::DoNotActivate,
                SupplierDecision::Activate,
            ]
            .into(),
            vec![RoasteryDecision::Activate(Level::High), RoasteryDecision::DoNotActivate].into(),
        )
    }

    #[test]
    fn full_service_profit() {
        let topology = Topology::coffee();
        let flows = full_service(&topology);
        assert!(flows.is_conserved(&topology));
        assert_eq!(flows.contribution(&topology), 4190.0);
        assert_eq!(topology.scenario_profit(&provided_decision(), &flows), 4800.0);
    }

    #[test]
    fn lost_supplier_profit() {
        let topology = Topology::coffee();
        let mut flows = full_service(&topology);
        flows.raw[0][0] = 0.0;
        flows.dark[0][2] = 70.0;
        assert!(flows.is_conserved(&topology));
        assert_eq!(topology.scenario_profit(&provided_decision(), &flows), 4380.0);
    }

    #[test]
    fn idle_network_earns_the_bonus_pool() {
        let topology = Topology::coffee();
        let flows = FlowValues::empty(&topology);
        let inactive = ActivationDecision::inactive(&topology);
        assert_eq!(topology.scenario_profit(&inactive, &flows), 2210.0);
        // paying for activation without moving coffee
        assert_eq!(topology.scenario_profit(&provided_decision(), &flows), 610.0);
    }

    #[test]
    fn unbalanced_roastery_is_detected() {
        let topology = Topology::coffee();
        let mut flows = full_service(&topology);
        flows.raw[2][0] = 150.0;
        assert!(!flows.is_conserved(&topology));
        assert_eq!(flows.shipped(SupplierIndex::from(2)), 150.0);
        assert_eq!(flows.roasted(RoasteryIndex::from(0)), 230.0);
    }
}
