use crate::topology::PerLevel;
use grb::prelude::*;
use std::fmt;
use std::ops::Range;

pub trait AddVars {
    type Out;

    /// Create a variable with a closure
    fn vars_with<F: FnMut(Self) -> grb::Result<Var>>(&self, func: F) -> grb::Result<Self::Out>
    where
        Self: Sized;

    /// Create a variable for any type
    fn vars(
        &self,
        model: &mut Model,
        base_name: &str,
        vtype: VarType,
        bounds: &Range<f64>,
    ) -> grb::Result<Self::Out>;

    /// A non-negative integer variable
    fn int(&self, model: &mut Model, base_name: &str) -> grb::Result<Self::Out> {
        self.vars(model, base_name, VarType::Integer, &(0.0..f64::INFINITY))
    }
}

impl AddVars for usize {
    type Out = Vec<Var>;

    fn vars_with<F: FnMut(Self) -> grb::Result<Var>>(&self, mut func: F) -> grb::Result<Self::Out>
    where
        Self: Sized,
    {
        let mut vec = Vec::with_capacity(*self);
        for i in 0..*self {
            vec.push(func(i)?);
        }

        Ok(vec)
    }

    fn vars(
        &self,
        model: &mut Model,
        base_name: &str,
        vtype: VarType,
        bounds: &Range<f64>,
    ) -> grb::Result<Self::Out> {
        let mut vec = Vec::with_capacity(*self);
        for i in 0..*self {
            vec.push(model.add_var(
                &format!("{}_{}", base_name, i),
                vtype,
                0.0,
                bounds.start,
                bounds.end,
                std::iter::empty(),
            )?);
        }

        Ok(vec)
    }
}

impl AddVars for (usize, usize) {
    type Out = Vec<<usize as AddVars>::Out>;
    fn vars(
        &self,
        model: &mut Model,
        base_name: &str,
        vtype: VarType,
        bounds: &Range<f64>,
    ) -> grb::Result<Self::Out> {
        let mut out = Vec::with_capacity(self.0);
        for i in 0..self.0 {
            out.push(
                self.1
                    .vars(model, &format!("{}_{}", base_name, i), vtype, bounds)?,
            )
        }

        Ok(out)
    }

    fn vars_with<F: FnMut(Self) -> grb::Result<Var>>(&self, mut func: F) -> grb::Result<Self::Out>
    where
        Self: Sized,
    {
        let mut out = Vec::with_capacity(self.0);
        for i in 0..self.0 {
            out.push(self.1.vars_with(|j| func((i, j)))?);
        }

        Ok(out)
    }
}

/// Trait that converts gurobi variables to f64
pub trait ConvertVars {
    type Out;
    fn convert(&self, model: &Model) -> grb::Result<Self::Out>;
}

impl<T: ConvertVars> ConvertVars for Vec<T> {
    type Out = Vec<T::Out>;

    fn convert(&self, model: &Model) -> grb::Result<Self::Out> {
        let mut out = Vec::with_capacity(self.len());
        for e in self {
            out.push(e.convert(model)?);
        }
        Ok(out)
    }
}

impl<T: ConvertVars> ConvertVars for PerLevel<T> {
    type Out = PerLevel<T::Out>;

    fn convert(&self, model: &Model) -> grb::Result<Self::Out> {
        Ok(PerLevel {
            low: self.low.convert(model)?,
            high: self.high.convert(model)?,
        })
    }
}

impl ConvertVars for Var {
    type Out = f64;

    fn convert(&self, model: &Model) -> grb::Result<Self::Out> {
        model.get_obj_attr(attr::X, self)
    }
}

/// Why a model has no optimal solution.
///
/// The `Display` impl is the text handed back to callers in place of a profit.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnosis {
    /// The constraints of an irreducible infeasible subsystem
    Infeasible { conflicting: Vec<String> },
    Unbounded,
    InfOrUnbd,
    Other(Status),
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnosis::Infeasible { conflicting } => {
                let names = conflicting.iter().map(|c| format!("'{}'", c)).collect::<Vec<_>>();
                write!(
                    f,
                    "infeasible\nConflicting Constraints:\n[{}]\nDo not print all infeasible constraints. \
                     Simply mention the reason why they are infeasible (e.g. demand cannot be satisfied).",
                    names.join(", ")
                )
            }
            Diagnosis::Unbounded => write!(f, "unbounded"),
            Diagnosis::InfOrUnbd => write!(f, "inf_or_unbound"),
            Diagnosis::Other(status) => write!(f, "Model Status:{:?}", status),
        }
    }
}

/// Silences the solver and makes its results reproducible: one thread, and MIPs
/// solved to a zero gap.
pub fn configure(model: &mut Model) -> grb::Result<()> {
    model.set_param(param::OutputFlag, 0)?;
    model.set_param(param::Threads, 1)?;
    model.set_param(param::MIPGap, 0.0)?;
    Ok(())
}

/// Explains a non-optimal status. Infeasible models get an IIS computed.
pub fn diagnose(model: &mut Model, status: Status) -> grb::Result<Diagnosis> {
    let diagnosis = match status {
        Status::Unbounded => Diagnosis::Unbounded,
        Status::InfOrUnbd => Diagnosis::InfOrUnbd,
        Status::Infeasible => {
            model.compute_iis()?;
            let constrs = model.get_constrs()?.to_vec();
            let mut conflicting = Vec::new();
            for constr in &constrs {
                if model.get_obj_attr(attr::IISConstr, constr)? != 0 {
                    conflicting.push(model.get_obj_attr(attr::ConstrName, constr)?);
                }
            }
            Diagnosis::Infeasible { conflicting }
        }
        other => Diagnosis::Other(other),
    };

    Ok(diagnosis)
}

/// Optimizes the model, returning the objective value or the reason there is none
pub fn solve(model: &mut Model) -> grb::Result<std::result::Result<f64, Diagnosis>> {
    model.optimize()?;
    match model.status()? {
        Status::Optimal => Ok(Ok(model.get_attr(attr::ObjVal)?)),
        status => Ok(Err(diagnose(model, status)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnosis_messages() {
        let infeasible = Diagnosis::Infeasible {
            conflicting: vec!["enforce_supplier1_choice".to_string(), "zero_flow_supplier1".to_string()],
        };
        let text = infeasible.to_string();
        assert!(text.starts_with(
            "infeasible\nConflicting Constraints:\n['enforce_supplier1_choice', 'zero_flow_supplier1']\n"
        ));
        assert!(text.contains("demand cannot be satisfied"));

        assert_eq!(Diagnosis::Unbounded.to_string(), "unbounded");
        assert_eq!(Diagnosis::InfOrUnbd.to_string(), "inf_or_unbound");
        assert!(Diagnosis::Other(Status::TimeLimit).to_string().starts_with("Model Status:"));
    }
}
