use parking_lot::RwLock;
use crate::distr::*;
use crate::message::{Moments, NaturalParameters};
use super::{VariableId, FactorId, FactorNode};

/// What a node contributes to the joint. Hidden nodes have their posterior
/// refreshed at every sweep; Observed nodes pin the sufficient statistics of
/// a data point and only contribute their likelihood term to the bound;
/// Deterministic nodes track an expression of other nodes and carry no
/// distribution of their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Hidden,
    Observed,
    Deterministic
}

/// Posterior state of a variable node: the accumulated natural parameters
/// and the moments they map to. Kept as a pair so accessors that need the
/// parametric form (gamma dispersion, scalar second moments) never have to
/// re-derive it from moments.
#[derive(Debug, Clone)]
pub struct Belief {
    pub np : NaturalParameters,
    pub moments : Moments
}

/// A node of the graph. The belief sits behind its own lock: a sweep updates
/// many nodes from worker threads, each writing only its own belief while
/// reading whatever neighborhood state the moment offers. Readers clone the
/// current value under a momentary read lock and never hold two locks at
/// once, so sweeps cannot deadlock whatever the wiring.
#[derive(Debug)]
pub struct Variable {
    name : String,
    model : &'static dyn Model,
    role : Role,
    parent : Option<FactorId>,
    children : Vec<FactorId>,
    belief : RwLock<Option<Belief>>
}

impl Variable {

    pub(crate) fn new(name : &str, model : &'static dyn Model, role : Role) -> Self {
        Self {
            name : name.to_string(),
            model,
            role,
            parent : None,
            children : Vec::new(),
            belief : RwLock::new(None)
        }
    }

    pub fn name(&self) -> &str {
        &self.name[..]
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub(crate) fn model(&self) -> &'static dyn Model {
        self.model
    }

    pub(crate) fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    pub(crate) fn add_child(&mut self, id : FactorId) {
        self.children.push(id);
    }

    pub(crate) fn children(&self) -> &[FactorId] {
        &self.children[..]
    }

    // Observed children keep their fixed statistics when the parent factor
    // arrives; everyone else is born with the factor's initial belief.
    pub(crate) fn set_parent(&mut self, id : FactorId, init : Option<Belief>) {
        self.parent = Some(id);
        if let Some(b) = init {
            *self.belief.write() = Some(b);
        }
    }

    // Observed nodes never accumulate natural parameters, so they are born
    // with a zero vector next to their fixed statistics.
    pub(crate) fn init_observed(&self, m : Moments) {
        let np = NaturalParameters::zeros(m.len());
        *self.belief.write() = Some(Belief { np, moments : m });
    }

    pub(crate) fn initialized(&self) -> bool {
        self.belief.read().is_some()
    }

    pub(crate) fn with_belief<R>(&self, f : impl FnOnce(&Belief) -> R) -> R {
        match &*self.belief.read() {
            Some(b) => f(b),
            None => panic!("Variable {} has no belief yet", self.name)
        }
    }

    /// Clone of the current moments. Panics on a node that was never wired.
    pub(crate) fn moments(&self) -> Moments {
        self.with_belief(|b| b.moments.clone() )
    }

    /// First and second scalar moments, the form expression evaluation
    /// consumes. Observed nodes are point masses regardless of the family's
    /// statistic layout.
    pub(crate) fn pair_moments(&self) -> (f64, f64) {
        self.with_belief(|b| {
            match self.role {
                Role::Observed => (b.moments[0], b.moments[0]*b.moments[0]),
                _ => (b.moments[0], self.model.sq_mean(&b.np, &b.moments))
            }
        })
    }

    /// One coordinate update. A hidden node accumulates the messages of its
    /// neighborhood into a fresh belief and returns its term of the evidence
    /// bound, <parent message - posterior, new moments> plus the difference
    /// of the factor-side and node-side log-partitions. An observed node has
    /// nothing to update and returns the expected log-likelihood of its
    /// fixed statistics. A deterministic node re-evaluates its expression
    /// and contributes nothing.
    pub(crate) fn iterate(&self, id : VariableId, vars : &[Variable], factors : &[FactorNode]) -> f64 {
        match self.role {
            Role::Observed => {
                let parent = match self.parent {
                    Some(f) => &factors[f.0],
                    None => return 0.0
                };
                let np = parent.natural_not(id, vars, factors);
                np.dot(&self.moments()) + parent.log_norm()
            },
            Role::Deterministic => {
                let parent = self.parent.unwrap_or_else(|| {
                    panic!("Variable {} was never wired to a parent factor", self.name)
                });
                let np = factors[parent.0].natural_not(id, vars, factors);
                let moments = self.model.moments(&np);
                *self.belief.write() = Some(Belief { np, moments });
                0.0
            },
            Role::Hidden => {
                let parent = self.parent.unwrap_or_else(|| {
                    panic!("Variable {} was never wired to a parent factor", self.name)
                });
                let pf = &factors[parent.0];
                let parent_np = pf.natural_not(id, vars, factors);
                let parent_ln = pf.log_norm();
                let mut total = parent_np.clone();
                for c in &self.children {
                    total += &factors[c.0].natural_not(id, vars, factors);
                }
                let moments = self.model.moments(&total);
                let cost = (&parent_np - &total).dot(&moments) + parent_ln - self.model.log_norm(&total);
                *self.belief.write() = Some(Belief { np : total, moments });
                cost
            }
        }
    }
}
