use std::sync::atomic::{AtomicU64, Ordering};
use rand::rngs::StdRng;
use rand::Rng;
use crate::distr::*;
use crate::expr::{Expression, Context, Placeholder};
use crate::message::{Moments, NaturalParameters};
use super::{VariableId, Variable, Belief};

/// Dispersion floor for the message a calculation factor sends its child.
/// An all-observed context collapses the expression to a point, and the
/// floor keeps the implied precision finite.
pub const MIN_SPREAD : f64 = 1E-12;

/// Factor nodes route messages between their neighbors. They carry no state
/// beyond a cache of the factor-side log-partition, refreshed whenever the
/// child message is assembled and read back by the child's bound term within
/// the same update.
#[derive(Debug)]
pub enum FactorNode {

    /// Draws the child from the family's conditional given the parents.
    Conjugate {
        model : &'static dyn Model,
        parents : Vec<VariableId>,
        child : VariableId,
        log_norm : AtomicU64
    },

    /// Gates K gaussian components by a categorical weight node: component k
    /// explains the child with responsibility r_k, and every message in or
    /// out is the responsibility-weighted version of the plain gaussian one.
    /// The weight node itself receives the expected component log-likelihoods
    /// as its message, the soft assignment scores.
    Mixture {
        component : &'static dyn Model,
        means : Vec<VariableId>,
        precisions : Vec<VariableId>,
        weights : VariableId,
        child : VariableId,
        log_norm : AtomicU64
    },

    /// Pins a deterministic child to the value of an expression over the
    /// context variables. Messages toward operands invert the expression
    /// around the belief forwarded from below the child; the factor itself
    /// adds nothing to the bound.
    Calculation {
        expr : Expression,
        context : Context,
        child : VariableId
    }
}

fn gather(vars : &[Variable], ids : &[VariableId]) -> Vec<Moments> {
    ids.iter().map(|id| vars[id.0].moments() ).collect()
}

impl FactorNode {

    pub(crate) fn conjugate(model : &'static dyn Model, parents : &[VariableId], child : VariableId) -> Self {
        FactorNode::Conjugate {
            model,
            parents : parents.to_vec(),
            child,
            log_norm : AtomicU64::new(0f64.to_bits())
        }
    }

    pub(crate) fn mixture(means : &[VariableId], precisions : &[VariableId], weights : VariableId, child : VariableId) -> Self {
        FactorNode::Mixture {
            component : &Normal,
            means : means.to_vec(),
            precisions : precisions.to_vec(),
            weights,
            child,
            log_norm : AtomicU64::new(0f64.to_bits())
        }
    }

    pub(crate) fn calculation(expr : Expression, context : Context, child : VariableId) -> Self {
        FactorNode::Calculation { expr, context, child }
    }

    pub(crate) fn child(&self) -> VariableId {
        match self {
            FactorNode::Conjugate { child, .. } => *child,
            FactorNode::Mixture { child, .. } => *child,
            FactorNode::Calculation { child, .. } => *child
        }
    }

    /// Parent-side neighbors in slot order (components before weights for
    /// mixtures, context order for calculations).
    pub(crate) fn neighbors(&self) -> Vec<VariableId> {
        match self {
            FactorNode::Conjugate { parents, .. } => parents.clone(),
            FactorNode::Mixture { means, precisions, weights, .. } => {
                let mut ids = means.clone();
                ids.extend(precisions);
                ids.push(*weights);
                ids
            },
            FactorNode::Calculation { context, .. } => context.vars().to_vec()
        }
    }

    /// Factor-side log-partition as of the last child message. Calculation
    /// factors contribute nothing to the bound.
    pub(crate) fn log_norm(&self) -> f64 {
        match self {
            FactorNode::Conjugate { log_norm, .. } => f64::from_bits(log_norm.load(Ordering::Relaxed)),
            FactorNode::Mixture { log_norm, .. } => f64::from_bits(log_norm.load(Ordering::Relaxed)),
            FactorNode::Calculation { .. } => 0.0
        }
    }

    /// Natural-parameter message toward the informed neighbor, assembled from
    /// clones of the current neighborhood moments (one momentary lock per
    /// neighbor, never two at once). Panics when the variable is not wired to
    /// this factor, which cannot happen for graphs built through the
    /// construction methods.
    pub(crate) fn natural_not(&self, v : VariableId, vars : &[Variable], factors : &[FactorNode]) -> NaturalParameters {
        match self {
            FactorNode::Conjugate { model, parents, child, log_norm } => {
                let pm = gather(vars, parents);
                if v == *child {
                    log_norm.store(model.factor_log_norm(&pm).to_bits(), Ordering::Relaxed);
                    model.np_to_child(&pm)
                } else {
                    let role = parents.iter().position(|p| *p == v ).unwrap_or_else(|| {
                        panic!("Variable {} is not wired to this factor", vars[v.0].name())
                    });
                    model.np_to_parent(role, &pm, &vars[child.0].moments())
                }
            },
            FactorNode::Mixture { component, means, precisions, weights, child, log_norm } => {
                let r = vars[weights.0].moments();
                if v == *child {
                    let mut msg = NaturalParameters::zeros(2);
                    let mut bound = 0.0;
                    for k in 0..means.len() {
                        let pm = [vars[means[k].0].moments(), vars[precisions[k].0].moments()];
                        msg += &(component.np_to_child(&pm) * r[k]);
                        bound += r[k] * component.factor_log_norm(&pm);
                    }
                    log_norm.store(bound.to_bits(), Ordering::Relaxed);
                    msg
                } else if v == *weights {
                    let child_m = vars[child.0].moments();
                    let scores : Vec<f64> = (0..means.len()).map(|k| {
                        let pm = [vars[means[k].0].moments(), vars[precisions[k].0].moments()];
                        component.av_log(&pm, &child_m)
                    }).collect();
                    NaturalParameters::from_slice(&scores[..])
                } else {
                    let child_m = vars[child.0].moments();
                    if let Some(k) = means.iter().position(|m| *m == v ) {
                        let pm = [vars[means[k].0].moments(), vars[precisions[k].0].moments()];
                        component.np_to_parent(0, &pm, &child_m) * r[k]
                    } else if let Some(k) = precisions.iter().position(|p| *p == v ) {
                        let pm = [vars[means[k].0].moments(), vars[precisions[k].0].moments()];
                        component.np_to_parent(1, &pm, &child_m) * r[k]
                    } else {
                        panic!("Variable {} is not wired to this factor", vars[v.0].name())
                    }
                }
            },
            FactorNode::Calculation { expr, context, child } => {
                let vals : Vec<(f64, f64)> = context.vars().iter()
                    .map(|p| vars[p.0].pair_moments() )
                    .collect();
                if v == *child {
                    let (e, e2) = expr.eval(&vals[..]);
                    let prec = (e2 - e*e).max(MIN_SPREAD).recip();
                    NaturalParameters::from_slice(&[prec*e, -0.5*prec])
                } else {
                    let slot = context.position(v).unwrap_or_else(|| {
                        panic!("Variable {} is not wired to this factor", vars[v.0].name())
                    });
                    // The belief forwarded from below the deterministic child
                    // is the sum of the messages its own children send it. A
                    // child with nothing below it forwards nothing.
                    let mut from_below = NaturalParameters::zeros(2);
                    for f in vars[child.0].children() {
                        from_below += &factors[f.0].natural_not(*child, vars, factors);
                    }
                    let prec = -2.0*from_below[1];
                    if prec <= 0.0 {
                        return NaturalParameters::zeros(2);
                    }
                    let forwarded = from_below[0] / prec;
                    let (residual, scale) = Placeholder(slot).invert(forwarded, expr, &vals[..]);
                    NaturalParameters::from_slice(&[scale*prec*residual, -0.5*scale*scale*prec])
                }
            }
        }
    }

    /// Belief the child is born with when the factor is attached: natural
    /// parameters from the factor's current message, moments from one
    /// forward draw given the parent moments (expressions evaluate instead
    /// of drawing). The draw breaks the symmetry between exchangeable nodes,
    /// which is what lets mixture components separate.
    pub(crate) fn initial_belief(&self, vars : &[Variable], rng : &mut StdRng) -> Belief {
        match self {
            FactorNode::Conjugate { model, parents, .. } => {
                let pm = gather(vars, parents);
                Belief { np : model.np_to_child(&pm), moments : model.sample(&pm, rng) }
            },
            FactorNode::Mixture { component, means, precisions, weights, .. } => {
                let r = vars[weights.0].moments();
                let mut np = NaturalParameters::zeros(2);
                for k in 0..means.len() {
                    let pm = [vars[means[k].0].moments(), vars[precisions[k].0].moments()];
                    np += &(component.np_to_child(&pm) * r[k]);
                }
                let draw : f64 = rng.gen();
                let mut chosen = means.len() - 1;
                let mut acc = 0.0;
                for k in 0..means.len() {
                    acc += r[k];
                    if draw < acc {
                        chosen = k;
                        break;
                    }
                }
                let pm = [vars[means[chosen].0].moments(), vars[precisions[chosen].0].moments()];
                Belief { np, moments : component.sample(&pm, rng) }
            },
            FactorNode::Calculation { expr, context, .. } => {
                let vals : Vec<(f64, f64)> = context.vars().iter()
                    .map(|p| vars[p.0].pair_moments() )
                    .collect();
                let (e, e2) = expr.eval(&vals[..]);
                let prec = (e2 - e*e).max(MIN_SPREAD).recip();
                Belief {
                    np : NaturalParameters::from_slice(&[prec*e, -0.5*prec]),
                    moments : Moments::from_slice(&[e, e2])
                }
            }
        }
    }
}
