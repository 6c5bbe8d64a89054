use std::fmt;
use nalgebra::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use crate::distr::*;
use crate::expr::{Expression, Context, Placeholder};
use crate::message::Moments;

pub mod variable;

pub use variable::*;

pub mod factor;

pub use factor::*;

/// Index of a variable node inside its graph. Handed out by the construction
/// methods and valid for the life of the graph (nodes are never removed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VariableId(pub(crate) usize);

impl fmt::Display for VariableId {

    fn fmt(&self, f : &mut fmt::Formatter) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Index of a factor node inside its graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FactorId(pub(crate) usize);

impl fmt::Display for FactorId {

    fn fmt(&self, f : &mut fmt::Formatter) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

/// Raised by the construction methods of Graph when a wiring request breaks
/// the rules messages rely on. Construction is the only fallible surface of
/// the crate: a graph that builds successfully runs to convergence without
/// further recoverable errors.
#[derive(Debug, Error)]
pub enum GraphError {

    #[error("Name {0} already used in the graph")]
    NameTaken(String),

    #[error("Variable {0} already has a parent factor")]
    ParentTaken(String),

    #[error("Variable {0} has no belief yet; attach its parent factor first")]
    Uninitialized(String),

    #[error("The {family} family takes {expected} parents, {found} informed")]
    WrongArity { family : Family, expected : usize, found : usize },

    #[error("Parent slot {role} of a {factor} factor takes the {expected} family, found {found}")]
    WrongFamily { factor : Family, role : usize, expected : Family, found : Family },

    #[error("Parent slot {role} of a {factor} factor admits no conjugate message; only observed nodes can fill it")]
    NonConjugate { factor : Family, role : usize },

    #[error("A {factor} factor takes a child of its own family, found {found}")]
    ChildFamily { factor : Family, found : Family },

    #[error("A {factor} factor informs {expected} statistics; observed child {name} carries {found}")]
    ChildLength { factor : Family, name : String, expected : usize, found : usize },

    #[error("Variable {0} is deterministic; only a calculation factor can be its parent")]
    DeterministicChild(String),

    #[error("Variable {0} is not deterministic; calculation factors take a deterministic child")]
    NotDeterministic(String),

    #[error("Variable {0} cannot be both parent and child of the same factor")]
    SelfLoop(String),

    #[error("Variable {0} is wired to the same factor more than once")]
    DuplicateNeighbor(String),

    #[error("A mixture takes at least one component")]
    EmptyMixture,

    #[error("Mixture components come in mean/precision pairs; {0} means and {1} precisions informed")]
    UnbalancedMixture(usize, usize),

    #[error("Mixture of {components} components gated by a weight vector of length {found}")]
    WeightLength { components : usize, found : usize },

    #[error("Mixture weights carry the categorical family, found {0}")]
    WeightFamily(Family),

    #[error("A calculation takes at least one operand")]
    EmptyContext,

    #[error("Placeholder {0} is not bound by the context")]
    UnboundPlaceholder(usize),

    #[error("Placeholder {0} occurs {1} times in the expression; expressions must be affine in every operand")]
    RepeatedPlaceholder(usize, usize),

    #[error("Context slot {0} is never referenced by the expression")]
    UnreadOperand(usize),

    #[error("Variable {name} carries the {family} family, which has no scalar moments to enter an expression")]
    NonScalarOperand { name : String, family : Family },

    #[error(transparent)]
    Domain(#[from] DomainError)
}

/// A directed factor graph under mean-field variational message passing.
/// Variable nodes own a belief (natural parameters plus the moments they map
/// to, behind a lock so sweeps can run data-parallel); factor nodes are
/// stateless message routers between their neighbors. Construction is
/// bottom-up: a node can only serve as a parent once its own parent factor
/// is attached (observed nodes are born ready), which keeps every graph
/// acyclic and every belief initialized with a forward draw by the time it
/// can be read.
///
/// The usual shape of a model is: observed hyperparameters at the top;
/// hidden nodes wired to their priors via `factor`; one observed node per
/// data point at the bottom, tied to the latents via `factor`, `mixture` or
/// a `calculation` chain. `fit::run` then sweeps the graph until the
/// evidence bound stabilizes.
pub struct Graph {
    vars : Vec<Variable>,
    factors : Vec<FactorNode>,
    rng : StdRng
}

// A rectified node exposes the same [x, x^2] statistics a gaussian does, so
// it can stand wherever a gaussian mean is expected.
fn slot_accepts(expected : Family, found : Family) -> bool {
    expected == found || (expected == Family::Normal && found == Family::RectifiedNormal)
}

impl Graph {

    /// Empty graph with entropy-seeded initialization draws.
    pub fn new() -> Self {
        Self { vars : Vec::new(), factors : Vec::new(), rng : StdRng::from_entropy() }
    }

    /// Empty graph whose initialization draws replay deterministically.
    pub fn seeded(seed : u64) -> Self {
        Self { vars : Vec::new(), factors : Vec::new(), rng : StdRng::seed_from_u64(seed) }
    }

    fn check_name(&self, name : &str) -> Result<(), GraphError> {
        if self.vars.iter().any(|v| v.name() == name ) {
            Err(GraphError::NameTaken(name.to_string()))
        } else {
            Ok(())
        }
    }

    /// Latent node of the given family. The node starts without a belief;
    /// attach its prior factor before referencing it as a parent elsewhere.
    pub fn hidden(&mut self, model : &'static dyn Model, name : &str) -> Result<VariableId, GraphError> {
        self.check_name(name)?;
        self.vars.push(Variable::new(name, model, Role::Hidden));
        Ok(VariableId(self.vars.len() - 1))
    }

    /// Fixed node holding the sufficient statistics of an observed value,
    /// checked against the support of the family. Ready to serve as a parent
    /// immediately; its value never changes.
    pub fn observed(&mut self, model : &'static dyn Model, name : &str, value : &[f64]) -> Result<VariableId, GraphError> {
        self.check_name(name)?;
        let m = model.sufficient_stat(value)?;
        let var = Variable::new(name, model, Role::Observed);
        var.init_observed(m);
        self.vars.push(var);
        Ok(VariableId(self.vars.len() - 1))
    }

    /// Node standing for an expression of other nodes; wire it as the child
    /// of a calculation factor. Carries gaussian-layout moments.
    pub fn deterministic(&mut self, name : &str) -> Result<VariableId, GraphError> {
        self.check_name(name)?;
        self.vars.push(Variable::new(name, &Normal, Role::Deterministic));
        Ok(VariableId(self.vars.len() - 1))
    }

    /// Wires a conjugate factor of the given family: `parents` fill the
    /// family's parent slots in order and `child` receives its draws.
    /// Parents must already hold a belief, slots that admit no conjugate
    /// message take observed parents only, the child must not have a parent
    /// factor yet, and an observed child must pin statistics of the same
    /// length as the message the factor delivers. On success a hidden child
    /// is initialized with one forward draw from the factor.
    pub fn factor(&mut self, model : &'static dyn Model, parents : &[VariableId], child : VariableId) -> Result<FactorId, GraphError> {
        if parents.len() != model.n_parents() {
            return Err(GraphError::WrongArity {
                family : model.family(),
                expected : model.n_parents(),
                found : parents.len()
            });
        }
        self.check_child(child, model.family())?;
        self.check_neighbors(parents, child)?;
        for (role, p) in parents.iter().enumerate() {
            self.check_parent(*p, model, role)?;
        }
        // Hidden children take their dimension from the factor at the forward
        // draw; observed children arrive with fixed statistics, whose length
        // must agree with the message (vector families can disagree).
        let v = &self.vars[child.0];
        if v.role() == Role::Observed {
            let pm : Vec<Moments> = parents.iter().map(|p| self.vars[p.0].moments() ).collect();
            let expected = model.np_to_child(&pm).len();
            let found = v.moments().len();
            if found != expected {
                return Err(GraphError::ChildLength {
                    factor : model.family(),
                    name : v.name().to_string(),
                    expected,
                    found
                });
            }
        }
        Ok(self.attach(FactorNode::conjugate(model, parents, child)))
    }

    /// Wires a mixture of gaussian components over a shared child: component
    /// k draws its mean from `means[k]` and its precision from
    /// `precisions[k]`, and `weights` (a categorical node over the
    /// components) gates which component explains the child. Each component
    /// slot follows the same conjugacy rules as the plain gaussian factor.
    pub fn mixture(&mut self, means : &[VariableId], precisions : &[VariableId], weights : VariableId, child : VariableId) -> Result<FactorId, GraphError> {
        if means.is_empty() {
            return Err(GraphError::EmptyMixture);
        }
        if means.len() != precisions.len() {
            return Err(GraphError::UnbalancedMixture(means.len(), precisions.len()));
        }
        self.check_child(child, Family::Normal)?;
        let mut neighbors = means.to_vec();
        neighbors.extend(precisions);
        neighbors.push(weights);
        self.check_neighbors(&neighbors, child)?;
        for m in means.iter() {
            self.check_parent(*m, &Normal, 0)?;
        }
        for p in precisions.iter() {
            self.check_parent(*p, &Normal, 1)?;
        }
        let w = &self.vars[weights.0];
        if w.model().family() != Family::Categorical {
            return Err(GraphError::WeightFamily(w.model().family()));
        }
        if !w.initialized() {
            return Err(GraphError::Uninitialized(w.name().to_string()));
        }
        let k = w.moments().len();
        if k != means.len() {
            return Err(GraphError::WeightLength { components : means.len(), found : k });
        }
        Ok(self.attach(FactorNode::mixture(means, precisions, weights, child)))
    }

    /// Wires a calculation factor: `child` (a deterministic node) becomes
    /// the value of `expr` over the variables bound by `context`. Operands
    /// must carry scalar families and each may be referenced at most once,
    /// which keeps the expression affine in every single operand and the
    /// messages toward them exact inversions.
    pub fn calculation(&mut self, expr : Expression, context : Context, child : VariableId) -> Result<FactorId, GraphError> {
        let v = &self.vars[child.0];
        if v.role() != Role::Deterministic {
            return Err(GraphError::NotDeterministic(v.name().to_string()));
        }
        if v.has_parent() {
            return Err(GraphError::ParentTaken(v.name().to_string()));
        }
        if context.len() == 0 {
            return Err(GraphError::EmptyContext);
        }
        if expr.max_placeholder() >= context.len() {
            return Err(GraphError::UnboundPlaceholder(expr.max_placeholder()));
        }
        self.check_neighbors(context.vars(), child)?;
        for (ix, bound) in context.vars().iter().enumerate() {
            let occurrences = expr.occurrences(Placeholder(ix));
            if occurrences == 0 {
                return Err(GraphError::UnreadOperand(ix));
            }
            if occurrences > 1 {
                return Err(GraphError::RepeatedPlaceholder(ix, occurrences));
            }
            let op = &self.vars[bound.0];
            match op.model().family() {
                Family::Dirichlet | Family::Categorical => {
                    return Err(GraphError::NonScalarOperand {
                        name : op.name().to_string(),
                        family : op.model().family()
                    });
                },
                _ => { }
            }
            if !op.initialized() {
                return Err(GraphError::Uninitialized(op.name().to_string()));
            }
        }
        Ok(self.attach(FactorNode::calculation(expr, context, child)))
    }

    fn check_child(&self, child : VariableId, family : Family) -> Result<(), GraphError> {
        let v = &self.vars[child.0];
        if v.role() == Role::Deterministic {
            return Err(GraphError::DeterministicChild(v.name().to_string()));
        }
        if v.has_parent() {
            return Err(GraphError::ParentTaken(v.name().to_string()));
        }
        if v.model().family() != family {
            return Err(GraphError::ChildFamily { factor : family, found : v.model().family() });
        }
        Ok(())
    }

    fn check_neighbors(&self, neighbors : &[VariableId], child : VariableId) -> Result<(), GraphError> {
        for (ix, n) in neighbors.iter().enumerate() {
            if *n == child {
                return Err(GraphError::SelfLoop(self.vars[child.0].name().to_string()));
            }
            if neighbors[..ix].contains(n) {
                return Err(GraphError::DuplicateNeighbor(self.vars[n.0].name().to_string()));
            }
        }
        Ok(())
    }

    fn check_parent(&self, p : VariableId, model : &'static dyn Model, role : usize) -> Result<(), GraphError> {
        let v = &self.vars[p.0];
        let expected = model.parent_family(role);
        if !slot_accepts(expected, v.model().family()) {
            return Err(GraphError::WrongFamily {
                factor : model.family(),
                role,
                expected,
                found : v.model().family()
            });
        }
        if !model.conjugate_role(role) && v.role() != Role::Observed {
            return Err(GraphError::NonConjugate { factor : model.family(), role });
        }
        if !v.initialized() {
            return Err(GraphError::Uninitialized(v.name().to_string()));
        }
        Ok(())
    }

    fn attach(&mut self, node : FactorNode) -> FactorId {
        let id = FactorId(self.factors.len());
        let child = node.child();
        let init = match self.vars[child.0].role() {
            Role::Observed => None,
            _ => Some(node.initial_belief(&self.vars, &mut self.rng))
        };
        for p in node.neighbors() {
            self.vars[p.0].add_child(id);
        }
        self.vars[child.0].set_parent(id, init);
        self.factors.push(node);
        id
    }

    pub fn n_variables(&self) -> usize {
        self.vars.len()
    }

    pub fn n_factors(&self) -> usize {
        self.factors.len()
    }

    /// Number of observed nodes, the per-datum normalizer of the bound.
    pub fn n_observed(&self) -> usize {
        self.vars.iter().filter(|v| v.role() == Role::Observed ).count()
    }

    /// Id of the named variable, if present.
    pub fn lookup(&self, name : &str) -> Option<VariableId> {
        self.vars.iter().position(|v| v.name() == name ).map(VariableId)
    }

    pub fn name(&self, id : VariableId) -> &str {
        self.vars[id.0].name()
    }

    pub fn role(&self, id : VariableId) -> Role {
        self.vars[id.0].role()
    }

    /// Current expected sufficient statistics of a node.
    pub fn moments(&self, id : VariableId) -> Moments {
        self.vars[id.0].moments()
    }

    /// Posterior expectation of a latent node on the natural scale of its
    /// variate. Panics on observed nodes, which hold data rather than a
    /// posterior.
    pub fn mean(&self, id : VariableId) -> DVector<f64> {
        let v = &self.vars[id.0];
        assert!(v.role() != Role::Observed, "Variable {} is observed; it holds data, not a posterior", v.name());
        v.with_belief(|b| v.model().mean(&b.np, &b.moments) )
    }

    /// Posterior dispersion of a latent node on the natural scale of its
    /// variate. Panics on observed nodes.
    pub fn variance(&self, id : VariableId) -> DVector<f64> {
        let v = &self.vars[id.0];
        assert!(v.role() != Role::Observed, "Variable {} is observed; it holds data, not a posterior", v.name());
        v.with_belief(|b| v.model().variance(&b.np, &b.moments) )
    }

    /// One coordinate update of the informed node: refreshes its belief from
    /// the current messages of its neighborhood and returns the node's
    /// contribution to the evidence bound. Driven by fit::sweep; exposed for
    /// callers running custom schedules.
    pub fn iterate(&self, id : VariableId) -> f64 {
        self.vars[id.0].iterate(id, &self.vars, &self.factors)
    }
}

#[test]
fn construction_rules() {
    let mut g = Graph::seeded(7);
    let mu = g.hidden(&Normal, "mu").unwrap();
    let x = g.hidden(&Normal, "x").unwrap();
    let prec = g.observed(&Gamma, "prec", &[2.0]).unwrap();

    // mu has no prior yet, so it cannot serve as a parent
    assert!(matches!(g.factor(&Normal, &[mu, prec], x), Err(GraphError::Uninitialized(_))));
    let m0 = g.observed(&Normal, "m0", &[0.0]).unwrap();
    let t0 = g.observed(&Gamma, "t0", &[1E-2]).unwrap();
    g.factor(&Normal, &[m0, t0], mu).unwrap();
    g.factor(&Normal, &[mu, prec], x).unwrap();

    assert!(matches!(g.factor(&Normal, &[m0, t0], x), Err(GraphError::ParentTaken(_))));
    assert!(matches!(g.hidden(&Normal, "mu"), Err(GraphError::NameTaken(_))));

    let y = g.hidden(&Gamma, "y").unwrap();
    assert!(matches!(g.factor(&Normal, &[mu, prec], y), Err(GraphError::ChildFamily { .. })));
    let x2 = g.hidden(&Normal, "x2").unwrap();
    assert!(matches!(g.factor(&Normal, &[prec, t0], x2), Err(GraphError::WrongFamily { .. })));
    assert!(matches!(g.factor(&Normal, &[mu], x2), Err(GraphError::WrongArity { .. })));
    assert!(matches!(g.factor(&Normal, &[x2, prec], x2), Err(GraphError::SelfLoop(_))));

    // the gamma shape slot admits no latent parent
    let shape = g.hidden(&Gamma, "shape").unwrap();
    let b0 = g.observed(&Gamma, "b0", &[1.0]).unwrap();
    assert!(matches!(g.factor(&Gamma, &[shape, b0], y), Err(GraphError::NonConjugate { .. })));
    g.factor(&Gamma, &[prec, b0], y).unwrap();

    assert!(g.lookup("prec") == Some(prec) && g.lookup("nope").is_none());
    assert!(g.role(mu) == Role::Hidden && g.role(prec) == Role::Observed);
    assert!(g.n_observed() == 4);
    // Rejected wirings left nothing attached
    assert!(g.n_factors() == 3);
}

/// A categorical observation under a dirichlet of a different cardinality
/// must fail at wiring time, not at the first sweep.
#[test]
fn observed_child_length_is_checked() {
    let mut g = Graph::seeded(13);
    let alpha0 = g.observed(&Dirichlet, "alpha0", &[1.0, 1.0, 1.0]).unwrap();
    let pi = g.hidden(&Dirichlet, "pi").unwrap();
    g.factor(&Dirichlet, &[alpha0], pi).unwrap();

    let z4 = g.observed(&Categorical, "z4", &[0.0, 0.0, 0.0, 1.0]).unwrap();
    assert!(matches!(
        g.factor(&Categorical, &[pi], z4),
        Err(GraphError::ChildLength { expected : 3, found : 4, .. })
    ));
    let z3 = g.observed(&Categorical, "z3", &[0.0, 0.0, 1.0]).unwrap();
    assert!(g.factor(&Categorical, &[pi], z3).is_ok());
}

#[test]
fn calculation_rules() {
    let mut g = Graph::seeded(11);
    let m0 = g.observed(&Normal, "m0", &[1.0]).unwrap();
    let t0 = g.observed(&Gamma, "t0", &[1.0]).unwrap();
    let a = g.hidden(&Normal, "a").unwrap();
    g.factor(&Normal, &[m0, t0], a).unwrap();
    let d = g.deterministic("d").unwrap();

    assert!(matches!(g.factor(&Normal, &[m0, t0], d), Err(GraphError::DeterministicChild(_))));
    let e = Placeholder(0) + Placeholder(1);
    assert!(matches!(g.calculation(e.clone(), Context::new(&[a]), d), Err(GraphError::UnboundPlaceholder(1))));
    let sq = Placeholder(0) * Placeholder(0);
    assert!(matches!(g.calculation(sq, Context::new(&[a]), d), Err(GraphError::RepeatedPlaceholder(0, 2))));
    let x = g.hidden(&Normal, "x").unwrap();
    assert!(matches!(g.calculation(e.clone(), Context::new(&[a, m0]), x), Err(GraphError::NotDeterministic(_))));

    g.calculation(e, Context::new(&[a, m0]), d).unwrap();
    assert!(g.role(d) == Role::Deterministic);
    let m = g.moments(d);
    assert!((m[0] - (g.moments(a)[0] + 1.0)).abs() < 1E-9);
}

#[test]
fn observed_values_are_checked() {
    let mut g = Graph::new();
    assert!(matches!(g.observed(&Gamma, "t", &[-1.0]), Err(GraphError::Domain(DomainError::Support(..)))));
    assert!(matches!(g.observed(&Normal, "y", &[1.0, 2.0]), Err(GraphError::Domain(DomainError::Length { .. }))));
    assert!(g.observed(&Normal, "y", &[0.3]).is_ok());
}
