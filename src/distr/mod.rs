use nalgebra::*;
use std::fmt::{self, Debug};
use rand::rngs::StdRng;
use thiserror::Error;
use crate::message::{Moments, NaturalParameters};

pub mod normal;

pub use normal::*;

pub mod rectified;

pub use rectified::*;

pub mod gamma;

pub use gamma::*;

pub mod dirichlet;

pub use dirichlet::*;

pub mod categorical;

pub use categorical::*;

/// Distribution families the engine knows how to pass messages between. The
/// set is closed: every variable node carries exactly one of those, factors
/// check the families of their neighbors at construction, and dispatch happens
/// through the Model trait object rather than through downcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Normal,
    RectifiedNormal,
    Gamma,
    Dirichlet,
    Categorical
}

impl fmt::Display for Family {

    fn fmt(&self, f : &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Family::Normal => "normal",
            Family::RectifiedNormal => "rectified normal",
            Family::Gamma => "gamma",
            Family::Dirichlet => "dirichlet",
            Family::Categorical => "categorical"
        };
        write!(f, "{}", s)
    }
}

/// Raised when an observed value falls outside the support of the family it
/// is attached to, at node construction time. Messages never raise those:
/// anything that survives construction is kept inside the domain by the
/// conjugate updates themselves.
#[derive(Debug, Error)]
pub enum DomainError {

    #[error("Informed value {0} outside the support of the {1} family")]
    Support(f64, Family),

    #[error("Observation of length {found} where the {family} family expects length {expected}")]
    Length { family : Family, expected : usize, found : usize },

    #[error("Membership vector sums to {0}; expected unit mass")]
    NotNormalized(f64)
}

/// Contract each distribution family satisfies so that variable and factor
/// nodes can treat them uniformly. Implementors are stateless unit structs
/// (all state lives at the nodes as moments and natural parameters), which is
/// what lets factors share them as plain `&'static dyn Model` references.
///
/// The sufficient statistic layout is fixed per family and every method below
/// speaks that layout: [x, x^2] for the normal and rectified normal families,
/// [x, ln x] for gamma, [ln pi_k] for dirichlet and the one-hot/responsibility
/// basis for categorical. With those statistics the base measure term of
/// ln p = phi . u(x) + g vanishes for all five families, so log-partitions
/// are the only scalar corrections the bound needs.
pub trait Model : Debug + Send + Sync {

    fn family(&self) -> Family;

    /// Number of parent slots of a factor carrying this model.
    fn n_parents(&self) -> usize;

    /// Family a parent attached at the given slot must carry.
    fn parent_family(&self, role : usize) -> Family;

    /// Whether the slot admits a conjugate message (and therefore a Hidden
    /// parent). The gamma shape and the dirichlet concentration do not: those
    /// parents must be Observed, which graph construction enforces.
    fn conjugate_role(&self, role : usize) -> bool;

    /// Moment map: expected sufficient statistics of the exponential-family
    /// posterior with the informed natural parameter.
    fn moments(&self, np : &NaturalParameters) -> Moments;

    /// Log-partition of the posterior at the informed natural parameter (the
    /// node-side scalar of the evidence bound).
    fn log_norm(&self, np : &NaturalParameters) -> f64;

    /// Natural-parameter message from a factor carrying this model toward its
    /// child, given the current moments of the factor's parents.
    fn np_to_child(&self, parents : &[Moments]) -> NaturalParameters;

    /// Natural-parameter message toward the parent in the given slot, given
    /// the co-parent moments and the child moments. Panics on a slot for
    /// which no conjugate message exists; construction rejects such wirings
    /// before any message can be requested.
    fn np_to_parent(&self, role : usize, parents : &[Moments], child : &Moments) -> NaturalParameters;

    /// Expected log-partition of the conditional under the parent moments
    /// (the factor-side scalar of the evidence bound).
    fn factor_log_norm(&self, parents : &[Moments]) -> f64;

    /// Expected log-density of the child under the factor's conditional,
    /// <ln p(child | parents)>. Used by mixtures to score components.
    fn av_log(&self, parents : &[Moments], child : &Moments) -> f64 {
        self.np_to_child(parents).dot(child) + self.factor_log_norm(parents)
    }

    /// One forward draw given the parent moments, as sufficient statistics.
    /// Only used to initialize beliefs when a node is first wired.
    fn sample(&self, parents : &[Moments], rng : &mut StdRng) -> Moments;

    /// Sufficient statistics of a fixed observed value, with its domain
    /// checked. Scalar families take a single entry; dirichlet takes a
    /// positive concentration vector; categorical takes a unit-mass
    /// membership vector.
    fn sufficient_stat(&self, y : &[f64]) -> Result<Moments, DomainError>;

    /// Posterior expectation on the natural scale of the variate.
    fn mean(&self, np : &NaturalParameters, m : &Moments) -> DVector<f64>;

    /// Posterior dispersion on the natural scale of the variate.
    fn variance(&self, np : &NaturalParameters, m : &Moments) -> DVector<f64>;

    /// Second raw moment E[x^2] for scalar families, consumed by expression
    /// evaluation. Simplex families have no scalar second moment and panic;
    /// construction keeps them out of expressions.
    fn sq_mean(&self, _np : &NaturalParameters, _m : &Moments) -> f64 {
        panic!("The {} family has no scalar second moment", self.family())
    }
}
