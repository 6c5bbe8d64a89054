/// Vector messages exchanged between nodes: expected sufficient statistics
/// and natural-parameter increments sharing a per-family entry layout.
pub mod message;

/// Scalar special functions (log-gamma, digamma, gaussian tails) and the
/// numerically careful helpers the moment maps build on.
pub mod calc;

/// The closed set of conjugate exponential families the engine passes
/// messages between, behind a common Model trait.
pub mod distr;

/// Sum-of-product expression trees backing deterministic nodes, with the
/// affine inversion that turns a forwarded belief into operand messages.
pub mod expr;

/// Forward draws for families without an off-the-shelf sampler, used when
/// beliefs are first initialized.
pub mod sampling;

/// The factor graph itself: variable and factor nodes, the construction
/// rules that keep wirings conjugate, and the per-node coordinate update.
pub mod graph;

/// Data-parallel sweeps that drive a graph to convergence of the evidence
/// bound, and the reporting types of a finished run.
pub mod fit;
