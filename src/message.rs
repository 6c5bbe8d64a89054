use nalgebra::*;
use std::fmt;
use std::ops::{Add, AddAssign, Sub, Mul, Index};

/// Vector of expected sufficient statistics of a node, under the node's current
/// variational posterior. The entry layout is fixed by the distribution that
/// produced it: a Gaussian node carries [E[x], E[x^2]]; a Gamma node carries
/// [E[x], E[ln x]]; a Dirichlet node carries [E[ln pi_k]]; a Categorical node
/// carries the responsibility vector. Moments are produced by the moment map of
/// a model and consumed by factors when they assemble messages, so they only
/// ever meet natural parameters of the same layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Moments(DVector<f64>);

impl Moments {

    pub fn from_slice(s : &[f64]) -> Self {
        Moments(DVector::from_column_slice(s))
    }

    pub fn from_vector(v : DVector<f64>) -> Self {
        Moments(v)
    }

    pub fn len(&self) -> usize {
        self.0.nrows()
    }

    pub fn as_slice(&self) -> &[f64] {
        self.0.as_slice()
    }

    pub fn vector(&self) -> &DVector<f64> {
        &self.0
    }
}

impl Index<usize> for Moments {

    type Output = f64;

    fn index(&self, ix : usize) -> &f64 {
        &self.0[ix]
    }
}

impl fmt::Display for Moments {

    fn fmt(&self, f : &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Moments({:.6?})", self.0.as_slice())
    }
}

/// Natural-parameter increment exchanged between nodes. Carries the same entry
/// layout as the Moments of the receiving node, which is what makes belief
/// updates a plain vector sum: the posterior natural parameter of a node is the
/// sum of the messages arriving from its parent factor and from each child
/// factor. Supports the small algebra the engine needs (sum, difference,
/// scaling by a responsibility, dot product against moments for the expected
/// log-probability terms of the bound).
#[derive(Debug, Clone, PartialEq)]
pub struct NaturalParameters(DVector<f64>);

impl NaturalParameters {

    pub fn from_slice(s : &[f64]) -> Self {
        NaturalParameters(DVector::from_column_slice(s))
    }

    pub fn from_vector(v : DVector<f64>) -> Self {
        NaturalParameters(v)
    }

    pub fn zeros(n : usize) -> Self {
        NaturalParameters(DVector::zeros(n))
    }

    pub fn len(&self) -> usize {
        self.0.nrows()
    }

    pub fn as_slice(&self) -> &[f64] {
        self.0.as_slice()
    }

    pub fn vector(&self) -> &DVector<f64> {
        &self.0
    }

    /// Expected log-probability contraction <phi, u>. Panics if the operands
    /// disagree on layout, which is a wiring error upstream.
    pub fn dot(&self, m : &Moments) -> f64 {
        assert!(self.len() == m.len(), "Natural parameter of length {} contracted against moments of length {}", self.len(), m.len());
        self.0.dot(m.vector())
    }
}

impl Index<usize> for NaturalParameters {

    type Output = f64;

    fn index(&self, ix : usize) -> &f64 {
        &self.0[ix]
    }
}

impl Add for NaturalParameters {

    type Output = NaturalParameters;

    fn add(self, rhs : NaturalParameters) -> NaturalParameters {
        NaturalParameters(self.0 + rhs.0)
    }
}

impl AddAssign<&NaturalParameters> for NaturalParameters {

    fn add_assign(&mut self, rhs : &NaturalParameters) {
        self.0 += &rhs.0;
    }
}

impl Sub for &NaturalParameters {

    type Output = NaturalParameters;

    fn sub(self, rhs : &NaturalParameters) -> NaturalParameters {
        NaturalParameters(&self.0 - &rhs.0)
    }
}

impl Mul<f64> for NaturalParameters {

    type Output = NaturalParameters;

    fn mul(self, s : f64) -> NaturalParameters {
        NaturalParameters(self.0 * s)
    }
}

impl Mul<f64> for &NaturalParameters {

    type Output = NaturalParameters;

    fn mul(self, s : f64) -> NaturalParameters {
        NaturalParameters(&self.0 * s)
    }
}

impl fmt::Display for NaturalParameters {

    fn fmt(&self, f : &mut fmt::Formatter) -> fmt::Result {
        write!(f, "NaturalParameters({:.6?})", self.0.as_slice())
    }
}

#[test]
fn message_algebra() {
    let a = NaturalParameters::from_slice(&[1.0, -0.5]);
    let b = NaturalParameters::from_slice(&[2.0, -1.5]);
    let m = Moments::from_slice(&[3.0, 10.0]);
    assert!(((a.clone() + b.clone()).dot(&m) - (3.0*3.0 + -2.0*10.0)).abs() < 1E-12);
    assert!(((&b - &a)[0] - 1.0).abs() < 1E-12);
    assert!(((a.clone()*2.0)[1] + 1.0).abs() < 1E-12);
    let mut acc = NaturalParameters::zeros(2);
    acc += &a;
    acc += &b;
    assert!(acc == a + b);
}

#[test]
#[should_panic]
fn mismatched_contraction() {
    let phi = NaturalParameters::from_slice(&[1.0, 2.0]);
    let u = Moments::from_slice(&[1.0, 2.0, 3.0]);
    phi.dot(&u);
}
