use std::fmt;
use std::ops::{Add, Mul};
use crate::graph::VariableId;

/// Slot of a deterministic expression, bound to a variable node by the
/// Context handed to the calculation factor. Placeholder i reads the moments
/// of the variable in slot i.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder(pub usize);

/// Sum-of-products expression over placeholders, the language of
/// deterministic nodes. Built with ordinary operators:
///
/// let (a, s) = (Placeholder(0), Placeholder(1));
/// let e = a * s + Placeholder(2);
///
/// Each placeholder may occur at most once, which keeps the expression
/// affine in every operand and makes the parent messages exact inversions;
/// graph construction enforces that before the factor is wired.
#[derive(Debug, Clone)]
pub enum Expression {
    Placeholder(Placeholder),
    Plus(Box<Expression>, Box<Expression>),
    Times(Box<Expression>, Box<Expression>)
}

impl Expression {

    /// Propagates the pair (E[e], E[e^2]) bottom-up, with vals[i] holding the
    /// first and second moments of the variable bound to placeholder i.
    /// Operands are treated as independent under the variational posterior,
    /// so sums pick up the cross term 2 E[l] E[r] and products factorize in
    /// both moments.
    pub fn eval(&self, vals : &[(f64, f64)]) -> (f64, f64) {
        match self {
            Expression::Placeholder(Placeholder(ix)) => {
                vals[*ix]
            },
            Expression::Plus(l, r) => {
                let (l1, l2) = l.eval(vals);
                let (r1, r2) = r.eval(vals);
                (l1 + r1, l2 + 2.0*l1*r1 + r2)
            },
            Expression::Times(l, r) => {
                let (l1, l2) = l.eval(vals);
                let (r1, r2) = r.eval(vals);
                (l1*r1, l2*r2)
            }
        }
    }

    pub fn contains(&self, target : Placeholder) -> bool {
        match self {
            Expression::Placeholder(p) => *p == target,
            Expression::Plus(l, r) | Expression::Times(l, r) => {
                l.contains(target) || r.contains(target)
            }
        }
    }

    /// Number of times a placeholder occurs in the tree.
    pub fn occurrences(&self, target : Placeholder) -> usize {
        match self {
            Expression::Placeholder(p) => {
                if *p == target { 1 } else { 0 }
            },
            Expression::Plus(l, r) | Expression::Times(l, r) => {
                l.occurrences(target) + r.occurrences(target)
            }
        }
    }

    /// Largest placeholder index referenced by the tree.
    pub fn max_placeholder(&self) -> usize {
        match self {
            Expression::Placeholder(Placeholder(ix)) => *ix,
            Expression::Plus(l, r) | Expression::Times(l, r) => {
                l.max_placeholder().max(r.max_placeholder())
            }
        }
    }

    /// Accumulates the affine view expr = scale * target + shift, holding all
    /// other operands at their current expectations. Descends toward the
    /// target: a sum adds the expected sibling to the shift, a product scales
    /// both coefficients by it. None if the target does not occur.
    pub fn linearize(&self, target : Placeholder, vals : &[(f64, f64)]) -> Option<(f64, f64)> {
        match self {
            Expression::Placeholder(p) => {
                if *p == target { Some((0.0, 1.0)) } else { None }
            },
            Expression::Plus(l, r) => {
                let (inner, sibling) = Self::split(l, r, target)?;
                let (shift, scale) = inner.linearize(target, vals)?;
                Some((shift + sibling.eval(vals).0, scale))
            },
            Expression::Times(l, r) => {
                let (inner, sibling) = Self::split(l, r, target)?;
                let (shift, scale) = inner.linearize(target, vals)?;
                let e = sibling.eval(vals).0;
                Some((shift*e, scale*e))
            }
        }
    }

    fn split<'a>(l : &'a Expression, r : &'a Expression, target : Placeholder) -> Option<(&'a Expression, &'a Expression)> {
        match (l.contains(target), r.contains(target)) {
            (true, false) => Some((l, r)),
            (false, true) => Some((r, l)),
            (false, false) => None,
            (true, true) => panic!("Placeholder {} occurs on both sides of an operator", target.0)
        }
    }
}

impl Placeholder {

    /// Solves the affine view of the expression for this placeholder against
    /// a value forwarded from below: returns (residual, scale) such that
    /// forwarded = scale * target + (forwarded - residual). The calculation
    /// factor turns the pair into the gaussian message toward the operand.
    pub fn invert(&self, forwarded : f64, expr : &Expression, vals : &[(f64, f64)]) -> (f64, f64) {
        match expr.linearize(*self, vals) {
            Some((shift, scale)) => (forwarded - shift, scale),
            None => panic!("Placeholder {} does not occur in the expression", self.0)
        }
    }
}

/// Binding of placeholder slots to graph variables: the variable in slot i
/// backs Placeholder(i). Handed to Graph::calculation together with the
/// expression it closes over.
#[derive(Debug, Clone)]
pub struct Context {
    vars : Vec<VariableId>
}

impl Context {

    pub fn new(vars : &[VariableId]) -> Self {
        Self { vars : vars.to_vec() }
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn vars(&self) -> &[VariableId] {
        &self.vars[..]
    }

    /// Slot a variable is bound to, if any.
    pub fn position(&self, v : VariableId) -> Option<usize> {
        self.vars.iter().position(|el| *el == v )
    }
}

impl From<Placeholder> for Expression {

    fn from(p : Placeholder) -> Expression {
        Expression::Placeholder(p)
    }
}

impl<R : Into<Expression>> Add<R> for Expression {

    type Output = Expression;

    fn add(self, rhs : R) -> Expression {
        Expression::Plus(Box::new(self), Box::new(rhs.into()))
    }
}

impl<R : Into<Expression>> Mul<R> for Expression {

    type Output = Expression;

    fn mul(self, rhs : R) -> Expression {
        Expression::Times(Box::new(self), Box::new(rhs.into()))
    }
}

impl<R : Into<Expression>> Add<R> for Placeholder {

    type Output = Expression;

    fn add(self, rhs : R) -> Expression {
        Expression::from(self) + rhs
    }
}

impl<R : Into<Expression>> Mul<R> for Placeholder {

    type Output = Expression;

    fn mul(self, rhs : R) -> Expression {
        Expression::from(self) * rhs
    }
}

impl fmt::Display for Expression {

    fn fmt(&self, f : &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expression::Placeholder(Placeholder(ix)) => write!(f, "p{}", ix),
            Expression::Plus(l, r) => write!(f, "({} + {})", l, r),
            Expression::Times(l, r) => write!(f, "({} * {})", l, r)
        }
    }
}

#[test]
fn pair_evaluation() {
    // Two independent operands with E = 2, E2 = 5 and E = 3, E2 = 10
    let vals = [(2.0, 5.0), (3.0, 10.0)];
    let (a, b) = (Placeholder(0), Placeholder(1));
    let (s1, s2) = (a + b).eval(&vals);
    assert!((s1 - 5.0).abs() < 1E-12);
    assert!((s2 - (5.0 + 12.0 + 10.0)).abs() < 1E-12);
    let (p1, p2) = (a * b).eval(&vals);
    assert!((p1 - 6.0).abs() < 1E-12);
    assert!((p2 - 50.0).abs() < 1E-12);
    // Sum variance exceeds the squared mean whenever operands are dispersed
    assert!(s2 > s1*s1);
}

#[test]
fn linearization_is_consistent_with_evaluation() {
    // a*s + b*t, affine in each operand
    let (a, s, b, t) = (Placeholder(0), Placeholder(1), Placeholder(2), Placeholder(3));
    let e = a*s + b*t;
    let vals = [(2.0, 4.1), (0.7, 0.6), (-1.0, 1.2), (3.0, 9.5)];
    for target in [s, t].iter() {
        let (shift, scale) = e.linearize(*target, &vals).unwrap();
        let direct = e.eval(&vals).0;
        let affine = scale*vals[target.0].0 + shift;
        assert!((direct - affine).abs() < 1E-12);
    }
    assert!(e.linearize(Placeholder(9), &vals).is_none());
}

#[test]
fn inversion_recovers_the_operand() {
    // Forwarding the expression's own expectation must hand back the operand
    // expectation scaled by its coefficient
    let (a, s) = (Placeholder(0), Placeholder(1));
    let e = a*s + Placeholder(2);
    let vals = [(2.0, 4.0), (5.0, 26.0), (1.0, 1.0)];
    let forwarded = e.eval(&vals).0;
    let (residual, scale) = s.invert(forwarded, &e, &vals);
    assert!((residual / scale - vals[1].0).abs() < 1E-12);
    assert!((scale - 2.0).abs() < 1E-12);
}

#[test]
#[should_panic]
fn repeated_operand_is_rejected() {
    let s = Placeholder(0);
    let e = s * s;
    e.linearize(s, &[(1.0, 2.0)]).unwrap();
}
