use nalgebra::*;
use super::*;
use rand::rngs::StdRng;
use rand::Rng;
use crate::message::{Moments, NaturalParameters};
use crate::calc::log_sum_exp;

/// Categorical (single-draw discrete) family over the one-hot basis: the
/// sufficient statistic of a realization is the indicator vector of the
/// chosen category, so the moments of a latent selector are exactly its
/// responsibilities. Its parent is a dirichlet-distributed weight vector
/// whose moments <ln pi_k> arrive as the natural parameter of the child;
/// the message back to the weights is the responsibility vector itself,
/// which the dirichlet absorbs as fractional counts. Normalization happens
/// entirely on the log scale through log_sum_exp.
#[derive(Debug, Clone, Copy)]
pub struct Categorical;

impl Model for Categorical {

    fn family(&self) -> Family {
        Family::Categorical
    }

    fn n_parents(&self) -> usize {
        1
    }

    fn parent_family(&self, role : usize) -> Family {
        match role {
            0 => Family::Dirichlet,
            _ => panic!("The categorical family takes a single weight parent")
        }
    }

    fn conjugate_role(&self, _role : usize) -> bool {
        true
    }

    fn moments(&self, np : &NaturalParameters) -> Moments {
        let norm = log_sum_exp(np.as_slice());
        Moments::from_vector(np.vector().map(|e| (e - norm).exp() ))
    }

    fn log_norm(&self, np : &NaturalParameters) -> f64 {
        -log_sum_exp(np.as_slice())
    }

    fn np_to_child(&self, parents : &[Moments]) -> NaturalParameters {
        NaturalParameters::from_slice(parents[0].as_slice())
    }

    fn np_to_parent(&self, role : usize, _parents : &[Moments], child : &Moments) -> NaturalParameters {
        match role {
            0 => NaturalParameters::from_slice(child.as_slice()),
            _ => panic!("The categorical family takes a single weight parent")
        }
    }

    fn factor_log_norm(&self, _parents : &[Moments]) -> f64 {
        0.0
    }

    fn sample(&self, parents : &[Moments], rng : &mut StdRng) -> Moments {
        let norm = log_sum_exp(parents[0].as_slice());
        let k = parents[0].len();
        let mut chosen = k - 1;
        let mut acc = 0.0;
        let u = rng.gen::<f64>();
        for (i, lp) in parents[0].as_slice().iter().enumerate() {
            acc += (lp - norm).exp();
            if u < acc {
                chosen = i;
                break;
            }
        }
        let mut one_hot = DVector::zeros(k);
        one_hot[chosen] = 1.0;
        Moments::from_vector(one_hot)
    }

    fn sufficient_stat(&self, y : &[f64]) -> Result<Moments, DomainError> {
        if y.len() < 2 {
            return Err(DomainError::Length { family : self.family(), expected : 2, found : y.len() });
        }
        for p in y {
            if !p.is_finite() || *p < 0.0 || *p > 1.0 {
                return Err(DomainError::Support(*p, self.family()));
            }
        }
        let total : f64 = y.iter().sum();
        if (total - 1.0).abs() > 1E-6 {
            return Err(DomainError::NotNormalized(total));
        }
        Ok(Moments::from_slice(y))
    }

    fn mean(&self, _np : &NaturalParameters, m : &Moments) -> DVector<f64> {
        m.vector().clone()
    }

    fn variance(&self, _np : &NaturalParameters, m : &Moments) -> DVector<f64> {
        m.vector().map(|r| r*(1.0 - r) )
    }
}

#[test]
fn categorical_moment_map_normalizes() {
    let np = NaturalParameters::from_slice(&[-700.0, -701.0, -699.5]);
    let m = Categorical.moments(&np);
    assert!((m.as_slice().iter().sum::<f64>() - 1.0).abs() < 1E-12);
    assert!(m[2] > m[0] && m[0] > m[1]);
    // Uniform log-weights give uniform responsibilities
    let flat = Categorical.moments(&NaturalParameters::from_slice(&[3.0, 3.0, 3.0, 3.0]));
    assert!(flat.as_slice().iter().all(|r| (r - 0.25).abs() < 1E-12 ));
}

#[test]
fn categorical_counts_message() {
    let r = Moments::from_slice(&[0.2, 0.3, 0.5]);
    let msg = Categorical.np_to_parent(0, &[], &r);
    assert!(msg.as_slice() == r.as_slice());
    // One-hot observation must pass the domain check, soft memberships too
    assert!(Categorical.sufficient_stat(&[0.0, 1.0, 0.0]).is_ok());
    assert!(Categorical.sufficient_stat(&[0.2, 0.3, 0.5]).is_ok());
    assert!(Categorical.sufficient_stat(&[0.2, 0.3]).is_err());
}
