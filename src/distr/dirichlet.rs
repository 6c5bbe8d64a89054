use nalgebra::*;
use super::*;
use rand::rngs::StdRng;
use crate::message::{Moments, NaturalParameters};
use crate::calc::special::*;

/// Dirichlet family over the sufficient statistics [ln pi_1 .. ln pi_K],
/// the conjugate prior of categorical weights. Its single parent is the
/// concentration vector u, which enters the child message as u - 1 and has
/// no conjugate message of its own (the normalizer couples all entries
/// through ln Gamma terms), so concentration parents are always observed.
/// With posterior pseudo-counts alpha = np + 1 the moment map is the familiar
/// digamma difference E[ln pi_k] = digamma(alpha_k) - digamma(sum alpha).
#[derive(Debug, Clone, Copy)]
pub struct Dirichlet;

impl Model for Dirichlet {

    fn family(&self) -> Family {
        Family::Dirichlet
    }

    fn n_parents(&self) -> usize {
        1
    }

    fn parent_family(&self, role : usize) -> Family {
        match role {
            0 => Family::Dirichlet,
            _ => panic!("The dirichlet family takes a single concentration parent")
        }
    }

    fn conjugate_role(&self, _role : usize) -> bool {
        false
    }

    fn moments(&self, np : &NaturalParameters) -> Moments {
        let alpha = np.vector().map(|e| e + 1.0 );
        let total : f64 = alpha.iter().sum();
        assert!(alpha.iter().all(|a| *a > 0.0 ), "Degenerate posterior counts at a dirichlet node");
        let dg_total = digamma(total);
        Moments::from_vector(alpha.map(|a| digamma(a) - dg_total ))
    }

    fn log_norm(&self, np : &NaturalParameters) -> f64 {
        let alpha = np.vector().map(|e| e + 1.0 );
        let total : f64 = alpha.iter().sum();
        ln_gamma(total) - alpha.iter().map(|a| ln_gamma(*a) ).sum::<f64>()
    }

    fn np_to_child(&self, parents : &[Moments]) -> NaturalParameters {
        NaturalParameters::from_vector(parents[0].vector().map(|u| u - 1.0 ))
    }

    fn np_to_parent(&self, _role : usize, _parents : &[Moments], _child : &Moments) -> NaturalParameters {
        panic!("No conjugate message exists toward the concentration of a dirichlet factor")
    }

    fn factor_log_norm(&self, parents : &[Moments]) -> f64 {
        let u = parents[0].vector();
        let total : f64 = u.iter().sum();
        ln_gamma(total) - u.iter().map(|e| ln_gamma(*e) ).sum::<f64>()
    }

    fn sample(&self, parents : &[Moments], rng : &mut StdRng) -> Moments {
        let pi = crate::sampling::dirichlet(parents[0].as_slice(), rng);
        Moments::from_vector(DVector::from_iterator(pi.len(), pi.iter().map(|p| p.ln() )))
    }

    fn sufficient_stat(&self, y : &[f64]) -> Result<Moments, DomainError> {
        if y.len() < 2 {
            return Err(DomainError::Length { family : self.family(), expected : 2, found : y.len() });
        }
        for u in y {
            if !u.is_finite() || *u <= 0.0 {
                return Err(DomainError::Support(*u, self.family()));
            }
        }
        Ok(Moments::from_slice(y))
    }

    fn mean(&self, np : &NaturalParameters, _m : &Moments) -> DVector<f64> {
        let alpha = np.vector().map(|e| e + 1.0 );
        let total : f64 = alpha.iter().sum();
        alpha / total
    }

    fn variance(&self, np : &NaturalParameters, _m : &Moments) -> DVector<f64> {
        let alpha = np.vector().map(|e| e + 1.0 );
        let total : f64 = alpha.iter().sum();
        alpha.map(|a| a*(total - a) / (total*total*(total + 1.0)) )
    }
}

#[test]
fn dirichlet_log_norm() {
    // Three components of concentration 1.1 each:
    // ln Gamma(3.3) - 3 ln Gamma(1.1)
    let u = Moments::from_slice(&[1.1, 1.1, 1.1]);
    let expected = ln_gamma(3.3) - 3.0*ln_gamma(1.1);
    assert!((Dirichlet.factor_log_norm(&[u.clone()]) - expected).abs() < 1E-12);
    // The posterior with np = u - 1 carries the same normalizer
    let np = Dirichlet.np_to_child(&[u]);
    assert!((Dirichlet.log_norm(&np) - expected).abs() < 1E-12);
}

#[test]
fn dirichlet_mean_is_normalized() {
    let np = NaturalParameters::from_slice(&[0.5, 2.0, -0.2, 4.0]);
    let m = Dirichlet.moments(&np);
    let mean = Dirichlet.mean(&np, &m);
    assert!((mean.iter().sum::<f64>() - 1.0).abs() < 1E-12);
    assert!(mean.iter().all(|p| *p > 0.0 && *p < 1.0 ));
    // E[ln pi_k] are negative log-probabilities
    assert!(m.as_slice().iter().all(|e| *e < 0.0 ));
}

#[test]
fn dirichlet_moment_map_against_digamma() {
    let np = NaturalParameters::from_slice(&[1.0, 0.0, 3.0]);
    let m = Dirichlet.moments(&np);
    // alpha = (2, 1, 4), total 7
    assert!((m[0] - (digamma(2.0) - digamma(7.0))).abs() < 1E-12);
    assert!((m[1] - (digamma(1.0) - digamma(7.0))).abs() < 1E-12);
    assert!((m[2] - (digamma(4.0) - digamma(7.0))).abs() < 1E-12);
}
