use nalgebra::*;
use super::*;
use rand::rngs::StdRng;
use rand_distr;
use crate::message::{Moments, NaturalParameters};
use crate::calc::special::*;

/// Gamma family over the sufficient statistics [x, ln x], the conjugate home
/// of precisions and rates. Parameterized by a shape parent a and an
/// inverse-scale parent b; with natural parameter [-b, a-1] the moment map
/// recovers E[x] = a/b and E[ln x] = digamma(a) - ln b. The inverse scale is
/// itself gamma-distributed and receives the conjugate message [-E[x], a].
/// The shape has no conjugate message under those statistics (its likelihood
/// term involves ln Gamma(a)), so shape parents are fixed observed values
/// and graph construction rejects anything else.
#[derive(Debug, Clone, Copy)]
pub struct Gamma;

impl Model for Gamma {

    fn family(&self) -> Family {
        Family::Gamma
    }

    fn n_parents(&self) -> usize {
        2
    }

    fn parent_family(&self, role : usize) -> Family {
        match role {
            0 | 1 => Family::Gamma,
            _ => panic!("The gamma family takes a shape and an inverse scale parent")
        }
    }

    fn conjugate_role(&self, role : usize) -> bool {
        role == 1
    }

    fn moments(&self, np : &NaturalParameters) -> Moments {
        let b = -np[0];
        let a = np[1] + 1.0;
        assert!(a > 0.0 && b > 0.0, "Degenerate posterior (shape {}, inverse scale {}) at a gamma node", a, b);
        Moments::from_slice(&[a / b, digamma(a) - b.ln()])
    }

    fn log_norm(&self, np : &NaturalParameters) -> f64 {
        let b = -np[0];
        let a = np[1] + 1.0;
        a*b.ln() - ln_gamma(a)
    }

    fn np_to_child(&self, parents : &[Moments]) -> NaturalParameters {
        let (a, b) = (&parents[0], &parents[1]);
        NaturalParameters::from_slice(&[-b[0], a[0] - 1.0])
    }

    fn np_to_parent(&self, role : usize, parents : &[Moments], child : &Moments) -> NaturalParameters {
        match role {
            1 => NaturalParameters::from_slice(&[-child[0], parents[0][0]]),
            0 => panic!("No conjugate message exists toward the shape of a gamma factor"),
            _ => panic!("The gamma family takes a shape and an inverse scale parent")
        }
    }

    fn factor_log_norm(&self, parents : &[Moments]) -> f64 {
        let (a, b) = (&parents[0], &parents[1]);
        a[0]*b[1] - ln_gamma(a[0])
    }

    fn sample(&self, parents : &[Moments], rng : &mut StdRng) -> Moments {
        use rand_distr::Distribution;
        let (a, b) = (parents[0][0], parents[1][0]);
        assert!(a > 0.0 && b > 0.0, "Degenerate parameters (shape {}, inverse scale {}) informed for a gamma draw", a, b);
        let x = rand_distr::Gamma::new(a, b.recip()).unwrap().sample(rng);
        Moments::from_slice(&[x, x.ln()])
    }

    fn sufficient_stat(&self, y : &[f64]) -> Result<Moments, DomainError> {
        if y.len() != 1 {
            return Err(DomainError::Length { family : self.family(), expected : 1, found : y.len() });
        }
        if !y[0].is_finite() || y[0] <= 0.0 {
            return Err(DomainError::Support(y[0], self.family()));
        }
        Ok(Moments::from_slice(&[y[0], y[0].ln()]))
    }

    fn mean(&self, _np : &NaturalParameters, m : &Moments) -> DVector<f64> {
        DVector::from_element(1, m[0])
    }

    fn variance(&self, np : &NaturalParameters, _m : &Moments) -> DVector<f64> {
        let b = -np[0];
        let a = np[1] + 1.0;
        DVector::from_element(1, a / (b*b))
    }

    fn sq_mean(&self, np : &NaturalParameters, _m : &Moments) -> f64 {
        let b = -np[0];
        let a = np[1] + 1.0;
        a*(a + 1.0) / (b*b)
    }
}

#[test]
fn gamma_messages() {
    // Observed shape 2 (moments [2, ln 2]); inverse-scale parent with
    // moments (3, 0); child with moments (0.5, -0.8).
    let a = Moments::from_slice(&[2.0, 2f64.ln()]);
    let b = Moments::from_slice(&[3.0, 0.0]);
    let x = Moments::from_slice(&[0.5, -0.8]);
    let to_child = Gamma.np_to_child(&[a.clone(), b.clone()]);
    assert!((to_child[0] + 3.0).abs() < 1E-12 && (to_child[1] - 1.0).abs() < 1E-12);
    let to_iscale = Gamma.np_to_parent(1, &[a.clone(), b.clone()], &x);
    assert!((to_iscale[0] + 0.5).abs() < 1E-12 && (to_iscale[1] - 2.0).abs() < 1E-12);
    // <a ln b - ln Gamma(a)> with E[ln b] = 0
    assert!((Gamma.factor_log_norm(&[a, b]) + ln_gamma(2.0)).abs() < 1E-12);
}

#[test]
#[should_panic]
fn gamma_shape_message_is_rejected() {
    let a = Moments::from_slice(&[2.0, 2f64.ln()]);
    let b = Moments::from_slice(&[3.0, 0.0]);
    let x = Moments::from_slice(&[0.5, -0.8]);
    Gamma.np_to_parent(0, &[a, b], &x);
}

#[test]
fn gamma_moment_map() {
    // Natural parameter (-3, 1): shape 2, inverse scale 3
    let np = NaturalParameters::from_slice(&[-3.0, 1.0]);
    let m = Gamma.moments(&np);
    assert!((m[0] - 2.0/3.0).abs() < 1E-12);
    assert!((m[1] - (digamma(2.0) - 3f64.ln())).abs() < 1E-12);
    assert!((Gamma.log_norm(&np) - 2.0*3f64.ln()).abs() < 1E-12);
    assert!((Gamma.variance(&np, &m)[0] - 2.0/9.0).abs() < 1E-12);
    assert!((Gamma.sq_mean(&np, &m) - 2.0/3.0).abs() < 1E-12);
}
