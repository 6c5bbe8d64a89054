use nalgebra::*;
use super::*;
use rand::rngs::StdRng;
use rand_distr;
use crate::message::{Moments, NaturalParameters};
use crate::calc::special::LN_2_PI;

/// Gaussian family over the sufficient statistics [x, x^2], parameterized by
/// a mean parent (gaussian-distributed, or any node whose first two moments
/// are [E[mu], E[mu^2]]) and a precision parent (gamma-distributed, moments
/// [E[beta], E[ln beta]]). The conditional ln p(x | mu, beta) is linear in
/// each neighbor's sufficient statistics once the other two are averaged
/// out, which is what makes every message below a closed-form expectation:
/// toward the data the coefficients are [E[beta] E[mu], -E[beta]/2]; toward
/// the mean the data and the mean swap places; toward the precision the
/// message collects minus half the expected squared deviation and a count
/// of one half.
#[derive(Debug, Clone, Copy)]
pub struct Normal;

impl Model for Normal {

    fn family(&self) -> Family {
        Family::Normal
    }

    fn n_parents(&self) -> usize {
        2
    }

    fn parent_family(&self, role : usize) -> Family {
        match role {
            0 => Family::Normal,
            1 => Family::Gamma,
            _ => panic!("The normal family takes a mean and a precision parent")
        }
    }

    fn conjugate_role(&self, _role : usize) -> bool {
        true
    }

    fn moments(&self, np : &NaturalParameters) -> Moments {
        let beta = -2.0*np[1];
        assert!(beta > 0.0, "Nonpositive posterior precision {} at a normal node", beta);
        let mean = np[0] / beta;
        Moments::from_slice(&[mean, mean*mean + 1.0/beta])
    }

    fn log_norm(&self, np : &NaturalParameters) -> f64 {
        let beta = -2.0*np[1];
        let mean = np[0] / beta;
        0.5*(beta.ln() - beta*mean*mean - LN_2_PI)
    }

    fn np_to_child(&self, parents : &[Moments]) -> NaturalParameters {
        let (mu, beta) = (&parents[0], &parents[1]);
        NaturalParameters::from_slice(&[beta[0]*mu[0], -0.5*beta[0]])
    }

    fn np_to_parent(&self, role : usize, parents : &[Moments], child : &Moments) -> NaturalParameters {
        match role {
            0 => {
                let beta = &parents[1];
                NaturalParameters::from_slice(&[beta[0]*child[0], -0.5*beta[0]])
            },
            1 => {
                let mu = &parents[0];
                let dev = child[1] - 2.0*child[0]*mu[0] + mu[1];
                NaturalParameters::from_slice(&[-0.5*dev, 0.5])
            },
            _ => panic!("The normal family takes a mean and a precision parent")
        }
    }

    fn factor_log_norm(&self, parents : &[Moments]) -> f64 {
        let (mu, beta) = (&parents[0], &parents[1]);
        0.5*(beta[1] - beta[0]*mu[1] - LN_2_PI)
    }

    fn sample(&self, parents : &[Moments], rng : &mut StdRng) -> Moments {
        use rand_distr::Distribution;
        let (mean, prec) = (parents[0][0], parents[1][0]);
        assert!(prec > 0.0, "Nonpositive precision {} informed for a normal draw", prec);
        let x = rand_distr::Normal::new(mean, prec.sqrt().recip()).unwrap().sample(rng);
        Moments::from_slice(&[x, x*x])
    }

    fn sufficient_stat(&self, y : &[f64]) -> Result<Moments, DomainError> {
        if y.len() != 1 {
            return Err(DomainError::Length { family : self.family(), expected : 1, found : y.len() });
        }
        if !y[0].is_finite() {
            return Err(DomainError::Support(y[0], self.family()));
        }
        Ok(Moments::from_slice(&[y[0], y[0]*y[0]]))
    }

    fn mean(&self, _np : &NaturalParameters, m : &Moments) -> DVector<f64> {
        DVector::from_element(1, m[0])
    }

    fn variance(&self, _np : &NaturalParameters, m : &Moments) -> DVector<f64> {
        DVector::from_element(1, m[1] - m[0]*m[0])
    }

    fn sq_mean(&self, _np : &NaturalParameters, m : &Moments) -> f64 {
        m[1]
    }
}

#[test]
fn normal_messages() {
    // Mean parent with moments (2, 5); precision parent with moments (3, 6);
    // child with moments (4, 17).
    let mu = Moments::from_slice(&[2.0, 5.0]);
    let beta = Moments::from_slice(&[3.0, 6.0]);
    let x = Moments::from_slice(&[4.0, 17.0]);
    let to_child = Normal.np_to_child(&[mu.clone(), beta.clone()]);
    assert!((to_child[0] - 6.0).abs() < 1E-12 && (to_child[1] + 1.5).abs() < 1E-12);
    let to_mean = Normal.np_to_parent(0, &[mu.clone(), beta.clone()], &x);
    assert!((to_mean[0] - 12.0).abs() < 1E-12 && (to_mean[1] + 1.5).abs() < 1E-12);
    let to_prec = Normal.np_to_parent(1, &[mu, beta], &x);
    assert!((to_prec[0] + 3.0).abs() < 1E-12 && (to_prec[1] - 0.5).abs() < 1E-12);
    // The child message round-trips through the moment map: expected mean
    // 2 under expected precision 3
    let m = Normal.moments(&to_child);
    assert!((m[0] - 2.0).abs() < 1E-12 && (m[1] - (4.0 + 1.0/3.0)).abs() < 1E-12);
}

#[test]
fn normal_moment_map() {
    // Natural parameter [beta mean, -beta/2] with mean 1.5 and precision 4
    let np = NaturalParameters::from_slice(&[6.0, -2.0]);
    let m = Normal.moments(&np);
    assert!((m[0] - 1.5).abs() < 1E-12);
    assert!((m[1] - (1.5*1.5 + 0.25)).abs() < 1E-12);
    // Standard normal log-partition is -ln(2 pi)/2
    let std = NaturalParameters::from_slice(&[0.0, -0.5]);
    assert!((Normal.log_norm(&std) + 0.5*LN_2_PI).abs() < 1E-12);
}
