use nalgebra::*;
use super::*;
use rand::rngs::StdRng;
use crate::message::{Moments, NaturalParameters};
use crate::calc::special::*;

/// Gaussian truncated at zero, for nonnegative magnitudes (scales, rates,
/// intensities) that should still live in the gaussian message space. The
/// sufficient statistics and both parent messages coincide with the normal
/// family: the truncation only changes where the posterior mass sits, so it
/// enters through the moment map and the log-partitions. Writing z for the
/// posterior mean measured in posterior standard deviations, the truncated
/// moments are
///
/// E[x]   = m + s r(z)
/// E[x^2] = m^2 + s^2 + m s r(z)
///
/// with r the tail ratio phi/Phi. The ratio is the numerically delicate
/// part: the evaluation splits at |z| = 15 between the direct erfc form and
/// the tail asymptotics (see calc::special::norm_tail_ratio).
#[derive(Debug, Clone, Copy)]
pub struct RectifiedNormal;

impl Model for RectifiedNormal {

    fn family(&self) -> Family {
        Family::RectifiedNormal
    }

    fn n_parents(&self) -> usize {
        2
    }

    fn parent_family(&self, role : usize) -> Family {
        match role {
            0 => Family::Normal,
            1 => Family::Gamma,
            _ => panic!("The rectified normal family takes a mean and a precision parent")
        }
    }

    fn conjugate_role(&self, _role : usize) -> bool {
        true
    }

    fn moments(&self, np : &NaturalParameters) -> Moments {
        let beta = -2.0*np[1];
        assert!(beta > 0.0, "Nonpositive posterior precision {} at a rectified normal node", beta);
        let m = np[0] / beta;
        let s = beta.sqrt().recip();
        let r = norm_tail_ratio(m / s);
        Moments::from_slice(&[m + s*r, m*m + s*s + m*s*r])
    }

    fn log_norm(&self, np : &NaturalParameters) -> f64 {
        let beta = -2.0*np[1];
        let m = np[0] / beta;
        0.5*(beta.ln() - beta*m*m - LN_2_PI) - ln_std_norm_cdf(m*beta.sqrt())
    }

    fn np_to_child(&self, parents : &[Moments]) -> NaturalParameters {
        Normal.np_to_child(parents)
    }

    fn np_to_parent(&self, role : usize, parents : &[Moments], child : &Moments) -> NaturalParameters {
        Normal.np_to_parent(role, parents, child)
    }

    /// Expected log-partition of the conditional. The truncation correction
    /// <ln Phi(mu sqrt(beta))> has no closed form under the parent posteriors
    /// and is evaluated at the parent means instead; this touches only the
    /// reported bound, never a message.
    fn factor_log_norm(&self, parents : &[Moments]) -> f64 {
        let (mu, beta) = (&parents[0], &parents[1]);
        0.5*(beta[1] - beta[0]*mu[1] - LN_2_PI) - ln_std_norm_cdf(mu[0]*beta[0].sqrt())
    }

    fn sample(&self, parents : &[Moments], rng : &mut StdRng) -> Moments {
        let (mean, prec) = (parents[0][0], parents[1][0]);
        assert!(prec > 0.0, "Nonpositive precision {} informed for a rectified normal draw", prec);
        let x = crate::sampling::truncated_normal(mean, prec, rng);
        Moments::from_slice(&[x, x*x])
    }

    fn sufficient_stat(&self, y : &[f64]) -> Result<Moments, DomainError> {
        if y.len() != 1 {
            return Err(DomainError::Length { family : self.family(), expected : 1, found : y.len() });
        }
        if !y[0].is_finite() || y[0] < 0.0 {
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
fn rectified_moments_stay_positive() {
    // Mass pushed far below zero: the truncated mean approaches zero from
    // above and the asymptotic branch must keep it finite and positive.
    for mean in [-200.0, -50.0, -20.0, -5.0, -0.5, 0.0, 0.5, 5.0].iter() {
        let np = NaturalParameters::from_slice(&[*mean, -0.5]);
        let m = RectifiedNormal.moments(&np);
        assert!(m[0] > 0.0 && m[0].is_finite());
        assert!(m[1] >= m[0]*m[0]);
    }
}

#[test]
fn rectified_matches_normal_when_mass_is_positive() {
    // Mean at +30 standard deviations: the truncation is irrelevant and the
    // moment map must agree with the plain gaussian one.
    let np = NaturalParameters::from_slice(&[30.0, -0.5]);
    let rect = RectifiedNormal.moments(&np);
    let norm = Normal.moments(&np);
    assert!((rect[0] - norm[0]).abs() < 1E-9);
    assert!((rect[1] - norm[1]).abs() < 1E-9);
    assert!((RectifiedNormal.log_norm(&np) - Normal.log_norm(&np)).abs() < 1E-9);
}

#[test]
fn rectified_branch_crossover_is_smooth() {
    let beta = 1.0;
    let eps = 1E-6;
    let below = NaturalParameters::from_slice(&[beta*(-15.0 - eps), -0.5*beta]);
    let above = NaturalParameters::from_slice(&[beta*(-15.0 + eps), -0.5*beta]);
    let (mb, ma) = (RectifiedNormal.moments(&below), RectifiedNormal.moments(&above));
    assert!(((mb[0] - ma[0]) / ma[0]).abs() < 1E-4);
}

#[test]
fn rectified_half_normal_mean() {
    // Zero mean and unit precision: E[x] = sqrt(2/pi), E[x^2] = 1
    let np = NaturalParameters::from_slice(&[0.0, -0.5]);
    let m = RectifiedNormal.moments(&np);
    assert!((m[0] - (2.0/std::f64::consts::PI).sqrt()).abs() < 1E-10);
    assert!((m[1] - 1.0).abs() < 1E-10);
}
