use rand::Rng;
use rand::rngs::StdRng;
use rand_distr;
use rand_distr::Distribution;

/// Draw from a gaussian with the informed mean and precision conditioned on
/// the result being nonnegative. Around and above zero mean this is plain
/// rejection from the parent gaussian; once the acceptance region moves past
/// one standard deviation into the tail the loop switches to the
/// shifted-exponential proposal (Robert's truncated-normal sampler), whose
/// acceptance rate stays near one arbitrarily far out.
pub fn truncated_normal(mean : f64, prec : f64, rng : &mut StdRng) -> f64 {
    assert!(prec > 0.0, "Nonpositive precision {} informed for a truncated normal draw", prec);
    let sigma = prec.sqrt().recip();
    let alpha = -mean / sigma;
    if alpha < 1.0 {
        let norm = rand_distr::Normal::new(mean, sigma).unwrap();
        loop {
            let x = norm.sample(rng);
            if x >= 0.0 {
                return x;
            }
        }
    } else {
        let lambda = 0.5*(alpha + (alpha*alpha + 4.0).sqrt());
        let exp = rand_distr::Exp::new(lambda).unwrap();
        loop {
            let y = alpha + exp.sample(rng);
            let rho = (-0.5*(y - lambda)*(y - lambda)).exp();
            if rng.gen::<f64>() < rho {
                return mean + sigma*y;
            }
        }
    }
}

/// Draw a probability vector from a Dirichlet with the informed
/// concentrations, by normalizing independent gamma variates. Avoids any
/// dedicated simplex sampler: only the gamma draw is needed, and the
/// normalization is exact.
pub fn dirichlet(u : &[f64], rng : &mut StdRng) -> Vec<f64> {
    let mut g : Vec<f64> = u.iter()
        .map(|ui| rand_distr::Gamma::new(*ui, 1.0).unwrap().sample(rng) )
        .collect();
    let total : f64 = g.iter().sum();
    assert!(total > 0.0, "Dirichlet draw underflowed for concentrations {:?}", u);
    for gi in g.iter_mut() {
        *gi /= total;
    }
    g
}

#[test]
fn truncated_draws_are_nonnegative() {
    use rand::SeedableRng;
    let mut rng = StdRng::seed_from_u64(7);
    for mean in [-50.0, -5.0, -1.0, 0.0, 2.0].iter() {
        for _ in 0..200 {
            let x = truncated_normal(*mean, 4.0, &mut rng);
            assert!(x >= 0.0 && x.is_finite());
        }
    }
}

#[test]
fn truncated_mean_matches_half_normal() {
    use rand::SeedableRng;
    let mut rng = StdRng::seed_from_u64(21);
    let n = 4000;
    let mut sum = 0.0;
    for _ in 0..n {
        sum += truncated_normal(0.0, 1.0, &mut rng);
    }
    let expected = (2.0 / std::f64::consts::PI).sqrt();
    assert!((sum / n as f64 - expected).abs() < 0.05);
}

#[test]
fn dirichlet_draws_live_on_the_simplex() {
    use rand::SeedableRng;
    let mut rng = StdRng::seed_from_u64(3);
    for _ in 0..100 {
        let pi = dirichlet(&[1.1, 0.5, 3.0, 2.2], &mut rng);
        assert!(pi.len() == 4);
        assert!((pi.iter().sum::<f64>() - 1.0).abs() < 1E-12);
        assert!(pi.iter().all(|p| *p >= 0.0 ));
    }
}

#[test]
fn seeded_draws_are_reproducible() {
    use rand::SeedableRng;
    let mut a = StdRng::seed_from_u64(11);
    let mut b = StdRng::seed_from_u64(11);
    for _ in 0..50 {
        assert!(truncated_normal(-3.0, 1.0, &mut a) == truncated_normal(-3.0, 1.0, &mut b));
    }
}
