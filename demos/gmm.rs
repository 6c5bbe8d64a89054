use rand::rngs::StdRng;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_distr::Distribution;
use vmp::graph::*;
use vmp::distr::*;
use vmp::fit::{self, RunOptions};

/// Mixture of two gaussians with latent means, latent precisions and latent
/// mixing proportions, fitted to two synthetic clusters. Run with
/// RUST_LOG=debug to watch the bound climb.
fn main() -> Result<(), anyhow::Error> {
    env_logger::init();

    let mut rng = StdRng::seed_from_u64(100);
    let clusters = [
        (rand_distr::Normal::new(-4.0, 0.7).unwrap(), 120),
        (rand_distr::Normal::new(2.5, 0.5).unwrap(), 80)
    ];
    let mut data = Vec::new();
    for (cluster, n) in clusters.iter() {
        for _ in 0..*n {
            data.push(cluster.sample(&mut rng));
        }
    }
    data.shuffle(&mut rng);

    let mut g = Graph::seeded(101);
    let t0 = g.observed(&Gamma, "t0", &[1E-2])?;
    let m_lo = g.observed(&Normal, "m_lo", &[-1.0])?;
    let m_hi = g.observed(&Normal, "m_hi", &[1.0])?;
    let a0 = g.observed(&Gamma, "a0", &[1.0])?;
    let b0 = g.observed(&Gamma, "b0", &[1.0])?;

    let mut means = Vec::new();
    let mut precisions = Vec::new();
    for k in 0..2 {
        let mu = g.hidden(&Normal, &format!("mu{}", k))?;
        g.factor(&Normal, &[if k == 0 { m_lo } else { m_hi }, t0], mu)?;
        let tau = g.hidden(&Gamma, &format!("tau{}", k))?;
        g.factor(&Gamma, &[a0, b0], tau)?;
        means.push(mu);
        precisions.push(tau);
    }

    let alpha0 = g.observed(&Dirichlet, "alpha0", &[1.0, 1.0])?;
    let pi = g.hidden(&Dirichlet, "pi")?;
    g.factor(&Dirichlet, &[alpha0], pi)?;

    for (ix, y) in data.iter().enumerate() {
        let z = g.hidden(&Categorical, &format!("z{}", ix))?;
        g.factor(&Categorical, &[pi], z)?;
        let node = g.observed(&Normal, &format!("y{}", ix), &[*y])?;
        g.mixture(&means, &precisions, z, node)?;
    }

    let fit = fit::run(&g, &RunOptions::default());
    println!("{}", serde_json::to_string_pretty(&fit)?);
    for id in means.iter().chain(precisions.iter()) {
        println!("{}", serde_json::to_string_pretty(&fit::posterior(&g, *id))?);
    }
    println!("{}", serde_json::to_string_pretty(&fit::posterior(&g, pi))?);
    Ok(())
}
