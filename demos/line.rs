use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::Distribution;
use vmp::graph::*;
use vmp::distr::*;
use vmp::expr::*;
use vmp::fit::{self, RunOptions};

/// Straight-line regression where the predicted response is a deterministic
/// product-sum of latent coefficients and an observed covariate. The noise
/// precision is inferred jointly with the coefficients.
fn main() -> Result<(), anyhow::Error> {
    env_logger::init();

    let mut rng = StdRng::seed_from_u64(42);
    let noise = rand_distr::Normal::new(0.0, 0.25).unwrap();
    let points : Vec<(f64, f64)> = (0..40)
        .map(|i| {
            let x = i as f64 / 4.0;
            (x, 1.8 * x - 0.6 + noise.sample(&mut rng))
        }).collect();

    let mut g = Graph::seeded(43);
    let m0 = g.observed(&Normal, "m0", &[0.0])?;
    let t0 = g.observed(&Gamma, "t0", &[1E-2])?;
    let a0 = g.observed(&Gamma, "a0", &[1.0])?;
    let b0 = g.observed(&Gamma, "b0", &[1.0])?;

    let slope = g.hidden(&Normal, "slope")?;
    g.factor(&Normal, &[m0, t0], slope)?;
    let intercept = g.hidden(&Normal, "intercept")?;
    g.factor(&Normal, &[m0, t0], intercept)?;
    let prec = g.hidden(&Gamma, "prec")?;
    g.factor(&Gamma, &[a0, b0], prec)?;

    for (ix, (x, y)) in points.iter().enumerate() {
        let cov = g.observed(&Normal, &format!("x{}", ix), &[*x])?;
        let pred = g.deterministic(&format!("pred{}", ix))?;
        let expr = Placeholder(0) * Placeholder(1) + Placeholder(2);
        g.calculation(expr, Context::new(&[slope, cov, intercept]), pred)?;
        let node = g.observed(&Normal, &format!("y{}", ix), &[*y])?;
        g.factor(&Normal, &[pred, prec], node)?;
    }

    let fit = fit::run(&g, &RunOptions::default());
    println!("{}", serde_json::to_string_pretty(&fit)?);
    for id in [slope, intercept, prec].iter() {
        println!("{}", serde_json::to_string_pretty(&fit::posterior(&g, *id))?);
    }
    Ok(())
}
