/// Special functions (gamma family, error functions, normal tail ratios)
/// backing the moment maps and log-partitions.
pub mod special;

/// Numerically stable log of a sum of exponentials. Used wherever a vector
/// lives on the log scale (Categorical natural parameters, Dirichlet
/// expectations) and has to be normalized without leaving that scale.
pub fn log_sum_exp(s : &[f64]) -> f64 {
    assert!(s.len() > 0);
    let max = s.iter().fold(f64::NEG_INFINITY, |m, v| m.max(*v) );
    if !max.is_finite() {
        return max;
    }
    max + s.iter().map(|v| (v - max).exp() ).sum::<f64>().ln()
}

#[test]
fn log_sum_exp_is_shift_invariant() {
    let a = log_sum_exp(&[1.0, 2.0, 3.0]);
    let b = log_sum_exp(&[1001.0, 1002.0, 1003.0]);
    assert!((b - a - 1000.0).abs() < 1E-8);
    let direct = (1f64.exp() + 2f64.exp() + 3f64.exp()).ln();
    assert!((a - direct).abs() < 1E-10);
}
