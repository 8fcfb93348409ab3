//! Scalar statistics helpers evaluated in log space.

/// Natural log of `k!`, accumulated directly.
///
/// Jump counts are bounded by the proposal's truncation limit, so direct
/// summation is both exact enough and cheap.
fn ln_factorial(k: u32) -> f64 {
    let mut acc = 0.0;
    for i in 2..=k {
        acc += f64::from(i).ln();
    }
    acc
}

/// Log probability mass of a Poisson distribution at `k`.
///
/// A zero mean is handled exactly: all mass sits at `k = 0`.
pub fn poisson_ln_pmf(mean: f64, k: u32) -> f64 {
    if mean <= 0.0 {
        return if k == 0 { 0.0 } else { f64::NEG_INFINITY };
    }
    f64::from(k) * mean.ln() - mean - ln_factorial(k)
}

/// Probability mass of a Poisson distribution at `k`.
pub fn poisson_pmf(mean: f64, k: u32) -> f64 {
    poisson_ln_pmf(mean, k).exp()
}
