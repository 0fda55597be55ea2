// Numerical primitives shared by the model, the sampler and the simulators.

pub fn logistic(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

/// Log of the gamma function for x > 0 (Lanczos approximation).
pub fn ln_gamma(x: f64) -> f64 {
    const COEFS: [f64; 6] = [
        76.18009172947146,
        -86.50532032941677,
        24.01409824083091,
        -1.231739572450155,
        0.1208650973866179e-2,
        -0.5395239384953e-5,
    ];
    let mut y = x;
    let mut tmp = x + 5.5;
    tmp -= (x + 0.5) * tmp.ln();
    let mut ser = 1.000000000190015;
    for c in COEFS.iter() {
        y += 1.0;
        ser += c / y;
    }
    -tmp + (2.5066282746310005 * ser / x).ln()
}

pub fn normal_ln_pdf(x: f64, mean: f64, sd: f64) -> f64 {
    let z = (x - mean) / sd;
    -0.5 * (2.0 * std::f64::consts::PI).ln() - sd.ln() - 0.5 * z * z
}

/// Log density of Beta(a, b) at x. The shapes must be positive.
pub fn beta_ln_pdf(x: f64, a: f64, b: f64) -> f64 {
    ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + (a - 1.0) * x.ln() + (b - 1.0) * (1.0 - x).ln()
}

pub fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        None
    } else {
        Some(xs.iter().sum::<f64>() / xs.len() as f64)
    }
}

/// Population standard deviation (no degrees of freedom correction).
pub fn std_dev(xs: &[f64]) -> Option<f64> {
    let m = mean(xs)?;
    let var = xs.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / xs.len() as f64;
    Some(var.sqrt())
}

pub fn median(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n % 2 == 1 {
        Some(sorted[n / 2])
    } else {
        Some(0.5 * (sorted[n / 2 - 1] + sorted[n / 2]))
    }
}

/// Percentile q (in percent) of sorted data, interpolating linearly between
/// the closest ranks. None for empty data.
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 {
        return None;
    }
    let pos = (q / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Effective sample size of a chain accounting for autocorrelation.
///
/// ESS = N / (1 + 2 * sum_k rho_k), summing lags until the autocorrelation
/// drops under 0.05.
pub fn effective_sample_size(chain: &[f64]) -> f64 {
    let n = chain.len();
    if n < 2 {
        return n as f64;
    }
    let m = chain.iter().sum::<f64>() / n as f64;
    let var = chain.iter().map(|x| (x - m) * (x - m)).sum::<f64>() / n as f64;
    if var < 1e-12 {
        return n as f64;
    }
    let mut sum_rho = 0.0;
    for k in 1..=(n / 2).min(200) {
        let rho = autocorrelation(chain, k, m, var);
        if rho < 0.05 {
            break;
        }
        sum_rho += rho;
    }
    n as f64 / (1.0 + 2.0 * sum_rho)
}

fn autocorrelation(chain: &[f64], k: usize, mean: f64, var: f64) -> f64 {
    let n = chain.len();
    if k >= n {
        return 0.0;
    }
    let cov = (0..(n - k))
        .map(|i| (chain[i] - mean) * (chain[i + k] - mean))
        .sum::<f64>()
        / (n - k) as f64;
    cov / var
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ln_gamma_matches_factorials() {
        assert!((ln_gamma(1.0)).abs() < 1e-9);
        assert!((ln_gamma(5.0) - 24f64.ln()).abs() < 1e-9);
        assert!((ln_gamma(0.5) - std::f64::consts::PI.sqrt().ln()).abs() < 1e-9);
    }

    #[test]
    fn beta_uniform_density() {
        assert!(beta_ln_pdf(0.3, 1.0, 1.0).abs() < 1e-9);
        // Beta(2, 2) density at 0.5 is 1.5
        assert!((beta_ln_pdf(0.5, 2.0, 2.0) - 1.5f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn logistic_is_inverse_of_logit() {
        for p in [0.01, 0.3, 0.5, 0.77, 0.999] {
            assert!((logistic(logit(p)) - p).abs() < 1e-12);
        }
        assert_eq!(logistic(-1000.0), 0.0);
        assert_eq!(logistic(1000.0), 1.0);
    }

    #[test]
    fn percentile_interpolates() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&xs, 0.0), Some(1.0));
        assert_eq!(percentile(&xs, 100.0), Some(4.0));
        assert!((percentile(&xs, 50.0).unwrap() - 2.5).abs() < 1e-12);
        assert!((percentile(&xs, 25.0).unwrap() - 1.75).abs() < 1e-12);
        assert_eq!(percentile(&[0.3], 97.5), Some(0.3));
        assert_eq!(percentile(&[], 50.0), None);
    }

    #[test]
    fn median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn ess_of_correlated_chain_is_smaller() {
        let chain: Vec<f64> = (0..400).map(|i| ((i / 20) % 2) as f64).collect();
        let ess = effective_sample_size(&chain);
        assert!(ess > 0.0);
        assert!(ess < 400.0);
    }
}
