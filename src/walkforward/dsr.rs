//! Deflated Sharpe Ratio: Bailey & de Prado's haircut for the Sharpe ratio
//! under multiple-trial testing (spec §4.6).

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DsrResult {
    pub observed_sharpe: f64,
    pub deflated_sharpe: f64,
    pub expected_max_sharpe: f64,
    pub passes: bool,
}

fn skewness(returns: &[f64], mean: f64, std: f64) -> f64 {
    let n = returns.len() as f64;
    if std <= f64::EPSILON || n < 3.0 {
        return 0.0;
    }
    returns.iter().map(|r| ((r - mean) / std).powi(3)).sum::<f64>() / n
}

fn excess_kurtosis(returns: &[f64], mean: f64, std: f64) -> f64 {
    let n = returns.len() as f64;
    if std <= f64::EPSILON || n < 4.0 {
        return 0.0;
    }
    returns.iter().map(|r| ((r - mean) / std).powi(4)).sum::<f64>() / n - 3.0
}

/// Expected maximum Sharpe across `num_trials` independent candidate
/// configurations, under i.i.d. normal assumptions (Bailey & de Prado).
fn expected_max_sharpe(num_trials: usize, sharpe_std: f64) -> f64 {
    if num_trials <= 1 {
        return 0.0;
    }
    let normal = Normal::new(0.0, 1.0).expect("standard normal is always valid");
    let euler_mascheroni = 0.5772156649_f64;
    let n = num_trials as f64;
    let quantile = |p: f64| normal.inverse_cdf(p);
    let term1 = (1.0 - euler_mascheroni) * quantile(1.0 - 1.0 / n);
    let term2 = euler_mascheroni * quantile(1.0 - 1.0 / (n * std::f64::consts::E));
    sharpe_std * (term1 + term2)
}

/// Deflate `observed_sharpe`, computed from `num_trades` per-trade returns
/// with the given `skew`/`kurtosis`, by the number of independent trials
/// (`num_trials`) conducted during development (spec §4.6).
pub fn deflated_sharpe_ratio(returns: &[f64], observed_sharpe: f64, num_trials: usize) -> DsrResult {
    let n = returns.len() as f64;
    if returns.len() < 2 {
        return DsrResult {
            observed_sharpe,
            deflated_sharpe: 0.0,
            expected_max_sharpe: 0.0,
            passes: false,
        };
    }

    let (mean, std) = crate::utils::mean_and_stddev(returns);

    let skew = skewness(returns, mean, std);
    let kurt = excess_kurtosis(returns, mean, std);

    // Sharpe's own sampling standard deviation under non-normal returns
    // (Bailey & de Prado / Mertens 2002).
    let sr_variance =
        (1.0 - skew * observed_sharpe + (kurt / 4.0) * observed_sharpe.powi(2)) / (n - 1.0);
    let sr_std = sr_variance.max(0.0).sqrt();

    let sharpe_std_across_trials = if num_trials > 1 { sr_std } else { 0.0 };
    let sr0 = expected_max_sharpe(num_trials, sharpe_std_across_trials);

    let normal = Normal::new(0.0, 1.0).expect("standard normal is always valid");
    let z = if sr_std > f64::EPSILON { (observed_sharpe - sr0) / sr_std } else { 0.0 };
    let deflated = normal.cdf(z);

    DsrResult {
        observed_sharpe,
        deflated_sharpe: deflated,
        expected_max_sharpe: sr0,
        passes: deflated > 0.5 && observed_sharpe > 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_few_trades_fails() {
        let result = deflated_sharpe_ratio(&[0.01], 0.01, 1);
        assert!(!result.passes);
    }

    #[test]
    fn single_trial_deflates_to_the_plain_normal_cdf() {
        let returns: Vec<f64> = (0..50).map(|i| 0.01 + (i as f64 * 0.001)).collect();
        let observed = 2.0;
        let result = deflated_sharpe_ratio(&returns, observed, 1);
        assert!((0.0..=1.0).contains(&result.deflated_sharpe));
    }
}
