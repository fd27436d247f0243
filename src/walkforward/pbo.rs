//! Probability of Backtest Overfitting via Combinatorially Symmetric
//! Cross-Validation (spec §4.6).

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::config::constants::PBO_FAIL_THRESHOLD;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PboResult {
    pub probability: f64,
    pub fails: bool,
    pub splits_evaluated: usize,
}

/// `per_config_window_returns[config][window]` holds one config's return
/// series for each window. For each of the `C(n,2)` ways to split windows
/// into equal halves, the config with the best in-sample (first half)
/// Sharpe is checked against its out-of-sample (second half) rank; PBO is
/// the fraction of splits where that rank's logit is `<= 0` (median or
/// worse).
pub fn probability_of_backtest_overfitting(per_config_window_returns: &[Vec<Vec<f64>>]) -> Option<PboResult> {
    let n_configs = per_config_window_returns.len();
    if n_configs < 2 {
        return None;
    }
    let n_windows = per_config_window_returns[0].len();
    if n_windows < 2 {
        return None;
    }

    let mut splits = 0usize;
    let mut below_median = 0usize;

    // Every way to split the window indices into two equal halves — the
    // "combinatorially symmetric" part of CSCV.
    for is_indices in (0..n_windows).combinations(n_windows / 2) {
        let in_sample: std::collections::HashSet<usize> = is_indices.iter().copied().collect();
        let oos_indices: Vec<usize> = (0..n_windows).filter(|w| !in_sample.contains(w)).collect();

        let sharpe_of = |config: usize, indices: &[usize]| -> f64 {
            let returns: Vec<f64> = indices
                .iter()
                .flat_map(|&w| per_config_window_returns[config][w].iter().copied())
                .collect();
            super::sharpe_ratio(&returns, crate::config::AssetClass::Crypto)
        };

        let best_is_config = (0..n_configs)
            .max_by(|&a, &b| sharpe_of(a, &is_indices).partial_cmp(&sharpe_of(b, &is_indices)).unwrap())
            .unwrap();

        let mut oos_sharpes: Vec<(usize, f64)> = (0..n_configs).map(|c| (c, sharpe_of(c, &oos_indices))).collect();
        oos_sharpes.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

        let rank = oos_sharpes.iter().position(|&(c, _)| c == best_is_config).unwrap();
        let percentile = (rank as f64 + 0.5) / n_configs as f64;
        let logit = (percentile / (1.0 - percentile)).ln();

        splits += 1;
        if logit <= 0.0 {
            below_median += 1;
        }
    }

    if splits == 0 {
        return None;
    }

    let probability = below_median as f64 / splits as f64;
    Some(PboResult {
        probability,
        fails: probability > PBO_FAIL_THRESHOLD,
        splits_evaluated: splits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_configs_give_high_pbo() {
        let returns = vec![vec![0.01], vec![-0.01], vec![0.02], vec![0.0]];
        let per_config = vec![returns.clone(), returns.clone()];
        let result = probability_of_backtest_overfitting(&per_config).unwrap();
        assert!((0.0..=1.0).contains(&result.probability));
    }

    #[test]
    fn too_few_windows_returns_none() {
        let per_config = vec![vec![vec![0.01]], vec![vec![0.02]]];
        assert!(probability_of_backtest_overfitting(&per_config).is_none());
    }
}
