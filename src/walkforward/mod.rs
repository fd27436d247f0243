//! Walk-forward window generation, per-window evaluation, and the PBO/DSR
//! overfitting diagnostics (spec §4.6).
//!
//! Grounded in the teacher's `engine::backtest` train/holdout slide loop,
//! enriched with `statrs` (already a teacher dependency) for the DSR
//! haircut's skewness/kurtosis/normal-CDF.

mod dsr;
mod pbo;

pub use dsr::{deflated_sharpe_ratio, DsrResult};
pub use pbo::{probability_of_backtest_overfitting, PboResult};

use serde::{Deserialize, Serialize};

use crate::config::constants::{CATASTROPHIC_SHARPE, MIN_POSITIVE_WINDOWS};
use crate::config::{AssetClass, PipelineConfig};
use crate::domain::CandleSeries;
use crate::error::InputError;
use crate::scorer::{self, FundingSnapshot, ScorerState};
use crate::simulator::simulate_position;
use crate::structure::IctContext;
use crate::utils::mean_and_stddev;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub train_start: usize,
    pub val_start: usize,
    pub val_end: usize,
}

/// Generate walk-forward windows over a series of `total_bars` (spec
/// §4.6 "window generation").
pub fn generate_windows(total_bars: usize, config: &crate::config::WalkForwardConfig) -> Vec<WindowBounds> {
    let mut windows = Vec::new();
    let mut offset = 0usize;
    loop {
        let val_start = offset + config.train_window_bars;
        let val_end = val_start + config.val_window_bars;
        if val_end > total_bars {
            break;
        }
        let train_start = offset.saturating_sub(config.lookback_buffer);
        windows.push(WindowBounds { train_start, val_start, val_end });
        offset += config.slide_step_bars;
    }
    windows
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WindowStatus {
    Evaluated,
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowResult {
    pub bounds: WindowBounds,
    pub status: WindowStatus,
    pub trades: Vec<crate::simulator::TradeResult>,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
}

fn equity_curve(returns: &[f64]) -> Vec<f64> {
    let mut equity = 1.0;
    let mut curve = Vec::with_capacity(returns.len());
    for r in returns {
        equity *= 1.0 + r;
        curve.push(equity);
    }
    curve
}

/// Max drawdown over the equity curve built from `returns` (spec §4.6).
pub fn max_drawdown(returns: &[f64]) -> f64 {
    let curve = equity_curve(returns);
    let mut peak = 1.0_f64;
    let mut worst = 0.0_f64;
    for &equity in &curve {
        peak = peak.max(equity);
        let drawdown = (peak - equity) / peak;
        worst = worst.max(drawdown);
    }
    worst
}

/// Per-trade Sharpe ratio, annualized by the asset class's periods-per-
/// year (spec §4.6, §8 "NumericEdge": degenerate series return 0, or
/// 0.01 if the lone return is positive).
pub fn sharpe_ratio(returns: &[f64], asset_class: AssetClass) -> f64 {
    let n = returns.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return if returns[0] > 0.0 { 0.01 } else { 0.0 };
    }
    let (mean, std) = mean_and_stddev(returns);
    if std <= f64::EPSILON {
        return 0.0;
    }
    mean / std * asset_class.annualization_factor()
}

fn win_rate(trades: &[crate::simulator::TradeResult]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let wins = trades.iter().filter(|t| t.pnl_percent > 0.0).count();
    wins as f64 / trades.len() as f64
}

/// Evaluate one window: runs the full per-bar pipeline over `train_start
/// ..val_end`, keeping only trades whose entry falls within
/// `[val_start, val_end)` (spec §4.6 "must return only trades whose entry
/// falls within the validation slice").
pub fn evaluate_window(
    series: &CandleSeries,
    bounds: WindowBounds,
    config: &PipelineConfig,
    asset_class: AssetClass,
    funding: &[FundingSnapshot],
) -> Result<WindowResult, InputError> {
    if bounds.val_end > series.len() {
        return Err(InputError::InsufficientBars {
            needed: bounds.val_end,
            have: series.len(),
        });
    }

    let candles = series.slice(bounds.train_start, bounds.val_end);
    let val_start_local = bounds.val_start - bounds.train_start;
    let val_end_local = bounds.val_end - bounds.train_start;

    let mut state = ScorerState::new();
    let mut trades = Vec::new();
    let mut open_until = 0usize;

    for i in val_start_local..val_end_local {
        if i < open_until {
            continue;
        }
        let ctx = IctContext::build(&candles[..=i], config);
        let atr = average_true_range_tail(&candles[..=i], config.regime.atr_period);
        let fund = nearest_funding(funding, candles[i].timestamp_ms);

        let result = scorer::evaluate(candles, i, &ctx, atr, config, &mut state, fund.as_ref());
        let Some(scored) = result.selected else { continue };

        if let Some(trade) = simulate_position(candles, &scored.signal, &config.simulator, &config.structure) {
            let bars_held = trade.bars_held.max(1);
            open_until = i + bars_held + 1;
            trades.push(trade);
        }
    }

    let val_trades = trades;

    if val_trades.is_empty() {
        return Ok(WindowResult {
            bounds,
            status: WindowStatus::Skip,
            trades: val_trades,
            sharpe: 0.0,
            max_drawdown: 0.0,
            win_rate: 0.0,
        });
    }

    let returns: Vec<f64> = val_trades.iter().map(|t| t.pnl_percent).collect();
    Ok(WindowResult {
        bounds,
        status: WindowStatus::Evaluated,
        sharpe: sharpe_ratio(&returns, asset_class),
        max_drawdown: max_drawdown(&returns),
        win_rate: win_rate(&val_trades),
        trades: val_trades,
    })
}

fn average_true_range_tail(candles: &[crate::domain::Candle], period: usize) -> f64 {
    let n = candles.len();
    if n < 2 {
        return 0.0;
    }
    let start = n.saturating_sub(period + 1);
    let window = &candles[start..];
    let trs: Vec<f64> = window.windows(2).map(|w| w[1].true_range(w[0].close)).collect();
    if trs.is_empty() {
        0.0
    } else {
        trs.iter().sum::<f64>() / trs.len() as f64
    }
}

fn nearest_funding(funding: &[FundingSnapshot], timestamp_ms: i64) -> Option<FundingSnapshot> {
    funding.iter().rev().find(|f| f.timestamp_ms <= timestamp_ms).copied()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolWfResult {
    pub symbol: String,
    pub windows: Vec<WindowResult>,
    pub passed: bool,
    pub fail_reasons: Vec<String>,
}

/// Apply the per-symbol pass rules (spec §4.6 "pass rules per symbol",
/// §9 `min(7, totalEligible)` reduction).
pub fn evaluate_symbol_pass(symbol: String, windows: Vec<WindowResult>) -> SymbolWfResult {
    let eligible: Vec<&WindowResult> = windows.iter().filter(|w| w.status == WindowStatus::Evaluated).collect();
    let total_eligible = eligible.len();

    let positive_count = eligible.iter().filter(|w| w.sharpe > 0.0).count();
    let required = MIN_POSITIVE_WINDOWS.min(total_eligible);

    let mut fail_reasons = Vec::new();
    if total_eligible > 0 && positive_count < required {
        fail_reasons.push(format!(
            "only {positive_count}/{total_eligible} windows had positive Sharpe (need {required})"
        ));
    }
    if let Some(worst) = eligible.iter().map(|w| w.sharpe).fold(None, |acc: Option<f64>, s| {
        Some(acc.map_or(s, |a| a.min(s)))
    }) {
        if worst < CATASTROPHIC_SHARPE {
            fail_reasons.push(format!("catastrophic window Sharpe {worst:.2} < {CATASTROPHIC_SHARPE}"));
        }
    }

    SymbolWfResult {
        symbol,
        passed: fail_reasons.is_empty(),
        fail_reasons,
        windows,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardResult {
    pub symbols: Vec<SymbolWfResult>,
    pub overall_pass: bool,
    pub pass_rate: f64,
    pub pbo: Option<PboResult>,
}

pub fn aggregate(symbols: Vec<SymbolWfResult>, pbo: Option<PboResult>) -> WalkForwardResult {
    let overall_pass = symbols.iter().all(|s| s.passed);

    let mut eligible_total = 0usize;
    let mut eligible_passing = 0usize;
    for symbol in &symbols {
        for window in &symbol.windows {
            if window.status == WindowStatus::Evaluated {
                eligible_total += 1;
                if window.sharpe > 0.0 {
                    eligible_passing += 1;
                }
            }
        }
    }
    let pass_rate = if eligible_total == 0 { 0.0 } else { eligible_passing as f64 / eligible_total as f64 };

    WalkForwardResult { symbols, overall_pass, pass_rate, pbo }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WalkForwardConfig;

    #[test]
    fn window_generation_respects_buffer_and_step() {
        let config = WalkForwardConfig {
            train_window_bars: 100,
            val_window_bars: 20,
            slide_step_bars: 20,
            lookback_buffer: 10,
        };
        let windows = generate_windows(200, &config);
        assert!(!windows.is_empty());
        assert_eq!(windows[0].val_start, 100);
        assert_eq!(windows[0].val_end, 120);
        assert_eq!(windows[0].train_start, 0);
    }

    #[test]
    fn sharpe_degenerate_cases() {
        assert_eq!(sharpe_ratio(&[], AssetClass::Crypto), 0.0);
        assert_eq!(sharpe_ratio(&[0.01], AssetClass::Crypto), 0.01);
        assert_eq!(sharpe_ratio(&[-0.01], AssetClass::Crypto), 0.0);
        assert_eq!(sharpe_ratio(&[0.01, 0.01, 0.01], AssetClass::Crypto), 0.0);
    }

    #[test]
    fn sharpe_scale_invariance() {
        let returns = vec![0.01, -0.005, 0.02, 0.0, -0.01];
        let base = sharpe_ratio(&returns, AssetClass::Forex);
        let scaled: Vec<f64> = returns.iter().map(|r| r * 3.0).collect();
        let scaled_sharpe = sharpe_ratio(&scaled, AssetClass::Forex);
        assert!((base - scaled_sharpe).abs() < 1e-9);
    }

    #[test]
    fn min_positive_windows_reduces_to_total_eligible() {
        let windows = vec![WindowResult {
            bounds: WindowBounds { train_start: 0, val_start: 0, val_end: 1 },
            status: WindowStatus::Evaluated,
            trades: Vec::new(),
            sharpe: 0.5,
            max_drawdown: 0.0,
            win_rate: 1.0,
        }];
        let result = evaluate_symbol_pass("TEST".to_string(), windows);
        assert!(result.passed);
    }
}
