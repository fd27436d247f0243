//! Market regime classification: trend direction, volatility band, and the
//! continuous diagnostics behind them (spec §4.2).
//!
//! Grounded in the teacher's `analysis::market_state::MarketState`
//! fingerprint-from-prefix style (compute everything off a bounded
//! trailing window, never mutate across calls) and the classification-
//! ladder idiom from `other_examples/11c311f2_orc2626-tech-sBot9999`'s
//! regime detector.

use serde::{Deserialize, Serialize};

use crate::config::RegimeConfig;
use crate::config::constants::MIN_REGIME_BARS;
use crate::domain::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Uptrend,
    Downtrend,
    Ranging,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Volatility {
    Low,
    Normal,
    High,
}

/// The combined `{trend}+{volatility}` label used by the scorer's
/// `suppressedRegimes`/`regimeThresholdOverrides` maps (spec §4.4).
pub struct RegimeLabel;

impl RegimeLabel {
    pub fn of(trend: Trend, volatility: Volatility) -> String {
        let t = match trend {
            Trend::Uptrend => "uptrend",
            Trend::Downtrend => "downtrend",
            Trend::Ranging => "ranging",
        };
        let v = match volatility {
            Volatility::Low => "low",
            Volatility::Normal => "normal",
            Volatility::High => "high",
        };
        format!("{t}+{v}")
    }

    /// Used by `ScorerConfig::validate` (spec §7 `ConfigError`:
    /// "suppressed regimes referencing unknown labels").
    pub fn is_known(label: &str) -> bool {
        let Some((t, v)) = label.split_once('+') else {
            return false;
        };
        matches!(t, "uptrend" | "downtrend" | "ranging") && matches!(v, "low" | "normal" | "high")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketRegime {
    pub trend: Trend,
    pub volatility: Volatility,
    pub efficiency: f64,
    pub atr_percent: f64,
    pub atr_percentile: f64,
    pub trend_strength: f64,
    pub directional_index: f64,
    pub confidence: f64,
}

impl MarketRegime {
    pub fn label(&self) -> String {
        RegimeLabel::of(self.trend, self.volatility)
    }

    fn default_regime() -> Self {
        Self {
            trend: Trend::Ranging,
            volatility: Volatility::Normal,
            efficiency: 0.0,
            atr_percent: 0.0,
            atr_percentile: 0.0,
            trend_strength: 0.0,
            directional_index: 0.0,
            confidence: 0.0,
        }
    }
}

fn efficiency_ratio(window: &[Candle]) -> f64 {
    let n = window.len();
    if n < 2 {
        return 0.0;
    }
    let net = (window[n - 1].close - window[0].close).abs();
    let volatility_sum: f64 = window.windows(2).map(|w| (w[1].close - w[0].close).abs()).sum();
    if volatility_sum <= f64::EPSILON {
        0.0
    } else {
        (net / volatility_sum).clamp(0.0, 1.0)
    }
}

/// Wilder-style average true range over `window`, where `window[0]` supplies
/// only the previous close for the first true-range calculation.
fn wilder_atr(window: &[Candle]) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }
    let trs: Vec<f64> = window
        .windows(2)
        .map(|w| w[1].true_range(w[0].close))
        .collect();
    if trs.is_empty() {
        return 0.0;
    }
    let mut atr = trs[0];
    for tr in &trs[1..] {
        atr = (atr * (trs.len() as f64 - 1.0) + tr) / trs.len() as f64;
    }
    atr
}

/// Simplified ADX-style directional index over `window`.
fn directional_index(window: &[Candle]) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }
    let (mut plus_dm, mut minus_dm) = (0.0, 0.0);
    for pair in window.windows(2) {
        let up_move = pair[1].high - pair[0].high;
        let down_move = pair[0].low - pair[1].low;
        if up_move > down_move && up_move > 0.0 {
            plus_dm += up_move;
        }
        if down_move > up_move && down_move > 0.0 {
            minus_dm += down_move;
        }
    }
    let total = plus_dm + minus_dm;
    if total <= f64::EPSILON {
        0.0
    } else {
        ((plus_dm - minus_dm) / total).abs()
    }
}

fn normalized_slope(window: &[Candle]) -> f64 {
    let n = window.len();
    if n < 2 {
        return 0.0;
    }
    let avg_price = window.iter().map(|c| c.close).sum::<f64>() / n as f64;
    if avg_price <= f64::EPSILON {
        return 0.0;
    }
    let raw = (window[n - 1].close - window[0].close) / (avg_price * n as f64);
    (raw * n as f64).clamp(-1.0, 1.0)
}

/// Sample historical `atrPercent` at a stride derived from the available
/// history and return the fraction of samples at or below the current
/// value (spec §4.2 "ATR percentile").
fn atr_percentile(candles: &[Candle], end: usize, atr_period: usize, history_bars: usize, current: f64) -> f64 {
    let history_start = end.saturating_sub(history_bars);
    let span = end.saturating_sub(history_start);
    if span == 0 {
        return 0.5;
    }
    let stride = (span / 50).max(1);

    let mut samples = Vec::new();
    let mut idx = history_start + atr_period;
    while idx <= end {
        let window = &candles[idx.saturating_sub(atr_period)..=idx];
        let atr = wilder_atr(window);
        let close = candles[idx].close;
        if close > f64::EPSILON {
            samples.push(atr / close);
        }
        idx += stride;
    }

    if samples.is_empty() {
        return 0.5;
    }
    let at_or_below = samples.iter().filter(|&&s| s <= current).count();
    at_or_below as f64 / samples.len() as f64
}

/// Classify the regime of the prefix `candles[..=end]` (spec §4.2). Returns
/// the documented default regime when fewer than `MIN_REGIME_BARS` bars
/// are available.
pub fn classify_regime(candles: &[Candle], end: usize, config: &RegimeConfig) -> MarketRegime {
    if end + 1 < MIN_REGIME_BARS {
        return MarketRegime::default_regime();
    }

    let trend_start = (end + 1).saturating_sub(config.trend_lookback);
    let trend_window = &candles[trend_start..=end];
    let efficiency = efficiency_ratio(trend_window);

    let atr_start = (end + 1).saturating_sub(config.atr_period + 1);
    let atr_window = &candles[atr_start..=end];
    let atr = wilder_atr(atr_window);
    let atr_percent = if candles[end].close > f64::EPSILON {
        atr / candles[end].close
    } else {
        0.0
    };
    let percentile = atr_percentile(candles, end, config.atr_period, config.percentile_history_bars, atr_percent);

    let di_start = (end + 1).saturating_sub(config.di_period + 1);
    let di = directional_index(&candles[di_start..=end]);

    let slope = normalized_slope(trend_window);
    let trend_strength = (efficiency + di + slope.abs()) / 3.0;

    let trend = if efficiency < config.ranging_threshold && trend_strength < 0.3 {
        Trend::Ranging
    } else if efficiency >= config.trending_threshold || trend_strength >= 0.4 {
        if slope >= 0.0 { Trend::Uptrend } else { Trend::Downtrend }
    } else if slope.abs() > 0.3 {
        if slope >= 0.0 { Trend::Uptrend } else { Trend::Downtrend }
    } else {
        Trend::Ranging
    };

    let volatility = if percentile < 0.3 {
        Volatility::Low
    } else if percentile > 0.7 {
        Volatility::High
    } else {
        Volatility::Normal
    };

    let trend_boundary_distance = match trend {
        Trend::Ranging => (config.ranging_threshold - efficiency).abs().min(1.0),
        _ => (trend_strength - 0.3).clamp(0.0, 1.0),
    };
    let vol_boundary_distance = (percentile - 0.5).abs() * 2.0;
    let confidence = (trend_boundary_distance.max(0.0) * vol_boundary_distance.max(0.0)).sqrt();

    MarketRegime {
        trend,
        volatility,
        efficiency,
        atr_percent,
        atr_percentile: percentile,
        trend_strength,
        directional_index: di,
        confidence: confidence.clamp(0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(ts: i64, close: f64) -> Candle {
        Candle {
            timestamp_ms: ts,
            open: close,
            high: close + 0.2,
            low: close - 0.2,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn too_few_bars_returns_default() {
        let candles: Vec<Candle> = (0..5).map(|i| candle(i, 100.0 + i as f64)).collect();
        let regime = classify_regime(&candles, 4, &RegimeConfig::default());
        assert_eq!(regime.trend, Trend::Ranging);
        assert_eq!(regime.confidence, 0.0);
    }

    #[test]
    fn diagnostics_stay_within_bounds() {
        let candles: Vec<Candle> = (0..60)
            .map(|i| candle(i, 100.0 + (i as f64 * 0.3).sin() * 5.0 + i as f64 * 0.1))
            .collect();
        let regime = classify_regime(&candles, 59, &RegimeConfig::default());
        assert!((0.0..=1.0).contains(&regime.efficiency));
        assert!((0.0..=1.0).contains(&regime.atr_percentile));
        assert!((0.0..=1.0).contains(&regime.directional_index));
        assert!((0.0..=1.0).contains(&regime.confidence));
    }

    #[test]
    fn strong_uptrend_is_classified_uptrend() {
        let candles: Vec<Candle> = (0..60).map(|i| candle(i, 100.0 + i as f64 * 2.0)).collect();
        let regime = classify_regime(&candles, 59, &RegimeConfig::default());
        assert_eq!(regime.trend, Trend::Uptrend);
    }
}
