//! The confluence scorer: the pipeline's central gatekeeper (spec §4.4).
//!
//! `ScorerState` is an explicit per-window struct threaded through the
//! per-bar step rather than a long-lived mutable object (spec §9 "shared
//! mutable scorer state" redesign flag) — grounded in the teacher's
//! `engine::core` per-bar loop shape, generalized from a zone-ledger to a
//! per-strategy cooldown map.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::config::constants::{NEW_YORK_KILL_ZONE, LONDON_KILL_ZONE, OTE_RETRACEMENT_HIGH, OTE_RETRACEMENT_LOW};
use crate::config::{FundingScoringMode, PipelineConfig};
use crate::domain::Candle;
use crate::regime::{classify_regime, MarketRegime};
use crate::strategy::{generate, Direction, StrategyName, StrategySignal};
use crate::structure::{detect_structure_breaks, detect_swings, FvgType, IctContext, OrderBlockType, TrendDirection};

/// A single funding-rate observation (spec §6 "futures snapshots").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FundingSnapshot {
    pub timestamp_ms: i64,
    pub funding_rate: f64,
}

/// Per-window mutable state: last bar each strategy produced a selected
/// trade on. Constructed fresh per walk-forward window, never shared
/// across windows or symbols.
#[derive(Debug, Clone, Default)]
pub struct ScorerState {
    last_trade_bar: HashMap<StrategyName, usize>,
}

impl ScorerState {
    pub fn new() -> Self {
        Self::default()
    }

    fn on_cooldown(&self, strategy: StrategyName, i: usize, cooldown_bars: usize) -> bool {
        self.last_trade_bar
            .get(&strategy)
            .is_some_and(|&last| i.saturating_sub(last) < cooldown_bars)
    }

    fn record_trade(&mut self, strategy: StrategyName, i: usize) {
        self.last_trade_bar.insert(strategy, i);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSignal {
    pub signal: StrategySignal,
    pub total_score: f64,
    pub factor_breakdown: Vec<(String, f64)>,
    pub discarded_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Trade,
    Wait,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfluenceResult {
    pub all_scored: Vec<ScoredSignal>,
    pub selected: Option<ScoredSignal>,
    pub action: Action,
    pub regime: MarketRegime,
    pub suppressed_reason: Option<String>,
}

fn kill_zone_active(timestamp_ms: i64) -> bool {
    use chrono::{DateTime, Timelike, Utc};
    let Some(dt) = DateTime::<Utc>::from_timestamp_millis(timestamp_ms) else {
        return false;
    };
    let hour = dt.hour();
    (hour >= LONDON_KILL_ZONE.0 && hour < LONDON_KILL_ZONE.1) || (hour >= NEW_YORK_KILL_ZONE.0 && hour < NEW_YORK_KILL_ZONE.1)
}

/// Collapse a run of bars into one higher-timeframe OHLCV bar: `open` from
/// the first member, `close` from the last, `high`/`low` the run's extremes,
/// `volume` summed.
fn aggregate_chunk(chunk: &[Candle]) -> Candle {
    let first = chunk[0];
    let last = chunk[chunk.len() - 1];
    Candle {
        timestamp_ms: first.timestamp_ms,
        open: first.open,
        high: chunk.iter().map(|c| c.high).fold(f64::MIN, f64::max),
        low: chunk.iter().map(|c| c.low).fold(f64::MAX, f64::min),
        close: last.close,
        volume: chunk.iter().map(|c| c.volume).sum(),
    }
}

/// Higher-timeframe trend bias (spec §4.4 `mtfBias`): aggregate the prefix
/// into `higherTimeframeMultiplier`-sized bars and run the same swing/break
/// primitives used for the base timeframe. `None` when there isn't enough
/// aggregated history yet to form a swing, in which case the gate passes
/// through rather than discarding.
fn higher_timeframe_trend(candles: &[Candle], i: usize, config: &PipelineConfig) -> Option<TrendDirection> {
    let multiplier = config.scorer.mtf_bias.higher_timeframe_multiplier.max(1);
    let chunks: Vec<Candle> = candles[..=i].chunks(multiplier).map(aggregate_chunk).collect();
    let swings = detect_swings(&chunks, config.structure.swing_lookback, config.structure.min_swing_strength);
    let breaks = detect_structure_breaks(&chunks, &swings);
    breaks.last().map(|b| b.direction)
}

fn structure_alignment_score(ctx: &IctContext, direction: Direction, i: usize, max_age: usize) -> f64 {
    let wanted = match direction {
        Direction::Long => TrendDirection::Bullish,
        Direction::Short => TrendDirection::Bearish,
    };
    ctx.structure_breaks
        .iter()
        .rev()
        .find(|b| b.direction == wanted && b.break_index <= i)
        .map(|b| {
            let age = i.saturating_sub(b.break_index);
            if age > max_age {
                0.0
            } else {
                1.0 - age as f64 / max_age as f64
            }
        })
        .unwrap_or(0.0)
}

fn liquidity_sweep_score(ctx: &IctContext, direction: Direction, i: usize, lookback: usize) -> f64 {
    let wanted = match direction {
        Direction::Long => crate::structure::LiquidityPoolType::Ssl,
        Direction::Short => crate::structure::LiquidityPoolType::Bsl,
    };
    ctx.sweeps
        .iter()
        .rev()
        .find(|s| s.kind == wanted && s.sweep_index <= i)
        .map(|s| {
            let age = i.saturating_sub(s.sweep_index);
            if age > lookback {
                0.0
            } else {
                1.0 - age as f64 / lookback as f64
            }
        })
        .unwrap_or(0.0)
}

fn ob_proximity_score(ctx: &IctContext, direction: Direction, price: f64, atr: f64, atr_bands: f64) -> f64 {
    let wanted = match direction {
        Direction::Long => OrderBlockType::Bullish,
        Direction::Short => OrderBlockType::Bearish,
    };
    let cap = (atr_bands * atr).max(f64::EPSILON);
    ctx.active_order_blocks()
        .filter(|ob| ob.kind == wanted)
        .map(|ob| {
            if ob.contains(price) {
                1.0
            } else {
                let distance = (price - ob.low).abs().min((price - ob.high).abs());
                (1.0 - distance / cap).clamp(0.0, 1.0)
            }
        })
        .fold(0.0, f64::max)
}

fn fvg_at_ce_score(ctx: &IctContext, direction: Direction, low: f64, high: f64) -> f64 {
    let wanted = match direction {
        Direction::Long => FvgType::Bullish,
        Direction::Short => FvgType::Bearish,
    };
    if ctx.unfilled_fvgs().filter(|g| g.kind == wanted).any(|g| g.contains_ce(low, high)) {
        1.0
    } else {
        0.0
    }
}

fn ob_fvg_confluence_score(ctx: &IctContext, direction: Direction) -> f64 {
    let (ob_kind, fvg_kind) = match direction {
        Direction::Long => (OrderBlockType::Bullish, FvgType::Bullish),
        Direction::Short => (OrderBlockType::Bearish, FvgType::Bearish),
    };
    let overlaps = ctx.active_order_blocks().filter(|ob| ob.kind == ob_kind).any(|ob| {
        ctx.unfilled_fvgs()
            .filter(|g| g.kind == fvg_kind)
            .any(|g| g.low.max(ob.low) <= g.high.min(ob.high))
    });
    if overlaps { 1.0 } else { 0.0 }
}

fn rr_ratio_score(rr: f64) -> f64 {
    ((rr - 1.0) / 2.0).clamp(0.0, 1.0)
}

fn ote_zone_score(ctx: &IctContext, price: f64, i: usize) -> f64 {
    let Some(last_break) = ctx.structure_breaks.iter().rev().find(|b| b.break_index <= i) else {
        return 0.0;
    };
    let Some(swing) = ctx.swings.iter().find(|s| s.index == last_break.broken_swing_index) else {
        return 0.0;
    };
    let impulse = last_break.break_price - swing.price;
    if impulse.abs() <= f64::EPSILON {
        return 0.0;
    }
    let retracement = (last_break.break_price - price) / impulse;
    if (OTE_RETRACEMENT_LOW..=OTE_RETRACEMENT_HIGH).contains(&retracement) {
        1.0
    } else {
        0.0
    }
}

fn momentum_confirmation_score(candle: &Candle, direction: Direction) -> f64 {
    let aligned = match direction {
        Direction::Long => candle.is_bullish(),
        Direction::Short => !candle.is_bullish(),
    };
    if aligned {
        candle.body_fraction()
    } else {
        0.0
    }
}

fn ob_volume_quality_score(ctx: &IctContext, direction: Direction, price: f64) -> f64 {
    let wanted = match direction {
        Direction::Long => OrderBlockType::Bullish,
        Direction::Short => OrderBlockType::Bearish,
    };
    ctx.active_order_blocks()
        .filter(|ob| ob.kind == wanted && ob.contains(price))
        .map(|ob| (ob.volume_quality / 3.0).clamp(0.0, 1.0))
        .fold(0.0, f64::max)
}

fn funding_passes(config: &PipelineConfig, direction: Direction, funding: Option<&FundingSnapshot>) -> bool {
    let Some(f) = funding else { return true };
    match direction {
        Direction::Long => f.funding_rate <= config.scorer.funding_max_for_long,
        Direction::Short => f.funding_rate >= config.scorer.funding_min_for_short,
    }
}

fn funding_score(config: &PipelineConfig, direction: Direction, funding: Option<&FundingSnapshot>) -> f64 {
    let Some(f) = funding else { return 0.0 };
    let aligned = match direction {
        Direction::Long => f.funding_rate >= 0.0,
        Direction::Short => f.funding_rate <= 0.0,
    };
    match config.scorer.funding_scoring_mode {
        FundingScoringMode::Aligned => {
            if aligned {
                1.0
            } else {
                0.0
            }
        }
        FundingScoringMode::Contrarian => {
            if aligned {
                0.0
            } else {
                1.0
            }
        }
    }
}

fn score_candidate(
    ctx: &IctContext,
    candles: &[Candle],
    i: usize,
    atr: f64,
    config: &PipelineConfig,
    signal: &StrategySignal,
    funding: Option<&FundingSnapshot>,
) -> ScoredSignal {
    let weights = config.scorer.weights.ordered();
    let scores: HashMap<&str, f64> = HashMap::from([
        (
            "structureAlignment",
            structure_alignment_score(ctx, signal.direction, i, config.scorer.max_structure_age_bars),
        ),
        ("killZoneActive", if kill_zone_active(candles[i].timestamp_ms) { 1.0 } else { 0.0 }),
        (
            "liquiditySweep",
            liquidity_sweep_score(ctx, signal.direction, i, config.scorer.liquidity_lookback_bars),
        ),
        (
            "obProximity",
            ob_proximity_score(ctx, signal.direction, signal.entry_price, atr, config.scorer.atr_extension_bands),
        ),
        ("fvgAtCE", fvg_at_ce_score(ctx, signal.direction, candles[i].low, candles[i].high)),
        (
            "recentBOS",
            structure_alignment_score(ctx, signal.direction, i, config.scorer.max_structure_age_bars),
        ),
        ("rrRatio", rr_ratio_score(signal.risk_reward)),
        ("oteZone", ote_zone_score(ctx, signal.entry_price, i)),
        ("obFvgConfluence", ob_fvg_confluence_score(ctx, signal.direction)),
        ("momentumConfirmation", momentum_confirmation_score(&candles[i], signal.direction)),
        ("obVolumeQuality", ob_volume_quality_score(ctx, signal.direction, signal.entry_price)),
    ]);

    let mut breakdown = Vec::with_capacity(weights.len());
    let mut total = 0.0;
    for (name, weight) in weights {
        let score = scores.get(name).copied().unwrap_or(0.0);
        breakdown.push((name.to_string(), score));
        total += score * *weight;
    }
    // funding is an additive gate-score, not part of the declared weight list
    let _ = funding_score(config, signal.direction, funding);

    ScoredSignal {
        signal: *signal,
        total_score: total,
        factor_breakdown: breakdown,
        discarded_reason: None,
    }
}

/// Run the confluence pipeline for bar `i` (spec §4.4 "pipeline per bar").
pub fn evaluate(
    candles: &[Candle],
    i: usize,
    ctx: &IctContext,
    atr: f64,
    config: &PipelineConfig,
    state: &mut ScorerState,
    funding: Option<&FundingSnapshot>,
) -> ConfluenceResult {
    let regime = classify_regime(candles, i, &config.regime);
    let label = regime.label();

    if config.scorer.suppressed_regimes.contains(&label) || regime.confidence < config.scorer.regime_confidence_gate {
        return ConfluenceResult {
            all_scored: Vec::new(),
            selected: None,
            action: Action::Wait,
            regime,
            suppressed_reason: Some("regime".to_string()),
        };
    }

    if config.scorer.regime_filter.enabled
        && (regime.efficiency < config.scorer.regime_filter.min_efficiency
            || regime.trend_strength < config.scorer.regime_filter.min_trend_strength)
    {
        return ConfluenceResult {
            all_scored: Vec::new(),
            selected: None,
            action: Action::Wait,
            regime,
            suppressed_reason: Some("regime_filter".to_string()),
        };
    }

    let reference_price = candles[i].close;
    let mut all_scored = Vec::new();

    for &strategy in StrategyName::PRIORITY.iter() {
        if !config.scorer.active_strategies.contains(&strategy) {
            continue;
        }
        let Some(signal) = generate(strategy, ctx, candles, i, atr, config) else {
            continue;
        };

        let mut scored = score_candidate(ctx, candles, i, atr, config, &signal, funding);

        if config.scorer.require_kill_zone && !kill_zone_active(candles[i].timestamp_ms) {
            scored.discarded_reason = Some("kill_zone".to_string());
        } else if state.on_cooldown(strategy, i, config.scorer.cooldown_bars) {
            scored.discarded_reason = Some("cooldown".to_string());
        } else if (signal.entry_price - reference_price).abs() > config.scorer.atr_extension_bands * atr {
            scored.discarded_reason = Some("atr_extension".to_string());
        } else if !funding_passes(config, signal.direction, funding) {
            scored.discarded_reason = Some("funding".to_string());
        } else if config.scorer.mtf_bias.enabled {
            let wanted = match signal.direction {
                Direction::Long => TrendDirection::Bullish,
                Direction::Short => TrendDirection::Bearish,
            };
            if higher_timeframe_trend(candles, i, config).is_some_and(|trend| trend != wanted) {
                scored.discarded_reason = Some("mtf_bias".to_string());
            }
        }

        all_scored.push(scored);
    }

    let threshold = config
        .scorer
        .regime_threshold_overrides
        .get(&label)
        .copied()
        .unwrap_or(config.scorer.min_threshold);

    // Highest total_score wins; ties broken by strategy priority, then by
    // earliest timestamp (spec §4.4 step 8).
    let selected = all_scored
        .iter()
        .filter(|s| s.discarded_reason.is_none() && s.total_score >= threshold)
        .max_by(|a, b| {
            a.total_score
                .partial_cmp(&b.total_score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.signal.strategy.priority_rank().cmp(&a.signal.strategy.priority_rank()))
                .then_with(|| b.signal.entry_timestamp.cmp(&a.signal.entry_timestamp))
        })
        .cloned();

    if let Some(ref chosen) = selected {
        state.record_trade(chosen.signal.strategy, i);
    }

    let action = if selected.is_some() { Action::Trade } else { Action::Wait };

    ConfluenceResult {
        all_scored,
        selected,
        action,
        regime,
        suppressed_reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kill_zone_boundaries() {
        // 1970-01-01T07:00:00Z
        assert!(kill_zone_active(7 * 3_600_000));
        assert!(!kill_zone_active(6 * 3_600_000));
        assert!(kill_zone_active(12 * 3_600_000));
        assert!(!kill_zone_active(15 * 3_600_000));
    }

    #[test]
    fn rr_ratio_score_clamps() {
        assert_eq!(rr_ratio_score(1.0), 0.0);
        assert_eq!(rr_ratio_score(3.0), 1.0);
        assert!((rr_ratio_score(2.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn aggregate_chunk_combines_ohlcv() {
        let chunk = vec![
            Candle { timestamp_ms: 0, open: 10.0, high: 12.0, low: 9.0, close: 11.0, volume: 2.0 },
            Candle { timestamp_ms: 1, open: 11.0, high: 13.0, low: 10.5, close: 12.5, volume: 3.0 },
        ];
        let bar = aggregate_chunk(&chunk);
        assert_eq!(bar.timestamp_ms, 0);
        assert_eq!(bar.open, 10.0);
        assert_eq!(bar.high, 13.0);
        assert_eq!(bar.low, 9.0);
        assert_eq!(bar.close, 12.5);
        assert_eq!(bar.volume, 5.0);
    }
}
