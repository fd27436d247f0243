//! The closed enumeration of strategy signal generators (spec §4.3, §9's
//! "dynamic strategy dispatch" redesign flag): a `StrategyName` tagged
//! variant plus a static registry of per-variant generator functions,
//! replacing the reference's runtime-polymorphic "Strategy" objects with a
//! finite implementor set known at configuration time.

use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::config::constants::ASIAN_SESSION;
use crate::config::{PipelineConfig, SlMode};
use crate::domain::Candle;
use crate::structure::{BreakKind, FvgType, IctContext, LiquidityPoolType, OrderBlockType, TrendDirection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum StrategyName {
    OrderBlock,
    Fvg,
    BosContinuation,
    ChochReversal,
    AsianRangeGold,
}

impl StrategyName {
    /// Priority order for the scorer's tie-break (spec §4.4 step 8),
    /// highest first.
    pub const PRIORITY: [StrategyName; 5] = [
        StrategyName::OrderBlock,
        StrategyName::Fvg,
        StrategyName::BosContinuation,
        StrategyName::ChochReversal,
        StrategyName::AsianRangeGold,
    ];

    pub fn all() -> [StrategyName; 5] {
        Self::PRIORITY
    }

    pub fn priority_rank(&self) -> usize {
        Self::PRIORITY.iter().position(|s| s == self).unwrap_or(usize::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrategySignal {
    pub strategy: StrategyName,
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub risk_reward: f64,
    pub entry_index: usize,
    pub entry_timestamp: i64,
}

impl StrategySignal {
    pub fn risk_distance(&self) -> f64 {
        (self.entry_price - self.stop_loss).abs()
    }
}

fn apply_sl_mode(
    direction: Direction,
    entry: f64,
    structural_sl: f64,
    atr: f64,
    config: &PipelineConfig,
) -> (f64, f64) {
    let sim = &config.simulator;
    let min_rr = config.scorer.min_signal_rr;
    match sim.sl_mode {
        SlMode::ObBased => {
            let buffer = atr * 0.1;
            let sl = structural_sl - direction.sign() * buffer;
            let risk = (entry - sl).abs();
            let tp = entry + direction.sign() * risk * min_rr;
            (sl, tp)
        }
        SlMode::EntryBased => {
            let sl = entry * (1.0 - direction.sign() * sim.sl_percent);
            let risk = (entry - sl).abs();
            let tp = entry + direction.sign() * risk * min_rr;
            (sl, tp)
        }
        SlMode::DynamicRr => {
            let risk = atr * sim.atr_sl_multiplier;
            let sl = entry - direction.sign() * risk;
            let tp = entry + direction.sign() * risk * min_rr;
            (sl, tp)
        }
    }
}

fn finalize(
    strategy: StrategyName,
    direction: Direction,
    entry: f64,
    structural_sl: f64,
    atr: f64,
    candles: &[Candle],
    i: usize,
    config: &PipelineConfig,
) -> Option<StrategySignal> {
    let (sl, tp) = apply_sl_mode(direction, entry, structural_sl, atr, config);
    let risk = (entry - sl).abs();
    if risk <= f64::EPSILON {
        return None;
    }
    let reward = (tp - entry).abs();
    let rr = reward / risk;
    if rr < config.scorer.min_signal_rr {
        return None;
    }
    Some(StrategySignal {
        strategy,
        direction,
        entry_price: entry,
        stop_loss: sl,
        take_profit: tp,
        risk_reward: rr,
        entry_index: i,
        entry_timestamp: candles[i].timestamp_ms,
    })
}

fn recent_bos_direction(ctx: &IctContext, i: usize, max_age: usize) -> Option<TrendDirection> {
    ctx.structure_breaks
        .iter()
        .rev()
        .find(|b| b.break_index <= i && i - b.break_index <= max_age)
        .map(|b| b.direction)
}

/// Price re-enters a fresh, unmitigated OB whose direction agrees with the
/// recent BOS (spec §4.3 table row 1).
pub fn order_block_signal(ctx: &IctContext, candles: &[Candle], i: usize, atr: f64, config: &PipelineConfig) -> Option<StrategySignal> {
    let bos_dir = recent_bos_direction(ctx, i, config.scorer.max_structure_age_bars)?;
    let price = candles[i].close;

    let ob = ctx
        .active_order_blocks()
        .filter(|ob| ob.formation_index < i)
        .filter(|ob| {
            matches!(
                (ob.kind, bos_dir),
                (OrderBlockType::Bullish, TrendDirection::Bullish) | (OrderBlockType::Bearish, TrendDirection::Bearish)
            )
        })
        .find(|ob| ob.contains(price))?;

    let direction = match ob.kind {
        OrderBlockType::Bullish => Direction::Long,
        OrderBlockType::Bearish => Direction::Short,
    };
    finalize(StrategyName::OrderBlock, direction, price, ob.far_side(), atr, candles, i, config)
}

/// Price tags the CE of an unfilled FVG aligned with the trend (spec §4.3
/// table row 2).
pub fn fvg_signal(ctx: &IctContext, candles: &[Candle], i: usize, atr: f64, config: &PipelineConfig) -> Option<StrategySignal> {
    let bos_dir = recent_bos_direction(ctx, i, config.scorer.max_structure_age_bars)?;
    let price = candles[i].close;

    let gap = ctx
        .unfilled_fvgs()
        .filter(|g| g.index < i)
        .filter(|g| {
            matches!(
                (g.kind, bos_dir),
                (FvgType::Bullish, TrendDirection::Bullish) | (FvgType::Bearish, TrendDirection::Bearish)
            )
        })
        .find(|g| g.contains_ce(candles[i].low, candles[i].high))?;

    let direction = match gap.kind {
        FvgType::Bullish => Direction::Long,
        FvgType::Bearish => Direction::Short,
    };
    let sl = match direction {
        Direction::Long => gap.low,
        Direction::Short => gap.high,
    };
    finalize(StrategyName::Fvg, direction, price, sl, atr, candles, i, config)
}

/// Close through the last opposite swing, with pullback into an OB or FVG
/// (spec §4.3 table row 3).
pub fn bos_continuation_signal(ctx: &IctContext, candles: &[Candle], i: usize, atr: f64, config: &PipelineConfig) -> Option<StrategySignal> {
    let last_break = ctx.structure_breaks.iter().rev().find(|b| b.kind == BreakKind::Bos && b.break_index <= i)?;
    if i.saturating_sub(last_break.break_index) > config.scorer.max_structure_age_bars {
        return None;
    }
    let price = candles[i].close;

    let pulled_back = ctx
        .active_order_blocks()
        .filter(|ob| ob.formation_index <= last_break.break_index)
        .any(|ob| ob.contains(price))
        || ctx.unfilled_fvgs().any(|g| g.contains_ce(candles[i].low, candles[i].high));
    if !pulled_back {
        return None;
    }

    let direction = match last_break.direction {
        TrendDirection::Bullish => Direction::Long,
        TrendDirection::Bearish => Direction::Short,
    };
    let broken_swing = ctx.swings.iter().find(|s| s.index == last_break.broken_swing_index)?;
    finalize(StrategyName::BosContinuation, direction, price, broken_swing.price, atr, candles, i, config)
}

/// CHoCH plus a confirming liquidity sweep in the new direction (spec §4.3
/// table row 4).
pub fn choch_reversal_signal(ctx: &IctContext, candles: &[Candle], i: usize, atr: f64, config: &PipelineConfig) -> Option<StrategySignal> {
    let choch = ctx.structure_breaks.iter().rev().find(|b| b.kind == BreakKind::Choch && b.break_index <= i)?;
    if i.saturating_sub(choch.break_index) > config.scorer.max_structure_age_bars {
        return None;
    }

    let expected_pool_kind = match choch.direction {
        TrendDirection::Bullish => LiquidityPoolType::Ssl,
        TrendDirection::Bearish => LiquidityPoolType::Bsl,
    };
    let sweep = ctx
        .sweeps
        .iter()
        .find(|s| s.kind == expected_pool_kind && s.sweep_index <= choch.break_index)?;

    let direction = match choch.direction {
        TrendDirection::Bullish => Direction::Long,
        TrendDirection::Bearish => Direction::Short,
    };
    let price = candles[i].close;
    finalize(StrategyName::ChochReversal, direction, price, sweep.wick_extreme, atr, candles, i, config)
}

/// Bar falls inside the Asian (Tokyo) range-formation session, UTC
/// hour-of-day half-open.
fn asian_session_active(timestamp_ms: i64) -> bool {
    use chrono::{DateTime, Timelike, Utc};
    let Some(dt) = DateTime::<Utc>::from_timestamp_millis(timestamp_ms) else {
        return false;
    };
    let hour = dt.hour();
    hour >= ASIAN_SESSION.0 && hour < ASIAN_SESSION.1
}

/// Price has moved at least `min_pct` away from the bar at `from_index`,
/// confirming a displacement move rather than drift.
fn displaced_since(candles: &[Candle], from_index: usize, i: usize, min_pct: f64) -> bool {
    if from_index >= i {
        return false;
    }
    let reference = candles[from_index].close;
    if reference.abs() <= f64::EPSILON {
        return false;
    }
    ((candles[i].close - reference) / reference).abs() >= min_pct
}

/// Asian-session range sweep followed by a London-open displacement move and
/// an FVG at CE, with gold's long-bias multiplier and a vol-scaled TP
/// distance rather than the shared RR-derived placement (spec §4.3 table
/// row 5).
pub fn asian_range_gold_signal(ctx: &IctContext, candles: &[Candle], i: usize, atr: f64, config: &PipelineConfig) -> Option<StrategySignal> {
    if asian_session_active(candles[i].timestamp_ms) {
        return None;
    }

    let sweep = ctx.sweeps.iter().rev().find(|s| s.sweep_index <= i && i - s.sweep_index <= 3)?;
    if !displaced_since(candles, sweep.sweep_index, i, config.asian_range_gold.min_displacement_pct) {
        return None;
    }

    let gap = ctx
        .unfilled_fvgs()
        .filter(|g| g.index <= i)
        .find(|g| g.contains_ce(candles[i].low, candles[i].high))?;

    let direction = match sweep.kind {
        LiquidityPoolType::Ssl => Direction::Long,
        LiquidityPoolType::Bsl => Direction::Short,
    };
    let gap_matches = matches!(
        (gap.kind, direction),
        (FvgType::Bullish, Direction::Long) | (FvgType::Bearish, Direction::Short)
    );
    if !gap_matches {
        return None;
    }

    let price = candles[i].close;
    finalize_asian_range_gold(direction, price, sweep.wick_extreme, atr, candles, i, config)
}

/// Gold-specific finalize: SL still derives from the swept structural level,
/// but TP is volatility-scaled off ATR rather than a flat RR multiple, and
/// longs get a bias multiplier reflecting gold's historical upside skew off
/// the Asian low.
fn finalize_asian_range_gold(
    direction: Direction,
    entry: f64,
    structural_sl: f64,
    atr: f64,
    candles: &[Candle],
    i: usize,
    config: &PipelineConfig,
) -> Option<StrategySignal> {
    let arg = &config.asian_range_gold;
    let buffer = atr * 0.1;
    let sl = structural_sl - direction.sign() * buffer;
    let risk = (entry - sl).abs();
    if risk <= f64::EPSILON {
        return None;
    }

    let bias = match direction {
        Direction::Long => arg.long_bias_multiplier,
        Direction::Short => 1.0,
    };
    let tp_distance = (atr * arg.tp_atr_multiplier).max(risk * config.scorer.min_signal_rr) * bias;
    let tp = entry + direction.sign() * tp_distance;
    let rr = (tp - entry).abs() / risk;
    if rr < config.scorer.min_signal_rr {
        return None;
    }

    Some(StrategySignal {
        strategy: StrategyName::AsianRangeGold,
        direction,
        entry_price: entry,
        stop_loss: sl,
        take_profit: tp,
        risk_reward: rr,
        entry_index: i,
        entry_timestamp: candles[i].timestamp_ms,
    })
}

/// Dispatch by `StrategyName` (spec §9: "a trait with a known finite set of
/// implementors and a static registry table indexed by `StrategyName`").
pub fn generate(
    name: StrategyName,
    ctx: &IctContext,
    candles: &[Candle],
    i: usize,
    atr: f64,
    config: &PipelineConfig,
) -> Option<StrategySignal> {
    match name {
        StrategyName::OrderBlock => order_block_signal(ctx, candles, i, atr, config),
        StrategyName::Fvg => fvg_signal(ctx, candles, i, atr, config),
        StrategyName::BosContinuation => bos_continuation_signal(ctx, candles, i, atr, config),
        StrategyName::ChochReversal => choch_reversal_signal(ctx, candles, i, atr, config),
        StrategyName::AsianRangeGold => asian_range_gold_signal(ctx, candles, i, atr, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order_matches_spec() {
        assert_eq!(StrategyName::OrderBlock.priority_rank(), 0);
        assert_eq!(StrategyName::AsianRangeGold.priority_rank(), 4);
        assert!(StrategyName::Fvg.priority_rank() < StrategyName::BosContinuation.priority_rank());
    }

    #[test]
    fn signal_below_min_rr_is_rejected() {
        let candles = vec![Candle {
            timestamp_ms: 0,
            open: 100.0,
            high: 100.5,
            low: 99.5,
            close: 100.0,
            volume: 1.0,
        }];
        let mut config = PipelineConfig::default();
        config.scorer.min_signal_rr = 100.0; // impossible to satisfy
        let sig = finalize(StrategyName::OrderBlock, Direction::Long, 100.0, 99.9, 0.1, &candles, 0, &config);
        assert!(sig.is_none());
    }

    #[test]
    fn asian_session_gate_rejects_in_session_bars() {
        // 1970-01-01T03:00:00Z is inside the Asian session.
        assert!(asian_session_active(3 * 3_600_000));
        // 1970-01-01T08:00:00Z is London open, outside it.
        assert!(!asian_session_active(8 * 3_600_000));
    }

    #[test]
    fn displacement_requires_minimum_move() {
        let candles = vec![
            Candle { timestamp_ms: 0, open: 100.0, high: 100.0, low: 100.0, close: 100.0, volume: 1.0 },
            Candle { timestamp_ms: 1, open: 100.0, high: 100.1, low: 99.9, close: 100.05, volume: 1.0 },
            Candle { timestamp_ms: 2, open: 100.0, high: 105.0, low: 99.0, close: 104.5, volume: 1.0 },
        ];
        assert!(!displaced_since(&candles, 0, 1, 0.004));
        assert!(displaced_since(&candles, 0, 2, 0.004));
    }
}
