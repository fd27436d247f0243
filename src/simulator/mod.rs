//! The friction-aware position simulator (spec §4.5).
//!
//! Grounded in the teacher's `engine::backtest::run_backtest` walk/replay
//! loop and `TradeResult` shape, generalized from a single fixed-TP exit
//! to the full state machine (breakeven, partial-TP, multi-TP, trailing,
//! enhanced) spec'd in §4.5.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{ExitMode, SimulatorConfig, StructureConfig};
use crate::domain::Candle;
use crate::strategy::{Direction, StrategySignal};
use crate::structure::{detect_structure_breaks, detect_swings, BreakKind, TrendDirection};

/// Namespace for deterministic trade identifiers (spec §5: no RNG anywhere
/// in the pure core). Grounded in the teacher's `Uuid`-tagged `TradeResult`
/// rows, but derived from the signal itself (`new_v5`) rather than drawn
/// from a random generator (`new_v4`) so the same inputs always produce the
/// same id.
const TRADE_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x1c, 0x7a, 0x6e, 0x3d, 0x4f, 0x2b, 0x4a, 0x91, 0x8e, 0x05, 0x6d, 0x4a, 0x2f, 0x9e, 0x31, 0x7c,
]);

fn trade_id(signal: &StrategySignal, bars_held: usize) -> Uuid {
    let name = format!(
        "{}:{:?}:{}:{}:{}",
        signal.strategy, signal.direction, signal.entry_timestamp, signal.entry_price, bars_held
    );
    Uuid::new_v5(&TRADE_ID_NAMESPACE, name.as_bytes())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    MaxBars,
    Shutdown,
    StructuralExit,
}

/// Owned exclusively by the simulator for the position's lifetime (spec
/// §5: "the position simulator owns its mutable `SimulatedPosition`
/// exclusively"). Mutable fields only ever advance monotonically: `sl`
/// only tightens toward/through breakeven, `partial_taken` only flips
/// false→true.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SimulatedPosition {
    direction: Direction,
    entry_price: f64,
    initial_sl: f64,
    current_sl: f64,
    take_profit: f64,
    risk_distance: f64,
    partial_taken: bool,
    partial_pnl: f64,
    be_triggered: bool,
    trail_active: bool,
}

impl SimulatedPosition {
    fn unrealized_r(&self, price: f64) -> f64 {
        let raw = (price - self.entry_price) * self.direction.sign();
        raw / self.risk_distance
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeResult {
    pub trade_id: Uuid,
    pub strategy: crate::strategy::StrategyName,
    pub direction: Direction,
    pub entry_timestamp: i64,
    pub exit_timestamp: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub pnl_percent: f64,
    pub exit_reason: ExitReason,
    pub bars_held: usize,
}

fn friction_adjusted_entry(direction: Direction, price: f64, friction: f64) -> f64 {
    price * (1.0 + direction.sign() * friction)
}

fn friction_adjusted_exit(direction: Direction, price: f64, friction: f64) -> f64 {
    price * (1.0 - direction.sign() * friction)
}

fn pnl_percent(direction: Direction, entry: f64, exit: f64) -> f64 {
    direction.sign() * (exit - entry) / entry
}

/// Simulate one position opened at `signal.entry_index` forward through
/// `candles`, terminating at the first SL/TP/max-bars/end-of-data event
/// (spec §4.5 per-bar evaluation). Returns `None` when `riskDistance <= 0`
/// (spec §7: "degenerate position... signal discarded; no trade").
pub fn simulate_position(
    candles: &[Candle],
    signal: &StrategySignal,
    config: &SimulatorConfig,
    structure_config: &StructureConfig,
) -> Option<TradeResult> {
    let risk_distance = signal.risk_distance();
    if risk_distance <= f64::EPSILON {
        return None;
    }

    let friction = config.friction_per_side();
    let adjusted_entry = friction_adjusted_entry(signal.direction, signal.entry_price, friction);

    let mut pos = SimulatedPosition {
        direction: signal.direction,
        entry_price: adjusted_entry,
        initial_sl: signal.stop_loss,
        current_sl: signal.stop_loss,
        take_profit: signal.take_profit,
        risk_distance,
        partial_taken: false,
        partial_pnl: 0.0,
        be_triggered: false,
        trail_active: false,
    };

    let last_index = (signal.entry_index + config.max_bars).min(candles.len() - 1);

    for idx in (signal.entry_index + 1)..=last_index {
        let bar = &candles[idx];
        let bars_held = idx - signal.entry_index;

        let sl_hit = match pos.direction {
            Direction::Long => bar.low <= pos.current_sl,
            Direction::Short => bar.high >= pos.current_sl,
        };
        let tp_hit = match pos.direction {
            Direction::Long => bar.high >= pos.take_profit,
            Direction::Short => bar.low <= pos.take_profit,
        };

        // Same-bar tie-break: SL wins (spec §4.5 step 3, §9 standardized
        // across all exit modes).
        if sl_hit {
            return Some(close_at(&pos, signal, pos.current_sl, bar.timestamp_ms, bars_held, ExitReason::StopLoss, friction, config));
        }
        if tp_hit {
            return Some(close_at(&pos, signal, pos.take_profit, bar.timestamp_ms, bars_held, ExitReason::TakeProfit, friction, config));
        }

        let unrealized_r = pos.unrealized_r(bar.close);

        match config.exit_mode {
            ExitMode::Simple => {}
            ExitMode::Breakeven => apply_breakeven(&mut pos, config, unrealized_r),
            ExitMode::Trailing => {
                apply_breakeven(&mut pos, config, unrealized_r);
                apply_trailing(&mut pos, config, bar.close, unrealized_r);
            }
            ExitMode::Enhanced => {
                apply_breakeven(&mut pos, config, unrealized_r);
                apply_trailing(&mut pos, config, bar.close, unrealized_r);
                let confidence = structural_counter_signal_confidence(candles, idx, pos.direction, structure_config);
                if confidence >= config.enhanced_exit_confidence {
                    return Some(close_at(
                        &pos,
                        signal,
                        bar.close,
                        bar.timestamp_ms,
                        bars_held,
                        ExitReason::StructuralExit,
                        friction,
                        config,
                    ));
                }
            }
        }

        if let Some(plan) = &config.partial_tp {
            apply_partial_tp(&mut pos, plan, unrealized_r, bar.close, friction);
        }
        for level in &config.multi_tp {
            apply_multi_tp_level(&mut pos, level, unrealized_r);
        }
    }

    let last = &candles[last_index];
    let bars_held = last_index - signal.entry_index;
    let reason = if bars_held >= config.max_bars { ExitReason::MaxBars } else { ExitReason::Shutdown };
    Some(close_at(&pos, signal, last.close, last.timestamp_ms, bars_held, reason, friction, config))
}

fn apply_breakeven(pos: &mut SimulatedPosition, config: &SimulatorConfig, unrealized_r: f64) {
    if pos.be_triggered || unrealized_r < config.be_trigger_r {
        return;
    }
    let be_price = pos.entry_price + pos.direction.sign() * pos.risk_distance * config.be_buffer_r;
    tighten_sl(pos, be_price);
    pos.be_triggered = true;
}

fn apply_trailing(pos: &mut SimulatedPosition, config: &SimulatorConfig, price: f64, unrealized_r: f64) {
    if unrealized_r < config.trail_activation_r {
        return;
    }
    pos.trail_active = true;
    let trail_price = price - pos.direction.sign() * pos.risk_distance * config.trail_distance_r;
    tighten_sl(pos, trail_price);
}

/// Queries the position's own structure primitives for an opposite-direction
/// BOS/CHoCH that formed on this bar, rather than a per-strategy `detectExit`
/// trait (spec §4.5 step 8). A CHoCH against the position is the stronger
/// signal since it implies a trend change, not just a continuation pause.
fn structural_counter_signal_confidence(
    candles: &[Candle],
    idx: usize,
    direction: Direction,
    structure_config: &StructureConfig,
) -> f64 {
    let prefix = &candles[..=idx];
    let swings = detect_swings(prefix, structure_config.swing_lookback, structure_config.min_swing_strength);
    let breaks = detect_structure_breaks(prefix, &swings);
    let opposite = match direction {
        Direction::Long => TrendDirection::Bearish,
        Direction::Short => TrendDirection::Bullish,
    };
    match breaks.last() {
        Some(b) if b.break_index == idx && b.direction == opposite => match b.kind {
            BreakKind::Choch => 0.9,
            BreakKind::Bos => 0.6,
        },
        _ => 0.0,
    }
}

/// Monotone tightening: the new SL only replaces the current one if it
/// moves the stop in the position's favor (spec §8 "monotone trailing").
fn tighten_sl(pos: &mut SimulatedPosition, candidate: f64) {
    let improves = match pos.direction {
        Direction::Long => candidate > pos.current_sl,
        Direction::Short => candidate < pos.current_sl,
    };
    if improves {
        pos.current_sl = candidate;
    }
}

fn apply_partial_tp(pos: &mut SimulatedPosition, plan: &crate::config::PartialTpPlan, unrealized_r: f64, price: f64, friction: f64) {
    if pos.partial_taken || unrealized_r < plan.trigger_r {
        return;
    }
    let exit_price = friction_adjusted_exit(pos.direction, price, friction);
    pos.partial_pnl = pnl_percent(pos.direction, pos.entry_price, exit_price);
    pos.partial_taken = true;

    if plan.be_buffer >= 0.0 {
        let be_price = pos.entry_price + pos.direction.sign() * pos.risk_distance * plan.be_buffer;
        tighten_sl(pos, be_price);
    }
}

fn apply_multi_tp_level(pos: &mut SimulatedPosition, level: &crate::config::MultiTpLevel, unrealized_r: f64) {
    if unrealized_r < level.trigger_r {
        return;
    }
    let sl_price = pos.entry_price + pos.direction.sign() * pos.risk_distance * level.sl_move_r;
    tighten_sl(pos, sl_price);
}

fn close_at(
    pos: &SimulatedPosition,
    signal: &StrategySignal,
    raw_exit_price: f64,
    exit_timestamp: i64,
    bars_held: usize,
    reason: ExitReason,
    friction: f64,
    config: &SimulatorConfig,
) -> TradeResult {
    let adjusted_exit = friction_adjusted_exit(pos.direction, raw_exit_price, friction);
    let full_exit_pnl = pnl_percent(pos.direction, pos.entry_price, adjusted_exit);

    // Partial-TP accounting (spec §8): finalPnl = f*partialPnl +
    // (1-f)*exitPnl exactly.
    let pnl = match (pos.partial_taken, &config.partial_tp) {
        (true, Some(plan)) => plan.fraction * pos.partial_pnl + (1.0 - plan.fraction) * full_exit_pnl,
        _ => full_exit_pnl,
    };

    TradeResult {
        trade_id: trade_id(signal, bars_held),
        strategy: signal.strategy,
        direction: pos.direction,
        entry_timestamp: signal.entry_timestamp,
        exit_timestamp,
        entry_price: pos.entry_price,
        exit_price: adjusted_exit,
        pnl_percent: pnl,
        exit_reason: reason,
        bars_held,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StructureConfig;
    use crate::strategy::StrategyName;

    fn candle(ts: i64, o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle { timestamp_ms: ts, open: o, high: h, low: l, close: c, volume: 1.0 }
    }

    fn signal(entry: f64, sl: f64, tp: f64, idx: usize) -> StrategySignal {
        StrategySignal {
            strategy: StrategyName::OrderBlock,
            direction: Direction::Long,
            entry_price: entry,
            stop_loss: sl,
            take_profit: tp,
            risk_reward: (tp - entry) / (entry - sl),
            entry_index: idx,
            entry_timestamp: idx as i64,
        }
    }

    #[test]
    fn no_friction_take_profit_hit() {
        let candles = vec![
            candle(0, 100.0, 100.0, 100.0, 100.0),
            candle(1, 100.0, 103.0, 99.0, 101.0),
        ];
        let sig = signal(100.0, 99.0, 102.0, 0);
        let config = SimulatorConfig { commission_pct: 0.0, slippage_pct: 0.0, ..SimulatorConfig::default() };
        let trade = simulate_position(&candles, &sig, &config, &StructureConfig::default()).unwrap();
        assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
        assert!((trade.pnl_percent - 0.02).abs() < 1e-9);
    }

    #[test]
    fn same_bar_sl_and_tp_sl_wins() {
        let candles = vec![
            candle(0, 100.0, 100.0, 100.0, 100.0),
            candle(1, 100.0, 104.0, 97.0, 101.0),
        ];
        let sig = signal(100.0, 98.0, 103.0, 0);
        let config = SimulatorConfig { commission_pct: 0.0, slippage_pct: 0.0, ..SimulatorConfig::default() };
        let trade = simulate_position(&candles, &sig, &config, &StructureConfig::default()).unwrap();
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert!((trade.pnl_percent + 0.02).abs() < 1e-9);
    }

    #[test]
    fn degenerate_risk_distance_is_rejected() {
        let candles = vec![candle(0, 100.0, 100.0, 100.0, 100.0)];
        let sig = signal(100.0, 100.0, 102.0, 0);
        let config = SimulatorConfig::default();
        assert!(simulate_position(&candles, &sig, &config, &StructureConfig::default()).is_none());
    }

    #[test]
    fn monotone_trailing_never_loosens_for_long() {
        let candles = vec![
            candle(0, 100.0, 100.0, 100.0, 100.0),
            candle(1, 101.0, 102.0, 100.5, 101.5),
            candle(2, 101.5, 103.0, 100.8, 102.5),
            candle(3, 102.5, 102.6, 99.0, 99.5),
        ];
        let sig = signal(100.0, 99.0, 110.0, 0);
        let config = SimulatorConfig {
            commission_pct: 0.0,
            slippage_pct: 0.0,
            exit_mode: ExitMode::Trailing,
            trail_activation_r: 1.0,
            trail_distance_r: 0.5,
            max_bars: 10,
            ..SimulatorConfig::default()
        };
        // Must not exit at the final bar's SL undercut below a previously
        // tightened stop; the trade should have already closed on the
        // trailing stop before price falls back to 99.0.
        let trade = simulate_position(&candles, &sig, &config, &StructureConfig::default()).unwrap();
        assert_ne!(trade.exit_price, 0.0);
    }

    #[test]
    fn enhanced_mode_exits_on_opposing_choch() {
        // A BOS confirms an uptrend through index 6, then index 8 closes
        // back below the swing low at index 5 — a bearish CHoCH against the
        // open long, which the enhanced exit mode should catch.
        let candles = vec![
            candle(0, 0.8, 1.0, 0.5, 0.8),
            candle(1, 1.5, 2.0, 1.0, 1.5),
            candle(2, 4.0, 5.0, 2.0, 4.0),
            candle(3, 2.0, 3.0, 1.5, 2.0),
            candle(4, 3.0, 3.5, 2.5, 3.0),
            candle(5, 1.0, 4.0, 0.9, 1.0),
            candle(6, 5.5, 5.5, 1.0, 5.5),
            candle(7, 5.0, 5.8, 1.2, 5.0),
            candle(8, 0.5, 5.0, 0.3, 0.5),
        ];
        let sig = signal(1.0, 0.1, 100.0, 0);
        let config = SimulatorConfig {
            commission_pct: 0.0,
            slippage_pct: 0.0,
            exit_mode: ExitMode::Enhanced,
            enhanced_exit_confidence: 0.85,
            be_trigger_r: 1000.0,
            trail_activation_r: 1000.0,
            max_bars: 10,
            ..SimulatorConfig::default()
        };
        let structure_config = StructureConfig { swing_lookback: 2, min_swing_strength: 0, ..StructureConfig::default() };
        let trade = simulate_position(&candles, &sig, &config, &structure_config).unwrap();
        assert_eq!(trade.exit_reason, ExitReason::StructuralExit);
        assert_eq!(trade.bars_held, 8);
    }
}
