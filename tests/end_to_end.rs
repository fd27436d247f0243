//! End-to-end scenarios exercising the public pipeline surface directly,
//! without going through the CLI binary or file I/O.

use std::collections::HashSet;

use ict_core::config::{PartialTpPlan, PipelineConfig, SimulatorConfig, StructureConfig};
use ict_core::domain::Candle;
use ict_core::scorer::{self, Action, ScorerState};
use ict_core::strategy::{Direction, StrategyName, StrategySignal};
use ict_core::structure::{
    BreakKind, IctContext, OrderBlock, OrderBlockType, StructureBreak, TrendDirection,
};
use ict_core::walkforward;

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

/// Scenario 1: a clean 2% take-profit / 1% stop-loss hit with no friction
/// returns exactly the take-profit's percentage move.
#[test]
fn bullish_order_block_hits_take_profit_with_no_friction() {
    let candles = vec![
        candle(0, 100.0, 100.0, 100.0, 100.0),
        candle(1, 100.0, 102.5, 99.5, 101.0),
    ];
    let sig = signal(100.0, 99.0, 102.0, 0);
    let config = SimulatorConfig { commission_pct: 0.0, slippage_pct: 0.0, ..SimulatorConfig::default() };

    let trade = ict_core::simulator::simulate_position(&candles, &sig, &config, &StructureConfig::default()).unwrap();

    assert_eq!(trade.exit_reason, ict_core::simulator::ExitReason::TakeProfit);
    assert!((trade.pnl_percent - 0.02).abs() < 1e-9);
}

/// Scenario 2: stop-loss and take-profit both fall within the same bar's
/// range; the pipeline's standardized tie-break always resolves to the
/// stop-loss.
#[test]
fn same_bar_sl_and_tp_resolves_to_stop_loss() {
    let candles = vec![
        candle(0, 100.0, 100.0, 100.0, 100.0),
        candle(1, 100.0, 104.0, 97.0, 101.0),
    ];
    let sig = signal(100.0, 98.0, 103.0, 0);
    let config = SimulatorConfig { commission_pct: 0.0, slippage_pct: 0.0, ..SimulatorConfig::default() };

    let trade = ict_core::simulator::simulate_position(&candles, &sig, &config, &StructureConfig::default()).unwrap();

    assert_eq!(trade.exit_reason, ict_core::simulator::ExitReason::StopLoss);
    assert!((trade.pnl_percent + 0.02).abs() < 1e-9);
}

/// Scenario 3: a regime label named in `suppressedRegimes` blocks the
/// scorer from emitting any candidate, regardless of what strategies would
/// otherwise generate. With fewer than the minimum regime bars the
/// classifier always returns its documented default, `ranging+normal`.
#[test]
fn suppressed_regime_blocks_evaluation() {
    let candles: Vec<Candle> = (0..5).map(|i| candle(i, 100.0, 100.5, 99.5, 100.0)).collect();
    let ctx = IctContext::build(&candles, &PipelineConfig::default());
    let mut state = ScorerState::new();

    let mut config = PipelineConfig::default();
    config.scorer.suppressed_regimes = HashSet::from(["ranging+normal".to_string()]);

    let result = scorer::evaluate(&candles, 4, &ctx, 1.0, &config, &mut state, None);

    assert_eq!(result.action, Action::Wait);
    assert_eq!(result.suppressed_reason.as_deref(), Some("regime"));
    assert!(result.all_scored.is_empty());
}

/// Scenario 4: a walk-forward window that produces zero trades is marked
/// `Skip` and excluded from the pass-rate denominator, rather than counted
/// as a failing window.
#[test]
fn zero_trade_window_is_skipped_not_failed() {
    let candles: Vec<Candle> = (0..100).map(|i| candle(i, 100.0, 100.2, 99.8, 100.0)).collect();
    let series = ict_core::domain::CandleSeries::new(candles).unwrap();

    let mut config = PipelineConfig::default();
    // No active strategies can ever fire, guaranteeing zero trades.
    config.scorer.active_strategies = HashSet::new();
    config.walk_forward = ict_core::config::WalkForwardConfig {
        train_window_bars: 50,
        val_window_bars: 20,
        slide_step_bars: 20,
        lookback_buffer: 10,
    };

    let bounds = walkforward::generate_windows(series.len(), &config.walk_forward)[0];
    let window = walkforward::evaluate_window(&series, bounds, &config, ict_core::config::AssetClass::Crypto, &[]).unwrap();

    assert_eq!(window.status, walkforward::WindowStatus::Skip);
    assert!(window.trades.is_empty());

    let symbol_result = walkforward::evaluate_symbol_pass("TEST".to_string(), vec![window]);
    assert!(symbol_result.passed);
    let aggregated = walkforward::aggregate(vec![symbol_result], None);
    assert_eq!(aggregated.pass_rate, 0.0);
}

/// Scenario 5: partial take-profit accounting. With `fraction=0.5`, the
/// final PnL must equal the weighted blend of the partial exit and the
/// final exit, exactly.
#[test]
fn partial_take_profit_blends_exactly() {
    let candles = vec![
        candle(0, 100.0, 100.0, 100.0, 100.0),
        candle(1, 100.0, 101.5, 99.5, 101.0), // crosses 1R, partial triggers
        candle(2, 101.0, 103.0, 100.5, 102.5), // runs to the full take-profit
    ];
    let sig = signal(100.0, 99.0, 103.0, 0); // risk = 1.0, so 1R = 101.0
    let config = SimulatorConfig {
        commission_pct: 0.0,
        slippage_pct: 0.0,
        partial_tp: Some(PartialTpPlan { fraction: 0.5, trigger_r: 1.0, be_buffer: 0.1 }),
        ..SimulatorConfig::default()
    };

    let trade = ict_core::simulator::simulate_position(&candles, &sig, &config, &StructureConfig::default()).unwrap();

    // Partial leg exits at 101.0 (+1%), final leg at the 103.0 take-profit (+3%).
    let expected = 0.5 * 0.01 + 0.5 * 0.03;
    assert!((trade.pnl_percent - expected).abs() < 1e-9);
}

/// Scenario 6: two identical order-block re-entries three bars apart, with
/// `cooldownBars=8`. Only the first produces a selected trade; the second
/// is discarded for being on cooldown.
#[test]
fn cooldown_gate_blocks_the_second_reentry() {
    let candles: Vec<Candle> = (0..9).map(|i| candle(i, 99.5, 100.0, 99.0, 99.5)).collect();

    let ob = OrderBlock {
        kind: OrderBlockType::Bullish,
        high: 100.0,
        low: 99.0,
        formation_index: 0,
        formation_timestamp: 0,
        displacement_index: 1,
        mitigated: false,
        volume_quality: 3.0,
        reaction_body: 0.5,
    };
    let bos = StructureBreak {
        kind: BreakKind::Bos,
        direction: TrendDirection::Bullish,
        break_index: 0,
        broken_swing_index: 0,
        break_price: 99.5,
    };
    let ctx = IctContext {
        swings: Vec::new(),
        structure_breaks: vec![bos],
        order_blocks: vec![ob],
        fvgs: Vec::new(),
        liquidity_pools: Vec::new(),
        sweeps: Vec::new(),
    };

    let mut config = PipelineConfig::default();
    config.scorer.active_strategies = HashSet::from([StrategyName::OrderBlock]);
    config.scorer.min_threshold = 0.1;
    config.scorer.max_structure_age_bars = 100;

    let mut state = ScorerState::new();

    let first = scorer::evaluate(&candles, 5, &ctx, 1.0, &config, &mut state, None);
    assert_eq!(first.action, Action::Trade);
    assert!(first.selected.is_some());

    let second = scorer::evaluate(&candles, 8, &ctx, 1.0, &config, &mut state, None);
    assert_eq!(second.action, Action::Wait);
    let candidate = second.all_scored.iter().find(|s| s.signal.strategy == StrategyName::OrderBlock).unwrap();
    assert_eq!(candidate.discarded_reason.as_deref(), Some("cooldown"));
}
