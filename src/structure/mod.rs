//! Market structure primitives: swings, BOS/CHoCH, order blocks, fair value
//! gaps, and liquidity pools. Every function here is a pure function of a
//! candle prefix — no shared mutable state, no look-ahead (spec §4.1, §8).

mod break_of_structure;
mod fair_value_gap;
mod liquidity;
mod order_block;
mod swing;

pub use break_of_structure::{detect_structure_breaks, BreakKind, StructureBreak, TrendDirection};
pub use fair_value_gap::{detect_fvgs, FairValueGap, FvgType};
pub use liquidity::{cluster_liquidity_pools, detect_sweeps, rolling_extreme_pools, LiquidityPool, LiquidityPoolType, LiquiditySweep};
pub use order_block::{detect_order_blocks, freshness, OrderBlock, OrderBlockType};
pub use swing::{detect_swings, SwingKind, SwingPoint};

use crate::config::PipelineConfig;
use crate::domain::Candle;

/// Bundles every structural primitive computed from one candle prefix. A
/// fresh context is built per evaluation window rather than mutated in
/// place, so strategy generators and the scorer always see a consistent
/// snapshot (spec §9 "shared mutable scorer state" redesign flag).
#[derive(Debug, Clone)]
pub struct IctContext {
    pub swings: Vec<SwingPoint>,
    pub structure_breaks: Vec<StructureBreak>,
    pub order_blocks: Vec<OrderBlock>,
    pub fvgs: Vec<FairValueGap>,
    pub liquidity_pools: Vec<LiquidityPool>,
    pub sweeps: Vec<LiquiditySweep>,
}

impl IctContext {
    pub fn build(candles: &[Candle], config: &PipelineConfig) -> Self {
        let swings = detect_swings(candles, config.structure.swing_lookback, config.structure.min_swing_strength);
        let structure_breaks = detect_structure_breaks(candles, &swings);
        let order_blocks = detect_order_blocks(
            candles,
            config.structure.min_displacement_pct,
            config.structure.volume_lookback,
        );
        let fvgs = detect_fvgs(candles);
        let mut liquidity_pools = cluster_liquidity_pools(&swings, config.structure.equal_tolerance_pct);
        liquidity_pools.extend(rolling_extreme_pools(candles, config.structure.liquidity_rolling_lookback_bars));
        let sweeps = detect_sweeps(candles, &liquidity_pools);

        Self {
            swings,
            structure_breaks,
            order_blocks,
            fvgs,
            liquidity_pools,
            sweeps,
        }
    }

    pub fn last_structure_break(&self) -> Option<&StructureBreak> {
        self.structure_breaks.last()
    }

    pub fn active_order_blocks(&self) -> impl Iterator<Item = &OrderBlock> {
        self.order_blocks.iter().filter(|ob| !ob.mitigated)
    }

    pub fn unfilled_fvgs(&self) -> impl Iterator<Item = &FairValueGap> {
        self.fvgs.iter().filter(|g| !g.filled)
    }
}
