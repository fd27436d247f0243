//! Liquidity level clustering and sweep detection (spec §4.1).
//!
//! Equal highs/lows within `equal_tolerance_pct` of each other are grouped
//! into a single pool (BSL above price, SSL below), plus a rolling-lookback
//! single highest-high/lowest-low extreme added as a strength-1 level even
//! when no cluster exists. A sweep fires when a later bar's wick pierces
//! the pool but its close rejects back through it.

use serde::{Deserialize, Serialize};

use crate::domain::Candle;
use crate::structure::swing::{SwingKind, SwingPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LiquidityPoolType {
    /// Buy-side liquidity: resting above equal highs.
    Bsl,
    /// Sell-side liquidity: resting below equal lows.
    Ssl,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityPool {
    pub kind: LiquidityPoolType,
    pub price: f64,
    pub member_indices: Vec<usize>,
    pub swept: bool,
    pub swept_index: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiquiditySweep {
    pub kind: LiquidityPoolType,
    pub pool_price: f64,
    pub sweep_index: usize,
    pub wick_extreme: f64,
    pub close_back_inside: f64,
}

/// Cluster swing highs into BSL pools and swing lows into SSL pools. Two
/// swings belong to the same pool when their prices differ by no more than
/// `equal_tolerance_pct` of the running cluster's reference price.
pub fn cluster_liquidity_pools(swings: &[SwingPoint], equal_tolerance_pct: f64) -> Vec<LiquidityPool> {
    let mut highs: Vec<&SwingPoint> = swings.iter().filter(|s| s.kind == SwingKind::High).collect();
    let mut lows: Vec<&SwingPoint> = swings.iter().filter(|s| s.kind == SwingKind::Low).collect();
    highs.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap());
    lows.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap());

    let mut pools = Vec::new();
    pools.extend(cluster_one_side(&highs, equal_tolerance_pct, LiquidityPoolType::Bsl));
    pools.extend(cluster_one_side(&lows, equal_tolerance_pct, LiquidityPoolType::Ssl));
    pools
}

fn cluster_one_side(sorted: &[&SwingPoint], tolerance_pct: f64, kind: LiquidityPoolType) -> Vec<LiquidityPool> {
    let mut pools: Vec<LiquidityPool> = Vec::new();
    let mut current: Option<(f64, Vec<usize>)> = None;

    for s in sorted {
        match &mut current {
            Some((ref_price, members)) if within_tolerance(*ref_price, s.price, tolerance_pct) => {
                members.push(s.index);
            }
            _ => {
                if let Some((ref_price, members)) = current.take() {
                    if members.len() >= 2 {
                        pools.push(finish_pool(kind, ref_price, members));
                    }
                }
                current = Some((s.price, vec![s.index]));
            }
        }
    }
    if let Some((ref_price, members)) = current {
        if members.len() >= 2 {
            pools.push(finish_pool(kind, ref_price, members));
        }
    }
    pools
}

fn finish_pool(kind: LiquidityPoolType, ref_price: f64, members: Vec<usize>) -> LiquidityPool {
    LiquidityPool {
        kind,
        price: ref_price,
        member_indices: members,
        swept: false,
        swept_index: None,
    }
}

fn within_tolerance(reference: f64, candidate: f64, tolerance_pct: f64) -> bool {
    if reference.abs() <= f64::EPSILON {
        return (candidate - reference).abs() <= f64::EPSILON;
    }
    ((candidate - reference) / reference).abs() <= tolerance_pct
}

/// Rolling-lookback single highest-high / lowest-low extreme over the last
/// `lookback_bars` bars, excluding the current (last) index, added as a
/// strength-1 level regardless of whether any cluster exists.
pub fn rolling_extreme_pools(candles: &[Candle], lookback_bars: usize) -> Vec<LiquidityPool> {
    let end = candles.len();
    if end < 2 || lookback_bars == 0 {
        return Vec::new();
    }
    let current = end - 1;
    let start = current.saturating_sub(lookback_bars);
    if start >= current {
        return Vec::new();
    }
    let window = &candles[start..current];

    let mut pools = Vec::with_capacity(2);
    if let Some((idx, price)) = window
        .iter()
        .enumerate()
        .map(|(offset, c)| (start + offset, c.high))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
    {
        pools.push(LiquidityPool {
            kind: LiquidityPoolType::Bsl,
            price,
            member_indices: vec![idx],
            swept: false,
            swept_index: None,
        });
    }
    if let Some((idx, price)) = window
        .iter()
        .enumerate()
        .map(|(offset, c)| (start + offset, c.low))
        .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
    {
        pools.push(LiquidityPool {
            kind: LiquidityPoolType::Ssl,
            price,
            member_indices: vec![idx],
            swept: false,
            swept_index: None,
        });
    }
    pools
}

/// Scan candles for wick-through-but-close-back sweeps of each pool. A pool
/// can be swept at most once; the earliest qualifying bar after its last
/// member wins.
pub fn detect_sweeps(candles: &[crate::domain::Candle], pools: &[LiquidityPool]) -> Vec<LiquiditySweep> {
    let mut sweeps = Vec::new();

    for pool in pools {
        let Some(&last_member) = pool.member_indices.iter().max() else {
            continue;
        };
        for (idx, candle) in candles.iter().enumerate().skip(last_member + 1) {
            let swept = match pool.kind {
                LiquidityPoolType::Bsl => candle.high > pool.price && candle.close < pool.price,
                LiquidityPoolType::Ssl => candle.low < pool.price && candle.close > pool.price,
            };
            if swept {
                let wick_extreme = match pool.kind {
                    LiquidityPoolType::Bsl => candle.high,
                    LiquidityPoolType::Ssl => candle.low,
                };
                sweeps.push(LiquiditySweep {
                    kind: pool.kind,
                    pool_price: pool.price,
                    sweep_index: idx,
                    wick_extreme,
                    close_back_inside: candle.close,
                });
                break;
            }
        }
    }

    sweeps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Candle;

    fn swing(index: usize, price: f64, kind: SwingKind) -> SwingPoint {
        SwingPoint {
            price,
            index,
            timestamp: index as i64,
            kind,
            strength: 1,
        }
    }

    #[test]
    fn clusters_equal_highs_into_one_pool() {
        let swings = vec![
            swing(2, 100.0, SwingKind::High),
            swing(8, 100.2, SwingKind::High),
            swing(15, 90.0, SwingKind::Low),
        ];
        let pools = cluster_liquidity_pools(&swings, 0.01);
        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].kind, LiquidityPoolType::Bsl);
        assert_eq!(pools[0].member_indices, vec![2, 8]);
    }

    #[test]
    fn detects_a_buy_side_sweep() {
        let pool = LiquidityPool {
            kind: LiquidityPoolType::Bsl,
            price: 100.0,
            member_indices: vec![0, 1],
            swept: false,
            swept_index: None,
        };
        let candles = vec![
            Candle { timestamp_ms: 0, open: 99.0, high: 99.5, low: 98.0, close: 99.0, volume: 1.0 },
            Candle { timestamp_ms: 1, open: 99.0, high: 99.8, low: 98.5, close: 99.2, volume: 1.0 },
            Candle { timestamp_ms: 2, open: 99.5, high: 101.0, low: 99.0, close: 99.6, volume: 1.0 },
        ];
        let sweeps = detect_sweeps(&candles, &[pool]);
        assert_eq!(sweeps.len(), 1);
        assert_eq!(sweeps[0].sweep_index, 2);
    }
}
