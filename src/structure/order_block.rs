//! Order block detection (spec §4.1).
//!
//! An order block is the last opposite-colored candle before a displacement
//! move. `type` records the displacement's direction (a "bullish" order
//! block precedes a bullish displacement and is formed by the last bearish
//! candle beforehand) so that strategy generators can compare it directly
//! against the prevailing BOS direction (spec §4.3's order_block trigger:
//! "direction agrees with recent BOS").

use serde::{Deserialize, Serialize};

use crate::domain::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderBlockType {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderBlock {
    pub kind: OrderBlockType,
    pub high: f64,
    pub low: f64,
    pub formation_index: usize,
    pub formation_timestamp: i64,
    pub displacement_index: usize,
    pub mitigated: bool,
    pub volume_quality: f64,
    pub reaction_body: f64,
}

impl OrderBlock {
    pub fn far_side(&self) -> f64 {
        match self.kind {
            OrderBlockType::Bullish => self.low,
            OrderBlockType::Bearish => self.high,
        }
    }

    pub fn contains(&self, price: f64) -> bool {
        price >= self.low && price <= self.high
    }
}

/// Exponential decay weight for a mitigated-but-still-relevant order block,
/// `2^(-age / half_life)` (spec §3).
pub fn freshness(age_bars: usize, half_life_bars: f64) -> f64 {
    if half_life_bars <= 0.0 {
        return if age_bars == 0 { 1.0 } else { 0.0 };
    }
    2f64.powf(-(age_bars as f64) / half_life_bars)
}

/// Scan `candles` for displacement moves and the order block each one forms.
pub fn detect_order_blocks(candles: &[Candle], min_move_pct: f64, volume_lookback: usize) -> Vec<OrderBlock> {
    let mut blocks = Vec::new();
    if candles.len() < 3 {
        return blocks;
    }

    for d in 1..candles.len() {
        let prev_close = candles[d - 1].close;
        if prev_close.abs() <= f64::EPSILON {
            continue;
        }
        let move_pct = (candles[d].close - prev_close) / prev_close;
        if move_pct.abs() < min_move_pct {
            continue;
        }
        let displacement_bullish = move_pct > 0.0;

        // Walk backward from d-1 for the nearest opposite-colored candle.
        let mut b = None;
        for j in (0..=(d - 1)).rev() {
            let candle_bullish = candles[j].is_bullish();
            if candle_bullish != displacement_bullish {
                b = Some(j);
                break;
            }
        }
        let Some(b) = b else { continue };

        let kind = if displacement_bullish {
            OrderBlockType::Bullish
        } else {
            OrderBlockType::Bearish
        };

        let start = b.saturating_sub(volume_lookback);
        let window = &candles[start..b];
        let avg_vol = if window.is_empty() {
            candles[b].volume
        } else {
            window.iter().map(|c| c.volume).sum::<f64>() / window.len() as f64
        };
        let volume_quality = if avg_vol > f64::EPSILON {
            (candles[b].volume / avg_vol).clamp(0.0, 3.0)
        } else {
            0.0
        };

        let reaction_body = candles.get(d + 1).map(|c| c.body_fraction()).unwrap_or(0.0);

        let mut block = OrderBlock {
            kind,
            high: candles[b].high,
            low: candles[b].low,
            formation_index: b,
            formation_timestamp: candles[b].timestamp_ms,
            displacement_index: d,
            mitigated: false,
            volume_quality,
            reaction_body,
        };

        // Mitigation: any later bar closing through the zone's far side.
        let far_side = block.far_side();
        for later in candles.iter().skip(d + 1) {
            let breached = match kind {
                OrderBlockType::Bullish => later.close < far_side,
                OrderBlockType::Bearish => later.close > far_side,
            };
            if breached {
                block.mitigated = true;
                break;
            }
        }

        blocks.push(block);
    }

    blocks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(ts: i64, o: f64, h: f64, l: f64, c: f64) -> Candle {
        Candle {
            timestamp_ms: ts,
            open: o,
            high: h,
            low: l,
            close: c,
            volume: 100.0,
        }
    }

    #[test]
    fn finds_bullish_order_block_before_displacement() {
        let candles = vec![
            candle(0, 10.0, 10.2, 9.8, 9.9),
            candle(1, 9.9, 10.0, 9.5, 9.6), // bearish candle -> becomes the OB
            candle(2, 9.6, 10.5, 9.55, 10.4), // displacement up ~8%
        ];
        let blocks = detect_order_blocks(&candles, 0.03, 20);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].kind, OrderBlockType::Bullish);
        assert_eq!(blocks[0].formation_index, 1);
    }

    #[test]
    fn freshness_decays_by_half_life() {
        let f = freshness(10, 10.0);
        assert!((f - 0.5).abs() < 1e-9);
    }
}
