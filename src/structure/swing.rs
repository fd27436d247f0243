//! Swing-high/low detection (spec §4.1).

use serde::{Deserialize, Serialize};

use crate::domain::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwingKind {
    High,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SwingPoint {
    pub price: f64,
    pub index: usize,
    pub timestamp: i64,
    pub kind: SwingKind,
    pub strength: usize,
}

/// Detect swing highs and lows over `candles`, ordered by index.
///
/// A swing-high at `i` requires `i` to have a strictly greater high than
/// every bar in `[i-lookback, i-1]` (already-confirmed bars) and a
/// greater-or-equal high than every bar in `[i+1, i+lookback]` — the
/// asymmetry is the earliest-occurrence tie-break spec'd in §4.1: of two
/// equal highs, the earlier index wins. Swing-lows are symmetric on `low`.
///
/// Only indices in `[lookback, len-lookback)` are even candidates, which is
/// also what makes this safe to call repeatedly as the slice grows (the
/// online/streaming case, spec §4.1): a swing at `i` never appears in the
/// output until `i + lookback < candles.len()`, and once emitted its fields
/// never change (idempotence, spec §8).
pub fn detect_swings(candles: &[Candle], lookback: usize, min_strength: usize) -> Vec<SwingPoint> {
    let len = candles.len();
    if lookback == 0 || len < lookback * 2 + 1 {
        return Vec::new();
    }

    let mut swings = Vec::new();

    for i in lookback..(len - lookback) {
        let (mut high_strength, mut low_strength) = (0usize, 0usize);
        let mut is_high = true;
        let mut is_low = true;

        for j in (i - lookback)..=(i + lookback) {
            if j == i {
                continue;
            }
            let strict_side = j < i;

            if is_high {
                if strict_side {
                    if candles[j].high >= candles[i].high {
                        is_high = false;
                    } else {
                        high_strength += 1;
                    }
                } else if candles[j].high > candles[i].high {
                    is_high = false;
                } else if candles[j].high < candles[i].high {
                    high_strength += 1;
                }
            }

            if is_low {
                if strict_side {
                    if candles[j].low <= candles[i].low {
                        is_low = false;
                    } else {
                        low_strength += 1;
                    }
                } else if candles[j].low < candles[i].low {
                    is_low = false;
                } else if candles[j].low > candles[i].low {
                    low_strength += 1;
                }
            }
        }

        if is_high && high_strength >= min_strength {
            swings.push(SwingPoint {
                price: candles[i].high,
                index: i,
                timestamp: candles[i].timestamp_ms,
                kind: SwingKind::High,
                strength: high_strength,
            });
        }
        if is_low && low_strength >= min_strength {
            swings.push(SwingPoint {
                price: candles[i].low,
                index: i,
                timestamp: candles[i].timestamp_ms,
                kind: SwingKind::Low,
                strength: low_strength,
            });
        }
    }

    swings
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(ts: i64, h: f64, l: f64) -> Candle {
        Candle {
            timestamp_ms: ts,
            open: (h + l) / 2.0,
            high: h,
            low: l,
            close: (h + l) / 2.0,
            volume: 1.0,
        }
    }

    #[test]
    fn detects_a_clean_swing_high() {
        let highs = [1.0, 2.0, 3.0, 10.0, 3.0, 2.0, 1.0];
        let candles: Vec<Candle> = highs
            .iter()
            .enumerate()
            .map(|(i, &h)| candle(i as i64, h, h - 0.5))
            .collect();
        let swings = detect_swings(&candles, 3, 0);
        assert_eq!(swings.len(), 1);
        assert_eq!(swings[0].index, 3);
        assert_eq!(swings[0].kind, SwingKind::High);
    }

    #[test]
    fn no_look_ahead_prefix_equivalence() {
        let highs = [1.0, 2.0, 5.0, 2.0, 1.0, 2.0, 6.0, 2.0, 1.0, 1.0, 1.0];
        let candles: Vec<Candle> = highs
            .iter()
            .enumerate()
            .map(|(i, &h)| candle(i as i64, h, h - 0.5))
            .collect();
        let full = detect_swings(&candles, 2, 0);
        let prefix = detect_swings(&candles[..9], 2, 0);
        // Every swing confirmed in the shorter prefix must appear identically
        // in the full run.
        for s in &prefix {
            assert!(full.contains(s));
        }
    }

    #[test]
    fn earliest_occurrence_tie_break() {
        let highs = [1.0, 5.0, 5.0, 1.0];
        let candles: Vec<Candle> = highs
            .iter()
            .enumerate()
            .map(|(i, &h)| candle(i as i64, h, h - 0.5))
            .collect();
        let swings = detect_swings(&candles, 1, 0);
        let highs_found: Vec<usize> = swings
            .iter()
            .filter(|s| s.kind == SwingKind::High)
            .map(|s| s.index)
            .collect();
        assert_eq!(highs_found, vec![1]);
    }
}
