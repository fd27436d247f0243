//! Break of Structure (BOS) / Change of Character (CHoCH) detection.
//!
//! A BOS continues the prevailing trend (close breaks the last same-
//! direction swing); a CHoCH is the first break against the prevailing
//! trend and flips it. Tie-break: if a bar's close breaks both the last
//! swing-high and the last swing-low, the CHoCH classification wins (spec
//! §4.1, §9 "same bar" tie-break standardized to the conservative outcome).

use serde::{Deserialize, Serialize};

use crate::domain::Candle;
use crate::structure::swing::{SwingKind, SwingPoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakKind {
    Bos,
    Choch,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructureBreak {
    pub kind: BreakKind,
    pub direction: TrendDirection,
    pub break_index: usize,
    pub broken_swing_index: usize,
    pub break_price: f64,
}

/// Running trend state, threaded explicitly rather than held in a shared
/// mutable singleton (spec §9 redesign flag). `IctContext` constructs a
/// fresh one per evaluation and replays it across the prefix each bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrendState {
    Unknown,
    Bullish,
    Bearish,
}

/// Recompute every BOS/CHoCH over `candles` given its already-detected
/// `swings`. Pure function of the prefix — safe to call on a growing slice
/// without look-ahead since it never consults swings or candles beyond the
/// slice passed in.
pub fn detect_structure_breaks(candles: &[Candle], swings: &[SwingPoint]) -> Vec<StructureBreak> {
    let mut breaks = Vec::new();
    let mut trend = TrendState::Unknown;

    let mut last_high: Option<SwingPoint> = None;
    let mut last_low: Option<SwingPoint> = None;
    let mut high_broken = false;
    let mut low_broken = false;

    let mut swing_iter = swings.iter().peekable();

    for (k, candle) in candles.iter().enumerate() {
        while let Some(&s) = swing_iter.peek() {
            if s.index > k {
                break;
            }
            match s.kind {
                SwingKind::High => {
                    last_high = Some(*s);
                    high_broken = false;
                }
                SwingKind::Low => {
                    last_low = Some(*s);
                    low_broken = false;
                }
            }
            swing_iter.next();
        }

        let bullish_break = last_high
            .filter(|_| !high_broken)
            .filter(|h| candle.close > h.price);
        let bearish_break = last_low
            .filter(|_| !low_broken)
            .filter(|l| candle.close < l.price);

        let bullish_is_choch = matches!(trend, TrendState::Bearish);
        let bearish_is_choch = matches!(trend, TrendState::Bullish);

        // Same-bar tie-break: CHoCH wins over BOS.
        let suppress_bullish_bos =
            bullish_break.is_some() && !bullish_is_choch && bearish_break.is_some() && bearish_is_choch;
        let suppress_bearish_bos =
            bearish_break.is_some() && !bearish_is_choch && bullish_break.is_some() && bullish_is_choch;

        if let Some(h) = bullish_break {
            if !suppress_bullish_bos {
                let kind = if bullish_is_choch {
                    BreakKind::Choch
                } else {
                    BreakKind::Bos
                };
                breaks.push(StructureBreak {
                    kind,
                    direction: TrendDirection::Bullish,
                    break_index: k,
                    broken_swing_index: h.index,
                    break_price: candle.close,
                });
                trend = TrendState::Bullish;
            }
            high_broken = true;
        }

        if let Some(l) = bearish_break {
            if !suppress_bearish_bos {
                let kind = if bearish_is_choch {
                    BreakKind::Choch
                } else {
                    BreakKind::Bos
                };
                breaks.push(StructureBreak {
                    kind,
                    direction: TrendDirection::Bearish,
                    break_index: k,
                    broken_swing_index: l.index,
                    break_price: candle.close,
                });
                trend = TrendState::Bearish;
            }
            low_broken = true;
        }
    }

    breaks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::swing::detect_swings;

    fn candle(ts: i64, h: f64, l: f64, c: f64) -> Candle {
        Candle {
            timestamp_ms: ts,
            open: (h + l) / 2.0,
            high: h,
            low: l,
            close: c,
            volume: 1.0,
        }
    }

    #[test]
    fn first_break_is_never_choch() {
        // Uptrend forming: swing high at index 2, later bar closes above it.
        let candles = vec![
            candle(0, 1.0, 0.5, 0.8),
            candle(1, 2.0, 1.0, 1.5),
            candle(2, 5.0, 2.0, 4.0),
            candle(3, 3.0, 1.5, 2.0),
            candle(4, 3.5, 2.5, 3.0),
            candle(5, 4.0, 2.8, 3.5),
            candle(6, 6.0, 3.0, 5.5),
        ];
        let swings = detect_swings(&candles, 2, 0);
        let breaks = detect_structure_breaks(&candles, &swings);
        assert!(breaks.iter().any(|b| b.kind == BreakKind::Bos));
        assert!(breaks.iter().all(|b| b.kind != BreakKind::Choch));
    }
}
