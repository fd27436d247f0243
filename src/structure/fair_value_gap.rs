//! Fair Value Gap (three-bar imbalance) detection (spec §4.1).

use serde::{Deserialize, Serialize};

use crate::domain::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FvgType {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FairValueGap {
    pub kind: FvgType,
    pub high: f64,
    pub low: f64,
    pub index: usize,
    pub timestamp: i64,
    pub filled: bool,
}

impl FairValueGap {
    /// Consequent encroachment: the midpoint of the gap.
    pub fn ce(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    pub fn contains_ce(&self, low: f64, high: f64) -> bool {
        let ce = self.ce();
        ce >= low && ce <= high
    }
}

/// For each candle triplet `(i-2, i-1, i)`, emit a gap if the three-bar
/// imbalance condition holds. `filled` is computed by scanning every later
/// bar's range for coverage of the CE.
pub fn detect_fvgs(candles: &[Candle]) -> Vec<FairValueGap> {
    let mut gaps = Vec::new();
    if candles.len() < 3 {
        return gaps;
    }

    for i in 2..candles.len() {
        let c0 = &candles[i - 2];
        let c2 = &candles[i];

        let (kind, low, high) = if c2.low > c0.high {
            (FvgType::Bullish, c0.high, c2.low)
        } else if c2.high < c0.low {
            (FvgType::Bearish, c2.high, c0.low)
        } else {
            continue;
        };

        let mut gap = FairValueGap {
            kind,
            high,
            low,
            index: i,
            timestamp: candles[i].timestamp_ms,
            filled: false,
        };

        for later in candles.iter().skip(i + 1) {
            if gap.contains_ce(later.low, later.high) {
                gap.filled = true;
                break;
            }
        }

        gaps.push(gap);
    }

    gaps
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
    fn detects_bullish_gap() {
        let candles = vec![
            candle(0, 10.0, 9.0),
            candle(1, 12.0, 11.0),
            candle(2, 14.0, 10.5), // low 10.5 > high[0]=10.0
        ];
        let gaps = detect_fvgs(&candles);
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].kind, FvgType::Bullish);
        assert_eq!(gaps[0].low, 10.0);
        assert_eq!(gaps[0].high, 10.5);
    }

    #[test]
    fn marks_filled_on_later_retrace() {
        let candles = vec![
            candle(0, 10.0, 9.0),
            candle(1, 12.0, 11.0),
            candle(2, 14.0, 10.5),
            candle(3, 10.3, 10.1), // covers the CE (~10.25)
        ];
        let gaps = detect_fvgs(&candles);
        assert!(gaps[0].filled);
    }
}
