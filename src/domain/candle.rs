//! The candle domain type and its validated series container.
//!
//! Adapted from the teacher's `domain::candle::Candle` (there: split
//! newtyped OHLC fields for display-formatted UI use). The core only ever
//! does arithmetic on these fields across dozens of factors, so the fields
//! here are plain `f64` and the newtype discipline is pushed up to the
//! `Price`/`Pct` wrappers used at call sites instead.

use serde::{Deserialize, Serialize};

use crate::error::InputError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }

    /// Top/bottom of the candle's real body (not including wicks).
    pub fn body_range(&self) -> (f64, f64) {
        if self.is_bullish() {
            (self.open, self.close)
        } else {
            (self.close, self.open)
        }
    }

    pub fn body_fraction(&self) -> f64 {
        let range = self.high - self.low;
        if range > f64::EPSILON {
            (self.close - self.open).abs() / range
        } else {
            0.0
        }
    }

    pub fn true_range(&self, prev_close: f64) -> f64 {
        (self.high - self.low)
            .max((self.high - prev_close).abs())
            .max((self.low - prev_close).abs())
    }
}

/// An ordered, validated sequence of fixed-interval bars (spec §3).
///
/// Candles are immutable once loaded into a series: every primitive in
/// `structure`, `regime`, `strategy`, and `scorer` reads a `&[Candle]` prefix
/// of this series and never mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandleSeries {
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Validate and wrap a candle vector. Rejects unsorted/duplicate
    /// timestamps and OHLC inconsistencies (spec §3 invariants, §7
    /// `InputError`).
    pub fn new(candles: Vec<Candle>) -> Result<Self, InputError> {
        if candles.is_empty() {
            return Err(InputError::EmptySeries);
        }

        for (i, c) in candles.iter().enumerate() {
            let body_lo = c.open.min(c.close);
            let body_hi = c.open.max(c.close);
            if !(c.low <= body_lo && body_hi <= c.high) {
                return Err(InputError::InvalidOhlc {
                    index: i,
                    low: c.low,
                    high: c.high,
                    open: c.open,
                    close: c.close,
                });
            }

            if i > 0 {
                let prev = candles[i - 1].timestamp_ms;
                if c.timestamp_ms == prev {
                    return Err(InputError::DuplicateTimestamp {
                        index: i,
                        timestamp: c.timestamp_ms,
                    });
                }
                if c.timestamp_ms < prev {
                    return Err(InputError::NonMonotoneTimestamp {
                        index: i,
                        prev,
                        curr: c.timestamp_ms,
                    });
                }
            }
        }

        Ok(Self { candles })
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn as_slice(&self) -> &[Candle] {
        &self.candles
    }

    pub fn get(&self, idx: usize) -> Option<&Candle> {
        self.candles.get(idx)
    }

    /// No-look-ahead prefix ending at (and including) `idx`, bounded on the
    /// left by `window` bars (spec §4.1: primitives read at most the last
    /// `W` bars).
    pub fn windowed_prefix(&self, idx: usize, window: usize) -> &[Candle] {
        let start = idx.saturating_sub(window.saturating_sub(1));
        let end = (idx + 1).min(self.candles.len());
        &self.candles[start..end]
    }

    /// Full prefix `[0..=idx]`, used by the no-look-ahead property tests.
    pub fn prefix(&self, idx: usize) -> &[Candle] {
        let end = (idx + 1).min(self.candles.len());
        &self.candles[..end]
    }

    /// A contiguous sub-series `[start, end)`, used by the walk-forward
    /// window generator to carve train/validation slices.
    pub fn slice(&self, start: usize, end: usize) -> &[Candle] {
        let end = end.min(self.candles.len());
        if start >= end {
            &[]
        } else {
            &self.candles[start..end]
        }
    }
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
            volume: 1.0,
        }
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(CandleSeries::new(vec![]).unwrap_err(), InputError::EmptySeries);
    }

    #[test]
    fn rejects_non_monotone_timestamps() {
        let candles = vec![candle(2, 1.0, 1.0, 1.0, 1.0), candle(1, 1.0, 1.0, 1.0, 1.0)];
        assert!(matches!(
            CandleSeries::new(candles).unwrap_err(),
            InputError::NonMonotoneTimestamp { .. }
        ));
    }

    #[test]
    fn rejects_bad_ohlc() {
        let candles = vec![candle(1, 1.0, 0.5, 0.0, 1.0)];
        assert!(matches!(
            CandleSeries::new(candles).unwrap_err(),
            InputError::InvalidOhlc { .. }
        ));
    }

    #[test]
    fn windowed_prefix_bounds_left_and_right() {
        let candles: Vec<Candle> = (0..10)
            .map(|i| candle(i, 1.0, 1.0, 1.0, 1.0))
            .collect();
        let series = CandleSeries::new(candles).unwrap();
        let window = series.windowed_prefix(5, 3);
        assert_eq!(window.len(), 3);
        assert_eq!(window.last().unwrap().timestamp_ms, 5);
    }
}
