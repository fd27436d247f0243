//! Error taxonomy for the core pipeline.
//!
//! `InputError` and `ConfigError` are fatal to the current symbol/run (they
//! carry structured variants so callers can branch on the cause); degenerate
//! numeric conditions (NaN-free Sharpe, discarded signals) are silent,
//! documented behaviors handled in-line rather than as errors — see
//! `walkforward::stats` and `simulator::engine`.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InputError {
    #[error("candle series is empty")]
    EmptySeries,

    #[error("candle at index {index} has non-monotone timestamp ({prev} >= {curr})")]
    NonMonotoneTimestamp { index: usize, prev: i64, curr: i64 },

    #[error("duplicate timestamp {timestamp} at index {index}")]
    DuplicateTimestamp { index: usize, timestamp: i64 },

    #[error(
        "candle at index {index} violates OHLC invariant (low={low} high={high} open={open} close={close})"
    )]
    InvalidOhlc {
        index: usize,
        low: f64,
        high: f64,
        open: f64,
        close: f64,
    },

    #[error("insufficient bars for window: need {needed}, have {have}")]
    InsufficientBars { needed: usize, have: usize },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("weight '{field}' must be non-negative, got {value}")]
    NegativeWeight { field: &'static str, value: f64 },

    #[error("threshold '{field}' is NaN")]
    NanThreshold { field: &'static str },

    #[error("suppressed regime label '{label}' does not name a known regime")]
    UnknownRegimeLabel { label: String },

    #[error("regime threshold override for '{label}' is NaN")]
    NanThresholdOverride { label: String },

    #[error("cooldown_bars must be > 0, got {value}")]
    InvalidCooldown { value: i64 },

    #[error("unknown configuration field: {message}")]
    UnknownField { message: String },
}
