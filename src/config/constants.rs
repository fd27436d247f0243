//! Documented defaults for the pipeline configuration (spec §4, §9:
//! "explicit configuration struct with documented defaults").

/// Minimum bars before the regime detector stops returning the default
/// ranging/normal regime (spec §4.2).
pub const MIN_REGIME_BARS: usize = 20;

/// London kill zone, UTC hour-of-day, half-open `[start, end)`.
pub const LONDON_KILL_ZONE: (u32, u32) = (7, 10);
/// New York kill zone, UTC hour-of-day, half-open `[start, end)`.
pub const NEW_YORK_KILL_ZONE: (u32, u32) = (12, 15);
/// Asian (Tokyo) session, UTC hour-of-day, half-open `[start, end)`. The
/// range the `AsianRangeGold` strategy treats as range formation before a
/// London-open displacement (spec §4.3).
pub const ASIAN_SESSION: (u32, u32) = (0, 7);

/// OTE (optimal trade entry) Fibonacci retracement band.
pub const OTE_RETRACEMENT_LOW: f64 = 0.62;
pub const OTE_RETRACEMENT_HIGH: f64 = 0.79;

/// Walk-forward pass rule constants (spec §4.6, §9).
pub const MIN_POSITIVE_WINDOWS: usize = 7;
pub const CATASTROPHIC_SHARPE: f64 = -2.0;

/// PBO fails the run above this probability (spec §4.6).
pub const PBO_FAIL_THRESHOLD: f64 = 0.50;
