//! Core value types (Immutable Blueprints), in the style of the teacher's
//! `config::types` newtype wrappers: a clamped `const fn new`, `Deref<Target
//! = f64>` for arithmetic, and a `Display` tuned to the quantity's usual
//! presentation.

use std::ops::Deref;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(f64);

impl Price {
    pub const fn new(val: f64) -> Self {
        Self(val)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > f64::EPSILON
    }
}

impl Deref for Price {
    type Target = f64;
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl From<f64> for Price {
    fn from(v: f64) -> Self {
        Self::new(v)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}", self.0)
    }
}

/// A fraction in `[0, 1]`, used for scores, factor weights, percentiles, and
/// ratios like the efficiency ratio.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Unit(f64);

impl Unit {
    pub fn new(val: f64) -> Self {
        Self(val.clamp(0.0, 1.0))
    }
}

impl Deref for Unit {
    type Target = f64;
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

/// A signed percentage of price (e.g. `minMovePercent`, friction), not
/// clamped to `[0,1]` since some uses (funding rate bounds) are naturally
/// negative.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Pct(f64);

impl Pct {
    pub const fn new(val: f64) -> Self {
        Self(val)
    }
}

impl Deref for Pct {
    type Target = f64;
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl std::fmt::Display for Pct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:+.3}%", self.0 * 100.0)
    }
}

/// Non-negative weight applied to a confluence factor.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Weight(f64);

impl Weight {
    pub const fn new(val: f64) -> Self {
        Self(val)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Deref for Weight {
    type Target = f64;
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl std::fmt::Display for Weight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Profit/loss expressed in units of initial risk (entry-to-SL distance).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct RMultiple(f64);

impl RMultiple {
    pub const fn new(val: f64) -> Self {
        Self(val)
    }
}

impl Deref for RMultiple {
    type Target = f64;
    fn deref(&self) -> &f64 {
        &self.0
    }
}

impl std::fmt::Display for RMultiple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:+.2}R", self.0)
    }
}

/// Asset class inferred from the symbol string (spec §9 redesign flag:
/// factor the regex-over-prefix behavior into an explicit, test-injectable
/// enum rather than inferring it ad hoc at the point of use).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetClass {
    Crypto,
    Gold,
    Forex,
}

impl AssetClass {
    /// Periods-per-year used for Sharpe annualization (spec §4.6).
    pub fn periods_per_year(&self) -> f64 {
        match self {
            AssetClass::Crypto => 365.0 * 24.0,
            AssetClass::Gold => 252.0 * 22.5,
            AssetClass::Forex => 252.0 * 24.0,
        }
    }

    pub fn annualization_factor(&self) -> f64 {
        self.periods_per_year().sqrt()
    }

    /// Infer from a symbol string by prefix/suffix matching. Crypto quote
    /// suffixes dominate the pack (`USDT`, `BUSD`, `USD`), gold is the `XAU`/
    /// `GOLD` family, everything else defaults to forex.
    pub fn infer(symbol: &str) -> Self {
        let upper = symbol.to_ascii_uppercase();
        if upper.contains("XAU") || upper.contains("GOLD") {
            AssetClass::Gold
        } else if upper.ends_with("USDT")
            || upper.ends_with("BUSD")
            || upper.ends_with("USDC")
            || upper.starts_with("BTC")
            || upper.starts_with("ETH")
        {
            AssetClass::Crypto
        } else {
            AssetClass::Forex
        }
    }
}
