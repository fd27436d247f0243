//! The pipeline's configuration surface: one explicit struct tree with
//! documented defaults (spec §9: "explicit configuration struct with
//! documented defaults; unknown fields are a `ConfigError`"), built with
//! plain struct literals and `Default` impls in the teacher's style
//! rather than a builder or dynamic setattr.

pub mod constants;
mod types;

pub use types::{AssetClass, Pct, Price, RMultiple, Unit, Weight};

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::strategy::StrategyName;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StructureConfig {
    pub swing_lookback: usize,
    pub min_swing_strength: usize,
    pub min_displacement_pct: f64,
    pub volume_lookback: usize,
    pub equal_tolerance_pct: f64,
    pub liquidity_rolling_lookback_bars: usize,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            swing_lookback: 5,
            min_swing_strength: 0,
            min_displacement_pct: 0.015,
            volume_lookback: 20,
            equal_tolerance_pct: 0.0015,
            liquidity_rolling_lookback_bars: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegimeConfig {
    pub trend_lookback: usize,
    pub atr_period: usize,
    pub di_period: usize,
    pub ranging_threshold: f64,
    pub trending_threshold: f64,
    pub percentile_history_bars: usize,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            trend_lookback: 20,
            atr_period: 14,
            di_period: 14,
            ranging_threshold: 0.3,
            trending_threshold: 0.5,
            percentile_history_bars: 250,
        }
    }
}

/// Weights for each confluence factor (spec §4.4), each a non-negative
/// real multiplied against the factor's `[0,1]` score.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScorerWeights {
    pub structure_alignment: Weight,
    pub kill_zone_active: Weight,
    pub liquidity_sweep: Weight,
    pub ob_proximity: Weight,
    pub fvg_at_ce: Weight,
    pub recent_bos: Weight,
    pub rr_ratio: Weight,
    pub ote_zone: Weight,
    pub ob_fvg_confluence: Weight,
    pub momentum_confirmation: Weight,
    pub ob_volume_quality: Weight,
}

impl Default for ScorerWeights {
    fn default() -> Self {
        Self {
            structure_alignment: Weight::new(0.15),
            kill_zone_active: Weight::new(0.05),
            liquidity_sweep: Weight::new(0.15),
            ob_proximity: Weight::new(0.15),
            fvg_at_ce: Weight::new(0.10),
            recent_bos: Weight::new(0.10),
            rr_ratio: Weight::new(0.10),
            ote_zone: Weight::new(0.08),
            ob_fvg_confluence: Weight::new(0.07),
            momentum_confirmation: Weight::new(0.03),
            ob_volume_quality: Weight::new(0.02),
        }
    }
}

impl ScorerWeights {
    /// Ordered factor list for the scorer's declared-order summation (spec
    /// §4.4 determinism contract: "factor list iterated in a declared
    /// order").
    pub fn ordered(&self) -> [(&'static str, Weight); 11] {
        [
            ("structureAlignment", self.structure_alignment),
            ("killZoneActive", self.kill_zone_active),
            ("liquiditySweep", self.liquidity_sweep),
            ("obProximity", self.ob_proximity),
            ("fvgAtCE", self.fvg_at_ce),
            ("recentBOS", self.recent_bos),
            ("rrRatio", self.rr_ratio),
            ("oteZone", self.ote_zone),
            ("obFvgConfluence", self.ob_fvg_confluence),
            ("momentumConfirmation", self.momentum_confirmation),
            ("obVolumeQuality", self.ob_volume_quality),
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, weight) in self.ordered() {
            let value = *weight;
            if value.is_nan() || value < 0.0 {
                return Err(ConfigError::NegativeWeight { field: name, value });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegimeFilter {
    pub enabled: bool,
    pub min_efficiency: f64,
    pub min_trend_strength: f64,
}

impl Default for RegimeFilter {
    fn default() -> Self {
        Self {
            enabled: false,
            min_efficiency: 0.0,
            min_trend_strength: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MtfBias {
    pub enabled: bool,
    pub higher_timeframe_multiplier: usize,
}

impl Default for MtfBias {
    fn default() -> Self {
        Self {
            enabled: false,
            higher_timeframe_multiplier: 4,
        }
    }
}

/// Tuning knobs specific to the `AsianRangeGold` strategy (spec §4.3): an
/// Asian-session range gate, a post-session displacement confirmation, a
/// long-bias multiplier reflecting gold's historical upside skew off the
/// Asian low, and a volatility-scaled take-profit distance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AsianRangeGoldConfig {
    pub min_displacement_pct: f64,
    pub long_bias_multiplier: f64,
    pub tp_atr_multiplier: f64,
    pub atr_lookback: usize,
}

impl Default for AsianRangeGoldConfig {
    fn default() -> Self {
        Self {
            min_displacement_pct: 0.004,
            long_bias_multiplier: 1.25,
            tp_atr_multiplier: 2.0,
            atr_lookback: 14,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundingScoringMode {
    Contrarian,
    Aligned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScorerConfig {
    pub weights: ScorerWeights,
    pub min_threshold: f64,
    pub regime_threshold_overrides: HashMap<String, f64>,
    pub active_strategies: HashSet<StrategyName>,
    pub suppressed_regimes: HashSet<String>,
    pub regime_filter: RegimeFilter,
    pub ob_freshness_half_life: f64,
    pub atr_extension_bands: f64,
    pub cooldown_bars: usize,
    pub require_kill_zone: bool,
    pub mtf_bias: MtfBias,
    pub funding_max_for_long: f64,
    pub funding_min_for_short: f64,
    pub funding_scoring_mode: FundingScoringMode,
    pub regime_confidence_gate: f64,
    pub min_signal_rr: f64,
    pub max_structure_age_bars: usize,
    pub liquidity_lookback_bars: usize,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            weights: ScorerWeights::default(),
            min_threshold: 0.55,
            regime_threshold_overrides: HashMap::new(),
            active_strategies: StrategyName::all().into_iter().collect(),
            suppressed_regimes: HashSet::new(),
            regime_filter: RegimeFilter::default(),
            ob_freshness_half_life: 40.0,
            atr_extension_bands: 2.5,
            cooldown_bars: 8,
            require_kill_zone: false,
            mtf_bias: MtfBias::default(),
            funding_max_for_long: 0.01,
            funding_min_for_short: -0.01,
            funding_scoring_mode: FundingScoringMode::Contrarian,
            regime_confidence_gate: 0.0,
            min_signal_rr: 1.5,
            max_structure_age_bars: 30,
            liquidity_lookback_bars: 60,
        }
    }
}

impl ScorerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        if self.min_threshold.is_nan() {
            return Err(ConfigError::NanThreshold { field: "minThreshold" });
        }
        if self.cooldown_bars == 0 {
            return Err(ConfigError::InvalidCooldown { value: 0i64 });
        }
        for (label, value) in &self.regime_threshold_overrides {
            if value.is_nan() {
                return Err(ConfigError::NanThresholdOverride { label: label.clone() });
            }
        }
        for label in &self.suppressed_regimes {
            if !crate::regime::RegimeLabel::is_known(label) {
                return Err(ConfigError::UnknownRegimeLabel { label: label.clone() });
            }
        }
        Ok(())
    }
}

/// SL placement mode selected globally (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlMode {
    ObBased,
    EntryBased,
    DynamicRr,
}

impl Default for SlMode {
    fn default() -> Self {
        SlMode::ObBased
    }
}

/// Exit state machine mode (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitMode {
    Simple,
    Breakeven,
    Trailing,
    Enhanced,
}

impl Default for ExitMode {
    fn default() -> Self {
        ExitMode::Simple
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PartialTpPlan {
    pub fraction: f64,
    pub trigger_r: f64,
    pub be_buffer: f64,
}

impl Default for PartialTpPlan {
    fn default() -> Self {
        Self {
            fraction: 0.5,
            trigger_r: 1.0,
            be_buffer: 0.1,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MultiTpLevel {
    pub trigger_r: f64,
    pub fraction: f64,
    pub sl_move_r: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulatorConfig {
    pub sl_mode: SlMode,
    pub exit_mode: ExitMode,
    pub commission_pct: f64,
    pub slippage_pct: f64,
    pub max_bars: usize,
    pub be_trigger_r: f64,
    pub be_buffer_r: f64,
    pub partial_tp: Option<PartialTpPlan>,
    pub multi_tp: Vec<MultiTpLevel>,
    pub trail_activation_r: f64,
    pub trail_distance_r: f64,
    pub atr_sl_multiplier: f64,
    pub sl_percent: f64,
    pub enhanced_exit_confidence: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            sl_mode: SlMode::ObBased,
            exit_mode: ExitMode::Simple,
            commission_pct: 0.0004,
            slippage_pct: 0.0002,
            max_bars: 200,
            be_trigger_r: 1.0,
            be_buffer_r: 0.1,
            partial_tp: None,
            multi_tp: Vec::new(),
            trail_activation_r: 1.5,
            trail_distance_r: 0.8,
            atr_sl_multiplier: 1.5,
            sl_percent: 0.01,
            enhanced_exit_confidence: 0.85,
        }
    }
}

impl SimulatorConfig {
    pub fn friction_per_side(&self) -> f64 {
        self.commission_pct + self.slippage_pct
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WalkForwardConfig {
    pub train_window_bars: usize,
    pub val_window_bars: usize,
    pub slide_step_bars: usize,
    pub lookback_buffer: usize,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            train_window_bars: 720,
            val_window_bars: 168,
            slide_step_bars: 168,
            lookback_buffer: 200,
        }
    }
}

/// The single top-level configuration, frozen at construction (spec §5:
/// "the configuration is frozen at construction").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub structure: StructureConfig,
    pub regime: RegimeConfig,
    pub scorer: ScorerConfig,
    pub simulator: SimulatorConfig,
    pub walk_forward: WalkForwardConfig,
    pub asian_range_gold: AsianRangeGoldConfig,
    pub asset_class_override: Option<AssetClass>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            structure: StructureConfig::default(),
            regime: RegimeConfig::default(),
            scorer: ScorerConfig::default(),
            simulator: SimulatorConfig::default(),
            walk_forward: WalkForwardConfig::default(),
            asian_range_gold: AsianRangeGoldConfig::default(),
            asset_class_override: None,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scorer.validate()
    }

    pub fn asset_class_for(&self, symbol: &str) -> AssetClass {
        self.asset_class_override.unwrap_or_else(|| AssetClass::infer(symbol))
    }
}
