//! Candle/funding JSON loading and walk-forward/DSR artifact round-trip
//! (spec §6), grounded in the teacher's JSON-file persistence patterns but
//! using `serde_json` directly (no database; see the Non-goal carried
//! in the configuration docs).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::{Candle, CandleSeries};
use crate::scorer::FundingSnapshot;
use crate::walkforward::{DsrResult, WalkForwardResult};

/// Load a `{symbol}_{timeframe}.json` candle file (spec §6): a JSON array
/// of `{timestamp, open, high, low, close, volume}` objects sorted
/// ascending.
pub fn load_candles(path: impl AsRef<Path>) -> Result<CandleSeries> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).with_context(|| format!("reading candle file {}", path.display()))?;
    let candles: Vec<Candle> = serde_json::from_str(&raw).with_context(|| format!("parsing candle file {}", path.display()))?;
    CandleSeries::new(candles).map_err(|e| anyhow::anyhow!(e)).with_context(|| format!("validating candle file {}", path.display()))
}

/// Load an optional `{symbol}_futures_1h.json` funding snapshot file
/// (spec §6). Missing files are not an error — funding filtering is
/// simply skipped.
pub fn load_funding(path: impl AsRef<Path>) -> Result<Vec<FundingSnapshot>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }
    let raw = fs::read_to_string(path).with_context(|| format!("reading funding file {}", path.display()))?;
    let snapshots: Vec<FundingSnapshot> =
        serde_json::from_str(&raw).with_context(|| format!("parsing funding file {}", path.display()))?;
    Ok(snapshots)
}

pub fn write_walk_forward_result(path: impl AsRef<Path>, result: &WalkForwardResult) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(result)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, json).with_context(|| format!("writing walk-forward result to {}", path.display()))
}

pub fn read_walk_forward_result(path: impl AsRef<Path>) -> Result<WalkForwardResult> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).with_context(|| format!("reading walk-forward result {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing walk-forward result {}", path.display()))
}

/// `{trialCounting, numTrialsUsed, results: [...], allPass}` artifact
/// (spec §6).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DsrArtifact {
    pub trial_counting: String,
    pub num_trials_used: usize,
    pub results: Vec<DsrResult>,
    pub all_pass: bool,
}

pub fn write_dsr_artifact(path: impl AsRef<Path>, artifact: &DsrArtifact) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(artifact)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, json).with_context(|| format!("writing DSR artifact to {}", path.display()))
}

pub fn read_dsr_artifact(path: impl AsRef<Path>) -> Result<DsrArtifact> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).with_context(|| format!("reading DSR artifact {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing DSR artifact {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walkforward::{SymbolWfResult, aggregate};

    #[test]
    fn walk_forward_result_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.json");

        let result = aggregate(
            vec![SymbolWfResult {
                symbol: "BTCUSDT".to_string(),
                windows: Vec::new(),
                passed: true,
                fail_reasons: Vec::new(),
            }],
            None,
        );

        write_walk_forward_result(&path, &result).unwrap();
        let read_back = read_walk_forward_result(&path).unwrap();
        assert_eq!(read_back.overall_pass, result.overall_pass);
        assert_eq!(read_back.symbols.len(), result.symbols.len());
    }

    #[test]
    fn missing_funding_file_is_not_an_error() {
        let snapshots = load_funding("/nonexistent/path/does_not_exist.json").unwrap();
        assert!(snapshots.is_empty());
    }
}
