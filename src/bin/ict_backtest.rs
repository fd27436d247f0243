//! CLI host: discovers `{symbol}_{timeframe}.json` candle files, runs the
//! walk-forward evaluation per symbol in parallel, and writes the result
//! artifacts (spec §6). Grounded in the teacher's `main.rs` logging setup
//! and `bin/make_demo_cache.rs`'s file-discovery/JSON-artifact shape.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;
use tabled::{Table, Tabled};

use ict_core::config::PipelineConfig;
use ict_core::io::{self, DsrArtifact};
use ict_core::walkforward::{
    self, deflated_sharpe_ratio, probability_of_backtest_overfitting, SymbolWfResult, WalkForwardResult,
};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "ICT walk-forward backtest runner", long_about = None)]
struct Cli {
    /// Directory containing `{symbol}_{timeframe}.json` candle files.
    #[arg(long)]
    candles_dir: PathBuf,

    /// Directory containing optional `{symbol}_futures_1h.json` funding files.
    #[arg(long)]
    funding_dir: Option<PathBuf>,

    /// Optional JSON config file; falls back to `PipelineConfig::default()`.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory for the walk-forward and DSR artifacts.
    #[arg(long, default_value = "out")]
    out_dir: PathBuf,

    /// Number of independent trials to deflate the Sharpe ratio against.
    #[arg(long, default_value_t = 1)]
    num_trials: usize,
}

#[derive(Tabled)]
struct SymbolRow {
    symbol: String,
    windows: usize,
    passed: bool,
    #[tabled(rename = "fail reason")]
    fail_reason: String,
}

fn main() -> Result<()> {
    let (global_level, crate_level) = if cfg!(debug_assertions) {
        (log::LevelFilter::Warn, log::LevelFilter::Info)
    } else {
        (log::LevelFilter::Error, log::LevelFilter::Info)
    };
    env_logger::Builder::new()
        .filter(None, global_level)
        .filter(Some("ict_core"), crate_level)
        .filter(Some("ict_backtest"), crate_level)
        .init();

    let cli = Cli::parse();
    let started = Instant::now();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => PipelineConfig::default(),
    };
    config.validate().context("invalid pipeline configuration")?;

    let symbols = discover_symbols(&cli.candles_dir)?;
    if symbols.is_empty() {
        log::warn!("no candle files found in {}", cli.candles_dir.display());
        return Ok(());
    }
    log::info!("running walk-forward for {} symbols", symbols.len());

    let runs: Vec<(SymbolWfResult, Vec<f64>)> = symbols
        .par_iter()
        .map(|symbol| run_symbol(symbol, &cli, &config))
        .collect::<Result<Vec<_>>>()?;

    let (symbol_results, window_returns): (Vec<SymbolWfResult>, Vec<Vec<f64>>) = runs.into_iter().unzip();

    let pbo = if symbol_results.len() >= 2 {
        let per_config: Vec<Vec<Vec<f64>>> = window_returns.iter().map(|returns| returns.iter().map(|r| vec![*r]).collect()).collect();
        probability_of_backtest_overfitting(&per_config)
    } else {
        None
    };

    let result = walkforward::aggregate(symbol_results, pbo);

    print_summary(&result);

    let walk_forward_path = cli.out_dir.join("walk_forward_result.json");
    io::write_walk_forward_result(&walk_forward_path, &result)?;
    log::info!("wrote {}", walk_forward_path.display());

    let dsr_artifact = build_dsr_artifact(&result, cli.num_trials);
    let dsr_path = cli.out_dir.join("dsr_result.json");
    io::write_dsr_artifact(&dsr_path, &dsr_artifact)?;
    log::info!("wrote {}", dsr_path.display());

    log::info!("finished in {}", ict_core::utils::format_duration(started.elapsed().as_millis()));

    if result.overall_pass && dsr_artifact.all_pass {
        Ok(())
    } else {
        std::process::exit(1);
    }
}

fn load_config(path: &Path) -> Result<PipelineConfig> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&raw)
        .map_err(|e| {
            if e.to_string().contains("unknown field") {
                anyhow::Error::new(ict_core::error::ConfigError::UnknownField { message: e.to_string() })
            } else {
                anyhow::Error::new(e)
            }
        })
        .with_context(|| format!("parsing config {}", path.display()))
}

fn discover_symbols(dir: &Path) -> Result<Vec<String>> {
    let mut symbols = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("reading candles dir {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };
        if path.extension().and_then(|e| e.to_str()) == Some("json") && !stem.ends_with("_futures_1h") {
            symbols.push(stem.to_string());
        }
    }
    symbols.sort();
    Ok(symbols)
}

/// Run the full walk-forward for one symbol; returns the symbol's pass/fail
/// result alongside the flattened per-window Sharpe series used for PBO.
fn run_symbol(symbol: &str, cli: &Cli, config: &PipelineConfig) -> Result<(SymbolWfResult, Vec<f64>)> {
    let candle_path = cli.candles_dir.join(format!("{symbol}.json"));
    let series = io::load_candles(&candle_path)?;

    let funding = match &cli.funding_dir {
        Some(dir) => io::load_funding(dir.join(format!("{symbol}_futures_1h.json")))?,
        None => Vec::new(),
    };

    let asset_class = config.asset_class_for(symbol);
    let windows = walkforward::generate_windows(series.len(), &config.walk_forward);

    let mut window_results = Vec::with_capacity(windows.len());
    for bounds in windows {
        match walkforward::evaluate_window(&series, bounds, config, asset_class, &funding) {
            Ok(window) => window_results.push(window),
            Err(err) => {
                log::warn!("{symbol}: skipping window {bounds:?}: {err}");
            }
        }
    }

    let window_returns: Vec<f64> = window_results
        .iter()
        .filter(|w| w.status == walkforward::WindowStatus::Evaluated)
        .map(|w| w.sharpe)
        .collect();

    let result = walkforward::evaluate_symbol_pass(symbol.to_string(), window_results);
    Ok((result, window_returns))
}

fn build_dsr_artifact(result: &WalkForwardResult, num_trials: usize) -> DsrArtifact {
    let results: Vec<_> = result
        .symbols
        .iter()
        .map(|symbol| {
            let returns: Vec<f64> = symbol
                .windows
                .iter()
                .flat_map(|w| w.trades.iter().map(|t| t.pnl_percent))
                .collect();
            let observed = symbol.windows.iter().map(|w| w.sharpe).sum::<f64>() / symbol.windows.len().max(1) as f64;
            deflated_sharpe_ratio(&returns, observed, num_trials)
        })
        .collect();

    let all_pass = !results.is_empty() && results.iter().all(|r| r.passes);

    DsrArtifact {
        trial_counting: "user-declared".to_string(),
        num_trials_used: num_trials,
        results,
        all_pass,
    }
}

fn print_summary(result: &WalkForwardResult) {
    let rows: Vec<SymbolRow> = result
        .symbols
        .iter()
        .map(|s| SymbolRow {
            symbol: s.symbol.clone(),
            windows: s.windows.iter().filter(|w| w.status == walkforward::WindowStatus::Evaluated).count(),
            passed: s.passed,
            fail_reason: s.fail_reasons.join("; "),
        })
        .collect();

    println!("{}", Table::new(rows));
    println!(
        "overall_pass={} pass_rate={:.2} pbo={:?}",
        result.overall_pass, result.pass_rate, result.pbo
    );
}
