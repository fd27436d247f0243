#![allow(clippy::too_many_arguments)]
#![allow(clippy::collapsible_if)]
#![allow(clippy::collapsible_else_if)]

//! The ICT trading-decision pipeline: a pure function of `(candles, config)
//! -> trades, metrics` (spec §1). Every module below is deterministic,
//! synchronous, and single-threaded (spec §5); the only parallelism
//! permitted is across symbols in the walk-forward host loop.

pub mod config;
pub mod domain;
pub mod error;
pub mod io;
pub mod regime;
pub mod scorer;
pub mod simulator;
pub mod strategy;
pub mod structure;
pub mod utils;
pub mod walkforward;

pub use config::PipelineConfig;
pub use domain::{Candle, CandleSeries};
pub use error::{ConfigError, InputError};
pub use structure::IctContext;
pub use walkforward::WalkForwardResult;
