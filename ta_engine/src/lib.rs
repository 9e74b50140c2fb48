//! Technical-analysis engine: indicators, trade signals, and market
//! summaries over one OHLCV candle series.
//!
//! Every stage is a pure function over an immutable series; nothing here
//! accumulates state between calls, so each stage is independently testable
//! and a fresh analysis pass always recomputes from scratch.

pub mod analysis;
pub mod config;
pub mod indicators;
pub mod signals;
pub mod summary;

pub use analysis::{AnalysisResult, analyze};
pub use config::IndicatorConfig;
pub use indicators::{IndicatorSet, compute};
pub use signals::{Signal, SignalSet, generate};
pub use summary::{MarketSummary, Trend, summarize};
