//! Categorical BUY/SELL/NEUTRAL signals from the tail of the indicator set.
//!
//! Each rule reads only the last one or two aligned positions. A rule whose
//! prerequisite series are missing or still warming up contributes nothing:
//! its key is omitted, not reported as NEUTRAL, and the majority vote runs
//! only over the signals actually produced.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use market_data_feed::models::candle::CandleSeries;

use crate::config::IndicatorConfig;
use crate::indicators::{IndicatorSet, compute};

/// A categorical trade signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
    Neutral,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Signal::Buy => "BUY",
            Signal::Sell => "SELL",
            Signal::Neutral => "NEUTRAL",
        })
    }
}

/// Signal name ("ema_cross", "rsi", "macd", "bbands", "overall") to value.
pub type SignalSet = IndexMap<String, Signal>;

/// Derive the signal set from indicators and their source series.
///
/// An empty `indicators` set triggers one computation attempt from the
/// series; if the set is still empty the result is empty too.
pub fn generate(
    indicators: &IndicatorSet,
    series: &CandleSeries,
    cfg: &IndicatorConfig,
) -> SignalSet {
    let computed;
    let indicators = if indicators.is_empty() {
        computed = compute(series, cfg);
        &computed
    } else {
        indicators
    };

    let mut out = SignalSet::new();
    if indicators.is_empty() {
        return out;
    }

    if let Some(signal) = ema_cross_signal(indicators, cfg) {
        out.insert("ema_cross".to_string(), signal);
    }
    if let Some(signal) = rsi_signal(indicators) {
        out.insert("rsi".to_string(), signal);
    }
    if let Some(signal) = macd_cross_signal(indicators) {
        out.insert("macd".to_string(), signal);
    }
    if let Some(signal) = bbands_signal(indicators, series) {
        out.insert("bbands".to_string(), signal);
    }

    out.insert("overall".to_string(), majority_vote(&out));
    out
}

/// Last two finite values of a series, if it has them.
fn last_two(values: &[f64]) -> Option<(f64, f64)> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let (prev, last) = (values[n - 2], values[n - 1]);
    (prev.is_finite() && last.is_finite()).then_some((prev, last))
}

/// Last finite value of a series, if it has one.
fn last_value(values: &[f64]) -> Option<f64> {
    values.last().copied().filter(|v| v.is_finite())
}

/// BUY when `a` crossed above `b` between the two positions, SELL on the
/// mirrored downward cross.
fn cross(prev_a: f64, a: f64, prev_b: f64, b: f64) -> Signal {
    if a > b && prev_a <= prev_b {
        Signal::Buy
    } else if a < b && prev_a >= prev_b {
        Signal::Sell
    } else {
        Signal::Neutral
    }
}

fn ema_cross_signal(indicators: &IndicatorSet, cfg: &IndicatorConfig) -> Option<Signal> {
    let short = indicators.get(&format!("ema_{}", cfg.ema_cross.short))?;
    let long = indicators.get(&format!("ema_{}", cfg.ema_cross.long))?;
    let (prev_short, last_short) = last_two(short)?;
    let (prev_long, last_long) = last_two(long)?;
    Some(cross(prev_short, last_short, prev_long, last_long))
}

fn rsi_signal(indicators: &IndicatorSet) -> Option<Signal> {
    let rsi = last_value(indicators.get("rsi")?)?;
    Some(if rsi < 30.0 {
        Signal::Buy
    } else if rsi > 70.0 {
        Signal::Sell
    } else {
        Signal::Neutral
    })
}

fn macd_cross_signal(indicators: &IndicatorSet) -> Option<Signal> {
    let (prev_macd, last_macd) = last_two(indicators.get("macd")?)?;
    let (prev_sig, last_sig) = last_two(indicators.get("macd_signal")?)?;
    Some(cross(prev_macd, last_macd, prev_sig, last_sig))
}

fn bbands_signal(indicators: &IndicatorSet, series: &CandleSeries) -> Option<Signal> {
    let upper = last_value(indicators.get("bb_upper")?)?;
    let lower = last_value(indicators.get("bb_lower")?)?;
    let close = series.last_close()?;
    Some(if close < lower {
        Signal::Buy
    } else if close > upper {
        Signal::Sell
    } else {
        Signal::Neutral
    })
}

/// Simple majority over the produced signals; NEUTRAL entries carry no vote
/// and ties (including zero-zero) resolve to NEUTRAL.
fn majority_vote(signals: &SignalSet) -> Signal {
    let buys = signals.values().filter(|&&s| s == Signal::Buy).count();
    let sells = signals.values().filter(|&&s| s == Signal::Sell).count();
    if buys > sells {
        Signal::Buy
    } else if sells > buys {
        Signal::Sell
    } else {
        Signal::Neutral
    }
}
