//! Pure computation of the indicator battery over close prices.
//!
//! No I/O, no side effects. Every indicator series is index-aligned with the
//! input series: same length, `f64::NAN` for positions inside the warm-up
//! window. EMA-family values are defined from index 0 (recursive smoothing
//! seeded with the first close); SMA, RSI, and Bollinger values start once
//! their trailing window is full.

use indexmap::IndexMap;

use market_data_feed::models::candle::CandleSeries;

use crate::config::IndicatorConfig;

/// Indicator name (e.g. "sma_20", "rsi", "macd_hist") to aligned values.
pub type IndicatorSet = IndexMap<String, Vec<f64>>;

/// Compute the whole configured battery for one series.
///
/// An empty input yields an empty set; callers must check, not assume full
/// output.
pub fn compute(series: &CandleSeries, cfg: &IndicatorConfig) -> IndicatorSet {
    let mut out = IndicatorSet::new();
    if series.is_empty() {
        return out;
    }
    let closes = series.closes();

    for &period in &cfg.sma_periods {
        out.insert(format!("sma_{period}"), sma(&closes, period));
    }
    for &period in &cfg.ema_periods {
        out.insert(format!("ema_{period}"), ema(&closes, period));
    }

    out.insert("rsi".to_string(), rsi(&closes, cfg.rsi_period));

    let (macd_line, macd_signal, macd_hist) =
        macd(&closes, cfg.macd.fast, cfg.macd.slow, cfg.macd.signal);
    out.insert("macd".to_string(), macd_line);
    out.insert("macd_signal".to_string(), macd_signal);
    out.insert("macd_hist".to_string(), macd_hist);

    let (bb_upper, bb_middle, bb_lower) =
        bollinger(&closes, cfg.bollinger.period, cfg.bollinger.std_mult);
    out.insert("bb_upper".to_string(), bb_upper);
    out.insert("bb_middle".to_string(), bb_middle);
    out.insert("bb_lower".to_string(), bb_lower);

    out
}

/// Simple moving average: arithmetic mean of the trailing `period` values.
///
/// NaN for the first `period - 1` positions.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    let mut sum: f64 = values[..period - 1].iter().sum();
    for i in period - 1..values.len() {
        sum += values[i];
        out[i] = sum / period as f64;
        sum -= values[i + 1 - period];
    }
    out
}

/// Exponential moving average with `alpha = 2 / (period + 1)`, seeded by the
/// first value (no SMA warm-up seed), so it is defined at every position.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() || period == 0 {
        return vec![f64::NAN; values.len()];
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev = values[0];
    out.push(prev);
    for &v in &values[1..] {
        prev = alpha * v + (1.0 - alpha) * prev;
        out.push(prev);
    }
    out
}

/// Relative Strength Index over per-step gains and losses averaged with a
/// trailing simple mean.
///
/// NaN for the first `period` positions (the delta series starts one step
/// late). A window whose average loss is zero is clamped to 100, the
/// oversold-free convention; this also covers perfectly flat windows.
pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; values.len()];
    if period == 0 || values.len() <= period {
        return out;
    }

    // deltas[j] is the move into position j + 1.
    let deltas: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();

    for i in period..values.len() {
        let window = &deltas[i - period..i];
        let avg_gain: f64 = window.iter().map(|&d| d.max(0.0)).sum::<f64>() / period as f64;
        let avg_loss: f64 = window.iter().map(|&d| (-d).max(0.0)).sum::<f64>() / period as f64;

        out[i] = if avg_loss == 0.0 {
            100.0
        } else {
            let rs = avg_gain / avg_loss;
            100.0 - 100.0 / (1.0 + rs)
        };
    }
    out
}

/// MACD line, signal line, and histogram.
///
/// `macd = EMA(fast) - EMA(slow)`, `signal = EMA(macd, signal_period)`,
/// `hist = macd - signal`; all aligned with the input.
pub fn macd(
    values: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let fast_ema = ema(values, fast);
    let slow_ema = ema(values, slow);
    let line: Vec<f64> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| f - s)
        .collect();
    let signal_line = ema(&line, signal);
    let hist: Vec<f64> = line
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| m - s)
        .collect();
    (line, signal_line, hist)
}

/// Bollinger bands: SMA middle, +-`std_mult` trailing *sample* standard
/// deviations.
///
/// NaN until the window is full. `period` must be >= 2 (enforced by config
/// validation) for the sample deviation to exist.
pub fn bollinger(values: &[f64], period: usize, std_mult: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let middle = sma(values, period);
    let mut upper = vec![f64::NAN; values.len()];
    let mut lower = vec![f64::NAN; values.len()];

    if period >= 2 && values.len() >= period {
        for i in period - 1..values.len() {
            let window = &values[i + 1 - period..=i];
            let mean = middle[i];
            let variance: f64 = window.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>()
                / (period - 1) as f64;
            let stdev = variance.sqrt();
            upper[i] = mean + std_mult * stdev;
            lower[i] = mean - std_mult * stdev;
        }
    }

    (upper, middle, lower)
}
