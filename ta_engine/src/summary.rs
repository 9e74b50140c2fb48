//! Descriptive market statistics, independent of the signal path.

use std::fmt;

use serde::{Deserialize, Serialize};

use market_data_feed::models::candle::CandleSeries;

/// Candles per descriptive window; on an hourly series this is one day.
const SNAPSHOT_WINDOW: usize = 24;

/// SMA pair used for trend classification.
const TREND_FAST: usize = 20;
const TREND_SLOW: usize = 50;

/// Coarse trend label from the price / SMA20 / SMA50 relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    StrongUptrend,
    PossibleRebound,
    PossiblePullback,
    Downtrend,
    InsufficientData,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trend::StrongUptrend => "strong uptrend",
            Trend::PossibleRebound => "possible rebound/upturn",
            Trend::PossiblePullback => "possible pullback",
            Trend::Downtrend => "downtrend",
            Trend::InsufficientData => "insufficient data for trend determination",
        })
    }
}

/// Single-snapshot statistics over the series tail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSummary {
    pub current_price: f64,
    pub price_change: f64,
    pub price_change_pct: f64,
    pub high_24h: f64,
    pub low_24h: f64,
    pub volume_24h: f64,
    pub trend: Trend,
}

/// Summarize the series tail.
///
/// Needs at least two candles for the price change; anything less is `None`,
/// never a panic. The 24-candle windows shrink to the whole series when it
/// is shorter.
pub fn summarize(series: &CandleSeries) -> Option<MarketSummary> {
    let candles = series.candles();
    if candles.len() < 2 {
        return None;
    }

    let closes = series.closes();
    let n = closes.len();
    let current_price = closes[n - 1];
    let prev_price = closes[n - 2];
    let price_change = current_price - prev_price;
    let price_change_pct = price_change / prev_price * 100.0;

    let window = n.min(SNAPSHOT_WINDOW);
    let tail = &candles[n - window..];
    let high_24h = tail.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let low_24h = tail.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    let volume_24h = tail.iter().map(|c| c.volume).sum();

    Some(MarketSummary {
        current_price,
        price_change,
        price_change_pct,
        high_24h,
        low_24h,
        volume_24h,
        trend: classify_trend(&closes),
    })
}

fn classify_trend(closes: &[f64]) -> Trend {
    let n = closes.len();
    if n < TREND_SLOW {
        return Trend::InsufficientData;
    }
    let price = closes[n - 1];
    let sma20 = trailing_mean(closes, TREND_FAST);
    let sma50 = trailing_mean(closes, TREND_SLOW);

    if price > sma20 && sma20 > sma50 {
        Trend::StrongUptrend
    } else if price > sma20 && sma20 < sma50 {
        Trend::PossibleRebound
    } else if price < sma20 && sma20 > sma50 {
        Trend::PossiblePullback
    } else {
        Trend::Downtrend
    }
}

fn trailing_mean(values: &[f64], window: usize) -> f64 {
    let tail = &values[values.len() - window..];
    tail.iter().sum::<f64>() / window as f64
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use market_data_feed::models::{candle::Candle, timeframe::Timeframe};

    use super::*;

    fn series_from_closes(closes: &[f64]) -> CandleSeries {
        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: Utc.timestamp_opt(i as i64 * 3600, 0).unwrap(),
                open: close,
                high: close + 2.0,
                low: close - 2.0,
                close,
                volume: 5.0,
            })
            .collect();
        CandleSeries::new("BTC/USDT", Timeframe::H1, candles)
    }

    #[test]
    fn degenerate_input_yields_none() {
        assert!(summarize(&CandleSeries::empty("BTC/USDT", Timeframe::H1)).is_none());
        assert!(summarize(&series_from_closes(&[100.0])).is_none());
    }

    #[test]
    fn price_change_uses_the_last_two_closes() {
        let summary = summarize(&series_from_closes(&[100.0, 104.0])).unwrap();
        assert_eq!(summary.current_price, 104.0);
        assert_eq!(summary.price_change, 4.0);
        assert_eq!(summary.price_change_pct, 4.0);
        assert_eq!(summary.trend, Trend::InsufficientData);
    }

    #[test]
    fn short_series_windows_cover_the_whole_series() {
        let summary = summarize(&series_from_closes(&[100.0, 110.0, 90.0])).unwrap();
        assert_eq!(summary.high_24h, 112.0);
        assert_eq!(summary.low_24h, 88.0);
        assert_eq!(summary.volume_24h, 15.0);
    }

    #[test]
    fn long_series_windows_are_trailing_24() {
        // 30 candles; the spike at index 2 must fall outside the window.
        let mut closes = vec![100.0; 30];
        closes[2] = 500.0;
        let summary = summarize(&series_from_closes(&closes)).unwrap();
        assert_eq!(summary.high_24h, 102.0);
        assert_eq!(summary.volume_24h, 24.0 * 5.0);
    }

    #[test]
    fn rising_series_is_a_strong_uptrend() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let summary = summarize(&series_from_closes(&closes)).unwrap();
        assert_eq!(summary.trend, Trend::StrongUptrend);
    }

    #[test]
    fn falling_series_is_a_downtrend() {
        let closes: Vec<f64> = (0..60).map(|i| 200.0 - i as f64).collect();
        let summary = summarize(&series_from_closes(&closes)).unwrap();
        assert_eq!(summary.trend, Trend::Downtrend);
    }

    #[test]
    fn rebound_needs_price_above_fast_but_fast_below_slow() {
        // Long decline, then a sharp hook back up: price > SMA20 while
        // SMA20 < SMA50.
        let mut closes: Vec<f64> = (0..55).map(|i| 200.0 - 2.0 * i as f64).collect();
        closes.extend([150.0, 160.0, 170.0]);
        let summary = summarize(&series_from_closes(&closes)).unwrap();
        assert_eq!(summary.trend, Trend::PossibleRebound);
    }

    #[test]
    fn pullback_needs_price_below_fast_but_fast_above_slow() {
        // Long rise, then a dip: price < SMA20 while SMA20 > SMA50.
        let mut closes: Vec<f64> = (0..55).map(|i| 100.0 + 2.0 * i as f64).collect();
        closes.extend([180.0, 170.0, 160.0]);
        let summary = summarize(&series_from_closes(&closes)).unwrap();
        assert_eq!(summary.trend, Trend::PossiblePullback);
    }

    #[test]
    fn trend_labels_render_for_reports() {
        assert_eq!(Trend::StrongUptrend.to_string(), "strong uptrend");
        assert_eq!(
            Trend::InsufficientData.to_string(),
            "insufficient data for trend determination"
        );
    }
}
