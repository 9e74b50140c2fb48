//! The per-timeframe boundary record handed to collaborators.

use indexmap::IndexMap;
use serde::Serialize;

use market_data_feed::models::{candle::CandleSeries, timeframe::Timeframe};

use crate::config::IndicatorConfig;
use crate::indicators::{IndicatorSet, compute};
use crate::signals::{SignalSet, generate};
use crate::summary::{MarketSummary, summarize};

/// Everything downstream consumers (advisor prompt, notifier) need about one
/// timeframe: the latest indicator values rounded for display, the signal
/// set, and the market summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub timeframe: Timeframe,
    /// Latest value of each indicator, rounded to 2 decimals. Indicators
    /// still inside their warm-up window are omitted.
    pub indicators: IndexMap<String, f64>,
    pub signals: SignalSet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<MarketSummary>,
}

/// Run the full indicator -> signal -> summary pipeline for one series.
pub fn analyze(series: &CandleSeries, cfg: &IndicatorConfig) -> AnalysisResult {
    let indicators = compute(series, cfg);
    let signals = generate(&indicators, series, cfg);
    let summary = summarize(series);

    AnalysisResult {
        timeframe: series.timeframe,
        indicators: latest_values(&indicators),
        signals,
        summary,
    }
}

/// Pick the last finite value of every indicator, rounded to 2 decimals.
pub fn latest_values(indicators: &IndicatorSet) -> IndexMap<String, f64> {
    indicators
        .iter()
        .filter_map(|(name, values)| {
            values
                .last()
                .copied()
                .filter(|v| v.is_finite())
                .map(|v| (name.clone(), round2(v)))
        })
        .collect()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use market_data_feed::models::candle::Candle;

    use super::*;

    fn series_from_closes(closes: &[f64]) -> CandleSeries {
        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: Utc.timestamp_opt(i as i64 * 3600, 0).unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1.0,
            })
            .collect();
        CandleSeries::new("BTC/USDT", Timeframe::H4, candles)
    }

    #[test]
    fn full_series_produces_all_sections() {
        let cfg = IndicatorConfig::default();
        let closes: Vec<f64> = (0..220).map(|i| 100.0 + (i as f64 * 0.2).sin() * 10.0).collect();
        let result = analyze(&series_from_closes(&closes), &cfg);

        assert_eq!(result.timeframe, Timeframe::H4);
        assert!(result.indicators.contains_key("sma_200"));
        assert!(result.indicators.contains_key("macd_hist"));
        assert!(result.signals.contains_key("overall"));
        assert!(result.summary.is_some());
    }

    #[test]
    fn warm_up_indicators_are_left_out_of_the_snapshot() {
        let cfg = IndicatorConfig::default();
        // 30 candles: sma_20 has a value, sma_50 and sma_200 do not.
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let result = analyze(&series_from_closes(&closes), &cfg);

        assert!(result.indicators.contains_key("sma_20"));
        assert!(!result.indicators.contains_key("sma_50"));
        assert!(!result.indicators.contains_key("sma_200"));
    }

    #[test]
    fn snapshot_values_are_rounded_to_cents() {
        let cfg = IndicatorConfig::default();
        let closes = vec![100.111, 100.222, 100.333, 100.444];
        let result = analyze(&series_from_closes(&closes), &cfg);
        let ema9 = result.indicators["ema_9"];
        assert_eq!(ema9, (ema9 * 100.0).round() / 100.0);
    }

    #[test]
    fn empty_series_produces_an_explicitly_empty_record() {
        let cfg = IndicatorConfig::default();
        let result = analyze(&CandleSeries::empty("BTC/USDT", Timeframe::H4), &cfg);
        assert!(result.indicators.is_empty());
        assert!(result.signals.is_empty());
        assert!(result.summary.is_none());
    }

    #[test]
    fn result_serializes_without_nan_leakage() {
        let cfg = IndicatorConfig::default();
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let result = analyze(&series_from_closes(&closes), &cfg);
        let json = serde_json::to_string(&result).expect("serializes cleanly");
        assert!(json.contains("\"timeframe\":\"4h\""));
        assert!(!json.contains("null"));
    }
}
