//! Canonical in-memory representation of an OHLCV candle series.
//!
//! These structs are the standard output of every
//! [`ExchangeAdapter`](crate::exchanges::ExchangeAdapter) implementation,
//! regardless of venue. Timestamps are always UTC; a series is always
//! ascending by timestamp with no duplicate timestamps.

use chrono::{DateTime, Utc};

use crate::models::timeframe::Timeframe;

/// A single OHLCV sample for one interval.
///
/// Vendor-agnostic; venue adapters convert their wire formats into this.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    /// Interval open time (UTC).
    pub timestamp: DateTime<Utc>,

    /// Opening price.
    pub open: f64,

    /// Highest price during the interval.
    pub high: f64,

    /// Lowest price during the interval.
    pub low: f64,

    /// Closing price.
    pub close: f64,

    /// Base-asset volume traded during the interval.
    pub volume: f64,
}

/// A complete candle series for one symbol and timeframe.
///
/// Construction via [`CandleSeries::new`] normalizes the candles: ascending
/// sort by timestamp and de-duplication by timestamp keeping the last write.
/// Gaps are tolerated and never filled.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleSeries {
    /// Canonical instrument identifier (e.g. "BTC/USDT").
    pub symbol: String,
    /// Sampling interval of each candle.
    pub timeframe: Timeframe,
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Build a normalized series from raw adapter output.
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, mut candles: Vec<Candle>) -> Self {
        candles.sort_by_key(|c| c.timestamp);
        // Keep the most recent write for a repeated timestamp.
        candles.dedup_by(|current, kept| {
            if current.timestamp == kept.timestamp {
                *kept = *current;
                true
            } else {
                false
            }
        });
        Self {
            symbol: symbol.into(),
            timeframe,
            candles,
        }
    }

    /// A series with no data, the "total fetch failure" value.
    pub fn empty(symbol: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe,
            candles: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.low).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }

    /// Close of the most recent candle, if any.
    pub fn last_close(&self) -> Option<f64> {
        self.candles.last().map(|c| c.close)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn candle(secs: i64, close: f64) -> Candle {
        Candle {
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn new_sorts_ascending() {
        let series = CandleSeries::new(
            "BTC/USDT",
            Timeframe::H1,
            vec![candle(7200, 3.0), candle(0, 1.0), candle(3600, 2.0)],
        );
        let ts: Vec<i64> = series.candles().iter().map(|c| c.timestamp.timestamp()).collect();
        assert_eq!(ts, vec![0, 3600, 7200]);
    }

    #[test]
    fn new_dedups_keeping_last_write() {
        let series = CandleSeries::new(
            "BTC/USDT",
            Timeframe::H1,
            vec![candle(0, 1.0), candle(3600, 2.0), candle(3600, 9.0)],
        );
        assert_eq!(series.len(), 2);
        assert_eq!(series.candles()[1].close, 9.0);
    }

    #[test]
    fn empty_series_reports_empty() {
        let series = CandleSeries::empty("BTC/USDT", Timeframe::D1);
        assert!(series.is_empty());
        assert_eq!(series.last_close(), None);
    }
}
