//! Adapter abstraction for exchange market-data APIs.
//!
//! This module defines the [`ExchangeAdapter`] trait, a uniform interface for
//! fetching normalized OHLCV candles from any venue. Each concrete adapter
//! (Binance, Bybit, OKX) handles its own endpoint shapes, symbol and interval
//! codes, and rate limiting, and converts everything into
//! [`Candle`](crate::models::candle::Candle)s with UTC timestamps.
//!
//! Failures are split into two classes, and callers dispatch on
//! [`FetchError::is_transient`]:
//! - transient (transport, HTTP 5xx/429, malformed payloads): worth a retry;
//! - fatal (venue rejected the request, e.g. bad symbol or unsupported
//!   interval): retrying cannot help, move on to the next adapter.
//!
//! Adapters are selected at runtime from a closed [`ExchangeId`] enumeration
//! via [`build_adapter`]; there is no reflection or by-name lookup beyond
//! this registry.

pub mod binance;
pub mod bybit;
pub mod okx;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use snafu::{Backtrace, Snafu};

use crate::models::{candle::Candle, timeframe::Timeframe};

/// Which venue an adapter talks to (serde snake_case).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeId {
    Binance,
    Bybit,
    Okx,
}

impl ExchangeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeId::Binance => "binance",
            ExchangeId::Bybit => "bybit",
            ExchangeId::Okx => "okx",
        }
    }
}

impl fmt::Display for ExchangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExchangeId {
    type Err = UnknownExchange;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "binance" => Ok(ExchangeId::Binance),
            "bybit" => Ok(ExchangeId::Bybit),
            "okx" => Ok(ExchangeId::Okx),
            other => Err(UnknownExchange {
                name: other.to_string(),
            }),
        }
    }
}

/// A configuration string named a venue this build does not know.
#[derive(Debug, Snafu)]
#[snafu(display("unknown exchange id: {name}"))]
pub struct UnknownExchange {
    pub name: String,
}

/// Errors raised by an [`ExchangeAdapter`] while fetching candles.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FetchError {
    /// The request never produced a usable HTTP response.
    #[snafu(display("transport failure talking to {venue}: {source}"))]
    Transport {
        venue: ExchangeId,
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The venue answered with a retryable HTTP status (5xx or 429).
    #[snafu(display("{venue} answered HTTP {status}"))]
    Status {
        venue: ExchangeId,
        status: reqwest::StatusCode,
        backtrace: Backtrace,
    },

    /// The response body did not match the venue's documented kline shape.
    #[snafu(display("malformed kline payload from {venue}: {message}"))]
    Decode {
        venue: ExchangeId,
        message: String,
        backtrace: Backtrace,
    },

    /// The venue rejected the request itself (bad symbol, bad parameters,
    /// revoked access). Retrying the same request cannot succeed.
    #[snafu(display("{venue} rejected the request: {message}"))]
    Rejected {
        venue: ExchangeId,
        message: String,
        backtrace: Backtrace,
    },

    /// The venue has no interval code for the requested timeframe.
    #[snafu(display("{venue} cannot serve {timeframe} candles"))]
    UnsupportedTimeframe {
        venue: ExchangeId,
        timeframe: Timeframe,
        backtrace: Backtrace,
    },
}

impl FetchError {
    /// Whether a retry against the same adapter can plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::Transport { .. } | FetchError::Status { .. } | FetchError::Decode { .. }
        )
    }
}

/// Errors that can occur while constructing an adapter instance.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum AdapterInitError {
    /// failed to build the reqwest client
    #[snafu(display("failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },
}

/// Uniform fetch contract over one venue's market-data API.
///
/// Implementations hold per-instance rate-limiting state but no cross-call
/// market state; every call returns a fresh, caller-owned candle vector.
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Which venue this adapter talks to.
    fn id(&self) -> ExchangeId;

    /// Fetch up to `limit` most-recent candles for `symbol` at `timeframe`.
    ///
    /// `symbol` is the canonical "BASE/QUOTE" form; adapters translate it to
    /// their own conventions. Returned candles are ascending by UTC
    /// timestamp and de-duplicated.
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Result<Vec<Candle>, FetchError>;
}

/// Build the boxed adapter corresponding to the supplied [`ExchangeId`].
pub fn build_adapter(id: ExchangeId) -> Result<Box<dyn ExchangeAdapter>, AdapterInitError> {
    match id {
        ExchangeId::Binance => Ok(Box::new(binance::BinanceAdapter::new()?)),
        ExchangeId::Bybit => Ok(Box::new(bybit::BybitAdapter::new()?)),
        ExchangeId::Okx => Ok(Box::new(okx::OkxAdapter::new()?)),
    }
}

/// Millisecond epoch -> UTC instant, or a decode error naming the venue.
pub(crate) fn timestamp_from_millis(
    venue: ExchangeId,
    millis: i64,
) -> Result<chrono::DateTime<chrono::Utc>, FetchError> {
    chrono::DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        DecodeSnafu {
            venue,
            message: format!("timestamp out of range: {millis}"),
        }
        .build()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_ids_parse_case_insensitively() {
        assert_eq!("Binance".parse::<ExchangeId>().unwrap(), ExchangeId::Binance);
        assert_eq!(" bybit ".parse::<ExchangeId>().unwrap(), ExchangeId::Bybit);
        assert!("kraken".parse::<ExchangeId>().is_err());
    }

    #[test]
    fn transient_and_fatal_classes_split_as_documented() {
        let transient = StatusSnafu {
            venue: ExchangeId::Binance,
            status: reqwest::StatusCode::BAD_GATEWAY,
        }
        .build();
        assert!(transient.is_transient());

        let fatal = RejectedSnafu {
            venue: ExchangeId::Binance,
            message: "Invalid symbol.".to_string(),
        }
        .build();
        assert!(!fatal.is_transient());

        let unsupported = UnsupportedTimeframeSnafu {
            venue: ExchangeId::Okx,
            timeframe: Timeframe::W1,
        }
        .build();
        assert!(!unsupported.is_transient());
    }

    #[test]
    fn registry_covers_every_id() {
        for id in [ExchangeId::Binance, ExchangeId::Bybit, ExchangeId::Okx] {
            let adapter = build_adapter(id).expect("adapter builds without credentials");
            assert_eq!(adapter.id(), id);
        }
    }
}
