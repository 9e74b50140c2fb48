//! Multi-source candle fetching with bounded retry and ordered fallback.
//!
//! ## What this does
//! - Tries the primary adapter first, retrying transient failures up to the
//!   [`RetryPolicy`] budget with a fixed backoff between attempts.
//! - On a fatal error or an exhausted budget, walks the fallback adapters in
//!   their configured order, applying the same retry procedure to each.
//! - Never raises past this boundary: total failure is an **empty series**,
//!   because market-data unavailability is an expected, recoverable
//!   condition upstream. Callers check emptiness, not errors.
//!
//! ## Determinism
//! Fallback order is a priority list, not a pool. A fallback whose id equals
//! the primary's is skipped rather than tried twice. Worst-case latency is
//! bounded by `adapters x max_attempts x backoff`.

use std::time::Duration;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::exchanges::{AdapterInitError, ExchangeAdapter, ExchangeId, build_adapter};
use crate::models::{
    candle::{Candle, CandleSeries},
    timeframe::Timeframe,
};

/// A retry budget cannot allow zero attempts.
#[derive(Debug, Error)]
#[error("retry policy needs at least 1 attempt, got {max_attempts}")]
pub struct InvalidRetryPolicy {
    pub max_attempts: u32,
}

/// How often and how patiently one adapter is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    /// `max_attempts` counts the first try too; it must be at least 1.
    pub fn new(max_attempts: u32, backoff: Duration) -> Result<Self, InvalidRetryPolicy> {
        if max_attempts == 0 {
            return Err(InvalidRetryPolicy { max_attempts });
        }
        Ok(Self {
            max_attempts,
            backoff,
        })
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }
}

impl Default for RetryPolicy {
    /// 3 attempts, 2 seconds apart.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(2),
        }
    }
}

/// One primary adapter plus an ordered list of fallbacks.
pub struct MultiSourceFetcher {
    primary: Box<dyn ExchangeAdapter>,
    fallbacks: Vec<Box<dyn ExchangeAdapter>>,
    retry: RetryPolicy,
}

impl MultiSourceFetcher {
    pub fn new(
        primary: Box<dyn ExchangeAdapter>,
        fallbacks: Vec<Box<dyn ExchangeAdapter>>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            primary,
            fallbacks,
            retry,
        }
    }

    /// Build the fetcher from venue ids via the adapter registry.
    pub fn from_ids(
        primary: ExchangeId,
        fallbacks: &[ExchangeId],
        retry: RetryPolicy,
    ) -> Result<Self, AdapterInitError> {
        let primary = build_adapter(primary)?;
        let fallbacks = fallbacks
            .iter()
            .map(|&id| build_adapter(id))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(primary, fallbacks, retry))
    }

    /// Fetch up to `limit` candles, falling back across venues.
    ///
    /// Returns an empty series when every adapter exhausts its attempts.
    pub async fn fetch(&self, symbol: &str, timeframe: Timeframe, limit: u32) -> CandleSeries {
        if let Some(candles) = self.try_adapter(&*self.primary, symbol, timeframe, limit).await
            && !candles.is_empty()
        {
            return CandleSeries::new(symbol, timeframe, candles);
        }

        for adapter in &self.fallbacks {
            if adapter.id() == self.primary.id() {
                debug!(venue = %adapter.id(), "fallback duplicates primary, skipping");
                continue;
            }
            if let Some(candles) = self.try_adapter(&**adapter, symbol, timeframe, limit).await
                && !candles.is_empty()
            {
                return CandleSeries::new(symbol, timeframe, candles);
            }
        }

        warn!(symbol, %timeframe, "no venue produced candles, returning empty series");
        CandleSeries::empty(symbol, timeframe)
    }

    /// Fetch every timeframe with its table-driven candle limit.
    ///
    /// Timeframes that came back empty are omitted from the map, not stored
    /// as empty entries.
    pub async fn fetch_all(
        &self,
        symbol: &str,
        timeframes: &[Timeframe],
    ) -> IndexMap<Timeframe, CandleSeries> {
        let mut out = IndexMap::with_capacity(timeframes.len());
        for &timeframe in timeframes {
            let series = self.fetch(symbol, timeframe, timeframe.candle_limit()).await;
            if series.is_empty() {
                continue;
            }
            out.insert(timeframe, series);
        }
        out
    }

    /// Run the retry procedure against one adapter.
    ///
    /// `None` means this adapter is done for this pass: budget exhausted or a
    /// fatal rejection. `Some(vec![])` is a successful call that had no data.
    async fn try_adapter(
        &self,
        adapter: &dyn ExchangeAdapter,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Option<Vec<Candle>> {
        for attempt in 1..=self.retry.max_attempts {
            match adapter.fetch_ohlcv(symbol, timeframe, limit).await {
                Ok(candles) => {
                    info!(
                        venue = %adapter.id(),
                        symbol,
                        %timeframe,
                        candles = candles.len(),
                        "fetched candles"
                    );
                    return Some(candles);
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        venue = %adapter.id(),
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        error = %e,
                        "transient fetch failure"
                    );
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.backoff).await;
                    }
                }
                Err(e) => {
                    warn!(venue = %adapter.id(), error = %e, "fatal fetch failure, abandoning venue");
                    return None;
                }
            }
        }
        None
    }
}
