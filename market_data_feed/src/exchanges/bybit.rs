//! Bybit v5 spot kline adapter (`GET /v5/market/kline`).
//!
//! Bybit wraps every response in a `retCode`/`retMsg` envelope and returns
//! kline rows newest-first; the adapter unwraps the envelope and leaves
//! ordering to the caller's series normalization.

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use snafu::ResultExt;
use tracing::debug;

use crate::exchanges::{
    AdapterInitError, ClientBuildSnafu, DecodeSnafu, ExchangeAdapter, ExchangeId, FetchError,
    RejectedSnafu, StatusSnafu, TransportSnafu, timestamp_from_millis,
};
use crate::models::{candle::Candle, timeframe::Timeframe};

const BASE_URL: &str = "https://api.bybit.com/v5/market/kline";
const VENUE: ExchangeId = ExchangeId::Bybit;
const MAX_LIMIT: u32 = 1000;

#[derive(Debug, Deserialize)]
struct KlineEnvelope {
    #[serde(rename = "retCode")]
    ret_code: i64,
    #[serde(rename = "retMsg")]
    ret_msg: String,
    #[serde(default)]
    result: KlineResult,
}

#[derive(Debug, Default, Deserialize)]
struct KlineResult {
    #[serde(default)]
    list: Vec<Vec<String>>,
}

pub struct BybitAdapter {
    client: Client,
    limiter: DefaultDirectRateLimiter,
}

impl BybitAdapter {
    pub fn new() -> Result<Self, AdapterInitError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            limiter: RateLimiter::direct(Quota::per_second(nonzero!(5u32))),
        })
    }
}

#[async_trait]
impl ExchangeAdapter for BybitAdapter {
    fn id(&self) -> ExchangeId {
        VENUE
    }

    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: u32,
    ) -> Result<Vec<Candle>, FetchError> {
        self.limiter.until_ready().await;

        let query = [
            ("category", "spot".to_string()),
            ("symbol", venue_symbol(symbol)),
            ("interval", interval_code(timeframe).to_string()),
            ("limit", limit.min(MAX_LIMIT).to_string()),
        ];
        debug!(venue = %VENUE, symbol, %timeframe, limit, "requesting klines");

        let response = self
            .client
            .get(BASE_URL)
            .query(&query)
            .send()
            .await
            .context(TransportSnafu { venue: VENUE })?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return StatusSnafu {
                venue: VENUE,
                status,
            }
            .fail();
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown API error".to_string());
            return RejectedSnafu {
                venue: VENUE,
                message,
            }
            .fail();
        }

        let envelope: KlineEnvelope = response.json().await.map_err(|e| {
            DecodeSnafu {
                venue: VENUE,
                message: e.to_string(),
            }
            .build()
        })?;

        if envelope.ret_code != 0 {
            return RejectedSnafu {
                venue: VENUE,
                message: format!("retCode {}: {}", envelope.ret_code, envelope.ret_msg),
            }
            .fail();
        }

        parse_klines(&envelope.result.list)
    }
}

/// "BTC/USDT" -> "BTCUSDT".
fn venue_symbol(symbol: &str) -> String {
    symbol.replace('/', "")
}

fn interval_code(timeframe: Timeframe) -> &'static str {
    match timeframe {
        Timeframe::M1 => "1",
        Timeframe::M5 => "5",
        Timeframe::M15 => "15",
        Timeframe::M30 => "30",
        Timeframe::H1 => "60",
        Timeframe::H4 => "240",
        Timeframe::D1 => "D",
        Timeframe::W1 => "W",
    }
}

/// Rows are `[start_ms, open, high, low, close, volume, turnover]`, all
/// decimal strings, newest-first.
pub(crate) fn parse_klines(rows: &[Vec<String>]) -> Result<Vec<Candle>, FetchError> {
    rows.iter()
        .map(|row| {
            if row.len() < 6 {
                return DecodeSnafu {
                    venue: VENUE,
                    message: format!("kline row has {} fields, expected at least 6", row.len()),
                }
                .fail();
            }
            let millis = field_i64(&row[0], "start time")?;
            Ok(Candle {
                timestamp: timestamp_from_millis(VENUE, millis)?,
                open: field_f64(&row[1], "open")?,
                high: field_f64(&row[2], "high")?,
                low: field_f64(&row[3], "low")?,
                close: field_f64(&row[4], "close")?,
                volume: field_f64(&row[5], "volume")?,
            })
        })
        .collect()
}

fn field_i64(raw: &str, name: &str) -> Result<i64, FetchError> {
    raw.parse::<i64>().map_err(|_| {
        DecodeSnafu {
            venue: VENUE,
            message: format!("{name} is not an integer: {raw}"),
        }
        .build()
    })
}

fn field_f64(raw: &str, name: &str) -> Result<f64, FetchError> {
    raw.parse::<f64>().map_err(|_| {
        DecodeSnafu {
            venue: VENUE,
            message: format!("{name} is not numeric: {raw}"),
        }
        .build()
    })
}
