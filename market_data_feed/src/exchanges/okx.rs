//! OKX spot candle adapter (`GET /api/v5/market/candles`).

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

const BASE_URL: &str = "https://www.okx.com/api/v5/market/candles";
const VENUE: ExchangeId = ExchangeId::Okx;
/// The candles endpoint serves at most 300 rows per request.
const MAX_LIMIT: u32 = 300;

#[derive(Debug, Deserialize)]
struct CandlesEnvelope {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<Vec<String>>,
}

pub struct OkxAdapter {
    client: Client,
    limiter: DefaultDirectRateLimiter,
}

impl OkxAdapter {
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
impl ExchangeAdapter for OkxAdapter {
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
            ("instId", venue_symbol(symbol)),
            ("bar", bar_code(timeframe).to_string()),
            ("limit", limit.min(MAX_LIMIT).to_string()),
        ];
        debug!(venue = %VENUE, symbol, %timeframe, limit, "requesting candles");

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

        let envelope: CandlesEnvelope = response.json().await.map_err(|e| {
            DecodeSnafu {
                venue: VENUE,
                message: e.to_string(),
            }
            .build()
        })?;

        if envelope.code != "0" {
            return RejectedSnafu {
                venue: VENUE,
                message: format!("code {}: {}", envelope.code, envelope.msg),
            }
            .fail();
        }

        parse_candles(&envelope.data)
    }
}

/// "BTC/USDT" -> "BTC-USDT".
fn venue_symbol(symbol: &str) -> String {
    symbol.replace('/', "-")
}

fn bar_code(timeframe: Timeframe) -> &'static str {
    match timeframe {
        Timeframe::M1 => "1m",
        Timeframe::M5 => "5m",
        Timeframe::M15 => "15m",
        Timeframe::M30 => "30m",
        Timeframe::H1 => "1H",
        Timeframe::H4 => "4H",
        Timeframe::D1 => "1D",
        Timeframe::W1 => "1W",
    }
}

/// Rows are `[ts_ms, open, high, low, close, vol, ...]`, decimal strings,
/// newest-first.
pub(crate) fn parse_candles(rows: &[Vec<String>]) -> Result<Vec<Candle>, FetchError> {
    rows.iter()
        .map(|row| {
            if row.len() < 6 {
                return DecodeSnafu {
                    venue: VENUE,
                    message: format!("candle row has {} fields, expected at least 6", row.len()),
                }
                .fail();
            }
            let millis = row[0].parse::<i64>().map_err(|_| {
                DecodeSnafu {
                    venue: VENUE,
                    message: format!("timestamp is not an integer: {}", row[0]),
                }
                .build()
            })?;
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

fn field_f64(raw: &str, name: &str) -> Result<f64, FetchError> {
    raw.parse::<f64>().map_err(|_| {
        DecodeSnafu {
            venue: VENUE,
            message: format!("{name} is not numeric: {raw}"),
        }
        .build()
    })
}
