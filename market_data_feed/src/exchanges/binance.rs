//! Binance spot kline adapter (`GET /api/v3/klines`).

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use snafu::ResultExt;
use tracing::debug;

use crate::exchanges::{
    AdapterInitError, ClientBuildSnafu, DecodeSnafu, ExchangeAdapter, ExchangeId, FetchError,
    RejectedSnafu, StatusSnafu, TransportSnafu, timestamp_from_millis,
};
use crate::models::{candle::Candle, timeframe::Timeframe};

const BASE_URL: &str = "https://api.binance.com/api/v3/klines";
const VENUE: ExchangeId = ExchangeId::Binance;
/// Hard cap of the klines endpoint.
const MAX_LIMIT: u32 = 1000;

pub struct BinanceAdapter {
    client: Client,
    limiter: DefaultDirectRateLimiter,
}

impl BinanceAdapter {
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
impl ExchangeAdapter for BinanceAdapter {
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

        let rows: Vec<Vec<Value>> = response.json().await.map_err(|e| {
            DecodeSnafu {
                venue: VENUE,
                message: e.to_string(),
            }
            .build()
        })?;

        parse_klines(&rows)
    }
}

/// "BTC/USDT" -> "BTCUSDT".
fn venue_symbol(symbol: &str) -> String {
    symbol.replace('/', "")
}

fn interval_code(timeframe: Timeframe) -> &'static str {
    match timeframe {
        Timeframe::M1 => "1m",
        Timeframe::M5 => "5m",
        Timeframe::M15 => "15m",
        Timeframe::M30 => "30m",
        Timeframe::H1 => "1h",
        Timeframe::H4 => "4h",
        Timeframe::D1 => "1d",
        Timeframe::W1 => "1w",
    }
}

/// Convert raw kline rows into candles.
///
/// Each row is `[open_time_ms, open, high, low, close, volume, ...]` with
/// prices and volume as decimal strings; trailing elements are ignored.
pub(crate) fn parse_klines(rows: &[Vec<Value>]) -> Result<Vec<Candle>, FetchError> {
    rows.iter()
        .map(|row| {
            if row.len() < 6 {
                return DecodeSnafu {
                    venue: VENUE,
                    message: format!("kline row has {} fields, expected at least 6", row.len()),
                }
                .fail();
            }
            let millis = row[0].as_i64().ok_or_else(|| {
                DecodeSnafu {
                    venue: VENUE,
                    message: "open time is not an integer".to_string(),
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

fn field_f64(value: &Value, name: &str) -> Result<f64, FetchError> {
    let parsed = match value {
        Value::String(s) => s.parse::<f64>().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        DecodeSnafu {
            venue: VENUE,
            message: format!("{name} is not numeric: {value}"),
        }
        .build()
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_documented_payload_shape() {
        let rows: Vec<Vec<Value>> = serde_json::from_value(json!([
            [
                1735689600000_i64,
                "93500.10",
                "94000.00",
                "93000.00",
                "93800.55",
                "1234.5",
                1735693199999_i64,
                "115000000.0",
                42000,
                "600.0",
                "56000000.0",
                "0"
            ]
        ]))
        .unwrap();

        let candles = parse_klines(&rows).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].open, 93500.10);
        assert_eq!(candles[0].close, 93800.55);
        assert_eq!(candles[0].volume, 1234.5);
        assert_eq!(candles[0].timestamp.timestamp_millis(), 1735689600000);
    }

    #[test]
    fn short_row_is_a_decode_error() {
        let rows: Vec<Vec<Value>> =
            serde_json::from_value(json!([[1735689600000_i64, "1", "2"]])).unwrap();
        let err = parse_klines(&rows).unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn non_numeric_price_is_a_decode_error() {
        let rows: Vec<Vec<Value>> = serde_json::from_value(json!([[
            1735689600000_i64,
            "not-a-price",
            "2",
            "1",
            "2",
            "3"
        ]]))
        .unwrap();
        assert!(parse_klines(&rows).is_err());
    }

    #[test]
    fn symbol_is_concatenated() {
        assert_eq!(venue_symbol("BTC/USDT"), "BTCUSDT");
    }
}
