//! Discord webhook delivery of the per-session market report.

use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use snafu::{Backtrace, IntoError, ResultExt, Snafu};
use tracing::{error, info, warn};

use market_data_feed::models::timeframe::Timeframe;

use crate::bot::TimeframeReport;
use crate::session::TradingSession;

/// Delivery retry budget.
const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(5);

const COLOR_STRONG_BUY: u32 = 0x00FF00;
const COLOR_WEAK_BUY: u32 = 0x66CC66;
const COLOR_NEUTRAL: u32 = 0xFFFF00;
const COLOR_WEAK_SELL: u32 = 0xFF6666;
const COLOR_STRONG_SELL: u32 = 0xFF0000;
const COLOR_UNKNOWN: u32 = 0x808080;
const COLOR_ERROR: u32 = 0xFF0000;

#[derive(Debug, Snafu)]
pub enum NotifyError {
    #[snafu(display("transport failure posting to the webhook: {source}"))]
    Transport {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("webhook answered HTTP {status}"))]
    Status { status: reqwest::StatusCode },

    #[snafu(display("failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// Every timeframe report was an error marker; there is nothing to post.
    #[snafu(display("no valid timeframe report to send"))]
    NothingToSend,
}

#[derive(Debug, Serialize, PartialEq)]
struct WebhookPayload {
    content: String,
    embeds: Vec<Embed>,
}

#[derive(Debug, Serialize, PartialEq)]
struct Embed {
    title: String,
    color: u32,
    fields: Vec<EmbedField>,
    footer: EmbedFooter,
    timestamp: String,
}

#[derive(Debug, Serialize, PartialEq)]
struct EmbedField {
    name: String,
    value: String,
    inline: bool,
}

#[derive(Debug, Serialize, PartialEq)]
struct EmbedFooter {
    text: String,
}

pub struct DiscordNotifier {
    client: Client,
    webhook_url: SecretString,
}

impl DiscordNotifier {
    pub fn new(webhook_url: SecretString) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context(ClientBuildSnafu)?;
        Ok(Self {
            client,
            webhook_url,
        })
    }

    /// Post the per-session report, one embed per timeframe.
    ///
    /// Timeframes whose advisor record is an error marker are logged and
    /// dropped from the message; if that leaves nothing, the send is
    /// reported as [`NotifyError::NothingToSend`].
    pub async fn send_market_report(
        &self,
        symbol: &str,
        session: TradingSession,
        reports: &IndexMap<Timeframe, TimeframeReport>,
        now: DateTime<Utc>,
    ) -> Result<(), NotifyError> {
        let payload =
            build_report_payload(symbol, session, reports, now).ok_or(NotifyError::NothingToSend)?;
        info!(
            session = session.label(),
            embeds = payload.embeds.len(),
            "sending market report"
        );
        self.send_with_retry(&payload).await
    }

    /// Post a plain error notice so failures are visible in the channel too.
    pub async fn send_error_notification(&self, message: &str) -> Result<(), NotifyError> {
        let now = Utc::now();
        let payload = WebhookPayload {
            content: format!(
                "⚠️ **Market report error** ({})",
                now.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            embeds: vec![Embed {
                title: "The analysis pass failed".to_string(),
                color: COLOR_ERROR,
                fields: vec![EmbedField {
                    name: "Error".to_string(),
                    value: message.to_string(),
                    inline: false,
                }],
                footer: EmbedFooter {
                    text: "trend-bot".to_string(),
                },
                timestamp: now.to_rfc3339(),
            }],
        };
        self.send_with_retry(&payload).await
    }

    async fn send_with_retry(&self, payload: &WebhookPayload) -> Result<(), NotifyError> {
        let mut last_err = None;
        for attempt in 1..=MAX_RETRIES {
            let result = self
                .client
                .post(self.webhook_url.expose_secret())
                .json(payload)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    info!("webhook delivery succeeded");
                    return Ok(());
                }
                Ok(response) => {
                    let status = response.status();
                    warn!(%status, attempt, "webhook delivery rejected");
                    last_err = Some(NotifyError::Status { status });
                }
                Err(e) => {
                    warn!(error = %e, attempt, "webhook delivery failed");
                    last_err = Some(TransportSnafu.into_error(e));
                }
            }

            if attempt < MAX_RETRIES {
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }

        let err = last_err.expect("at least one attempt ran");
        error!(error = %err, "webhook delivery gave up");
        Err(err)
    }
}

/// Assemble the full report payload; `None` when no timeframe survived.
fn build_report_payload(
    symbol: &str,
    session: TradingSession,
    reports: &IndexMap<Timeframe, TimeframeReport>,
    now: DateTime<Utc>,
) -> Option<WebhookPayload> {
    let embeds: Vec<Embed> = reports
        .iter()
        .filter_map(|(timeframe, report)| {
            if let Some(reason) = &report.advice.error {
                error!(%timeframe, reason, "dropping errored timeframe from the report");
                return None;
            }
            Some(build_timeframe_embed(*timeframe, report, now))
        })
        .collect();

    if embeds.is_empty() {
        return None;
    }

    Some(WebhookPayload {
        content: format!(
            "📊 **{symbol} {} report** ({})",
            session.display_name(),
            now.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        embeds,
    })
}

fn build_timeframe_embed(
    timeframe: Timeframe,
    report: &TimeframeReport,
    now: DateTime<Utc>,
) -> Embed {
    let advice = &report.advice;
    let field = |name: &str, value: &str, inline: bool| EmbedField {
        name: name.to_string(),
        value: if value.is_empty() {
            "no data".to_string()
        } else {
            value.to_string()
        },
        inline,
    };

    Embed {
        title: format!("{timeframe} analysis"),
        color: judgment_color(&advice.judgment),
        fields: vec![
            field("Judgment", &advice.judgment, true),
            field(
                "Overall signal",
                &report
                    .analysis
                    .signals
                    .get("overall")
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
                true,
            ),
            field("Outlook", &advice.outlook, false),
            field("Reasoning", &advice.reasoning, false),
            field("Advice", &advice.advice, false),
        ],
        footer: EmbedFooter {
            text: format!("trend-bot • {timeframe} analysis"),
        },
        timestamp: now.to_rfc3339(),
    }
}

fn judgment_color(judgment: &str) -> u32 {
    match judgment.trim().to_lowercase().as_str() {
        "strong buy" => COLOR_STRONG_BUY,
        "weak buy" => COLOR_WEAK_BUY,
        "neutral" => COLOR_NEUTRAL,
        "weak sell" => COLOR_WEAK_SELL,
        "strong sell" => COLOR_STRONG_SELL,
        _ => COLOR_UNKNOWN,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use ta_engine::{AnalysisResult, Signal, SignalSet};

    use crate::advisor::MarketAdvice;

    use super::*;

    fn report(error: Option<&str>) -> TimeframeReport {
        let mut signals = SignalSet::new();
        signals.insert("overall".to_string(), Signal::Buy);
        TimeframeReport {
            analysis: AnalysisResult {
                timeframe: Timeframe::H1,
                indicators: IndexMap::new(),
                signals,
                summary: None,
            },
            advice: MarketAdvice {
                judgment: "weak buy".to_string(),
                outlook: "steady".to_string(),
                reasoning: "trend intact".to_string(),
                advice: "watch the 4h".to_string(),
                error: error.map(|e| e.to_string()),
            },
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
    }

    #[test]
    fn payload_has_one_embed_per_valid_timeframe() {
        let mut reports = IndexMap::new();
        reports.insert(Timeframe::H1, report(None));

        let payload =
            build_report_payload("BTC/USDT", TradingSession::Asia, &reports, fixed_now()).unwrap();

        assert!(payload.content.contains("BTC/USDT Asia session report"));
        assert_eq!(payload.embeds.len(), 1);
        let embed = &payload.embeds[0];
        assert_eq!(embed.title, "1h analysis");
        assert_eq!(embed.color, COLOR_WEAK_BUY);
        assert_eq!(embed.fields[0].value, "weak buy");
        assert_eq!(embed.fields[1].value, "BUY");
    }

    #[test]
    fn errored_timeframes_are_dropped() {
        let mut reports = IndexMap::new();
        reports.insert(Timeframe::H1, report(Some("HTTP 500")));
        reports.insert(Timeframe::H4, report(None));

        let payload =
            build_report_payload("BTC/USDT", TradingSession::Us, &reports, fixed_now()).unwrap();
        assert_eq!(payload.embeds.len(), 1);
    }

    #[test]
    fn all_errored_timeframes_leave_nothing_to_send() {
        let mut reports = IndexMap::new();
        reports.insert(Timeframe::H1, report(Some("HTTP 500")));

        assert!(
            build_report_payload("BTC/USDT", TradingSession::Us, &reports, fixed_now()).is_none()
        );
    }

    #[test]
    fn judgment_colors_cover_the_scale() {
        assert_eq!(judgment_color("Strong Buy"), COLOR_STRONG_BUY);
        assert_eq!(judgment_color("neutral"), COLOR_NEUTRAL);
        assert_eq!(judgment_color("strong sell"), COLOR_STRONG_SELL);
        assert_eq!(judgment_color("whatever"), COLOR_UNKNOWN);
    }

    #[test]
    fn payload_serializes_to_the_webhook_wire_shape() {
        let mut reports = IndexMap::new();
        reports.insert(Timeframe::H1, report(None));
        let payload =
            build_report_payload("BTC/USDT", TradingSession::Asia, &reports, fixed_now()).unwrap();

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["embeds"][0]["color"], 0x66CC66);
        assert_eq!(json["embeds"][0]["fields"][0]["name"], "Judgment");
        assert_eq!(json["embeds"][0]["footer"]["text"], "trend-bot • 1h analysis");
        assert!(json["embeds"][0]["timestamp"].as_str().unwrap().starts_with("2025-03-10T09:00:00"));
    }

    #[test]
    fn empty_advice_fields_render_a_placeholder() {
        let mut r = report(None);
        r.advice.outlook = String::new();
        let embed = build_timeframe_embed(Timeframe::H1, &r, fixed_now());
        assert_eq!(embed.fields[2].value, "no data");
    }
}
