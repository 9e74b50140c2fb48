//! LLM collaborator: turns one Analysis Result into a short narrative
//! trade call.
//!
//! The advisor never fails an analysis pass: any API problem after the retry
//! budget is folded into a [`MarketAdvice`] error-marker record so the
//! notifier can still report the timeframes that worked.

use std::time::Duration;

use indexmap::IndexMap;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use snafu::{Backtrace, ResultExt, Snafu};
use tracing::{info, warn};

use market_data_feed::models::timeframe::Timeframe;
use ta_engine::AnalysisResult;

use crate::config::AdvisorConfig;

const API_URL: &str = "https://api.openai.com/v1/chat/completions";
const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);
/// Pause between per-timeframe calls, for API rate limits.
const PACING_DELAY: Duration = Duration::from_secs(1);

const SYSTEM_PROMPT: &str =
    "You are a professional trader analyzing cryptocurrency markets.";

#[derive(Debug, Snafu)]
pub enum AdvisorInitError {
    #[snafu(display("failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },
}

#[derive(Debug, Snafu)]
enum CompletionError {
    #[snafu(display("transport failure: {source}"))]
    Transport {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("API answered HTTP {status}: {message}"))]
    Api {
        status: reqwest::StatusCode,
        message: String,
    },

    #[snafu(display("response carried no choices"))]
    EmptyResponse,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Structured narrative read for one timeframe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketAdvice {
    pub judgment: String,
    pub outlook: String,
    pub reasoning: String,
    pub advice: String,
    /// Set when the call failed and the other fields are placeholders.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MarketAdvice {
    fn error_marker(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            judgment: "unavailable".to_string(),
            outlook: "the advisor call failed; only raw signals are available".to_string(),
            reasoning: message.clone(),
            advice: "retry on the next scheduled report".to_string(),
            error: Some(message),
        }
    }
}

pub struct MarketAdvisor {
    client: Client,
    api_key: SecretString,
    config: AdvisorConfig,
}

impl MarketAdvisor {
    pub fn new(config: AdvisorConfig, api_key: SecretString) -> Result<Self, AdvisorInitError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context(ClientBuildSnafu)?;
        Ok(Self {
            client,
            api_key,
            config,
        })
    }

    /// Ask for a read on one timeframe. Absorbs failures into an
    /// error-marker record.
    pub async fn review(&self, symbol: &str, analysis: &AnalysisResult) -> MarketAdvice {
        let prompt = build_prompt(symbol, analysis);

        for attempt in 1..=MAX_ATTEMPTS {
            match self.request_completion(&prompt).await {
                Ok(text) => {
                    info!(timeframe = %analysis.timeframe, "advisor reply received");
                    return parse_advice(&text);
                }
                Err(e) => {
                    warn!(
                        timeframe = %analysis.timeframe,
                        attempt,
                        error = %e,
                        "advisor call failed"
                    );
                    if attempt < MAX_ATTEMPTS {
                        tokio::time::sleep(RETRY_DELAY).await;
                    } else {
                        return MarketAdvice::error_marker(e.to_string());
                    }
                }
            }
        }
        unreachable!("loop either returns a reply or an error marker")
    }

    /// Review every timeframe in order, pacing the calls.
    pub async fn review_all(
        &self,
        symbol: &str,
        analyses: &IndexMap<Timeframe, AnalysisResult>,
    ) -> IndexMap<Timeframe, MarketAdvice> {
        let mut out = IndexMap::with_capacity(analyses.len());
        for (i, (&timeframe, analysis)) in analyses.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(PACING_DELAY).await;
            }
            out.insert(timeframe, self.review(symbol, analysis).await);
        }
        out
    }

    async fn request_completion(&self, prompt: &str) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .client
            .post(API_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .context(TransportSnafu)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown API error".to_string());
            return ApiSnafu { status, message }.fail();
        }

        let parsed: ChatResponse = response.json().await.context(TransportSnafu)?;
        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            EmptyResponseSnafu.build()
        })?;
        Ok(choice.message.content.trim().to_string())
    }
}

/// Render the analysis record into the fixed prompt format.
fn build_prompt(symbol: &str, analysis: &AnalysisResult) -> String {
    let timeframe = analysis.timeframe;
    let (price, change, change_pct, trend) = match &analysis.summary {
        Some(s) => (
            format!("{:.2}", s.current_price),
            format!("{:.2}", s.price_change),
            format!("{:.2}", s.price_change_pct),
            s.trend.to_string(),
        ),
        None => (
            "N/A".to_string(),
            "N/A".to_string(),
            "N/A".to_string(),
            "unknown".to_string(),
        ),
    };

    let mut prompt = format!(
        "You are a cryptocurrency trading advisor. Analyze the following \
         {timeframe} market data for {symbol} and give a concise trade call.\n\n\
         [Market data]\n\
         - Current price: {price} USDT\n\
         - Price change: {change} USDT ({change_pct}%)\n\
         - Overall trend: {trend}\n\n\
         [Technical indicators]\n"
    );

    for (name, value) in &analysis.indicators {
        prompt.push_str(&format!("- {name}: {value}\n"));
    }

    prompt.push_str("\n[Signals]\n");
    for (name, signal) in &analysis.signals {
        prompt.push_str(&format!("- {name}: {signal}\n"));
    }

    prompt.push_str(
        "\nBased on the data above, state your trade call (strong buy / weak buy / \
         neutral / weak sell / strong sell) and justify it in 3-4 short lines, \
         covering the most important indicators and the short- and mid-term view.\n\
         Answer in exactly this format:\n\n\
         Judgment: [strong buy/weak buy/neutral/weak sell/strong sell]\n\
         Outlook: [market view, at most 100 characters]\n\
         Reasoning: [indicator-based rationale, at most 100 characters]\n\
         Advice: [one short caution for traders]\n",
    );

    prompt
}

/// Parse the line-oriented reply into a structured record.
///
/// Unrecognized lines are ignored; missing sections stay empty rather than
/// failing the pass.
fn parse_advice(text: &str) -> MarketAdvice {
    let mut advice = MarketAdvice {
        judgment: "unknown".to_string(),
        outlook: String::new(),
        reasoning: String::new(),
        advice: String::new(),
        error: None,
    };

    for line in text.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Judgment:") {
            advice.judgment = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("Outlook:") {
            advice.outlook = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("Reasoning:") {
            advice.reasoning = rest.trim().to_string();
        } else if let Some(rest) = line.strip_prefix("Advice:") {
            advice.advice = rest.trim().to_string();
        }
    }

    advice
}
