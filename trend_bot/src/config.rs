//! Bot configuration: parsing, validation, and loading.
//!
//! Everything tunable lives in a TOML file deserialized into [`BotConfig`];
//! secrets never appear there and are read from the environment into
//! [`Secrets`] instead. Validation runs at load time so a bad period or an
//! unparseable notification time fails the start, not an analysis pass at
//! 01:00 UTC.
//!
//! Entrypoints:
//! - Parse + validate from a TOML string: [`load_config_str`]
//! - Parse + validate from a file path: [`load_config_path`]

use anyhow::{Context, bail};
use chrono::NaiveTime;
use secrecy::SecretString;
use serde::Deserialize;

use market_data_feed::{exchanges::ExchangeId, models::timeframe::Timeframe};
use shared_utils::env::get_env_var;
use ta_engine::IndicatorConfig;

/// LLM advisor knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdvisorConfig {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.5,
            max_tokens: 300,
        }
    }
}

/// Full bot configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BotConfig {
    /// Canonical instrument, "BASE/QUOTE".
    pub symbol: String,
    /// Venue tried first for every fetch.
    pub primary_exchange: ExchangeId,
    /// Venues tried, in order, after the primary's retries are exhausted.
    pub fallback_exchanges: Vec<ExchangeId>,
    /// Timeframes analyzed per pass, in report order.
    pub timeframes: Vec<Timeframe>,
    /// UTC wall-clock times ("HH:MM") at which a report is sent.
    pub notification_times: Vec<String>,
    pub indicators: IndicatorConfig,
    pub advisor: AdvisorConfig,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            symbol: "BTC/USDT".to_string(),
            primary_exchange: ExchangeId::Bybit,
            fallback_exchanges: vec![ExchangeId::Binance, ExchangeId::Okx],
            timeframes: vec![Timeframe::D1, Timeframe::H4, Timeframe::H1, Timeframe::M15],
            // Asia, Europe, US market opens (UTC).
            notification_times: vec!["09:00".into(), "17:00".into(), "01:00".into()],
            indicators: IndicatorConfig::default(),
            advisor: AdvisorConfig::default(),
        }
    }
}

impl BotConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.symbol.contains('/') || self.symbol.starts_with('/') || self.symbol.ends_with('/')
        {
            bail!("symbol must be of the form BASE/QUOTE, got {:?}", self.symbol);
        }
        if self.timeframes.is_empty() {
            bail!("at least one timeframe must be configured");
        }
        if self.notification_times.is_empty() {
            bail!("at least one notification time must be configured");
        }
        self.notification_schedule()?;
        self.indicators
            .validate()
            .context("invalid indicator configuration")?;
        Ok(())
    }

    /// The configured notification times parsed into wall-clock slots.
    pub fn notification_schedule(&self) -> anyhow::Result<Vec<NaiveTime>> {
        self.notification_times
            .iter()
            .map(|raw| {
                NaiveTime::parse_from_str(raw, "%H:%M")
                    .with_context(|| format!("notification time {raw:?} is not HH:MM"))
            })
            .collect()
    }
}

/// Parse and validate a config from a TOML string.
pub fn load_config_str(toml_str: &str) -> anyhow::Result<BotConfig> {
    let config: BotConfig = toml::from_str(toml_str).context("failed to parse config TOML")?;
    config.validate()?;
    Ok(config)
}

/// Read a config TOML file from disk, parse, and validate it.
pub fn load_config_path(path: impl AsRef<std::path::Path>) -> anyhow::Result<BotConfig> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read config file {}", path.as_ref().display()))?;
    load_config_str(&text)
}

/// Secrets read from the environment, never from the config file.
pub struct Secrets {
    pub openai_api_key: SecretString,
    pub discord_webhook_url: SecretString,
}

impl Secrets {
    /// Reads `OPENAI_API_KEY` and `DISCORD_WEBHOOK_URL`.
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            openai_api_key: SecretString::new(get_env_var("OPENAI_API_KEY")?.into()),
            discord_webhook_url: SecretString::new(get_env_var("DISCORD_WEBHOOK_URL")?.into()),
        })
    }
}
