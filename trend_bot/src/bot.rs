//! The analysis pass and the notification schedule around it.

use std::time::Duration;

use anyhow::{Context, bail};
use chrono::{NaiveDate, NaiveTime, Utc};
use indexmap::IndexMap;
use tracing::{error, info, warn};

use market_data_feed::fetcher::{MultiSourceFetcher, RetryPolicy};
use market_data_feed::models::timeframe::Timeframe;
use ta_engine::{AnalysisResult, analyze};

use crate::advisor::{MarketAdvice, MarketAdvisor};
use crate::config::{BotConfig, Secrets};
use crate::notifier::DiscordNotifier;
use crate::session::{self, TradingSession};

/// Poll cadence of the scheduler loop.
const TICK: Duration = Duration::from_secs(60);

/// One timeframe's full output: engine analysis plus the advisor's read.
#[derive(Debug, Clone)]
pub struct TimeframeReport {
    pub analysis: AnalysisResult,
    pub advice: MarketAdvice,
}

pub struct TrendBot {
    config: BotConfig,
    fetcher: MultiSourceFetcher,
    advisor: MarketAdvisor,
    notifier: DiscordNotifier,
}

impl TrendBot {
    /// Wire up all collaborators from a validated config and env secrets.
    pub fn new(config: BotConfig, secrets: Secrets) -> anyhow::Result<Self> {
        config.validate()?;

        let fetcher = MultiSourceFetcher::from_ids(
            config.primary_exchange,
            &config.fallback_exchanges,
            RetryPolicy::default(),
        )
        .context("failed to build exchange adapters")?;

        let advisor = MarketAdvisor::new(config.advisor.clone(), secrets.openai_api_key)
            .context("failed to build the market advisor")?;

        let notifier = DiscordNotifier::new(secrets.discord_webhook_url)
            .context("failed to build the Discord notifier")?;

        Ok(Self {
            config,
            fetcher,
            advisor,
            notifier,
        })
    }

    /// Fetch, analyze, and review every configured timeframe.
    ///
    /// Timeframes with no data are simply missing from the result; the pass
    /// as a whole fails only when *no* timeframe produced data.
    pub async fn run_analysis(&self) -> anyhow::Result<IndexMap<Timeframe, TimeframeReport>> {
        info!(
            symbol = %self.config.symbol,
            timeframes = self.config.timeframes.len(),
            "starting analysis pass"
        );

        let data = self
            .fetcher
            .fetch_all(&self.config.symbol, &self.config.timeframes)
            .await;

        if data.is_empty() {
            bail!("no timeframe returned any market data");
        }
        if data.len() < self.config.timeframes.len() {
            warn!(
                fetched = data.len(),
                configured = self.config.timeframes.len(),
                "some timeframes returned no data and will be skipped"
            );
        }

        let mut analyses = IndexMap::with_capacity(data.len());
        for (&timeframe, series) in &data {
            analyses.insert(timeframe, analyze(series, &self.config.indicators));
        }

        let mut advice = self.advisor.review_all(&self.config.symbol, &analyses).await;

        let reports = analyses
            .into_iter()
            .filter_map(|(timeframe, analysis)| {
                let advice = advice.shift_remove(&timeframe)?;
                Some((timeframe, TimeframeReport { analysis, advice }))
            })
            .collect();

        Ok(reports)
    }

    /// One full pass: analyze and deliver (or report the failure).
    pub async fn notify_once(&self) -> anyhow::Result<()> {
        let session = TradingSession::current();
        info!(session = session.label(), "running report pass");

        match self.run_analysis().await {
            Ok(reports) => self
                .notifier
                .send_market_report(&self.config.symbol, session, &reports, Utc::now())
                .await
                .context("failed to deliver the market report"),
            Err(e) => {
                error!(error = %format!("{e:#}"), "analysis pass failed");
                if let Err(notify_err) = self
                    .notifier
                    .send_error_notification(&format!("{e:#}"))
                    .await
                {
                    warn!(error = %notify_err, "error notification also failed");
                }
                Err(e)
            }
        }
    }

    /// Poll the wall clock and fire each configured slot once per day.
    pub async fn run_scheduled(&self) -> anyhow::Result<()> {
        let schedule = self.config.notification_schedule()?;
        info!(
            slots = schedule.len(),
            "scheduler started; reports at {:?} UTC", self.config.notification_times
        );

        let mut last_fired: Option<(NaiveDate, NaiveTime)> = None;
        loop {
            let now = Utc::now();
            if let Some(slot) = session::due_slot(now, &schedule) {
                let key = (now.date_naive(), slot);
                if last_fired != Some(key) {
                    last_fired = Some(key);
                    if let Err(e) = self.notify_once().await {
                        error!(error = %format!("{e:#}"), "scheduled pass failed");
                    }
                }
            }
            tokio::time::sleep(TICK).await;
        }
    }
}
