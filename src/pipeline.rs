use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{error, info, warn};

use crate::analyzer::{AnalysisSummary, Analyzer};
use crate::api::HealthState;
use crate::client::MarketSource;
use crate::scraper::{CycleOutcome, ScrapeSummary, Scraper};
use crate::store::truncate_to_hour;

/// What one ETL pass produced. `None` means that cycle aborted.
#[derive(Debug, Clone, PartialEq)]
pub struct EtlRun {
    pub scrape: Option<ScrapeSummary>,
    pub analysis: Option<AnalysisSummary>,
}

impl EtlRun {
    /// Both cycles ran and the scrape fetched at least one item.
    pub fn succeeded(&self) -> bool {
        let scraped = self
            .scrape
            .as_ref()
            .is_some_and(|s| s.outcome() != CycleOutcome::TotalFailure);
        scraped && self.analysis.is_some()
    }
}

/// Runs scrape then analysis, one at a time, and records the outcome in the
/// shared health state.
pub struct EtlPipeline<S> {
    scraper: Scraper<S>,
    analyzer: Analyzer,
    health: Arc<HealthState>,
}

impl<S: MarketSource> EtlPipeline<S> {
    pub fn new(scraper: Scraper<S>, analyzer: Analyzer, health: Arc<HealthState>) -> Self {
        Self { scraper, analyzer, health }
    }

    pub async fn run_once(&self) -> EtlRun {
        self.run_once_at(Utc::now()).await
    }

    /// A failed scrape does not skip the analysis; a stale report beats none.
    pub async fn run_once_at(&self, now: DateTime<Utc>) -> EtlRun {
        let scrape = match self.scraper.run_scrape_cycle_at(now).await {
            Ok(summary) => {
                self.health.record_scrape(&summary);
                Some(summary)
            }
            Err(e) => {
                error!("Scrape cycle failed: {e}");
                self.health.record_scrape_aborted();
                None
            }
        };

        let analysis = match self.analyzer.run_analysis_cycle_at(now).await {
            Ok(summary) => {
                self.health.record_analysis(&summary);
                Some(summary)
            }
            Err(e) => {
                error!("Analysis cycle failed: {e}");
                self.health.record_analysis_aborted();
                None
            }
        };

        EtlRun { scrape, analysis }
    }

    /// Run immediately, then at the top of every hour. Never returns.
    pub async fn run_hourly(self) {
        loop {
            let run = self.run_once().await;
            if !run.succeeded() {
                warn!("ETL pass finished with failures, next pass at the top of the hour");
            }
            let wait = until_next_hour(Utc::now());
            info!(secs = wait.as_secs(), "Sleeping until next ETL pass");
            tokio::time::sleep(wait).await;
        }
    }
}

/// Time left until the next top of the hour. Never zero.
pub fn until_next_hour(now: DateTime<Utc>) -> Duration {
    let next = truncate_to_hour(now) + TimeDelta::hours(1);
    (next - now).to_std().unwrap_or(Duration::from_secs(3600))
}
