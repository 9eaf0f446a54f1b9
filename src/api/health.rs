//! Shared health state for the /health endpoint.
//! Updated by the ETL pipeline after each cycle.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

use crate::analyzer::AnalysisSummary;
use crate::scraper::{CycleOutcome, ScrapeSummary};

#[derive(Default)]
pub struct HealthState {
    /// Unix seconds of the last scrape hour (0 = never ran).
    pub last_scrape_at: AtomicI64,
    pub last_scrape_succeeded: AtomicU64,
    pub last_scrape_failed: AtomicU64,
    /// False once a scrape cycle aborted or fetched nothing.
    pub last_scrape_ok: AtomicBool,
    /// Unix seconds of the last analysis hour (0 = never ran).
    pub last_analysis_at: AtomicI64,
    pub last_analysis_eligible: AtomicU64,
    pub last_analysis_ok: AtomicBool,
}

#[derive(Debug, Serialize)]
pub struct HealthSnapshot {
    pub status: &'static str,
    pub last_scrape_at: Option<i64>,
    pub last_scrape_succeeded: u64,
    pub last_scrape_failed: u64,
    pub last_analysis_at: Option<i64>,
    pub last_analysis_eligible: u64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_scrape(&self, summary: &ScrapeSummary) {
        self.last_scrape_at
            .store(summary.collected_at.timestamp(), Ordering::Relaxed);
        self.last_scrape_succeeded
            .store(summary.succeeded as u64, Ordering::Relaxed);
        self.last_scrape_failed
            .store(summary.failed.len() as u64, Ordering::Relaxed);
        self.last_scrape_ok.store(
            summary.outcome() != CycleOutcome::TotalFailure,
            Ordering::Relaxed,
        );
    }

    pub fn record_scrape_aborted(&self) {
        self.last_scrape_ok.store(false, Ordering::Relaxed);
    }

    pub fn record_analysis(&self, summary: &AnalysisSummary) {
        self.last_analysis_at
            .store(summary.generated_at.timestamp(), Ordering::Relaxed);
        self.last_analysis_eligible
            .store(summary.eligible as u64, Ordering::Relaxed);
        self.last_analysis_ok.store(true, Ordering::Relaxed);
    }

    pub fn record_analysis_aborted(&self) {
        self.last_analysis_ok.store(false, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let scrape_at = self.last_scrape_at.load(Ordering::Relaxed);
        let analysis_at = self.last_analysis_at.load(Ordering::Relaxed);
        let healthy = self.last_scrape_ok.load(Ordering::Relaxed)
            && self.last_analysis_ok.load(Ordering::Relaxed);
        HealthSnapshot {
            status: if healthy { "healthy" } else { "degraded" },
            last_scrape_at: (scrape_at > 0).then_some(scrape_at),
            last_scrape_succeeded: self.last_scrape_succeeded.load(Ordering::Relaxed),
            last_scrape_failed: self.last_scrape_failed.load(Ordering::Relaxed),
            last_analysis_at: (analysis_at > 0).then_some(analysis_at),
            last_analysis_eligible: self.last_analysis_eligible.load(Ordering::Relaxed),
        }
    }
}
