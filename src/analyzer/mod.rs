//! Analyzer: turns the trailing window of raw sheets into ranked reports.
//!
//! One cycle reads the raw-price and raw-orderbook sheets, picks the most
//! recent entry per item key, evaluates profit and rate of return for every
//! tracked item with enough data, and writes three documents for the
//! generation hour: the overall ranking, one ranking per category, and the
//! item-detail document. Items without data are excluded, never fatal.

pub mod activity;
pub mod detail;
pub mod report;
pub mod stats;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::{
    Config, ANALYSIS_LOOKBACK_HOURS, MARKET_FEE_RATE, TREND_WINDOW_HOURS, VOLUME_INTERVAL_HOURS,
};
use crate::error::Result;
use crate::registry::Registry;
use crate::store::{hours, truncate_to_hour, DataKind, PartitionKey, PartitionStore};
use crate::types::{BookEntry, BookSheet, ItemKey, Keyed, PriceEntry, PriceSheet, Sheet};

use report::{
    AnalysisRecord, CategoryReportSet, ItemDetail, ItemDetailReport, RankingReport, ReportType,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzerSettings {
    pub fee_rate: f64,
    pub lookback_hours: i64,
    pub trend_window_hours: i64,
    pub volume_interval_hours: i64,
}

impl AnalyzerSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            fee_rate: cfg.fee_rate,
            lookback_hours: cfg.lookback_hours,
            trend_window_hours: cfg.trend_window_hours,
            volume_interval_hours: cfg.volume_interval_hours,
        }
    }
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        Self {
            fee_rate: MARKET_FEE_RATE,
            lookback_hours: ANALYSIS_LOOKBACK_HOURS,
            trend_window_hours: TREND_WINDOW_HOURS,
            volume_interval_hours: VOLUME_INTERVAL_HOURS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisSummary {
    pub generated_at: DateTime<Utc>,
    /// Items that made it into the rankings.
    pub eligible: usize,
    /// Tracked items left out for lack of data.
    pub excluded: BTreeSet<ItemKey>,
    pub categories: usize,
    pub detailed_items: usize,
}

pub struct Analyzer {
    store: Arc<PartitionStore>,
    registry: Arc<Registry>,
    settings: AnalyzerSettings,
}

/// Most recent entry per key. `sheets` is oldest first.
fn latest_entries<T: Keyed>(sheets: &[(PartitionKey, Sheet<T>)]) -> BTreeMap<ItemKey, &T> {
    let mut latest = BTreeMap::new();
    for (_, sheet) in sheets.iter().rev() {
        for entry in &sheet.entries {
            latest.entry(entry.key()).or_insert(entry);
        }
    }
    latest
}

impl Analyzer {
    pub fn new(store: Arc<PartitionStore>, registry: Arc<Registry>, settings: AnalyzerSettings) -> Self {
        Self { store, registry, settings }
    }

    pub async fn run_analysis_cycle(&self) -> Result<AnalysisSummary> {
        self.run_analysis_cycle_at(Utc::now()).await
    }

    /// Analyze the window ending at `now`. Rerunning for the same hour
    /// replaces that hour's reports.
    pub async fn run_analysis_cycle_at(&self, now: DateTime<Utc>) -> Result<AnalysisSummary> {
        let generated_at = truncate_to_hour(now);
        let lookback_from = generated_at - hours(self.settings.lookback_hours);

        let price_sheets: Vec<(PartitionKey, PriceSheet)> = self
            .store
            .list_range(DataKind::RawPrice, lookback_from, generated_at)
            .await?;
        let book_sheets: Vec<(PartitionKey, BookSheet)> = self
            .store
            .list_range(DataKind::RawOrderbook, lookback_from, generated_at)
            .await?;
        debug!(
            price_sheets = price_sheets.len(),
            book_sheets = book_sheets.len(),
            "Loaded raw window"
        );

        let latest_prices: BTreeMap<ItemKey, &PriceEntry> = latest_entries(&price_sheets);
        let latest_books: BTreeMap<ItemKey, &BookEntry> = latest_entries(&book_sheets);
        let price_of: BTreeMap<ItemKey, u64> =
            latest_prices.iter().map(|(k, e)| (*k, e.price)).collect();

        let mut records: Vec<AnalysisRecord> = Vec::new();
        let mut excluded = BTreeSet::new();
        for item in self.registry.items() {
            let key = item.key();
            let evaluated = latest_prices.get(&key).and_then(|entry| {
                stats::acquisition_cost(key, &price_of)
                    .map(|cost| stats::evaluate(entry, cost, self.settings.fee_rate))
            });
            match evaluated {
                Some(record) => records.push(record),
                None => {
                    debug!(item = %key, "No data in window, excluded from ranking");
                    excluded.insert(key);
                }
            }
        }

        let overall = RankingReport {
            report_type: ReportType::Overall,
            generated_at,
            category: None,
            entries: stats::rank(&records, None),
        };

        let categories = self.registry.categories();
        let by_category = CategoryReportSet {
            generated_at,
            reports: categories
                .iter()
                .map(|&category| {
                    let same_category: &dyn Fn(&AnalysisRecord) -> bool =
                        &move |r| r.category == category;
                    RankingReport {
                        report_type: ReportType::Category,
                        generated_at,
                        category: Some(category),
                        entries: stats::rank(&records, Some(same_category)),
                    }
                })
                .collect(),
        };

        let detail = self.item_details(generated_at, &latest_prices, &latest_books).await?;

        self.store
            .write(&PartitionKey::new(DataKind::ReportOverall, generated_at), &overall)
            .await?;
        self.store
            .write(&PartitionKey::new(DataKind::ReportCategory, generated_at), &by_category)
            .await?;
        self.store
            .write(&PartitionKey::new(DataKind::ReportItem, generated_at), &detail)
            .await?;

        let summary = AnalysisSummary {
            generated_at,
            eligible: records.len(),
            excluded,
            categories: categories.len(),
            detailed_items: detail.items.len(),
        };
        info!(
            hour = %generated_at,
            eligible = summary.eligible,
            excluded = summary.excluded.len(),
            categories = summary.categories,
            detailed_items = summary.detailed_items,
            "Analysis cycle complete"
        );
        Ok(summary)
    }

    async fn item_details(
        &self,
        generated_at: DateTime<Utc>,
        latest_prices: &BTreeMap<ItemKey, &PriceEntry>,
        latest_books: &BTreeMap<ItemKey, &BookEntry>,
    ) -> Result<ItemDetailReport> {
        let trend_sheets: Vec<(PartitionKey, PriceSheet)> = self
            .store
            .list_range(
                DataKind::RawPrice,
                generated_at - hours(self.settings.trend_window_hours),
                generated_at,
            )
            .await?;

        let items = self
            .registry
            .items()
            .iter()
            .filter_map(|item| {
                let key = item.key();
                let latest = latest_prices.get(&key)?;
                Some(ItemDetail {
                    item_id: key.item_id,
                    enhancement_level: key.enhancement_level,
                    name: latest.name.clone(),
                    category: item.category,
                    trend: detail::trend_series(key, &trend_sheets),
                    book: latest_books
                        .get(&key)
                        .map(|b| detail::book_ladder(b))
                        .unwrap_or_default(),
                    volume: detail::volume_series(
                        key,
                        &trend_sheets,
                        self.settings.volume_interval_hours,
                    ),
                })
            })
            .collect();

        Ok(ItemDetailReport {
            report_type: ReportType::Item,
            generated_at,
            items,
        })
    }
}
