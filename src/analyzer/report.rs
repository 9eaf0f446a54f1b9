//! Report documents written under the `report-*` kinds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Category, ItemKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Overall,
    Category,
    Item,
}

/// One ranked row. Only ever stored inside a [`RankingReport`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub item_id: u32,
    pub enhancement_level: u8,
    pub name: String,
    pub category: Category,
    pub price: u64,
    pub acquisition_cost: f64,
    pub profit: f64,
    pub rate_of_return: f64,
    pub stock: u64,
}

impl AnalysisRecord {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.item_id, self.enhancement_level)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingReport {
    pub report_type: ReportType,
    pub generated_at: DateTime<Utc>,
    /// Set for category reports only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    pub entries: Vec<AnalysisRecord>,
}

/// The report-category document: one ranking per registry category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryReportSet {
    pub generated_at: DateTime<Utc>,
    pub reports: Vec<RankingReport>,
}

impl CategoryReportSet {
    pub fn get(&self, category: Category) -> Option<&RankingReport> {
        self.reports.iter().find(|r| r.category == Some(category))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDetailReport {
    pub report_type: ReportType,
    pub generated_at: DateTime<Utc>,
    pub items: Vec<ItemDetail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDetail {
    pub item_id: u32,
    pub enhancement_level: u8,
    pub name: String,
    pub category: Category,
    /// Oldest first.
    pub trend: Vec<TrendPoint>,
    pub book: BookLadder,
    /// Oldest first.
    pub volume: Vec<VolumeBucket>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub price: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: u64,
    pub quantity: u64,
}

/// Aggregated order book. Both sides are sorted by ascending price.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLadder {
    pub best_bid: Option<u64>,
    pub best_ask: Option<u64>,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeBucket {
    pub interval_start: DateTime<Utc>,
    pub trade_count: u64,
}

/// One row of the on-demand trade-activity ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub item_id: u32,
    pub enhancement_level: u8,
    pub name: String,
    pub category: Category,
    pub volume_change: u64,
    pub trades_per_day: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityReport {
    pub period_days: u32,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub entries: Vec<ActivityRecord>,
}
