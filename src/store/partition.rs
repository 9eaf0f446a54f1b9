use std::path::PathBuf;

use chrono::{DateTime, Datelike, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// What a partition holds. Each kind is its own top-level namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DataKind {
    RawPrice,
    RawOrderbook,
    ReportOverall,
    ReportCategory,
    ReportItem,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::RawPrice => "raw-price",
            DataKind::RawOrderbook => "raw-orderbook",
            DataKind::ReportOverall => "report-overall",
            DataKind::ReportCategory => "report-category",
            DataKind::ReportItem => "report-item",
        }
    }
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of exactly one document: a kind plus one UTC hour.
///
/// The hour is stored already truncated, so two timestamps in the same hour
/// always produce equal keys. Ordering is by kind, then by hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionKey {
    kind: DataKind,
    hour: DateTime<Utc>,
}

impl PartitionKey {
    pub fn new(kind: DataKind, timestamp: DateTime<Utc>) -> Self {
        Self { kind, hour: truncate_to_hour(timestamp) }
    }

    pub fn kind(&self) -> DataKind {
        self.kind
    }

    /// Start of the partition's hour.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.hour
    }

    pub fn year(&self) -> i32 {
        self.hour.year()
    }

    pub fn month(&self) -> u32 {
        self.hour.month()
    }

    pub fn day(&self) -> u32 {
        self.hour.day()
    }

    pub fn hour(&self) -> u32 {
        self.hour.hour()
    }

    /// `{kind}/{year}/{month}/{day}` relative to the store root.
    pub fn day_dir(&self) -> PathBuf {
        PathBuf::from(self.kind.as_str())
            .join(format!("{:04}", self.year()))
            .join(format!("{:02}", self.month()))
            .join(format!("{:02}", self.day()))
    }

    /// `{kind}/{year}/{month}/{day}/{hour}.json` relative to the store root.
    pub fn relative_path(&self) -> PathBuf {
        self.day_dir().join(format!("{:02}.json", self.hour()))
    }
}

impl std::fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{:04}/{:02}/{:02}/{:02}",
            self.kind,
            self.year(),
            self.month(),
            self.day(),
            self.hour()
        )
    }
}

pub fn truncate_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    let secs = ts.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(3600), 0).unwrap_or(ts)
}

pub fn truncate_to_day(ts: DateTime<Utc>) -> DateTime<Utc> {
    let secs = ts.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(86_400), 0).unwrap_or(ts)
}

pub fn hours(n: i64) -> TimeDelta {
    TimeDelta::hours(n)
}
