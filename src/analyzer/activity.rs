//! Trade-activity ranking: which items changed hands most over the last N days.
//! Computed on demand from two raw-price sheets, never persisted.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use super::report::{ActivityRecord, ActivityReport};
use crate::config::MAX_ACTIVITY_PERIOD_DAYS;
use crate::error::{AppError, Result};
use crate::store::{truncate_to_hour, DataKind, PartitionStore};
use crate::types::{Keyed, PriceSheet};

/// Shortest span a per-day rate is computed over.
const MIN_SPAN_HOURS: i64 = 1;

/// Days between two sheets, never less than an hour.
fn span_days(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let secs = (to - from).num_seconds().max(MIN_SPAN_HOURS * 3600);
    secs as f64 / 86_400.0
}

/// Join `now` with `past` on item key. Items missing from either side are skipped.
///
/// `elapsed_days` is the time actually elapsed between the two sheets.
pub fn rank_activity(now: &PriceSheet, past: &PriceSheet, elapsed_days: f64) -> Vec<ActivityRecord> {
    let days = elapsed_days.max(MIN_SPAN_HOURS as f64 / 24.0);
    let mut out: Vec<ActivityRecord> = now
        .entries
        .iter()
        .filter_map(|current| {
            let before = past.get(current.key())?;
            let volume_change = current.total_trades.saturating_sub(before.total_trades);
            Some(ActivityRecord {
                item_id: current.item_id,
                enhancement_level: current.enhancement_level,
                name: current.name.clone(),
                category: current.category,
                volume_change,
                trades_per_day: volume_change as f64 / days,
            })
        })
        .collect();

    out.sort_by(|a, b| {
        b.trades_per_day
            .total_cmp(&a.trades_per_day)
            .then_with(|| (a.item_id, a.enhancement_level).cmp(&(b.item_id, b.enhancement_level)))
    });
    out
}

/// Latest raw-price sheet at or before `now`, against the one at or before
/// `now - period_days`. Each side is searched back at most `max_hours_back`.
///
/// Rates are per day of the span between the two sheets found, which can be
/// longer than the period. Without data on either side the report is empty.
pub async fn trade_activity(
    store: &PartitionStore,
    now: DateTime<Utc>,
    period_days: i64,
    max_hours_back: i64,
) -> Result<ActivityReport> {
    if !(1..=MAX_ACTIVITY_PERIOD_DAYS).contains(&period_days) {
        return Err(AppError::BadRequest(format!(
            "period must be between 1 and {MAX_ACTIVITY_PERIOD_DAYS} days, got {period_days}"
        )));
    }

    let empty = |to: DateTime<Utc>| ActivityReport {
        period_days: period_days as u32,
        from: to - TimeDelta::days(period_days),
        to,
        entries: Vec::new(),
    };

    let Some((now_key, now_sheet)) = store
        .latest::<PriceSheet>(DataKind::RawPrice, now, max_hours_back)
        .await?
    else {
        debug!("No recent raw-price sheet for activity ranking");
        return Ok(empty(truncate_to_hour(now)));
    };
    let to = now_key.timestamp();
    let Some((past_key, past_sheet)) = store
        .latest::<PriceSheet>(DataKind::RawPrice, to - TimeDelta::days(period_days), max_hours_back)
        .await?
    else {
        debug!(period_days, "No raw-price sheet at the start of the activity period");
        return Ok(empty(to));
    };

    let from = past_key.timestamp();
    Ok(ActivityReport {
        period_days: period_days as u32,
        from,
        to,
        entries: rank_activity(&now_sheet, &past_sheet, span_days(from, to)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PartitionKey;
    use crate::types::{Category, PriceEntry};
    use chrono::TimeZone;

    fn sheet(ts: DateTime<Utc>, rows: &[(u32, u8, u64)]) -> PriceSheet {
        let mut sheet = PriceSheet::new(ts);
        for &(item_id, level, total_trades) in rows {
            sheet.upsert(PriceEntry {
                item_id,
                enhancement_level: level,
                name: format!("item {item_id}"),
                category: Category::Accessory,
                timestamp: ts,
                price: 10,
                stock: 1,
                total_trades,
                base_price: 10,
                price_min: 0,
                price_max: 0,
                last_sold_at: None,
            });
        }
        sheet
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, d, 6, 0, 0).unwrap()
    }

    #[test]
    fn ranks_by_trades_per_day() {
        let past = sheet(day(5), &[(1, 0, 100), (2, 0, 100), (3, 0, 50), (4, 0, 500)]);
        let now = sheet(day(12), &[(1, 0, 170), (2, 0, 240), (3, 0, 120), (4, 0, 400), (5, 0, 9)]);
        let ranked = rank_activity(&now, &past, 7.0);

        let ids: Vec<u32> = ranked.iter().map(|r| r.item_id).collect();
        assert_eq!(ids, vec![2, 1, 3, 4]);
        assert_eq!(ranked[0].volume_change, 140);
        assert_eq!(ranked[0].trades_per_day, 20.0);
        // Counter went backwards.
        assert_eq!(ranked[3].volume_change, 0);
    }

    #[tokio::test]
    async fn rejects_out_of_range_period() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path());
        for period in [0, 31] {
            let err = trade_activity(&store, day(12), period, 24).await.unwrap_err();
            assert!(matches!(err, AppError::BadRequest(_)));
        }
    }

    #[tokio::test]
    async fn joins_sheets_period_apart() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path());
        for (ts, trades) in [(day(10), 100), (day(11), 130), (day(12), 160)] {
            store
                .write(&PartitionKey::new(DataKind::RawPrice, ts), &sheet(ts, &[(1, 0, trades)]))
                .await
                .unwrap();
        }

        let report = trade_activity(&store, day(12), 2, 24).await.unwrap();
        assert_eq!(report.from, day(10));
        assert_eq!(report.to, day(12));
        assert_eq!(report.entries[0].volume_change, 60);
        assert_eq!(report.entries[0].trades_per_day, 30.0);
    }

    #[tokio::test]
    async fn rate_uses_span_of_sheets_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path());
        // Nothing on the 11th, so the past side falls back a full day.
        for (ts, trades) in [(day(10), 100), (day(12), 160)] {
            store
                .write(&PartitionKey::new(DataKind::RawPrice, ts), &sheet(ts, &[(1, 0, trades)]))
                .await
                .unwrap();
        }

        let report = trade_activity(&store, day(12), 1, 24).await.unwrap();
        assert_eq!(report.period_days, 1);
        assert_eq!(report.from, day(10));
        assert_eq!(report.entries[0].volume_change, 60);
        assert_eq!(report.entries[0].trades_per_day, 30.0);
    }

    #[test]
    fn span_is_floored_at_one_hour() {
        assert_eq!(span_days(day(12), day(12)), 1.0 / 24.0);
        assert_eq!(span_days(day(10), day(12)), 2.0);
    }

    #[tokio::test]
    async fn missing_history_gives_empty_report() {
        let dir = tempfile::tempdir().unwrap();
        let store = PartitionStore::new(dir.path());
        store
            .write(&PartitionKey::new(DataKind::RawPrice, day(12)), &sheet(day(12), &[(1, 0, 10)]))
            .await
            .unwrap();

        let report = trade_activity(&store, day(12), 5, 24).await.unwrap();
        assert!(report.entries.is_empty());
        assert_eq!(report.to, day(12));
        assert_eq!(report.from, day(7));

        let empty_dir = tempfile::tempdir().unwrap();
        let nothing = trade_activity(&PartitionStore::new(empty_dir.path()), day(12), 5, 24)
            .await
            .unwrap();
        assert!(nothing.entries.is_empty());
    }
}
