use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::report::{BookLadder, PriceLevel, TrendPoint, VolumeBucket};
use crate::store::PartitionKey;
use crate::types::{BookEntry, ItemKey, Order, PriceEntry, PriceSheet};

/// `key`'s entries across `sheets`, in sheet order, stamped with the partition hour.
fn observations<'a>(
    key: ItemKey,
    sheets: &'a [(PartitionKey, PriceSheet)],
) -> impl Iterator<Item = (DateTime<Utc>, &'a PriceEntry)> + 'a {
    sheets
        .iter()
        .filter_map(move |(pk, sheet)| sheet.get(key).map(|e| (pk.timestamp(), e)))
}

/// Price per hour, oldest first. `sheets` must come from an ascending range scan.
pub fn trend_series(key: ItemKey, sheets: &[(PartitionKey, PriceSheet)]) -> Vec<TrendPoint> {
    observations(key, sheets)
        .map(|(timestamp, e)| TrendPoint { timestamp, price: e.price })
        .collect()
}

fn aggregate(orders: &[Order]) -> BTreeMap<u64, u64> {
    let mut levels = BTreeMap::new();
    for o in orders.iter().filter(|o| o.quantity > 0) {
        *levels.entry(o.price).or_insert(0u64) += o.quantity;
    }
    levels
}

fn to_levels(levels: &BTreeMap<u64, u64>) -> Vec<PriceLevel> {
    levels
        .iter()
        .map(|(&price, &quantity)| PriceLevel { price, quantity })
        .collect()
}

/// Re-bucket a snapshot's orders by price level. Best bid is the highest buy
/// price, best ask the lowest sell price.
pub fn book_ladder(book: &BookEntry) -> BookLadder {
    let bids = aggregate(&book.buy_orders);
    let asks = aggregate(&book.sell_orders);
    BookLadder {
        best_bid: bids.keys().next_back().copied(),
        best_ask: asks.keys().next().copied(),
        bids: to_levels(&bids),
        asks: to_levels(&asks),
    }
}

fn bucket_start(ts: DateTime<Utc>, interval_secs: i64) -> DateTime<Utc> {
    let secs = ts.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(interval_secs), 0).unwrap_or(ts)
}

/// Trades per interval, derived from the cumulative `total_trades` counter.
///
/// Each delta between consecutive observations is attributed to the interval
/// holding the later one. A counter that goes backwards contributes 0.
pub fn volume_series(
    key: ItemKey,
    sheets: &[(PartitionKey, PriceSheet)],
    interval_hours: i64,
) -> Vec<VolumeBucket> {
    let interval_secs = interval_hours.max(1) * 3600;
    let mut buckets: BTreeMap<DateTime<Utc>, u64> = BTreeMap::new();
    let mut previous: Option<u64> = None;

    for (ts, entry) in observations(key, sheets) {
        let delta = previous.map_or(0, |p| entry.total_trades.saturating_sub(p));
        *buckets.entry(bucket_start(ts, interval_secs)).or_insert(0) += delta;
        previous = Some(entry.total_trades);
    }

    buckets
        .into_iter()
        .map(|(interval_start, trade_count)| VolumeBucket { interval_start, trade_count })
        .collect()
}
