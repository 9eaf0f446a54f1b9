use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::report::AnalysisRecord;
use crate::types::{ItemKey, PriceEntry};

/// Cost of producing level `L` by combining level `L-1` with a base copy.
///
/// Level 0 is bought outright and has no acquisition step, so its cost is 0.
/// Returns `None` when either input has no price in the window.
pub fn acquisition_cost(key: ItemKey, prices: &BTreeMap<ItemKey, u64>) -> Option<u64> {
    if key.enhancement_level == 0 {
        return Some(0);
    }
    let previous = prices.get(&ItemKey::new(key.item_id, key.enhancement_level - 1))?;
    let base = prices.get(&ItemKey::new(key.item_id, 0))?;
    Some(previous.saturating_add(*base))
}

/// Sale proceeds after the market withholds `fee_rate`.
pub fn net_proceeds(price: u64, fee_rate: f64) -> f64 {
    price as f64 * (1.0 - fee_rate)
}

/// `profit / cost`, or exactly 0 when there is no cost to divide by.
pub fn rate_of_return(profit: f64, cost: f64) -> f64 {
    if cost > 0.0 {
        profit / cost
    } else {
        0.0
    }
}

pub fn evaluate(entry: &PriceEntry, cost: u64, fee_rate: f64) -> AnalysisRecord {
    let (profit, rate) = if entry.enhancement_level == 0 {
        (0.0, 0.0)
    } else {
        let profit = net_proceeds(entry.price, fee_rate) - cost as f64;
        (profit, rate_of_return(profit, cost as f64))
    };
    AnalysisRecord {
        item_id: entry.item_id,
        enhancement_level: entry.enhancement_level,
        name: entry.name.clone(),
        category: entry.category,
        price: entry.price,
        acquisition_cost: cost as f64,
        profit,
        rate_of_return: rate,
        stock: entry.stock,
    }
}

/// Rate descending, then profit descending, then item key ascending.
fn ranking_order(a: &AnalysisRecord, b: &AnalysisRecord) -> Ordering {
    b.rate_of_return
        .total_cmp(&a.rate_of_return)
        .then_with(|| b.profit.total_cmp(&a.profit))
        .then_with(|| a.item_id.cmp(&b.item_id))
        .then_with(|| a.enhancement_level.cmp(&b.enhancement_level))
}

/// Rank the records that pass `filter` (all of them when `None`).
///
/// Overall and category reports both go through here; a category report is
/// just a ranking with an equality predicate on `category`.
pub fn rank(
    records: &[AnalysisRecord],
    filter: Option<&dyn Fn(&AnalysisRecord) -> bool>,
) -> Vec<AnalysisRecord> {
    let mut out: Vec<AnalysisRecord> = records
        .iter()
        .filter(|r| filter.map_or(true, |f| f(*r)))
        .cloned()
        .collect();
    out.sort_by(ranking_order);
    out
}
