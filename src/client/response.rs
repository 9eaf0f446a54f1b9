//! Upstream response schema. Field names are the trading-post API's contract.
//!
//! Both endpoints answer with a single object, a list of objects, or a list
//! of lists depending on how many ids were requested, so bodies are flattened
//! before decoding.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::FetchCause;
use crate::types::Order;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubListEntry {
    pub name: String,
    pub id: u32,
    pub sid: u8,
    pub base_price: u64,
    pub current_stock: u64,
    pub total_trades: u64,
    #[serde(default)]
    pub price_min: u64,
    #[serde(default)]
    pub price_max: u64,
    pub last_sold_price: u64,
    /// Unix seconds; 0 when the variant never sold.
    #[serde(default)]
    pub last_sold_time: i64,
}

impl SubListEntry {
    pub fn last_sold_at(&self) -> Option<DateTime<Utc>> {
        if self.last_sold_time > 0 {
            DateTime::from_timestamp(self.last_sold_time, 0)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BiddingInfo {
    pub id: u32,
    pub sid: u8,
    #[serde(default)]
    pub orders: Vec<BiddingOrder>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BiddingOrder {
    pub price: u64,
    #[serde(default)]
    pub sell_orders: u64,
    #[serde(default)]
    pub buy_orders: u64,
}

impl BiddingInfo {
    /// Split the combined ladder into `(buy_orders, sell_orders)`, dropping empty sides.
    pub fn into_orders(self) -> (Vec<Order>, Vec<Order>) {
        let mut buys = Vec::new();
        let mut sells = Vec::new();
        for o in self.orders {
            if o.buy_orders > 0 {
                buys.push(Order { price: o.price, quantity: o.buy_orders });
            }
            if o.sell_orders > 0 {
                sells.push(Order { price: o.price, quantity: o.sell_orders });
            }
        }
        (buys, sells)
    }
}

fn flatten(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten(item, out);
            }
        }
        other => out.push(other),
    }
}

/// Pick the entry for enhancement level `sid` out of a sub-list body.
pub fn parse_sub_list(body: Value, sid: u8) -> Result<SubListEntry, FetchCause> {
    let mut objects = Vec::new();
    flatten(body, &mut objects);
    if objects.is_empty() {
        return Err(FetchCause::Malformed("empty sub list response".to_string()));
    }
    for obj in objects {
        let entry: SubListEntry = serde_json::from_value(obj)
            .map_err(|e| FetchCause::Malformed(format!("unexpected sub list entry: {e}")))?;
        if entry.sid == sid {
            return Ok(entry);
        }
    }
    Err(FetchCause::Malformed(format!("sub list has no entry for level {sid}")))
}

/// Pick the order book for enhancement level `sid` out of a bidding-info body.
pub fn parse_bidding(body: Value, sid: u8) -> Result<BiddingInfo, FetchCause> {
    let mut objects = Vec::new();
    flatten(body, &mut objects);
    if objects.is_empty() {
        return Err(FetchCause::Malformed("empty bidding response".to_string()));
    }
    for obj in objects {
        let info: BiddingInfo = serde_json::from_value(obj)
            .map_err(|e| FetchCause::Malformed(format!("unexpected bidding entry: {e}")))?;
        if info.sid == sid {
            return Ok(info);
        }
    }
    Err(FetchCause::Malformed(format!("bidding info has no entry for level {sid}")))
}
