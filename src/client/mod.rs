//! Remote market client.
//!
//! [`MarketSource`] is the seam the scraper depends on; [`ArshaClient`] is the
//! trading-post implementation. Every upstream call is paced and bounded by a
//! timeout, and any failure is reported as a [`FetchError`] for that one item.
//! Nothing here retries.

pub mod pacing;
pub mod response;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::api::latency::LatencyStats;
use crate::config::{Config, BIDDING_ENDPOINT, SUB_LIST_ENDPOINT};
use crate::error::Result;
use crate::store::truncate_to_hour;
use crate::types::{ItemKey, MarketSnapshot, TrackedItem};

pub use pacing::Pacer;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchCause {
    #[error("request timed out")]
    Timeout,

    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// A single item's fetch failure. Never aborts a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fetch failed for item {item}: {cause}")]
pub struct FetchError {
    pub item: ItemKey,
    pub cause: FetchCause,
}

#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Fetch one snapshot for `item`.
    async fn fetch(&self, item: &TrackedItem) -> std::result::Result<MarketSnapshot, FetchError>;
}

pub struct ArshaClient {
    http: reqwest::Client,
    /// Base URL including the region segment.
    market_url: String,
    language: String,
    pacer: Pacer,
    latency: Arc<LatencyStats>,
}

impl ArshaClient {
    pub fn new(cfg: &Config, latency: Arc<LatencyStats>) -> Result<Self> {
        Self::with_settings(
            cfg.market_url(),
            cfg.language.clone(),
            Duration::from_secs(cfg.request_timeout_secs),
            Duration::from_millis(cfg.min_request_interval_ms),
            latency,
        )
    }

    pub fn with_settings(
        market_url: String,
        language: String,
        timeout: Duration,
        min_interval: Duration,
        latency: Arc<LatencyStats>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            market_url,
            language,
            pacer: Pacer::new(min_interval),
            latency,
        })
    }

    async fn get_json(&self, endpoint: &str, item: &TrackedItem) -> std::result::Result<Value, FetchCause> {
        self.pacer.wait().await;

        let url = format!("{}/{}", self.market_url, endpoint);
        let started = Instant::now();
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("id", item.id.to_string()),
                ("sid", item.enhancement_level.to_string()),
                ("lang", self.language.clone()),
            ])
            .send()
            .await
            .map_err(classify)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchCause::Status(status.as_u16()));
        }

        let body = resp.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                FetchCause::Timeout
            } else {
                FetchCause::Malformed(e.to_string())
            }
        })?;

        let elapsed = started.elapsed();
        self.latency.record(elapsed);
        debug!(endpoint, item = %item.key(), elapsed_ms = elapsed.as_millis() as u64, "upstream call ok");
        Ok(body)
    }
}

fn classify(e: reqwest::Error) -> FetchCause {
    if e.is_timeout() {
        FetchCause::Timeout
    } else if let Some(status) = e.status() {
        FetchCause::Status(status.as_u16())
    } else {
        FetchCause::Transport(e.to_string())
    }
}

#[async_trait]
impl MarketSource for ArshaClient {
    async fn fetch(&self, item: &TrackedItem) -> std::result::Result<MarketSnapshot, FetchError> {
        let fail = |cause: FetchCause| FetchError { item: item.key(), cause };

        let listing = self
            .get_json(SUB_LIST_ENDPOINT, item)
            .await
            .and_then(|body| response::parse_sub_list(body, item.enhancement_level))
            .map_err(fail)?;
        if listing.id != item.id {
            return Err(fail(FetchCause::Malformed(format!(
                "asked for item {} but got {}",
                item.id, listing.id
            ))));
        }

        let bidding = self
            .get_json(BIDDING_ENDPOINT, item)
            .await
            .and_then(|body| response::parse_bidding(body, item.enhancement_level))
            .map_err(fail)?;
        if bidding.id != item.id {
            return Err(fail(FetchCause::Malformed(format!(
                "asked for bids on item {} but got {}",
                item.id, bidding.id
            ))));
        }

        let last_sold_at = listing.last_sold_at();
        let (buy_orders, sell_orders) = bidding.into_orders();

        Ok(MarketSnapshot {
            item_id: item.id,
            enhancement_level: item.enhancement_level,
            name: item.display_name.clone(),
            category: item.category,
            timestamp: truncate_to_hour(Utc::now()),
            price: listing.last_sold_price,
            stock: listing.current_stock,
            total_trades: listing.total_trades,
            base_price: listing.base_price,
            price_min: listing.price_min,
            price_max: listing.price_max,
            last_sold_at,
            buy_orders,
            sell_orders,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Category;
    use axum::{http::StatusCode, routing::get, Json, Router};
    use serde_json::json;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/na")
    }

    fn client(market_url: String, timeout: Duration) -> ArshaClient {
        ArshaClient::with_settings(
            market_url,
            "en".to_string(),
            timeout,
            Duration::from_millis(1),
            Arc::new(LatencyStats::new()),
        )
        .unwrap()
    }

    fn ring(level: u8) -> TrackedItem {
        TrackedItem {
            id: 12094,
            display_name: "Deboreka Ring".to_string(),
            category: Category::Accessory,
            enhancement_level: level,
        }
    }

    fn happy_router() -> Router {
        market_router(12094)
    }

    /// Both endpoints for ring 12094, with bids reported under `bid_item`.
    fn market_router(bid_item: u32) -> Router {
        Router::new()
            .route(
                "/na/GetWorldMarketSubList",
                get(|| async {
                    Json(json!([[
                        {
                            "name": "Deboreka Ring", "id": 12094, "sid": 0,
                            "basePrice": 630000000, "currentStock": 726, "totalTrades": 413344,
                            "priceMin": 35000000, "priceMax": 825000000,
                            "lastSoldPrice": 640000000, "lastSoldTime": 1741760005
                        },
                        {
                            "name": "Deboreka Ring", "id": 12094, "sid": 1,
                            "basePrice": 1450000000, "currentStock": 50, "totalTrades": 13020,
                            "priceMin": 105000000, "priceMax": 2470000000u64,
                            "lastSoldPrice": 1460000000, "lastSoldTime": 1741760000
                        }
                    ]]))
                }),
            )
            .route(
                "/na/GetBiddingInfoList",
                get(move || async move {
                    Json(json!({
                        "id": bid_item, "sid": 1, "name": "Deboreka Ring",
                        "orders": [
                            { "price": 1440000000, "sellOrders": 0, "buyOrders": 4 },
                            { "price": 1470000000, "sellOrders": 2, "buyOrders": 0 }
                        ]
                    }))
                }),
            )
    }

    #[tokio::test]
    async fn fetch_builds_snapshot_from_both_endpoints() {
        let latency = Arc::new(LatencyStats::new());
        let url = serve(happy_router()).await;
        let client = ArshaClient::with_settings(
            url,
            "en".to_string(),
            Duration::from_secs(5),
            Duration::from_millis(1),
            Arc::clone(&latency),
        )
        .unwrap();

        let snap = client.fetch(&ring(1)).await.unwrap();
        assert_eq!(snap.key(), ItemKey::new(12094, 1));
        assert_eq!(snap.price, 1_460_000_000);
        assert_eq!(snap.stock, 50);
        assert_eq!(snap.total_trades, 13020);
        assert_eq!(snap.buy_orders.len(), 1);
        assert_eq!(snap.sell_orders[0].price, 1_470_000_000);
        assert_eq!(latency.len(), 2);
    }

    #[tokio::test]
    async fn bids_for_another_item_are_malformed() {
        let client = client(serve(market_router(11853)).await, Duration::from_secs(5));
        let err = client.fetch(&ring(1)).await.unwrap_err();
        assert_eq!(err.item, ItemKey::new(12094, 1));
        assert!(matches!(err.cause, FetchCause::Malformed(_)));
    }

    #[tokio::test]
    async fn non_success_status_is_classified() {
        let router = Router::new().route(
            "/na/GetWorldMarketSubList",
            get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let client = client(serve(router).await, Duration::from_secs(5));
        let err = client.fetch(&ring(0)).await.unwrap_err();
        assert_eq!(err.item, ItemKey::new(12094, 0));
        assert_eq!(err.cause, FetchCause::Status(503));
    }

    #[tokio::test]
    async fn non_json_body_is_malformed() {
        let router = Router::new().route("/na/GetWorldMarketSubList", get(|| async { "<html>" }));
        let client = client(serve(router).await, Duration::from_secs(5));
        let err = client.fetch(&ring(0)).await.unwrap_err();
        assert!(matches!(err.cause, FetchCause::Malformed(_)));
    }

    #[tokio::test]
    async fn stalled_call_times_out() {
        let router = Router::new().route(
            "/na/GetWorldMarketSubList",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!([]))
            }),
        );
        let client = client(serve(router).await, Duration::from_millis(100));
        let err = client.fetch(&ring(0)).await.unwrap_err();
        assert_eq!(err.cause, FetchCause::Timeout);
    }

    #[tokio::test]
    async fn unreachable_host_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = client(format!("http://{addr}/na"), Duration::from_secs(2));
        let err = client.fetch(&ring(0)).await.unwrap_err();
        assert!(matches!(err.cause, FetchCause::Transport(_)));
    }
}
