use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use tradepost_etl::analyzer::report::{CategoryReportSet, ItemDetailReport, RankingReport};
use tradepost_etl::analyzer::{Analyzer, AnalyzerSettings};
use tradepost_etl::api::HealthState;
use tradepost_etl::client::{FetchCause, FetchError, MarketSource};
use tradepost_etl::pipeline::EtlPipeline;
use tradepost_etl::registry::Registry;
use tradepost_etl::scraper::Scraper;
use tradepost_etl::store::{DataKind, PartitionKey, PartitionStore};
use tradepost_etl::types::{Category, ItemKey, MarketSnapshot, Order, TrackedItem};

const REGISTRY: &str = r#"{
    "accessory": [{ "id": 12094, "name": "Deboreka Ring", "min_enhance": 0, "max_enhance": 2 }],
    "buff": [{ "id": 9695, "name": "Cron Meal", "min_enhance": 0, "max_enhance": 0 }],
    "mount": [{ "id": 777, "name": "Unlisted Horse" }]
}"#;

/// Prices are swapped between passes by the test; ids without a price fail.
/// Clones share one price table.
#[derive(Clone, Default)]
struct ScriptedSource {
    prices: Arc<Mutex<BTreeMap<ItemKey, (u64, u64)>>>,
}

impl ScriptedSource {
    fn set(&self, key: ItemKey, price: u64, total_trades: u64) {
        self.prices.lock().unwrap().insert(key, (price, total_trades));
    }
}

#[async_trait]
impl MarketSource for ScriptedSource {
    async fn fetch(&self, item: &TrackedItem) -> Result<MarketSnapshot, FetchError> {
        let Some((price, total_trades)) = self.prices.lock().unwrap().get(&item.key()).copied() else {
            return Err(FetchError { item: item.key(), cause: FetchCause::Status(404) });
        };
        Ok(MarketSnapshot {
            item_id: item.id,
            enhancement_level: item.enhancement_level,
            name: item.display_name.clone(),
            category: item.category,
            timestamp: Utc::now(),
            price,
            stock: 4,
            total_trades,
            base_price: price,
            price_min: price / 2,
            price_max: price * 2,
            last_sold_at: None,
            buy_orders: vec![Order { price: price - 1, quantity: 2 }],
            sell_orders: vec![Order { price: price + 1, quantity: 1 }],
        })
    }
}

fn hour(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 12, h, m, 0).unwrap()
}

#[tokio::test]
async fn scrape_then_analyze_produces_all_reports() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(PartitionStore::new(dir.path()));
    let registry = Arc::new(Registry::from_json(REGISTRY).unwrap());
    let source = ScriptedSource::default();
    let health = Arc::new(HealthState::new());

    let pipeline = EtlPipeline::new(
        Scraper::new(source.clone(), Arc::clone(&store), Arc::clone(&registry)),
        Analyzer::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            AnalyzerSettings { fee_rate: 0.0, ..AnalyzerSettings::default() },
        ),
        Arc::clone(&health),
    );

    source.set(ItemKey::new(12094, 0), 100, 1_000);
    source.set(ItemKey::new(12094, 1), 150, 500);
    source.set(ItemKey::new(9695, 0), 10, 40_000);
    let first = pipeline.run_once_at(hour(5, 2)).await;
    assert!(first.succeeded());

    source.set(ItemKey::new(12094, 0), 100, 1_020);
    source.set(ItemKey::new(12094, 1), 260, 510);
    source.set(ItemKey::new(12094, 2), 500, 7);
    let second = pipeline.run_once_at(hour(6, 3)).await;

    let scrape = second.scrape.clone().unwrap();
    assert_eq!(scrape.attempted, 5);
    assert_eq!(scrape.succeeded, 4);
    assert_eq!(scrape.failed, BTreeSet::from([ItemKey::new(777, 0)]));

    let analysis = second.analysis.clone().unwrap();
    assert_eq!(analysis.eligible, 4);
    assert_eq!(analysis.excluded, BTreeSet::from([ItemKey::new(777, 0)]));
    assert_eq!(analysis.categories, 3);

    // Cost of +1 is 100 + 100, of +2 is 260 + 100.
    let overall: RankingReport = store
        .read(&PartitionKey::new(DataKind::ReportOverall, hour(6, 0)))
        .await
        .unwrap();
    let ranked: Vec<ItemKey> = overall
        .entries
        .iter()
        .map(|r| ItemKey::new(r.item_id, r.enhancement_level))
        .collect();
    assert_eq!(
        ranked,
        vec![
            ItemKey::new(12094, 2),
            ItemKey::new(12094, 1),
            ItemKey::new(9695, 0),
            ItemKey::new(12094, 0),
        ]
    );
    assert_eq!(overall.entries[0].profit, 140.0);
    assert_eq!(overall.entries[1].profit, 60.0);

    let categories: CategoryReportSet = store
        .read(&PartitionKey::new(DataKind::ReportCategory, hour(6, 0)))
        .await
        .unwrap();
    assert_eq!(categories.get(Category::Buff).unwrap().entries.len(), 1);
    assert!(categories.get(Category::Other).unwrap().entries.is_empty());

    let detail: ItemDetailReport = store
        .read(&PartitionKey::new(DataKind::ReportItem, hour(6, 0)))
        .await
        .unwrap();
    let ring = detail
        .items
        .iter()
        .find(|d| d.item_id == 12094 && d.enhancement_level == 1)
        .unwrap();
    let trend: Vec<u64> = ring.trend.iter().map(|p| p.price).collect();
    assert_eq!(trend, vec![150, 260]);
    assert_eq!(ring.book.best_bid, Some(259));
    assert_eq!(ring.volume.iter().map(|v| v.trade_count).sum::<u64>(), 10);

    assert_eq!(health.snapshot().status, "healthy");
}
