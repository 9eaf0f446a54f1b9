use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tracing::{error, info, warn};

use crate::client::MarketSource;
use crate::error::Result;
use crate::registry::Registry;
use crate::store::{truncate_to_hour, DataKind, PartitionKey, PartitionStore, StoreError};
use crate::types::{BookSheet, ItemKey, Keyed, PriceSheet, Sheet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Every item fetched.
    Complete,
    /// At least one success and at least one failure.
    Partial,
    /// Nothing fetched. The caller decides whether to escalate.
    TotalFailure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeSummary {
    pub collected_at: DateTime<Utc>,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: BTreeSet<ItemKey>,
}

impl ScrapeSummary {
    pub fn outcome(&self) -> CycleOutcome {
        if self.succeeded == 0 && self.attempted > 0 {
            CycleOutcome::TotalFailure
        } else if self.failed.is_empty() {
            CycleOutcome::Complete
        } else {
            CycleOutcome::Partial
        }
    }
}

/// Collects one snapshot per tracked item into the current hour's raw sheets.
pub struct Scraper<S> {
    source: S,
    store: Arc<PartitionStore>,
    registry: Arc<Registry>,
}

impl<S: MarketSource> Scraper<S> {
    pub fn new(source: S, store: Arc<PartitionStore>, registry: Arc<Registry>) -> Self {
        Self { source, store, registry }
    }

    pub async fn run_scrape_cycle(&self) -> Result<ScrapeSummary> {
        self.run_scrape_cycle_at(Utc::now()).await
    }

    /// Fetch every registry item once, in registry order.
    ///
    /// Each success is upserted into the hour's sheets and both sheets are
    /// rewritten before the next fetch, so an interrupted cycle leaves valid
    /// partial data. A fetch failure only marks that item; a store failure
    /// aborts the cycle.
    pub async fn run_scrape_cycle_at(&self, now: DateTime<Utc>) -> Result<ScrapeSummary> {
        let collected_at = truncate_to_hour(now);
        let price_key = PartitionKey::new(DataKind::RawPrice, collected_at);
        let book_key = PartitionKey::new(DataKind::RawOrderbook, collected_at);

        let mut prices: PriceSheet = self.existing_sheet(&price_key).await?;
        let mut books: BookSheet = self.existing_sheet(&book_key).await?;

        let mut summary = ScrapeSummary {
            collected_at,
            attempted: 0,
            succeeded: 0,
            failed: BTreeSet::new(),
        };

        for item in self.registry.items() {
            summary.attempted += 1;
            let snapshot = match self.source.fetch(item).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(item = %e.item, name = %item.display_name, "Fetch failed: {}", e.cause);
                    summary.failed.insert(item.key());
                    continue;
                }
            };

            let (price, book) = snapshot.split(collected_at);
            prices.upsert(price);
            books.upsert(book);

            if let Err(e) = self.persist(&price_key, &prices, &book_key, &books).await {
                error!(item = %item.key(), "Aborting scrape cycle: {e}");
                return Err(e.into());
            }
            summary.succeeded += 1;
        }

        match summary.outcome() {
            CycleOutcome::TotalFailure => error!(
                hour = %collected_at,
                attempted = summary.attempted,
                "Scrape cycle fetched nothing"
            ),
            _ => info!(
                hour = %collected_at,
                attempted = summary.attempted,
                succeeded = summary.succeeded,
                failed = summary.failed.len(),
                "Scrape cycle complete"
            ),
        }
        Ok(summary)
    }

    /// The sheet already written this hour, or a fresh one. An unreadable
    /// sheet is replaced rather than blocking collection.
    async fn existing_sheet<T>(&self, key: &PartitionKey) -> Result<Sheet<T>>
    where
        T: Keyed + DeserializeOwned,
    {
        match self.store.read_opt::<Sheet<T>>(key).await {
            Ok(Some(sheet)) => Ok(sheet),
            Ok(None) => Ok(Sheet::new(key.timestamp())),
            Err(StoreError::Corrupt { key, source }) => {
                warn!(partition = %key, "Starting a fresh sheet over unreadable partition: {source}");
                Ok(Sheet::new(key.timestamp()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(
        &self,
        price_key: &PartitionKey,
        prices: &PriceSheet,
        book_key: &PartitionKey,
        books: &BookSheet,
    ) -> std::result::Result<(), StoreError> {
        self.store.write(price_key, prices).await?;
        self.store.write(book_key, books).await
    }
}
