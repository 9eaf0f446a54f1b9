use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Accessory,
    Costume,
    Buff,
    /// Anything the registry names that we do not classify.
    #[serde(other)]
    Other,
}

impl Category {
    /// Case-insensitive; unknown names map to `Other`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "accessory" => Category::Accessory,
            "costume" => Category::Costume,
            "buff" => Category::Buff,
            _ => Category::Other,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::Accessory => "accessory",
            Category::Costume => "costume",
            Category::Buff => "buff",
            Category::Other => "other",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Item identity
// ---------------------------------------------------------------------------

/// An item variant: the upstream id plus its enhancement level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    pub item_id: u32,
    pub enhancement_level: u8,
}

impl ItemKey {
    pub fn new(item_id: u32, enhancement_level: u8) -> Self {
        Self { item_id, enhancement_level }
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}+{}", self.item_id, self.enhancement_level)
    }
}

/// One registry entry. Unique on `(id, enhancement_level)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedItem {
    pub id: u32,
    pub display_name: String,
    pub category: Category,
    pub enhancement_level: u8,
}

impl TrackedItem {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.id, self.enhancement_level)
    }
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

/// A resting order aggregate at one price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub price: u64,
    pub quantity: u64,
}

/// One point-in-time market reading, as returned by a `MarketSource`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub item_id: u32,
    pub enhancement_level: u8,
    pub name: String,
    pub category: Category,
    /// Hour-truncated UTC collection time.
    pub timestamp: DateTime<Utc>,
    /// Last sold price.
    pub price: u64,
    pub stock: u64,
    /// Cumulative trade counter reported upstream.
    pub total_trades: u64,
    pub base_price: u64,
    pub price_min: u64,
    pub price_max: u64,
    pub last_sold_at: Option<DateTime<Utc>>,
    pub buy_orders: Vec<Order>,
    pub sell_orders: Vec<Order>,
}

impl MarketSnapshot {
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.item_id, self.enhancement_level)
    }

    /// Split into the raw-price and raw-orderbook projections, stamped with `collected_at`.
    pub fn split(self, collected_at: DateTime<Utc>) -> (PriceEntry, BookEntry) {
        let book = BookEntry {
            item_id: self.item_id,
            enhancement_level: self.enhancement_level,
            timestamp: collected_at,
            buy_orders: self.buy_orders,
            sell_orders: self.sell_orders,
        };
        let price = PriceEntry {
            item_id: self.item_id,
            enhancement_level: self.enhancement_level,
            name: self.name,
            category: self.category,
            timestamp: collected_at,
            price: self.price,
            stock: self.stock,
            total_trades: self.total_trades,
            base_price: self.base_price,
            price_min: self.price_min,
            price_max: self.price_max,
            last_sold_at: self.last_sold_at,
        };
        (price, book)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub item_id: u32,
    pub enhancement_level: u8,
    pub name: String,
    pub category: Category,
    pub timestamp: DateTime<Utc>,
    pub price: u64,
    pub stock: u64,
    pub total_trades: u64,
    pub base_price: u64,
    pub price_min: u64,
    pub price_max: u64,
    pub last_sold_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookEntry {
    pub item_id: u32,
    pub enhancement_level: u8,
    pub timestamp: DateTime<Utc>,
    pub buy_orders: Vec<Order>,
    pub sell_orders: Vec<Order>,
}

pub trait Keyed {
    fn key(&self) -> ItemKey;
}

impl Keyed for PriceEntry {
    fn key(&self) -> ItemKey {
        ItemKey::new(self.item_id, self.enhancement_level)
    }
}

impl Keyed for BookEntry {
    fn key(&self) -> ItemKey {
        ItemKey::new(self.item_id, self.enhancement_level)
    }
}

// ---------------------------------------------------------------------------
// Raw documents
// ---------------------------------------------------------------------------

/// Everything collected for one raw kind in one hour. Entries are unique per
/// `ItemKey` and kept sorted by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet<T> {
    pub collected_at: DateTime<Utc>,
    pub entries: Vec<T>,
}

impl<T: Keyed> Sheet<T> {
    pub fn new(collected_at: DateTime<Utc>) -> Self {
        Self { collected_at, entries: Vec::new() }
    }

    /// Insert, or replace the entry with the same key.
    pub fn upsert(&mut self, entry: T) {
        match self.entries.binary_search_by_key(&entry.key(), |e| e.key()) {
            Ok(idx) => self.entries[idx] = entry,
            Err(idx) => self.entries.insert(idx, entry),
        }
    }

    pub fn get(&self, key: ItemKey) -> Option<&T> {
        self.entries
            .binary_search_by_key(&key, |e| e.key())
            .ok()
            .map(|idx| &self.entries[idx])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub type PriceSheet = Sheet<PriceEntry>;
pub type BookSheet = Sheet<BookEntry>;
