use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::types::{Category, ItemKey, TrackedItem};

/// One entry of the registry file. Expanded to one `TrackedItem` per level in
/// `min_enhance..=max_enhance`.
#[derive(Debug, Deserialize)]
struct RegistryEntry {
    id: u32,
    name: String,
    #[serde(default)]
    min_enhance: u8,
    #[serde(default)]
    max_enhance: u8,
}

/// The curated set of tracked items. Read-only once loaded.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    /// Sorted by `(id, enhancement_level)`, unique on that pair.
    items: Vec<TrackedItem>,
}

impl Registry {
    /// Load a registry file shaped as `{ "<category>": [{ "id", "name", "min_enhance", "max_enhance" }] }`.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::Registry(format!("cannot read {}: {e}", path.display()))
        })?;
        let registry = Self::from_json(&raw)?;
        info!(
            items = registry.len(),
            path = %path.display(),
            "Loaded item registry"
        );
        Ok(registry)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let grouped: BTreeMap<String, Vec<RegistryEntry>> = serde_json::from_str(raw)
            .map_err(|e| AppError::Registry(format!("malformed registry: {e}")))?;

        let mut items = Vec::new();
        for (name, entries) in grouped {
            let category = Category::from_name(&name);
            for entry in entries {
                if entry.min_enhance > entry.max_enhance {
                    return Err(AppError::Registry(format!(
                        "item {} has min_enhance {} above max_enhance {}",
                        entry.id, entry.min_enhance, entry.max_enhance
                    )));
                }
                for level in entry.min_enhance..=entry.max_enhance {
                    items.push(TrackedItem {
                        id: entry.id,
                        display_name: entry.name.clone(),
                        category,
                        enhancement_level: level,
                    });
                }
            }
        }
        Self::from_items(items)
    }

    /// Build from already-expanded items, dropping duplicate `(id, level)` pairs.
    pub fn from_items(items: Vec<TrackedItem>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        let mut unique = Vec::with_capacity(items.len());
        for item in items {
            if seen.insert(item.key()) {
                unique.push(item);
            } else {
                warn!(item = %item.key(), "Dropping duplicate registry entry");
            }
        }
        if unique.is_empty() {
            return Err(AppError::Registry("item registry is empty".to_string()));
        }
        unique.sort_by_key(TrackedItem::key);
        Ok(Self { items: unique })
    }

    /// Items in stable `(id, level)` order.
    pub fn items(&self) -> &[TrackedItem] {
        &self.items
    }

    pub fn get(&self, key: ItemKey) -> Option<&TrackedItem> {
        self.items
            .binary_search_by_key(&key, TrackedItem::key)
            .ok()
            .map(|idx| &self.items[idx])
    }

    /// Distinct categories present, in `Category` order.
    pub fn categories(&self) -> Vec<Category> {
        self.items
            .iter()
            .map(|i| i.category)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
