use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::entities::shopping_list::{Priority, ShoppingItem};
use crate::error::ShoplistError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
}

impl From<&ShoppingItem> for CachedItem {
    fn from(item: &ShoppingItem) -> Self {
        Self {
            category: item.category.clone(),
            priority: item.priority,
            estimated_cost: item.estimated_cost.clone(),
            quantity: item.quantity.clone(),
        }
    }
}

fn seed_entries() -> BTreeMap<String, CachedItem> {
    let seed = |category: &str, priority, cost: &str, quantity: &str| CachedItem {
        category: Some(category.to_string()),
        priority,
        estimated_cost: Some(cost.to_string()),
        quantity: Some(quantity.to_string()),
    };
    BTreeMap::from([
        ("milk".to_string(), seed("dairy", Priority::High, "$3.99", "1 gallon")),
        ("bread".to_string(), seed("bakery", Priority::Medium, "$2.49", "1 loaf")),
        ("eggs".to_string(), seed("dairy", Priority::High, "$4.29", "1 dozen")),
    ])
}

fn cache_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Remembers categories and prices of items seen in earlier lists.
#[derive(Debug, Clone)]
pub struct ItemCache {
    path: PathBuf,
}

impl ItemCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> BTreeMap<String, CachedItem> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!(path = %self.path.display(), "Item cache is corrupt, reseeding: {err}");
                seed_entries()
            }),
            Err(err) => {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), "Item cache unreadable: {err}");
                }
                seed_entries()
            }
        }
    }

    fn save(&self, entries: &BTreeMap<String, CachedItem>) -> Result<(), ShoplistError> {
        let body = serde_json::to_string_pretty(entries)?;
        crate::utils::paths::write_atomic_sync(&self.path, &body)
    }

    /// Exact key first, then a case-insensitive substring match either way.
    pub fn get(&self, name: &str) -> Option<(String, CachedItem)> {
        let key = cache_key(name);
        if key.is_empty() {
            return None;
        }
        let mut entries = self.load();
        if let Some(found) = entries.remove(&key) {
            return Some((key, found));
        }
        entries
            .into_iter()
            .find(|(cached, _)| cached.contains(&key) || key.contains(cached.as_str()))
    }

    pub fn list(&self) -> Vec<(String, CachedItem)> {
        self.load().into_iter().collect()
    }

    pub fn add(&self, name: &str, item: CachedItem) -> Result<(), ShoplistError> {
        let key = cache_key(name);
        if key.is_empty() {
            return Err(ShoplistError::InvalidArgument(
                "Item name must not be empty".into(),
            ));
        }
        let mut entries = self.load();
        entries.insert(key, item);
        self.save(&entries)
    }

    /// Adds the items not cached yet; returns how many were new.
    pub fn remember_items(&self, items: &[ShoppingItem]) -> Result<usize, ShoplistError> {
        let mut entries = self.load();
        let mut added = 0;
        for item in items {
            let key = cache_key(&item.item);
            if key.is_empty() || entries.contains_key(&key) {
                continue;
            }
            entries.insert(key, CachedItem::from(item));
            added += 1;
        }
        if added > 0 || !self.path.exists() {
            self.save(&entries)?;
        }
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> (tempfile::TempDir, ItemCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = ItemCache::new(dir.path().join("item_cache.json"));
        (dir, cache)
    }

    #[test]
    fn new_cache_is_seeded() {
        let (_dir, cache) = cache();
        let names = cache.list().into_iter().map(|(k, _)| k).collect::<Vec<_>>();
        assert_eq!(names, vec!["bread", "eggs", "milk"]);
    }

    #[test]
    fn get_matches_substrings_both_ways() {
        let (_dir, cache) = cache();
        let (key, item) = cache.get("Whole Milk").unwrap();
        assert_eq!(key, "milk");
        assert_eq!(item.category.as_deref(), Some("dairy"));

        let (key, _) = cache.get("EGG").unwrap();
        assert_eq!(key, "eggs");

        assert!(cache.get("light bulbs").is_none());
        assert!(cache.get("  ").is_none());
    }

    #[test]
    fn remember_items_only_adds_new_names() {
        let (_dir, cache) = cache();
        let items = vec![
            ShoppingItem {
                item: "Milk".into(),
                estimated_cost: Some("$9.99".into()),
                ..Default::default()
            },
            ShoppingItem {
                item: "Light bulbs".into(),
                category: Some("hardware".into()),
                priority: Priority::Low,
                ..Default::default()
            },
        ];
        assert_eq!(cache.remember_items(&items).unwrap(), 1);
        assert_eq!(cache.remember_items(&items).unwrap(), 0);

        let (_, milk) = cache.get("milk").unwrap();
        assert_eq!(milk.estimated_cost.as_deref(), Some("$3.99"));
        let (_, bulbs) = cache.get("light bulbs").unwrap();
        assert_eq!(bulbs.priority, Priority::Low);
    }

    #[test]
    fn add_overwrites_and_rejects_blank_names() {
        let (_dir, cache) = cache();
        cache
            .add(
                "Bread",
                CachedItem {
                    category: Some("bakery".into()),
                    estimated_cost: Some("$5.00".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        let (_, bread) = cache.get("bread").unwrap();
        assert_eq!(bread.estimated_cost.as_deref(), Some("$5.00"));
        assert!(cache.add(" ", CachedItem::default()).is_err());
    }

    #[test]
    fn corrupt_cache_is_reseeded() {
        let (_dir, cache) = cache();
        std::fs::write(cache.path(), "{not json").unwrap();
        assert!(cache.get("bread").is_some());
    }
}
