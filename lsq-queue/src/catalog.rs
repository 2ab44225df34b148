//! Catalog lookup
//!
//! The catalog is an external collaborator: it resolves an opaque catalog id
//! into a playable item (URL, parent collection, embedded tracklist). The
//! queue only consumes it through [`CatalogLookup`].
//!
//! [`InMemoryCatalog`] serves a fixed set of items, loaded from a JSON file
//! by the session runner.

use crate::error::Result;
use async_trait::async_trait;
use lsq_common::{CatalogId, PlayableItem};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Catalog metadata lookup
///
/// Implementations must be callable from any task and must not block.
/// `Ok(None)` is a lookup-miss, not an error.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Resolve one item
    async fn find(&self, catalog_id: CatalogId) -> Result<Option<PlayableItem>>;

    /// Ordered members of a parent collection
    async fn children(&self, parent_id: CatalogId) -> Result<Vec<CatalogId>>;
}

/// Catalog backed by a fixed list of items
///
/// Collection order is the order in which items were supplied.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCatalog {
    items: HashMap<CatalogId, PlayableItem>,
    order: Vec<CatalogId>,
}

impl InMemoryCatalog {
    pub fn new(items: Vec<PlayableItem>) -> Self {
        let mut catalog = Self::default();
        for item in items {
            catalog.insert(item);
        }
        catalog
    }

    /// Load a JSON array of items
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let items: Vec<PlayableItem> = serde_json::from_str(&content)?;
        info!("Loaded {} catalog items from {}", items.len(), path.display());
        Ok(Self::new(items))
    }

    /// Add or replace an item
    pub fn insert(&mut self, item: PlayableItem) {
        if !self.items.contains_key(&item.catalog_id) {
            self.order.push(item.catalog_id);
        }
        self.items.insert(item.catalog_id, item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
impl CatalogLookup for InMemoryCatalog {
    async fn find(&self, catalog_id: CatalogId) -> Result<Option<PlayableItem>> {
        Ok(self.items.get(&catalog_id).cloned())
    }

    async fn children(&self, parent_id: CatalogId) -> Result<Vec<CatalogId>> {
        Ok(self
            .order
            .iter()
            .filter(|id| {
                self.items
                    .get(id)
                    .is_some_and(|item| item.parent_id == Some(parent_id))
            })
            .copied()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(catalog_id: CatalogId, parent_id: Option<CatalogId>) -> PlayableItem {
        PlayableItem {
            catalog_id,
            url: Some(format!("https://cdn.example/{}.mp3", catalog_id)),
            parent_id,
            title: Some(format!("Set {}", catalog_id)),
            artist: None,
            duration_ms: None,
            tracks: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_find_hit_and_miss() {
        let catalog = InMemoryCatalog::new(vec![item(1, None)]);
        assert_eq!(catalog.find(1).await.unwrap().unwrap().catalog_id, 1);
        assert!(catalog.find(2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_children_keep_insertion_order() {
        let catalog = InMemoryCatalog::new(vec![
            item(30, Some(9)),
            item(10, Some(9)),
            item(20, Some(8)),
            item(40, Some(9)),
        ]);
        assert_eq!(catalog.children(9).await.unwrap(), vec![30, 10, 40]);
        assert!(catalog.children(99).await.unwrap().is_empty());
    }

    #[test]
    fn test_insert_replaces_without_duplicating_order() {
        let mut catalog = InMemoryCatalog::new(vec![item(1, Some(5))]);
        let mut replacement = item(1, Some(5));
        replacement.title = Some("Renamed".to_string());
        catalog.insert(replacement);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.order, vec![1]);
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(
            &path,
            r#"[
                {"catalog_id": 1, "url": "https://cdn.example/1.mp3", "parent_id": 9,
                 "tracks": [{"timestamp_secs": 0, "title": "Opener"}]},
                {"catalog_id": 2}
            ]"#,
        )
        .unwrap();

        let catalog = InMemoryCatalog::from_json_file(&path).unwrap();
        assert_eq!(catalog.len(), 2);
        let first = catalog.items.get(&1).unwrap();
        assert_eq!(first.tracks.len(), 1);
        assert!(catalog.items.get(&2).unwrap().url.is_none());
    }
}
