use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use marquee_model::MediaKind;
use parking_lot::RwLock;

use crate::error::Result;
use crate::ports::{CatalogReader, CatalogRecord, HeroPoolStore, StoredHeroPool};

/// Process-local pool store. Rows are lost on restart.
#[derive(Default)]
pub struct InMemoryHeroPoolStore {
    rows: RwLock<HashMap<MediaKind, StoredHeroPool>>,
}

impl fmt::Debug for InMemoryHeroPoolStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("InMemoryHeroPoolStore");
        match self.rows.try_read() {
            Some(rows) => {
                let kinds: Vec<_> = rows.keys().collect();
                debug.field("kinds", &kinds);
            }
            None => {
                debug.field("rows", &"<locked>");
            }
        }
        debug.finish()
    }
}

impl InMemoryHeroPoolStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current row for `kind` without going through the async port.
    pub fn snapshot(&self, kind: MediaKind) -> Option<StoredHeroPool> {
        self.rows.read().get(&kind).cloned()
    }
}

#[async_trait]
impl HeroPoolStore for InMemoryHeroPoolStore {
    async fn load(&self, kind: MediaKind) -> Result<Option<StoredHeroPool>> {
        Ok(self.snapshot(kind))
    }

    async fn upsert(&self, row: &StoredHeroPool) -> Result<()> {
        self.rows.write().insert(row.kind, row.clone());
        Ok(())
    }
}

/// Fixed catalog held in memory.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    records: Vec<CatalogRecord>,
    thumbnails: RwLock<HashMap<String, Vec<String>>>,
}

impl InMemoryCatalog {
    pub fn new(records: Vec<CatalogRecord>) -> Self {
        Self {
            records,
            thumbnails: RwLock::new(HashMap::new()),
        }
    }

    pub fn set_thumbnails(&self, id: impl Into<String>, paths: Vec<String>) {
        self.thumbnails.write().insert(id.into(), paths);
    }
}

#[async_trait]
impl CatalogReader for InMemoryCatalog {
    async fn list_all_media_records(&self) -> Result<Vec<CatalogRecord>> {
        Ok(self.records.clone())
    }

    async fn list_thumbnails_by_media_ids(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Vec<String>>> {
        let thumbnails = self.thumbnails.read();
        Ok(ids
            .iter()
            .filter_map(|id| {
                thumbnails
                    .get(id)
                    .filter(|paths| !paths.is_empty())
                    .map(|paths| (id.clone(), paths.clone()))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn thumbnails_only_include_requested_ids() {
        let catalog = InMemoryCatalog::new(vec![CatalogRecord::new(
            "a",
            MediaKind::Movie,
            "A",
        )]);
        catalog.set_thumbnails("a", vec!["/a.jpg".into()]);
        catalog.set_thumbnails("b", vec!["/b.jpg".into()]);
        catalog.set_thumbnails("c", Vec::new());

        let found = catalog
            .list_thumbnails_by_media_ids(&["a".into(), "c".into()])
            .await
            .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found["a"], vec!["/a.jpg".to_string()]);
    }
}
