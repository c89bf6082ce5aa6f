use std::path::Path;

use chrono::{DateTime, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::inference::GenerationParams;
use crate::queue::Variant;

use super::error::{HistoryError, Result};
use super::keys::{decode_record_key, encode_record_key};
use super::pruning::{prune_expired, PruneStats};

/// Durable copy of one completed queue item.
///
/// Written on every `completed` transition and never mutated afterwards:
/// a re-dispatch after retry appends a fresh record under a new id. The
/// configuration snapshot preserves what produced the result even after
/// the user changes their settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: String,
    pub item_id: String,
    pub file_name: String,
    pub asset_url: String,
    pub variants: Vec<Variant>,
    pub params: GenerationParams,
    pub created_at: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn new(
        item_id: String,
        file_name: String,
        asset_url: String,
        variants: Vec<Variant>,
        params: GenerationParams,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            item_id,
            file_name,
            asset_url,
            variants,
            params,
            created_at: Utc::now(),
        }
    }
}

/// Filter for history listings. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    /// Match records containing a variant with this target.
    pub target: Option<String>,
    pub item_id: Option<String>,
}

impl HistoryFilter {
    fn matches(&self, record: &HistoryRecord) -> bool {
        if let Some(item_id) = &self.item_id {
            if record.item_id != *item_id {
                return false;
            }
        }
        if let Some(target) = &self.target {
            if !record.variants.iter().any(|v| v.target == *target) {
                return false;
            }
        }
        true
    }
}

/// Fjall-backed persistent store for history records
#[derive(Clone)]
pub struct HistoryStore {
    keyspace: Keyspace,
    records: PartitionHandle,
    metadata: PartitionHandle,
}

impl HistoryStore {
    /// Open or create a history store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening history store at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let records = keyspace.open_partition("records", PartitionCreateOptions::default())?;
        let metadata = keyspace.open_partition("metadata", PartitionCreateOptions::default())?;

        Ok(Self {
            keyspace,
            records,
            metadata,
        })
    }

    /// Insert a new record. Records are append-only; inserting the same
    /// id twice is a logic error upstream and simply overwrites.
    pub fn insert(&self, record: &HistoryRecord) -> Result<()> {
        let key = encode_record_key(&record.id);
        let value = serde_json::to_vec(record)?;
        self.records.insert(key, value)?;
        debug!(record_id = %record.id, item_id = %record.item_id, "History record written");
        Ok(())
    }

    pub fn get(&self, record_id: &str) -> Result<Option<HistoryRecord>> {
        let key = encode_record_key(record_id);
        match self.records.get(key)? {
            Some(value) => Ok(Some(serde_json::from_slice(&value)?)),
            None => Ok(None),
        }
    }

    /// List records newest-first. UUIDv7 keys make reverse key order
    /// reverse creation order, so no sort is needed.
    pub fn list(&self, filter: &HistoryFilter, limit: usize) -> Result<Vec<HistoryRecord>> {
        let mut results = Vec::new();

        for entry in self.records.iter().rev() {
            let (key, value) = entry?;
            if decode_record_key(&key).is_none() {
                continue;
            }
            let record: HistoryRecord = serde_json::from_slice(&value)?;
            if filter.matches(&record) {
                results.push(record);
                if results.len() == limit {
                    break;
                }
            }
        }

        Ok(results)
    }

    /// User-initiated deletion of one record.
    pub fn delete(&self, record_id: &str) -> Result<()> {
        let key = encode_record_key(record_id);
        if self.records.get(&key)?.is_none() {
            return Err(HistoryError::RecordNotFound(record_id.to_string()));
        }
        self.records.remove(key)?;
        info!(record_id, "History record deleted");
        Ok(())
    }

    /// Prune records older than the retention window.
    pub fn prune_expired(&self, ttl_days: u32) -> Result<PruneStats> {
        prune_expired(&self.keyspace, &self.records, &self.metadata, ttl_days)
    }

    /// Persist all pending writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    /// Health check - verify the keyspace is accessible
    pub fn health_check(&self) -> Result<()> {
        let _ = self.records.iter().next().transpose()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_store() -> (HistoryStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = HistoryStore::open(temp_dir.path().join("history")).unwrap();
        (store, temp_dir)
    }

    fn record_for(item_id: &str, target: &str) -> HistoryRecord {
        HistoryRecord::new(
            item_id.to_string(),
            "photo.jpg".to_string(),
            "memory://tagmill/assets/x/photo.jpg".to_string(),
            vec![Variant {
                target: target.to_string(),
                title: Some("Sunset".to_string()),
                description: None,
                keywords: vec!["sky".to_string()],
                prompt: None,
                negative_prompt: None,
                verdict: None,
            }],
            GenerationParams::default(),
        )
    }

    #[test]
    fn insert_and_get() {
        let (store, _temp) = create_test_store();
        let record = record_for("item-1", "adobe");

        store.insert(&record).unwrap();
        let loaded = store.get(&record.id).unwrap().unwrap();

        assert_eq!(loaded.item_id, "item-1");
        assert_eq!(loaded.variants.len(), 1);
        assert_eq!(loaded.variants[0].target, "adobe");
    }

    #[test]
    fn get_missing_returns_none() {
        let (store, _temp) = create_test_store();
        assert!(store.get("nope").unwrap().is_none());
    }

    #[test]
    fn list_newest_first() {
        let (store, _temp) = create_test_store();

        let first = record_for("item-1", "adobe");
        let second = record_for("item-2", "adobe");
        store.insert(&first).unwrap();
        store.insert(&second).unwrap();

        let listed = store.list(&HistoryFilter::default(), 10).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].item_id, "item-2");
        assert_eq!(listed[1].item_id, "item-1");
    }

    #[test]
    fn list_respects_filter_and_limit() {
        let (store, _temp) = create_test_store();

        store.insert(&record_for("item-1", "adobe")).unwrap();
        store.insert(&record_for("item-2", "shutterstock")).unwrap();
        store.insert(&record_for("item-3", "adobe")).unwrap();

        let filter = HistoryFilter {
            target: Some("adobe".to_string()),
            item_id: None,
        };
        let adobe = store.list(&filter, 10).unwrap();
        assert_eq!(adobe.len(), 2);

        let limited = store.list(&HistoryFilter::default(), 1).unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].item_id, "item-3");
    }

    #[test]
    fn retry_appends_instead_of_overwriting() {
        let (store, _temp) = create_test_store();

        // Two successful dispatches of the same item (retry after failure).
        store.insert(&record_for("item-1", "adobe")).unwrap();
        store.insert(&record_for("item-1", "adobe")).unwrap();

        let filter = HistoryFilter {
            item_id: Some("item-1".to_string()),
            target: None,
        };
        assert_eq!(store.list(&filter, 10).unwrap().len(), 2);
    }

    #[test]
    fn delete_removes_record() {
        let (store, _temp) = create_test_store();
        let record = record_for("item-1", "adobe");
        store.insert(&record).unwrap();

        store.delete(&record.id).unwrap();
        assert!(store.get(&record.id).unwrap().is_none());

        assert!(matches!(
            store.delete(&record.id),
            Err(HistoryError::RecordNotFound(_))
        ));
    }

    #[test]
    fn persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("history");
        let record = record_for("item-1", "adobe");

        {
            let store = HistoryStore::open(&path).unwrap();
            store.insert(&record).unwrap();
            store.persist().unwrap();
        }

        let store = HistoryStore::open(&path).unwrap();
        assert!(store.get(&record.id).unwrap().is_some());
    }
}
