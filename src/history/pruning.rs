/// Retention policy for history records
use chrono::{Duration, Utc};
use fjall::{Keyspace, PartitionHandle};
use tracing::info;

use super::error::Result;
use super::keys::encode_meta_key;
use super::store::HistoryRecord;

const META_LAST_PRUNE: &str = "last_prune";

/// Pruning statistics
#[derive(Debug, Default)]
pub struct PruneStats {
    pub records_scanned: usize,
    pub records_pruned: usize,
}

/// Remove records whose `created_at` is older than `ttl_days`.
///
/// Runs as a maintenance operation, never from the dispatcher. Records
/// that fail to deserialize are pruned too: they are unreadable to every
/// other code path anyway.
pub fn prune_expired(
    keyspace: &Keyspace,
    records: &PartitionHandle,
    metadata: &PartitionHandle,
    ttl_days: u32,
) -> Result<PruneStats> {
    let cutoff = Utc::now() - Duration::days(i64::from(ttl_days));
    let mut stats = PruneStats::default();
    let mut expired_keys = Vec::new();

    for entry in records.iter() {
        let (key, value) = entry?;
        stats.records_scanned += 1;

        match serde_json::from_slice::<HistoryRecord>(&value) {
            Ok(record) if record.created_at >= cutoff => {}
            _ => expired_keys.push(key),
        }
    }

    for key in expired_keys {
        records.remove(key)?;
        stats.records_pruned += 1;
    }

    metadata.insert(
        encode_meta_key(META_LAST_PRUNE),
        Utc::now().to_rfc3339().as_bytes(),
    )?;
    keyspace.persist(fjall::PersistMode::SyncAll)?;

    info!(
        scanned = stats.records_scanned,
        pruned = stats.records_pruned,
        ttl_days,
        "History pruning complete"
    );

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryStore;
    use crate::inference::GenerationParams;
    use tempfile::TempDir;

    fn record_aged(days_old: i64) -> HistoryRecord {
        let mut record = HistoryRecord::new(
            "item-1".to_string(),
            "photo.jpg".to_string(),
            "memory://tagmill/assets/x/photo.jpg".to_string(),
            vec![],
            GenerationParams::default(),
        );
        record.created_at = Utc::now() - Duration::days(days_old);
        record
    }

    #[test]
    fn prunes_only_expired_records() {
        let temp_dir = TempDir::new().unwrap();
        let store = HistoryStore::open(temp_dir.path().join("history")).unwrap();

        let old = record_aged(40);
        let fresh = record_aged(1);
        store.insert(&old).unwrap();
        store.insert(&fresh).unwrap();

        let stats = store.prune_expired(30).unwrap();
        assert_eq!(stats.records_scanned, 2);
        assert_eq!(stats.records_pruned, 1);

        assert!(store.get(&old.id).unwrap().is_none());
        assert!(store.get(&fresh.id).unwrap().is_some());
    }

    #[test]
    fn prune_on_empty_store_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let store = HistoryStore::open(temp_dir.path().join("history")).unwrap();

        let stats = store.prune_expired(30).unwrap();
        assert_eq!(stats.records_scanned, 0);
        assert_eq!(stats.records_pruned, 0);
    }
}
