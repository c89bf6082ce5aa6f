//! Queue item types and result payloads.
//!
//! A [`QueueItem`] is one user file plus its processing status and
//! eventual result. Items are owned by the [`BatchQueue`](super::BatchQueue)
//! and mutated only by the dispatcher (status/result/failure) or by user
//! commands (add/remove/retry/clear).

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Item lifecycle states.
///
/// Legal transitions: `Pending → Processing → {Completed, Error}` and
/// `Error → Pending` (retry). Nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl ItemStatus {
    /// Terminal states keep their result/failure; only `Error` can be retried.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Error)
    }
}

/// Review classification attached by the file-review tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Warning,
    Fail,
}

/// One named output slice of an item's result: a marketplace's metadata
/// or a prompt focus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    /// Marketplace name or prompt style this variant targets.
    pub target: String,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
    pub verdict: Option<Verdict>,
}

/// Completed result of one dispatch: one or more variant records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultPayload {
    pub variants: Vec<Variant>,
}

/// Why an item ended in `Error`, and whether retrying is expected to help.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemFailure {
    pub message: String,
    pub retryable: bool,
}

/// One queued user file with its processing state.
///
/// `source` holds the raw upload bytes until the dispatcher pushes them
/// to asset storage; it is never serialized into API projections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub file_name: String,
    pub content_type: String,
    /// Marketplaces or prompt styles selected for this item at queue time.
    pub variant_selectors: Vec<String>,
    pub status: ItemStatus,
    pub result: Option<ResultPayload>,
    pub failure: Option<ItemFailure>,
    pub uploaded_asset_url: Option<String>,
    pub queued_at: DateTime<Utc>,
    #[serde(skip)]
    pub source: Bytes,
}

impl QueueItem {
    /// Create a fresh pending item. Duplicates by identity are allowed:
    /// every call mints a new id even for identical bytes.
    pub fn new(
        file_name: String,
        content_type: String,
        variant_selectors: Vec<String>,
        source: Bytes,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            file_name,
            content_type,
            variant_selectors,
            status: ItemStatus::Pending,
            result: None,
            failure: None,
            uploaded_asset_url: None,
            queued_at: Utc::now(),
            source,
        }
    }

    /// File extension of the source file, without the dot.
    pub fn extension(&self) -> &str {
        self.file_name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("bin")
    }
}

/// Immutable description of one dispatch run, created when dispatch is
/// requested. Item statuses evolve; the batch itself does not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub item_ids: Vec<String>,
    /// Credits charged per item (cost per variant × selected variants).
    pub item_cost: i64,
}

impl Batch {
    pub fn new(item_ids: Vec<String>, item_cost: i64) -> Self {
        let id = Uuid::now_v7().to_string();
        let name = format!("Batch {}", &id[..8]);
        Self {
            id,
            name,
            created_at: Utc::now(),
            item_ids,
            item_cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_item_is_pending() {
        let item = QueueItem::new(
            "photo.jpg".into(),
            "image/jpeg".into(),
            vec!["adobe".into()],
            Bytes::from_static(b"bytes"),
        );
        assert_eq!(item.status, ItemStatus::Pending);
        assert!(item.result.is_none());
        assert!(item.failure.is_none());
        assert!(item.uploaded_asset_url.is_none());
    }

    #[test]
    fn identical_files_get_distinct_ids() {
        let a = QueueItem::new("a.jpg".into(), "image/jpeg".into(), vec!["m".into()], Bytes::new());
        let b = QueueItem::new("a.jpg".into(), "image/jpeg".into(), vec!["m".into()], Bytes::new());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn extension_extraction() {
        let item = QueueItem::new("clip.final.mp4".into(), "video/mp4".into(), vec!["m".into()], Bytes::new());
        assert_eq!(item.extension(), "mp4");

        let bare = QueueItem::new("noext".into(), "image/png".into(), vec!["m".into()], Bytes::new());
        assert_eq!(bare.extension(), "bin");
    }

    #[test]
    fn terminal_states() {
        assert!(!ItemStatus::Pending.is_terminal());
        assert!(!ItemStatus::Processing.is_terminal());
        assert!(ItemStatus::Completed.is_terminal());
        assert!(ItemStatus::Error.is_terminal());
    }

    #[test]
    fn source_bytes_not_serialized() {
        let item = QueueItem::new(
            "photo.jpg".into(),
            "image/jpeg".into(),
            vec!["adobe".into()],
            Bytes::from_static(b"secret-bytes"),
        );
        let json = serde_json::to_string(&item).unwrap();
        assert!(!json.contains("secret-bytes"));
        assert!(!json.contains("source"));
    }
}
