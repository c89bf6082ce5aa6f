//! Ordered batch queue with exclusive-writer discipline.
//!
//! The queue preserves insertion order through every view; nothing here
//! reorders items. While a dispatch run is active the dispatcher has
//! exclusive write access to item status, so user commands that would
//! mutate the collection (`remove`, `clear`, `retry`, `retry_all`) are
//! rejected with [`QueueError::DispatchActive`] for the duration.

use thiserror::Error;
use tracing::{debug, warn};

use super::item::{ItemFailure, ItemStatus, QueueItem, ResultPayload};

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue is locked by an active dispatch run")]
    DispatchActive,

    #[error("item not found: {0}")]
    ItemNotFound(String),

    #[error("item {0} is not in error state")]
    NotRetryable(String),
}

pub type Result<T> = std::result::Result<T, QueueError>;

/// Per-status item counts. `processing` is 0 or 1 by construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub error: usize,
}

impl StatusCounts {
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.completed + self.error
    }
}

/// The ordered collection of queued items.
#[derive(Debug, Default)]
pub struct BatchQueue {
    items: Vec<QueueItem>,
    dispatch_active: bool,
}

impl BatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a validated item. Appending is allowed mid-run: the
    /// dispatcher iterates a snapshot of ids taken at start, so late
    /// additions wait for the next run.
    pub fn add(&mut self, item: QueueItem) -> &QueueItem {
        debug!(item_id = %item.id, file = %item.file_name, "Item queued");
        self.items.push(item);
        self.items.last().expect("just pushed")
    }

    /// Remove one item. Rejected while a dispatch run is active.
    pub fn remove(&mut self, id: &str) -> Result<QueueItem> {
        self.ensure_idle()?;
        let idx = self
            .index_of(id)
            .ok_or_else(|| QueueError::ItemNotFound(id.to_string()))?;
        Ok(self.items.remove(idx))
    }

    /// Drop every item. Rejected while a dispatch run is active.
    pub fn clear(&mut self) -> Result<usize> {
        self.ensure_idle()?;
        let removed = self.items.len();
        self.items.clear();
        Ok(removed)
    }

    /// Reset one failed item to pending, preserving its position.
    pub fn retry(&mut self, id: &str) -> Result<()> {
        self.ensure_idle()?;
        let item = self
            .get_mut(id)
            .ok_or_else(|| QueueError::ItemNotFound(id.to_string()))?;
        if item.status != ItemStatus::Error {
            return Err(QueueError::NotRetryable(id.to_string()));
        }
        item.status = ItemStatus::Pending;
        item.failure = None;
        Ok(())
    }

    /// Reset every failed item to pending in one pass. Completed items
    /// are untouched. Idempotent: a second call with no dispatch in
    /// between finds no error items and changes nothing.
    pub fn retry_all(&mut self) -> Result<usize> {
        self.ensure_idle()?;
        let mut reset = 0;
        for item in &mut self.items {
            if item.status == ItemStatus::Error {
                item.status = ItemStatus::Pending;
                item.failure = None;
                reset += 1;
            }
        }
        Ok(reset)
    }

    /// Read-only ordered view of items matching `predicate`.
    pub fn filter<F>(&self, predicate: F) -> Vec<&QueueItem>
    where
        F: Fn(&QueueItem) -> bool,
    {
        self.items.iter().filter(|item| predicate(item)).collect()
    }

    /// Paginated projection in insertion order, optionally restricted to
    /// one status. Recomputed on demand; not tied to any refresh cycle.
    pub fn project(&self, status: Option<ItemStatus>, page: usize, per_page: usize) -> Vec<QueueItem> {
        self.items
            .iter()
            .filter(|item| status.is_none_or(|s| item.status == s))
            .skip(page.saturating_mul(per_page))
            .take(per_page)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&QueueItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Snapshot of all item ids in queue order.
    pub fn item_ids(&self) -> Vec<String> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for item in &self.items {
            match item.status {
                ItemStatus::Pending => counts.pending += 1,
                ItemStatus::Processing => counts.processing += 1,
                ItemStatus::Completed => counts.completed += 1,
                ItemStatus::Error => counts.error += 1,
            }
        }
        counts
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    // -- dispatcher-only interface -------------------------------------

    /// Take exclusive write access for a dispatch run.
    pub(crate) fn begin_dispatch(&mut self) {
        self.dispatch_active = true;
    }

    /// Release exclusive write access after a run.
    pub(crate) fn end_dispatch(&mut self) {
        self.dispatch_active = false;
    }

    pub fn dispatch_active(&self) -> bool {
        self.dispatch_active
    }

    /// `pending → processing`. Returns false if the item vanished or is
    /// not pending (a stale snapshot entry).
    pub(crate) fn mark_processing(&mut self, id: &str) -> bool {
        match self.get_mut(id) {
            Some(item) if item.status == ItemStatus::Pending => {
                item.status = ItemStatus::Processing;
                true
            }
            _ => false,
        }
    }

    /// Record the storage URL once the asset upload succeeds.
    pub(crate) fn mark_uploaded(&mut self, id: &str, url: String) {
        if let Some(item) = self.get_mut(id) {
            item.uploaded_asset_url = Some(url);
        }
    }

    /// `processing → completed` with the attached result.
    pub(crate) fn complete(&mut self, id: &str, payload: ResultPayload) {
        if let Some(item) = self.get_mut(id) {
            item.status = ItemStatus::Completed;
            item.result = Some(payload);
            item.failure = None;
        }
    }

    /// `processing → error` with per-item failure text.
    pub(crate) fn fail(&mut self, id: &str, message: String, retryable: bool) {
        if let Some(item) = self.get_mut(id) {
            warn!(item_id = %id, retryable, error = %message, "Item failed");
            item.status = ItemStatus::Error;
            item.failure = Some(ItemFailure { message, retryable });
        }
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.dispatch_active {
            warn!("Queue mutation rejected during active dispatch");
            return Err(QueueError::DispatchActive);
        }
        Ok(())
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut QueueItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn queued(name: &str) -> QueueItem {
        QueueItem::new(
            name.to_string(),
            "image/jpeg".to_string(),
            vec!["adobe".to_string()],
            Bytes::from_static(b"data"),
        )
    }

    fn queue_with(n: usize) -> BatchQueue {
        let mut queue = BatchQueue::new();
        for i in 0..n {
            queue.add(queued(&format!("file{i}.jpg")));
        }
        queue
    }

    #[test]
    fn add_preserves_input_order() {
        let queue = queue_with(3);
        let names: Vec<_> = queue.filter(|_| true).iter().map(|i| i.file_name.clone()).collect();
        assert_eq!(names, vec!["file0.jpg", "file1.jpg", "file2.jpg"]);
    }

    #[test]
    fn remove_and_clear() {
        let mut queue = queue_with(3);
        let id = queue.item_ids()[1].clone();

        let removed = queue.remove(&id).unwrap();
        assert_eq!(removed.file_name, "file1.jpg");
        assert_eq!(queue.len(), 2);

        assert_eq!(queue.clear().unwrap(), 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn remove_unknown_item() {
        let mut queue = queue_with(1);
        assert!(matches!(queue.remove("nope"), Err(QueueError::ItemNotFound(_))));
    }

    #[test]
    fn mutations_rejected_while_dispatching() {
        let mut queue = queue_with(2);
        let id = queue.item_ids()[0].clone();
        queue.begin_dispatch();

        assert!(matches!(queue.remove(&id), Err(QueueError::DispatchActive)));
        assert!(matches!(queue.clear(), Err(QueueError::DispatchActive)));
        assert!(matches!(queue.retry(&id), Err(QueueError::DispatchActive)));
        assert!(matches!(queue.retry_all(), Err(QueueError::DispatchActive)));

        queue.end_dispatch();
        assert!(queue.clear().is_ok());
    }

    #[test]
    fn retry_resets_only_error_items() {
        let mut queue = queue_with(3);
        let ids = queue.item_ids();

        queue.mark_processing(&ids[0]);
        queue.complete(&ids[0], ResultPayload { variants: vec![] });
        queue.mark_processing(&ids[1]);
        queue.fail(&ids[1], "boom".into(), false);

        assert!(matches!(
            queue.retry(&ids[0]),
            Err(QueueError::NotRetryable(_))
        ));
        assert!(matches!(
            queue.retry(&ids[2]),
            Err(QueueError::NotRetryable(_))
        ));

        queue.retry(&ids[1]).unwrap();
        let item = queue.get(&ids[1]).unwrap();
        assert_eq!(item.status, ItemStatus::Pending);
        assert!(item.failure.is_none());
    }

    #[test]
    fn retry_all_is_idempotent() {
        let mut queue = queue_with(4);
        let ids = queue.item_ids();

        for id in &ids[..2] {
            queue.mark_processing(id);
            queue.fail(id, "boom".into(), true);
        }
        queue.mark_processing(&ids[2]);
        queue.complete(&ids[2], ResultPayload { variants: vec![] });

        assert_eq!(queue.retry_all().unwrap(), 2);
        let first_pass = queue.counts();

        assert_eq!(queue.retry_all().unwrap(), 0);
        assert_eq!(queue.counts(), first_pass);
        assert_eq!(first_pass.pending, 3);
        assert_eq!(first_pass.completed, 1);
    }

    #[test]
    fn counts_partition_the_queue() {
        let mut queue = queue_with(4);
        let ids = queue.item_ids();

        queue.mark_processing(&ids[0]);
        queue.complete(&ids[0], ResultPayload { variants: vec![] });
        queue.mark_processing(&ids[1]);
        queue.fail(&ids[1], "x".into(), false);
        queue.mark_processing(&ids[2]);

        let counts = queue.counts();
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.error, 1);
        assert_eq!(counts.processing, 1);
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.total(), queue.len());
    }

    #[test]
    fn mark_processing_requires_pending() {
        let mut queue = queue_with(1);
        let id = queue.item_ids()[0].clone();

        assert!(queue.mark_processing(&id));
        // Already processing: a stale snapshot entry must not transition again.
        assert!(!queue.mark_processing(&id));
    }

    #[test]
    fn projection_pages_in_order() {
        let mut queue = queue_with(5);
        let ids = queue.item_ids();
        queue.mark_processing(&ids[0]);
        queue.complete(&ids[0], ResultPayload { variants: vec![] });

        let page = queue.project(Some(ItemStatus::Pending), 0, 2);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].file_name, "file1.jpg");
        assert_eq!(page[1].file_name, "file2.jpg");

        let second = queue.project(Some(ItemStatus::Pending), 1, 2);
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].file_name, "file3.jpg");

        let all = queue.project(None, 0, 100);
        assert_eq!(all.len(), 5);
    }
}
