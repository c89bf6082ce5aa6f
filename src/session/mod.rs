//! Batch session: the command surface over the pipeline.
//!
//! A [`BatchSession`] owns the queue and the collaborating services and
//! exposes explicit commands (`add`, `remove`, `retry`, `start`, `stop`).
//! State changes surface as discrete [`SessionEvent`]s on a broadcast
//! channel; callers subscribe, they never mutate items directly.

pub mod dispatcher;
pub mod events;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::credits::{self, Authorization, CreditLedger, LedgerError};
use crate::history::HistoryStore;
use crate::inference::{GenerationParams, InferenceService};
use crate::queue::{Batch, BatchQueue, ItemStatus, QueueError, QueueItem, StatusCounts};
use crate::storage::AssetStore;

pub use dispatcher::DispatchConfig;
pub use events::{DispatchSummary, SessionEvent};

use dispatcher::DispatchContext;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a dispatch run is already active")]
    AlreadyRunning,

    #[error("queue has no pending items")]
    NothingPending,

    #[error("not enough credits: {reason}")]
    CreditsDenied { reason: String, shortfall: i64 },

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("credit ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// The pipeline's single entry point for one user session.
///
/// Shared pieces are individually reference-counted so a dispatch run
/// can proceed on a background task while commands keep working against
/// the same state.
pub struct BatchSession {
    queue: Arc<Mutex<BatchQueue>>,
    inference: Arc<dyn InferenceService>,
    ledger: Arc<dyn CreditLedger>,
    history: HistoryStore,
    assets: AssetStore,
    events: broadcast::Sender<SessionEvent>,
    config: DispatchConfig,
    running: Arc<AtomicBool>,
    cancel: Arc<Mutex<Option<CancellationToken>>>,
    current_batch: Arc<Mutex<Option<Batch>>>,
    last_summary: Arc<Mutex<Option<DispatchSummary>>>,
}

impl BatchSession {
    pub fn new(
        inference: Arc<dyn InferenceService>,
        ledger: Arc<dyn CreditLedger>,
        history: HistoryStore,
        assets: AssetStore,
        config: DispatchConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            queue: Arc::new(Mutex::new(BatchQueue::new())),
            inference,
            ledger,
            history,
            assets,
            events,
            config,
            running: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(Mutex::new(None)),
            current_batch: Arc::new(Mutex::new(None)),
            last_summary: Arc::new(Mutex::new(None)),
        }
    }

    /// Subscribe to the session's event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // -- queue commands ------------------------------------------------

    /// Queue one validated file. Validation (media type, non-empty
    /// variant selection) happens in the API layer before an item is
    /// ever constructed.
    pub async fn add(&self, item: QueueItem) -> QueueItem {
        let mut queue = self.queue.lock().await;
        queue.add(item).clone()
    }

    pub async fn remove(&self, id: &str) -> Result<QueueItem> {
        let mut queue = self.queue.lock().await;
        Ok(queue.remove(id)?)
    }

    pub async fn clear(&self) -> Result<usize> {
        let mut queue = self.queue.lock().await;
        Ok(queue.clear()?)
    }

    pub async fn retry(&self, id: &str) -> Result<()> {
        {
            let mut queue = self.queue.lock().await;
            queue.retry(id)?;
        }
        let _ = self.events.send(SessionEvent::ItemChanged {
            item_id: id.to_string(),
            status: ItemStatus::Pending,
        });
        Ok(())
    }

    pub async fn retry_all(&self) -> Result<usize> {
        let mut queue = self.queue.lock().await;
        Ok(queue.retry_all()?)
    }

    // -- projections ---------------------------------------------------

    pub async fn get(&self, id: &str) -> Option<QueueItem> {
        self.queue.lock().await.get(id).cloned()
    }

    pub async fn project(
        &self,
        status: Option<ItemStatus>,
        page: usize,
        per_page: usize,
    ) -> Vec<QueueItem> {
        self.queue.lock().await.project(status, page, per_page)
    }

    pub async fn counts(&self) -> StatusCounts {
        self.queue.lock().await.counts()
    }

    /// Completed items only, for archive building.
    pub async fn completed_items(&self, ids: Option<&[String]>) -> Vec<QueueItem> {
        let queue = self.queue.lock().await;
        queue
            .filter(|item| {
                item.status == ItemStatus::Completed
                    && ids.is_none_or(|wanted| wanted.iter().any(|id| *id == item.id))
            })
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn current_batch(&self) -> Option<Batch> {
        self.current_batch.lock().await.clone()
    }

    pub async fn last_summary(&self) -> Option<DispatchSummary> {
        self.last_summary.lock().await.clone()
    }

    // -- dispatch ------------------------------------------------------

    /// Authorize against the credit ledger and start a dispatch run.
    ///
    /// Returns the immutable [`Batch`] describing the run. The run
    /// itself proceeds on a background task; progress arrives as events.
    /// A denied authorization changes no item state.
    pub async fn start(&self, params: GenerationParams) -> Result<Batch> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SessionError::AlreadyRunning);
        }

        // Any early return below must release the running flag.
        let batch = match self.authorize_and_snapshot().await {
            Ok(batch) => batch,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        let cancel = CancellationToken::new();
        *self.cancel.lock().await = Some(cancel.clone());
        *self.current_batch.lock().await = Some(batch.clone());
        {
            let mut queue = self.queue.lock().await;
            queue.begin_dispatch();
        }

        let ctx = DispatchContext {
            queue: Arc::clone(&self.queue),
            inference: Arc::clone(&self.inference),
            ledger: Arc::clone(&self.ledger),
            history: self.history.clone(),
            assets: self.assets.clone(),
            events: self.events.clone(),
            config: self.config.clone(),
        };
        let running = Arc::clone(&self.running);
        let cancel_slot = Arc::clone(&self.cancel);
        let last_summary = Arc::clone(&self.last_summary);
        let run_batch = batch.clone();

        tokio::spawn(async move {
            let summary = dispatcher::run_batch(
                &ctx,
                run_batch.id.clone(),
                run_batch.item_ids.clone(),
                params,
                cancel,
            )
            .await;

            *last_summary.lock().await = Some(summary.clone());
            {
                let mut queue = ctx.queue.lock().await;
                queue.end_dispatch();
            }
            *cancel_slot.lock().await = None;
            running.store(false, Ordering::SeqCst);

            // Emitted only after the run's state is fully released, so a
            // subscriber reacting to this event can issue commands
            // without racing the cleanup.
            let _ = ctx.events.send(SessionEvent::BatchCompleted { summary });
        });

        Ok(batch)
    }

    /// Request a cooperative stop. The in-flight item finishes; items
    /// never started stay pending and a fresh `start` resumes them.
    pub async fn stop(&self) -> bool {
        let cancel = self.cancel.lock().await;
        match cancel.as_ref() {
            Some(token) => {
                info!("Stop requested, dispatch will halt after the in-flight item");
                token.cancel();
                true
            }
            None => false,
        }
    }

    async fn authorize_and_snapshot(&self) -> Result<Batch> {
        let queue = self.queue.lock().await;
        let pending = queue.filter(|item| item.status == ItemStatus::Pending);
        if pending.is_empty() {
            return Err(SessionError::NothingPending);
        }

        // Balance is read once here, then only refreshed after each
        // success. Concurrent sessions on one account can overspend;
        // that consistency model is deliberate (see DESIGN.md).
        let account = self.ledger.account().await?;
        match credits::authorize(&pending, self.config.cost_per_variant, &account) {
            Authorization::Granted { required } => {
                let item_ids: Vec<String> =
                    pending.iter().map(|item| item.id.clone()).collect();
                let per_item = required / item_ids.len() as i64;
                Ok(Batch::new(item_ids, per_item))
            }
            Authorization::Denied { reason, shortfall } => {
                Err(SessionError::CreditsDenied { reason, shortfall })
            }
        }
    }
}
