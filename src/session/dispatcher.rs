//! The sequential dispatch loop.
//!
//! One pass over the queue in insertion order, one item in flight at a
//! time. Suspension points are the per-item network work (asset upload +
//! inference call), the fixed inter-request throttle, and the extended
//! rate-limit backoff. Cancellation is cooperative: the stop token is
//! checked at the top of each iteration and the in-flight item always
//! finishes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::credits::CreditLedger;
use crate::history::{HistoryRecord, HistoryStore};
use crate::inference::{
    GenerationParams, InferenceError, InferenceRequest, InferenceService,
};
use crate::queue::{BatchQueue, ItemStatus, ResultPayload};
use crate::storage::AssetStore;

use super::events::{DispatchSummary, SessionEvent};

/// Timing and cost knobs for one run.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Fixed delay between consecutive inference requests, protecting
    /// the shared external rate limit.
    pub throttle: Duration,
    /// Extra delay after the service answers 429, before the next item.
    pub rate_limit_backoff: Duration,
    /// Credits charged per variant of each successful item.
    pub cost_per_variant: i64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            throttle: Duration::from_millis(2000),
            rate_limit_backoff: Duration::from_millis(5000),
            cost_per_variant: 1,
        }
    }
}

pub(super) struct DispatchContext {
    pub queue: Arc<Mutex<BatchQueue>>,
    pub inference: Arc<dyn InferenceService>,
    pub ledger: Arc<dyn CreditLedger>,
    pub history: HistoryStore,
    pub assets: AssetStore,
    pub events: broadcast::Sender<SessionEvent>,
    pub config: DispatchConfig,
}

/// Snapshot of the fields the loop needs while the queue lock is not held.
struct InFlight {
    id: String,
    file_name: String,
    content_type: String,
    variant_selectors: Vec<String>,
    uploaded_asset_url: Option<String>,
    source: bytes::Bytes,
}

pub(super) async fn run_batch(
    ctx: &DispatchContext,
    batch_id: String,
    item_ids: Vec<String>,
    params: GenerationParams,
    cancel: CancellationToken,
) -> DispatchSummary {
    let mut dispatched = 0usize;
    let mut succeeded = 0usize;
    let mut failed = 0usize;
    let mut stopped = false;

    info!(batch_id = %batch_id, items = item_ids.len(), "Dispatch run started");

    for item_id in item_ids {
        // Only pending items are attempted; completed/error items from
        // earlier runs keep their state.
        let candidate = {
            let queue = ctx.queue.lock().await;
            queue
                .get(&item_id)
                .filter(|item| item.status == ItemStatus::Pending)
                .map(|item| InFlight {
                    id: item.id.clone(),
                    file_name: item.file_name.clone(),
                    content_type: item.content_type.clone(),
                    variant_selectors: item.variant_selectors.clone(),
                    uploaded_asset_url: item.uploaded_asset_url.clone(),
                    source: item.source.clone(),
                })
        };
        let Some(inflight) = candidate else { continue };

        // Throttle between requests, not before the first one.
        if dispatched > 0 {
            tokio::time::sleep(ctx.config.throttle).await;
        }

        // Cooperative stop: the current and all later items stay pending.
        if cancel.is_cancelled() {
            stopped = true;
            break;
        }

        {
            let mut queue = ctx.queue.lock().await;
            if !queue.mark_processing(&inflight.id) {
                continue;
            }
        }
        emit_item(ctx, &inflight.id, ItemStatus::Processing);
        dispatched += 1;

        match process_item(ctx, &inflight, &params).await {
            Ok(payload) => {
                succeeded += 1;

                let asset_url = {
                    let mut queue = ctx.queue.lock().await;
                    queue.complete(&inflight.id, payload.clone());
                    queue
                        .get(&inflight.id)
                        .and_then(|item| item.uploaded_asset_url.clone())
                        .unwrap_or_default()
                };
                emit_item(ctx, &inflight.id, ItemStatus::Completed);

                persist_history(ctx, &inflight, asset_url, payload, &params);
                refresh_credits(ctx, inflight.variant_selectors.len()).await;
            }
            Err(failure) => {
                failed += 1;

                let retryable = failure.is_retryable();
                {
                    let mut queue = ctx.queue.lock().await;
                    queue.fail(&inflight.id, failure.to_string(), retryable);
                }
                emit_item(ctx, &inflight.id, ItemStatus::Error);

                match failure {
                    ItemError::Inference(InferenceError::RateLimited) => {
                        debug!(
                            backoff_ms = ctx.config.rate_limit_backoff.as_millis() as u64,
                            "Rate limited, extended backoff before next item"
                        );
                        tokio::time::sleep(ctx.config.rate_limit_backoff).await;
                    }
                    ItemError::Inference(InferenceError::CreditsExhausted) => {
                        // Fatal at batch level: stop attempting the rest.
                        error!(batch_id = %batch_id, "Credits exhausted mid-run, stopping batch");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    let summary = DispatchSummary {
        batch_id,
        attempted: dispatched,
        succeeded,
        failed,
        stopped,
    };
    info!(
        attempted = summary.attempted,
        succeeded = summary.succeeded,
        failed = summary.failed,
        stopped = summary.stopped,
        "Dispatch run finished: {}",
        summary.message()
    );
    summary
}

/// Failure modes for one item, already classified.
#[derive(Debug, thiserror::Error)]
enum ItemError {
    #[error("upload failed: {0}")]
    Upload(#[from] crate::storage::StorageError),

    #[error("{0}")]
    Inference(#[from] InferenceError),
}

impl ItemError {
    fn is_retryable(&self) -> bool {
        match self {
            ItemError::Upload(_) => false,
            ItemError::Inference(e) => e.is_retryable(),
        }
    }
}

/// Upload the asset if this item was never uploaded, then invoke
/// inference. Failure is all-or-nothing per item: no partial payload is
/// ever attached.
async fn process_item(
    ctx: &DispatchContext,
    inflight: &InFlight,
    params: &GenerationParams,
) -> Result<ResultPayload, ItemError> {
    let asset_url = match &inflight.uploaded_asset_url {
        Some(url) => url.clone(),
        None => {
            let stored = ctx
                .assets
                .upload(&inflight.file_name, &inflight.content_type, inflight.source.clone())
                .await?;
            let mut queue = ctx.queue.lock().await;
            queue.mark_uploaded(&inflight.id, stored.url.clone());
            stored.url
        }
    };

    let request = InferenceRequest {
        asset_url,
        variant_selectors: inflight.variant_selectors.clone(),
        params: params.clone(),
    };
    let response = ctx.inference.generate(&request).await?;

    Ok(ResultPayload {
        variants: response.variants.into_iter().map(Into::into).collect(),
    })
}

fn persist_history(
    ctx: &DispatchContext,
    inflight: &InFlight,
    asset_url: String,
    payload: ResultPayload,
    params: &GenerationParams,
) {
    let record = HistoryRecord::new(
        inflight.id.clone(),
        inflight.file_name.clone(),
        asset_url,
        payload.variants,
        params.clone(),
    );
    // History write failures don't fail the item: the result is already
    // attached and visible in the queue.
    if let Err(e) = ctx.history.insert(&record) {
        error!(item_id = %inflight.id, error = %e, "Failed to persist history record");
    }
}

/// Settle one successful item against the ledger and log the refreshed
/// balance. No lock is held across sessions; see DESIGN.md.
async fn refresh_credits(ctx: &DispatchContext, variant_count: usize) {
    let amount = ctx.config.cost_per_variant * variant_count as i64;
    match ctx.ledger.debit(amount).await {
        Ok(account) => {
            debug!(debited = amount, balance = account.balance, "Credit balance refreshed");
        }
        Err(e) => {
            error!(error = %e, "Failed to refresh credit balance");
        }
    }
}

fn emit_item(ctx: &DispatchContext, item_id: &str, status: ItemStatus) {
    let _ = ctx.events.send(SessionEvent::ItemChanged {
        item_id: item_id.to_string(),
        status,
    });
}
