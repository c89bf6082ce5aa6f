//! API models for the tagmill pipeline endpoints.
//!
//! The pipeline's external contract:
//! - `POST /queue` ingests one media file (raw body + naming headers) as a queue item
//! - `GET /queue` returns the filtered, paginated projection of the queue
//! - `POST /batch/start` authorizes against the credit ledger and starts a dispatch run
//! - `POST /archive` bundles completed results into one zip download
//! - `GET /history` lists durable records of completed items
//!
//! Queue items serialize directly from [`crate::queue::QueueItem`]; the
//! raw upload bytes never appear in responses.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::inference::GenerationParams;
use crate::queue::{Batch, QueueItem, StatusCounts};
use crate::session::DispatchSummary;

/// Response to a successful `POST /queue`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QueueAcceptedResponse {
    pub item_id: String,
    pub file_name: String,
    pub variant_count: usize,
}

/// `GET /queue` projection.
#[derive(Debug, Serialize)]
pub struct QueueProjectionResponse {
    pub items: Vec<QueueItem>,
    pub counts: StatusCounts,
}

#[derive(Debug, Deserialize)]
pub struct ProjectionQuery {
    /// `pending`, `processing`, `completed`, or `error`
    pub status: Option<String>,
    #[serde(default)]
    pub page: usize,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
}

fn default_per_page() -> usize {
    50
}

/// `POST /batch/start` body: the generation parameter snapshot for the run.
#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    pub style: Option<String>,
    pub detail_level: Option<String>,
    pub training_context: Option<String>,
}

impl StartRequest {
    pub fn into_params(self) -> GenerationParams {
        GenerationParams {
            style: self.style,
            detail_level: self.detail_level,
            training_context: self.training_context,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub batch_id: String,
    pub name: String,
    pub item_count: usize,
    pub item_cost: i64,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub stopping: bool,
}

#[derive(Debug, Serialize)]
pub struct BatchStatusResponse {
    pub running: bool,
    pub counts: StatusCounts,
    pub batch: Option<Batch>,
    pub last_summary: Option<DispatchSummary>,
    /// Human-readable line for the last finished run.
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RetryAllResponse {
    pub reset: usize,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub removed: usize,
}

/// `POST /archive` body.
#[derive(Debug, Default, Deserialize)]
pub struct ArchiveRequest {
    /// Restrict to these completed items; omit for all completed items.
    pub item_ids: Option<Vec<String>>,
    /// Restrict to one variant per item.
    pub variant: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    /// Which variant's metadata names the file; defaults to the first.
    pub variant: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub target: Option<String>,
    pub item_id: Option<String>,
    #[serde(default = "default_history_limit")]
    pub limit: usize,
}

fn default_history_limit() -> usize {
    100
}

#[derive(Debug, Serialize)]
pub struct PruneResponse {
    pub scanned: usize,
    pub pruned: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, String>,
    pub version: String,
}
