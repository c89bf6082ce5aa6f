use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use bytes::Bytes;
use http_body_util::BodyExt;

use super::{
    models::{
        ArchiveRequest, BatchStatusResponse, ClearResponse, DownloadQuery, HealthResponse,
        HistoryQuery, ProjectionQuery, PruneResponse, QueueAcceptedResponse,
        QueueProjectionResponse, RetryAllResponse, StartRequest, StartResponse, StopResponse,
    },
    state::AppState,
    validation::validate_queue_request,
};
use crate::api::error::ApiError;
use crate::archive::{self, ArchiveError};
use crate::history::HistoryFilter;
use crate::naming::make_filename;
use crate::queue::{ItemStatus, QueueItem};

/// Queue ingestion endpoint (POST /queue)
///
/// Accepts one media file as the raw request body. File identity comes
/// from headers:
/// - `Content-Type`: the media type; unsupported types are rejected here,
///   before the item exists, so they never enter the dispatch state machine
/// - `X-Tagmill-Filename`: original filename (drives SEO naming later)
/// - `X-Tagmill-Variants`: comma-separated marketplace/prompt-style
///   selectors; queueing with zero selected variants is rejected
///
/// Duplicates are allowed by identity: posting the same bytes twice
/// queues two items.
pub async fn queue_asset(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;

    let media_type = super::utils::parse_media_type(content_type)?;

    let file_name = headers
        .get("X-Tagmill-Filename")
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::InvalidPayload("X-Tagmill-Filename header is required".into()))?;

    let selectors: Vec<String> = headers
        .get("X-Tagmill-Variants")
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    validate_queue_request(&file_name, &selectors, &state.config.server.api)
        .map_err(|e| ApiError::InvalidPayload(e.to_string()))?;

    // Decompression is handled by RequestDecompressionLayer middleware,
    // so this is already-decompressed data.
    let data = read_body(body, state.config.server.api.max_asset_bytes.as_u64() as usize).await?;

    let item = QueueItem::new(
        file_name,
        media_type.essence_str().to_string(),
        selectors,
        data,
    );
    let queued = state.session.add(item).await;

    let response = QueueAcceptedResponse {
        item_id: queued.id,
        file_name: queued.file_name,
        variant_count: queued.variant_selectors.len(),
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Queue projection endpoint (GET /queue)
///
/// Read-only, insertion-ordered view with optional status filter and
/// pagination. Recomputed on demand from the queue, never cached.
pub async fn get_queue(
    State(state): State<AppState>,
    Query(query): Query<ProjectionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = parse_status_filter(query.status.as_deref())?;
    let items = state.session.project(status, query.page, query.per_page).await;
    let counts = state.session.counts().await;

    Ok(Json(QueueProjectionResponse { items, counts }))
}

/// Single item endpoint (GET /queue/{item_id})
pub async fn get_item(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state
        .session
        .get(&item_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("item {item_id}")))?;
    Ok(Json(item))
}

/// Remove one queued item (DELETE /queue/{item_id}). Rejected with 409
/// while a dispatch run is active.
pub async fn remove_item(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.session.remove(&item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Clear the queue (DELETE /queue). Rejected while dispatching.
pub async fn clear_queue(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let removed = state.session.clear().await?;
    Ok(Json(ClearResponse { removed }))
}

/// Reset one failed item to pending (POST /queue/{item_id}/retry).
pub async fn retry_item(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.session.retry(&item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Reset every failed item to pending (POST /queue/retry). Idempotent.
pub async fn retry_all(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let reset = state.session.retry_all().await?;
    Ok(Json(RetryAllResponse { reset }))
}

/// Start a dispatch run (POST /batch/start)
///
/// Flow:
/// 1. Reject if a run is already active (single worker, no pool)
/// 2. Authorize pending items against the credit ledger; a denial
///    returns 402 and causes zero item transitions
/// 3. Snapshot the pending items into an immutable Batch
/// 4. Run the dispatch loop on a background task; progress surfaces as
///    session events and through GET /batch
pub async fn start_batch(
    State(state): State<AppState>,
    Json(request): Json<StartRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let batch = state.session.start(request.into_params()).await?;
    state.metrics.batch_started();

    let response = StartResponse {
        batch_id: batch.id,
        name: batch.name,
        item_count: batch.item_ids.len(),
        item_cost: batch.item_cost,
    };
    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Request a cooperative stop (POST /batch/stop)
///
/// The in-flight item finishes; items never started stay pending and a
/// fresh start resumes them. Returns whether a run was active.
pub async fn stop_batch(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stopping = state.session.stop().await;
    Ok(Json(StopResponse { stopping }))
}

/// Batch status endpoint (GET /batch)
pub async fn batch_status(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let last_summary = state.session.last_summary().await;
    let message = last_summary.as_ref().map(|s| s.message());

    Ok(Json(BatchStatusResponse {
        running: state.session.is_running(),
        counts: state.session.counts().await,
        batch: state.session.current_batch().await,
        last_summary,
        message,
    }))
}

/// Single-file download (GET /queue/{item_id}/download?variant=adobe)
///
/// Streams the original asset bytes under the generated SEO filename.
/// Uses the same naming path as the archive builder, so the two never
/// diverge.
pub async fn download_item(
    State(state): State<AppState>,
    Path(item_id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let item = state
        .session
        .get(&item_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("item {item_id}")))?;

    if item.status != ItemStatus::Completed {
        return Err(ApiError::InvalidPayload(format!(
            "item {item_id} has no completed result"
        )));
    }
    let result = item
        .result
        .as_ref()
        .ok_or_else(|| ApiError::Internal("completed item missing result".into()))?;
    let asset_url = item
        .uploaded_asset_url
        .as_ref()
        .ok_or_else(|| ApiError::Internal("completed item missing asset url".into()))?;

    let variant = match &query.variant {
        Some(target) => result
            .variants
            .iter()
            .find(|v| v.target == *target)
            .ok_or_else(|| ApiError::NotFound(format!("variant {target}")))?,
        None => result
            .variants
            .first()
            .ok_or_else(|| ApiError::Internal("completed item has no variants".into()))?,
    };

    let filename = make_filename(
        variant.title.as_deref().unwrap_or(&item.file_name),
        &variant.keywords,
        &variant.target,
        item.extension(),
    );

    let bytes = state
        .assets
        .fetch(asset_url)
        .await
        .map_err(|e| ApiError::Internal(format!("asset fetch failed: {e}")))?;

    let headers = [
        (header::CONTENT_TYPE, item.content_type.clone()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        ),
    ];
    Ok((StatusCode::OK, headers, bytes))
}

/// Archive build endpoint (POST /archive)
///
/// Bundles completed results (optionally a subset of items and one
/// variant per item) into a single zip. Per-entry fetch failures are
/// skipped and counted, never fatal; the report travels in response
/// headers alongside the zip body.
pub async fn build_archive(
    State(state): State<AppState>,
    Json(request): Json<ArchiveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let items = state
        .session
        .completed_items(request.item_ids.as_deref())
        .await;

    let (bytes, report) = archive::build_archive(&state.assets, &items, request.variant.as_deref())
        .await
        .map_err(|e| match e {
            ArchiveError::NothingToArchive => {
                ApiError::InvalidPayload("no completed items to archive".into())
            }
            other => ApiError::Internal(other.to_string()),
        })?;

    state.metrics.archive_built();

    let headers = [
        ("content-type", "application/zip".to_string()),
        (
            "content-disposition",
            "attachment; filename=\"tagmill-results.zip\"".to_string(),
        ),
        ("x-archive-requested", report.requested.to_string()),
        ("x-archive-added", report.added.to_string()),
        ("x-archive-skipped", report.skipped.to_string()),
    ];
    Ok((StatusCode::OK, headers, bytes))
}

/// History listing (GET /history?target=adobe&item_id=...&limit=50)
pub async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = HistoryFilter {
        target: query.target,
        item_id: query.item_id,
    };
    let records = state.history.list(&filter, query.limit)?;
    Ok(Json(records))
}

/// User-initiated history deletion (DELETE /history/{record_id})
pub async fn delete_history(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.history.delete(&record_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Retention maintenance (POST /history/prune). Never runs from the
/// dispatcher.
pub async fn prune_history(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state
        .history
        .prune_expired(state.config.retention.history_ttl_days)?;
    Ok(Json(PruneResponse {
        scanned: stats.records_scanned,
        pruned: stats.records_pruned,
    }))
}

/// Metrics snapshot (GET /metrics)
pub async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.metrics.snapshot())
}

/// Health check endpoint (GET /health)
///
/// Returns 503 Service Unavailable if any component is unhealthy.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    use std::collections::HashMap;

    let mut components = HashMap::new();

    components.insert("api".to_string(), "healthy".to_string());
    components.insert(
        "history".to_string(),
        match state.history.health_check() {
            Ok(()) => "healthy".to_string(),
            Err(e) => format!("unhealthy: {e}"),
        },
    );
    components.insert("storage".to_string(), "healthy".to_string());

    let all_healthy = components.values().all(|status| status == "healthy");
    let (overall_status, status_code) = if all_healthy {
        ("healthy", StatusCode::OK)
    } else {
        ("unhealthy", StatusCode::SERVICE_UNAVAILABLE)
    };

    let response = HealthResponse {
        status: overall_status.to_string(),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response))
}

fn parse_status_filter(status: Option<&str>) -> Result<Option<ItemStatus>, ApiError> {
    match status {
        None => Ok(None),
        Some("pending") => Ok(Some(ItemStatus::Pending)),
        Some("processing") => Ok(Some(ItemStatus::Processing)),
        Some("completed") => Ok(Some(ItemStatus::Completed)),
        Some("error") => Ok(Some(ItemStatus::Error)),
        Some(other) => Err(ApiError::InvalidPayload(format!(
            "unknown status filter: {other}"
        ))),
    }
}

/// Reads request body and validates size.
async fn read_body(body: axum::body::Body, max_size: usize) -> Result<Bytes, ApiError> {
    let data = body
        .collect()
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?
        .to_bytes();

    super::utils::validate_body_size(&data, max_size)?;

    Ok(data)
}
