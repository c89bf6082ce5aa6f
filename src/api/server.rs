use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::decompression::RequestDecompressionLayer;

use super::services;
use super::state::AppState;

/// Build the pipeline's HTTP router.
///
/// Kept separate from the listener so integration tests can drive the
/// router directly via `tower::ServiceExt::oneshot`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/queue",
            post(services::queue_asset)
                .get(services::get_queue)
                .delete(services::clear_queue),
        )
        .route("/queue/retry", post(services::retry_all))
        .route(
            "/queue/{item_id}",
            get(services::get_item).delete(services::remove_item),
        )
        .route("/queue/{item_id}/retry", post(services::retry_item))
        .route("/queue/{item_id}/download", get(services::download_item))
        .route("/batch", get(services::batch_status))
        .route("/batch/start", post(services::start_batch))
        .route("/batch/stop", post(services::stop_batch))
        .route("/archive", post(services::build_archive))
        .route("/history", get(services::list_history))
        .route("/history/prune", post(services::prune_history))
        .route("/history/{record_id}", delete(services::delete_history))
        .route("/metrics", get(services::get_metrics))
        .route("/health", get(services::health))
        .with_state(state)
        // Automatically decompress gzip request bodies for uploads
        .layer(RequestDecompressionLayer::new())
}
