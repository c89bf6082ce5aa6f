use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use tagmill::api::state::AppState;
use tagmill::config::Config;
use tagmill::credits::InMemoryLedger;
use tagmill::history::HistoryStore;
use tagmill::inference::HttpInferenceClient;
use tagmill::observability::Metrics;
use tagmill::session::{BatchSession, SessionEvent};
use tagmill::storage::AssetStore;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub async fn run(address_override: Option<SocketAddr>) -> Result<(), AnyError> {
    info!("Loading configuration");
    let config = Config::load().map_err(|e| format!("Failed to load config: {}", e))?;
    let address = address_override.unwrap_or(config.server.bind_addr);

    info!(path = %config.server.history_path.display(), "Opening history store");
    let history = HistoryStore::open(&config.server.history_path)
        .map_err(|e| format!("Failed to open history store: {}", e))?;

    // Asset storage: in-memory backend for the standalone server; an S3
    // deployment swaps the object_store backend here.
    let assets = AssetStore::in_memory();

    let inference = Arc::new(
        HttpInferenceClient::new(config.inference.to_inference_config())
            .map_err(|e| format!("Failed to build inference client: {}", e))?,
    );

    // Stand-in ledger seeded from config; a real deployment points this
    // seam at the billing service.
    let ledger = Arc::new(InMemoryLedger::new(
        config.credits.starting_balance,
        config.credits.unlimited,
    ));

    let session = Arc::new(BatchSession::new(
        inference,
        ledger,
        history.clone(),
        assets.clone(),
        config.dispatch.to_dispatch_config(),
    ));

    let metrics = Arc::new(Metrics::new());
    spawn_metrics_listener(&session, Arc::clone(&metrics));

    let state = AppState::new(config, session, history, assets, metrics);
    let app = tagmill::api::router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "Tagmill API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Fold session events into the metrics counters.
fn spawn_metrics_listener(session: &Arc<BatchSession>, metrics: Arc<Metrics>) {
    use tokio::sync::broadcast::error::RecvError;

    let mut events = session.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SessionEvent::BatchCompleted { summary }) => {
                    metrics.batch_completed();
                    metrics.record_summary(summary.succeeded as u64, summary.failed as u64);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
