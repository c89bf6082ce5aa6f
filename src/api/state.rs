use std::sync::Arc;

use crate::config::Config;
use crate::history::HistoryStore;
use crate::observability::Metrics;
use crate::session::BatchSession;
use crate::storage::AssetStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session: Arc<BatchSession>,
    pub history: HistoryStore,
    pub assets: AssetStore,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(
        config: Config,
        session: Arc<BatchSession>,
        history: HistoryStore,
        assets: AssetStore,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            session,
            history,
            assets,
            metrics,
        }
    }
}
