pub mod error;
pub mod keys;
pub mod pruning;
pub mod store;

pub use error::{HistoryError, Result};
pub use pruning::PruneStats;
pub use store::{HistoryFilter, HistoryRecord, HistoryStore};
