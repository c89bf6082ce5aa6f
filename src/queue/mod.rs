pub mod item;
pub mod manager;

pub use item::{Batch, ItemFailure, ItemStatus, QueueItem, ResultPayload, Variant, Verdict};
pub use manager::{BatchQueue, QueueError, StatusCounts};
