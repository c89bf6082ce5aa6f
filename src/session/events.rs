//! Discrete events emitted by a batch session.
//!
//! UI layers and tests subscribe to these; nothing outside the session
//! mutates queue state directly.

use serde::Serialize;

use crate::queue::ItemStatus;

/// Outcome counts for one dispatch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchSummary {
    pub batch_id: String,
    /// Items the loop actually started, including the failed ones.
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// True when the run ended via the stop command rather than queue
    /// exhaustion.
    pub stopped: bool,
}

impl DispatchSummary {
    /// One human-readable line for the notification surface.
    pub fn message(&self) -> String {
        if self.failed == 0 {
            format!("Processed {} of {}", self.succeeded, self.attempted)
        } else {
            format!("{} succeeded, {} failed", self.succeeded, self.failed)
        }
    }
}

/// Batch session event stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    ItemChanged {
        item_id: String,
        status: ItemStatus,
    },
    BatchCompleted {
        summary: DispatchSummary,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_message_all_success() {
        let summary = DispatchSummary {
            batch_id: "b".into(),
            attempted: 3,
            succeeded: 3,
            failed: 0,
            stopped: false,
        };
        assert_eq!(summary.message(), "Processed 3 of 3");
    }

    #[test]
    fn summary_message_with_failures() {
        let summary = DispatchSummary {
            batch_id: "b".into(),
            attempted: 3,
            succeeded: 2,
            failed: 1,
            stopped: false,
        };
        assert_eq!(summary.message(), "2 succeeded, 1 failed");
    }

    #[test]
    fn events_serialize_with_tag() {
        let event = SessionEvent::ItemChanged {
            item_id: "i".into(),
            status: ItemStatus::Processing,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "item_changed");
        assert_eq!(json["status"], "processing");
    }
}
