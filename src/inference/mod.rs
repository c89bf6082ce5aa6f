//! External inference service boundary.
//!
//! Every call's outcome is converted to a typed [`InferenceError`] here,
//! before it can reach queue-state mutation code. The dispatcher maps
//! the taxonomy onto batch behavior: rate limits trigger an extended
//! backoff, exhausted credits stop the run, everything else fails the
//! one item.

pub mod client;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

pub use client::{HttpInferenceClient, InferenceConfig};
pub use types::{GenerationParams, InferenceRequest, InferenceResponse, VariantResult};

#[derive(Debug, Error)]
pub enum InferenceError {
    /// HTTP 429: transient, the shared rate limit is saturated.
    #[error("inference rate limited")]
    RateLimited,

    /// HTTP 402: the account ran out of credits mid-run.
    #[error("credits exhausted")]
    CreditsExhausted,

    /// Any other non-success status: fatal for the one item.
    #[error("inference rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// Connection/timeout/body failures below the HTTP layer.
    #[error("inference transport error: {0}")]
    Transport(String),
}

impl InferenceError {
    /// Whether a user-initiated retry of the item is expected to help.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            InferenceError::RateLimited | InferenceError::Transport(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, InferenceError>;

/// The inference seam. Production uses [`HttpInferenceClient`]; tests
/// substitute scripted implementations.
#[async_trait]
pub trait InferenceService: Send + Sync {
    async fn generate(&self, request: &InferenceRequest) -> Result<InferenceResponse>;
}
