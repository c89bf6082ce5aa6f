//! HTTP client for the external inference service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::types::{InferenceRequest, InferenceResponse};
use super::{InferenceError, InferenceService, Result};

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub endpoint: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub api_key: Option<String>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:9400/v1/generate".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(120),
            api_key: None,
        }
    }
}

/// reqwest-backed [`InferenceService`].
///
/// Does not retry: transient failures are surfaced as typed errors and
/// the dispatcher decides what a retry means for the batch.
pub struct HttpInferenceClient {
    client: Client,
    config: InferenceConfig,
}

impl HttpInferenceClient {
    pub fn new(config: InferenceConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(concat!("tagmill/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| InferenceError::Transport(e.to_string()))?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl InferenceService for HttpInferenceClient {
    async fn generate(&self, request: &InferenceRequest) -> Result<InferenceResponse> {
        debug!(
            asset_url = %request.asset_url,
            selectors = request.variant_selectors.len(),
            "Invoking inference"
        );

        let mut builder = self.client.post(&self.config.endpoint).json(request);
        if let Some(key) = &self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                InferenceError::Transport("request timed out".to_string())
            } else {
                InferenceError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        match status {
            StatusCode::TOO_MANY_REQUESTS => Err(InferenceError::RateLimited),
            StatusCode::PAYMENT_REQUIRED => Err(InferenceError::CreditsExhausted),
            s if !s.is_success() => {
                let message = response.text().await.unwrap_or_default();
                Err(InferenceError::Rejected {
                    status: s.as_u16(),
                    message,
                })
            }
            _ => {
                let payload: InferenceResponse = response
                    .json()
                    .await
                    .map_err(|e| InferenceError::Transport(format!("invalid response body: {e}")))?;

                debug!(variants = payload.variants.len(), "Inference completed");
                Ok(payload)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = InferenceConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert!(config.api_key.is_none());
    }

    #[test]
    fn client_builds_with_defaults() {
        assert!(HttpInferenceClient::new(InferenceConfig::default()).is_ok());
    }
}
