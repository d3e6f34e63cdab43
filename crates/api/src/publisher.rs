//! Config publishing after a running experiment's variant changes.

use std::time::Duration;

use async_trait::async_trait;
use navlens_core::error::CoreError;
use navlens_core::store::ConfigPublisher;

/// HTTP request timeout for a single publish.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// POSTs `{experimentId, siteId}` to the configured publish endpoint.
pub struct HttpConfigPublisher {
    client: reqwest::Client,
    url: String,
}

impl HttpConfigPublisher {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl ConfigPublisher for HttpConfigPublisher {
    async fn publish(&self, experiment_id: &str, site_id: &str) -> Result<(), CoreError> {
        let payload = serde_json::json!({
            "experimentId": experiment_id,
            "siteId": site_id,
        });
        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| CoreError::Internal(format!("Config publish request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(CoreError::Internal(format!(
                "Config publish returned HTTP {}",
                response.status().as_u16()
            )));
        }
        Ok(())
    }
}

/// Used when no publish endpoint is configured.
#[derive(Debug, Default)]
pub struct LogOnlyPublisher;

#[async_trait]
impl ConfigPublisher for LogOnlyPublisher {
    async fn publish(&self, experiment_id: &str, site_id: &str) -> Result<(), CoreError> {
        tracing::info!(experiment_id, site_id, "Config publish requested (log only)");
        Ok(())
    }
}
