use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::provider::{Provider, ProviderError};

/// Client for a sibling model-container microservice. Each module can have
/// its own container; the wire contract is `POST {base}/chat` with
/// `{message, conversation_id, metadata}` returning `{text, ...}`.
pub struct ContainerClient {
    client: reqwest::Client,
    base_url: String,
    label: String,
}

impl ContainerClient {
    pub fn new(base_url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            label: label.into(),
        }
    }

    /// Specialized side-channel endpoints exposed by the secretary
    /// container (e.g. `calendar_data_extraction`).
    pub async fn call_endpoint(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<serde_json::Value, ProviderError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!("Calling container endpoint {}", url);
        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }
        Ok(response.json().await?)
    }
}

#[derive(Deserialize)]
struct ContainerReply {
    text: Option<String>,
    response: Option<String>,
}

#[async_trait]
impl Provider for ContainerClient {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = format!("{}/chat", self.base_url);
        debug!("Calling container model {}", url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "message": prompt, "conversation_id": null, "metadata": {} }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }

        let parsed: ContainerReply = response.json().await?;
        parsed
            .text
            .or(parsed.response)
            .ok_or_else(|| ProviderError::Malformed("container reply had no text".into()))
    }
}
