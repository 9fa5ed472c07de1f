use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::provider::{Provider, ProviderError};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Direct Gemini `generateContent` client.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(api_key: String, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
            temperature,
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<serde_json::Value>,
    #[serde(rename = "generationConfig")]
    generation_config: serde_json::Value,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[async_trait]
impl Provider for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NotConfigured("GEMINI_API_KEY"));
        }

        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_API_BASE, self.model, self.api_key
        );
        let body = GenerateRequest {
            contents: vec![json!({ "parts": [{ "text": prompt }] })],
            generation_config: json!({ "temperature": self.temperature }),
        };

        debug!("Calling Gemini model {}", self.model);
        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }

        let parsed: GenerateResponse = response.json().await?;
        let text = parsed
            .candidates
            .unwrap_or_default()
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .and_then(|p| p.text)
            .ok_or_else(|| ProviderError::Malformed("no candidate text".into()))?;

        Ok(text)
    }
}
