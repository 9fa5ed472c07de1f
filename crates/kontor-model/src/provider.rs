use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider not configured: {0}")]
    NotConfigured(&'static str),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("provider returned status {0}")]
    Status(u16),
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

/// Uniform contract over every text backend, direct LLM APIs and the
/// sibling model containers alike. The router iterates an ordered list of
/// these until one succeeds.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Short identifier recorded in message metadata (e.g. "gemini-1.5-pro").
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}
