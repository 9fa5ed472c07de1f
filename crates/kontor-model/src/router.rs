use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tracing::{info, warn};

use kontor_types::Module;

use crate::container::ContainerClient;
use crate::prompts;
use crate::provider::Provider;

/// Canned reply when every provider in the chain has failed. Chat endpoints
/// absorb provider failures: the user always gets a best-effort answer.
pub const FALLBACK_REPLY: &str =
    "Es tut mir leid, ich konnte keine Antwort generieren. Bitte versuchen Sie es später erneut.";

const CALENDAR_KEYWORDS: &[&str] = &[
    "kalender", "termin", "meeting", "besprechung", "calendar", "appointment", "schedule",
];

#[derive(Debug, Clone)]
pub struct RouterReply {
    pub text: String,
    /// Name of the backend that produced the text, or "fallback".
    pub model: String,
    /// Structured side-data (calendar extraction, error info).
    pub metadata: Option<serde_json::Value>,
}

/// Routes a module chat turn to its ordered provider chain.
pub struct ModelRouter {
    chains: HashMap<Module, Vec<Arc<dyn Provider>>>,
    secretary_container: Option<Arc<ContainerClient>>,
}

impl ModelRouter {
    pub fn new() -> Self {
        Self {
            chains: HashMap::new(),
            secretary_container: None,
        }
    }

    pub fn with_chain(mut self, module: Module, providers: Vec<Arc<dyn Provider>>) -> Self {
        self.chains.insert(module, providers);
        self
    }

    /// Secretary side-channel for structured calendar-event extraction.
    pub fn with_secretary_container(mut self, container: Arc<ContainerClient>) -> Self {
        self.secretary_container = Some(container);
        self
    }

    /// Generate a reply for one chat turn. `context` is (role, content)
    /// pairs, oldest first. `preferred` moves a named provider to the front
    /// of the chain. Never fails: provider errors degrade to the canned
    /// reply with the error recorded in metadata.
    pub async fn respond(
        &self,
        module: Module,
        message: &str,
        context: &[(String, String)],
        preferred: Option<&str>,
    ) -> RouterReply {
        let prompt = prompts::build_prompt(module, context, message);

        let mut last_error = None;
        let chain = self.chains.get(&module).map(Vec::as_slice).unwrap_or(&[]);
        let mut ordered: Vec<&Arc<dyn Provider>> = chain.iter().collect();
        if let Some(name) = preferred {
            ordered.sort_by_key(|p| p.name() != name);
        }
        for provider in ordered {
            match provider.generate(&prompt).await {
                Ok(text) => {
                    info!("Module {} answered by {}", module, provider.name());
                    let metadata = if module == Module::Secretary {
                        self.extract_calendar_data(message).await
                    } else {
                        None
                    };
                    return RouterReply {
                        text,
                        model: provider.name().to_string(),
                        metadata,
                    };
                }
                Err(e) => {
                    warn!("Provider {} failed for {}: {}", provider.name(), module, e);
                    last_error = Some(e);
                }
            }
        }

        let error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no providers configured".to_string());
        RouterReply {
            text: FALLBACK_REPLY.to_string(),
            model: "fallback".to_string(),
            metadata: Some(json!({ "error": error })),
        }
    }

    /// Hybrid split for the secretary module: the drafting provider wrote
    /// the user-facing reply; when calendar keywords are present, a second
    /// backend extracts structured event fields. Extraction failure is
    /// absorbed; the reply stands on its own.
    async fn extract_calendar_data(&self, message: &str) -> Option<serde_json::Value> {
        if !mentions_calendar(message) {
            return None;
        }
        let container = self.secretary_container.as_ref()?;
        match container
            .call_endpoint("calendar_data_extraction", json!({ "message": message }))
            .await
        {
            Ok(reply) => reply
                .get("extracted_data")
                .filter(|v| !v.is_null())
                .map(|data| json!({ "calendar_data": data })),
            Err(e) => {
                warn!("Calendar extraction failed: {}", e);
                None
            }
        }
    }
}

impl Default for ModelRouter {
    fn default() -> Self {
        Self::new()
    }
}

fn mentions_calendar(message: &str) -> bool {
    let lower = message.to_lowercase();
    CALENDAR_KEYWORDS.iter().any(|kw| lower.contains(kw))
}
