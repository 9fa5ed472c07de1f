//! Model backends and routing: a uniform `Provider` contract over Gemini,
//! OpenAI and the per-module model containers, plus the router that walks
//! an ordered fallback chain and never propagates a provider failure to
//! the chat caller.

pub mod container;
pub mod gemini;
pub mod openai;
pub mod prompts;
pub mod provider;
pub mod router;

pub use container::ContainerClient;
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;
pub use provider::{Provider, ProviderError};
pub use router::{FALLBACK_REPLY, ModelRouter, RouterReply};
