mod detect;
mod gemini;
mod scripted;

use async_trait::async_trait;
use thiserror::Error;

pub use detect::LanguageDetector;
pub use gemini::{GeminiConfig, GeminiModel};
pub use scripted::ScriptedModel;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("language model request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("language model returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("language model returned no text")]
    EmptyResponse,
    #[error("could not decode language model response: {0}")]
    Decode(String),
}

/// Opaque text-completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}
