//! Text-generation backends for chainfold.
//!
//! The accumulation engine only sees the [`Generator`] trait: one prompt in,
//! one block of text out. Concrete backends talk HTTP:
//! - [`OllamaGenerator`] — a local Ollama server
//! - [`OpenAiCompatGenerator`] — OpenRouter, OpenAI, or any `/chat/completions` endpoint
//!
//! An empty or whitespace-only completion is a transport error, never an
//! empty delta.

mod ollama;
mod openai_compat;

use std::sync::Arc;

use async_trait::async_trait;

use chainfold_shared::{ChainfoldError, LlmConfig, LlmProviderKind, Result};

pub use ollama::OllamaGenerator;
pub use openai_compat::OpenAiCompatGenerator;

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("chainfold/", env!("CARGO_PKG_VERSION"));

/// Maximum characters of a completion echoed into debug logs.
const MAX_LOG_CHARS: usize = 500;

/// A text-generation capability.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Send one prompt and wait for the full completion.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}

#[async_trait]
impl Generator for Arc<dyn Generator> {
    async fn generate(&self, prompt: &str) -> Result<String> {
        (**self).generate(prompt).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Build the generator selected by the `[llm]` config section.
///
/// Hosted providers read their API key from `api_key_env` at construction.
pub fn build_generator(config: &LlmConfig) -> Result<Arc<dyn Generator>> {
    match config.provider {
        LlmProviderKind::Ollama => Ok(Arc::new(OllamaGenerator::new(config)?)),
        LlmProviderKind::OpenaiCompatible => {
            let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());
            Ok(Arc::new(OpenAiCompatGenerator::new(config, api_key)?))
        }
    }
}

/// Build a reqwest client with the configured timeout.
fn build_client(config: &LlmConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.timeout())
        .build()
        .map_err(|e| ChainfoldError::transport(format!("failed to build HTTP client: {e}")))
}

/// Generate through any backend, treating a blank completion as a transport error.
pub async fn generate_text(generator: &dyn Generator, prompt: &str) -> Result<String> {
    let text = generator.generate(prompt).await?;
    reject_blank(generator.name(), text)
}

fn reject_blank(backend: &str, text: String) -> Result<String> {
    if text.trim().is_empty() {
        return Err(ChainfoldError::transport(format!(
            "{backend} returned empty response text"
        )));
    }
    Ok(text)
}

/// Reject completions with no usable text.
fn non_empty(backend: &str, text: String) -> Result<String> {
    let text = reject_blank(backend, text)?;
    tracing::debug!(
        backend,
        chars = text.len(),
        preview = %truncate_for_log(&text, MAX_LOG_CHARS),
        "generation complete"
    );
    Ok(text)
}

/// Map a non-success HTTP response to a transport error.
async fn status_error(backend: &str, response: reqwest::Response) -> ChainfoldError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    ChainfoldError::transport(format!(
        "{backend}: HTTP {status}: {}",
        truncate_for_log(&body, MAX_LOG_CHARS)
    ))
}

/// Cut `text` to at most `max_chars` characters for logging.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
