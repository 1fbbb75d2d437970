//! OpenAI-compatible backend (`POST /chat/completions`).
//!
//! Works with OpenRouter, OpenAI, Gemini's OpenAI endpoint, vLLM and any
//! other server that follows the chat completions contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use chainfold_shared::{ChainfoldError, LlmConfig, Result};

use crate::{Generator, build_client, non_empty, status_error};

/// Generator backed by a chat completions endpoint.
pub struct OpenAiCompatGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    api_key: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatGenerator {
    /// Create a generator; `api_key` is sent as a bearer token when present.
    pub fn new(config: &LlmConfig, api_key: Option<String>) -> Result<Self> {
        let base = config.parsed_base_url()?;
        Ok(Self {
            client: build_client(config)?,
            endpoint: format!("{}/chat/completions", base.as_str().trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
        })
    }
}

#[async_trait]
impl Generator for OpenAiCompatGenerator {
    #[instrument(skip_all, fields(model = %self.model, prompt_chars = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ChainfoldError::transport(format!("{}: {e}", self.endpoint)))?;

        if !response.status().is_success() {
            return Err(status_error(self.name(), response).await);
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            ChainfoldError::transport(format!("invalid chat completion body: {e}"))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        non_empty(self.name(), content)
    }

    fn name(&self) -> &str {
        "openai-compatible"
    }
}
