//! Local Ollama backend (`POST /api/generate`, non-streaming).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use chainfold_shared::{ChainfoldError, LlmConfig, Result};

use crate::{Generator, build_client, non_empty, status_error};

/// Generator backed by a local Ollama server.
pub struct OllamaGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

impl OllamaGenerator {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let base = config.parsed_base_url()?;
        Ok(Self {
            client: build_client(config)?,
            endpoint: format!("{}/api/generate", base.as_str().trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    #[instrument(skip_all, fields(model = %self.model, prompt_chars = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChainfoldError::transport(format!("{}: {e}", self.endpoint)))?;

        if !response.status().is_success() {
            return Err(status_error(self.name(), response).await);
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            ChainfoldError::transport(format!("invalid Ollama response body: {e}"))
        })?;

        non_empty(self.name(), parsed.response)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
