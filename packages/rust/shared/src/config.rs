//! Application configuration for chainfold.
//!
//! User config lives at `~/.chainfold/chainfold.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ChainfoldError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "chainfold.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".chainfold";

// ---------------------------------------------------------------------------
// Config structs (matching chainfold.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Generation backend settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Document extraction settings.
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Trend analysis settings.
    #[serde(default)]
    pub trends: TrendsConfig,

    /// Output repair settings.
    #[serde(default)]
    pub repair: RepairConfig,
}

/// Which generation backend to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LlmProviderKind {
    /// A local Ollama server (`/api/generate`).
    Ollama,
    /// Any OpenAI-compatible `/chat/completions` endpoint (OpenRouter, OpenAI, Gemini).
    OpenaiCompatible,
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: LlmProviderKind,

    /// Base URL of the backend.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier passed to the backend.
    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Sampling temperature; low values keep extraction consistent.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Parse `base_url`, rejecting malformed values early.
    pub fn parsed_base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url).map_err(|e| {
            ChainfoldError::config(format!("invalid llm.base_url '{}': {e}", self.base_url))
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_provider() -> LlmProviderKind {
    LlmProviderKind::Ollama
}
fn default_base_url() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "llama3.1".into()
}
fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_timeout_secs() -> u64 {
    300
}

/// `[extraction]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Approximate tokens per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size_tokens: usize,

    /// Approximate tokens shared between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap_tokens: usize,

    /// Entity category bounded after every merge.
    #[serde(default = "default_capped_category")]
    pub capped_category: String,

    /// Maximum entities kept in the capped category.
    #[serde(default = "default_max_per_category")]
    pub max_per_category: usize,

    /// Where `--arxiv` papers are downloaded from; `{id}.pdf` is appended.
    #[serde(default = "default_arxiv_pdf_base_url")]
    pub arxiv_pdf_base_url: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            chunk_size_tokens: default_chunk_size(),
            chunk_overlap_tokens: default_chunk_overlap(),
            capped_category: default_capped_category(),
            max_per_category: default_max_per_category(),
            arxiv_pdf_base_url: default_arxiv_pdf_base_url(),
        }
    }
}

fn default_chunk_size() -> usize {
    2000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_arxiv_pdf_base_url() -> String {
    "https://arxiv.org/pdf".into()
}
fn default_capped_category() -> String {
    "Technology".into()
}
fn default_max_per_category() -> usize {
    20
}

/// `[trends]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendsConfig {
    /// Year split into quarters when no months are given.
    #[serde(default = "default_year")]
    pub year: i32,

    /// Stories fetched per period.
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,

    /// Base URL of the HN Algolia API.
    #[serde(default = "default_hn_base_url")]
    pub hn_base_url: String,
}

impl Default for TrendsConfig {
    fn default() -> Self {
        Self {
            year: default_year(),
            search_limit: default_search_limit(),
            hn_base_url: default_hn_base_url(),
        }
    }
}

fn default_year() -> i32 {
    2024
}
fn default_search_limit() -> u32 {
    10
}
fn default_hn_base_url() -> String {
    "https://hn.algolia.com/api/v1".into()
}

/// `[repair]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepairConfig {
    /// Repair round-trips allowed per segment.
    #[serde(default = "default_max_repairs")]
    pub max_repairs: u32,

    /// Delay before each repair call, in milliseconds.
    #[serde(default)]
    pub backoff_ms: u64,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_repairs: default_max_repairs(),
            backoff_ms: 0,
        }
    }
}

fn default_max_repairs() -> u32 {
    1
}

// ---------------------------------------------------------------------------
// Chunk config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    pub chunk_size_tokens: usize,
    pub overlap_tokens: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size_tokens: default_chunk_size(),
            overlap_tokens: default_chunk_overlap(),
        }
    }
}

impl From<&AppConfig> for ChunkConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            chunk_size_tokens: config.extraction.chunk_size_tokens,
            overlap_tokens: config.extraction.chunk_overlap_tokens,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.chainfold/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ChainfoldError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.chainfold/chainfold.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ChainfoldError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ChainfoldError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ChainfoldError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| ChainfoldError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ChainfoldError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the API key env var is set when the provider needs one.
///
/// Local Ollama servers need no key.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    if config.llm.provider == LlmProviderKind::Ollama {
        return Ok(());
    }
    let var_name = &config.llm.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(ChainfoldError::config(format!(
            "API key not found. Set the {var_name} environment variable."
        ))),
    }
}
