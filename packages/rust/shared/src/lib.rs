//! Shared types, error model, and configuration for chainfold.
//!
//! This crate is the foundation depended on by all other chainfold crates.
//! It provides:
//! - [`ChainfoldError`] — the unified error type
//! - Domain types ([`Segment`], [`PeriodWindow`], [`TextChunk`], [`Extraction`], [`RunId`])
//! - Configuration ([`AppConfig`], [`ChunkConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ChunkConfig, ExtractionConfig, LlmConfig, LlmProviderKind, RepairConfig,
    TrendsConfig, config_dir, config_file_path, init_config, load_config, load_config_from,
    validate_api_key,
};
pub use error::{ChainfoldError, RAW_PREFIX_CHARS, Result};
pub use types::{
    Entity, Extraction, Page, PeriodWindow, Properties, Relationship, RunId, Segment, SegmentSource,
    TextChunk,
};
