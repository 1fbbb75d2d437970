//! Error types for chainfold.
//!
//! Library crates use [`ChainfoldError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Number of raw-output characters kept in a [`ChainfoldError::Parse`] for diagnosis.
pub const RAW_PREFIX_CHARS: usize = 300;

/// Top-level error type for all chainfold operations.
#[derive(Debug, thiserror::Error)]
pub enum ChainfoldError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The generation call failed or produced no usable text.
    #[error("transport error{}: {message}", segment_suffix(.segment))]
    Transport {
        segment: Option<usize>,
        message: String,
    },

    /// Model output could not be located or decoded as a delta.
    #[error("parse error{}: {message} (response start: {raw_prefix:?})", segment_suffix(.segment))]
    Parse {
        segment: Option<usize>,
        message: String,
        raw_prefix: String,
    },

    /// Decoded output (or caller input) has the wrong shape.
    #[error("validation error{}: {message}", segment_suffix(.segment))]
    Validation {
        segment: Option<usize>,
        message: String,
    },

    /// Network/HTTP error in a source collaborator.
    #[error("network error{}: {message}", segment_suffix(.segment))]
    Network {
        segment: Option<usize>,
        message: String,
    },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ChainfoldError>;

fn segment_suffix(segment: &Option<usize>) -> String {
    segment.map(|i| format!(" in segment {i}")).unwrap_or_default()
}

impl ChainfoldError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a transport error without segment context.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport {
            segment: None,
            message: msg.into(),
        }
    }

    /// Create a network error without segment context.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network {
            segment: None,
            message: msg.into(),
        }
    }

    /// Create a parse error, keeping a prefix of the offending raw text.
    pub fn parse(msg: impl Into<String>, raw: &str) -> Self {
        Self::Parse {
            segment: None,
            message: msg.into(),
            raw_prefix: raw.chars().take(RAW_PREFIX_CHARS).collect(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            segment: None,
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Attach the index of the segment being processed.
    ///
    /// Errors that already name a segment keep their original index.
    pub fn at_segment(self, index: usize) -> Self {
        match self {
            Self::Transport {
                segment: None,
                message,
            } => Self::Transport {
                segment: Some(index),
                message,
            },
            Self::Parse {
                segment: None,
                message,
                raw_prefix,
            } => Self::Parse {
                segment: Some(index),
                message,
                raw_prefix,
            },
            Self::Validation {
                segment: None,
                message,
            } => Self::Validation {
                segment: Some(index),
                message,
            },
            Self::Network {
                segment: None,
                message,
            } => Self::Network {
                segment: Some(index),
                message,
            },
            other => other,
        }
    }

    /// The segment this error is attributed to, if any.
    pub fn segment(&self) -> Option<usize> {
        match self {
            Self::Transport { segment, .. }
            | Self::Parse { segment, .. }
            | Self::Validation { segment, .. }
            | Self::Network { segment, .. } => *segment,
            _ => None,
        }
    }

    /// Whether a repair round-trip may fix this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Validation { .. })
    }
}
