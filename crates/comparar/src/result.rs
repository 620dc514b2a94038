//! Result and error types for Comparar.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for Comparar operations
pub type CompararResult<T> = Result<T, CompararError>;

/// Errors that can occur in Comparar
#[derive(Debug, Error)]
pub enum CompararError {
    /// The two captures being compared have different sizes
    #[error("Image dimensions differ: {left_width}x{left_height} vs {right_width}x{right_height}")]
    DimensionMismatch {
        /// Width of the first image
        left_width: u32,
        /// Height of the first image
        left_height: u32,
        /// Width of the second image
        right_width: u32,
        /// Height of the second image
        right_height: u32,
    },

    /// Malformed image bytes or pixel buffer
    #[error("Image codec error: {message}")]
    Codec {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Operation timed out
    #[error("Operation timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Screenshot error
    #[error("Screenshot failed: {message}")]
    Screenshot {
        /// Error message
        message: String,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// The capture adapter cannot drive the requested browser
    #[error("Unsupported browser: {name}")]
    UnsupportedBrowser {
        /// Browser name from the configuration
        name: String,
    },

    /// Artifact could not be written
    #[error("Failed to write {}: {source}", path.display())]
    Storage {
        /// Artifact path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl CompararError {
    /// Create a codec error
    #[must_use]
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a storage error for `path`
    #[must_use]
    pub fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Whether the error came from acquiring a capture (navigation, timeout,
    /// screenshot or an unsupported browser)
    #[must_use]
    pub const fn is_capture_failure(&self) -> bool {
        matches!(
            self,
            Self::Navigation { .. }
                | Self::Timeout { .. }
                | Self::Screenshot { .. }
                | Self::UnsupportedBrowser { .. }
        )
    }

    /// Whether the error must abort the whole run rather than a single
    /// combination
    #[must_use]
    pub const fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::Config { .. } | Self::BrowserLaunch { .. }
        )
    }
}
