//! Error taxonomy for analysis requests

use thiserror::Error;

/// Everything that can stop an analysis request from producing a report.
///
/// `NotConnected` and `ModelNotLoaded` are pre-flight failures detected by
/// the caller before an orchestrator runs. `Connection`, `Timeout`, `Http`
/// and `Unexpected` are transient and retried by the orchestrators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Cannot connect to Ollama at {base_url}. Please ensure it is running (`ollama serve`)")]
    NotConnected { base_url: String },

    #[error("Required model '{model}' is not loaded. Run `ollama pull {model}` first")]
    ModelNotLoaded { model: String },

    #[error("Connection Error: cannot connect to Ollama at {0}")]
    Connection(String),

    #[error("Timeout Error: request to the model took longer than {0} seconds")]
    Timeout(u64),

    #[error("Error: HTTP {status} - {body}")]
    Http { status: u16, body: String },

    #[error("Unexpected Error: {0}")]
    Unexpected(String),

    #[error("Image could not be prepared: {0}")]
    InvalidImage(String),

    #[error("Please enter some medical text to analyze")]
    EmptyInput,

    #[error("Analysis cancelled")]
    Cancelled,
}

impl AnalysisError {
    /// Create an unexpected error.
    pub fn unexpected(msg: impl Into<String>) -> Self {
        Self::Unexpected(msg.into())
    }

    /// True for the failures the orchestrators retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Timeout(_) | Self::Http { .. } | Self::Unexpected(_)
        )
    }

    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotConnected { .. } => "not_connected",
            Self::ModelNotLoaded { .. } => "model_not_loaded",
            Self::Connection(_) => "connection_error",
            Self::Timeout(_) => "timeout",
            Self::Http { .. } => "http_error",
            Self::Unexpected(_) => "unexpected_error",
            Self::InvalidImage(_) => "invalid_image",
            Self::EmptyInput => "empty_input",
            Self::Cancelled => "cancelled",
        }
    }
}
