pub mod deadline;
pub mod ollama;
pub mod parser;
pub mod prompt;
pub mod types;

pub use deadline::*;
pub use ollama::*;
pub use parser::*;
pub use prompt::*;
pub use types::*;

use thiserror::Error;

use crate::models::Degradation;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("LLM backend is not reachable at {0}")]
    Unavailable(String),

    #[error("LLM call timed out after {0} ms")]
    Timeout(u64),

    #[error("LLM backend returned error (status {status}): {body}")]
    Backend { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    Http(String),

    #[error("LLM returned an empty response")]
    EmptyResponse,

    #[error("Malformed LLM response: {0}")]
    MalformedResponse(String),
}

impl LlmError {
    /// Short label used in logs and failure counters.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Timeout(_) => "timeout",
            Self::Backend { .. } => "backend",
            Self::Http(_) => "http",
            Self::EmptyResponse => "empty_response",
            Self::MalformedResponse(_) => "malformed_response",
        }
    }

    /// Whether another attempt can reasonably succeed. Client errors from
    /// the backend (unknown model, bad request) will not change on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Backend { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            _ => true,
        }
    }

    pub fn degradation(&self) -> Degradation {
        match self {
            Self::Unavailable(_) | Self::Backend { .. } | Self::Http(_) => {
                Degradation::LlmUnavailable
            }
            Self::Timeout(_) => Degradation::LlmTimeout,
            Self::EmptyResponse | Self::MalformedResponse(_) => Degradation::LlmMalformedResponse,
        }
    }
}
