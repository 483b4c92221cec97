use serde::{Deserialize, Serialize};
use std::fmt;

/// Single structured error shape used across the pipeline layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

/// Stable error codes. The first four are the recoverable query faults; the rest are
/// load-time failures of configuration and data assets.
pub mod codes {
    pub const UNSUPPORTED_INPUT: &str = "TRIAGE_UNSUPPORTED_INPUT";
    pub const RETRIEVAL_UNAVAILABLE: &str = "TRIAGE_RETRIEVAL_UNAVAILABLE";
    pub const CLASSIFICATION_TIMEOUT: &str = "TRIAGE_CLASSIFICATION_TIMEOUT";
    pub const CORPUS_VERSION_MISMATCH: &str = "TRIAGE_CORPUS_VERSION_MISMATCH";

    pub const LEXICON_INVALID: &str = "TRIAGE_LEXICON_INVALID";
    pub const RULES_INVALID: &str = "TRIAGE_RULES_INVALID";
    pub const CONFIG_INVALID: &str = "TRIAGE_CONFIG_INVALID";
    pub const CORPUS_STORE_FAILED: &str = "TRIAGE_CORPUS_STORE_FAILED";
    pub const EMBEDDINGS_FAILED: &str = "TRIAGE_EMBEDDINGS_FAILED";
    pub const REMOTE_NOT_ALLOWED: &str = "TRIAGE_REMOTE_NOT_ALLOWED";
    pub const GUARDRAIL_VIOLATION: &str = "TRIAGE_GUARDRAIL_VIOLATION";
}
