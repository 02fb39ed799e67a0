//! Error types for the FactShield core.
//!
//! Uses `thiserror` for public API error types with structured error variants
//! covering input validation, the analysis service, and configuration.

use serde::{Deserialize, Serialize};

use crate::types::InputKind;

/// Top-level error type for the FactShield core library.
#[derive(Debug, thiserror::Error)]
pub enum FactShieldError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while validating a raw submission.
///
/// These never leave the submitting caller: the orchestrator reports them
/// synchronously and does not change state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("No {kind} content was submitted")]
    EmptyInput { kind: InputKind },

    #[error("'{input}' is not an absolute URL: {reason}")]
    MalformedUrl { input: String, reason: String },

    #[error("Text is {length} characters long, at least {minimum} are required")]
    TooShort { length: usize, minimum: usize },
}

impl ValidationError {
    /// The message shown next to the input field.
    pub fn message(&self) -> String {
        match self {
            ValidationError::EmptyInput {
                kind: InputKind::Url,
            } => "Please enter a URL".to_string(),
            ValidationError::EmptyInput {
                kind: InputKind::Text,
            } => "Please enter some text to analyze".to_string(),
            ValidationError::MalformedUrl { .. } => "Please enter a valid URL".to_string(),
            ValidationError::TooShort { minimum, .. } => {
                format!("Please enter at least {minimum} characters for accurate analysis")
            }
        }
    }
}

/// Machine-readable classification of an [`AnalysisError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisErrorKind {
    Service,
    Timeout,
}

impl std::fmt::Display for AnalysisErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisErrorKind::Service => write!(f, "service_error"),
            AnalysisErrorKind::Timeout => write!(f, "timeout_error"),
        }
    }
}

/// Errors originating from the analysis service call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnalysisError {
    #[error("Analysis service error ({code}): {message}")]
    Service { code: String, message: String },

    #[error("Analysis timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

impl AnalysisError {
    /// Shorthand for a service-side failure.
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        AnalysisError::Service {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> AnalysisErrorKind {
        match self {
            AnalysisError::Service { .. } => AnalysisErrorKind::Service,
            AnalysisError::Timeout { .. } => AnalysisErrorKind::Timeout,
        }
    }
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// A type alias for results using the top-level `FactShieldError`.
pub type Result<T> = std::result::Result<T, FactShieldError>;
