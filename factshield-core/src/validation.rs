//! Input validation for analysis submissions.
//!
//! Normalizes raw user input into an [`AnalysisRequest`]. Validation is a
//! pure function of its arguments: no I/O, no clock, no shared state.

use crate::error::ValidationError;
use crate::types::{AnalysisRequest, InputKind};

/// Minimum number of characters (after trimming) a text submission needs.
pub const MIN_TEXT_CHARS: usize = 50;

/// Validate a raw submission of the given kind.
///
/// Surrounding whitespace is trimmed in all cases. URL payloads are returned
/// exactly as typed (minus the whitespace): case, path and query are kept.
pub fn validate(raw: &str, kind: InputKind) -> Result<AnalysisRequest, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyInput { kind });
    }

    match kind {
        InputKind::Url => validate_url(trimmed)?,
        InputKind::Text => validate_text(trimmed)?,
    }

    Ok(AnalysisRequest::new(kind, trimmed.to_string()))
}

fn validate_url(input: &str) -> Result<(), ValidationError> {
    let parsed = url::Url::parse(input).map_err(|e| ValidationError::MalformedUrl {
        input: input.to_string(),
        reason: e.to_string(),
    })?;

    // `mailto:` and friends parse fine but have nothing to fetch.
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(ValidationError::MalformedUrl {
            input: input.to_string(),
            reason: "URL has no host".to_string(),
        }),
    }
}

fn validate_text(input: &str) -> Result<(), ValidationError> {
    let length = input.chars().count();
    if length < MIN_TEXT_CHARS {
        return Err(ValidationError::TooShort {
            length,
            minimum: MIN_TEXT_CHARS,
        });
    }
    Ok(())
}
