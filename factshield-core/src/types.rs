//! Core data types shared across the FactShield components.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AnalysisError;

/// What the user submitted: a link to an article or the article text itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Url,
    Text,
}

impl std::fmt::Display for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputKind::Url => write!(f, "url"),
            InputKind::Text => write!(f, "text"),
        }
    }
}

impl std::str::FromStr for InputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "url" => Ok(InputKind::Url),
            "text" => Ok(InputKind::Text),
            other => Err(format!("unknown input kind '{other}' (expected 'url' or 'text')")),
        }
    }
}

/// A validated submission, ready to be sent to the analysis service.
///
/// Only [`crate::validation::validate`] constructs these, so a request in hand
/// always satisfies the URL/text invariants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisRequest {
    kind: InputKind,
    payload: String,
}

impl AnalysisRequest {
    pub(crate) fn new(kind: InputKind, payload: String) -> Self {
        Self { kind, payload }
    }

    pub fn kind(&self) -> InputKind {
        self.kind
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}

/// Polarity of a single explanatory signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactorKind {
    Positive,
    Negative,
    Neutral,
}

impl std::fmt::Display for FactorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FactorKind::Positive => write!(f, "positive"),
            FactorKind::Negative => write!(f, "negative"),
            FactorKind::Neutral => write!(f, "neutral"),
        }
    }
}

/// One signal explaining why a score was assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorItem {
    #[serde(rename = "type")]
    pub kind: FactorKind,
    pub title: String,
    pub description: String,
}

impl FactorItem {
    pub fn new(kind: FactorKind, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn positive(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(FactorKind::Positive, title, description)
    }

    pub fn negative(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(FactorKind::Negative, title, description)
    }

    pub fn neutral(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(FactorKind::Neutral, title, description)
    }
}

/// Highest credibility score the service may report.
pub const MAX_SCORE: u8 = 100;

/// The credibility assessment returned by the analysis service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Credibility score in `0..=100`, higher is more trustworthy.
    pub score: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, alias = "url", skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default)]
    pub factors: Vec<FactorItem>,
}

impl AnalysisResult {
    pub fn new(score: u8, factors: Vec<FactorItem>) -> Self {
        Self {
            score: score.min(MAX_SCORE),
            title: None,
            source_url: None,
            factors,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    /// Host name of the analyzed article, when the source URL parses.
    pub fn source_host(&self) -> Option<String> {
        let raw = self.source_url.as_deref()?;
        url::Url::parse(raw)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }
}

/// Monotonically increasing identifier of an issued analysis request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl RequestId {
    pub fn next(self) -> Self {
        RequestId(self.0 + 1)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of an orchestrator.
///
/// Validation is synchronous, so there is no observable "validating" state:
/// an invalid submission leaves the current state untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestState {
    Idle,
    Pending(RequestId),
    Succeeded(Arc<AnalysisResult>),
    Failed(AnalysisError),
}

impl RequestState {
    pub fn status(&self) -> RequestStatus {
        match self {
            RequestState::Idle => RequestStatus::Idle,
            RequestState::Pending(_) => RequestStatus::Analyzing,
            RequestState::Succeeded(_) => RequestStatus::Success,
            RequestState::Failed(_) => RequestStatus::Error,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, RequestState::Pending(_))
    }

    /// Whether the request has settled, successfully or not.
    pub fn is_settled(&self) -> bool {
        matches!(self, RequestState::Succeeded(_) | RequestState::Failed(_))
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match self {
            RequestState::Succeeded(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&AnalysisError> {
        match self {
            RequestState::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Coarse status of a [`RequestState`], used for display and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Idle,
    Analyzing,
    Success,
    Error,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestStatus::Idle => write!(f, "idle"),
            RequestStatus::Analyzing => write!(f, "analyzing"),
            RequestStatus::Success => write!(f, "success"),
            RequestStatus::Error => write!(f, "error"),
        }
    }
}
