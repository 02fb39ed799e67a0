//! The analysis service boundary.
//!
//! The credibility algorithm itself lives behind [`AnalysisService`]. Two
//! implementations ship with the core: [`MockAnalysisService`], which stands
//! in for a backend during development and tests, and
//! [`HttpAnalysisService`], which posts requests to a remote endpoint.

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{ServiceConfig, ServiceProvider};
use crate::error::{AnalysisError, ConfigError};
use crate::sync::lock;
use crate::types::{AnalysisRequest, AnalysisResult, FactorItem, InputKind, MAX_SCORE};

/// A backend that scores content for credibility.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Analyze a validated request.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError>;

    /// Short name used in logs.
    fn name(&self) -> &str;
}

/// Build the service selected by `config`.
pub fn build_service(config: &ServiceConfig) -> Result<Arc<dyn AnalysisService>, ConfigError> {
    match config.provider {
        ServiceProvider::Mock => Ok(Arc::new(
            MockAnalysisService::new().with_delay(Duration::from_millis(config.mock_delay_ms)),
        )),
        ServiceProvider::Http => {
            let endpoint = config.endpoint.as_deref().ok_or_else(|| ConfigError::Invalid {
                message: "service.endpoint is required for the http provider".into(),
            })?;
            let service = HttpAnalysisService::new(endpoint)?;
            Ok(Arc::new(match &config.api_key {
                Some(key) => service.with_api_key(key.clone()),
                None => service,
            }))
        }
    }
}

// --- Mock service ---

/// A scripted response: how long to wait, then what to return.
#[derive(Debug, Clone)]
struct ScriptedOutcome {
    delay: Duration,
    outcome: Result<AnalysisResult, AnalysisError>,
}

/// In-process analysis service producing sample data.
///
/// Without scripted outcomes it waits for the configured delay and returns a
/// random score with a fixed set of sample factors. Scripted outcomes take
/// precedence, each with its own delay: those queued for a specific payload
/// first, then the general queue in call order.
pub struct MockAnalysisService {
    delay: Duration,
    script: Mutex<VecDeque<ScriptedOutcome>>,
    script_by_payload: Mutex<HashMap<String, VecDeque<ScriptedOutcome>>>,
    received: Mutex<Vec<AnalysisRequest>>,
}

impl MockAnalysisService {
    pub fn new() -> Self {
        Self {
            delay: Duration::from_secs(2),
            script: Mutex::new(VecDeque::new()),
            script_by_payload: Mutex::new(HashMap::new()),
            received: Mutex::new(Vec::new()),
        }
    }

    /// Latency applied to unscripted calls.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue an outcome for the next unanswered call.
    pub fn queue_outcome(
        &self,
        delay: Duration,
        outcome: Result<AnalysisResult, AnalysisError>,
    ) -> &Self {
        lock(&self.script).push_back(ScriptedOutcome { delay, outcome });
        self
    }

    /// Queue an outcome for the next call carrying exactly `payload`.
    pub fn queue_outcome_for(
        &self,
        payload: impl Into<String>,
        delay: Duration,
        outcome: Result<AnalysisResult, AnalysisError>,
    ) -> &Self {
        lock(&self.script_by_payload)
            .entry(payload.into())
            .or_default()
            .push_back(ScriptedOutcome { delay, outcome });
        self
    }

    fn next_scripted(&self, payload: &str) -> Option<ScriptedOutcome> {
        let keyed = lock(&self.script_by_payload)
            .get_mut(payload)
            .and_then(VecDeque::pop_front);
        keyed.or_else(|| lock(&self.script).pop_front())
    }

    /// Requests received so far, in call order.
    pub fn received(&self) -> Vec<AnalysisRequest> {
        lock(&self.received).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.received).len()
    }

    /// The sample result the mock produces for `request` with `score`.
    pub fn sample_result(request: &AnalysisRequest, score: u8) -> AnalysisResult {
        let result = AnalysisResult::new(score, sample_factors()).with_title("Sample Article Title");
        match request.kind() {
            InputKind::Url => result.with_source_url(request.payload()),
            InputKind::Text => result,
        }
    }
}

impl Default for MockAnalysisService {
    fn default() -> Self {
        Self::new()
    }
}

fn sample_factors() -> Vec<FactorItem> {
    vec![
        FactorItem::positive(
            "Credible Source",
            "The article is published by a reputable news source with a history of accurate reporting.",
        ),
        FactorItem::positive(
            "Balanced Perspective",
            "The article presents multiple viewpoints and provides context for the events described.",
        ),
        FactorItem::negative(
            "Loaded Language",
            "The article uses emotionally charged language that may influence reader perception.",
        ),
        FactorItem::neutral(
            "Recent Publication",
            "This article was published within the last 24 hours, so some details may still be developing.",
        ),
    ]
}

#[async_trait]
impl AnalysisService for MockAnalysisService {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        lock(&self.received).push(request.clone());
        let scripted = self.next_scripted(request.payload());

        match scripted {
            Some(ScriptedOutcome { delay, outcome }) => {
                tokio::time::sleep(delay).await;
                outcome
            }
            None => {
                tokio::time::sleep(self.delay).await;
                let score = rand::thread_rng().gen_range(0..MAX_SCORE);
                Ok(Self::sample_result(request, score))
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// --- HTTP service ---

/// Error body returned by the remote service on failure.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    message: String,
}

/// Analysis service reached over HTTP.
///
/// Sends the request as JSON (`{"kind": "url", "payload": "..."}`) and
/// expects an [`AnalysisResult`] body on success.
pub struct HttpAnalysisService {
    client: reqwest::Client,
    endpoint: url::Url,
    api_key: Option<String>,
}

impl HttpAnalysisService {
    pub fn new(endpoint: &str) -> Result<Self, ConfigError> {
        let endpoint = url::Url::parse(endpoint).map_err(|e| ConfigError::Invalid {
            message: format!("service.endpoint '{endpoint}' is not a valid URL: {e}"),
        })?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key: None,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisService {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let mut builder = self.client.post(self.endpoint.clone()).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        debug!(endpoint = %self.endpoint, kind = %request.kind(), "Sending analysis request");
        let response = builder.send().await.map_err(|e| {
            warn!(endpoint = %self.endpoint, error = %e, "Analysis request failed to send");
            AnalysisError::service("transport", e.to_string())
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::service("transport", e.to_string()))?;

        if !status.is_success() {
            let (code, message) = match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => (
                    envelope
                        .error
                        .code
                        .unwrap_or_else(|| format!("http_{}", status.as_u16())),
                    envelope.error.message,
                ),
                Err(_) => (
                    format!("http_{}", status.as_u16()),
                    if body.trim().is_empty() {
                        status.to_string()
                    } else {
                        body
                    },
                ),
            };
            return Err(AnalysisError::service(code, message));
        }

        let result: AnalysisResult = serde_json::from_str(&body).map_err(|e| {
            AnalysisError::service("invalid_response", format!("unreadable analysis result: {e}"))
        })?;
        if result.score > MAX_SCORE {
            return Err(AnalysisError::service(
                "invalid_response",
                format!("score {} is outside 0-{MAX_SCORE}", result.score),
            ));
        }
        Ok(result)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FactorKind;
    use crate::validation::validate;

    fn url_request() -> AnalysisRequest {
        validate("https://news.example.com/story", InputKind::Url).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_returns_sample_result() {
        let service = MockAnalysisService::new();
        let request = url_request();
        let result = service.analyze(&request).await.unwrap();

        assert!(result.score < 100);
        assert_eq!(result.title.as_deref(), Some("Sample Article Title"));
        assert_eq!(
            result.source_url.as_deref(),
            Some("https://news.example.com/story")
        );
        assert_eq!(result.factors.len(), 4);
        assert_eq!(result.factors[2].kind, FactorKind::Negative);
        assert_eq!(service.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_text_request_has_no_source() {
        let service = MockAnalysisService::new().with_delay(Duration::from_millis(5));
        let request = validate(&"word ".repeat(12), InputKind::Text).unwrap();
        let result = service.analyze(&request).await.unwrap();
        assert!(result.source_url.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_waits_for_delay() {
        let service = MockAnalysisService::new().with_delay(Duration::from_millis(2_000));
        let started = tokio::time::Instant::now();
        service.analyze(&url_request()).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(2_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_scripted_outcomes_in_order() {
        let service = MockAnalysisService::new();
        service
            .queue_outcome(Duration::from_millis(1), Ok(AnalysisResult::new(88, Vec::new())))
            .queue_outcome(
                Duration::from_millis(1),
                Err(AnalysisError::service("overloaded", "try again later")),
            );

        let first = service.analyze(&url_request()).await;
        let second = service.analyze(&url_request()).await;
        assert_eq!(first.unwrap().score, 88);
        assert_eq!(
            second.unwrap_err(),
            AnalysisError::service("overloaded", "try again later")
        );
        assert_eq!(service.received().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mock_payload_script_takes_precedence() {
        let service = MockAnalysisService::new();
        service
            .queue_outcome(Duration::from_millis(1), Ok(AnalysisResult::new(1, Vec::new())))
            .queue_outcome_for(
                "https://news.example.com/story",
                Duration::from_millis(1),
                Ok(AnalysisResult::new(99, Vec::new())),
            );

        let keyed = service.analyze(&url_request()).await.unwrap();
        assert_eq!(keyed.score, 99);
        let fallback = service.analyze(&url_request()).await.unwrap();
        assert_eq!(fallback.score, 1);
    }

    #[test]
    fn test_build_service_selects_provider() {
        let mock = build_service(&ServiceConfig::default()).unwrap();
        assert_eq!(mock.name(), "mock");

        let config = ServiceConfig {
            provider: ServiceProvider::Http,
            endpoint: Some("http://127.0.0.1:9/analyze".into()),
            api_key: Some("secret".into()),
            ..ServiceConfig::default()
        };
        let http = build_service(&config).unwrap();
        assert_eq!(http.name(), "http");
    }

    #[test]
    fn test_build_service_http_without_endpoint() {
        let config = ServiceConfig {
            provider: ServiceProvider::Http,
            ..ServiceConfig::default()
        };
        assert!(build_service(&config).is_err());
    }
}
