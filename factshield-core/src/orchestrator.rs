//! Analysis orchestrator: drives one authoritative analysis request at a time.
//!
//! The orchestrator owns the [`RequestState`] machine:
//!
//! ```text
//! Idle ──submit──▶ Pending(n) ──resolve(n)──▶ Succeeded
//!                    │  ▲         └─reject(n)/timeout──▶ Failed
//!                    └──┘ submit: Pending(n+1), n is superseded
//! Succeeded/Failed ──submit──▶ Pending(m)
//! any ──reset──▶ Idle
//! ```
//!
//! Every issued request gets a fresh, increasing [`RequestId`]. A response
//! is applied only while the machine is still `Pending` on that same id;
//! anything else is a superseded response and is dropped. Superseded calls
//! are also cancelled cooperatively through a `CancellationToken`.

use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::FactShieldConfig;
use crate::error::{AnalysisError, Result, ValidationError};
use crate::score::{ScoreDisplay, as_millis_u64};
use crate::service::{AnalysisService, build_service};
use crate::sync::lock;
use crate::types::{AnalysisRequest, AnalysisResult, InputKind, RequestId, RequestState};
use crate::validation::validate;

/// Tunables for an [`AnalysisOrchestrator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorOptions {
    /// Bound on a single analysis call; `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Animate the display score.
    pub animated: bool,
    /// Delay between display score animation steps.
    pub tick_interval: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            animated: true,
            tick_interval: ScoreDisplay::DEFAULT_CADENCE,
        }
    }
}

impl OrchestratorOptions {
    pub fn from_config(config: &FactShieldConfig) -> Self {
        Self {
            timeout: config.analysis.timeout(),
            animated: config.display.animated,
            tick_interval: Duration::from_millis(config.display.tick_interval_ms),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_animation(mut self) -> Self {
        self.animated = false;
        self
    }
}

struct Subscriber {
    id: u64,
    tx: mpsc::UnboundedSender<RequestState>,
}

struct Machine {
    state: RequestState,
    last_issued: RequestId,
    in_flight: Option<CancellationToken>,
    subscribers: Vec<Subscriber>,
    next_subscriber: u64,
}

impl Machine {
    fn new() -> Self {
        Self {
            state: RequestState::Idle,
            last_issued: RequestId(0),
            in_flight: None,
            subscribers: Vec::new(),
            next_subscriber: 0,
        }
    }

    /// Move to `next` and notify every live subscriber, in transition order.
    fn transition(&mut self, next: RequestState) {
        debug!(
            from = %self.state.status(),
            to = %next.status(),
            "Request state transition"
        );
        self.state = next;
        let state = &self.state;
        self.subscribers
            .retain(|subscriber| subscriber.tx.send(state.clone()).is_ok());
    }

    fn cancel_in_flight(&mut self) {
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
    }
}

struct Shared {
    service: Arc<dyn AnalysisService>,
    timeout: Option<Duration>,
    machine: Mutex<Machine>,
    display: ScoreDisplay,
}

impl Shared {
    /// Apply the outcome of request `id`, unless it has been superseded.
    fn settle(&self, id: RequestId, outcome: std::result::Result<AnalysisResult, AnalysisError>) {
        let mut machine = lock(&self.machine);
        if machine.state != RequestState::Pending(id) {
            debug!(
                stale = %id,
                current = %machine.last_issued,
                "Discarding superseded analysis response"
            );
            return;
        }
        machine.in_flight = None;

        match outcome {
            Ok(result) => {
                info!(
                    request = %id,
                    score = result.score,
                    factors = result.factors.len(),
                    "Analysis completed"
                );
                self.display.animate_to(result.score);
                machine.transition(RequestState::Succeeded(Arc::new(result)));
            }
            Err(err) => {
                warn!(request = %id, kind = %err.kind(), error = %err, "Analysis failed");
                machine.transition(RequestState::Failed(err));
            }
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        lock(&self.machine).cancel_in_flight();
    }
}

/// Coordinates submissions to an [`AnalysisService`] and publishes the
/// resulting [`RequestState`] transitions.
///
/// Cloning yields another handle to the same orchestrator. When the last
/// handle is dropped, any in-flight call is cancelled and the score
/// animation stops.
#[derive(Clone)]
pub struct AnalysisOrchestrator {
    shared: Arc<Shared>,
}

impl AnalysisOrchestrator {
    pub fn new(service: Arc<dyn AnalysisService>, options: OrchestratorOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                service,
                timeout: options.timeout,
                machine: Mutex::new(Machine::new()),
                display: ScoreDisplay::new(options.animated, options.tick_interval),
            }),
        }
    }

    /// Build an orchestrator talking to the service `config` selects.
    pub fn from_config(config: &FactShieldConfig) -> Result<Self> {
        config.validate()?;
        let service = build_service(&config.service)?;
        Ok(Self::new(service, OrchestratorOptions::from_config(config)))
    }

    /// Validate `raw` and, when valid, start analyzing it.
    ///
    /// Validation failures are returned directly and leave the state as it
    /// was. On success the previous request, if still pending, is superseded.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn submit(
        &self,
        raw: &str,
        kind: InputKind,
    ) -> std::result::Result<RequestId, ValidationError> {
        let request = validate(raw, kind).inspect_err(|err| {
            debug!(kind = %kind, error = %err, "Rejected submission");
        })?;
        Ok(self.submit_request(request))
    }

    /// Start analyzing an already validated request.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn submit_request(&self, request: AnalysisRequest) -> RequestId {
        let cancel = CancellationToken::new();
        let id = {
            let mut machine = lock(&self.shared.machine);
            machine.cancel_in_flight();
            let id = machine.last_issued.next();
            machine.last_issued = id;
            machine.in_flight = Some(cancel.clone());
            self.shared.display.clear();
            machine.transition(RequestState::Pending(id));
            id
        };

        info!(
            request = %id,
            kind = %request.kind(),
            service = self.shared.service.name(),
            "Submitting analysis request"
        );

        let service = Arc::clone(&self.shared.service);
        let timeout = self.shared.timeout;
        let shared = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(request = %id, "Analysis call cancelled");
                    return;
                }
                outcome = call_service(service.as_ref(), &request, timeout) => outcome,
            };
            if let Some(shared) = Weak::upgrade(&shared) {
                shared.settle(id, outcome);
            }
        });

        id
    }

    /// Return to `Idle`, discarding any result and any pending request.
    pub fn reset(&self) {
        let mut machine = lock(&self.shared.machine);
        machine.cancel_in_flight();
        self.shared.display.clear();
        if machine.state != RequestState::Idle {
            machine.transition(RequestState::Idle);
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> RequestState {
        lock(&self.shared.machine).state.clone()
    }

    /// Whether a request is awaiting its response.
    pub fn is_pending(&self) -> bool {
        lock(&self.shared.machine).state.is_pending()
    }

    /// Identifier of the most recently issued request, if any.
    pub fn last_request_id(&self) -> Option<RequestId> {
        let id = lock(&self.shared.machine).last_issued;
        (id.0 > 0).then_some(id)
    }

    /// The animated score currently shown to the user.
    pub fn current_display_score(&self) -> u8 {
        self.shared.display.current()
    }

    pub fn display(&self) -> &ScoreDisplay {
        &self.shared.display
    }

    /// Receive every subsequent state transition, in order.
    pub fn subscribe(&self) -> StateSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut machine = lock(&self.shared.machine);
        let id = machine.next_subscriber;
        machine.next_subscriber += 1;
        machine.subscribers.push(Subscriber { id, tx });
        StateSubscription {
            id,
            rx,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Call `listener` for every subsequent state transition.
    ///
    /// The listener runs on its own task, so it may call back into the
    /// orchestrator. Dropping the returned handle unsubscribes.
    pub fn subscribe_fn<F>(&self, mut listener: F) -> ListenerHandle
    where
        F: FnMut(RequestState) + Send + 'static,
    {
        let mut subscription = self.subscribe();
        let task = tokio::spawn(async move {
            while let Some(state) = subscription.recv().await {
                listener(state);
            }
        });
        ListenerHandle { task }
    }
}

impl std::fmt::Debug for AnalysisOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let machine = lock(&self.shared.machine);
        f.debug_struct("AnalysisOrchestrator")
            .field("service", &self.shared.service.name())
            .field("state", &machine.state.status())
            .field("last_issued", &machine.last_issued)
            .field("subscribers", &machine.subscribers.len())
            .finish()
    }
}

async fn call_service(
    service: &dyn AnalysisService,
    request: &AnalysisRequest,
    timeout: Option<Duration>,
) -> std::result::Result<AnalysisResult, AnalysisError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, service.analyze(request))
            .await
            .unwrap_or_else(|_| {
                Err(AnalysisError::Timeout {
                    timeout_ms: as_millis_u64(limit),
                })
            }),
        None => service.analyze(request).await,
    }
}

/// Ordered stream of state transitions from one orchestrator.
///
/// Dropping the subscription unsubscribes it.
pub struct StateSubscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<RequestState>,
    shared: Weak<Shared>,
}

impl StateSubscription {
    /// Wait for the next transition. Returns `None` once the orchestrator
    /// is gone.
    pub async fn recv(&mut self) -> Option<RequestState> {
        self.rx.recv().await
    }

    /// Take the next transition if one is already queued.
    pub fn try_recv(&mut self) -> Option<RequestState> {
        self.rx.try_recv().ok()
    }

    /// Wait until the machine reaches `Succeeded` or `Failed`.
    pub async fn settled(&mut self) -> Option<RequestState> {
        while let Some(state) = self.recv().await {
            if state.is_settled() {
                return Some(state);
            }
        }
        None
    }

    pub fn unsubscribe(self) {}
}

impl Drop for StateSubscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            lock(&shared.machine)
                .subscribers
                .retain(|subscriber| subscriber.id != self.id);
        }
    }
}

/// Handle for a callback registered with
/// [`AnalysisOrchestrator::subscribe_fn`].
#[must_use = "dropping the handle unsubscribes the listener"]
pub struct ListenerHandle {
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn unsubscribe(self) {}
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::MockAnalysisService;
    use crate::types::{FactorItem, RequestStatus};

    const ARTICLE: &str = "The city council voted on Tuesday to approve the new transit budget plan.";

    fn orchestrator(mock: &Arc<MockAnalysisService>) -> AnalysisOrchestrator {
        AnalysisOrchestrator::new(mock.clone(), OrchestratorOptions::default())
    }

    fn result(score: u8) -> AnalysisResult {
        AnalysisResult::new(score, vec![FactorItem::positive("Named sources", "Quotes officials.")])
    }

    #[tokio::test(start_paused = true)]
    async fn test_from_config_uses_configured_service() {
        let mut config = FactShieldConfig::default();
        config.service.mock_delay_ms = 5;
        config.display.animated = false;
        let orch = AnalysisOrchestrator::from_config(&config).unwrap();
        let mut sub = orch.subscribe();

        orch.submit("https://example.com/story", InputKind::Url).unwrap();
        let settled = sub.settled().await.unwrap();
        let result = settled.result().unwrap();
        assert_eq!(result.title.as_deref(), Some("Sample Article Title"));
        assert_eq!(orch.current_display_score(), result.score);
    }

    #[test]
    fn test_from_config_rejects_invalid_config() {
        let mut config = FactShieldConfig::default();
        config.display.tick_interval_ms = 0;
        assert!(AnalysisOrchestrator::from_config(&config).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_state_is_idle() {
        let mock = Arc::new(MockAnalysisService::new());
        let orch = orchestrator(&mock);
        assert_eq!(orch.state(), RequestState::Idle);
        assert_eq!(orch.last_request_id(), None);
        assert_eq!(orch.current_display_score(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_submission_keeps_state() {
        let mock = Arc::new(MockAnalysisService::new());
        let orch = orchestrator(&mock);
        let mut sub = orch.subscribe();

        let err = orch.submit("not a url", InputKind::Url).unwrap_err();
        assert!(matches!(err, ValidationError::MalformedUrl { .. }));
        assert_eq!(orch.state(), RequestState::Idle);
        assert!(sub.try_recv().is_none());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_then_success() {
        let mock = Arc::new(MockAnalysisService::new());
        mock.queue_outcome(Duration::from_millis(100), Ok(result(82)));
        let orch = orchestrator(&mock);
        let mut sub = orch.subscribe();

        let id = orch.submit(ARTICLE, InputKind::Text).unwrap();
        assert_eq!(id, RequestId(1));
        assert_eq!(sub.recv().await, Some(RequestState::Pending(id)));

        let settled = sub.settled().await.unwrap();
        assert_eq!(settled.result().map(|r| r.score), Some(82));
        assert_eq!(orch.state().status(), RequestStatus::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_error_fails() {
        let mock = Arc::new(MockAnalysisService::new());
        mock.queue_outcome(
            Duration::from_millis(10),
            Err(AnalysisError::service("unavailable", "backend is down")),
        );
        let orch = orchestrator(&mock);
        let mut sub = orch.subscribe();

        orch.submit("https://example.com/a", InputKind::Url).unwrap();
        let settled = sub.settled().await.unwrap();
        assert_eq!(
            settled,
            RequestState::Failed(AnalysisError::service("unavailable", "backend is down"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_with_timeout_error() {
        let mock = Arc::new(MockAnalysisService::new().with_delay(Duration::from_secs(60)));
        let orch = AnalysisOrchestrator::new(
            mock.clone(),
            OrchestratorOptions::default().with_timeout(Duration::from_millis(1_500)),
        );
        let mut sub = orch.subscribe();

        orch.submit("https://example.com/slow", InputKind::Url).unwrap();
        let settled = sub.settled().await.unwrap();
        assert_eq!(
            settled,
            RequestState::Failed(AnalysisError::Timeout { timeout_ms: 1_500 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_response_is_discarded() {
        let mock = Arc::new(MockAnalysisService::new());
        mock.queue_outcome_for("https://example.com/a", Duration::from_millis(500), Ok(result(10)))
            .queue_outcome_for("https://example.com/b", Duration::from_millis(50), Ok(result(90)));
        let orch = orchestrator(&mock);
        let mut sub = orch.subscribe();

        let first = orch.submit("https://example.com/a", InputKind::Url).unwrap();
        let second = orch.submit("https://example.com/b", InputKind::Url).unwrap();
        assert!(second > first);

        assert_eq!(sub.recv().await, Some(RequestState::Pending(first)));
        assert_eq!(sub.recv().await, Some(RequestState::Pending(second)));
        let settled = sub.recv().await.unwrap();
        assert_eq!(settled.result().map(|r| r.score), Some(90));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(sub.try_recv().is_none());
        assert_eq!(orch.state().result().map(|r| r.score), Some(90));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_settle_does_not_touch_state() {
        let mock = Arc::new(MockAnalysisService::new().with_delay(Duration::from_secs(30)));
        let orch = orchestrator(&mock);
        let mut sub = orch.subscribe();

        let first = orch.submit("https://example.com/a", InputKind::Url).unwrap();
        let second = orch.submit("https://example.com/b", InputKind::Url).unwrap();
        sub.recv().await;
        sub.recv().await;

        orch.shared.settle(first, Ok(result(12)));
        assert_eq!(orch.state(), RequestState::Pending(second));
        assert!(sub.try_recv().is_none());

        orch.shared.settle(second, Ok(result(77)));
        assert_eq!(orch.state().result().map(|r| r.score), Some(77));

        // a late answer for the superseded id cannot overwrite the result
        orch.shared.settle(first, Err(AnalysisError::service("late", "too late")));
        assert_eq!(orch.state().result().map(|r| r.score), Some(77));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_returns_to_idle() {
        let mock = Arc::new(MockAnalysisService::new());
        mock.queue_outcome(Duration::from_millis(10), Ok(result(70)));
        let orch = AnalysisOrchestrator::new(
            mock.clone(),
            OrchestratorOptions::default().without_animation(),
        );
        let mut sub = orch.subscribe();

        orch.submit(ARTICLE, InputKind::Text).unwrap();
        sub.settled().await.unwrap();
        assert_eq!(orch.current_display_score(), 70);

        orch.reset();
        assert_eq!(orch.state(), RequestState::Idle);
        assert_eq!(sub.recv().await, Some(RequestState::Idle));
        assert_eq!(orch.current_display_score(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_while_pending_discards_response() {
        let mock = Arc::new(MockAnalysisService::new());
        mock.queue_outcome(Duration::from_millis(200), Ok(result(55)));
        let orch = orchestrator(&mock);

        orch.submit(ARTICLE, InputKind::Text).unwrap();
        orch.reset();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(orch.state(), RequestState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_when_idle_is_silent() {
        let mock = Arc::new(MockAnalysisService::new());
        let orch = orchestrator(&mock);
        let mut sub = orch.subscribe();
        orch.reset();
        assert!(sub.try_recv().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubmit_after_failure_goes_straight_to_pending() {
        let mock = Arc::new(MockAnalysisService::new());
        mock.queue_outcome(
            Duration::from_millis(10),
            Err(AnalysisError::service("bad_gateway", "upstream error")),
        )
        .queue_outcome(Duration::from_millis(10), Ok(result(64)));
        let orch = orchestrator(&mock);
        let mut sub = orch.subscribe();

        orch.submit(ARTICLE, InputKind::Text).unwrap();
        assert!(matches!(sub.settled().await, Some(RequestState::Failed(_))));

        let retry = orch.submit(ARTICLE, InputKind::Text).unwrap();
        assert_eq!(retry, RequestId(2));
        assert_eq!(sub.recv().await, Some(RequestState::Pending(retry)));
        assert!(matches!(sub.settled().await, Some(RequestState::Succeeded(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_orchestrator_stops_score_ticker() {
        let mock = Arc::new(MockAnalysisService::new());
        mock.queue_outcome(Duration::from_millis(10), Ok(result(95)));
        let orch = orchestrator(&mock);
        let mut sub = orch.subscribe();

        orch.submit(ARTICLE, InputKind::Text).unwrap();
        sub.settled().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(orch.display().is_ticking());
        assert!(orch.current_display_score() < 95);

        // the ticker task is the only other owner of the animator
        let animator = orch.shared.display.animator_handle();
        assert_eq!(animator.strong_count(), 2);

        drop(orch);
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(animator.strong_count(), 0);
        assert_eq!(sub.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_subscription_is_removed() {
        let mock = Arc::new(MockAnalysisService::new());
        let orch = orchestrator(&mock);
        let sub = orch.subscribe();
        let _other = orch.subscribe();
        assert_eq!(lock(&orch.shared.machine).subscribers.len(), 2);
        sub.unsubscribe();
        assert_eq!(lock(&orch.shared.machine).subscribers.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_fn_receives_transitions() {
        let mock = Arc::new(MockAnalysisService::new());
        mock.queue_outcome(Duration::from_millis(10), Ok(result(33)));
        let orch = orchestrator(&mock);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = orch.subscribe_fn(move |state| lock(&sink).push(state.status()));

        orch.submit(ARTICLE, InputKind::Text).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            *lock(&seen),
            vec![RequestStatus::Analyzing, RequestStatus::Success]
        );

        handle.unsubscribe();
        orch.reset();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(lock(&seen).len(), 2);
    }
}
