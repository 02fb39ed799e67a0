//! Score presentation: categorization and the animated display value.
//!
//! [`categorize`] maps a credibility score onto one of five reliability
//! bands. [`next_tick`] is the pure step function that moves a displayed
//! value towards its target, and [`ScoreDisplay`] drives that function from
//! a periodic tokio timer for as long as the value is still moving.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::config::DisplayConfig;
use crate::sync::lock;
use crate::types::MAX_SCORE;

/// Divisor applied to the remaining distance on every animation step.
const STEP_DIVISOR: u16 = 20;

/// Upper bound on the number of [`next_tick`] calls needed to reach any
/// target from any start within `0..=100`.
pub const MAX_TICKS_TO_SETTLE: usize = 45;

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub(crate) fn as_millis_u64(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Reliability band of a credibility score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreCategory {
    VeryReliable,
    MostlyReliable,
    SomewhatReliable,
    PotentiallyMisleading,
    LikelyFalse,
}

impl ScoreCategory {
    /// Bands ordered from the highest lower bound to the lowest.
    const BANDS: [(u8, ScoreCategory); 4] = [
        (80, ScoreCategory::VeryReliable),
        (60, ScoreCategory::MostlyReliable),
        (40, ScoreCategory::SomewhatReliable),
        (20, ScoreCategory::PotentiallyMisleading),
    ];

    /// Classify a score. The first band whose inclusive lower bound the
    /// score reaches wins.
    pub fn from_score(score: u8) -> Self {
        Self::BANDS
            .iter()
            .find(|(floor, _)| score >= *floor)
            .map(|(_, category)| *category)
            .unwrap_or(ScoreCategory::LikelyFalse)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScoreCategory::VeryReliable => "Very Reliable",
            ScoreCategory::MostlyReliable => "Mostly Reliable",
            ScoreCategory::SomewhatReliable => "Somewhat Reliable",
            ScoreCategory::PotentiallyMisleading => "Potentially Misleading",
            ScoreCategory::LikelyFalse => "Likely False",
        }
    }

    /// Text and background classes for the score badge.
    pub fn color_class(&self) -> &'static str {
        match self {
            ScoreCategory::VeryReliable => "text-green-500 bg-green-50",
            ScoreCategory::MostlyReliable => "text-green-400 bg-green-50",
            ScoreCategory::SomewhatReliable => "text-yellow-500 bg-yellow-50",
            ScoreCategory::PotentiallyMisleading => "text-orange-500 bg-orange-50",
            ScoreCategory::LikelyFalse => "text-red-500 bg-red-50",
        }
    }

    /// The text color alone, used for the label under the badge.
    pub fn text_color(&self) -> &'static str {
        self.color_class()
            .split_whitespace()
            .next()
            .unwrap_or_default()
    }
}

impl std::fmt::Display for ScoreCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Label and color derived from a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Categorization {
    pub category: ScoreCategory,
    pub label: &'static str,
    pub color_class: &'static str,
}

/// Derive the display label and color class for a score.
pub fn categorize(score: u8) -> Categorization {
    let category = ScoreCategory::from_score(score);
    Categorization {
        category,
        label: category.label(),
        color_class: category.color_class(),
    }
}

/// Advance a displayed value one step towards `target`.
///
/// The step is `max(1, ceil(|target - current| / 20))`, so far-away values
/// move quickly at first and the last stretch is walked one point at a time.
/// The result never passes `target`.
pub fn next_tick(current: u8, target: u8) -> u8 {
    let distance = u16::from(current.abs_diff(target));
    if distance == 0 {
        return current;
    }
    // distance <= 255, so the step always fits back into a u8
    let step = distance.div_ceil(STEP_DIVISOR).max(1) as u8;
    if target > current {
        current.saturating_add(step).min(target)
    } else {
        current.saturating_sub(step).max(target)
    }
}

/// Displayed score converging on a target, one [`next_tick`] at a time.
///
/// With animation disabled the value jumps straight to the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreAnimator {
    current: u8,
    target: u8,
    animated: bool,
}

impl ScoreAnimator {
    pub fn new(animated: bool) -> Self {
        Self {
            current: 0,
            target: 0,
            animated,
        }
    }

    pub fn current(&self) -> u8 {
        self.current
    }

    pub fn target(&self) -> u8 {
        self.target
    }

    pub fn is_animated(&self) -> bool {
        self.animated
    }

    pub fn is_settled(&self) -> bool {
        self.current == self.target
    }

    /// Point the animation at a new target, clamped to `0..=100`.
    pub fn set_target(&mut self, target: u8) {
        self.target = target.min(MAX_SCORE);
        if !self.animated {
            self.current = self.target;
        }
    }

    /// Place the value at `value` immediately, without animating.
    pub fn snap_to(&mut self, value: u8) {
        self.target = value.min(MAX_SCORE);
        self.current = self.target;
    }

    /// Apply one animation step and return the new displayed value.
    pub fn tick(&mut self) -> u8 {
        self.current = if self.animated {
            next_tick(self.current, self.target)
        } else {
            self.target
        };
        self.current
    }
}

/// Presentation context owning a [`ScoreAnimator`] and the timer driving it.
///
/// The ticker task is started on demand, exits once the value settles, and
/// is aborted when the display is cleared or dropped. The network call never
/// waits on it.
pub struct ScoreDisplay {
    animator: Arc<Mutex<ScoreAnimator>>,
    cadence: Duration,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl ScoreDisplay {
    /// Reference cadence between animation steps.
    pub const DEFAULT_CADENCE: Duration = Duration::from_millis(20);

    pub fn new(animated: bool, cadence: Duration) -> Self {
        Self {
            animator: Arc::new(Mutex::new(ScoreAnimator::new(animated))),
            cadence: cadence.max(Duration::from_millis(1)),
            ticker: Mutex::new(None),
        }
    }

    pub fn from_config(config: &DisplayConfig) -> Self {
        Self::new(
            config.animated,
            Duration::from_millis(config.tick_interval_ms),
        )
    }

    /// Current animated value.
    pub fn current(&self) -> u8 {
        lock(&self.animator).current()
    }

    pub fn target(&self) -> u8 {
        lock(&self.animator).target()
    }

    pub fn is_settled(&self) -> bool {
        lock(&self.animator).is_settled()
    }

    /// Whether a ticker task is currently running.
    pub fn is_ticking(&self) -> bool {
        lock(&self.ticker)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Start animating towards `target`.
    ///
    /// Outside a tokio runtime there is no timer to drive the animation, so
    /// the value jumps to the target.
    pub fn animate_to(&self, target: u8) {
        let needs_ticker = {
            let mut animator = lock(&self.animator);
            animator.set_target(target);
            animator.is_animated() && !animator.is_settled()
        };
        if !needs_ticker {
            self.stop();
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!(target, "No runtime available, skipping score animation");
            self.stop();
            lock(&self.animator).snap_to(target);
            return;
        };

        // A running ticker may already have seen the old target settle and be
        // about to exit, so it is always replaced.
        let animator = Arc::clone(&self.animator);
        let cadence = self.cadence;
        debug!(target, cadence_ms = as_millis_u64(cadence), "Starting score ticker");
        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval(cadence);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of an interval completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                let mut state = lock(&animator);
                state.tick();
                if state.is_settled() {
                    debug!(value = state.current(), "Score ticker settled");
                    break;
                }
            }
        });
        if let Some(previous) = lock(&self.ticker).replace(handle) {
            previous.abort();
        }
    }

    #[cfg(test)]
    pub(crate) fn animator_handle(&self) -> std::sync::Weak<Mutex<ScoreAnimator>> {
        Arc::downgrade(&self.animator)
    }

    /// Remove the displayed score: stop animating and show zero.
    pub fn clear(&self) {
        self.stop();
        lock(&self.animator).snap_to(0);
    }

    /// Stop the ticker, leaving the value wherever it currently is.
    pub fn stop(&self) {
        if let Some(handle) = lock(&self.ticker).take() {
            handle.abort();
        }
    }
}

impl Default for ScoreDisplay {
    fn default() -> Self {
        Self::new(true, Self::DEFAULT_CADENCE)
    }
}

impl Drop for ScoreDisplay {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ScoreDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let animator = lock(&self.animator).clone();
        f.debug_struct("ScoreDisplay")
            .field("animator", &animator)
            .field("cadence", &self.cadence)
            .field("ticking", &self.is_ticking())
            .finish()
    }
}
