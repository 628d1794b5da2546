use serde::Serialize;
use tokio::time::Instant;

use super::change::ChangeEvent;
use super::context::ContextSummary;
use super::ratelimit::RateLimiter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Continue,
    SwitchWithFade,
}

/// Outcome of one evaluation tick, carried to the UI for display.
/// The context fields are the last analyzed descriptions known at decision
/// time; analysis of the sample that triggered a switch lands later.
#[derive(Debug, Clone, Serialize)]
pub struct ContextDecision {
    pub action: Action,
    pub distance: f64,
    pub current_context: Option<ContextSummary>,
    pub previous_context: Option<ContextSummary>,
    #[serde(skip)]
    pub at: Instant,
}

/// Combines change classification with the cooldown gate. Holds no state of
/// its own beyond the delegated RateLimiter; re-entrant across ticks.
#[derive(Debug, Default)]
pub struct DecisionEngine {
    limiter: RateLimiter,
}

impl DecisionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exactly two terminal outcomes per tick. A change suppressed by the
    /// cooldown is NOT queued for later; the next tick re-evaluates
    /// independently. Records the switch on acceptance, exactly once.
    pub fn evaluate(&mut self, change: &ChangeEvent, now: Instant) -> Action {
        if !change.exceeds_threshold {
            return Action::Continue;
        }
        if !self.limiter.allow(now) {
            return Action::Continue;
        }
        self.limiter.record_switch(now);
        Action::SwitchWithFade
    }
}
