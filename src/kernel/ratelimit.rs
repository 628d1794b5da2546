use tokio::time::{Duration, Instant};

/// Minimum elapsed time between two accepted switch decisions.
pub const COOLDOWN: Duration = Duration::from_secs(3);

/// Cooldown gate for context-driven switches. The clock value is injected by
/// the caller so the gate stays a pure function of its inputs.
#[derive(Debug, Default)]
pub struct RateLimiter {
    last_switch: Option<Instant>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff no switch has been recorded inside the cooldown window.
    pub fn allow(&self, now: Instant) -> bool {
        match self.last_switch {
            Some(at) => now.duration_since(at) >= COOLDOWN,
            None => true,
        }
    }

    /// Call exactly once per accepted switch decision, not per evaluation.
    pub fn record_switch(&mut self, now: Instant) {
        self.last_switch = Some(now);
    }
}
