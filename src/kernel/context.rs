use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::change::Fingerprint;

/// One observation of the environment, produced by the sampler.
/// Created once per tick and discarded after the decision is made; only the
/// frame survives (shared with the generation pipeline).
#[derive(Clone)]
pub struct ContextSample {
    pub fingerprint: Fingerprint,
    /// PNG-encoded frame for the analyzer. Shared, never mutated.
    pub frame: Arc<Vec<u8>>,
    pub captured_at: Instant,
}

impl fmt::Debug for ContextSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextSample")
            .field("fingerprint", &self.fingerprint)
            .field("frame_bytes", &self.frame.len())
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

/// Human-readable classification of what the user is doing, as returned by
/// the content analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSummary {
    /// Stable kebab-case label, e.g. "vscode-coding" or "chrome-docs".
    pub tag: String,
    /// One short sentence.
    pub details: String,
}
