use serde::{Deserialize, Serialize};

/// Normalized distance at or above which a context change is significant.
/// Tunable constant, not derived from data.
pub const CHANGE_THRESHOLD: f64 = 0.10;

/// Bits in a fingerprint. The sampler produces an 8x8 gradient hash.
pub const FINGERPRINT_BITS: u32 = 64;

/// Compact perceptual summary of one captured frame.
/// Comparable only against fingerprints from the same hasher configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    /// Hamming distance normalized to [0.0, 1.0]. Symmetric.
    pub fn distance(&self, other: &Fingerprint) -> f64 {
        (self.0 ^ other.0).count_ones() as f64 / FINGERPRINT_BITS as f64
    }
}

/// Outcome of comparing two consecutive fingerprints.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeEvent {
    pub distance: f64,
    pub exceeds_threshold: bool,
}

/// Pure classifier over consecutive fingerprints. No state, no side effects.
pub struct ChangeDetector;

impl ChangeDetector {
    /// `prev` is absent on the first sample: that sample establishes the
    /// baseline and is never significant.
    pub fn classify(prev: Option<&Fingerprint>, curr: &Fingerprint) -> ChangeEvent {
        let distance = match prev {
            Some(p) => p.distance(curr),
            None => 0.0,
        };
        ChangeEvent {
            distance,
            exceeds_threshold: distance >= CHANGE_THRESHOLD,
        }
    }
}
