//! # Force Feedback Module
//!
//! Bridges rumble effects from the input layer to the controller.
//!
//! This module handles:
//! - Translating rumble magnitudes into status report bytes
//! - Deferring the blocking SET_REPORT to a per-session dispatch worker
//! - Coalescing bursts of effect updates into a single hardware write

pub mod dispatch;
pub mod translator;

pub use dispatch::{DispatchHandle, DispatchQueue, DispatchStats};
pub use translator::{scale_magnitude, EffectTranslator};

/// Dual-motor rumble request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RumbleEffect {
    /// Intensity of the weak (high frequency) motor
    pub weak_magnitude: u16,
    /// Intensity of the strong (low frequency) motor
    pub strong_magnitude: u16,
}

impl RumbleEffect {
    /// Create a rumble effect from both motor magnitudes
    pub fn new(weak_magnitude: u16, strong_magnitude: u16) -> Self {
        Self {
            weak_magnitude,
            strong_magnitude,
        }
    }

    /// Both motors off
    pub fn stop() -> Self {
        Self::default()
    }
}

/// Effect-update callback installed into the input layer
///
/// Implementations run on the caller's context, which may not block or
/// sleep. `play` therefore has no error path: it queues work and returns.
pub trait RumbleHandler: Send + Sync {
    /// Apply a rumble effect
    fn play(&self, effect: RumbleEffect);
}
