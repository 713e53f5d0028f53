//! Randomized inter-post delays.
//!
//! Each call draws uniformly from the window and then applies an
//! independent multiplicative jitter, so consecutive delays never settle
//! into a detectable rhythm.

use std::time::Duration;

use rand::Rng;
use threadcast_types::run::DelayWindow;

/// Default jitter: ±10% of the drawn base delay.
pub const DEFAULT_JITTER: f64 = 0.10;

/// Produces the wait before each submission.
pub trait DelayGenerator: Send + Sync {
    fn generate(&self, window: DelayWindow) -> Duration;
}

/// `uniform(min, max) ± jitter`, floored to whole milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct JitteredDelay {
    jitter: f64,
}

impl JitteredDelay {
    pub fn new(jitter: f64) -> Self {
        Self {
            jitter: jitter.clamp(0.0, 1.0),
        }
    }
}

impl Default for JitteredDelay {
    fn default() -> Self {
        Self::new(DEFAULT_JITTER)
    }
}

impl DelayGenerator for JitteredDelay {
    fn generate(&self, window: DelayWindow) -> Duration {
        let (low, high) = if window.is_valid() {
            (window.min_ms, window.max_ms)
        } else {
            (window.max_ms, window.min_ms)
        };

        let mut rng = rand::rng();
        let base = rng.random_range(low..=high) as f64;
        let factor = rng.random_range(-self.jitter..=self.jitter);
        let millis = (base + base * factor).floor().max(0.0);
        Duration::from_millis(millis as u64)
    }
}
