//! Live pipeline controls shared between the loop and the presenter.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Default edge-detection threshold.
pub const DEFAULT_THRESHOLD: u8 = 100;

/// Shared edge-detection threshold, range 0..=255 (encoded by the type).
///
/// The presenter's slider writes it, the pipeline reads it exactly once per
/// iteration. A single atomic scalar is all the synchronization required:
/// there is no compound state to tear.
#[derive(Clone)]
pub struct ThresholdControl {
    value: Arc<AtomicU8>,
}

impl ThresholdControl {
    pub fn new(initial: u8) -> Self {
        Self {
            value: Arc::new(AtomicU8::new(initial)),
        }
    }

    pub fn get(&self) -> u8 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn set(&self, value: u8) {
        self.value.store(value, Ordering::Relaxed);
    }
}

impl Default for ThresholdControl {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_threshold_is_100() {
        assert_eq!(ThresholdControl::default().get(), DEFAULT_THRESHOLD);
        assert_eq!(DEFAULT_THRESHOLD, 100);
    }

    #[test]
    fn handles_share_one_value() {
        let control = ThresholdControl::default();
        let slider = control.clone();

        slider.set(42);
        assert_eq!(control.get(), 42);
    }
}
