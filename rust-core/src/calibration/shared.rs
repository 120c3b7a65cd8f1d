//! Swap-on-write publication of the calibration baseline
//!
//! Single writer, many readers. A reader gets either the previous complete
//! baseline or the new complete one, never a mix.

use std::sync::{Arc, RwLock};

use super::CalibrationBaseline;

/// Published calibration baseline
#[derive(Clone, Default)]
pub struct SharedBaseline {
    inner: Arc<RwLock<Option<Arc<CalibrationBaseline>>>>,
}

impl SharedBaseline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the published baseline wholesale
    pub fn publish(&self, baseline: CalibrationBaseline) -> Arc<CalibrationBaseline> {
        let baseline = Arc::new(baseline);
        // A poisoned lock still holds a complete value; overwrite it.
        let mut slot = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(Arc::clone(&baseline));
        baseline
    }

    /// Latest complete baseline, if any calibration has finished
    pub fn current(&self) -> Option<Arc<CalibrationBaseline>> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(Arc::clone)
    }

    /// Forget the published baseline
    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
