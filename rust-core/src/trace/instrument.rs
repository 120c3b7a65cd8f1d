//! Exclusive access to the instrument
//!
//! Periodic ticks lock the instrument for a single sweep. Calibration holds
//! the lock across all of its sweeps, so no tick can interleave with it even
//! if the host drives ticks from another thread.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{Trace, TraceSource};
use crate::calibration::{CalibrationBaseline, SharedBaseline};
use crate::error::{AcquisitionError, PipelineError};

/// Shared handle to a trace source
pub struct Instrument<S> {
    source: Arc<Mutex<S>>,
}

impl<S> Clone for Instrument<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<S: TraceSource> Instrument<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(Mutex::new(source)),
        }
    }

    /// Take the exclusive-access token
    ///
    /// Blocks until no other tick or calibration holds the instrument.
    pub fn exclusive(&self) -> Result<InstrumentGuard<'_, S>, AcquisitionError> {
        self.source
            .lock()
            .map(|guard| InstrumentGuard { guard })
            .map_err(|_| AcquisitionError::Instrument("instrument lock poisoned".into()))
    }

    /// Draw a single sweep
    pub fn acquire(&self) -> Result<Trace, AcquisitionError> {
        self.exclusive()?.next_trace()
    }

    /// Run a calibration with the instrument held for its whole duration
    ///
    /// The new baseline is published to `target` only after every sweep has
    /// been drawn; on failure the previously published baseline stays in place.
    pub fn calibrate(
        &self,
        ave_num: usize,
        target: &SharedBaseline,
    ) -> Result<Arc<CalibrationBaseline>, PipelineError> {
        let baseline = {
            let mut token = self.exclusive()?;
            CalibrationBaseline::average(&mut *token, ave_num)?
        };
        Ok(target.publish(baseline))
    }
}

impl<S: TraceSource> TraceSource for Instrument<S> {
    fn next_trace(&mut self) -> Result<Trace, AcquisitionError> {
        self.acquire()
    }
}

/// Exclusive-access token; the instrument is released when dropped
pub struct InstrumentGuard<'a, S> {
    guard: MutexGuard<'a, S>,
}

impl<S> Deref for InstrumentGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.guard
    }
}

impl<S> DerefMut for InstrumentGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.guard
    }
}

impl<S: TraceSource> TraceSource for InstrumentGuard<'_, S> {
    fn next_trace(&mut self) -> Result<Trace, AcquisitionError> {
        self.guard.next_trace()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{FrequencyPlan, SyntheticSweep};

    #[test]
    fn test_calibrate_publishes_baseline() {
        let instrument = Instrument::new(SyntheticSweep::new(FrequencyPlan::default(), -12.0));
        let shared = SharedBaseline::new();
        assert!(shared.current().is_none());

        let published = instrument.calibrate(4, &shared).unwrap();
        let current = shared.current().unwrap();
        assert!(Arc::ptr_eq(&published, &current));
        assert!(current.average_magnitudes().iter().all(|&m| (m + 12.0).abs() < 1e-12));
    }

    #[test]
    fn test_failed_calibration_keeps_previous_baseline() {
        let instrument = Instrument::new(SyntheticSweep::new(FrequencyPlan::default(), -12.0));
        let shared = SharedBaseline::new();
        let first = instrument.calibrate(2, &shared).unwrap();

        assert!(instrument.calibrate(1, &shared).is_err());
        assert!(Arc::ptr_eq(&first, &shared.current().unwrap()));
    }

    #[test]
    fn test_clones_share_source() {
        let instrument = Instrument::new(SyntheticSweep::new(FrequencyPlan::default(), 0.0));
        let mut other = instrument.clone();
        assert_eq!(other.next_trace().unwrap().len(), 101);
        assert_eq!(instrument.acquire().unwrap().len(), 101);
    }
}
