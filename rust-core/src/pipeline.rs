//! Per-tick analysis pipeline
//!
//! One tick: acquire a sweep, detect peaks, select the lowest-frequency peak
//! (or the sentinel), quantize it for demo mode and record it in the
//! timeline. A tick either completes or fails before touching any state.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::calibration::{CalibrationBaseline, SharedBaseline};
use crate::config::PipelineConfig;
use crate::demo::DemoQuantizer;
use crate::detection::{Detection, PeakDetector};
use crate::error::PipelineError;
use crate::timeline::{TimelineBuffer, TimelineSnapshot};
use crate::trace::{sweep_rate, Trace, TraceQueue, TraceSource};

/// Full per-frame record for renderers and recorders
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FramePayload {
    pub frequencies: Vec<f64>,
    pub raw_magnitudes: Vec<f64>,
    /// Polynomial fit over the detection window
    pub baseline_fit: Vec<f64>,
    pub raw_diff: Vec<f64>,
    pub filtered_diff: Vec<f64>,
    /// Peak positions relative to `window_indices`
    pub peaks: Vec<usize>,
    /// Sweeps per second
    pub sampling_rate: f64,
    /// Grid indices covered by the detection window
    pub window_indices: Vec<usize>,
    pub threshold: f64,
}

/// One detected peak, as shown in the peak log
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PeakReport {
    /// Grid index of the peak
    pub index: usize,
    /// Frequency in MHz
    pub frequency: f64,
    /// Raw difference above the fit, dB
    pub diff_db: f64,
}

impl FramePayload {
    fn new(trace: &Trace, detection: Detection, sampling_rate: f64, threshold: f64) -> Self {
        Self {
            frequencies: trace.frequencies().to_vec(),
            raw_magnitudes: trace.magnitudes().to_vec(),
            window_indices: detection.window.range().collect(),
            baseline_fit: detection.baseline_fit,
            raw_diff: detection.raw_diff,
            filtered_diff: detection.filtered_diff,
            peaks: detection.peaks,
            sampling_rate,
            threshold,
        }
    }

    /// Frequencies of the window samples
    pub fn window_frequencies(&self) -> Vec<f64> {
        self.window_indices.iter().map(|&i| self.frequencies[i]).collect()
    }

    pub fn peak_reports(&self) -> Vec<PeakReport> {
        self.peaks
            .iter()
            .map(|&p| {
                let index = self.window_indices[p];
                PeakReport {
                    index,
                    frequency: self.frequencies[index],
                    diff_db: self.raw_diff[p],
                }
            })
            .collect()
    }

    /// Peak log line, e.g. `(27.3 MHz, 1.250 dB), (27.5 MHz, 0.800 dB)`
    pub fn peak_log(&self) -> String {
        self.peak_reports()
            .iter()
            .map(|r| format!("({} MHz, {:.3} dB)", r.frequency, r.diff_db))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Timeline ready for plotting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelinePayload {
    /// Slot positions 0..C
    pub positions: Vec<f64>,
    /// Values in slot order
    pub values: Vec<f64>,
    /// Slot written last, `None` before the first tick
    pub latest_index: Option<usize>,
}

impl From<TimelineSnapshot> for TimelinePayload {
    fn from(snapshot: TimelineSnapshot) -> Self {
        Self {
            positions: (0..snapshot.values.len()).map(|i| i as f64).collect(),
            latest_index: snapshot.latest_index(),
            values: snapshot.values,
        }
    }
}

/// Everything produced by one tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickOutput {
    pub frame: FramePayload,
    /// Selected peak frequency before quantization (sentinel if none)
    pub peak: f64,
    /// Value recorded in the timeline this tick
    pub quantized: f64,
    /// Band matching `quantized` in demo mode
    pub active_band: Option<usize>,
    pub timeline: TimelinePayload,
}

/// Owned pipeline state, driven by one tick loop
pub struct Pipeline {
    config: PipelineConfig,
    detector: PeakDetector,
    quantizer: DemoQuantizer,
    timeline: TimelineBuffer,
    baseline: SharedBaseline,
    ticks: u64,
}

impl Pipeline {
    /// Validate `config` and build the pipeline
    pub fn new(config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate()?;

        Ok(Self {
            detector: config.peak_detector()?,
            quantizer: config.demo_quantizer(),
            timeline: TimelineBuffer::new(config.timeline.capacity),
            baseline: SharedBaseline::new(),
            ticks: 0,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn detector(&self) -> &PeakDetector {
        &self.detector
    }

    pub fn quantizer(&self) -> &DemoQuantizer {
        &self.quantizer
    }

    pub fn timeline(&self) -> &TimelineBuffer {
        &self.timeline
    }

    /// Handle on the published calibration baseline, shareable with readers
    pub fn shared_baseline(&self) -> SharedBaseline {
        self.baseline.clone()
    }

    /// Completed ticks
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run one tick against `source`
    ///
    /// Acquisition failures are returned unchanged and leave the timeline
    /// and baseline untouched.
    pub fn tick<S: TraceSource + ?Sized>(&mut self, source: &mut S) -> Result<TickOutput, PipelineError> {
        let start = Instant::now();
        let trace = match source.next_trace() {
            Ok(trace) => trace,
            Err(e) => {
                log::warn!("Skipping tick {}: {}", self.ticks, e);
                return Err(e.into());
            }
        };
        let sampling_rate = sweep_rate(1, start.elapsed());

        self.process(&trace, sampling_rate)
    }

    /// Run detection, selection, quantization and recording on a sweep the
    /// host already holds
    ///
    /// The sweep must have the configured number of points.
    pub fn process(&mut self, trace: &Trace, sampling_rate: f64) -> Result<TickOutput, PipelineError> {
        if trace.len() != self.config.sweep.step_num {
            return Err(PipelineError::GridMismatch {
                expected: self.config.sweep.step_num,
                found: trace.len(),
                index: None,
            });
        }

        let detection = self.detector.detect(trace)?;

        let sentinel = trace.sentinel();
        let peak = detection
            .primary_peak()
            .map(|p| trace.frequencies()[detection.absolute_index(p)])
            .unwrap_or(sentinel);

        let quantized = self.quantizer.quantize(peak, sentinel);
        let active_band = self.quantizer.band_index(quantized);

        self.timeline.push(quantized, sentinel);
        self.ticks += 1;

        let frame = FramePayload::new(trace, detection, sampling_rate, self.detector.threshold());
        log::debug!(
            "Tick {}: peak {} MHz -> {} MHz ({} peak(s))",
            self.ticks,
            peak,
            quantized,
            frame.peaks.len()
        );

        Ok(TickOutput {
            frame,
            peak,
            quantized,
            active_band,
            timeline: self.timeline.snapshot().into(),
        })
    }

    /// Average `ave_num` sweeps from `source` and publish the baseline
    ///
    /// Holding `source` mutably for the whole run keeps ticks out of it.
    pub fn calibrate<S: TraceSource + ?Sized>(
        &self,
        source: &mut S,
    ) -> Result<Arc<CalibrationBaseline>, PipelineError> {
        let baseline = CalibrationBaseline::average(source, self.config.calibration.ave_num)?;
        Ok(self.baseline.publish(baseline))
    }

    /// Average sweeps the host already recorded and publish the baseline
    ///
    /// Exactly `ave_num` sweeps are required.
    pub fn calibrate_recorded(
        &self,
        sweeps: Vec<Trace>,
    ) -> Result<Arc<CalibrationBaseline>, PipelineError> {
        let expected = self.config.calibration.ave_num;
        if sweeps.len() != expected {
            return Err(PipelineError::SweepCount {
                expected,
                found: sweeps.len(),
            });
        }

        let (mut producer, mut consumer) = TraceQueue::new(expected).split();
        for trace in sweeps {
            // capacity equals the sweep count
            let _ = producer.push(trace);
        }
        self.calibrate(&mut consumer)
    }

    /// Current timeline as a plot payload; empty before the first tick
    pub fn timeline_payload(&self) -> TimelinePayload {
        self.timeline.snapshot().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::DemoBand;
    use crate::error::AcquisitionError;
    use crate::trace::{FrequencyPlan, Resonance, SyntheticSweep};

    struct Failing;

    impl TraceSource for Failing {
        fn next_trace(&mut self) -> Result<Trace, AcquisitionError> {
            Err(AcquisitionError::Instrument("sweep failed".into()))
        }
    }

    fn demo_config() -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.demo.enabled = true;
        config.demo.bands = vec![
            DemoBand::new(27.25, 27.36, 27.3),
            DemoBand::new(27.45, 27.55, 27.5),
            DemoBand::new(27.62, 27.70, 27.65),
            DemoBand::new(27.77, 27.86, 27.82),
        ];
        config
    }

    #[test]
    fn test_flat_sweep_records_sentinel() {
        let mut pipeline = Pipeline::new(demo_config()).unwrap();
        let mut source = SyntheticSweep::new(FrequencyPlan::default(), -20.0);

        let out = pipeline.tick(&mut source).unwrap();
        assert!(out.frame.peaks.is_empty());
        assert_eq!(out.peak, 27.0);
        assert_eq!(out.quantized, 27.0);
        assert_eq!(out.active_band, None);
        assert!(out.timeline.values.iter().all(|&v| v == 27.0));
    }

    #[test]
    fn test_peak_in_band_maps_to_target() {
        let mut pipeline = Pipeline::new(demo_config()).unwrap();
        let mut source = SyntheticSweep::new(FrequencyPlan::default(), -20.0)
            .with_resonance(Resonance::new(27.52, 3.0, 0.03));

        let out = pipeline.tick(&mut source).unwrap();
        assert_eq!(out.frame.peaks.len(), 1);
        assert!((out.peak - 27.52).abs() < 1e-9);
        assert_eq!(out.quantized, 27.5);
        assert_eq!(out.active_band, Some(1));
        assert_eq!(out.timeline.values[0], 27.5);
        assert_eq!(out.timeline.latest_index, Some(0));
        assert_eq!(out.timeline.positions.len(), 50);
    }

    #[test]
    fn test_lowest_frequency_peak_is_selected() {
        let mut pipeline = Pipeline::new(demo_config()).unwrap();
        let mut source = SyntheticSweep::new(FrequencyPlan::default(), -20.0)
            .with_resonance(Resonance::new(27.3, 1.5, 0.02))
            .with_resonance(Resonance::new(27.65, 4.0, 0.02));

        let out = pipeline.tick(&mut source).unwrap();
        assert_eq!(out.frame.peaks.len(), 2);
        assert!((out.peak - 27.3).abs() < 1e-9);
        assert_eq!(out.quantized, 27.3);
        assert_eq!(out.frame.peak_reports().len(), 2);
        assert!(out.frame.peak_log().contains("MHz"));
    }

    #[test]
    fn test_acquisition_failure_leaves_timeline_untouched() {
        let mut pipeline = Pipeline::new(demo_config()).unwrap();
        let mut good = SyntheticSweep::new(FrequencyPlan::default(), -20.0);
        pipeline.tick(&mut good).unwrap();
        let before = pipeline.timeline().snapshot();

        let err = pipeline.tick(&mut Failing).unwrap_err();
        assert!(matches!(err, PipelineError::Acquisition(_)));
        assert_eq!(pipeline.timeline().snapshot(), before);
        assert_eq!(pipeline.ticks(), 1);
    }

    #[test]
    fn test_demo_disabled_records_raw_peak() {
        let mut config = demo_config();
        config.demo.enabled = false;
        let mut pipeline = Pipeline::new(config).unwrap();
        let mut source = SyntheticSweep::new(FrequencyPlan::default(), -20.0)
            .with_resonance(Resonance::new(27.41, 3.0, 0.03));

        let out = pipeline.tick(&mut source).unwrap();
        assert!((out.quantized - 27.41).abs() < 1e-9);
        assert_eq!(out.active_band, None);
    }

    #[test]
    fn test_frame_payload_shapes() {
        let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let mut source = SyntheticSweep::new(FrequencyPlan::default(), -20.0);
        let out = pipeline.tick(&mut source).unwrap();

        assert_eq!(out.frame.frequencies.len(), 101);
        assert_eq!(out.frame.window_indices, (5..96).collect::<Vec<_>>());
        assert_eq!(out.frame.baseline_fit.len(), 91);
        assert_eq!(out.frame.window_frequencies().len(), 91);
        assert_eq!(out.frame.threshold, 0.5);
        assert!(out.frame.sampling_rate > 0.0);
    }

    #[test]
    fn test_calibrate_publishes_to_shared_baseline() {
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let readers = pipeline.shared_baseline();
        let mut source = SyntheticSweep::new(FrequencyPlan::default(), -9.0);

        let baseline = pipeline.calibrate(&mut source).unwrap();
        assert_eq!(baseline.sweeps(), 10);
        assert!(Arc::ptr_eq(&baseline, &readers.current().unwrap()));
    }

    #[test]
    fn test_sweep_length_must_match_config() {
        let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let plan = FrequencyPlan {
            freq_step: 0.005,
            step_num: 201,
            ..FrequencyPlan::default()
        };
        let mut source = SyntheticSweep::new(plan, -20.0);

        let err = pipeline.tick(&mut source).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::GridMismatch { expected: 101, found: 201, index: None }
        ));
        assert!(!pipeline.timeline().is_initialized());
        assert_eq!(pipeline.ticks(), 0);
    }

    #[test]
    fn test_timeline_payload_empty_before_first_tick() {
        let mut pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let payload = pipeline.timeline_payload();
        assert!(payload.values.is_empty());
        assert!(payload.positions.is_empty());
        assert_eq!(payload.latest_index, None);

        let mut source = SyntheticSweep::new(FrequencyPlan::default(), -20.0);
        pipeline.tick(&mut source).unwrap();
        let payload = pipeline.timeline_payload();
        assert_eq!(payload.values, vec![27.0; 50]);
        assert_eq!(payload.latest_index, Some(0));
    }

    #[test]
    fn test_calibrate_recorded_requires_exact_count() {
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let mut source = SyntheticSweep::new(FrequencyPlan::default(), -9.0);
        let record = |source: &mut SyntheticSweep, n: usize| -> Vec<Trace> {
            (0..n).map(|_| source.sweep().unwrap()).collect()
        };

        for n in [3, 11] {
            let err = pipeline.calibrate_recorded(record(&mut source, n)).unwrap_err();
            assert!(matches!(err, PipelineError::SweepCount { expected: 10, found } if found == n));
        }
        assert!(pipeline.shared_baseline().current().is_none());

        let baseline = pipeline.calibrate_recorded(record(&mut source, 10)).unwrap();
        assert_eq!(baseline.sweeps(), 10);
        assert!((baseline.average_magnitudes()[0] + 9.0).abs() < 1e-10);
    }
}
