//! Deterministic synthetic sweeps
//!
//! Tilted baseline with Gaussian resonance bumps and optional uniform noise.
//! Used by the replay binary, the integration tests and the benchmarks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{FrequencyPlan, Trace, TraceSource};
use crate::error::AcquisitionError;

/// Gaussian bump added on top of the baseline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resonance {
    /// Center frequency in MHz
    pub center: f64,

    /// Height above the baseline in dB
    pub amplitude: f64,

    /// Standard deviation of the bump in MHz
    pub width: f64,
}

impl Resonance {
    pub fn new(center: f64, amplitude: f64, width: f64) -> Self {
        Self {
            center,
            amplitude,
            width,
        }
    }

    fn at(&self, freq: f64) -> f64 {
        let z = (freq - self.center) / self.width;
        self.amplitude * (-0.5 * z * z).exp()
    }
}

/// Synthetic trace source
pub struct SyntheticSweep {
    plan: FrequencyPlan,
    floor_db: f64,
    tilt_db: f64,
    noise_db: f64,
    resonances: Vec<Resonance>,
    rng: StdRng,
}

impl SyntheticSweep {
    /// Flat, noise-free sweep at `floor_db`
    pub fn new(plan: FrequencyPlan, floor_db: f64) -> Self {
        Self {
            plan,
            floor_db,
            tilt_db: 0.0,
            noise_db: 0.0,
            resonances: Vec::new(),
            rng: StdRng::seed_from_u64(0),
        }
    }

    /// Linear change of the baseline from first to last sweep point, in dB
    pub fn with_tilt(mut self, tilt_db: f64) -> Self {
        self.tilt_db = tilt_db;
        self
    }

    /// Uniform noise in `[-noise_db, noise_db]`, reproducible from `seed`
    pub fn with_noise(mut self, noise_db: f64, seed: u64) -> Self {
        self.noise_db = noise_db;
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_resonance(mut self, resonance: Resonance) -> Self {
        self.resonances.push(resonance);
        self
    }

    pub fn resonances_mut(&mut self) -> &mut Vec<Resonance> {
        &mut self.resonances
    }

    pub fn plan(&self) -> &FrequencyPlan {
        &self.plan
    }

    /// Produce one sweep
    pub fn sweep(&mut self) -> Result<Trace, AcquisitionError> {
        let frequencies = self.plan.frequencies();
        let span = (self.plan.stop_freq() - self.plan.start_freq).max(f64::EPSILON);

        let mut magnitudes = Vec::with_capacity(frequencies.len());
        let mut phases = Vec::with_capacity(frequencies.len());
        for &f in &frequencies {
            let tilt = self.tilt_db * (f - self.plan.start_freq) / span;
            let bumps: f64 = self.resonances.iter().map(|r| r.at(f)).sum();
            let noise = if self.noise_db > 0.0 {
                self.rng.gen_range(-self.noise_db..=self.noise_db)
            } else {
                0.0
            };
            magnitudes.push(self.floor_db + tilt + bumps + noise);
            phases.push(-180.0 * (f - self.plan.start_freq) / span);
        }

        Ok(Trace::new(frequencies, magnitudes, phases)?)
    }
}

impl TraceSource for SyntheticSweep {
    fn next_trace(&mut self) -> Result<Trace, AcquisitionError> {
        self.sweep()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_sweep() {
        let mut source = SyntheticSweep::new(FrequencyPlan::default(), -20.0);
        let trace = source.next_trace().unwrap();
        assert_eq!(trace.len(), 101);
        assert!(trace.magnitudes().iter().all(|&m| (m + 20.0).abs() < 1e-12));
    }

    #[test]
    fn test_resonance_peaks_at_center() {
        let plan = FrequencyPlan::default();
        let mut source =
            SyntheticSweep::new(plan, -20.0).with_resonance(Resonance::new(27.5, 3.0, 0.02));
        let trace = source.next_trace().unwrap();

        let (argmax, _) = trace
            .magnitudes()
            .iter()
            .enumerate()
            .fold((0, f64::MIN), |acc, (i, &m)| if m > acc.1 { (i, m) } else { acc });
        assert_eq!(argmax, plan.nearest_index(27.5));
        assert!((trace.magnitudes()[argmax] + 17.0).abs() < 1e-9);
    }

    #[test]
    fn test_noise_is_reproducible() {
        let plan = FrequencyPlan::default();
        let a = SyntheticSweep::new(plan, 0.0).with_noise(0.1, 7).sweep().unwrap();
        let b = SyntheticSweep::new(plan, 0.0).with_noise(0.1, 7).sweep().unwrap();
        assert_eq!(a, b);
        assert!(a.magnitudes().iter().all(|m| m.abs() <= 0.1));
    }
}
