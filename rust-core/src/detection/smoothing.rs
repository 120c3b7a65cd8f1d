//! Moving-average smoothing of the detrended difference signal
//!
//! Zero-phase (centered) box filter applied to one frame at a time. Near the
//! window edges the average is taken over the samples that exist, so the
//! output has the same length as the input and no edge sag.

/// Centered moving average of fixed width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovingAverage {
    width: usize,
}

impl MovingAverage {
    /// Create a moving average over `width` samples
    ///
    /// A width of 0 is treated as 1 (identity).
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Samples taken before / after the center; even widths lean right
    fn reach(&self) -> (usize, usize) {
        ((self.width - 1) / 2, self.width / 2)
    }

    /// Smooth a frame
    ///
    /// # Arguments
    /// * `input` - Samples to smooth
    ///
    /// # Returns
    /// Smoothed samples (same length as input)
    pub fn apply(&self, input: &[f64]) -> Vec<f64> {
        if self.width == 1 || input.is_empty() {
            return input.to_vec();
        }

        // prefix[i] = sum of input[..i]
        let mut prefix = Vec::with_capacity(input.len() + 1);
        prefix.push(0.0);
        let mut acc = 0.0;
        for &x in input {
            acc += x;
            prefix.push(acc);
        }

        let (before, after) = self.reach();
        let last = input.len() - 1;
        (0..input.len())
            .map(|i| {
                let lo = i.saturating_sub(before);
                let hi = (i + after).min(last);
                (prefix[hi + 1] - prefix[lo]) / (hi + 1 - lo) as f64
            })
            .collect()
    }
}

impl Default for MovingAverage {
    fn default() -> Self {
        Self::new(1)
    }
}
