//! Threshold-run peak extraction

/// Indices of the maxima of contiguous runs above `threshold`
///
/// A sample is a candidate when it exceeds `threshold + floor`, where
/// `floor` absorbs floating-point residue of the detrending fit. Each run of
/// adjacent candidates collapses to the index of its largest value (the
/// lowest such index on ties). Result is ascending.
pub fn find_peaks(signal: &[f64], threshold: f64, floor: f64) -> Vec<usize> {
    let limit = threshold + floor;
    let mut peaks = Vec::new();
    let mut run_best: Option<usize> = None;

    for (i, &value) in signal.iter().enumerate() {
        if value > limit {
            run_best = match run_best {
                Some(best) if signal[best] >= value => Some(best),
                _ => Some(i),
            };
        } else if let Some(best) = run_best.take() {
            peaks.push(best);
        }
    }
    if let Some(best) = run_best {
        peaks.push(best);
    }

    peaks
}
