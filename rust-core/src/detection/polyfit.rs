//! Least-squares polynomial baseline
//!
//! Fits y[i] against the window-relative index mapped onto [-1, 1], which
//! keeps the normal equations well conditioned for the low degrees used
//! for detrending.

use ndarray::{Array1, Array2, ArrayView1};

/// Relative pivot size below which the normal equations count as singular
const SINGULAR_PIVOT: f64 = 1e-12;

/// Fitted polynomial over a window of `len` samples
#[derive(Debug, Clone, PartialEq)]
pub struct PolynomialFit {
    /// Coefficients c[k] of x^k, lowest order first
    coefficients: Vec<f64>,
    len: usize,
}

impl PolynomialFit {
    /// Least-squares fit of `degree` to `values`
    ///
    /// # Returns
    /// `None` if the fit is underdetermined (fewer than `degree + 1`
    /// samples) or the normal equations are singular
    pub fn fit(values: &[f64], degree: usize) -> Option<Self> {
        let len = values.len();
        let terms = degree + 1;
        if len < terms {
            return None;
        }

        let mut vandermonde = Array2::<f64>::zeros((len, terms));
        for (i, mut row) in vandermonde.rows_mut().into_iter().enumerate() {
            let x = abscissa(i, len);
            let mut power = 1.0;
            for k in 0..terms {
                row[k] = power;
                power *= x;
            }
        }

        let y = ArrayView1::from(values);
        let normal = vandermonde.t().dot(&vandermonde);
        let rhs = vandermonde.t().dot(&y);
        let coefficients = solve(normal, rhs)?;

        Some(Self {
            coefficients: coefficients.to_vec(),
            len,
        })
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len() - 1
    }

    /// Value of the fit at window index `i`
    pub fn value_at(&self, i: usize) -> f64 {
        let x = abscissa(i, self.len);
        self.coefficients.iter().rev().fold(0.0, |acc, &c| acc * x + c)
    }

    /// Fit evaluated at every sample of the window
    pub fn evaluate(&self) -> Vec<f64> {
        (0..self.len).map(|i| self.value_at(i)).collect()
    }
}

/// Window index `i` of `len` mapped onto [-1, 1]
fn abscissa(i: usize, len: usize) -> f64 {
    if len <= 1 {
        0.0
    } else {
        2.0 * i as f64 / (len - 1) as f64 - 1.0
    }
}

/// Gaussian elimination with partial pivoting
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    let scale = a.iter().fold(0.0f64, |m, v| m.max(v.abs())).max(f64::MIN_POSITIVE);

    for col in 0..n {
        let pivot = (col..n).max_by(|&r1, &r2| a[[r1, col]].abs().total_cmp(&a[[r2, col]].abs()))?;
        if a[[pivot, col]].abs() < SINGULAR_PIVOT * scale {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([pivot, k], [col, k]);
            }
            b.swap(pivot, col);
        }

        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_recovers_line() {
        let values: Vec<f64> = (0..11).map(|i| 3.0 + 0.5 * i as f64).collect();
        let fit = PolynomialFit::fit(&values, 1).unwrap();
        for (fitted, expected) in fit.evaluate().iter().zip(&values) {
            assert!((fitted - expected).abs() < 1e-10);
        }
        assert_eq!(fit.degree(), 1);
    }

    #[test]
    fn test_fit_recovers_cubic() {
        let values: Vec<f64> = (0..40)
            .map(|i| {
                let x = i as f64;
                -20.0 + 0.1 * x - 0.004 * x * x + 0.00005 * x * x * x
            })
            .collect();
        let fit = PolynomialFit::fit(&values, 3).unwrap();
        for (fitted, expected) in fit.evaluate().iter().zip(&values) {
            assert!((fitted - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_constant_fit_is_mean() {
        let values = [1.0, 2.0, 3.0, 6.0];
        let fit = PolynomialFit::fit(&values, 0).unwrap();
        assert!((fit.value_at(2) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_underdetermined_fit() {
        assert!(PolynomialFit::fit(&[1.0, 2.0], 2).is_none());
        assert!(PolynomialFit::fit(&[], 0).is_none());
    }

    #[test]
    fn test_exactly_determined_fit_interpolates() {
        let values = [1.0, -1.0, 4.0];
        let fit = PolynomialFit::fit(&values, 2).unwrap();
        for (i, v) in values.iter().enumerate() {
            assert!((fit.value_at(i) - v).abs() < 1e-10);
        }
    }
}
