use super::linalg::{lu_solve, LuError};
use super::DenseMatrix;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PolyFitError {
    #[error("polynomial fit of order {order} needs at least {required} points, got {actual}")]
    InsufficientPoints {
        order: usize,
        required: usize,
        actual: usize,
    },
    #[error("point length mismatch: abscissae={abscissae}, ordinates={ordinates}")]
    LengthMismatch { abscissae: usize, ordinates: usize },
    #[error("normal equations could not be solved: {0}")]
    SingularSystem(#[from] LuError),
    #[error("polynomial fit produced a non-finite coefficient")]
    NonFiniteResult,
}

/// Least-squares polynomial on a centered and scaled abscissa, fitted through
/// baseline anchor windows and evaluated over a full sub-range.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    center: f64,
    scale: f64,
    coefficients: Vec<f64>,
}

impl Polynomial {
    pub fn fit(x: &[f64], y: &[f64], order: usize) -> Result<Self, PolyFitError> {
        let required = order + 1;
        if x.len() < required {
            return Err(PolyFitError::InsufficientPoints {
                order,
                required,
                actual: x.len(),
            });
        }
        if x.len() != y.len() {
            return Err(PolyFitError::LengthMismatch {
                abscissae: x.len(),
                ordinates: y.len(),
            });
        }

        // Center and scale for conditioning; raw Raman shifts span thousands
        // of wavenumbers and an uncentered Vandermonde basis degrades fast.
        let min = x.iter().copied().fold(f64::INFINITY, f64::min);
        let max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let center = 0.5 * (min + max);
        let half_range = 0.5 * (max - min);
        let scale = if half_range > 0.0 { half_range } else { 1.0 };

        let basis_count = order + 1;
        let mut normal = DenseMatrix::zeros(basis_count, basis_count);
        let mut moment = vec![0.0; basis_count];
        for (&abscissa, &ordinate) in x.iter().zip(y) {
            let t = (abscissa - center) / scale;
            let mut powers = vec![1.0; basis_count];
            for degree in 1..basis_count {
                powers[degree] = powers[degree - 1] * t;
            }
            for row in 0..basis_count {
                moment[row] += powers[row] * ordinate;
                for col in 0..basis_count {
                    normal[(row, col)] += powers[row] * powers[col];
                }
            }
        }

        let coefficients = lu_solve(&normal, &moment)?;
        if coefficients.iter().any(|value| !value.is_finite()) {
            return Err(PolyFitError::NonFiniteResult);
        }

        Ok(Self {
            center,
            scale,
            coefficients,
        })
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        let t = (x - self.center) / self.scale;
        let mut value = 0.0;
        for &coefficient in self.coefficients.iter().rev() {
            value = value * t + coefficient;
        }
        value
    }

    pub fn order(&self) -> usize {
        self.coefficients.len() - 1
    }
}
