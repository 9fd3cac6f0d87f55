use super::linalg::{lu_factorize, LuError};
use super::DenseMatrix;

const MIN_ANCHORS: usize = 4;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SplineError {
    #[error("smoothing spline requires at least {MIN_ANCHORS} anchor points, got {actual}")]
    InsufficientAnchors { actual: usize },
    #[error("anchor length mismatch: abscissae={abscissae}, ordinates={ordinates}")]
    LengthMismatch { abscissae: usize, ordinates: usize },
    #[error(
        "anchor abscissae must be strictly increasing, index {index} has {current} after {previous}"
    )]
    NonIncreasingAnchor {
        index: usize,
        previous: f64,
        current: f64,
    },
    #[error("smoothing parameter must be finite and >= 0, got {value}")]
    InvalidSmoothing { value: f64 },
    #[error("anchor ordinate must be finite at index {index}, got {value}")]
    NonFiniteAnchor { index: usize, value: f64 },
    #[error("penalized anchor system could not be solved: {0}")]
    SingularSystem(#[from] LuError),
    #[error("smoothing spline produced a non-finite coefficient")]
    NonFiniteResult,
}

/// Cubic smoothing spline over a set of baseline anchor points.
///
/// The fit minimizes the sum of squared anchor misfits plus `smoothing`
/// times a second-difference roughness penalty, then threads a natural
/// cubic spline through the smoothed anchor ordinates. Larger `smoothing`
/// values give a flatter curve; zero reproduces the anchors exactly.
#[derive(Debug, Clone)]
pub struct SmoothingSpline {
    knots: Vec<f64>,
    values: Vec<f64>,
    second_derivatives: Vec<f64>,
}

impl SmoothingSpline {
    pub fn fit(
        anchor_x: &[f64],
        anchor_y: &[f64],
        smoothing: f64,
    ) -> Result<Self, SplineError> {
        validate_anchors(anchor_x, anchor_y, smoothing)?;

        let values = if smoothing == 0.0 {
            anchor_y.to_vec()
        } else {
            penalized_ordinates(anchor_x, anchor_y, smoothing)?
        };

        let second_derivatives = natural_second_derivatives(anchor_x, &values);
        if second_derivatives.iter().any(|value| !value.is_finite()) {
            return Err(SplineError::NonFiniteResult);
        }

        Ok(Self {
            knots: anchor_x.to_vec(),
            values,
            second_derivatives,
        })
    }

    /// Evaluate the spline; queries outside the knot range continue the
    /// boundary cubic.
    pub fn evaluate(&self, x: f64) -> f64 {
        let n = self.knots.len();
        let mut lo = 0;
        let mut hi = n - 1;
        while hi - lo > 1 {
            let mid = (lo + hi) / 2;
            if self.knots[mid] > x {
                hi = mid;
            } else {
                lo = mid;
            }
        }

        let h = self.knots[hi] - self.knots[lo];
        let a = (self.knots[hi] - x) / h;
        let b = (x - self.knots[lo]) / h;

        a * self.values[lo]
            + b * self.values[hi]
            + ((a * a * a - a) * self.second_derivatives[lo]
                + (b * b * b - b) * self.second_derivatives[hi])
                * h
                * h
                / 6.0
    }

    pub fn smoothed_ordinates(&self) -> &[f64] {
        &self.values
    }
}

fn validate_anchors(anchor_x: &[f64], anchor_y: &[f64], smoothing: f64) -> Result<(), SplineError> {
    if anchor_x.len() < MIN_ANCHORS {
        return Err(SplineError::InsufficientAnchors {
            actual: anchor_x.len(),
        });
    }
    if anchor_x.len() != anchor_y.len() {
        return Err(SplineError::LengthMismatch {
            abscissae: anchor_x.len(),
            ordinates: anchor_y.len(),
        });
    }
    if !smoothing.is_finite() || smoothing < 0.0 {
        return Err(SplineError::InvalidSmoothing { value: smoothing });
    }

    for index in 1..anchor_x.len() {
        let previous = anchor_x[index - 1];
        let current = anchor_x[index];
        if current <= previous {
            return Err(SplineError::NonIncreasingAnchor {
                index,
                previous,
                current,
            });
        }
    }
    for (index, value) in anchor_y.iter().copied().enumerate() {
        if !value.is_finite() {
            return Err(SplineError::NonFiniteAnchor { index, value });
        }
    }

    Ok(())
}

/// Solve `(I + smoothing * K) y_hat = y` where `K = Q R^-1 Q^T` is the
/// classic roughness-penalty matrix built from the anchor spacings.
fn penalized_ordinates(
    anchor_x: &[f64],
    anchor_y: &[f64],
    smoothing: f64,
) -> Result<Vec<f64>, SplineError> {
    let n = anchor_x.len();
    let interior = n - 2;
    let spacings: Vec<f64> = anchor_x.windows(2).map(|pair| pair[1] - pair[0]).collect();

    let mut banded = DenseMatrix::zeros(interior, interior);
    for j in 0..interior {
        banded[(j, j)] = (spacings[j] + spacings[j + 1]) / 3.0;
        if j + 1 < interior {
            banded[(j, j + 1)] = spacings[j + 1] / 6.0;
            banded[(j + 1, j)] = spacings[j + 1] / 6.0;
        }
    }

    // Second-difference operator, one row per interior anchor.
    let mut difference = DenseMatrix::zeros(interior, n);
    for j in 0..interior {
        difference[(j, j)] = 1.0 / spacings[j];
        difference[(j, j + 1)] = -(1.0 / spacings[j] + 1.0 / spacings[j + 1]);
        difference[(j, j + 2)] = 1.0 / spacings[j + 1];
    }

    let banded_lu = lu_factorize(&banded)?;
    let mut inverted_difference = DenseMatrix::zeros(interior, n);
    let mut column = vec![0.0; interior];
    for col in 0..n {
        for row in 0..interior {
            column[row] = difference[(row, col)];
        }
        let solved = banded_lu.solve(&column)?;
        for row in 0..interior {
            inverted_difference[(row, col)] = solved[row];
        }
    }

    // Each difference row only touches columns j..j+2, so row `a` of the
    // penalty draws from at most three difference rows.
    let mut system = DenseMatrix::zeros(n, n);
    for a in 0..n {
        let first_row = a.saturating_sub(2);
        let last_row = a.min(interior.saturating_sub(1));
        for b in 0..n {
            let mut penalty = 0.0;
            for j in first_row..=last_row {
                penalty += difference[(j, a)] * inverted_difference[(j, b)];
            }
            system[(a, b)] = smoothing * penalty;
        }
        system[(a, a)] += 1.0;
    }

    let smoothed = lu_factorize(&system)?.solve(anchor_y)?;
    if smoothed.iter().any(|value| !value.is_finite()) {
        return Err(SplineError::NonFiniteResult);
    }

    Ok(smoothed)
}

fn natural_second_derivatives(knots: &[f64], values: &[f64]) -> Vec<f64> {
    let n = knots.len();
    let mut second = vec![0.0; n];
    let mut workspace = vec![0.0; n - 1];

    for i in 1..n - 1 {
        let sig = (knots[i] - knots[i - 1]) / (knots[i + 1] - knots[i - 1]);
        let p = sig * second[i - 1] + 2.0;
        second[i] = (sig - 1.0) / p;
        workspace[i] = (values[i + 1] - values[i]) / (knots[i + 1] - knots[i])
            - (values[i] - values[i - 1]) / (knots[i] - knots[i - 1]);
        workspace[i] =
            (6.0 * workspace[i] / (knots[i + 1] - knots[i - 1]) - sig * workspace[i - 1]) / p;
    }

    for k in (0..n - 2).rev() {
        second[k + 1] = second[k + 1] * second[k + 2] + workspace[k + 1];
    }

    second
}
