use super::linalg::{lu_solve, LuError};
use super::DenseMatrix;

const INITIAL_DAMPING: f64 = 1.0e-3;
const MIN_DAMPING: f64 = 1.0e-12;
const MAX_DAMPING: f64 = 1.0e12;
const DAMPING_STEP: f64 = 10.0;
const JACOBIAN_STEP_FLOOR: f64 = 1.0e-8;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LeastSquaresError {
    #[error("least squares needs at least {parameters} residuals, got {residuals}")]
    Underdetermined {
        residuals: usize,
        parameters: usize,
    },
    #[error(
        "no convergence after {iterations} iterations (final cost {final_cost:e}, damping {damping:e})"
    )]
    NoConvergence {
        iterations: usize,
        final_cost: f64,
        damping: f64,
    },
    #[error("residual must be finite at index {index}, got {value}")]
    NonFiniteResidual { index: usize, value: f64 },
    #[error("damped normal equations could not be solved: {0}")]
    SingularSystem(#[from] LuError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmOptions {
    pub max_iterations: usize,
    pub cost_tolerance: f64,
    pub step_tolerance: f64,
    pub gradient_tolerance: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            cost_tolerance: 1.0e-14,
            step_tolerance: 1.0e-12,
            gradient_tolerance: 1.0e-12,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub parameters: Vec<f64>,
    pub cost: f64,
    pub iterations: usize,
}

/// Levenberg-Marquardt minimization of `sum(residuals(p)^2)` with a
/// forward-difference Jacobian. Sized for the one- and two-parameter
/// calibration models; the residual closure is called once per Jacobian
/// column plus once per trial step.
pub fn levenberg_marquardt<F>(
    initial: &[f64],
    options: LmOptions,
    residuals_fn: F,
) -> Result<FitReport, LeastSquaresError>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let mut parameters = initial.to_vec();
    let parameter_count = parameters.len();

    let mut residuals = evaluate_residuals(&residuals_fn, &parameters)?;
    if residuals.len() < parameter_count {
        return Err(LeastSquaresError::Underdetermined {
            residuals: residuals.len(),
            parameters: parameter_count,
        });
    }

    let mut cost = squared_norm(&residuals);
    let mut damping = INITIAL_DAMPING;

    for iteration in 1..=options.max_iterations {
        let jacobian = forward_difference_jacobian(&residuals_fn, &parameters, &residuals)?;
        let gradient = jacobian_transpose_vector(&jacobian, &residuals);
        if infinity_norm(&gradient) <= options.gradient_tolerance {
            return Ok(FitReport {
                parameters,
                cost,
                iterations: iteration,
            });
        }

        let normal = jacobian_transpose_jacobian(&jacobian);
        let mut accepted = false;
        while damping <= MAX_DAMPING {
            let mut damped = normal.clone();
            for index in 0..parameter_count {
                let diagonal = damped[(index, index)].max(1.0e-12);
                damped[(index, index)] = diagonal * (1.0 + damping);
            }

            let negative_gradient: Vec<f64> = gradient.iter().map(|value| -value).collect();
            let step = lu_solve(&damped, &negative_gradient)?;

            let trial: Vec<f64> = parameters
                .iter()
                .zip(&step)
                .map(|(parameter, delta)| parameter + delta)
                .collect();
            let trial_residuals = evaluate_residuals(&residuals_fn, &trial)?;
            let trial_cost = squared_norm(&trial_residuals);

            if trial_cost < cost {
                let cost_drop = cost - trial_cost;
                let step_size = infinity_norm(&step);
                parameters = trial;
                residuals = trial_residuals;
                cost = trial_cost;
                damping = (damping / DAMPING_STEP).max(MIN_DAMPING);
                accepted = true;

                let parameter_scale = 1.0 + infinity_norm(&parameters);
                if step_size <= options.step_tolerance * parameter_scale
                    || cost_drop <= options.cost_tolerance * cost.max(1.0e-300)
                {
                    return Ok(FitReport {
                        parameters,
                        cost,
                        iterations: iteration,
                    });
                }
                break;
            }

            damping *= DAMPING_STEP;
        }

        if !accepted {
            return Err(LeastSquaresError::NoConvergence {
                iterations: iteration,
                final_cost: cost,
                damping,
            });
        }
    }

    Err(LeastSquaresError::NoConvergence {
        iterations: options.max_iterations,
        final_cost: cost,
        damping,
    })
}

fn evaluate_residuals<F>(residuals_fn: &F, parameters: &[f64]) -> Result<Vec<f64>, LeastSquaresError>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let residuals = residuals_fn(parameters);
    for (index, value) in residuals.iter().copied().enumerate() {
        if !value.is_finite() {
            return Err(LeastSquaresError::NonFiniteResidual { index, value });
        }
    }
    Ok(residuals)
}

fn forward_difference_jacobian<F>(
    residuals_fn: &F,
    parameters: &[f64],
    residuals: &[f64],
) -> Result<DenseMatrix, LeastSquaresError>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let residual_count = residuals.len();
    let parameter_count = parameters.len();
    let mut jacobian = DenseMatrix::zeros(residual_count, parameter_count);

    for col in 0..parameter_count {
        let step = JACOBIAN_STEP_FLOOR.max(parameters[col].abs() * JACOBIAN_STEP_FLOOR.sqrt());
        let mut nudged = parameters.to_vec();
        nudged[col] += step;
        let nudged_residuals = evaluate_residuals(residuals_fn, &nudged)?;
        for row in 0..residual_count {
            jacobian[(row, col)] = (nudged_residuals[row] - residuals[row]) / step;
        }
    }

    Ok(jacobian)
}

fn jacobian_transpose_vector(jacobian: &DenseMatrix, vector: &[f64]) -> Vec<f64> {
    let mut output = vec![0.0; jacobian.ncols()];
    for col in 0..jacobian.ncols() {
        let mut sum = 0.0;
        for row in 0..jacobian.nrows() {
            sum += jacobian[(row, col)] * vector[row];
        }
        output[col] = sum;
    }
    output
}

fn jacobian_transpose_jacobian(jacobian: &DenseMatrix) -> DenseMatrix {
    let parameter_count = jacobian.ncols();
    let mut normal = DenseMatrix::zeros(parameter_count, parameter_count);
    for lhs in 0..parameter_count {
        for rhs in 0..parameter_count {
            let mut sum = 0.0;
            for row in 0..jacobian.nrows() {
                sum += jacobian[(row, lhs)] * jacobian[(row, rhs)];
            }
            normal[(lhs, rhs)] = sum;
        }
    }
    normal
}

fn squared_norm(values: &[f64]) -> f64 {
    values.iter().map(|value| value * value).sum()
}

fn infinity_norm(values: &[f64]) -> f64 {
    values.iter().fold(0.0, |best, value| best.max(value.abs()))
}

#[cfg(test)]
mod tests {
    use super::{levenberg_marquardt, LeastSquaresError, LmOptions};

    #[test]
    fn recovers_exponential_decay_rate_from_clean_data() {
        let abscissae: Vec<f64> = (0..25).map(|index| index as f64 * 0.2).collect();
        let truth = 0.65;
        let observations: Vec<f64> = abscissae.iter().map(|&x| (-truth * x).exp()).collect();

        let report = levenberg_marquardt(&[0.1], LmOptions::default(), |parameters| {
            abscissae
                .iter()
                .zip(&observations)
                .map(|(&x, &observed)| (-parameters[0] * x).exp() - observed)
                .collect()
        })
        .expect("fit");

        assert!(
            (report.parameters[0] - truth).abs() < 1.0e-6,
            "recovered {} expected {truth}",
            report.parameters[0]
        );
        assert!(report.cost < 1.0e-12);
    }

    #[test]
    fn recovers_two_parameter_line_from_clean_data() {
        let abscissae: Vec<f64> = (0..10).map(|index| index as f64).collect();
        let observations: Vec<f64> = abscissae.iter().map(|&x| 1.5 * x - 0.75).collect();

        let report = levenberg_marquardt(&[0.0, 0.0], LmOptions::default(), |parameters| {
            abscissae
                .iter()
                .zip(&observations)
                .map(|(&x, &observed)| parameters[0] * x + parameters[1] - observed)
                .collect()
        })
        .expect("fit");

        assert!((report.parameters[0] - 1.5).abs() < 1.0e-6);
        assert!((report.parameters[1] + 0.75).abs() < 1.0e-6);
    }

    #[test]
    fn rejects_fewer_residuals_than_parameters() {
        let error = levenberg_marquardt(&[1.0, 2.0], LmOptions::default(), |_| vec![0.5])
            .expect_err("underdetermined");
        assert_eq!(
            error,
            LeastSquaresError::Underdetermined {
                residuals: 1,
                parameters: 2
            }
        );
    }

    #[test]
    fn reports_non_finite_residuals_instead_of_iterating_on_them() {
        let error = levenberg_marquardt(&[1.0], LmOptions::default(), |parameters| {
            vec![1.0 / (parameters[0] - 1.0), 0.0]
        })
        .expect_err("non-finite");
        assert!(matches!(
            error,
            LeastSquaresError::NonFiniteResidual { index: 0, .. }
        ));
    }
}
