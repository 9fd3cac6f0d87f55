use crate::domain::{CalibrationMethod, CoreError, CoreResult};
use crate::numerics::{levenberg_marquardt, LeastSquaresError, LmOptions};
use serde::{Deserialize, Serialize};

pub const SATURATION_DEFAULT_A: f64 = 0.007609;
pub const FEO_LINEAR_DEFAULT_SLOPE: f64 = 0.096;
pub const FEO_LINEAR_DEFAULT_INTERCEPT: f64 = 0.663;

/// Fitted (or literature-default) calibration parameters. Immutable once
/// produced; consumed by prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WaterModel {
    /// `water = 100 * a * ratio / (1 + a * ratio)`, bounded above by 100 wt%.
    Saturation { a: f64 },
    /// `water = ratio * (slope * feo + intercept)`.
    FeoLinear { slope: f64, intercept: f64 },
}

impl WaterModel {
    pub fn literature_default(method: CalibrationMethod) -> Self {
        match method {
            CalibrationMethod::Saturation => Self::Saturation {
                a: SATURATION_DEFAULT_A,
            },
            CalibrationMethod::FeoLinear => Self::FeoLinear {
                slope: FEO_LINEAR_DEFAULT_SLOPE,
                intercept: FEO_LINEAR_DEFAULT_INTERCEPT,
            },
        }
    }

    pub fn method(&self) -> CalibrationMethod {
        match self {
            Self::Saturation { .. } => CalibrationMethod::Saturation,
            Self::FeoLinear { .. } => CalibrationMethod::FeoLinear,
        }
    }
}

pub fn saturation_predict(ratio: f64, a: f64) -> f64 {
    100.0 * a * ratio / (1.0 + a * ratio)
}

pub fn feo_linear_predict(ratio: f64, feo: f64, slope: f64, intercept: f64) -> f64 {
    ratio * (slope * feo + intercept)
}

/// Fit the chosen model's free parameter(s) against known water contents by
/// nonlinear least squares, starting from the literature values.
pub fn fit_model(
    method: CalibrationMethod,
    ratios: &[f64],
    water: &[f64],
    feo: Option<&[f64]>,
) -> CoreResult<WaterModel> {
    check_lengths(ratios.len(), water.len(), "known water contents")?;

    let parameters = method.parameter_count();
    if ratios.len() < parameters {
        return Err(CoreError::UnderdeterminedFit {
            rows: ratios.len(),
            parameters,
        });
    }

    match method {
        CalibrationMethod::Saturation => {
            let report = levenberg_marquardt(
                &[SATURATION_DEFAULT_A],
                LmOptions::default(),
                |parameters| {
                    ratios
                        .iter()
                        .zip(water)
                        .map(|(&ratio, &known)| saturation_predict(ratio, parameters[0]) - known)
                        .collect()
                },
            )
            .map_err(|source| fit_failure(method, source))?;

            Ok(WaterModel::Saturation {
                a: report.parameters[0],
            })
        }
        CalibrationMethod::FeoLinear => {
            let feo = feo.ok_or(CoreError::MissingCovariate {
                model: CalibrationMethod::FeoLinear.as_label(),
            })?;
            check_lengths(ratios.len(), feo.len(), "FeO covariates")?;

            let report = levenberg_marquardt(
                &[FEO_LINEAR_DEFAULT_SLOPE, FEO_LINEAR_DEFAULT_INTERCEPT],
                LmOptions::default(),
                |parameters| {
                    ratios
                        .iter()
                        .zip(feo)
                        .zip(water)
                        .map(|((&ratio, &iron), &known)| {
                            feo_linear_predict(ratio, iron, parameters[0], parameters[1]) - known
                        })
                        .collect()
                },
            )
            .map_err(|source| fit_failure(method, source))?;

            Ok(WaterModel::FeoLinear {
                slope: report.parameters[0],
                intercept: report.parameters[1],
            })
        }
    }
}

/// Apply a fitted or default model to a batch of ratios, one estimate per
/// sample. The model variant must match the requested method.
pub fn predict_water(
    model: &WaterModel,
    method: CalibrationMethod,
    ratios: &[f64],
    feo: Option<&[f64]>,
) -> CoreResult<Vec<f64>> {
    if model.method() != method {
        return Err(CoreError::InvalidModel {
            fitted: model.method().as_label(),
            requested: method.as_label(),
        });
    }

    match *model {
        WaterModel::Saturation { a } => Ok(ratios
            .iter()
            .map(|&ratio| saturation_predict(ratio, a))
            .collect()),
        WaterModel::FeoLinear { slope, intercept } => {
            let feo = feo.ok_or(CoreError::MissingCovariate {
                model: CalibrationMethod::FeoLinear.as_label(),
            })?;
            check_lengths(ratios.len(), feo.len(), "FeO covariates")?;

            Ok(ratios
                .iter()
                .zip(feo)
                .map(|(&ratio, &iron)| feo_linear_predict(ratio, iron, slope, intercept))
                .collect())
        }
    }
}

fn check_lengths(ratios: usize, other: usize, label: &str) -> CoreResult<()> {
    if ratios != other {
        return Err(CoreError::Config {
            detail: format!("{ratios} ratios but {other} {label}"),
        });
    }
    Ok(())
}

fn fit_failure(method: CalibrationMethod, source: LeastSquaresError) -> CoreError {
    match source {
        LeastSquaresError::Underdetermined {
            residuals,
            parameters,
        } => CoreError::UnderdeterminedFit {
            rows: residuals,
            parameters,
        },
        other => CoreError::Convergence {
            context: format!("fitting the '{}' calibration model", method.as_label()),
            source: other.into(),
        },
    }
}
