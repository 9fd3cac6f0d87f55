use super::SpectrumShapeError;
use crate::numerics::{LeastSquaresError, PolyFitError, SplineError};
use std::path::PathBuf;

pub type CoreResult<T> = Result<T, CoreError>;

/// Typed carrier for the underlying solver diagnostics attached to a
/// convergence failure; reported verbatim, never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SolverFailure {
    #[error(transparent)]
    Spline(#[from] SplineError),
    #[error(transparent)]
    Polynomial(#[from] PolyFitError),
    #[error(transparent)]
    LeastSquares(#[from] LeastSquaresError),
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("malformed spectrum '{name}': {source}")]
    MalformedSpectrum {
        name: String,
        #[source]
        source: SpectrumShapeError,
    },
    #[error("unsupported method label '{label}', expected one of: {expected}")]
    UnsupportedMethod {
        label: String,
        expected: &'static str,
    },
    #[error("underdetermined fit: {rows} calibration rows for {parameters} free parameter(s)")]
    UnderdeterminedFit { rows: usize, parameters: usize },
    #[error("solver failed while {context}: {source}")]
    Convergence {
        context: String,
        #[source]
        source: SolverFailure,
    },
    #[error(
        "model mismatch: parameters were fitted for the '{fitted}' form but prediction asked for the '{requested}' form"
    )]
    InvalidModel {
        fitted: &'static str,
        requested: &'static str,
    },
    #[error("the '{model}' form requires FeO covariate values, none were supplied")]
    MissingCovariate { model: &'static str },
    #[error("sample '{name}' (row {row}) has no reference spectrum entry")]
    MissingReference { name: String, row: usize },
    #[error("near-zero {quantity} ({value:e}) for sample '{name}'")]
    DivisionByZero {
        quantity: &'static str,
        name: String,
        value: f64,
    },
    #[error("sample table '{path}': {detail}")]
    Table { path: PathBuf, detail: String },
    #[error("spectrum file '{path}': {detail}")]
    SpectrumFile { path: PathBuf, detail: String },
    #[error("invalid reduction configuration: {detail}")]
    Config { detail: String },
}
