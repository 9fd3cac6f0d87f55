//! Reduction and calibration of Raman spectra of hydrous glasses.
//!
//! The pipeline resamples raw spectra onto a shared canonical grid, applies
//! the long-form temperature/excitation correction, subtracts a baseline
//! (smoothing spline or piecewise polynomial), integrates the silicate and
//! water bands, and maps the resulting ratio to a water-content estimate
//! through one of two parametric calibration models or an external reference
//! cross-multiplication.

pub mod calibration;
pub mod domain;
pub mod external;
pub mod numerics;
pub mod reduction;
pub mod table;

pub use calibration::{
    feo_linear_predict, fit_model, predict_water, saturation_predict, WaterModel,
    FEO_LINEAR_DEFAULT_INTERCEPT, FEO_LINEAR_DEFAULT_SLOPE, SATURATION_DEFAULT_A,
};
pub use domain::{
    BaselineMethod, CalibrationMethod, CoreError, CoreResult, Delimiter, ExecutionMode, ParamSeq,
    ReferenceEntry, Roi, RoiSet, SampleRecord, SampleTable, Spectrum,
};
pub use external::{external_calibration, ExternalConfig, ExternalOutput};
pub use reduction::{
    integrate_bands, BandAreas, BaselineSpec, BatchReducer, ReductionConfig, ReductionOutput,
    DEFAULT_LASER_NM, DEFAULT_POLYNOMIAL_ORDER, DEFAULT_SPLINE_SMOOTHING, DEFAULT_TEMPERATURE_C,
};
pub use table::read_spectrum;
