pub mod baseline;
pub mod correction;

pub use baseline::{
    line_baseline, polynomial_baseline, spline_baseline, BaselineFit, HIGH_ANCHOR_WINDOWS,
    LOW_ANCHOR_WINDOWS, SPLIT_SHIFT,
};
pub use correction::{long_correction, CorrectionError};

use crate::domain::{
    BaselineMethod, CoreError, CoreResult, Delimiter, ExecutionMode, ParamSeq, Roi, SampleRecord,
    SampleTable,
};
use crate::numerics::{canonical_grid, resample_linear, trapezoid_between, DenseMatrix};
use crate::table::read_spectrum;
use rayon::prelude::*;
use std::path::Path;
use tracing::debug;

pub const SILICATE_WINDOW: Roi = Roi {
    low: 150.0,
    high: 1250.0,
};
pub const WATER_WINDOW: Roi = Roi {
    low: 3100.0,
    high: 3750.0,
};

pub const DEFAULT_TEMPERATURE_C: f64 = 23.0;
pub const DEFAULT_LASER_NM: f64 = 514.532;
pub const DEFAULT_SPLINE_SMOOTHING: f64 = 0.001;
pub const DEFAULT_POLYNOMIAL_ORDER: usize = 3;

/// Areas this small make the band ratio meaningless; treat as a data-quality
/// failure instead of letting the division blow up.
pub const MIN_BAND_AREA: f64 = 1.0e-6;

/// Baseline strategy together with its per-batch or per-sample parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum BaselineSpec {
    Spline { smoothing: ParamSeq<f64> },
    Polynomial { order: ParamSeq<usize> },
}

impl BaselineSpec {
    pub fn method(&self) -> BaselineMethod {
        match self {
            Self::Spline { .. } => BaselineMethod::Spline,
            Self::Polynomial { .. } => BaselineMethod::Polynomial,
        }
    }

    fn expected_len(&self) -> Option<usize> {
        match self {
            Self::Spline { smoothing } => smoothing.expected_len(),
            Self::Polynomial { order } => order.expected_len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReductionConfig {
    pub baseline: BaselineSpec,
    pub delimiter: Delimiter,
    pub laser_nm: f64,
    pub temperature_c: f64,
    pub execution: ExecutionMode,
}

impl ReductionConfig {
    pub fn new(baseline: BaselineSpec) -> Self {
        Self {
            baseline,
            delimiter: Delimiter::default(),
            laser_nm: DEFAULT_LASER_NM,
            temperature_c: DEFAULT_TEMPERATURE_C,
            execution: ExecutionMode::default(),
        }
    }
}

/// Columnar results of one batch run: rows follow the canonical grid,
/// columns follow table row order. Never mutated after the run.
#[derive(Debug, Clone)]
pub struct ReductionOutput {
    pub grid: Vec<f64>,
    pub raw: DenseMatrix,
    pub baseline: DenseMatrix,
    pub corrected: DenseMatrix,
    pub silicate_area: Vec<f64>,
    pub water_area: Vec<f64>,
    pub ratio: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BandAreas {
    pub silicate: f64,
    pub water: f64,
    pub ratio: f64,
}

struct SampleReduction {
    raw: Vec<f64>,
    baseline: Vec<f64>,
    corrected: Vec<f64>,
    areas: BandAreas,
}

/// Integrate the silicate and water bands of a baseline-corrected spectrum
/// and form their ratio.
pub fn integrate_bands(grid: &[f64], corrected: &[f64], sample: &str) -> CoreResult<BandAreas> {
    let silicate = trapezoid_between(grid, corrected, SILICATE_WINDOW.low, SILICATE_WINDOW.high);
    let water = trapezoid_between(grid, corrected, WATER_WINDOW.low, WATER_WINDOW.high);

    if silicate.abs() <= MIN_BAND_AREA {
        return Err(CoreError::DivisionByZero {
            quantity: "silicate band area",
            name: sample.to_string(),
            value: silicate,
        });
    }

    Ok(BandAreas {
        silicate,
        water,
        ratio: water / silicate,
    })
}

/// Stateless per-batch orchestrator: resample, correct, subtract a baseline
/// and integrate the two bands for every row of a sample table.
#[derive(Debug, Clone)]
pub struct BatchReducer {
    config: ReductionConfig,
}

impl BatchReducer {
    pub fn new(config: ReductionConfig) -> CoreResult<Self> {
        if !config.laser_nm.is_finite() || config.laser_nm <= 0.0 {
            return Err(CoreError::Config {
                detail: format!(
                    "laser wavelength must be positive, got {} nm",
                    config.laser_nm
                ),
            });
        }
        if !config.temperature_c.is_finite() || config.temperature_c <= -273.15 {
            return Err(CoreError::Config {
                detail: format!(
                    "sample temperature must be above absolute zero, got {} C",
                    config.temperature_c
                ),
            });
        }

        Ok(Self { config })
    }

    pub fn config(&self) -> &ReductionConfig {
        &self.config
    }

    /// Run the whole table. The first per-sample failure aborts the batch;
    /// partial results are never returned.
    pub fn reduce(&self, table: &SampleTable, spectra_dir: &Path) -> CoreResult<ReductionOutput> {
        if let Some(expected) = self.config.baseline.expected_len() {
            if expected != table.len() {
                return Err(CoreError::Config {
                    detail: format!(
                        "per-sample baseline parameter has {expected} entries for {} table rows",
                        table.len()
                    ),
                });
            }
        }

        let grid = canonical_grid();
        let records = table.records();

        let reduced: Vec<SampleReduction> = match self.config.execution {
            ExecutionMode::Sequential => {
                let mut collected = Vec::with_capacity(records.len());
                for (row, record) in records.iter().enumerate() {
                    collected.push(self.reduce_sample(&grid, record, row, spectra_dir)?);
                }
                collected
            }
            ExecutionMode::Parallel => records
                .par_iter()
                .enumerate()
                .map(|(row, record)| self.reduce_sample(&grid, record, row, spectra_dir))
                .collect::<CoreResult<Vec<_>>>()?,
        };

        let mut raw = DenseMatrix::zeros(grid.len(), records.len());
        let mut baseline = DenseMatrix::zeros(grid.len(), records.len());
        let mut corrected = DenseMatrix::zeros(grid.len(), records.len());
        let mut silicate_area = Vec::with_capacity(records.len());
        let mut water_area = Vec::with_capacity(records.len());
        let mut ratio = Vec::with_capacity(records.len());

        for (column, sample) in reduced.into_iter().enumerate() {
            for row in 0..grid.len() {
                raw[(row, column)] = sample.raw[row];
                baseline[(row, column)] = sample.baseline[row];
                corrected[(row, column)] = sample.corrected[row];
            }
            silicate_area.push(sample.areas.silicate);
            water_area.push(sample.areas.water);
            ratio.push(sample.areas.ratio);
        }

        Ok(ReductionOutput {
            grid,
            raw,
            baseline,
            corrected,
            silicate_area,
            water_area,
            ratio,
        })
    }

    fn reduce_sample(
        &self,
        grid: &[f64],
        record: &SampleRecord,
        row: usize,
        spectra_dir: &Path,
    ) -> CoreResult<SampleReduction> {
        let spectrum = read_spectrum(&spectra_dir.join(&record.name), self.config.delimiter)?;
        let resampled = resample_linear(spectrum.shift(), spectrum.intensity(), grid);

        let raw = long_correction(
            grid,
            &resampled,
            self.config.temperature_c,
            self.config.laser_nm,
        )
        .map_err(|CorrectionError::NonPositivePeak { value }| CoreError::DivisionByZero {
            quantity: "normalization peak",
            name: record.name.clone(),
            value,
        })?;

        let fit = match &self.config.baseline {
            BaselineSpec::Spline { smoothing } => {
                spline_baseline(grid, &raw, &record.rois, smoothing.value_for(row)).map_err(
                    |source| CoreError::Convergence {
                        context: format!(
                            "fitting the spline baseline of sample '{}' (row {row})",
                            record.name
                        ),
                        source: source.into(),
                    },
                )?
            }
            BaselineSpec::Polynomial { order } => {
                polynomial_baseline(grid, &raw, order.value_for(row)).map_err(|source| {
                    CoreError::Convergence {
                        context: format!(
                            "fitting the polynomial baseline of sample '{}' (row {row})",
                            record.name
                        ),
                        source: source.into(),
                    }
                })?
            }
        };

        let areas = integrate_bands(grid, &fit.corrected, &record.name)?;
        debug!(
            sample = %record.name,
            row,
            silicate = areas.silicate,
            water = areas.water,
            ratio = areas.ratio,
            "reduced sample"
        );

        Ok(SampleReduction {
            raw,
            baseline: fit.baseline,
            corrected: fit.corrected,
            areas,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{integrate_bands, BandAreas, BaselineSpec, BatchReducer, ReductionConfig};
    use crate::domain::{CoreError, ParamSeq};
    use crate::numerics::canonical_grid;

    #[test]
    fn band_integration_is_linear_and_ratio_is_scale_free() {
        let grid = canonical_grid();
        let corrected: Vec<f64> = grid
            .iter()
            .map(|&shift| {
                let silicate_band = (-((shift - 700.0) / 200.0).powi(2)).exp();
                let water_band = 0.4 * (-((shift - 3500.0) / 120.0).powi(2)).exp();
                silicate_band + water_band
            })
            .collect();
        let doubled: Vec<f64> = corrected.iter().map(|value| 2.0 * value).collect();

        let single = integrate_bands(&grid, &corrected, "synthetic").expect("single");
        let double = integrate_bands(&grid, &doubled, "synthetic").expect("double");

        assert!((double.silicate - 2.0 * single.silicate).abs() < 1.0e-9);
        assert!((double.water - 2.0 * single.water).abs() < 1.0e-9);
        assert!((double.ratio - single.ratio).abs() < 1.0e-12);
        assert!(single.silicate > 0.0 && single.water > 0.0);
    }

    #[test]
    fn near_zero_silicate_area_is_a_data_quality_error() {
        let grid = canonical_grid();
        let corrected = vec![0.0; grid.len()];

        let error = integrate_bands(&grid, &corrected, "flat").expect_err("flat input");
        assert!(matches!(
            error,
            CoreError::DivisionByZero {
                quantity: "silicate band area",
                ..
            }
        ));
    }

    #[test]
    fn known_band_areas_match_the_trapezoid_windows() {
        let grid = canonical_grid();
        // Constant 1 inside both integration windows: areas equal the spanned
        // widths of the strictly-interior grid points.
        let corrected = vec![1.0; grid.len()];
        let BandAreas {
            silicate, water, ..
        } = integrate_bands(&grid, &corrected, "unit").expect("areas");

        // Points strictly inside (150, 1250) run 151..=1249, (3100, 3750) run
        // 3101..=3749 on the unit grid.
        assert!((silicate - 1098.0).abs() < 1.0e-9);
        assert!((water - 648.0).abs() < 1.0e-9);
    }

    #[test]
    fn reducer_rejects_non_positive_laser_wavelength() {
        let config = ReductionConfig {
            laser_nm: 0.0,
            ..ReductionConfig::new(BaselineSpec::Polynomial {
                order: ParamSeq::Uniform(3),
            })
        };
        let error = BatchReducer::new(config).expect_err("bad laser");
        assert!(matches!(error, CoreError::Config { .. }));
    }
}
