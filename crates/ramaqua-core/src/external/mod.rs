use crate::domain::{CoreError, CoreResult, Delimiter, Roi, SampleTable, Spectrum};
use crate::numerics::trapezoid_between;
use crate::reduction::{line_baseline, MIN_BAND_AREA};
use crate::table::read_spectrum;
use std::path::Path;
use tracing::debug;

/// Straight-line baseline anchors flanking the water peak.
pub const DEFAULT_BASELINE_WINDOWS: [Roi; 2] = [
    Roi {
        low: 2900.0,
        high: 3100.0,
    },
    Roi {
        low: 3700.0,
        high: 3800.0,
    },
];

/// Water-peak integration bounds.
pub const DEFAULT_INTEGRATION_WINDOW: Roi = Roi {
    low: 3200.0,
    high: 3750.0,
};

const PREDICTION_DECIMALS: i32 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct ExternalConfig {
    pub baseline_windows: [Roi; 2],
    pub integration_window: Roi,
    pub delimiter: Delimiter,
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self {
            baseline_windows: DEFAULT_BASELINE_WINDOWS,
            integration_window: DEFAULT_INTEGRATION_WINDOW,
            delimiter: Delimiter::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExternalOutput {
    pub water_predicted: Vec<f64>,
    pub sample_area: Vec<f64>,
    pub reference_area: Vec<f64>,
}

/// Estimate water contents by direct proportionality against each sample's
/// reference spectrum of known water content. No model fitting; both spectra
/// keep their native shift axes.
pub fn external_calibration(
    table: &SampleTable,
    spectra_dir: &Path,
    reference_dir: &Path,
    config: &ExternalConfig,
) -> CoreResult<ExternalOutput> {
    let mut water_predicted = Vec::with_capacity(table.len());
    let mut sample_area = Vec::with_capacity(table.len());
    let mut reference_area = Vec::with_capacity(table.len());

    for (row, record) in table.records().iter().enumerate() {
        let reference = record
            .reference
            .as_ref()
            .ok_or_else(|| CoreError::MissingReference {
                name: record.name.clone(),
                row,
            })?;

        let sample_spectrum =
            read_spectrum(&spectra_dir.join(&record.name), config.delimiter)?;
        let reference_spectrum =
            read_spectrum(&reference_dir.join(&reference.file), config.delimiter)?;

        let area = water_peak_area(&record.name, row, &sample_spectrum, config)?;
        let area_ref = water_peak_area(&reference.file, row, &reference_spectrum, config)?;
        if area_ref.abs() <= MIN_BAND_AREA {
            return Err(CoreError::DivisionByZero {
                quantity: "reference water-peak area",
                name: reference.file.clone(),
                value: area_ref,
            });
        }

        let water = round_to_decimals(reference.water_wt * area / area_ref);
        debug!(
            sample = %record.name,
            reference = %reference.file,
            area,
            area_ref,
            water,
            "external calibration"
        );

        water_predicted.push(water);
        sample_area.push(area);
        reference_area.push(area_ref);
    }

    Ok(ExternalOutput {
        water_predicted,
        sample_area,
        reference_area,
    })
}

fn water_peak_area(
    name: &str,
    row: usize,
    spectrum: &Spectrum,
    config: &ExternalConfig,
) -> CoreResult<f64> {
    let fit = line_baseline(
        spectrum.shift(),
        spectrum.intensity(),
        &config.baseline_windows,
    )
    .map_err(|source| CoreError::Convergence {
        context: format!("fitting the straight-line baseline of '{name}' (row {row})"),
        source: source.into(),
    })?;

    Ok(trapezoid_between(
        spectrum.shift(),
        &fit.corrected,
        config.integration_window.low,
        config.integration_window.high,
    ))
}

fn round_to_decimals(value: f64) -> f64 {
    let scale = 10f64.powi(PREDICTION_DECIMALS);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::{external_calibration, ExternalConfig};
    use crate::domain::{
        CoreError, ReferenceEntry, Roi, RoiSet, SampleRecord, SampleTable,
    };
    use std::fmt::Write as _;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn default_rois() -> RoiSet {
        RoiSet::new(vec![Roi::new(2900.0, 3100.0), Roi::new(3700.0, 3800.0)])
            .expect("roi set")
    }

    /// Gaussian water peak of the given amplitude over a linear background,
    /// written as a tab-delimited spectrum file.
    fn write_peak_spectrum(dir: &Path, file: &str, amplitude: f64) {
        let mut content = String::from("shift\tintensity\n");
        for step in 0..=1000 {
            let shift = 2800.0 + step as f64;
            let background = 0.01 * shift + 2.0;
            let peak = amplitude * (-((shift - 3450.0) / 100.0).powi(2)).exp();
            writeln!(content, "{shift}\t{}", background + peak).expect("format");
        }
        fs::write(dir.join(file), content).expect("write spectrum");
    }

    fn record(name: &str, reference: Option<ReferenceEntry>) -> SampleRecord {
        SampleRecord {
            name: name.to_string(),
            water_wt: 0.0,
            feo_wt: 0.0,
            rois: default_rois(),
            reference,
        }
    }

    #[test]
    fn cross_multiplication_scales_reference_water_by_area_ratio() {
        let dir = TempDir::new().expect("tempdir");
        write_peak_spectrum(dir.path(), "sample.txt", 60.0);
        write_peak_spectrum(dir.path(), "standard.txt", 40.0);

        let table = SampleTable::new(vec![record(
            "sample.txt",
            Some(ReferenceEntry {
                file: "standard.txt".to_string(),
                water_wt: 3.0,
            }),
        )]);

        let output = external_calibration(
            &table,
            dir.path(),
            dir.path(),
            &ExternalConfig::default(),
        )
        .expect("external calibration");

        // Identical peak shapes, amplitudes 60 vs 40: area ratio 1.5, so the
        // estimate is 3.0 * 1.5 = 4.5 wt% after rounding.
        assert_eq!(output.water_predicted.len(), 1);
        assert!((output.water_predicted[0] - 4.5).abs() < 1.0e-9);
        assert!(output.sample_area[0] > output.reference_area[0]);
    }

    #[test]
    fn samples_without_a_reference_entry_fail_up_front() {
        let dir = TempDir::new().expect("tempdir");
        write_peak_spectrum(dir.path(), "sample.txt", 60.0);

        let table = SampleTable::new(vec![record("sample.txt", None)]);
        let error = external_calibration(
            &table,
            dir.path(),
            dir.path(),
            &ExternalConfig::default(),
        )
        .expect_err("no reference");

        assert!(matches!(error, CoreError::MissingReference { row: 0, .. }));
    }

    #[test]
    fn flat_reference_spectra_cannot_anchor_the_cross_multiplication() {
        let dir = TempDir::new().expect("tempdir");
        write_peak_spectrum(dir.path(), "sample.txt", 60.0);
        write_peak_spectrum(dir.path(), "flat.txt", 0.0);

        let table = SampleTable::new(vec![record(
            "sample.txt",
            Some(ReferenceEntry {
                file: "flat.txt".to_string(),
                water_wt: 3.0,
            }),
        )]);

        let error = external_calibration(
            &table,
            dir.path(),
            dir.path(),
            &ExternalConfig::default(),
        )
        .expect_err("flat reference");
        assert!(matches!(
            error,
            CoreError::DivisionByZero {
                quantity: "reference water-peak area",
                ..
            }
        ));
    }
}
