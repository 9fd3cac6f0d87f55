const PLANCK_J_S: f64 = 6.62607015e-34;
const BOLTZMANN_J_PER_K: f64 = 1.380649e-23;
const LIGHT_SPEED_CM_PER_S: f64 = 2.99792458e10;
const CELSIUS_OFFSET_K: f64 = 273.15;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CorrectionError {
    #[error("peak normalization requires a positive finite maximum, got {value}")]
    NonPositivePeak { value: f64 },
}

/// Long-form temperature and excitation-line correction with peak
/// normalization.
///
/// Removes the frequency- and temperature-dependent scattering efficiency
/// factor: each intensity is scaled by `nu0^3 * nu / (nu0 - nu)^4` times the
/// Bose occupation term `1 - exp(-h c nu / k T)`, where `nu0` is the laser
/// line in wavenumbers. The shift axis passes through unchanged; the output
/// is rescaled so its maximum is 1, keeping band ratios comparable across
/// acquisition conditions.
pub fn long_correction(
    shift: &[f64],
    intensity: &[f64],
    temperature_c: f64,
    laser_nm: f64,
) -> Result<Vec<f64>, CorrectionError> {
    debug_assert_eq!(shift.len(), intensity.len());

    let laser_wavenumber = 1.0e7 / laser_nm;
    let temperature_k = temperature_c + CELSIUS_OFFSET_K;
    let thermal_scale =
        PLANCK_J_S * LIGHT_SPEED_CM_PER_S / (BOLTZMANN_J_PER_K * temperature_k);

    let mut corrected: Vec<f64> = shift
        .iter()
        .zip(intensity)
        .map(|(&nu, &observed)| {
            let frequency_factor =
                laser_wavenumber.powi(3) * nu / (laser_wavenumber - nu).powi(4);
            let occupation = 1.0 - (-thermal_scale * nu).exp();
            observed * frequency_factor * occupation
        })
        .collect();

    let peak = corrected.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !peak.is_finite() || peak <= 0.0 {
        return Err(CorrectionError::NonPositivePeak { value: peak });
    }

    for value in &mut corrected {
        *value /= peak;
    }

    Ok(corrected)
}

#[cfg(test)]
mod tests {
    use super::{long_correction, CorrectionError};

    fn synthetic_shift() -> Vec<f64> {
        (0..200).map(|index| 100.0 + 18.0 * index as f64).collect()
    }

    #[test]
    fn output_peak_is_normalized_to_one() {
        let shift = synthetic_shift();
        let intensity: Vec<f64> = shift
            .iter()
            .map(|&nu| 50.0 + (-((nu - 900.0) / 250.0).powi(2)).exp() * 800.0)
            .collect();

        let corrected = long_correction(&shift, &intensity, 23.0, 514.532).expect("correction");
        assert_eq!(corrected.len(), shift.len());

        let peak = corrected.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert!((peak - 1.0).abs() < 1.0e-12);
    }

    #[test]
    fn correction_is_scale_invariant_after_normalization() {
        let shift = synthetic_shift();
        let intensity: Vec<f64> = shift.iter().map(|&nu| 10.0 + nu * 0.01).collect();
        let scaled: Vec<f64> = intensity.iter().map(|value| value * 37.5).collect();

        let reference = long_correction(&shift, &intensity, 23.0, 514.532).expect("reference");
        let rescaled = long_correction(&shift, &scaled, 23.0, 514.532).expect("scaled");

        for (index, value) in rescaled.iter().enumerate() {
            assert!(
                (value - reference[index]).abs() < 1.0e-12,
                "point {index} differs after rescaling"
            );
        }
    }

    #[test]
    fn hotter_samples_are_attenuated_more_at_low_shift() {
        // The Bose occupation term moves furthest from 1 at low wavenumber and
        // high temperature, so ambient vs hot normalized profiles must differ
        // most in the low-shift region.
        let shift = synthetic_shift();
        let intensity = vec![100.0; shift.len()];

        let ambient = long_correction(&shift, &intensity, 23.0, 514.532).expect("ambient");
        let hot = long_correction(&shift, &intensity, 600.0, 514.532).expect("hot");

        let low_shift_gap = (ambient[0] - hot[0]).abs();
        let high_shift_gap = (ambient[shift.len() - 1] - hot[shift.len() - 1]).abs();
        assert!(low_shift_gap > high_shift_gap);
    }

    #[test]
    fn all_zero_intensity_cannot_be_normalized() {
        let shift = [100.0, 200.0, 300.0];
        let error =
            long_correction(&shift, &[0.0, 0.0, 0.0], 23.0, 514.532).expect_err("zero input");
        assert!(matches!(error, CorrectionError::NonPositivePeak { .. }));
    }
}
