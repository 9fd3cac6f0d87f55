use crate::domain::{Roi, RoiSet};
use crate::numerics::{PolyFitError, Polynomial, SmoothingSpline, SplineError};

/// Shift threshold separating the silicate-side and water-side sub-ranges in
/// the piecewise-polynomial strategy.
pub const SPLIT_SHIFT: f64 = 2000.0;

/// Fixed anchor windows for the polynomial strategy, one disjoint pair per
/// sub-range.
pub const LOW_ANCHOR_WINDOWS: [Roi; 2] = [
    Roi {
        low: 0.0,
        high: 200.0,
    },
    Roi {
        low: 1240.0,
        high: 1500.0,
    },
];
pub const HIGH_ANCHOR_WINDOWS: [Roi; 2] = [
    Roi {
        low: 2500.0,
        high: 3100.0,
    },
    Roi {
        low: 3750.0,
        high: 3900.0,
    },
];

#[derive(Debug, Clone, PartialEq)]
pub struct BaselineFit {
    pub baseline: Vec<f64>,
    pub corrected: Vec<f64>,
}

/// Smoothing-spline baseline anchored at the points falling inside the
/// sample's ROI list, spanning the full grid.
pub fn spline_baseline(
    grid: &[f64],
    intensity: &[f64],
    rois: &RoiSet,
    smoothing: f64,
) -> Result<BaselineFit, SplineError> {
    let (anchor_x, anchor_y) = roi_anchor_points(grid, intensity, rois.pairs());
    let spline = SmoothingSpline::fit(&anchor_x, &anchor_y, smoothing)?;

    let baseline: Vec<f64> = grid.iter().map(|&shift| spline.evaluate(shift)).collect();
    Ok(subtract(intensity, baseline))
}

/// Piecewise-polynomial baseline: the grid is split at `SPLIT_SHIFT`, each
/// side fitted through its fixed anchor windows and corrected independently,
/// then re-joined in shift order.
pub fn polynomial_baseline(
    grid: &[f64],
    intensity: &[f64],
    order: usize,
) -> Result<BaselineFit, PolyFitError> {
    let split = grid.partition_point(|&shift| shift < SPLIT_SHIFT);
    let (low_grid, high_grid) = grid.split_at(split);
    let (low_intensity, high_intensity) = intensity.split_at(split);

    let low = windowed_polynomial(low_grid, low_intensity, &LOW_ANCHOR_WINDOWS, order)?;
    let high = windowed_polynomial(high_grid, high_intensity, &HIGH_ANCHOR_WINDOWS, order)?;

    let mut baseline = low.baseline;
    baseline.extend(high.baseline);
    let mut corrected = low.corrected;
    corrected.extend(high.corrected);

    Ok(BaselineFit {
        baseline,
        corrected,
    })
}

/// Straight-line baseline anchored at two windows, used on native (not
/// resampled) axes by the external-calibration path.
pub fn line_baseline(
    shift: &[f64],
    intensity: &[f64],
    windows: &[Roi; 2],
) -> Result<BaselineFit, PolyFitError> {
    windowed_polynomial(shift, intensity, windows, 1)
}

fn windowed_polynomial(
    shift: &[f64],
    intensity: &[f64],
    windows: &[Roi],
    order: usize,
) -> Result<BaselineFit, PolyFitError> {
    let (anchor_x, anchor_y) = roi_anchor_points(shift, intensity, windows);
    let polynomial = Polynomial::fit(&anchor_x, &anchor_y, order)?;

    let baseline: Vec<f64> = shift
        .iter()
        .map(|&value| polynomial.evaluate(value))
        .collect();
    Ok(subtract(intensity, baseline))
}

fn roi_anchor_points(shift: &[f64], intensity: &[f64], windows: &[Roi]) -> (Vec<f64>, Vec<f64>) {
    let mut anchor_x = Vec::new();
    let mut anchor_y = Vec::new();
    for (index, &value) in shift.iter().enumerate() {
        if windows.iter().any(|window| window.contains(value)) {
            anchor_x.push(value);
            anchor_y.push(intensity[index]);
        }
    }
    (anchor_x, anchor_y)
}

fn subtract(intensity: &[f64], baseline: Vec<f64>) -> BaselineFit {
    let corrected = intensity
        .iter()
        .zip(&baseline)
        .map(|(observed, background)| observed - background)
        .collect();
    BaselineFit {
        baseline,
        corrected,
    }
}

#[cfg(test)]
mod tests {
    use super::{line_baseline, polynomial_baseline, spline_baseline};
    use crate::domain::{Roi, RoiSet};
    use crate::numerics::canonical_grid;

    /// A gaussian band on top of a gentle linear background.
    fn banded_signal(grid: &[f64], band_center: f64, band_width: f64) -> Vec<f64> {
        grid.iter()
            .map(|&shift| {
                let background = 0.02 * shift + 5.0;
                let band = 40.0 * (-((shift - band_center) / band_width).powi(2)).exp();
                background + band
            })
            .collect()
    }

    #[test]
    fn spline_baseline_recovers_a_linear_background() {
        let grid = canonical_grid();
        let intensity = banded_signal(&grid, 950.0, 120.0);
        let rois = RoiSet::new(vec![
            Roi::new(50.0, 150.0),
            Roi::new(1300.0, 1380.0),
            Roi::new(2800.0, 2900.0),
            Roi::new(3700.0, 3780.0),
        ])
        .expect("roi set");

        let fit = spline_baseline(&grid, &intensity, &rois, 0.001).expect("baseline");
        assert_eq!(fit.baseline.len(), grid.len());
        assert_eq!(fit.corrected.len(), grid.len());

        // Inside an anchor window the background is band-free, so the
        // corrected signal should be close to zero there.
        let index = grid.iter().position(|&shift| shift == 150.0).expect("grid point");
        assert!(
            fit.corrected[index].abs() < 0.5,
            "corrected anchor region should be near zero, got {}",
            fit.corrected[index]
        );

        // The band itself must survive subtraction.
        let band_index = grid.iter().position(|&shift| shift == 950.0).expect("grid point");
        assert!(fit.corrected[band_index] > 20.0);
    }

    #[test]
    fn polynomial_baseline_joins_both_sub_ranges_in_order() {
        let grid = canonical_grid();
        let intensity = banded_signal(&grid, 3400.0, 150.0);

        let fit = polynomial_baseline(&grid, &intensity, 3).expect("baseline");
        assert_eq!(fit.baseline.len(), grid.len());
        assert_eq!(fit.corrected.len(), grid.len());

        // Low sub-range holds no band here; its correction should flatten the
        // background almost completely.
        let low_index = grid.iter().position(|&shift| shift == 700.0).expect("grid point");
        assert!(fit.corrected[low_index].abs() < 1.0);

        let band_index = grid.iter().position(|&shift| shift == 3400.0).expect("grid point");
        assert!(fit.corrected[band_index] > 20.0);
    }

    #[test]
    fn line_baseline_removes_a_straight_background_exactly() {
        let shift: Vec<f64> = (2900..3801).map(|value| value as f64).collect();
        let intensity: Vec<f64> = shift.iter().map(|&value| 0.5 * value - 100.0).collect();
        let windows = [Roi::new(2900.0, 3100.0), Roi::new(3700.0, 3800.0)];

        let fit = line_baseline(&shift, &intensity, &windows).expect("baseline");
        for (index, value) in fit.corrected.iter().enumerate() {
            assert!(
                value.abs() < 1.0e-8,
                "corrected[{index}] = {value} should be zero for a straight background"
            );
        }
    }

    #[test]
    fn baseline_strategies_are_pure_functions_of_their_inputs() {
        let grid = canonical_grid();
        let intensity = banded_signal(&grid, 950.0, 120.0);

        let first = polynomial_baseline(&grid, &intensity, 2).expect("first");
        let second = polynomial_baseline(&grid, &intensity, 2).expect("second");
        assert_eq!(first, second);
    }
}
