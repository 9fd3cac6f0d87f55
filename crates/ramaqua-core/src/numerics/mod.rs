pub mod leastsq;
pub mod linalg;
pub mod polyfit;
pub mod resample;
pub mod spline;

pub use leastsq::{levenberg_marquardt, FitReport, LeastSquaresError, LmOptions};
pub use linalg::{lu_factorize, lu_solve, LuDecomposition, LuError};
pub use polyfit::{PolyFitError, Polynomial};
pub use resample::resample_linear;
pub use spline::{SmoothingSpline, SplineError};

use faer::Mat;

pub type DenseMatrix = Mat<f64>;

pub const LOW_GRID_START: f64 = 50.0;
pub const LOW_GRID_END: f64 = 1400.0;
pub const HIGH_GRID_START: f64 = 2800.0;
pub const HIGH_GRID_END: f64 = 3800.0;
pub const GRID_STEP: f64 = 1.0;

/// Shared frequency axis for a whole reduction batch: the union of the
/// silicate-side and water-side ranges on a unit step, identical for every
/// sample so results can be stored column-wise.
pub fn canonical_grid() -> Vec<f64> {
    let mut grid = unit_range(LOW_GRID_START, LOW_GRID_END);
    grid.extend(unit_range(HIGH_GRID_START, HIGH_GRID_END));
    grid
}

fn unit_range(start: f64, end: f64) -> Vec<f64> {
    let count = ((end - start) / GRID_STEP) as usize;
    (0..count)
        .map(|index| start + GRID_STEP * index as f64)
        .collect()
}

pub fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    let mut area = 0.0;
    for index in 1..x.len() {
        area += 0.5 * (x[index] - x[index - 1]) * (y[index] + y[index - 1]);
    }
    area
}

/// Trapezoidal area restricted to grid points strictly inside (low, high),
/// matching the open-interval window masks used by the band definitions.
pub fn trapezoid_between(x: &[f64], y: &[f64], low: f64, high: f64) -> f64 {
    debug_assert_eq!(x.len(), y.len());
    let mut windowed_x = Vec::new();
    let mut windowed_y = Vec::new();
    for (index, &shift) in x.iter().enumerate() {
        if shift > low && shift < high {
            windowed_x.push(shift);
            windowed_y.push(y[index]);
        }
    }
    trapezoid(&windowed_x, &windowed_y)
}

#[cfg(test)]
mod tests {
    use super::{
        canonical_grid, trapezoid, trapezoid_between, GRID_STEP, HIGH_GRID_END, HIGH_GRID_START,
        LOW_GRID_END, LOW_GRID_START,
    };

    #[test]
    fn canonical_grid_is_the_union_of_both_ranges() {
        let grid = canonical_grid();
        let low_count = ((LOW_GRID_END - LOW_GRID_START) / GRID_STEP) as usize;
        let high_count = ((HIGH_GRID_END - HIGH_GRID_START) / GRID_STEP) as usize;

        assert_eq!(grid.len(), low_count + high_count);
        assert_eq!(grid[0], LOW_GRID_START);
        assert_eq!(grid[low_count - 1], LOW_GRID_END - GRID_STEP);
        assert_eq!(grid[low_count], HIGH_GRID_START);
        assert_eq!(grid[grid.len() - 1], HIGH_GRID_END - GRID_STEP);
        assert!(grid.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn trapezoid_matches_analytic_linear_integral() {
        let x: Vec<f64> = (0..=100).map(|index| index as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|&value| 2.0 * value).collect();

        let area = trapezoid(&x, &y);
        assert!((area - 100.0).abs() < 1.0e-9);
    }

    #[test]
    fn trapezoid_between_uses_an_open_window() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0];
        let y = [1.0, 1.0, 1.0, 1.0, 1.0];

        // Only x = 1, 2, 3 fall strictly inside (0, 4).
        let area = trapezoid_between(&x, &y, 0.0, 4.0);
        assert!((area - 2.0).abs() < 1.0e-12);
    }

    #[test]
    fn trapezoid_between_is_linear_in_intensity() {
        let x: Vec<f64> = (0..50).map(|index| index as f64).collect();
        let y: Vec<f64> = x.iter().map(|&value| (value * 0.3).sin() + 2.0).collect();
        let doubled: Vec<f64> = y.iter().map(|&value| 2.0 * value).collect();

        let single = trapezoid_between(&x, &y, 5.0, 40.0);
        let double = trapezoid_between(&x, &doubled, 5.0, 40.0);
        assert!((double - 2.0 * single).abs() < 1.0e-9);
    }
}
