/// Linear interpolation of `(shift, intensity)` onto `targets`, with linear
/// extrapolation from the edge segments for queries outside the source
/// domain. Extrapolated tails are unconstrained and may be physically
/// meaningless; callers must not integrate over them.
///
/// Preconditions (enforced by `Spectrum::from_columns`): `shift` is strictly
/// increasing with at least 2 points and matches `intensity` in length.
pub fn resample_linear(shift: &[f64], intensity: &[f64], targets: &[f64]) -> Vec<f64> {
    debug_assert!(shift.len() >= 2);
    debug_assert_eq!(shift.len(), intensity.len());

    let last = shift.len() - 1;
    targets
        .iter()
        .map(|&query| {
            let (lower, upper) = if query <= shift[0] {
                (0, 1)
            } else if query >= shift[last] {
                (last - 1, last)
            } else {
                match shift.binary_search_by(|probe| probe.total_cmp(&query)) {
                    Ok(index) => return intensity[index],
                    Err(upper) => (upper - 1, upper),
                }
            };

            let x0 = shift[lower];
            let x1 = shift[upper];
            let fraction = (query - x0) / (x1 - x0);
            intensity[lower] + fraction * (intensity[upper] - intensity[lower])
        })
        .collect()
}
