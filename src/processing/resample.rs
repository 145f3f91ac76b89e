use std::borrow::Cow;

use crate::error::{SpectrumError, SpectrumResult};

use super::stats::{argsort, is_strictly_increasing};

// ---------------------------------------------------------------------------
// Linear resampling
// ---------------------------------------------------------------------------

/// Re-sample `y(x)` onto `new_x` using linear interpolation.
///
/// * Non-finite `y` values are replaced by `fill_value` before interpolating.
/// * `x` does not need to be sorted; unsorted input is sorted jointly with `y`.
/// * Points of `new_x` outside `[min(x), max(x)]` get exactly `fill_value`.
///
/// Samples whose `x` is not finite cannot be placed on the axis and are
/// dropped.  A NaN in `new_x` produces NaN at that position.
pub fn rebin(x: &[f64], y: &[f64], new_x: &[f64], fill_value: f64) -> SpectrumResult<Vec<f64>> {
    if x.len() != y.len() {
        return Err(SpectrumError::LengthMismatch {
            what: "y",
            expected: x.len(),
            found: y.len(),
        });
    }

    let (xs, ys) = canonical_samples(x, y, fill_value);
    if xs.is_empty() {
        return Err(SpectrumError::EmptyGrid);
    }

    Ok(new_x
        .iter()
        .map(|&q| interpolate(&xs, &ys, q, fill_value))
        .collect())
}

/// [`rebin`] with the default fill value of zero.
pub fn rebin_zero(x: &[f64], y: &[f64], new_x: &[f64]) -> SpectrumResult<Vec<f64>> {
    rebin(x, y, new_x, 0.0)
}

/// Sanitise and order the samples.  Borrows when nothing needs changing.
fn canonical_samples<'a>(
    x: &'a [f64],
    y: &'a [f64],
    fill_value: f64,
) -> (Cow<'a, [f64]>, Cow<'a, [f64]>) {
    let all_finite_x = x.iter().all(|v| v.is_finite());
    let all_finite_y = y.iter().all(|v| v.is_finite());

    if all_finite_x && all_finite_y && is_strictly_increasing(x) {
        return (Cow::Borrowed(x), Cow::Borrowed(y));
    }

    let (mut xs, mut ys): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .filter(|(xv, _)| xv.is_finite())
        .map(|(&xv, &yv)| (xv, if yv.is_finite() { yv } else { fill_value }))
        .unzip();

    if !is_strictly_increasing(&xs) {
        let order = argsort(&xs);
        xs = order.iter().map(|&i| xs[i]).collect();
        ys = order.iter().map(|&i| ys[i]).collect();
    }

    (Cow::Owned(xs), Cow::Owned(ys))
}

/// Evaluate the piecewise-linear curve through `(xs, ys)` at `q`.
/// `xs` must be non-empty and sorted ascending.
fn interpolate(xs: &[f64], ys: &[f64], q: f64, fill_value: f64) -> f64 {
    if q.is_nan() {
        return f64::NAN;
    }
    let last = xs.len() - 1;
    if q < xs[0] || q > xs[last] {
        return fill_value;
    }

    // First sample strictly to the right of q.
    let hi = xs.partition_point(|&v| v <= q);
    if hi == 0 {
        return ys[0];
    }
    if hi > last {
        return ys[last];
    }
    let lo = hi - 1;
    let t = (q - xs[lo]) / (xs[hi] - xs[lo]);
    ys[lo] + t * (ys[hi] - ys[lo])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_grid_reproduces_input() {
        let x = [1.0, 2.0, 3.5, 4.0, 7.25];
        let y = [0.3, -1.2, 5.0, 2.2, 0.0];
        assert_eq!(rebin(&x, &y, &x, 0.0).unwrap(), y.to_vec());
    }

    #[test]
    fn interpolates_between_samples() {
        let out = rebin(&[0.0, 1.0, 2.0], &[0.0, 10.0, 0.0], &[0.5, 1.25], 0.0).unwrap();
        assert!((out[0] - 5.0).abs() < 1e-12);
        assert!((out[1] - 7.5).abs() < 1e-12);
    }

    #[test]
    fn outside_domain_is_fill_value() {
        let out = rebin(&[1.0, 2.0], &[5.0, 6.0], &[0.999, 2.001, -10.0], -1.0).unwrap();
        assert_eq!(out, vec![-1.0, -1.0, -1.0]);
    }

    #[test]
    fn unsorted_input_is_sorted_jointly() {
        let x = [3.0, 1.0, 2.0];
        let y = [30.0, 10.0, 20.0];
        let out = rebin(&x, &y, &[1.5, 2.5], 0.0).unwrap();
        assert!((out[0] - 15.0).abs() < 1e-12);
        assert!((out[1] - 25.0).abs() < 1e-12);
    }

    #[test]
    fn non_finite_flux_is_replaced_by_fill() {
        let out = rebin(&[0.0, 1.0, 2.0], &[2.0, f64::NAN, 2.0], &[0.5, 1.0], 0.0).unwrap();
        assert!((out[0] - 1.0).abs() < 1e-12);
        assert_eq!(out[1], 0.0);
    }

    #[test]
    fn length_mismatch_is_an_error() {
        let err = rebin(&[0.0, 1.0], &[1.0], &[0.5], 0.0).unwrap_err();
        assert!(matches!(err, SpectrumError::LengthMismatch { expected: 2, found: 1, .. }));
    }

    #[test]
    fn empty_grid_is_an_error() {
        assert_eq!(rebin(&[], &[], &[1.0], 0.0), Err(SpectrumError::EmptyGrid));
    }

    #[test]
    fn single_sample_only_matches_itself() {
        let out = rebin(&[2.0], &[7.0], &[2.0, 2.1], 0.0).unwrap();
        assert_eq!(out, vec![7.0, 0.0]);
    }

    #[test]
    fn output_length_follows_new_grid() {
        let out = rebin(&[0.0, 1.0], &[1.0, 1.0], &[], 0.0).unwrap();
        assert!(out.is_empty());
    }
}
