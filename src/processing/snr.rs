use crate::config::SnrWindow;
use crate::error::{SpectrumError, SpectrumResult};

use super::stats::nan_median;

/// Median `|flux / uncertainty|` over the samples inside `window`.
///
/// `Ok(None)` ("unavailable") when there are no uncertainties, nothing
/// falls inside the window, or no sample in it has finite flux, finite
/// strictly positive uncertainty and non-zero flux. Arrays that do not all
/// match `wavelength` in length are rejected.
pub fn measure_snr(
    wavelength: &[f64],
    flux: &[f64],
    flux_uncertainty: Option<&[f64]>,
    window: SnrWindow,
) -> SpectrumResult<Option<f64>> {
    check_length("flux", wavelength, flux)?;
    let Some(uncertainty) = flux_uncertainty else {
        return Ok(None);
    };
    check_length("flux uncertainty", wavelength, uncertainty)?;
    if wavelength.is_empty() {
        return Ok(None);
    }

    let mut in_window = 0usize;
    let ratios: Vec<f64> = wavelength
        .iter()
        .zip(flux)
        .zip(uncertainty)
        .filter(|((w, _), _)| window.contains(**w))
        .inspect(|_| in_window += 1)
        .filter(|((_, f), e)| f.is_finite() && e.is_finite() && **e > 0.0 && **f != 0.0)
        .map(|((_, f), e)| (f / e).abs())
        .collect();

    if in_window == 0 || ratios.is_empty() {
        return Ok(None);
    }
    let value = nan_median(&ratios);
    Ok(value.is_finite().then_some(value))
}

fn check_length(what: &'static str, wavelength: &[f64], values: &[f64]) -> SpectrumResult<()> {
    if values.len() != wavelength.len() {
        return Err(SpectrumError::LengthMismatch {
            what,
            expected: wavelength.len(),
            found: values.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_uncertainty_is_unavailable() {
        let w = [1.0, 2.0, 3.0];
        let f = [1.0, 2.0, 3.0];
        assert_eq!(measure_snr(&w, &f, None, SnrWindow::new(0.0, 10.0)), Ok(None));
    }

    #[test]
    fn empty_spectrum_is_unavailable() {
        assert_eq!(measure_snr(&[], &[], Some(&[][..]), SnrWindow::new(0.0, 1.0)), Ok(None));
    }

    #[test]
    fn window_outside_range_is_unavailable() {
        let w = [1.0, 2.0, 3.0];
        let f = [1.0, 2.0, 3.0];
        let e = [0.1, 0.1, 0.1];
        assert_eq!(measure_snr(&w, &f, Some(&e[..]), SnrWindow::new(4.0, 5.0)), Ok(None));
    }

    #[test]
    fn median_over_valid_samples_in_closed_window() {
        let w = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let f = [9.0, 1.0, -2.0, 0.0, 3.0, 9.0];
        let e = [0.1, 0.1, 0.1, 0.1, 0.1, 0.1];
        // In window [2, 5]: 1, -2, 0 (dropped), 3 -> ratios 10, 20, 30.
        let snr = measure_snr(&w, &f, Some(&e[..]), SnrWindow::new(2.0, 5.0)).unwrap().unwrap();
        assert!((snr - 20.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_uncertainties_are_skipped() {
        let w = [1.0, 2.0, 3.0];
        let f = [1.0, 1.0, 1.0];
        let e = [0.0, f64::NAN, -0.5];
        assert_eq!(measure_snr(&w, &f, Some(&e[..]), SnrWindow::new(0.0, 5.0)), Ok(None));
    }

    #[test]
    fn short_flux_is_rejected() {
        let w = [1.0, 2.0, 3.0, 4.0];
        let e = [0.1; 4];
        assert_eq!(
            measure_snr(&w, &[1.0, 2.0], Some(&e[..]), SnrWindow::new(0.0, 10.0)),
            Err(SpectrumError::LengthMismatch { what: "flux", expected: 4, found: 2 })
        );
    }

    #[test]
    fn short_uncertainty_is_rejected() {
        let w = [1.0, 2.0, 3.0, 4.0];
        let f = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(
            measure_snr(&w, &f, Some(&[0.1, 0.1][..]), SnrWindow::new(0.0, 10.0)),
            Err(SpectrumError::LengthMismatch { what: "flux uncertainty", expected: 4, found: 2 })
        );
    }

    #[test]
    fn mismatched_flux_fails_even_without_uncertainty() {
        assert!(measure_snr(&[1.0, 2.0], &[1.0], None, SnrWindow::new(0.0, 10.0)).is_err());
    }
}
