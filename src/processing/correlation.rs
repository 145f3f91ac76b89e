use log::{debug, warn};

use crate::config::ShiftSearchConfig;
use crate::error::{SpectrumError, SpectrumResult};

use super::resample::rebin_zero;
use super::stats::{argmax, argsort, linspace, nan_median};

/// Speed of light in km/s.
pub const SPEED_OF_LIGHT_KMS: f64 = 299_792.458;

/// Reference values within this distance of zero count as "flat".
const FLAT_TOLERANCE: f64 = 1e-8;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Estimate the wavelength offset of `(wave, flux)` relative to the reference.
///
/// Shifting `wave` left by the returned amount best aligns `flux` with
/// `ref_flux`.  Degenerate references (fewer than two points, zero span, flat
/// after continuum removal) yield `0.0`.
pub fn estimate_shift(
    ref_wave: &[f64],
    ref_flux: &[f64],
    wave: &[f64],
    flux: &[f64],
) -> SpectrumResult<f64> {
    estimate_shift_with(ref_wave, ref_flux, wave, flux, &ShiftSearchConfig::default())
}

/// [`estimate_shift`] with an explicit search policy.
pub fn estimate_shift_with(
    ref_wave: &[f64],
    ref_flux: &[f64],
    wave: &[f64],
    flux: &[f64],
    config: &ShiftSearchConfig,
) -> SpectrumResult<f64> {
    check_lengths("reference flux", ref_wave, ref_flux)?;
    check_lengths("flux", wave, flux)?;
    config.validate()?;

    let Some(reference) = Reference::prepare(ref_wave, ref_flux) else {
        return Ok(0.0);
    };
    if wave.is_empty() {
        return Err(SpectrumError::EmptyGrid);
    }

    let window = config.coarse_window(reference.span);
    let coarse = linspace(-window, window, config.coarse_steps);
    let best = reference.best_candidate(&coarse, wave, flux)?;

    let fine_window = window / config.fine_divisor;
    let fine = linspace(best - fine_window, best + fine_window, config.fine_steps);
    let shift = reference.best_candidate(&fine, wave, flux)?;

    debug!("cross-correlation: coarse best {best:.5}, refined {shift:.5} (window {window:.4})");
    Ok(shift)
}

/// Radial velocity (km/s) implied by the wavelength shift, using the median
/// reference wavelength as pivot.  Returns `0.0` for a zero or non-finite pivot.
pub fn estimate_radial_velocity(
    ref_wave: &[f64],
    ref_flux: &[f64],
    wave: &[f64],
    flux: &[f64],
) -> SpectrumResult<f64> {
    estimate_radial_velocity_with(ref_wave, ref_flux, wave, flux, &ShiftSearchConfig::default())
}

pub fn estimate_radial_velocity_with(
    ref_wave: &[f64],
    ref_flux: &[f64],
    wave: &[f64],
    flux: &[f64],
    config: &ShiftSearchConfig,
) -> SpectrumResult<f64> {
    let shift = estimate_shift_with(ref_wave, ref_flux, wave, flux, config)?;
    Ok(shift_to_velocity(shift, nan_median(ref_wave)))
}

/// Convert a wavelength shift into km/s around `pivot`.
pub fn shift_to_velocity(shift: f64, pivot: f64) -> f64 {
    if pivot == 0.0 || !pivot.is_finite() {
        return 0.0;
    }
    SPEED_OF_LIGHT_KMS * (shift / pivot)
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn check_lengths(what: &'static str, wave: &[f64], values: &[f64]) -> SpectrumResult<()> {
    if wave.len() != values.len() {
        return Err(SpectrumError::LengthMismatch {
            what,
            expected: wave.len(),
            found: values.len(),
        });
    }
    Ok(())
}

/// Sorted reference grid with its continuum-subtracted flux.
struct Reference {
    grid: Vec<f64>,
    centered: Vec<f64>,
    span: f64,
}

impl Reference {
    fn prepare(ref_wave: &[f64], ref_flux: &[f64]) -> Option<Self> {
        let order = argsort(ref_wave);
        let grid: Vec<f64> = order.iter().map(|&i| ref_wave[i]).collect();
        let sorted_flux: Vec<f64> = order.iter().map(|&i| ref_flux[i]).collect();

        let span = match (grid.first(), grid.last()) {
            (Some(lo), Some(hi)) if grid.len() > 1 => hi - lo,
            _ => 0.0,
        };
        // Written so a NaN span also bails out.
        if !(span > 0.0) {
            warn!("reference spectrum has no usable wavelength span; shift set to 0");
            return None;
        }

        let continuum = nan_median(&sorted_flux);
        let centered: Vec<f64> = sorted_flux.iter().map(|v| v - continuum).collect();
        let flat = centered
            .iter()
            .filter(|v| v.is_finite())
            .all(|v| v.abs() <= FLAT_TOLERANCE);
        if flat {
            warn!("reference spectrum is flat after continuum removal; shift set to 0");
            return None;
        }

        Some(Self { grid, centered, span })
    }

    /// Cross-correlation at lag `shift`.
    fn score(&self, shift: f64, wave: &[f64], flux: &[f64]) -> SpectrumResult<f64> {
        let moved: Vec<f64> = wave.iter().map(|w| w - shift).collect();
        let mut shifted = rebin_zero(&moved, flux, &self.grid)?;
        let continuum = nan_median(&shifted);
        for v in &mut shifted {
            *v -= continuum;
        }
        Ok(self
            .centered
            .iter()
            .zip(&shifted)
            .map(|(a, b)| a * b)
            .filter(|p| p.is_finite())
            .sum())
    }

    fn best_candidate(&self, candidates: &[f64], wave: &[f64], flux: &[f64]) -> SpectrumResult<f64> {
        let scores = candidates
            .iter()
            .map(|&s| self.score(s, wave, flux))
            .collect::<SpectrumResult<Vec<f64>>>()?;
        Ok(argmax(&scores).map_or(0.0, |i| candidates[i]))
    }
}
