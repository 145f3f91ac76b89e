use log::{debug, info};
use serde::Serialize;

use crate::config::ShiftSearchConfig;
use crate::error::{SpectrumError, SpectrumResult};

use super::correlation::estimate_shift_with;
use super::resample::rebin_zero;

// ---------------------------------------------------------------------------
// Sampled spectra
// ---------------------------------------------------------------------------

/// Anything exposing a wavelength axis with one flux value per sample.
pub trait Sampled {
    fn wavelength(&self) -> &[f64];
    fn flux(&self) -> &[f64];
}

impl Sampled for (Vec<f64>, Vec<f64>) {
    fn wavelength(&self) -> &[f64] {
        &self.0
    }
    fn flux(&self) -> &[f64] {
        &self.1
    }
}

impl<T: Sampled + ?Sized> Sampled for &T {
    fn wavelength(&self) -> &[f64] {
        (**self).wavelength()
    }
    fn flux(&self) -> &[f64] {
        (**self).flux()
    }
}

// ---------------------------------------------------------------------------
// Combination
// ---------------------------------------------------------------------------

/// Output of [`combine`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombinationResult {
    /// Copy of the reference spectrum's wavelength axis.
    pub wavelength: Vec<f64>,
    /// Averaged flux on `wavelength`.
    pub flux: Vec<f64>,
    /// Shift applied to each input, in input order.
    pub shifts: Vec<f64>,
    /// Number of inputs whose (shifted) wavelength range covers each point.
    ///
    /// `flux` still averages the zero fill of non-covering inputs; a zero
    /// here marks a point that has no real data behind it.
    pub coverage: Vec<usize>,
}

impl CombinationResult {
    /// Indices of grid points that no input actually covers.
    pub fn gaps(&self) -> Vec<usize> {
        self.coverage
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == 0)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Average `spectra` onto the wavelength grid of `spectra[reference_index]`.
///
/// With `rest_frame` each input is first aligned to the reference using the
/// cross-correlation shift estimator.
pub fn combine<T: Sampled>(
    spectra: &[T],
    reference_index: usize,
    rest_frame: bool,
) -> SpectrumResult<CombinationResult> {
    combine_with(spectra, reference_index, rest_frame, &ShiftSearchConfig::default())
}

pub fn combine_with<T: Sampled>(
    spectra: &[T],
    reference_index: usize,
    rest_frame: bool,
    config: &ShiftSearchConfig,
) -> SpectrumResult<CombinationResult> {
    if spectra.is_empty() {
        return Err(SpectrumError::EmptyInput("spectra to combine"));
    }
    let reference = spectra
        .get(reference_index)
        .ok_or(SpectrumError::ReferenceOutOfRange {
            index: reference_index,
            len: spectra.len(),
        })?;

    let grid = reference.wavelength().to_vec();
    let ref_flux = reference.flux();
    if ref_flux.len() != grid.len() {
        return Err(SpectrumError::LengthMismatch {
            what: "reference flux",
            expected: grid.len(),
            found: ref_flux.len(),
        });
    }

    let mut accum = vec![0.0; grid.len()];
    let mut counts = vec![0usize; grid.len()];
    let mut coverage = vec![0usize; grid.len()];
    let mut shifts = Vec::with_capacity(spectra.len());

    for (i, spectrum) in spectra.iter().enumerate() {
        let wave = spectrum.wavelength();
        let flux = spectrum.flux();
        if wave.len() != flux.len() {
            return Err(SpectrumError::LengthMismatch {
                what: "flux",
                expected: wave.len(),
                found: flux.len(),
            });
        }

        // The reference is its own alignment target.
        let shift = if rest_frame && i != reference_index {
            estimate_shift_with(&grid, ref_flux, wave, flux, config)?
        } else {
            0.0
        };
        let moved: Vec<f64> = wave.iter().map(|w| w - shift).collect();
        let rebinned = rebin_zero(&moved, flux, &grid)?;

        for (k, value) in rebinned.iter().enumerate() {
            if value.is_finite() {
                accum[k] += value;
                counts[k] += 1;
            }
        }
        if let Some((lo, hi)) = finite_range(&moved) {
            for (k, g) in grid.iter().enumerate() {
                if *g >= lo && *g <= hi {
                    coverage[k] += 1;
                }
            }
        }

        debug!("combine: input {i} shifted by {shift:.5}");
        shifts.push(shift);
    }

    let flux: Vec<f64> = accum
        .iter()
        .zip(&counts)
        .map(|(sum, &n)| sum / n.max(1) as f64)
        .collect();

    info!(
        "combined {} spectra onto {} points (reference {reference_index}, rest frame: {rest_frame})",
        spectra.len(),
        grid.len()
    );

    Ok(CombinationResult {
        wavelength: grid,
        flux,
        shifts,
        coverage,
    })
}

fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}
