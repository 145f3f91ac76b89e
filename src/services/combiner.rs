use log::info;

use crate::config::ShiftSearchConfig;
use crate::data::{SpectrumData, SpectrumMetadata};
use crate::error::{SpectrumError, SpectrumResult};
use crate::processing::{combine_with, CombinationResult};

/// Prefix of every combined product identifier.
pub const COMBINED_PREFIX: &str = "COMBINED-";

/// Builds derived spectra: numeric combination plus derived metadata.
#[derive(Debug, Clone, Default)]
pub struct SpectrumCombiner {
    pub search: ShiftSearchConfig,
    pub reference_index: usize,
}

impl SpectrumCombiner {
    pub fn new(search: ShiftSearchConfig, reference_index: usize) -> Self {
        Self {
            search,
            reference_index,
        }
    }

    /// Combine `spectra` onto the reference grid and describe the product.
    ///
    /// The inputs are not modified; marking them as consumed is the caller's
    /// job (see [`crate::state::Catalog::register_combination`]).
    pub fn combine(
        &self,
        spectra: &[SpectrumData],
        rest_frame: bool,
    ) -> SpectrumResult<(SpectrumData, CombinationResult)> {
        if spectra.is_empty() {
            return Err(SpectrumError::EmptyInput("spectra for combination"));
        }
        let result = combine_with(spectra, self.reference_index, rest_frame, &self.search)?;
        let reference = &spectra[self.reference_index];

        let metadata = derived_metadata(spectra, &reference.metadata);
        info!(
            "created '{}' from {} spectra",
            metadata.obs_id,
            spectra.len()
        );
        let combined = SpectrumData::new(
            metadata,
            result.wavelength.clone(),
            result.flux.clone(),
            None,
        )?;
        Ok((combined, result))
    }
}

/// Metadata of a combined product built from `sources`.
pub fn derived_metadata(sources: &[SpectrumData], reference: &SpectrumMetadata) -> SpectrumMetadata {
    let ids: Vec<&str> = sources.iter().map(|s| s.metadata.obs_id.as_str()).collect();
    let mins: Vec<f64> = sources.iter().filter_map(|s| s.metadata.wvl_min_nm).collect();
    let maxs: Vec<f64> = sources.iter().filter_map(|s| s.metadata.wvl_max_nm).collect();
    let resolutions: Vec<f64> = sources.iter().filter_map(|s| s.metadata.resolution).collect();

    let mut meta = SpectrumMetadata::new(format!("{COMBINED_PREFIX}{}", ids.join("+")));
    meta.target = reference.target.clone();
    meta.instrument = "Combined".to_string();
    meta.wvl_min_nm = mins.iter().copied().reduce(f64::min).or(reference.wvl_min_nm);
    meta.wvl_max_nm = maxs.iter().copied().reduce(f64::max).or(reference.wvl_max_nm);
    meta.resolution = if resolutions.is_empty() {
        reference.resolution
    } else {
        Some(resolutions.iter().sum::<f64>() / resolutions.len() as f64)
    };
    meta.release_date = Some("-".to_string());
    meta.product_type = Some("COMBINED".to_string());
    meta.selected = true;
    meta.is_combined_product = true;
    meta
}
