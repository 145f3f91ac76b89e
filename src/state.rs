use anyhow::{bail, Context, Result};
use log::{info, warn};

use crate::config::SnrWindow;
use crate::data::filter::default_selection;
use crate::data::{SpectrumData, SpectrumMetadata};
use crate::processing::CombinationResult;
use crate::services::{SpectrumCombiner, SpectrumSource, SpectrumStore};

// ---------------------------------------------------------------------------
// Catalog state
// ---------------------------------------------------------------------------

/// Outcome of a bulk SNR measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnrSummary {
    /// Spectra that got a measured value.
    pub updated: usize,
    /// Cached spectra for which the measurement was unavailable.
    pub unavailable: usize,
}

/// Catalogue records, their materialised spectra and combination bookkeeping,
/// independent of any presentation.
pub struct Catalog<S> {
    /// Ordered catalogue records (derived products are appended).
    pub records: Vec<SpectrumMetadata>,

    pub store: SpectrumStore<S>,

    pub combiner: SpectrumCombiner,

    /// Window used to measure SNR on newly materialised spectra.
    pub snr_window: Option<SnrWindow>,
}

impl<S: SpectrumSource> Catalog<S> {
    pub fn new(records: Vec<SpectrumMetadata>, source: S, combiner: SpectrumCombiner) -> Self {
        Self {
            records,
            store: SpectrumStore::new(source),
            combiner,
            snr_window: None,
        }
    }

    /// Tick or untick a record.  Consumed records cannot be changed; returns
    /// whether the change was applied.
    pub fn set_selected(&mut self, index: usize, selected: bool) -> bool {
        match self.records.get_mut(index) {
            Some(meta) if !meta.used_in_combination => {
                meta.selected = selected;
                true
            }
            _ => false,
        }
    }

    /// Indices of the records in the default selection.
    pub fn selected_indices(&self) -> Vec<usize> {
        default_selection(&self.records)
    }

    /// Materialise the spectra of the given records in ascending wavelength
    /// order, measuring SNR on each when a window is configured.
    pub fn materialise(&mut self, indices: &[usize]) -> Result<Vec<SpectrumData>> {
        let mut spectra = Vec::with_capacity(indices.len());
        for &i in indices {
            let meta = self
                .records
                .get(i)
                .with_context(|| format!("no catalogue record at index {i}"))?
                .clone();
            let mut spectrum = self.store.get(&meta)?.sorted();
            if let Some(window) = self.snr_window {
                let snr = spectrum.measure_snr(window);
                self.records[i].snr_measured = snr;
                spectrum.metadata.snr_measured = snr;
                if let Some(cached) = self.store.cached_mut(&meta.obs_id) {
                    cached.metadata.snr_measured = snr;
                }
            }
            spectra.push(spectrum);
        }
        Ok(spectra)
    }

    /// Combine the current default selection (at least two spectra).
    pub fn combine_selected(&mut self, rest_frame: bool) -> Result<(SpectrumData, CombinationResult)> {
        let indices = self.selected_indices();
        if indices.len() < 2 {
            bail!("select at least two spectra to combine (have {})", indices.len());
        }
        let sources = self.materialise(&indices)?;
        let (combined, result) = self.combiner.combine(&sources, rest_frame)?;
        let combined = self.register_combination(combined, &sources);
        Ok((combined, result))
    }

    /// Record a combined product: measure its SNR if a window is set, mark
    /// every non-derived source as consumed, cache it and append its record.
    pub fn register_combination(&mut self, mut combined: SpectrumData, sources: &[SpectrumData]) -> SpectrumData {
        if let Some(window) = self.snr_window {
            combined.metadata.snr_measured = combined.measure_snr(window);
        }
        for src in sources {
            if src.metadata.is_combined_product {
                continue;
            }
            if let Some(meta) = self
                .records
                .iter_mut()
                .find(|m| m.obs_id == src.metadata.obs_id)
            {
                meta.used_in_combination = true;
                meta.selected = false;
            }
        }
        info!(
            "registered '{}' ({} sources consumed)",
            combined.metadata.obs_id,
            sources.iter().filter(|s| !s.metadata.is_combined_product).count()
        );
        self.store.store(combined.clone());
        self.records.push(combined.metadata.clone());
        combined
    }

    /// Measure SNR in `window` for every spectrum already in the store.
    pub fn measure_all(&mut self, window: SnrWindow) -> SnrSummary {
        let mut summary = SnrSummary::default();
        for meta in &mut self.records {
            let Some(cached) = self.store.cached(meta) else {
                continue;
            };
            let snr = cached.measure_snr(window);
            meta.snr_measured = snr;
            if snr.is_some() {
                summary.updated += 1;
            } else {
                summary.unavailable += 1;
            }
        }
        if summary.updated == 0 && summary.unavailable > 0 {
            warn!("flux uncertainties not available; unable to measure SNR");
        }
        summary
    }
}
