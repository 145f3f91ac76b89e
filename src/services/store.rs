use std::collections::HashMap;

use anyhow::{Context, Result};
use log::debug;

use crate::data::{SpectralDataset, SpectrumData, SpectrumMetadata};

// ---------------------------------------------------------------------------
// Spectrum sources
// ---------------------------------------------------------------------------

/// Something that can materialise the samples for a catalogue record.
pub trait SpectrumSource {
    fn fetch(&self, metadata: &SpectrumMetadata) -> Result<SpectrumData>;
}

/// Serves spectra out of an already loaded dataset, matched by `obs_id`.
pub struct DatasetSource {
    dataset: SpectralDataset,
}

impl DatasetSource {
    pub fn new(dataset: SpectralDataset) -> Self {
        Self { dataset }
    }

    /// Catalogue records of every spectrum in the dataset.
    pub fn records(&self) -> Vec<SpectrumMetadata> {
        self.dataset
            .spectra
            .iter()
            .map(|sp| sp.metadata.clone())
            .collect()
    }
}

impl SpectrumSource for DatasetSource {
    fn fetch(&self, metadata: &SpectrumMetadata) -> Result<SpectrumData> {
        let found = self
            .dataset
            .spectra
            .iter()
            .find(|sp| sp.metadata.obs_id == metadata.obs_id)
            .with_context(|| format!("no spectrum with id '{}'", metadata.obs_id))?;
        Ok(SpectrumData {
            metadata: metadata.clone(),
            ..found.clone()
        })
    }
}

// ---------------------------------------------------------------------------
// SpectrumStore – at most one fetch per identifier
// ---------------------------------------------------------------------------

/// Cache of materialised spectra keyed by `obs_id`.
///
/// `get` fetches from the source only on the first request for an
/// identifier; a failed fetch records nothing so a later call retries.
pub struct SpectrumStore<S> {
    source: S,
    cache: HashMap<String, SpectrumData>,
}

impl<S: SpectrumSource> SpectrumStore<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: HashMap::new(),
        }
    }

    pub fn get(&mut self, metadata: &SpectrumMetadata) -> Result<&SpectrumData> {
        if !self.cache.contains_key(&metadata.obs_id) {
            debug!("store: fetching '{}'", metadata.obs_id);
            let spectrum = self
                .source
                .fetch(metadata)
                .with_context(|| format!("fetching spectrum '{}'", metadata.obs_id))?;
            self.cache.insert(metadata.obs_id.clone(), spectrum);
        } else {
            debug!("store: cache hit for '{}'", metadata.obs_id);
        }
        self.cache
            .get(&metadata.obs_id)
            .with_context(|| format!("spectrum '{}' missing after fetch", metadata.obs_id))
    }

    /// Fetch every record, cloning the cached spectra out in order.
    pub fn bulk_get<'a, I>(&mut self, records: I) -> Result<Vec<SpectrumData>>
    where
        I: IntoIterator<Item = &'a SpectrumMetadata>,
    {
        records
            .into_iter()
            .map(|m| self.get(m).cloned())
            .collect()
    }

    /// Insert or replace a spectrum (used for derived products).
    pub fn store(&mut self, spectrum: SpectrumData) {
        self.cache.insert(spectrum.metadata.obs_id.clone(), spectrum);
    }

    pub fn cached(&self, metadata: &SpectrumMetadata) -> Option<&SpectrumData> {
        self.cache.get(&metadata.obs_id)
    }

    pub fn cached_mut(&mut self, obs_id: &str) -> Option<&mut SpectrumData> {
        self.cache.get_mut(obs_id)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
