use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::warn;
use serde::Serialize;

use crate::config::SnrWindow;
use crate::error::{SpectrumError, SpectrumResult};
use crate::processing::stats::argsort;
use crate::processing::{measure_snr, Sampled};

// ---------------------------------------------------------------------------
// MetadataValue – a single cell in a metadata column
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata value for columns this crate does not interpret.
/// Using `BTreeMap` / `BTreeSet` downstream so `MetadataValue` must be `Ord`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl Eq for MetadataValue {}

impl PartialOrd for MetadataValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetadataValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use MetadataValue::*;
        fn rank(v: &MetadataValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        match (self, other) {
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v:.4}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Null => write!(f, "<null>"),
        }
    }
}

impl MetadataValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            MetadataValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text form, or `None` for nulls and empty strings.
    pub fn as_text(&self) -> Option<String> {
        match self {
            MetadataValue::Null => None,
            MetadataValue::String(s) if s.is_empty() => None,
            other => Some(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// SpectrumMetadata – descriptive fields of one observation
// ---------------------------------------------------------------------------

/// Catalogue record of one spectrum, including bookkeeping for combinations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectrumMetadata {
    pub obs_id: String,
    pub target: String,
    pub instrument: String,
    pub wvl_min_nm: Option<f64>,
    pub wvl_max_nm: Option<f64>,
    pub resolution: Option<f64>,
    pub snr_reported: Option<f64>,
    pub release_date: Option<String>,
    pub access_url: Option<String>,
    pub product_type: Option<String>,
    pub selected: bool,
    pub snr_measured: Option<f64>,
    /// Consumed by a combination; excluded from the default selection.
    pub used_in_combination: bool,
    /// Synthetic product created by the combiner.
    pub is_combined_product: bool,
    pub is_public: bool,
    pub dp_id: Option<String>,
    pub proposal_id: Option<String>,
    /// Caller-owned columns this crate does not interpret.
    pub extra: BTreeMap<String, MetadataValue>,
}

impl SpectrumMetadata {
    pub fn new(obs_id: impl Into<String>) -> Self {
        Self {
            obs_id: obs_id.into(),
            target: String::new(),
            instrument: String::new(),
            wvl_min_nm: None,
            wvl_max_nm: None,
            resolution: None,
            snr_reported: None,
            release_date: None,
            access_url: None,
            product_type: None,
            selected: true,
            snr_measured: None,
            used_in_combination: false,
            is_combined_product: false,
            is_public: true,
            dp_id: None,
            proposal_id: None,
            extra: BTreeMap::new(),
        }
    }

    /// Table row: target, instrument, range, resolution, reported SNR,
    /// release date, selection mark, measured SNR, dp_id, proposal.
    pub fn display_row(&self) -> [String; 10] {
        let range = match (self.wvl_min_nm, self.wvl_max_nm) {
            (Some(lo), Some(hi)) => format!("{lo:.1} - {hi:.1}"),
            _ => "-".to_string(),
        };
        let res = self
            .resolution
            .map_or_else(|| "-".to_string(), |r| format!("{r:.0}"));
        let snr = self
            .snr_reported
            .map_or_else(|| "-".to_string(), |s| format!("{s:.1}"));
        let snr_meas = self
            .snr_measured
            .map_or_else(String::new, |s| format!("{s:.1}"));
        [
            self.target.clone(),
            self.instrument.clone(),
            range,
            res,
            snr,
            self.release_date.clone().unwrap_or_else(|| "-".to_string()),
            if self.selected { "x" } else { "" }.to_string(),
            snr_meas,
            self.dp_id.clone().unwrap_or_else(|| "-".to_string()),
            self.proposal_id.clone().unwrap_or_else(|| "-".to_string()),
        ]
    }
}

// ---------------------------------------------------------------------------
// SpectrumData – samples plus metadata
// ---------------------------------------------------------------------------

/// A single spectrum: wavelength, flux and optional flux uncertainty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectrumData {
    pub metadata: SpectrumMetadata,
    pub wavelength: Vec<f64>,
    /// Same length as `wavelength`.
    pub flux: Vec<f64>,
    /// Same length as `wavelength` when present.
    pub flux_err: Option<Vec<f64>>,
}

impl SpectrumData {
    /// Build a spectrum, checking that all sample arrays line up.
    pub fn new(
        metadata: SpectrumMetadata,
        wavelength: Vec<f64>,
        flux: Vec<f64>,
        flux_err: Option<Vec<f64>>,
    ) -> SpectrumResult<Self> {
        if flux.len() != wavelength.len() {
            return Err(SpectrumError::LengthMismatch {
                what: "flux",
                expected: wavelength.len(),
                found: flux.len(),
            });
        }
        if let Some(err) = &flux_err {
            if err.len() != wavelength.len() {
                return Err(SpectrumError::LengthMismatch {
                    what: "flux uncertainty",
                    expected: wavelength.len(),
                    found: err.len(),
                });
            }
        }
        Ok(Self {
            metadata,
            wavelength,
            flux,
            flux_err,
        })
    }

    pub fn len(&self) -> usize {
        self.wavelength.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wavelength.is_empty()
    }

    /// Copy with samples in ascending wavelength order.
    pub fn sorted(&self) -> SpectrumData {
        let order = argsort(&self.wavelength);
        let pick = |v: &[f64]| order.iter().map(|&i| v[i]).collect::<Vec<f64>>();
        SpectrumData {
            metadata: self.metadata.clone(),
            wavelength: pick(&self.wavelength),
            flux: pick(&self.flux),
            flux_err: self.flux_err.as_deref().map(pick),
        }
    }

    /// Finite wavelength extent, if any.
    pub fn wavelength_bounds(&self) -> Option<(f64, f64)> {
        self.wavelength
            .iter()
            .copied()
            .filter(|w| w.is_finite())
            .fold(None, |acc, w| match acc {
                None => Some((w, w)),
                Some((lo, hi)) => Some((lo.min(w), hi.max(w))),
            })
    }

    /// SNR in `window`; a spectrum whose arrays no longer line up is
    /// reported as unavailable.
    pub fn measure_snr(&self, window: SnrWindow) -> Option<f64> {
        match measure_snr(&self.wavelength, &self.flux, self.flux_err.as_deref(), window) {
            Ok(snr) => snr,
            Err(e) => {
                warn!("cannot measure SNR of '{}': {e}", self.metadata.obs_id);
                None
            }
        }
    }
}

impl Sampled for SpectrumData {
    fn wavelength(&self) -> &[f64] {
        &self.wavelength
    }
    fn flux(&self) -> &[f64] {
        &self.flux
    }
}

// ---------------------------------------------------------------------------
// SpectralDataset – everything read from one file
// ---------------------------------------------------------------------------

/// Loaded spectra with an index over their `extra` metadata columns.
#[derive(Debug, Clone)]
pub struct SpectralDataset {
    pub spectra: Vec<SpectrumData>,
    /// Ordered list of extra metadata column names.
    pub column_names: Vec<String>,
    /// For each extra column the sorted set of unique values.
    pub unique_values: BTreeMap<String, BTreeSet<MetadataValue>>,
}

impl SpectralDataset {
    pub fn from_spectra(spectra: Vec<SpectrumData>) -> Self {
        let mut unique_values: BTreeMap<String, BTreeSet<MetadataValue>> = BTreeMap::new();
        for sp in &spectra {
            for (col, val) in &sp.metadata.extra {
                unique_values
                    .entry(col.clone())
                    .or_default()
                    .insert(val.clone());
            }
        }
        let column_names: Vec<String> = unique_values.keys().cloned().collect();
        SpectralDataset {
            spectra,
            column_names,
            unique_values,
        }
    }

    pub fn len(&self) -> usize {
        self.spectra.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spectra.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_checks_lengths() {
        let meta = SpectrumMetadata::new("a");
        assert!(SpectrumData::new(meta.clone(), vec![1.0, 2.0], vec![1.0], None).is_err());
        assert!(SpectrumData::new(meta.clone(), vec![1.0, 2.0], vec![1.0, 2.0], Some(vec![0.1])).is_err());
        assert!(SpectrumData::new(meta, vec![1.0, 2.0], vec![1.0, 2.0], Some(vec![0.1, 0.2])).is_ok());
    }

    #[test]
    fn sorted_is_a_copy() {
        let sp = SpectrumData::new(
            SpectrumMetadata::new("a"),
            vec![3.0, 1.0, 2.0],
            vec![30.0, 10.0, 20.0],
            Some(vec![0.3, 0.1, 0.2]),
        )
        .unwrap();
        let s = sp.sorted();
        assert_eq!(s.wavelength, vec![1.0, 2.0, 3.0]);
        assert_eq!(s.flux, vec![10.0, 20.0, 30.0]);
        assert_eq!(s.flux_err, Some(vec![0.1, 0.2, 0.3]));
        assert_eq!(sp.wavelength, vec![3.0, 1.0, 2.0]);
    }

    #[test]
    fn snr_of_misaligned_arrays_is_unavailable() {
        let mut sp = SpectrumData::new(
            SpectrumMetadata::new("a"),
            vec![1.0, 2.0, 3.0],
            vec![1.0, 2.0, 3.0],
            Some(vec![0.1, 0.1, 0.1]),
        )
        .unwrap();
        assert!(sp.measure_snr(SnrWindow::new(0.0, 5.0)).is_some());
        sp.flux.pop();
        assert_eq!(sp.measure_snr(SnrWindow::new(0.0, 5.0)), None);
    }

    #[test]
    fn display_row_formats_optional_fields() {
        let mut meta = SpectrumMetadata::new("obs-1");
        meta.target = "HD 1".into();
        meta.instrument = "UVES".into();
        meta.wvl_min_nm = Some(480.04);
        meta.wvl_max_nm = Some(680.0);
        meta.resolution = Some(42310.6);
        meta.snr_measured = Some(12.345);
        let row = meta.display_row();
        assert_eq!(row[2], "480.0 - 680.0");
        assert_eq!(row[3], "42311");
        assert_eq!(row[4], "-");
        assert_eq!(row[6], "x");
        assert_eq!(row[7], "12.3");
        assert_eq!(row[8], "-");
    }

    #[test]
    fn dataset_indexes_extra_columns() {
        let mut a = SpectrumMetadata::new("a");
        a.extra.insert("night".into(), MetadataValue::Integer(2));
        let mut b = SpectrumMetadata::new("b");
        b.extra.insert("night".into(), MetadataValue::Integer(1));
        let ds = SpectralDataset::from_spectra(vec![
            SpectrumData::new(a, vec![], vec![], None).unwrap(),
            SpectrumData::new(b, vec![], vec![], None).unwrap(),
        ]);
        assert_eq!(ds.column_names, vec!["night".to_string()]);
        assert_eq!(ds.unique_values["night"].len(), 2);
    }
}
