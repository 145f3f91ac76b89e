//! Spectral alignment and combination.
//!
//! * [`processing`] – resampling, cross-correlation shift search, averaging
//!   and SNR measurement over plain `f64` slices.
//! * [`data`] – spectrum/metadata types and file loading.
//! * [`services`] / [`state`] – fetch-once cache, combined-product metadata
//!   and catalogue bookkeeping used by the command line tool.

pub mod config;
pub mod data;
pub mod error;
pub mod processing;
pub mod services;
pub mod state;

pub use config::{AppConfig, ShiftSearchConfig, SnrWindow};
pub use data::{SpectralDataset, SpectrumData, SpectrumMetadata};
pub use error::{SpectrumError, SpectrumResult};
pub use processing::{
    combine, estimate_radial_velocity, estimate_shift, measure_snr, rebin, CombinationResult,
};
pub use services::SpectrumCombiner;
pub use state::Catalog;
