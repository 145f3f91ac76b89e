//! Numeric core: resampling, alignment, combination and SNR.
//!
//! ```text
//!   combine ──► correlation ──► resample
//!      │                          ▲
//!      └──────────────────────────┘   (no alignment requested)
//!
//!   snr        (standalone)
//! ```
//!
//! Everything here is pure and synchronous; each call only reads its own
//! arguments and returns a freshly allocated result.

pub mod combine;
pub mod correlation;
pub mod resample;
pub mod snr;
pub mod stats;

pub use combine::{combine, combine_with, CombinationResult, Sampled};
pub use correlation::{
    estimate_radial_velocity, estimate_radial_velocity_with, estimate_shift, estimate_shift_with,
    shift_to_velocity, SPEED_OF_LIGHT_KMS,
};
pub use resample::{rebin, rebin_zero};
pub use snr::measure_snr;
