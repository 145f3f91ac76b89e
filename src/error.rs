use thiserror::Error;

// ---------------------------------------------------------------------------
// Core error type
// ---------------------------------------------------------------------------

/// Input contract violations raised by the numeric core.
///
/// Degenerate data (flat reference, zero span, ...) is *not* an error; those
/// cases resolve to a neutral value instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpectrumError {
    #[error("{what} has {found} values but {expected} were expected")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("no {0} provided")]
    EmptyInput(&'static str),

    #[error("cannot interpolate from an empty sample grid")]
    EmptyGrid,

    #[error("reference index {index} is out of range for {len} spectra")]
    ReferenceOutOfRange { index: usize, len: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type SpectrumResult<T> = Result<T, SpectrumError>;
