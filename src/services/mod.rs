//! Glue around the numeric core: a fetch-once spectrum cache and the
//! combiner that turns a numeric combination into a catalogued product.

pub mod combiner;
pub mod store;

pub use combiner::{derived_metadata, SpectrumCombiner, COMBINED_PREFIX};
pub use store::{DatasetSource, SpectrumSource, SpectrumStore};
