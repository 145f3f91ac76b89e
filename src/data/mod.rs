/// Data layer: core types, loading, and filtering.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  probe columns, parse rows → SpectralDataset
///   └──────────┘
///        │
///        ▼
///   ┌────────────────┐
///   │ SpectralDataset │  Vec<SpectrumData>, extra-column index
///   └────────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  metadata predicates / default selection → indices
///   └──────────┘
/// ```

pub mod filter;
pub mod loader;
pub mod model;

pub use model::{MetadataValue, SpectralDataset, SpectrumData, SpectrumMetadata};
