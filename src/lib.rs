//! Batch quality control for ASD field-spectroradiometer records.
//!
//! A field campaign records each target many times; this crate decodes the
//! instrument's binary records, batches the replicates, rejects the
//! inconsistent members of each batch with a sliding-window spread test,
//! and persists one trustworthy mean spectrum per batch.

pub mod data;
pub mod pipeline;
pub mod select;

pub use data::model::{Header, SpectralCurve, HEADER_LEN, SAMPLE_COUNT, WAVELENGTH_START};
pub use data::record::{decode, DecodeWarning, DecodedRecord, FormatError};
pub use pipeline::{run, PipelineConfig, RunSummary};
pub use select::{select, Selection};
