//! Core pipeline for medanalysis
//!
//! This crate provides the request-scoped data structures and the
//! network-free processing steps behind a medical analysis request:
//! image normalization, prompt templates, report extraction and
//! transient upload staging.

pub mod error;
pub mod extract;
pub mod preprocess;
pub mod prompt;
pub mod staging;
pub mod types;

pub use error::AnalysisError;
pub use extract::{extract_report, ExtractionMode};
pub use preprocess::{prepare_image, PreparedImage, PreprocessError};
pub use staging::StagedUpload;
pub use types::*;
