//! Orchestrator configuration

use crate::retry::RetryPolicy;
use core_pipeline::{ExtractionMode, ModelMatch};

/// Behavior shared by the image and text orchestrators
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisConfig {
    pub retry: RetryPolicy,
    /// Policy used by the pre-flight model check
    pub model_match: ModelMatch,
    /// How the image report is located in the response
    pub extraction: ExtractionMode,
}

impl AnalysisConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_model_match(mut self, model_match: ModelMatch) -> Self {
        self.model_match = model_match;
        self
    }

    pub fn with_extraction(mut self, extraction: ExtractionMode) -> Self {
        self.extraction = extraction;
        self
    }
}
