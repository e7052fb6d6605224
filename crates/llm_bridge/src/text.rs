//! Text model integration for medical report analysis

use crate::backend::ModelBackend;
use crate::cancel::CancelToken;
use crate::config::AnalysisConfig;
use crate::ollama::GenerateRequest;
use core_pipeline::prompt::text_prompt;
use core_pipeline::{AnalysisError, AnalysisResult};
use tracing::info;

/// Orchestrates one text analysis: prompt, submit, return the response as-is
pub struct TextAnalyzer<B> {
    backend: B,
    config: AnalysisConfig,
}

impl<B: ModelBackend> TextAnalyzer<B> {
    pub fn new(backend: B, config: AnalysisConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Analyze medical text
    pub async fn analyze_text(&self, text_input: &str) -> AnalysisResult {
        self.analyze_text_with_cancel(text_input, &CancelToken::new())
            .await
    }

    /// Analyze medical text, stopping early when `cancel` fires.
    ///
    /// Blank input is rejected before any request is sent.
    pub async fn analyze_text_with_cancel(
        &self,
        text_input: &str,
        cancel: &CancelToken,
    ) -> AnalysisResult {
        if text_input.trim().is_empty() {
            return AnalysisResult::failure(AnalysisError::EmptyInput, 0);
        }

        let request = GenerateRequest::text(self.backend.model(), text_prompt(text_input));
        info!(model = %request.model, chars = text_input.len(), "Submitting text analysis");

        let backend = &self.backend;
        let request = &request;
        self.config
            .retry
            .execute(cancel, move |_| async move { backend.generate(request).await })
            .await
    }
}
