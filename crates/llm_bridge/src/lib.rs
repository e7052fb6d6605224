//! LLM Bridge for Ollama integration
//!
//! Provides the request/response orchestration between a UI shell and a
//! local Ollama server: connectivity probing, the image and text analysis
//! orchestrators, and the retry and cancellation machinery they share.
//!
//! Copyright (c) 2025 Michael A Wright

pub mod backend;
pub mod cancel;
pub mod config;
pub mod ollama;
pub mod probe;
pub mod retry;
pub mod text;
pub mod vision;

pub use backend::ModelBackend;
pub use cancel::CancelToken;
pub use config::AnalysisConfig;
pub use ollama::{OllamaClient, OllamaConfig};
pub use probe::{check_ready, is_model_available, preflight, probe};
pub use retry::{Backoff, RetryPolicy};
pub use text::TextAnalyzer;
pub use vision::ImageAnalyzer;

use core_pipeline::{AnalysisRequest, AnalysisResult};

/// Route a request to the matching orchestrator
pub async fn analyze_request<B: ModelBackend + Clone>(
    backend: &B,
    config: AnalysisConfig,
    request: &AnalysisRequest,
    cancel: &CancelToken,
) -> AnalysisResult {
    match request {
        AnalysisRequest::Image { bytes, mime_type } => {
            ImageAnalyzer::new(backend.clone(), config)
                .analyze_image_with_cancel(bytes, mime_type, cancel)
                .await
        }
        AnalysisRequest::Text { text } => {
            TextAnalyzer::new(backend.clone(), config)
                .analyze_text_with_cancel(text, cancel)
                .await
        }
    }
}
