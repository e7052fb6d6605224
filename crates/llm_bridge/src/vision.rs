//! Vision model integration for medical image analysis

use crate::backend::ModelBackend;
use crate::cancel::CancelToken;
use crate::config::AnalysisConfig;
use crate::ollama::{ContentPart, GenerateRequest, PromptMessage};
use core_pipeline::prompt::{image_prompt, IMAGE_SYSTEM_INSTRUCTION};
use core_pipeline::{extract_report, prepare_image, AnalysisError, AnalysisResult, PreparedImage};
use tracing::{debug, info, warn};

/// Orchestrates one image analysis: normalize, prompt, submit, extract
pub struct ImageAnalyzer<B> {
    backend: B,
    config: AnalysisConfig,
}

impl<B: ModelBackend> ImageAnalyzer<B> {
    pub fn new(backend: B, config: AnalysisConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Multimodal request: system instruction, then the report template
    /// and the image in one user message
    pub fn build_request(&self, image: &PreparedImage) -> GenerateRequest {
        GenerateRequest::messages(
            self.backend.model(),
            vec![
                PromptMessage::system(IMAGE_SYSTEM_INSTRUCTION),
                PromptMessage::user(vec![
                    ContentPart::text(image_prompt(self.config.extraction)),
                    ContentPart::image(image.base64.clone()),
                ]),
            ],
        )
    }

    /// Analyze an uploaded image
    pub async fn analyze_image(&self, image_bytes: &[u8], mime_type: &str) -> AnalysisResult {
        self.analyze_image_with_cancel(image_bytes, mime_type, &CancelToken::new())
            .await
    }

    /// Analyze an uploaded image, stopping early when `cancel` fires.
    ///
    /// The image is normalized once; only the HTTP exchange is retried.
    pub async fn analyze_image_with_cancel(
        &self,
        image_bytes: &[u8],
        mime_type: &str,
        cancel: &CancelToken,
    ) -> AnalysisResult {
        let prepared = match prepare_image(image_bytes, mime_type) {
            Ok(prepared) => prepared,
            Err(err) => {
                warn!(mime_type, error = %err, "Image normalization failed");
                return AnalysisResult::failure(AnalysisError::InvalidImage(err.to_string()), 0);
            }
        };
        debug!(
            width = prepared.width,
            height = prepared.height,
            jpeg_bytes = prepared.encoded_len,
            "Image normalized"
        );

        let request = self.build_request(&prepared);
        info!(model = %request.model, "Submitting image analysis");

        let backend = &self.backend;
        let request = &request;
        let mode = self.config.extraction;
        let result = self
            .config
            .retry
            .execute(cancel, move |_| async move {
                backend
                    .generate(request)
                    .await
                    .map(|response| extract_report(&response, mode).to_string())
            })
            .await;

        if result.is_success() {
            info!("Image analysis complete");
        }
        result
    }
}
