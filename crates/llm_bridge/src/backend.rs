//! Seam between the orchestrators and the inference server

use crate::ollama::GenerateRequest;
use async_trait::async_trait;
use core_pipeline::AnalysisError;

/// An inference server the orchestrators can talk to
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Base URL of the server, used in user-facing messages
    fn base_url(&self) -> &str;

    /// Model identifier sent with every generation request
    fn model(&self) -> &str;

    /// Names of the loaded models, in server order
    async fn list_models(&self) -> Result<Vec<String>, AnalysisError>;

    /// Run one generation request and return the generated text
    async fn generate(&self, request: &GenerateRequest) -> Result<String, AnalysisError>;
}
