//! Ollama HTTP API client

use crate::backend::ModelBackend;
use anyhow::{Context, Result};
use async_trait::async_trait;
use core_pipeline::{AnalysisError, DEFAULT_MODEL, DEFAULT_OLLAMA_URL};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Configuration for Ollama client
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL for Ollama API (default: http://localhost:11434)
    pub base_url: String,
    /// Model used for generation (default: amsaravi/medgemma-4b-it:q6)
    pub model: String,
    /// Timeout for the liveness query in seconds (default: 10)
    pub probe_timeout_secs: u64,
    /// Timeout for a generation request in seconds (default: 180)
    pub generate_timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            probe_timeout_secs: 10,
            generate_timeout_secs: 180,
        }
    }
}

impl OllamaConfig {
    /// Defaults overlaid with `OLLAMA_BASE_URL`, `MEDANALYSIS_MODEL` and
    /// `OLLAMA_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(base_url) = std::env::var("OLLAMA_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(model) = std::env::var("MEDANALYSIS_MODEL") {
            config.model = model;
        }
        if let Ok(timeout) = std::env::var("OLLAMA_TIMEOUT_SECS") {
            config.generate_timeout_secs = timeout
                .parse()
                .with_context(|| format!("OLLAMA_TIMEOUT_SECS is not a number: {}", timeout))?;
        }

        Ok(config)
    }
}

/// Ollama API client
#[derive(Debug, Clone)]
pub struct OllamaClient {
    config: OllamaConfig,
    client: reqwest::Client,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(mut config: OllamaConfig) -> Result<Self> {
        config.base_url = config.base_url.trim_end_matches('/').to_string();

        // Timeouts are applied per request: probing and generation differ
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    fn classify(&self, err: reqwest::Error, timeout_secs: u64) -> AnalysisError {
        if err.is_timeout() {
            AnalysisError::Timeout(timeout_secs)
        } else if err.is_connect() {
            AnalysisError::Connection(self.config.base_url.clone())
        } else {
            AnalysisError::unexpected(err.to_string())
        }
    }
}

#[async_trait]
impl ModelBackend for OllamaClient {
    fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    /// List loaded models via `GET /api/tags`
    async fn list_models(&self) -> Result<Vec<String>, AnalysisError> {
        let url = format!("{}/api/tags", self.config.base_url);
        let timeout = self.config.probe_timeout_secs;

        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(timeout))
            .send()
            .await
            .map_err(|e| self.classify(e, timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.classify(e, timeout))?;

        if status != reqwest::StatusCode::OK {
            return Err(AnalysisError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let tags: TagsResponse = serde_json::from_str(&body)
            .map_err(|e| AnalysisError::unexpected(format!("invalid model listing: {}", e)))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Send a non-streaming generation request via `POST /api/generate`
    async fn generate(&self, request: &GenerateRequest) -> Result<String, AnalysisError> {
        let url = format!("{}/api/generate", self.config.base_url);
        let timeout = self.config.generate_timeout_secs;

        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(timeout))
            .json(request)
            .send()
            .await
            .map_err(|e| self.classify(e, timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.classify(e, timeout))?;

        if status != reqwest::StatusCode::OK {
            return Err(AnalysisError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let generated: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| AnalysisError::unexpected(format!("invalid generate response: {}", e)))?;

        debug!(chars = generated.response.len(), "Ollama generation complete");
        Ok(generated.response)
    }
}

/// Generation request to Ollama
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: Prompt,
    pub stream: bool,
}

impl GenerateRequest {
    /// Plain text prompt
    pub fn text(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: Prompt::Text(prompt.into()),
            stream: false,
        }
    }

    /// Chat-style multimodal prompt
    pub fn messages(model: impl Into<String>, messages: Vec<PromptMessage>) -> Self {
        Self {
            model: model.into(),
            prompt: Prompt::Messages(messages),
            stream: false,
        }
    }
}

/// Either a plain string or a list of role messages
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Prompt {
    Text(String),
    Messages(Vec<PromptMessage>),
}

/// A role message made of content parts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: Vec<ContentPart>,
}

impl PromptMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: vec![ContentPart::text(text)],
        }
    }

    pub fn user(content: Vec<ContentPart>) -> Self {
        Self {
            role: "user".to_string(),
            content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    Text { text: String },
    /// Base64-encoded image
    Image { image: String },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(base64: impl Into<String>) -> Self {
        Self::Image {
            image: base64.into(),
        }
    }
}

/// Generation response from Ollama
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    pub response: String,
}

/// Model listing from `/api/tags`
#[derive(Debug, Clone, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
}
