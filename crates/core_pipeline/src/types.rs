//! Core types for the medanalysis pipeline
//!
//! Every value here is request-scoped: built when the user starts an
//! analysis and discarded once the result has been rendered.

use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};

/// Default Ollama endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Default MedGemma model tag
pub const DEFAULT_MODEL: &str = "amsaravi/medgemma-4b-it:q6";

/// File extensions the UI shells accept for image uploads
pub const ACCEPTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif", "tiff", "dcm"];

/// Disclaimer shown alongside every report
pub const MEDICAL_DISCLAIMER: &str = "Medical Disclaimer: This tool is for educational and \
research purposes only. Always consult qualified healthcare professionals for medical \
diagnosis and treatment decisions.";

/// Input for a single analysis action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisRequest {
    /// Raw image bytes plus the MIME type declared by the uploader
    Image { bytes: Vec<u8>, mime_type: String },
    /// Free-form medical text
    Text { text: String },
}

impl AnalysisRequest {
    pub fn image(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

/// Outcome of an analysis action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisResult {
    /// The model produced a report
    Success { report: String },
    /// No report; `message` is ready to show to the user
    Failure {
        error: AnalysisError,
        message: String,
        attempts: u32,
    },
}

impl AnalysisResult {
    pub fn success(report: impl Into<String>) -> Self {
        Self::Success {
            report: report.into(),
        }
    }

    /// Build a failure, rendering the user-facing message from the error.
    pub fn failure(error: AnalysisError, attempts: u32) -> Self {
        let message = if attempts == 0 {
            error.to_string()
        } else {
            format!("{} (after {} attempts)", error, attempts)
        };
        Self::Failure {
            error,
            message,
            attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn report(&self) -> Option<&str> {
        match self {
            Self::Success { report } => Some(report),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&AnalysisError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error, .. } => Some(error),
        }
    }

    /// Number of generation attempts behind a failure (0 for successes)
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { .. } => 0,
            Self::Failure { attempts, .. } => *attempts,
        }
    }
}

/// Liveness of the inference server and its loaded models
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub connected: bool,
    /// Model names in the order the server returned them
    pub models: Vec<String>,
}

impl ConnectionStatus {
    pub fn connected(models: Vec<String>) -> Self {
        Self {
            connected: true,
            models,
        }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }
}

/// How a configured model name is matched against the server's list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelMatch {
    /// Configured name appears anywhere in a listed name.
    /// Tolerates tag suffixes (`medgemma` matches `medgemma-4b-it:q6`) at the
    /// cost of matching unrelated models that share a fragment.
    #[default]
    Substring,
    /// Listed name starts with the configured name
    Prefix,
    /// Names must be identical
    Exact,
}

impl ModelMatch {
    pub fn matches(&self, configured: &str, listed: &str) -> bool {
        match self {
            Self::Substring => listed.contains(configured),
            Self::Prefix => listed.starts_with(configured),
            Self::Exact => listed == configured,
        }
    }
}

/// Annotation used when displaying the server's model list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTag {
    /// Exactly the configured model
    Configured,
    /// Looks like a medical model
    Medical,
    Other,
}

impl ModelTag {
    pub fn for_model(listed: &str, configured: &str) -> Self {
        let lower = listed.to_lowercase();
        if listed == configured {
            Self::Configured
        } else if lower.contains("medgemma") || lower.contains("medical") {
            Self::Medical
        } else {
            Self::Other
        }
    }
}

/// Details of an uploaded file shown before analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadDetails {
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: usize,
}

impl UploadDetails {
    /// Size formatted as kilobytes with one decimal, e.g. `12.5 KB`
    pub fn size_label(&self) -> String {
        format!("{:.1} KB", self.size_bytes as f64 / 1024.0)
    }
}

/// MIME type for an accepted upload extension (case-insensitive)
pub fn mime_type_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "bmp" => Some("image/bmp"),
        "gif" => Some("image/gif"),
        "tiff" => Some("image/tiff"),
        "dcm" => Some("application/dicom"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_message_includes_attempts() {
        let result = AnalysisResult::failure(
            AnalysisError::Http {
                status: 500,
                body: "oops".into(),
            },
            3,
        );

        assert!(!result.is_success());
        assert_eq!(result.attempts(), 3);
        match result {
            AnalysisResult::Failure { message, .. } => {
                assert_eq!(message, "Error: HTTP 500 - oops (after 3 attempts)");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_precondition_failure_has_plain_message() {
        let result = AnalysisResult::failure(AnalysisError::EmptyInput, 0);
        match result {
            AnalysisResult::Failure { message, .. } => {
                assert_eq!(message, "Please enter some medical text to analyze");
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[test]
    fn test_success_exposes_report() {
        let result = AnalysisResult::success("### 1. Image Type & Region");
        assert!(result.is_success());
        assert_eq!(result.report(), Some("### 1. Image Type & Region"));
        assert!(result.error().is_none());
    }

    #[test]
    fn test_substring_match_accepts_tag_suffixes() {
        // Intentional: the configured base name matches quantized tags.
        assert!(ModelMatch::Substring.matches("foo", "foo"));
        assert!(ModelMatch::Substring.matches("foo", "foo:q6"));
        assert!(ModelMatch::Substring.matches("medgemma", "amsaravi/medgemma-4b-it:q6"));
    }

    #[test]
    fn test_prefix_and_exact_match_are_stricter() {
        assert!(ModelMatch::Prefix.matches("foo", "foo:q6"));
        assert!(!ModelMatch::Prefix.matches("medgemma", "amsaravi/medgemma-4b-it:q6"));
        assert!(ModelMatch::Exact.matches("foo:q6", "foo:q6"));
        assert!(!ModelMatch::Exact.matches("foo", "foo:q6"));
    }

    #[test]
    fn test_model_tags() {
        assert_eq!(
            ModelTag::for_model(DEFAULT_MODEL, DEFAULT_MODEL),
            ModelTag::Configured
        );
        assert_eq!(
            ModelTag::for_model("MedGemma-27b", DEFAULT_MODEL),
            ModelTag::Medical
        );
        assert_eq!(
            ModelTag::for_model("llama3.2:3b", DEFAULT_MODEL),
            ModelTag::Other
        );
    }

    #[test]
    fn test_upload_size_label() {
        let details = UploadDetails {
            filename: "chest.png".into(),
            mime_type: "image/png".into(),
            size_bytes: 12_800,
        };
        assert_eq!(details.size_label(), "12.5 KB");
    }

    #[test]
    fn test_mime_type_for_extension() {
        assert_eq!(mime_type_for_extension("JPG"), Some("image/jpeg"));
        assert_eq!(mime_type_for_extension("tiff"), Some("image/tiff"));
        assert_eq!(mime_type_for_extension("exe"), None);
        for ext in ACCEPTED_EXTENSIONS {
            assert!(mime_type_for_extension(ext).is_some());
        }
    }

    #[test]
    fn test_connection_status_serialization() {
        let status = ConnectionStatus::connected(vec!["a".into(), "b".into()]);
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, r#"{"connected":true,"models":["a","b"]}"#);
    }
}
