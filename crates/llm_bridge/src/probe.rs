//! Connectivity checks against the inference server

use crate::backend::ModelBackend;
use core_pipeline::{AnalysisError, ConnectionStatus, ModelMatch};
use tracing::debug;

/// Query liveness and loaded models. Never fails: any error is reported
/// as a disconnected status with no models.
pub async fn probe<B: ModelBackend + ?Sized>(backend: &B) -> ConnectionStatus {
    match backend.list_models().await {
        Ok(models) => {
            debug!(base_url = backend.base_url(), count = models.len(), "Ollama reachable");
            ConnectionStatus::connected(models)
        }
        Err(err) => {
            debug!(base_url = backend.base_url(), error = %err, "Ollama unreachable");
            ConnectionStatus::disconnected()
        }
    }
}

/// Whether `model` is among the listed models under `policy`
pub fn is_model_available(status: &ConnectionStatus, model: &str, policy: ModelMatch) -> bool {
    status.connected && status.models.iter().any(|listed| policy.matches(model, listed))
}

/// Check the preconditions for an analysis against a fresh status
pub fn preflight<B: ModelBackend + ?Sized>(
    backend: &B,
    status: &ConnectionStatus,
    policy: ModelMatch,
) -> Result<(), AnalysisError> {
    if !status.connected {
        return Err(AnalysisError::NotConnected {
            base_url: backend.base_url().to_string(),
        });
    }
    if !is_model_available(status, backend.model(), policy) {
        return Err(AnalysisError::ModelNotLoaded {
            model: backend.model().to_string(),
        });
    }
    Ok(())
}

/// Probe and run the pre-flight check in one step
pub async fn check_ready<B: ModelBackend + ?Sized>(
    backend: &B,
    policy: ModelMatch,
) -> Result<ConnectionStatus, AnalysisError> {
    let status = probe(backend).await;
    preflight(backend, &status, policy)?;
    Ok(status)
}
