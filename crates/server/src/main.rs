//! medanalysis REST API server
//!
//! Backend for a browser UI shell: reports Ollama connectivity and runs
//! image and text analyses, returning the markdown report or a
//! user-facing error.

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use clap::Parser;
use core_pipeline::{
    AnalysisError, AnalysisRequest, AnalysisResult, ModelTag, StagedUpload, UploadDetails,
    MEDICAL_DISCLAIMER,
};
use llm_bridge::{
    analyze_request, is_model_available, preflight, probe, AnalysisConfig, CancelToken,
    ModelBackend, OllamaClient, OllamaConfig,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

/// Largest request body accepted; base64 adds a third on top of the image
const MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

#[derive(Parser)]
#[command(name = "medanalysis-server", version, about = "medanalysis REST API server")]
struct ServerArgs {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = 3000)]
    port: u16,
}

#[derive(Clone)]
struct AppState {
    client: OllamaClient,
    analysis: AnalysisConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = ServerArgs::parse();
    let client = OllamaClient::new(OllamaConfig::from_env()?)?;
    tracing::info!(
        base_url = client.base_url(),
        model = client.model(),
        "Using Ollama backend"
    );

    let state = Arc::new(AppState {
        client,
        analysis: AnalysisConfig::default(),
    });

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}

fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/status", get(get_status))
        .route("/api/analyze/image", post(analyze_image))
        .route("/api/analyze/text", post(analyze_text))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    let status = probe(&state.client).await;
    let configured = state.client.model();

    Json(StatusResponse {
        connected: status.connected,
        base_url: state.client.base_url().to_string(),
        model: configured.to_string(),
        model_loaded: is_model_available(&status, configured, state.analysis.model_match),
        models: status
            .models
            .iter()
            .map(|name| ModelEntry {
                name: name.clone(),
                tag: ModelTag::for_model(name, configured),
            })
            .collect(),
    })
}

async fn analyze_image(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ImageAnalysisRequest>,
) -> (StatusCode, Json<AnalysisResponse>) {
    let bytes = match general_purpose::STANDARD.decode(body.image_base64.trim()) {
        Ok(bytes) => bytes,
        Err(err) => {
            return AnalysisResponse::bad_request(format!("image_base64 is not valid base64: {}", err))
        }
    };

    let details = UploadDetails {
        filename: body.filename.unwrap_or_else(|| "upload".to_string()),
        mime_type: body.mime_type,
        size_bytes: bytes.len(),
    };
    tracing::info!(
        filename = %details.filename,
        mime_type = %details.mime_type,
        size = %details.size_label(),
        "Image analysis requested"
    );

    if let Err(err) = check_preconditions(&state).await {
        return AnalysisResponse::precondition(err);
    }

    // Removed when `staged` drops, on every return path below
    let staged = match StagedUpload::stage(&bytes, &details.mime_type) {
        Ok(staged) => staged,
        Err(err) => {
            tracing::error!(error = %err, "Failed to stage upload");
            return AnalysisResponse::internal(format!("failed to stage upload: {}", err));
        }
    };
    let staged_bytes = match staged.read() {
        Ok(bytes) => bytes,
        Err(err) => return AnalysisResponse::internal(format!("failed to read staged upload: {}", err)),
    };

    let request = AnalysisRequest::image(staged_bytes, details.mime_type);
    run_analysis(&state, &request).await
}

async fn analyze_text(
    State(state): State<Arc<AppState>>,
    Json(body): Json<TextAnalysisRequest>,
) -> (StatusCode, Json<AnalysisResponse>) {
    if body.text.trim().is_empty() {
        return AnalysisResponse::precondition(AnalysisError::EmptyInput);
    }

    if let Err(err) = check_preconditions(&state).await {
        return AnalysisResponse::precondition(err);
    }

    let request = AnalysisRequest::text(body.text);
    run_analysis(&state, &request).await
}

async fn check_preconditions(state: &AppState) -> Result<(), AnalysisError> {
    let status = probe(&state.client).await;
    preflight(&state.client, &status, state.analysis.model_match)
}

/// Dropping the handler future (client disconnect) abandons the request
async fn run_analysis(
    state: &AppState,
    request: &AnalysisRequest,
) -> (StatusCode, Json<AnalysisResponse>) {
    let cancel = CancelToken::new();
    match analyze_request(&state.client, state.analysis, request, &cancel).await {
        AnalysisResult::Success { report } => (
            StatusCode::OK,
            Json(AnalysisResponse {
                report: Some(report),
                error: None,
                disclaimer: MEDICAL_DISCLAIMER,
            }),
        ),
        AnalysisResult::Failure {
            error,
            message,
            attempts,
        } => (
            status_for(&error),
            Json(AnalysisResponse::failure(error.kind(), message, attempts)),
        ),
    }
}

fn status_for(error: &AnalysisError) -> StatusCode {
    match error {
        AnalysisError::NotConnected { .. } => StatusCode::SERVICE_UNAVAILABLE,
        AnalysisError::ModelNotLoaded { .. } => StatusCode::FAILED_DEPENDENCY,
        AnalysisError::EmptyInput => StatusCode::BAD_REQUEST,
        AnalysisError::InvalidImage(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AnalysisError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        AnalysisError::Connection(_) | AnalysisError::Http { .. } | AnalysisError::Unexpected(_) => {
            StatusCode::BAD_GATEWAY
        }
        AnalysisError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[derive(Deserialize)]
struct ImageAnalysisRequest {
    filename: Option<String>,
    mime_type: String,
    image_base64: String,
}

#[derive(Deserialize)]
struct TextAnalysisRequest {
    text: String,
}

#[derive(Serialize)]
struct StatusResponse {
    connected: bool,
    base_url: String,
    model: String,
    model_loaded: bool,
    models: Vec<ModelEntry>,
}

#[derive(Serialize)]
struct ModelEntry {
    name: String,
    tag: ModelTag,
}

#[derive(Serialize)]
struct AnalysisResponse {
    report: Option<String>,
    error: Option<ErrorBody>,
    disclaimer: &'static str,
}

#[derive(Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
    attempts: u32,
}

impl AnalysisResponse {
    fn failure(kind: &'static str, message: String, attempts: u32) -> Self {
        Self {
            report: None,
            error: Some(ErrorBody {
                kind,
                message,
                attempts,
            }),
            disclaimer: MEDICAL_DISCLAIMER,
        }
    }

    /// Failure detected before any generation attempt
    fn precondition(error: AnalysisError) -> (StatusCode, Json<Self>) {
        (
            status_for(&error),
            Json(Self::failure(error.kind(), error.to_string(), 0)),
        )
    }

    fn bad_request(message: String) -> (StatusCode, Json<Self>) {
        (
            StatusCode::BAD_REQUEST,
            Json(Self::failure("invalid_request", message, 0)),
        )
    }

    fn internal(message: String) -> (StatusCode, Json<Self>) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(Self::failure("internal", message, 0)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use llm_bridge::RetryPolicy;
    use serde_json::{json, Value};
    use std::io::Cursor;
    use std::time::Duration;
    use tower::ServiceExt;

    fn state_for(base_url: &str) -> Arc<AppState> {
        let client = OllamaClient::new(OllamaConfig {
            base_url: base_url.to_string(),
            model: "medgemma".to_string(),
            probe_timeout_secs: 2,
            generate_timeout_secs: 5,
        })
        .unwrap();
        Arc::new(AppState {
            client,
            analysis: AnalysisConfig::default()
                .with_retry(RetryPolicy::default().with_delay(Duration::ZERO)),
        })
    }

    async fn tags_mock(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("GET", "/api/tags")
            .with_status(200)
            .with_body(
                json!({"models": [{"name": "amsaravi/medgemma-4b-it:q6"}, {"name": "llama3:8b"}]})
                    .to_string(),
            )
            .create_async()
            .await
    }

    fn png_base64() -> String {
        let img = ImageBuffer::from_pixel(320, 240, Rgb([5u8, 10, 15]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        general_purpose::STANDARD.encode(bytes)
    }

    async fn call(state: Arc<AppState>, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json");
        let request = match body {
            Some(body) => request.body(Body::from(body.to_string())).unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = app(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_health_check() {
        assert_eq!(health_check().await, "OK");
    }

    #[tokio::test]
    async fn test_status_reports_models_and_tags() {
        let mut server = mockito::Server::new_async().await;
        let _tags = tags_mock(&mut server).await;

        let (status, body) = call(state_for(&server.url()), "GET", "/api/status", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connected"], true);
        assert_eq!(body["model_loaded"], true);
        assert_eq!(body["models"][0]["tag"], "medical");
        assert_eq!(body["models"][1]["tag"], "other");
    }

    #[tokio::test]
    async fn test_text_analysis_success() {
        let mut server = mockito::Server::new_async().await;
        let _tags = tags_mock(&mut server).await;
        let generate = server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_body(json!({"response": "### 1. Document Analysis\nLab panel"}).to_string())
            .expect(1)
            .create_async()
            .await;

        let (status, body) = call(
            state_for(&server.url()),
            "POST",
            "/api/analyze/text",
            Some(json!({"text": "Potassium 5.9 mmol/L"})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["report"], "### 1. Document Analysis\nLab panel");
        assert!(body["error"].is_null());
        generate.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_text_rejected_without_network() {
        let mut server = mockito::Server::new_async().await;
        let tags = server.mock("GET", "/api/tags").expect(0).create_async().await;
        let generate = server
            .mock("POST", "/api/generate")
            .expect(0)
            .create_async()
            .await;

        let (status, body) = call(
            state_for(&server.url()),
            "POST",
            "/api/analyze/text",
            Some(json!({"text": "   "})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "empty_input");
        tags.assert_async().await;
        generate.assert_async().await;
    }

    #[tokio::test]
    async fn test_image_analysis_success() {
        let mut server = mockito::Server::new_async().await;
        let _tags = tags_mock(&mut server).await;
        let generate = server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_body(json!({"response": "Sure.\n### 1. Image Type & Region\nCT head"}).to_string())
            .expect(1)
            .create_async()
            .await;

        let (status, body) = call(
            state_for(&server.url()),
            "POST",
            "/api/analyze/image",
            Some(json!({
                "filename": "head.png",
                "mime_type": "image/png",
                "image_base64": png_base64()
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["report"], "### 1. Image Type & Region\nCT head");
        generate.assert_async().await;
    }

    #[tokio::test]
    async fn test_large_image_upload_reaches_model() {
        // Noise keeps the PNG from compressing below the default 2 MB body limit
        let mut seed: u32 = 0x2545_f491;
        let noise = ImageBuffer::from_fn(1024, 1024, |_, _| {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let [_, r, g, b] = seed.to_le_bytes();
            Rgb([r, g, b])
        });
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(noise)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        assert!(bytes.len() > 2 * 1024 * 1024);

        let mut server = mockito::Server::new_async().await;
        let _tags = tags_mock(&mut server).await;
        let generate = server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_body(json!({"response": "### 1. Image Type & Region\nChest CT"}).to_string())
            .expect(1)
            .create_async()
            .await;

        let (status, body) = call(
            state_for(&server.url()),
            "POST",
            "/api/analyze/image",
            Some(json!({
                "filename": "chest.png",
                "mime_type": "image/png",
                "image_base64": general_purpose::STANDARD.encode(&bytes)
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["report"], "### 1. Image Type & Region\nChest CT");
        generate.assert_async().await;
    }

    #[tokio::test]
    async fn test_undecodable_image_is_unprocessable() {
        let mut server = mockito::Server::new_async().await;
        let _tags = tags_mock(&mut server).await;
        let generate = server
            .mock("POST", "/api/generate")
            .expect(0)
            .create_async()
            .await;

        let (status, body) = call(
            state_for(&server.url()),
            "POST",
            "/api/analyze/image",
            Some(json!({
                "filename": "scan.png",
                "mime_type": "image/png",
                "image_base64": general_purpose::STANDARD.encode(b"not an image at all")
            })),
        )
        .await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["kind"], "invalid_image");
        assert_eq!(body["error"]["attempts"], 0);
        assert_eq!(body["disclaimer"], MEDICAL_DISCLAIMER);
        generate.assert_async().await;
    }

    #[tokio::test]
    async fn test_image_with_bad_base64_is_rejected() {
        let (status, body) = call(
            state_for("http://127.0.0.1:9"),
            "POST",
            "/api/analyze/image",
            Some(json!({"mime_type": "image/png", "image_base64": "%%%"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["kind"], "invalid_request");
    }

    #[tokio::test]
    async fn test_model_not_loaded_is_precondition_failure() {
        let mut server = mockito::Server::new_async().await;
        let _tags = server
            .mock("GET", "/api/tags")
            .with_status(200)
            .with_body(json!({"models": [{"name": "llama3:8b"}]}).to_string())
            .create_async()
            .await;
        let generate = server
            .mock("POST", "/api/generate")
            .expect(0)
            .create_async()
            .await;

        let (status, body) = call(
            state_for(&server.url()),
            "POST",
            "/api/analyze/text",
            Some(json!({"text": "notes"})),
        )
        .await;

        assert_eq!(status, StatusCode::FAILED_DEPENDENCY);
        assert_eq!(body["error"]["kind"], "model_not_loaded");
        assert_eq!(body["error"]["attempts"], 0);
        generate.assert_async().await;
    }

    #[tokio::test]
    async fn test_generation_failure_maps_to_bad_gateway() {
        let mut server = mockito::Server::new_async().await;
        let _tags = tags_mock(&mut server).await;
        let generate = server
            .mock("POST", "/api/generate")
            .with_status(500)
            .with_body("runner crashed")
            .expect(3)
            .create_async()
            .await;

        let (status, body) = call(
            state_for(&server.url()),
            "POST",
            "/api/analyze/text",
            Some(json!({"text": "notes"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["kind"], "http_error");
        assert_eq!(body["error"]["attempts"], 3);
        assert_eq!(
            body["error"]["message"],
            "Error: HTTP 500 - runner crashed (after 3 attempts)"
        );
        generate.assert_async().await;
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            status_for(&AnalysisError::NotConnected {
                base_url: "x".into()
            }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_for(&AnalysisError::Timeout(180)),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&AnalysisError::InvalidImage("x".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }
}
