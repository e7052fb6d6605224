//! medanalysis CLI
//!
//! Command-line shell over the analysis orchestrators: checks the local
//! Ollama server, then analyzes a medical image or medical text and prints
//! the markdown report.
//!
//! Copyright (c) 2025 Michael A Wright

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use core_pipeline::{
    mime_type_for_extension, AnalysisRequest, AnalysisResult, ConnectionStatus, ExtractionMode,
    ModelMatch, ModelTag, UploadDetails, ACCEPTED_EXTENSIONS, MEDICAL_DISCLAIMER,
};
use llm_bridge::{
    analyze_request, is_model_available, preflight, probe, AnalysisConfig, CancelToken,
    ModelBackend, OllamaClient, OllamaConfig, RetryPolicy,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "medanalysis")]
#[command(version, about = "Medical image and text analysis with a local Ollama model", long_about = None)]
struct Cli {
    #[command(flatten)]
    options: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalOptions {
    /// Ollama base URL (overrides OLLAMA_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Model tag (overrides MEDANALYSIS_MODEL)
    #[arg(long, global = true)]
    model: Option<String>,

    /// Generation timeout in seconds (overrides OLLAMA_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    /// Additional attempts after the first failure
    #[arg(long, global = true, default_value_t = 2)]
    retries: u32,

    /// Seconds to wait between attempts
    #[arg(long, global = true, default_value_t = 2)]
    retry_delay_secs: u64,

    /// Require the configured model tag to match exactly
    #[arg(long, global = true)]
    exact_match: bool,

    /// Skip the connectivity and model check before analyzing
    #[arg(long, global = true)]
    skip_preflight: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show Ollama connectivity and the loaded models
    Status,

    /// Analyze a medical image (X-ray, MRI, CT, ultrasound, ...)
    Image {
        /// Image file (jpg, jpeg, png, bmp, gif, tiff, dcm)
        #[arg(short, long)]
        input: PathBuf,

        /// MIME type; derived from the file extension when omitted
        #[arg(long)]
        mime_type: Option<String>,

        /// Ask the model for a delimited report block and parse it
        #[arg(long)]
        delimited: bool,
    },

    /// Analyze a medical report or clinical notes
    Text {
        /// Text to analyze
        #[arg(conflicts_with = "file")]
        text: Option<String>,

        /// Read the text from a file instead
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

impl GlobalOptions {
    fn ollama_config(&self) -> Result<OllamaConfig> {
        let mut config = OllamaConfig::from_env()?;
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(timeout) = self.timeout_secs {
            config.generate_timeout_secs = timeout;
        }
        Ok(config)
    }

    fn analysis_config(&self) -> AnalysisConfig {
        let model_match = if self.exact_match {
            ModelMatch::Exact
        } else {
            ModelMatch::Substring
        };

        AnalysisConfig::default()
            .with_retry(
                RetryPolicy::default()
                    .with_max_retries(self.retries)
                    .with_delay(Duration::from_secs(self.retry_delay_secs)),
            )
            .with_model_match(model_match)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = OllamaClient::new(cli.options.ollama_config()?)?;
    let mut config = cli.options.analysis_config();

    let request = match cli.command {
        Commands::Status => {
            let status = probe(&client).await;
            print_status(&client, &status, config.model_match);
            return Ok(());
        }
        Commands::Image {
            input,
            mime_type,
            delimited,
        } => {
            if delimited {
                config = config.with_extraction(ExtractionMode::Delimited);
            }
            let mime_type = match mime_type {
                Some(mime_type) => mime_type,
                None => mime_type_for_path(&input)?.to_string(),
            };
            let bytes = std::fs::read(&input)
                .with_context(|| format!("Failed to read image {}", input.display()))?;

            let details = UploadDetails {
                filename: display_name(&input),
                mime_type: mime_type.clone(),
                size_bytes: bytes.len(),
            };
            eprintln!("Filename:  {}", details.filename);
            eprintln!("File Type: {}", details.mime_type);
            eprintln!("File Size: {}", details.size_label());

            AnalysisRequest::image(bytes, mime_type)
        }
        Commands::Text { text, file } => {
            let text = read_text_input(text, file.as_deref())?;
            if text.trim().is_empty() {
                anyhow::bail!("Please enter some medical text to analyze");
            }
            AnalysisRequest::text(text)
        }
    };

    if !cli.options.skip_preflight {
        let status = probe(&client).await;
        preflight(&client, &status, config.model_match)?;
    }

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling analysis");
            trigger.cancel();
        }
    });

    eprintln!("Analyzing... This may take 1-5 minutes depending on your hardware.");
    match analyze_request(&client, config, &request, &cancel).await {
        AnalysisResult::Success { report } => {
            println!("# Medical Analysis Report\n");
            println!("{}", report);
            println!("\n---\n{}", MEDICAL_DISCLAIMER);
            Ok(())
        }
        AnalysisResult::Failure { message, .. } => {
            anyhow::bail!(
                "{}\nIf you're experiencing timeout errors, try restarting Ollama or increasing --timeout-secs.",
                message
            )
        }
    }
}

fn print_status(client: &OllamaClient, status: &ConnectionStatus, policy: ModelMatch) {
    if !status.connected {
        println!("Cannot connect to Ollama at {}", client.base_url());
        println!("Please ensure Ollama is running: `ollama serve`");
        return;
    }

    println!("Ollama is connected at {}", client.base_url());
    println!("Available Models:");
    for line in model_lines(status, client.model()) {
        println!("  {}", line);
    }

    if !is_model_available(status, client.model(), policy) {
        println!(
            "Required model '{}' is not loaded. Run: ollama pull {}",
            client.model(),
            client.model()
        );
    }
}

fn model_lines(status: &ConnectionStatus, configured: &str) -> Vec<String> {
    status
        .models
        .iter()
        .map(|name| match ModelTag::for_model(name, configured) {
            ModelTag::Configured => format!("[med] {} (configured)", name),
            ModelTag::Medical => format!("[med] {}", name),
            ModelTag::Other => format!("- {}", name),
        })
        .collect()
}

fn mime_type_for_path(path: &Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    mime_type_for_extension(ext).with_context(|| {
        format!(
            "Unsupported file type '{}'; expected one of: {}",
            path.display(),
            ACCEPTED_EXTENSIONS.join(", ")
        )
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn read_text_input(text: Option<String>, file: Option<&Path>) -> Result<String> {
    match (text, file) {
        (Some(text), _) => Ok(text),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read text from {}", path.display())),
        (None, None) => anyhow::bail!("Provide the text to analyze or --file <PATH>"),
    }
}
