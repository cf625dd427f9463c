mod acquisition;
mod config;
mod errors;
mod llm_client;
mod models;
mod pipeline;
mod raster;
mod render;
mod routes;
mod schema;
mod state;
mod validation;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::acquisition::JobReference;
use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::pipeline::{BaseDocuments, Pipeline, Publisher, RetryPolicy, RunFailure, RunReport};
use crate::raster::{CommandRasterEngine, Rasterizer};
use crate::render::{DirectoryTemplates, Renderer};
use crate::routes::build_router;
use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(author, version, about = "Tailors a CV and cover letter to a job posting and renders them to PDF and JPEG.")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP trigger used by the browser extension (default).
    Serve,
    /// Run the full pipeline once for a job URL, file, or pasted text.
    Run {
        #[arg(long, help = "Job posting URL, file path / file:// URL, or raw text.")]
        job: String,
        #[arg(long, help = "Output directory. Defaults to TAILOR_OUTPUT_ROOT.")]
        out: Option<PathBuf>,
    },
    /// Validate, render and rasterize existing CV and cover letter JSON without authoring.
    Render {
        #[arg(long, help = "CV JSON file. Defaults to TAILOR_BASE_CV.")]
        cv: Option<PathBuf>,
        #[arg(long, help = "Cover letter JSON file. Defaults to TAILOR_BASE_COVER_LETTER.")]
        cover_letter: Option<PathBuf>,
        #[arg(long, help = "Output directory. Defaults to TAILOR_OUTPUT_ROOT.")]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting tailor v{}", env!("CARGO_PKG_VERSION"));

    // Templates must agree with the schemas before any run starts
    let templates = DirectoryTemplates::new(&config.template_dir);
    let template_dir = templates.dir().display().to_string();
    let renderer = Renderer::new(Arc::new(templates));
    renderer
        .verify()
        .with_context(|| format!("templates in {template_dir} are not usable"))?;
    info!("Templates verified in {template_dir}");

    let engine = CommandRasterEngine::new(
        &config.weasyprint_bin,
        &config.pdftoppm_bin,
        config.jpeg_dpi,
    );
    let publisher = Publisher::new(renderer, Rasterizer::new(Arc::new(engine)));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let pipeline = build_pipeline(&config, publisher)?;
            serve(config, pipeline).await
        }
        Command::Run { job, out } => {
            let pipeline = build_pipeline(&config, publisher)?;
            let out = out.unwrap_or_else(|| config.output_root.clone());
            let result = pipeline.run(&JobReference::parse(&job), &out).await;
            finish(result)
        }
        Command::Render {
            cv,
            cover_letter,
            out,
        } => {
            let cv = load_json(cv.as_deref().unwrap_or(&config.base_cv))?;
            let letter = load_json(cover_letter.as_deref().unwrap_or(&config.base_cover_letter))?;
            let out = out.unwrap_or_else(|| config.output_root.clone());
            let result = publisher.publish_documents(&cv, &letter, &out).await;
            finish(result)
        }
    }
}

fn build_pipeline(config: &Config, publisher: Publisher) -> Result<Pipeline> {
    let llm = LlmClient::new(config.require_api_key()?)?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let base = BaseDocuments {
        cv: load_json(&config.base_cv)?,
        cover_letter: load_json(&config.base_cover_letter)?,
    };
    let policy = RetryPolicy {
        max_authoring_retries: config.max_authoring_retries,
    };
    info!(
        "Authoring retries: {}, base documents: {} / {}",
        policy.max_authoring_retries,
        config.base_cv.display(),
        config.base_cover_letter.display()
    );

    Ok(Pipeline::new(
        Arc::new(llm),
        reqwest::Client::new(),
        publisher,
        base,
        policy,
    ))
}

async fn serve(config: Config, pipeline: Pipeline) -> Result<()> {
    let port = config.port;
    let state = AppState {
        config: Arc::new(config),
        pipeline: Arc::new(pipeline),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // browser extension calls from its own origin

    let addr: SocketAddr = format!("0.0.0.0:{port}").parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Prints the run report, or the captured log and the failed stage, exiting non-zero.
fn finish(result: Result<RunReport, RunFailure>) -> Result<()> {
    match result {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Err(failure) => {
            error!(stage = %failure.stage(), "run failed: {failure}");
            eprintln!("{}", failure_output(&failure));
            Err(failure.into())
        }
    }
}

fn failure_output(failure: &RunFailure) -> String {
    let mut out = failure.log.join("\n");
    if let Some(report) = failure.validation_report() {
        out.push_str("\n\n");
        out.push_str(&report.to_feedback());
    }
    out
}

fn load_json(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_serve() {
        let cli = Cli::try_parse_from(["tailor"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parses_run_and_render() {
        let cli = Cli::try_parse_from(["tailor", "run", "--job", "https://jobs.example.com/1"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Run { ref job, out: None }) if job == "https://jobs.example.com/1"
        ));

        let cli = Cli::try_parse_from([
            "tailor",
            "render",
            "--cv",
            "cv.json",
            "--cover-letter",
            "letter.json",
            "--out",
            "out",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Render { cv: Some(_), cover_letter: Some(_), out: Some(_) })
        ));
    }

    #[test]
    fn test_shipped_base_documents_load_and_validate() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR"));
        let cv = load_json(&root.join("fixtures/base_cv.json")).unwrap();
        let letter = load_json(&root.join("fixtures/base_cover_letter.json")).unwrap();
        validation::validate(&cv, &schema::CV_SCHEMA).unwrap();
        validation::validate(&letter, &schema::COVER_LETTER_SCHEMA).unwrap();
    }

    #[test]
    fn test_failure_output_includes_log_and_feedback() {
        let report = validation::validate(&serde_json::json!({}), &schema::COVER_LETTER_SCHEMA)
            .unwrap_err();
        let failure = RunFailure {
            error: pipeline::PipelineError::Validation { report, attempts: 2 },
            log: vec![
                "[authoring] drafting cover letter (attempt 1)".to_string(),
                "[validation] run failed".to_string(),
            ],
        };

        let out = failure_output(&failure);
        assert!(out.starts_with("[authoring] drafting cover letter (attempt 1)\n[validation] run failed"));
        assert!(out.contains("paragraphs"));
    }

    #[test]
    fn test_load_json_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = load_json(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }
}
