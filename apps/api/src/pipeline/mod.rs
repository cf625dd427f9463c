//! Pipeline coordinator: job reference → validated CV and cover letter → PDF/JPEG files.
//!
//! Stages run strictly in order: acquisition, authoring, validation, rendering,
//! rasterization. Any stage failure aborts the run with a `PipelineError` naming the
//! stage; nothing downstream ever sees an unvalidated document.

pub mod prompts;

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::acquisition::{self, AcquisitionError, JobDescription, JobReference};
use crate::llm_client::{extract_json_object, Author, LlmError};
use crate::models::{CoverLetter, Cv};
use crate::raster::{Artifact, RasterError, Rasterizer};
use crate::render::{RenderError, Renderer};
use crate::schema::{Document, DocumentKind};
use crate::validation::{validate_document, ValidationReport};

const LOCK_FILE: &str = ".tailor.lock";

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Acquisition,
    Authoring,
    Validation,
    Rendering,
    Rasterization,
    Persistence,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Acquisition => "acquisition",
            Stage::Authoring => "authoring",
            Stage::Validation => "validation",
            Stage::Rendering => "rendering",
            Stage::Rasterization => "rasterization",
            Stage::Persistence => "persistence",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum OutputDirError {
    #[error("output directory {} is already claimed by another run", .0.display())]
    Busy(PathBuf),

    #[error("failed to prepare output directory {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("acquisition failed: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("authoring the {document} failed: {source}")]
    Authoring {
        document: DocumentKind,
        #[source]
        source: LlmError,
    },

    #[error("validation failed after {attempts} attempt(s): {report}")]
    Validation {
        report: ValidationReport,
        attempts: usize,
    },

    #[error("rendering the {document} failed: {source}")]
    Rendering {
        document: DocumentKind,
        #[source]
        source: RenderError,
    },

    #[error(transparent)]
    Rasterization(#[from] RasterError),

    #[error("rasterization task failed: {0}")]
    RasterTask(#[source] tokio::task::JoinError),

    #[error(transparent)]
    OutputDir(#[from] OutputDirError),
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Acquisition(_) => Stage::Acquisition,
            PipelineError::Authoring { .. } => Stage::Authoring,
            PipelineError::Validation { .. } => Stage::Validation,
            PipelineError::Rendering { .. } => Stage::Rendering,
            PipelineError::Rasterization(_) | PipelineError::RasterTask(_) => Stage::Rasterization,
            PipelineError::OutputDir(_) => Stage::Persistence,
        }
    }

    pub fn validation_report(&self) -> Option<&ValidationReport> {
        match self {
            PipelineError::Validation { report, .. } => Some(report),
            _ => None,
        }
    }
}

/// A failed run: the error plus the log lines captured up to the failure.
#[derive(Debug)]
pub struct RunFailure {
    pub error: PipelineError,
    pub log: Vec<String>,
}

impl RunFailure {
    pub fn stage(&self) -> Stage {
        self.error.stage()
    }

    pub fn validation_report(&self) -> Option<&ValidationReport> {
        self.error.validation_report()
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.error)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Output directory claim
// ────────────────────────────────────────────────────────────────────────────

/// Exclusive claim on an output directory for the lifetime of one run.
/// The lock file is removed when the claim is dropped, on success or failure.
#[derive(Debug)]
pub struct OutputDir {
    path: PathBuf,
    lock: PathBuf,
}

impl OutputDir {
    pub fn claim(path: &Path) -> Result<Self, OutputDirError> {
        Self::claim_with(path, |file| {
            writeln!(file, "pid={} claimed_at={}", std::process::id(), Utc::now().to_rfc3339())
        })
    }

    fn claim_with(
        path: &Path,
        stamp: impl FnOnce(&mut File) -> std::io::Result<()>,
    ) -> Result<Self, OutputDirError> {
        let io_err = |source| OutputDirError::Io {
            path: path.to_path_buf(),
            source,
        };

        std::fs::create_dir_all(path).map_err(io_err)?;

        let lock = path.join(LOCK_FILE);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&lock) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(OutputDirError::Busy(path.to_path_buf()));
            }
            Err(e) => return Err(io_err(e)),
        };

        // The claim owns the lock from here, so a failed stamp still releases it.
        let claim = Self {
            path: path.to_path_buf(),
            lock,
        };
        stamp(&mut file).map_err(io_err)?;
        Ok(claim)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for OutputDir {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.lock) {
            warn!(path = %self.lock.display(), error = %e, "failed to release output directory lock");
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Run log and report
// ────────────────────────────────────────────────────────────────────────────

/// Per-stage lines captured for the caller, mirrored to tracing.
#[derive(Debug)]
pub struct RunLog {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    lines: Vec<String>,
}

impl RunLog {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            lines: Vec::new(),
        }
    }

    pub fn record(&mut self, stage: Stage, message: impl Into<String>) {
        let message = message.into();
        info!(run_id = %self.run_id, %stage, "{message}");
        self.lines.push(format!("[{stage}] {message}"));
    }

    fn fail(mut self, error: PipelineError) -> RunFailure {
        warn!(run_id = %self.run_id, stage = %error.stage(), "run failed: {error}");
        self.lines.push(format!("[{}] run failed: {error}", error.stage()));
        RunFailure {
            error,
            log: self.lines,
        }
    }

    fn finish(
        self,
        job_title: Option<String>,
        output_dir: &Path,
        artifacts: Vec<Artifact>,
    ) -> RunReport {
        RunReport {
            run_id: self.run_id,
            job_title,
            output_dir: output_dir.to_path_buf(),
            artifacts,
            log: self.lines,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub job_title: Option<String>,
    pub output_dir: PathBuf,
    pub artifacts: Vec<Artifact>,
    pub log: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

// ────────────────────────────────────────────────────────────────────────────
// Publisher: validated documents → files
// ────────────────────────────────────────────────────────────────────────────

/// Rendering and rasterization of already-validated documents.
#[derive(Clone)]
pub struct Publisher {
    renderer: Renderer,
    rasterizer: Rasterizer,
}

impl Publisher {
    pub fn new(renderer: Renderer, rasterizer: Rasterizer) -> Self {
        Self {
            renderer,
            rasterizer,
        }
    }

    /// Renders both documents, then rasterizes them into `dir`. Both HTML strings are
    /// produced before any file is written. The claim moves into the blocking task and
    /// is released only when the last write has returned.
    pub async fn publish(
        &self,
        cv: &Cv,
        cover_letter: &CoverLetter,
        dir: OutputDir,
        log: &mut RunLog,
    ) -> Result<Vec<Artifact>, PipelineError> {
        let cv_html = self.render(cv)?;
        let letter_html = self.render(cover_letter)?;
        log.record(
            Stage::Rendering,
            format!(
                "rendered cv ({} bytes) and cover letter ({} bytes)",
                cv_html.len(),
                letter_html.len()
            ),
        );

        let rasterizer = self.rasterizer.clone();
        let artifacts = tokio::task::spawn_blocking(move || -> Result<Vec<Artifact>, RasterError> {
            let target = dir.path();
            let mut artifacts = rasterizer.rasterize_document(DocumentKind::Cv, &cv_html, target)?;
            artifacts.extend(rasterizer.rasterize_document(
                DocumentKind::CoverLetter,
                &letter_html,
                target,
            )?);
            Ok(artifacts)
        })
        .await
        .map_err(PipelineError::RasterTask)??;

        for artifact in &artifacts {
            log.record(
                Stage::Rasterization,
                format!("wrote {} ({} bytes)", artifact.path.display(), artifact.bytes),
            );
        }
        Ok(artifacts)
    }

    /// Render-only run: validates pre-authored JSON documents and publishes them.
    pub async fn publish_documents(
        &self,
        cv: &Value,
        cover_letter: &Value,
        out_dir: &Path,
    ) -> Result<RunReport, RunFailure> {
        let mut log = RunLog::new();
        match self.publish_values(cv, cover_letter, out_dir, &mut log).await {
            Ok(artifacts) => Ok(log.finish(None, out_dir, artifacts)),
            Err(error) => Err(log.fail(error)),
        }
    }

    async fn publish_values(
        &self,
        cv: &Value,
        cover_letter: &Value,
        out_dir: &Path,
        log: &mut RunLog,
    ) -> Result<Vec<Artifact>, PipelineError> {
        let dir = OutputDir::claim(out_dir)?;

        let cv: Cv = validate_once(cv)?;
        let letter: CoverLetter = validate_once(cover_letter)?;
        log.record(Stage::Validation, "cv and cover letter passed validation");

        self.publish(&cv, &letter, dir, log).await
    }

    fn render<D: Document>(&self, document: &D) -> Result<String, PipelineError> {
        self.renderer
            .render(document)
            .map_err(|source| PipelineError::Rendering {
                document: D::KIND,
                source,
            })
    }
}

fn validate_once<D: Document>(value: &Value) -> Result<D, PipelineError> {
    validate_document(value).map_err(|report| PipelineError::Validation {
        report,
        attempts: 1,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Re-prompts allowed after a draft fails validation.
    pub max_authoring_retries: usize,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_authoring_retries: 1,
        }
    }
}

/// Base documents the authoring prompts start from.
#[derive(Debug, Clone)]
pub struct BaseDocuments {
    pub cv: Value,
    pub cover_letter: Value,
}

impl BaseDocuments {
    fn for_kind(&self, kind: DocumentKind) -> &Value {
        match kind {
            DocumentKind::Cv => &self.cv,
            DocumentKind::CoverLetter => &self.cover_letter,
        }
    }
}

#[derive(Clone)]
pub struct Pipeline {
    author: Arc<dyn Author>,
    http: reqwest::Client,
    publisher: Publisher,
    base: BaseDocuments,
    policy: RetryPolicy,
}

impl Pipeline {
    pub fn new(
        author: Arc<dyn Author>,
        http: reqwest::Client,
        publisher: Publisher,
        base: BaseDocuments,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            author,
            http,
            publisher,
            base,
            policy,
        }
    }

    /// One complete run for one job posting. `out_dir` must not be in use by another run.
    /// On failure the log captured so far travels with the error.
    pub async fn run(
        &self,
        reference: &JobReference,
        out_dir: &Path,
    ) -> Result<RunReport, RunFailure> {
        let mut log = RunLog::new();
        match self.run_stages(reference, out_dir, &mut log).await {
            Ok((job_title, artifacts)) => Ok(log.finish(job_title, out_dir, artifacts)),
            Err(error) => Err(log.fail(error)),
        }
    }

    async fn run_stages(
        &self,
        reference: &JobReference,
        out_dir: &Path,
        log: &mut RunLog,
    ) -> Result<(Option<String>, Vec<Artifact>), PipelineError> {
        let dir = OutputDir::claim(out_dir)?;
        log.record(
            Stage::Acquisition,
            format!("reading job description from {}", reference.describe()),
        );

        let job = acquisition::acquire(reference, &self.http).await?;
        log.record(
            Stage::Acquisition,
            format!(
                "job '{}' ({} characters)",
                job.title.as_deref().unwrap_or("untitled"),
                job.text.chars().count()
            ),
        );

        let cv: Cv = self.author_document(&job, log).await?;
        let letter: CoverLetter = self.author_document(&job, log).await?;

        let artifacts = self.publisher.publish(&cv, &letter, dir, log).await?;
        Ok((job.title, artifacts))
    }

    /// Drafts one document, re-prompting with the violation list while retries remain.
    async fn author_document<D: Document>(
        &self,
        job: &JobDescription,
        log: &mut RunLog,
    ) -> Result<D, PipelineError> {
        let kind = D::KIND;
        let authoring_err = |source| PipelineError::Authoring {
            document: kind,
            source,
        };

        let job_text = match &job.title {
            Some(title) => format!("{title}\n\n{}", job.text),
            None => job.text.clone(),
        };
        let base = format!("{:#}", self.base.for_kind(kind));
        let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
        let system = prompts::system_for(kind);
        let original = prompts::authoring_prompt(kind, &base, &job_text, &today);

        let mut prompt = original.clone();
        let mut attempts = 0;
        loop {
            attempts += 1;
            log.record(Stage::Authoring, format!("drafting {kind} (attempt {attempts})"));

            let draft = self.author.draft(&prompt, &system).await.map_err(authoring_err)?;
            let value = extract_json_object(&draft).map_err(authoring_err)?;

            match validate_document::<D>(&value) {
                Ok(document) => {
                    log.record(Stage::Validation, format!("{kind} passed validation"));
                    return Ok(document);
                }
                Err(report) if attempts <= self.policy.max_authoring_retries => {
                    warn!(document = %kind, violations = report.violations.len(), "draft rejected, re-prompting");
                    log.record(
                        Stage::Validation,
                        format!("{kind} rejected with {} violation(s)", report.violations.len()),
                    );
                    prompt = prompts::correction_prompt(&original, kind, &report.to_feedback());
                }
                Err(report) => {
                    log.record(Stage::Validation, format!("{kind} rejected: {report}"));
                    return Err(PipelineError::Validation { report, attempts });
                }
            }
        }
    }
}
