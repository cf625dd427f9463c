//! Rasterizer: writes rendered HTML to disk as PDF and first-page JPEG.
//!
//! Conversions are blocking; async callers run them inside `tokio::task::spawn_blocking`.
//! Every artifact is written to a temporary file beside its destination and persisted
//! with a rename, so a failed write never leaves a partial file at the output path.

pub mod engine;

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::info;

use crate::schema::DocumentKind;

pub use engine::{CommandRasterEngine, EngineError, RasterEngine};

static PAGE_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/Type\s*/Page(?-u:\b)").expect("page regex is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Pdf,
    Jpeg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Pdf => "pdf",
            OutputFormat::Jpeg => "jpg",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Pdf => f.write_str("pdf"),
            OutputFormat::Jpeg => f.write_str("jpeg"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RasterCause {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("output file I/O failed: {0}")]
    Io(#[source] std::io::Error),
}

/// A rasterization failure, with enough context for the caller to decide whether to
/// abort or keep producing the remaining artifacts.
#[derive(Debug, Error)]
#[error("failed to rasterize {document} as {format} to {}: {cause}", .path.display())]
pub struct RasterError {
    pub document: DocumentKind,
    pub format: OutputFormat,
    pub path: PathBuf,
    #[source]
    pub cause: RasterCause,
}

/// One file written by the rasterizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub document: DocumentKind,
    pub format: OutputFormat,
    pub path: PathBuf,
    pub bytes: u64,
}

#[derive(Clone)]
pub struct Rasterizer {
    engine: Arc<dyn RasterEngine>,
}

impl Rasterizer {
    pub fn new(engine: Arc<dyn RasterEngine>) -> Self {
        Self { engine }
    }

    /// Writes `html` to `path` in the requested format. For JPEG only the first page
    /// of the rendered document is kept.
    pub fn rasterize(
        &self,
        document: DocumentKind,
        html: &str,
        format: OutputFormat,
        path: &Path,
    ) -> Result<Artifact, RasterError> {
        let fail = |cause: RasterCause| RasterError {
            document,
            format,
            path: path.to_path_buf(),
            cause,
        };

        let pdf = self
            .engine
            .html_to_pdf(html)
            .map_err(|e| fail(RasterCause::Engine(e)))?;
        let bytes = match format {
            OutputFormat::Pdf => pdf,
            OutputFormat::Jpeg => self
                .engine
                .pdf_to_jpeg(&pdf)
                .map_err(|e| fail(RasterCause::Engine(e)))?,
        };

        self.persist(document, format, path, &bytes)
    }

    /// Produces `<dir>/<stem>.pdf`, then `<dir>/<stem>.jpg` from that same PDF, so the
    /// HTML is converted only once.
    pub fn rasterize_document(
        &self,
        document: DocumentKind,
        html: &str,
        dir: &Path,
    ) -> Result<Vec<Artifact>, RasterError> {
        let pdf_path = artifact_path(dir, document, OutputFormat::Pdf);
        let pdf_artifact = self.rasterize(document, html, OutputFormat::Pdf, &pdf_path)?;

        let jpeg_path = artifact_path(dir, document, OutputFormat::Jpeg);
        let fail = |cause: RasterCause| RasterError {
            document,
            format: OutputFormat::Jpeg,
            path: jpeg_path.clone(),
            cause,
        };
        let pdf = std::fs::read(&pdf_path).map_err(|e| fail(RasterCause::Io(e)))?;
        let jpeg = self
            .engine
            .pdf_to_jpeg(&pdf)
            .map_err(|e| fail(RasterCause::Engine(e)))?;
        let jpeg_artifact = self.persist(document, OutputFormat::Jpeg, &jpeg_path, &jpeg)?;

        info!(
            document = %document,
            pages = page_count(&pdf),
            "rasterized to {} and {}",
            pdf_path.display(),
            jpeg_path.display()
        );
        Ok(vec![pdf_artifact, jpeg_artifact])
    }

    fn persist(
        &self,
        document: DocumentKind,
        format: OutputFormat,
        path: &Path,
        bytes: &[u8],
    ) -> Result<Artifact, RasterError> {
        write_atomic(path, bytes).map_err(|e| RasterError {
            document,
            format,
            path: path.to_path_buf(),
            cause: RasterCause::Io(e),
        })?;

        Ok(Artifact {
            document,
            format,
            path: path.to_path_buf(),
            bytes: bytes.len() as u64,
        })
    }
}

pub fn artifact_path(dir: &Path, document: DocumentKind, format: OutputFormat) -> PathBuf {
    dir.join(format!("{}.{}", document.stem(), format.extension()))
}

/// Counts page objects in a PDF byte stream (`/Type /Page`, not `/Pages`).
///
/// Only uncompressed page dictionaries are visible to this scan. Pages stored in
/// compressed object streams (PDF 1.5+) are not counted, so the result is a lower
/// bound and may be 0 for real engine output. It feeds log lines only.
pub fn page_count(pdf: &[u8]) -> usize {
    PAGE_OBJECT.find_iter(pdf).count()
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
