//! Rasterization engines: HTML → PDF bytes, PDF → first-page JPEG bytes.
//!
//! `CommandRasterEngine` drives the external `weasyprint` and `pdftoppm` binaries.
//! Each conversion works inside its own temporary directory, removed on every exit path.

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::tempdir;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to prepare scratch files: {0}")]
    Scratch(#[source] std::io::Error),

    #[error("failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with status {code}: {stderr}")]
    Exit {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("'{program}' produced no output")]
    EmptyOutput { program: String },
}

/// The external rasterization primitive. Implementations must be deterministic for a
/// given input up to the underlying engine's own font/layout behaviour.
pub trait RasterEngine: Send + Sync {
    fn html_to_pdf(&self, html: &str) -> Result<Vec<u8>, EngineError>;

    /// Rasterizes only the first page of `pdf`.
    fn pdf_to_jpeg(&self, pdf: &[u8]) -> Result<Vec<u8>, EngineError>;
}

#[derive(Debug, Clone)]
pub struct CommandRasterEngine {
    weasyprint: PathBuf,
    pdftoppm: PathBuf,
    dpi: u32,
}

impl CommandRasterEngine {
    pub fn new(weasyprint: impl Into<PathBuf>, pdftoppm: impl Into<PathBuf>, dpi: u32) -> Self {
        Self {
            weasyprint: weasyprint.into(),
            pdftoppm: pdftoppm.into(),
            dpi,
        }
    }
}

impl RasterEngine for CommandRasterEngine {
    fn html_to_pdf(&self, html: &str) -> Result<Vec<u8>, EngineError> {
        let scratch = tempdir().map_err(EngineError::Scratch)?;
        let input = scratch.path().join("document.html");
        let output = scratch.path().join("document.pdf");
        std::fs::write(&input, html).map_err(EngineError::Scratch)?;

        let mut command = Command::new(&self.weasyprint);
        command.arg(&input).arg(&output).current_dir(scratch.path());
        run(&mut command, &self.weasyprint)?;

        read_output(&output, &self.weasyprint)
    }

    fn pdf_to_jpeg(&self, pdf: &[u8]) -> Result<Vec<u8>, EngineError> {
        let scratch = tempdir().map_err(EngineError::Scratch)?;
        let input = scratch.path().join("document.pdf");
        let prefix = scratch.path().join("page");
        std::fs::write(&input, pdf).map_err(EngineError::Scratch)?;

        let mut command = Command::new(&self.pdftoppm);
        command
            .args(["-jpeg", "-jpegopt", "quality=95", "-singlefile", "-f", "1", "-l", "1"])
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(&input)
            .arg(&prefix)
            .current_dir(scratch.path());
        run(&mut command, &self.pdftoppm)?;

        read_output(&prefix.with_extension("jpg"), &self.pdftoppm)
    }
}

fn run(command: &mut Command, program: &Path) -> Result<(), EngineError> {
    let program = program.display().to_string();
    debug!(%program, "running rasterization engine");

    let output = command.output().map_err(|source| EngineError::Spawn {
        program: program.clone(),
        source,
    })?;

    if !output.status.success() {
        return Err(EngineError::Exit {
            program,
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

fn read_output(path: &Path, program: &Path) -> Result<Vec<u8>, EngineError> {
    let empty = || EngineError::EmptyOutput {
        program: program.display().to_string(),
    };
    let bytes = std::fs::read(path).map_err(|_| empty())?;
    if bytes.is_empty() {
        return Err(empty());
    }
    Ok(bytes)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_binary_reports_spawn_error() {
        let engine = CommandRasterEngine::new("/nonexistent/weasyprint", "/nonexistent/pdftoppm", 150);
        let err = engine.html_to_pdf("<html></html>").unwrap_err();
        assert!(matches!(err, EngineError::Spawn { ref program, .. } if program.contains("weasyprint")));
    }

    #[test]
    #[ignore = "requires weasyprint and pdftoppm on PATH"]
    fn test_real_engine_produces_pdf_and_jpeg() {
        let engine = CommandRasterEngine::new("weasyprint", "pdftoppm", 72);
        let pdf = engine
            .html_to_pdf("<html><body><h1>Hello</h1></body></html>")
            .unwrap();
        assert!(pdf.starts_with(b"%PDF"));
        let jpeg = engine.pdf_to_jpeg(&pdf).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }
}
