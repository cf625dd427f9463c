use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::pipeline::{OutputDirError, PipelineError, RunFailure};

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Pipeline(#[from] RunFailure),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Pipeline(failure) => pipeline_status(&failure.error),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
        };

        let mut error = json!({
            "code": code,
            "message": match &self {
                AppError::Internal(_) => "An internal server error occurred".to_string(),
                other => other.to_string(),
            },
        });

        let mut body = json!({ "status": "error", "error": error });

        if let AppError::Pipeline(failure) = &self {
            body["error"]["stage"] = json!(failure.stage());
            if let Some(report) = failure.validation_report() {
                body["error"]["violations"] = json!(report.violations);
            }
            body["log"] = json!(failure.log);
        }

        (status, Json(body)).into_response()
    }
}

fn pipeline_status(e: &PipelineError) -> (StatusCode, &'static str) {
    match e {
        PipelineError::Acquisition(_) => (StatusCode::UNPROCESSABLE_ENTITY, "ACQUISITION_ERROR"),
        PipelineError::Authoring { .. } => {
            tracing::error!("Authoring error: {e}");
            (StatusCode::BAD_GATEWAY, "AUTHORING_ERROR")
        }
        PipelineError::Validation { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "DOCUMENT_VALIDATION_ERROR")
        }
        PipelineError::Rendering { .. } => {
            tracing::error!("Rendering error: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "RENDERING_ERROR")
        }
        PipelineError::Rasterization(_) | PipelineError::RasterTask(_) => {
            tracing::error!("Rasterization error: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "RASTERIZATION_ERROR")
        }
        PipelineError::OutputDir(OutputDirError::Busy(_)) => (StatusCode::CONFLICT, "OUTPUT_DIR_BUSY"),
        PipelineError::OutputDir(OutputDirError::Io { .. }) => {
            tracing::error!("Output directory error: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "OUTPUT_DIR_ERROR")
        }
    }
}
