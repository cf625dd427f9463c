use std::io::Write;
use std::path::Path;

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::acquisition::{JobPosting, JobReference};
use crate::errors::AppError;
use crate::pipeline::RunReport;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ProcessJobResponse {
    pub status: &'static str,
    pub message: String,
    pub output: RunReport,
}

/// POST /process-job
/// Turns a posting captured by the browser extension into a CV and cover letter.
/// Every request gets its own `<output_root>/<uuid>` directory.
pub async fn handle_process_job(
    State(state): State<AppState>,
    Json(posting): Json<JobPosting>,
) -> Result<Json<ProcessJobResponse>, AppError> {
    if posting.is_empty() {
        return Err(AppError::Validation("No job data provided".to_string()));
    }
    info!(
        title = %posting.title,
        company = %posting.company,
        location = %posting.location,
        "received job posting"
    );

    // Removed when dropped, whichever way the run ends.
    let mut page = tempfile::Builder::new()
        .prefix("job-")
        .suffix(".html")
        .tempfile()
        .map_err(|e| AppError::Internal(e.into()))?;
    page.write_all(posting.to_html().as_bytes())
        .map_err(|e| AppError::Internal(e.into()))?;

    let out_dir = state.config.output_root.join(Uuid::new_v4().to_string());
    let pipeline = state.pipeline.clone();

    // The run owns everything it touches, so a dropped request does not cancel it.
    let run = tokio::spawn(async move {
        let reference = JobReference::File(page.path().to_path_buf());
        let result = pipeline.run(&reference, &out_dir).await;
        if result.is_err() {
            discard_empty_run_dir(&out_dir);
        }
        result
    });
    let report = run.await.map_err(|e| AppError::Internal(e.into()))??;

    Ok(Json(ProcessJobResponse {
        status: "success",
        message: "CV and cover letter generated successfully".to_string(),
        output: report,
    }))
}

/// Removes a run directory that a failed run left empty. `remove_dir` refuses
/// non-empty directories, so partial artifacts stay.
fn discard_empty_run_dir(dir: &Path) {
    match std::fs::remove_dir(dir) {
        Ok(()) => debug!(path = %dir.display(), "removed empty run directory"),
        Err(e) => debug!(path = %dir.display(), error = %e, "run directory kept"),
    }
}
