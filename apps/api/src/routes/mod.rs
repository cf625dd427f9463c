pub mod health;
pub mod jobs;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/process-job", post(jobs::handle_process_job))
        .with_state(state)
}
