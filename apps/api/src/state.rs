use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::Pipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Each request runs its own pass through this pipeline in a fresh output directory.
    pub pipeline: Arc<Pipeline>,
}
