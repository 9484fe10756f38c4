//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use tirage_chat::ChatPipeline;
use tirage_core::config::TirageConfig;

/// Shared application state, passed to handlers via axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<TirageConfig>,
    pub pipeline: Arc<ChatPipeline>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: TirageConfig, pipeline: ChatPipeline) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            start_time: Instant::now(),
        }
    }
}
