//! Application setup and initialization
//!
//! Initialization logic lives here rather than in main.rs so each stage can
//! be exercised on its own.

pub mod routes;
pub mod server;
pub mod storage;

use std::sync::Arc;

use anyhow::Result;

use mediagate_core::Config;
use mediagate_processing::{FfmpegTranscoder, TranscodePipeline};

use crate::state::AppState;

/// Initialize the entire application
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    let store = storage::setup_storage(&config).await?;

    let transcoder = Arc::new(FfmpegTranscoder::new(
        config.ffmpeg_path.clone(),
        config.hls_segment_duration,
    ));
    let pipeline = Arc::new(TranscodePipeline::new(Arc::clone(&store), transcoder));

    let state = Arc::new(AppState::new(config.clone(), store, pipeline));
    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
