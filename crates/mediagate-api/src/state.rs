//! Shared application state.

use std::sync::Arc;

use mediagate_core::Config;
use mediagate_processing::TranscodePipeline;
use mediagate_storage::ObjectStore;

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn ObjectStore>,
    pub pipeline: Arc<TranscodePipeline>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn ObjectStore>,
        pipeline: Arc<TranscodePipeline>,
    ) -> Self {
        Self {
            config,
            store,
            pipeline,
        }
    }
}
