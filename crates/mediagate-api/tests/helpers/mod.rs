//! Shared test fixtures: an in-memory object store and a transcoder fake
//! behind the real router.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum_test::TestServer;
use tokio::sync::mpsc;

use mediagate_api::setup::routes::setup_routes;
use mediagate_api::state::AppState;
use mediagate_core::Config;
use mediagate_processing::{
    ProgressUpdate, TranscodeError, TranscodePipeline, Transcoder,
};
use mediagate_storage::{MemoryObjectStore, ObjectStore};

pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<MemoryObjectStore>,
}

pub fn test_config() -> Config {
    Config {
        server_port: 0,
        environment: "test".to_string(),
        cors_origins: vec!["*".to_string()],
        s3_bucket: "test-bucket".to_string(),
        s3_region: "us-east-1".to_string(),
        s3_endpoint: None,
        s3_force_path_style: true,
        ffmpeg_path: "ffmpeg".to_string(),
        hls_segment_duration: 2,
        max_upload_bytes: 10 * 1024 * 1024,
    }
}

/// Transcoder fake that writes `segments` .ts files plus a playlist.
pub struct FakeTranscoder {
    pub segments: usize,
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(
        &self,
        _input: &Path,
        output_dir: &Path,
        base_id: &str,
        progress: mpsc::UnboundedSender<ProgressUpdate>,
    ) -> Result<PathBuf, TranscodeError> {
        let _ = progress.send(ProgressUpdate {
            frame: Some(1),
            ..Default::default()
        });

        for i in 0..self.segments {
            tokio::fs::write(
                output_dir.join(format!("{base_id}_{i:03}.ts")),
                b"segment-data",
            )
            .await?;
        }
        let playlist = output_dir.join(format!("{base_id}.m3u8"));
        tokio::fs::write(&playlist, b"#EXTM3U\n").await?;

        let _ = progress.send(ProgressUpdate {
            finished: true,
            ..Default::default()
        });
        Ok(playlist)
    }
}

pub fn setup_test_app() -> TestApp {
    let config = test_config();
    let store = Arc::new(MemoryObjectStore::new());
    let pipeline = Arc::new(TranscodePipeline::new(
        Arc::clone(&store) as Arc<dyn ObjectStore>,
        Arc::new(FakeTranscoder { segments: 2 }),
    ));

    let state = Arc::new(AppState::new(
        config.clone(),
        Arc::clone(&store) as Arc<dyn ObjectStore>,
        pipeline,
    ));
    let router = setup_routes(&config, state).expect("router setup");
    let server = TestServer::new(router).expect("test server");

    TestApp { server, store }
}
