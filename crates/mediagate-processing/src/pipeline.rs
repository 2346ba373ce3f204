//! Transcode-and-publish pipeline.
//!
//! A submitted video is materialized to a temp file, transcoded to an HLS
//! rendition in a temp directory, and every produced file is uploaded to the
//! object store. The caller observes the job through an event channel that
//! always ends with a terminal `Done` or `Error` event, after which both temp
//! locations are removed exactly once.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

use mediagate_core::headers::ORIGINAL_FILENAME_KEY;
use mediagate_core::AppError;
use mediagate_storage::{ByteStream, ObjectStore, StorageResult};

use crate::events::{DoneSummary, SavingOutcome, TranscodeEvent};
use crate::ffmpeg::Transcoder;

/// Only `video/*` payloads are accepted for transcoding.
pub const VIDEO_CONTENT_TYPE_PREFIX: &str = "video/";

/// A running transcode job handed back to the caller.
#[derive(Debug)]
pub struct TranscodeJob {
    /// Time-ordered identifier naming the playlist and every segment.
    pub base_id: String,
    /// Playlist filename, `{base_id}.m3u8`.
    pub playlist: String,
    /// Ordered event stream; closes after the terminal event.
    pub events: mpsc::UnboundedReceiver<TranscodeEvent>,
    /// Handle for early cleanup when the caller abandons the job.
    pub cleanup: CleanupGuard,
}

/// Removes a job's temp input file and output directory.
///
/// Both the pipeline's completion path and the caller's disconnect path hold
/// a clone; an atomic flag guarantees the filesystem walk runs once no matter
/// how many times or from where `run` is invoked.
#[derive(Clone, Debug)]
pub struct CleanupGuard {
    inner: Arc<CleanupInner>,
}

#[derive(Debug)]
struct CleanupInner {
    input: PathBuf,
    output_dir: PathBuf,
    done: AtomicBool,
}

impl CleanupGuard {
    fn new(input: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            inner: Arc::new(CleanupInner {
                input,
                output_dir,
                done: AtomicBool::new(false),
            }),
        }
    }

    pub fn input_path(&self) -> &Path {
        &self.inner.input
    }

    pub fn output_dir(&self) -> &Path {
        &self.inner.output_dir
    }

    /// Deletes the job's temp resources. Individual failures are logged and
    /// skipped so one stuck file never leaks the rest.
    pub async fn run(&self) {
        if self
            .inner
            .done
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        if let Err(err) = tokio::fs::remove_file(&self.inner.input).await {
            tracing::warn!(
                path = %self.inner.input.display(),
                error = %err,
                "Failed to remove transcode input file"
            );
        }

        match tokio::fs::read_dir(&self.inner.output_dir).await {
            Ok(mut entries) => {
                while let Ok(Some(entry)) = entries.next_entry().await {
                    if let Err(err) = tokio::fs::remove_file(entry.path()).await {
                        tracing::warn!(
                            path = %entry.path().display(),
                            error = %err,
                            "Failed to remove transcode output file"
                        );
                    }
                }
                if let Err(err) = tokio::fs::remove_dir(&self.inner.output_dir).await {
                    tracing::warn!(
                        path = %self.inner.output_dir.display(),
                        error = %err,
                        "Failed to remove transcode output directory"
                    );
                }
            }
            Err(err) => {
                tracing::warn!(
                    path = %self.inner.output_dir.display(),
                    error = %err,
                    "Failed to list transcode output directory"
                );
            }
        }

        tracing::debug!(
            input = %self.inner.input.display(),
            output_dir = %self.inner.output_dir.display(),
            "Transcode temp resources cleaned up"
        );
    }

    /// Fire-and-forget variant for synchronous contexts such as `Drop`.
    /// A no-op outside a runtime, which only happens during shutdown when the
    /// completion path owns cleanup anyway.
    pub fn spawn(&self) {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let guard = self.clone();
            handle.spawn(async move { guard.run().await });
        }
    }
}

pub struct TranscodePipeline {
    store: Arc<dyn ObjectStore>,
    transcoder: Arc<dyn Transcoder>,
    work_dir: PathBuf,
}

impl TranscodePipeline {
    pub fn new(store: Arc<dyn ObjectStore>, transcoder: Arc<dyn Transcoder>) -> Self {
        Self {
            store,
            transcoder,
            work_dir: std::env::temp_dir(),
        }
    }

    /// Overrides where job temp files and HLS output directories are created.
    pub fn with_work_dir(mut self, work_dir: PathBuf) -> Self {
        self.work_dir = work_dir;
        self
    }

    /// Validates and accepts a video payload, returning a handle to the
    /// spawned job. Rejection happens before any temp resource is created.
    pub async fn submit(
        &self,
        content_type: &str,
        mut body: ByteStream,
    ) -> Result<TranscodeJob, AppError> {
        if !content_type.starts_with(VIDEO_CONTENT_TYPE_PREFIX) {
            return Err(AppError::UnsupportedMediaType(content_type.to_string()));
        }

        let base_id = Uuid::now_v7().to_string();
        let playlist = format!("{base_id}.m3u8");

        let (_handle, input) = tempfile::Builder::new()
            .prefix("mediagate-in-")
            .tempfile_in(&self.work_dir)
            .map_err(AppError::from)?
            .keep()
            .map_err(|err| AppError::Internal(format!("Failed to keep temp file: {err}")))?;
        drop(_handle);

        let output_dir = match tempfile::Builder::new()
            .prefix("mediagate-hls-")
            .tempdir_in(&self.work_dir)
        {
            Ok(dir) => dir.into_path(),
            Err(err) => {
                if let Err(remove_err) = tokio::fs::remove_file(&input).await {
                    tracing::warn!(
                        path = %input.display(),
                        error = %remove_err,
                        "Failed to remove orphaned input file"
                    );
                }
                return Err(AppError::from(err));
            }
        };

        // From here on both temp paths exist, so any failure goes through the
        // guard rather than ad-hoc removal.
        let cleanup = CleanupGuard::new(input.clone(), output_dir.clone());

        let materialized = async {
            let mut file = tokio::fs::File::create(&input).await?;
            while let Some(chunk) = body.next().await {
                file.write_all(&chunk?).await?;
            }
            file.flush().await?;
            Ok::<_, std::io::Error>(())
        }
        .await;

        if let Err(err) = materialized {
            cleanup.run().await;
            return Err(AppError::from(err));
        }
        let (tx, events) = mpsc::unbounded_channel();

        tracing::info!(base_id = %base_id, content_type = %content_type, "Transcode job accepted");

        tokio::spawn(run_job(JobContext {
            store: Arc::clone(&self.store),
            transcoder: Arc::clone(&self.transcoder),
            tx,
            cleanup: cleanup.clone(),
            base_id: base_id.clone(),
            playlist: playlist.clone(),
            input,
            output_dir,
        }));

        Ok(TranscodeJob {
            base_id,
            playlist,
            events,
            cleanup,
        })
    }
}

struct JobContext {
    store: Arc<dyn ObjectStore>,
    transcoder: Arc<dyn Transcoder>,
    tx: mpsc::UnboundedSender<TranscodeEvent>,
    cleanup: CleanupGuard,
    base_id: String,
    playlist: String,
    input: PathBuf,
    output_dir: PathBuf,
}

async fn run_job(ctx: JobContext) {
    let started = Instant::now();

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let forward_tx = ctx.tx.clone();
    let forwarder = tokio::spawn(async move {
        // Drain even after the caller disconnects so the transcoder side
        // never observes a closed channel.
        while let Some(update) = progress_rx.recv().await {
            let _ = forward_tx.send(TranscodeEvent::Progress(update));
        }
    });

    let transcoded = ctx
        .transcoder
        .transcode(&ctx.input, &ctx.output_dir, &ctx.base_id, progress_tx)
        .await;
    let _ = forwarder.await;

    match transcoded {
        Ok(_) => {
            match publish_outputs(&ctx).await {
                Ok(0) => {
                    let _ = ctx.tx.send(TranscodeEvent::Done(DoneSummary {
                        filename: ctx.playlist.clone(),
                        total_time_secs: started.elapsed().as_secs_f64(),
                    }));
                    tracing::info!(
                        base_id = %ctx.base_id,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Transcode job complete"
                    );
                }
                Ok(failures) => {
                    let _ = ctx.tx.send(TranscodeEvent::Error {
                        message: format!("{failures} output file(s) failed to upload"),
                    });
                }
                Err(err) => {
                    tracing::error!(base_id = %ctx.base_id, error = %err, "Failed to list transcode outputs");
                    let _ = ctx.tx.send(TranscodeEvent::Error {
                        message: format!("Failed to list transcode outputs: {err}"),
                    });
                }
            }
        }
        Err(err) => {
            tracing::error!(base_id = %ctx.base_id, error = %err, "Transcode failed");
            let _ = ctx.tx.send(TranscodeEvent::Error {
                message: err.to_string(),
            });
        }
    }

    // Cleanup before the channel closes so observers that wait for the
    // stream end see the temp resources already gone.
    ctx.cleanup.run().await;
}

/// Uploads every file the transcoder produced, concurrently, emitting one
/// `saving` event per file as uploads finish. Returns the failure count.
async fn publish_outputs(ctx: &JobContext) -> std::io::Result<usize> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(&ctx.output_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();

    let mut uploads = JoinSet::new();
    for name in names {
        let store = Arc::clone(&ctx.store);
        let path = ctx.output_dir.join(&name);
        uploads.spawn(async move {
            let result = upload_output(store.as_ref(), &path, &name).await;
            (name, result)
        });
    }

    let mut failures = 0;
    while let Some(joined) = uploads.join_next().await {
        match joined {
            Ok((name, Ok(()))) => {
                tracing::debug!(key = %name, "Published transcode output");
                let _ = ctx.tx.send(TranscodeEvent::Saving(SavingOutcome {
                    filename: ctx.playlist.clone(),
                    part: Some(name),
                    error: None,
                }));
            }
            Ok((name, Err(err))) => {
                failures += 1;
                tracing::warn!(key = %name, error = %err, "Failed to publish transcode output");
                let _ = ctx.tx.send(TranscodeEvent::Saving(SavingOutcome {
                    filename: ctx.playlist.clone(),
                    part: Some(name),
                    error: Some(err.to_string()),
                }));
            }
            Err(join_err) => {
                failures += 1;
                tracing::error!(error = %join_err, "Upload task panicked");
                let _ = ctx.tx.send(TranscodeEvent::Saving(SavingOutcome {
                    filename: ctx.playlist.clone(),
                    part: None,
                    error: Some(join_err.to_string()),
                }));
            }
        }
    }

    Ok(failures)
}

async fn upload_output(store: &dyn ObjectStore, path: &Path, name: &str) -> StorageResult<()> {
    let file = tokio::fs::File::open(path).await?;
    let stream: ByteStream = Box::pin(ReaderStream::new(file));

    // No size hint; outputs go through the streaming multipart path.
    let metadata = HashMap::from([(ORIGINAL_FILENAME_KEY.to_string(), name.to_string())]);
    store
        .put(name, Some(content_type_for(name)), metadata, stream, None)
        .await
}

fn content_type_for(name: &str) -> &'static str {
    if name.ends_with(".m3u8") {
        "application/vnd.apple.mpegurl"
    } else if name.ends_with(".ts") {
        "video/mp2t"
    } else {
        "application/octet-stream"
    }
}
