//! HLS transcode endpoint.
//!
//! Accepts a video payload, hands it to the pipeline, and exposes the job's
//! event channel as a server-sent-events stream. Dropping the response body
//! (client disconnect, timeout) triggers the job's idempotent cleanup.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    extract::{Multipart, State},
    response::sse::{Event, KeepAlive, Sse},
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use mediagate_core::AppError;
use mediagate_processing::{CleanupGuard, TranscodeEvent, TranscodeJob};
use mediagate_storage::ByteStream;

use crate::error::HttpAppError;
use crate::state::AppState;

const FILE_FIELD: &str = "file";

/// `POST /api/v0/videos/hls` - transcode a video into an HLS rendition,
/// reporting progress over SSE until the terminal `done` or `error` event.
pub async fn transcode_hls(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, HttpAppError> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let content_type = field
            .content_type()
            .map(str::to_string)
            .ok_or_else(|| AppError::InvalidInput("File part has no content type".to_string()))?;

        let (tx, rx) = mpsc::channel::<std::io::Result<Bytes>>(16);
        let stream: ByteStream = Box::pin(ReceiverStream::new(rx));

        let submit = state.pipeline.submit(&content_type, stream);
        let pump = async move {
            loop {
                match field.chunk().await {
                    Ok(Some(chunk)) => {
                        if tx.send(Ok(chunk)).await.is_err() {
                            break Ok(());
                        }
                    }
                    Ok(None) => break Ok(()),
                    Err(err) => {
                        let message = format!("Multipart read failed: {err}");
                        let _ = tx.send(Err(std::io::Error::other(message.clone()))).await;
                        break Err(AppError::InvalidInput(message));
                    }
                }
            }
        };

        let (job, pump_result) = tokio::join!(submit, pump);
        pump_result?;
        let job = job?;

        tracing::info!(base_id = %job.base_id, "Transcode stream opened");
        let events = JobEventStream::new(job);
        let sse = events.map(|event| Event::default().event(event.name()).json_data(&event));
        return Ok(Sse::new(sse).keep_alive(KeepAlive::default()));
    }

    Err(HttpAppError(AppError::InvalidInput(format!(
        "Missing multipart field '{FILE_FIELD}'"
    ))))
}

/// Event stream tied to a job's lifetime. Dropping it before the terminal
/// event fires the cleanup guard; after normal completion that is a no-op.
struct JobEventStream {
    events: mpsc::UnboundedReceiver<TranscodeEvent>,
    cleanup: CleanupGuard,
}

impl JobEventStream {
    fn new(job: TranscodeJob) -> Self {
        Self {
            events: job.events,
            cleanup: job.cleanup,
        }
    }
}

impl Stream for JobEventStream {
    type Item = TranscodeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl Drop for JobEventStream {
    fn drop(&mut self) {
        self.cleanup.spawn();
    }
}
