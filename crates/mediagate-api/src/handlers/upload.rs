//! Upload and replace handlers.
//!
//! Content is streamed to the object store; nothing is buffered in full.
//! Multipart fields borrow from the request, so they are bridged onto a
//! channel-backed stream the store can own, with both sides driven together.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{multipart::Field, Multipart, Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use mediagate_core::headers::ORIGINAL_FILENAME_KEY;
use mediagate_core::{generate_file_id, AppError};
use mediagate_storage::ByteStream;

use crate::error::HttpAppError;
use crate::state::AppState;

/// Multipart field carrying the payload.
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub key: String,
    pub original_filename: String,
}

#[derive(Debug, Deserialize)]
pub struct RawUploadParams {
    pub filename: Option<String>,
}

/// `POST /api/v0/files` - store a multipart payload under a fresh id.
pub async fn upload_multipart(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::InvalidInput("File part has no filename".to_string()))?;
        let key = generate_file_id(Some(&filename));

        return store_field(&state, &key, filename, field).await;
    }

    Err(HttpAppError(AppError::InvalidInput(format!(
        "Missing multipart field '{FILE_FIELD}'"
    ))))
}

/// `PUT /api/v0/files/{key}` - overwrite an object under a caller-chosen key.
pub async fn replace_multipart(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidInput(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::InvalidInput("File part has no filename".to_string()))?;

        return store_field(&state, &key, filename, field).await;
    }

    Err(HttpAppError(AppError::InvalidInput(format!(
        "Missing multipart field '{FILE_FIELD}'"
    ))))
}

/// `POST /api/v0/files/raw?filename=` - store a raw request body.
pub async fn upload_raw(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RawUploadParams>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, HttpAppError> {
    let key = generate_file_id(params.filename.as_deref());
    let original_filename = params.filename.unwrap_or_else(|| key.clone());
    store_raw(&state, &key, original_filename, &headers, body).await
}

/// `PUT /api/v0/files/{key}/raw?filename=` - overwrite from a raw body.
pub async fn replace_raw(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(params): Query<RawUploadParams>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Result<impl IntoResponse, HttpAppError> {
    let original_filename = params.filename.unwrap_or_else(|| key.clone());
    store_raw(&state, &key, original_filename, &headers, body).await
}

async fn store_raw(
    state: &AppState,
    key: &str,
    original_filename: String,
    headers: &HeaderMap,
    body: axum::body::Body,
) -> Result<Json<UploadResponse>, HttpAppError> {
    let content_type = headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let size_hint = headers
        .get(http::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let stream: ByteStream = Box::pin(futures::StreamExt::map(
        body.into_data_stream(),
        |chunk| chunk.map_err(std::io::Error::other),
    ));

    let metadata = HashMap::from([(
        ORIGINAL_FILENAME_KEY.to_string(),
        original_filename.clone(),
    )]);

    state
        .store
        .put(key, content_type.as_deref(), metadata, stream, size_hint)
        .await
        .map_err(AppError::from)?;

    tracing::info!(key = %key, original_filename = %original_filename, "Object stored");

    Ok(Json(UploadResponse {
        key: key.to_string(),
        original_filename,
    }))
}

async fn store_field(
    state: &AppState,
    key: &str,
    original_filename: String,
    mut field: Field<'_>,
) -> Result<Json<UploadResponse>, HttpAppError> {
    let content_type = field.content_type().map(str::to_string);
    let metadata = HashMap::from([(
        ORIGINAL_FILENAME_KEY.to_string(),
        original_filename.clone(),
    )]);

    let (tx, rx) = mpsc::channel::<std::io::Result<Bytes>>(16);
    let stream: ByteStream = Box::pin(ReceiverStream::new(rx));

    let put = state
        .store
        .put(key, content_type.as_deref(), metadata, stream, None);

    // The pump owns tx; when it finishes the store side sees end-of-stream.
    let pump = async move {
        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => {
                    if tx.send(Ok(chunk)).await.is_err() {
                        // Store side gave up; stop reading.
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

    let (put_result, pump_result) = tokio::join!(put, pump);

    // A client-side read failure takes precedence over the store error it
    // induced.
    pump_result?;
    put_result.map_err(AppError::from)?;

    tracing::info!(key = %key, original_filename = %original_filename, "Object stored");

    Ok(Json(UploadResponse {
        key: key.to_string(),
        original_filename,
    }))
}
