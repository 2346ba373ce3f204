//! Storage abstraction trait
//!
//! This module defines the ObjectStore trait that all storage backends must
//! implement, plus the request/response types shared between them.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use mediagate_core::AppError;
use std::collections::HashMap;
use std::pin::Pin;
use thiserror::Error;

/// Minimum buffered part size for unknown-length uploads. Stores require at
/// least 5 MiB per multipart part (except the last).
pub const MIN_PART_SIZE: usize = 5 * 1024 * 1024;

/// Streamed object payload.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    /// Backend-reported failure, carrying the store's HTTP status code when
    /// one was returned so callers can pass it through.
    #[error("Storage backend error: {message}")]
    Backend {
        status: Option<u16>,
        message: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl StorageError {
    /// The HTTP status code the store associated with this failure, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            StorageError::NotFound(_) => Some(404),
            StorageError::Backend { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(key),
            other => AppError::Storage {
                status: other.status_code(),
                message: other.to_string(),
            },
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Read options forwarded from the client request. All values are raw HTTP
/// header strings; backends translate them as needed.
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    pub range: Option<String>,
    pub if_match: Option<String>,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
    pub if_unmodified_since: Option<String>,
}

/// An object fetched from the store: response metadata plus the payload
/// stream. The stream holds the underlying store response; dropping it
/// releases the connection.
pub struct StoredObject {
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    /// Present when the store served a partial response.
    pub content_range: Option<String>,
    pub etag: Option<String>,
    /// HTTP-date formatted last-modified timestamp.
    pub last_modified: Option<String>,
    /// User metadata attached at write time (no vendor prefix).
    pub metadata: HashMap<String, String>,
    pub body: ByteStream,
}

impl std::fmt::Debug for StoredObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredObject")
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .field("content_range", &self.content_range)
            .field("etag", &self.etag)
            .field("last_modified", &self.last_modified)
            .field("metadata", &self.metadata)
            .field("body", &"<stream>")
            .finish()
    }
}

/// Object store capability consumed by the gateway.
///
/// Backends are shared, stateless from the caller's view, and safe to invoke
/// concurrently from unrelated requests and from the transcode pipeline's
/// segment-upload fan-out.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Whether the configured bucket exists.
    async fn bucket_exists(&self) -> StorageResult<bool>;

    /// Create the configured bucket.
    async fn create_bucket(&self) -> StorageResult<()>;

    /// Write an object under `key`, attaching `metadata` as user metadata.
    ///
    /// When `size_hint` is unknown the backend must buffer the stream into
    /// parts of at least [`MIN_PART_SIZE`] so the store can run a multipart
    /// upload without knowing the total size up front. The input stream is
    /// fully consumed on every exit path.
    async fn put(
        &self,
        key: &str,
        content_type: Option<&str>,
        metadata: HashMap<String, String>,
        body: ByteStream,
        size_hint: Option<u64>,
    ) -> StorageResult<()>;

    /// Read an object, forwarding range/conditional headers to the store.
    async fn get(&self, key: &str, opts: GetOptions) -> StorageResult<StoredObject>;
}
