//! In-memory storage backend.
//!
//! Backs unit and router-level tests without a running store. Implements
//! enough read semantics (ranges, etag conditionals) to exercise the
//! download proxy's 200/206 and pass-through paths.

use crate::traits::{
    ByteStream, GetOptions, ObjectStore, StorageError, StorageResult, StoredObject,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone)]
struct MemoryObject {
    data: Bytes,
    content_type: Option<String>,
    metadata: HashMap<String, String>,
    etag: String,
}

/// In-memory object store for tests.
#[derive(Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, MemoryObject>>>,
    bucket_created: Arc<AtomicBool>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Stored keys in sorted order.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.objects.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Raw payload of a stored object, if present.
    pub async fn raw(&self, key: &str) -> Option<Bytes> {
        self.objects.read().await.get(key).map(|o| o.data.clone())
    }
}

/// Parse a single-range `bytes=a-b` / `bytes=a-` / `bytes=-n` header against
/// a payload of `total` bytes. Returns the inclusive byte window.
fn parse_range(header: &str, total: u64) -> Option<(u64, u64)> {
    let spec = header.strip_prefix("bytes=")?.trim();
    let (start_s, end_s) = spec.split_once('-')?;
    if start_s.is_empty() {
        // suffix range: last n bytes
        let n: u64 = end_s.parse().ok()?;
        if n == 0 || total == 0 {
            return None;
        }
        let start = total.saturating_sub(n);
        return Some((start, total - 1));
    }
    let start: u64 = start_s.parse().ok()?;
    let end: u64 = if end_s.is_empty() {
        total.checked_sub(1)?
    } else {
        end_s.parse().ok()?
    };
    if start > end || start >= total {
        return None;
    }
    Some((start, end.min(total - 1)))
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn bucket_exists(&self) -> StorageResult<bool> {
        Ok(self.bucket_created.load(Ordering::SeqCst))
    }

    async fn create_bucket(&self) -> StorageResult<()> {
        self.bucket_created.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn put(
        &self,
        key: &str,
        content_type: Option<&str>,
        metadata: HashMap<String, String>,
        mut body: ByteStream,
        _size_hint: Option<u64>,
    ) -> StorageResult<()> {
        let mut data = Vec::new();
        while let Some(chunk) = body.next().await {
            let chunk =
                chunk.map_err(|e| StorageError::UploadFailed(format!("input stream: {}", e)))?;
            data.extend_from_slice(&chunk);
        }
        self.objects.write().await.insert(
            key.to_string(),
            MemoryObject {
                data: Bytes::from(data),
                content_type: content_type.map(String::from),
                metadata,
                etag: format!("\"{}\"", Uuid::now_v7().simple()),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str, opts: GetOptions) -> StorageResult<StoredObject> {
        let object = self
            .objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        if let Some(expected) = &opts.if_none_match {
            if expected == &object.etag {
                return Err(StorageError::Backend {
                    status: Some(304),
                    message: "not modified".to_string(),
                });
            }
        }
        if let Some(expected) = &opts.if_match {
            if expected != &object.etag {
                return Err(StorageError::Backend {
                    status: Some(412),
                    message: "precondition failed".to_string(),
                });
            }
        }

        let total = object.data.len() as u64;
        let (data, content_range) = match opts.range.as_deref() {
            Some(header) => match parse_range(header, total) {
                Some((start, end)) => (
                    object.data.slice(start as usize..=end as usize),
                    Some(format!("bytes {}-{}/{}", start, end, total)),
                ),
                None => {
                    return Err(StorageError::Backend {
                        status: Some(416),
                        message: format!("unsatisfiable range `{}`", header),
                    })
                }
            },
            None => (object.data.clone(), None),
        };

        Ok(StoredObject {
            content_type: object.content_type.clone(),
            content_length: Some(data.len() as u64),
            content_range,
            etag: Some(object.etag.clone()),
            last_modified: None,
            metadata: object.metadata.clone(),
            body: Box::pin(futures::stream::once(async move {
                Ok::<_, std::io::Error>(data)
            })),
        })
    }
}
