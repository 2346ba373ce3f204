//! S3/MinIO storage backend.
//!
//! Wraps `aws-sdk-s3` behind the `ObjectStore` trait. Works against AWS S3
//! and S3-compatible stores (MinIO, DigitalOcean Spaces) via configurable
//! endpoint and path-style addressing.

use crate::traits::{
    ByteStream, GetOptions, ObjectStore, StorageError, StorageResult, StoredObject, MIN_PART_SIZE,
};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use aws_smithy_types::date_time::Format;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::DateTime;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::collections::HashMap;
use tokio_util::io::ReaderStream;

/// S3 object store implementation
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Create a new S3ObjectStore.
    ///
    /// Credentials come from the default AWS provider chain (env vars,
    /// profiles, instance metadata). `endpoint_url` selects an S3-compatible
    /// store such as MinIO; those usually also need `force_path_style`.
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        force_path_style: bool,
    ) -> StorageResult<Self> {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region))
            .load()
            .await;

        let mut builder =
            aws_sdk_s3::config::Builder::from(&shared).force_path_style(force_path_style);
        if let Some(endpoint) = endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        Ok(S3ObjectStore {
            client: Client::from_conf(builder.build()),
            bucket,
        })
    }
}

fn sdk_status<E>(err: &SdkError<E>) -> Option<u16> {
    match err {
        SdkError::ServiceError(ctx) => Some(ctx.raw().status().as_u16()),
        SdkError::ResponseError(ctx) => Some(ctx.raw().status().as_u16()),
        _ => None,
    }
}

fn backend_error<E>(err: SdkError<E>) -> StorageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StorageError::Backend {
        status: sdk_status(&err),
        message: DisplayErrorContext(&err).to_string(),
    }
}

/// Accumulates stream chunks into store-acceptable multipart parts.
pub(crate) struct PartBuffer {
    buf: BytesMut,
}

impl PartBuffer {
    pub(crate) fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(MIN_PART_SIZE),
        }
    }

    pub(crate) fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Take a full part once at least MIN_PART_SIZE bytes are buffered.
    pub(crate) fn take_full_part(&mut self) -> Option<Bytes> {
        if self.buf.len() >= MIN_PART_SIZE {
            Some(self.buf.split().freeze())
        } else {
            None
        }
    }

    /// Drain whatever remains (the final, possibly short, part).
    pub(crate) fn take_rest(&mut self) -> Bytes {
        self.buf.split().freeze()
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn bucket_exists(&self) -> StorageResult<bool> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().map_or(false, |e| e.is_not_found()) => Ok(false),
            Err(err) => Err(backend_error(err)),
        }
    }

    async fn create_bucket(&self) -> StorageResult<()> {
        match self.client.create_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(()),
            Err(err)
                if err
                    .as_service_error()
                    .map_or(false, |e| e.is_bucket_already_owned_by_you()) =>
            {
                Ok(())
            }
            Err(err) => Err(backend_error(err)),
        }
    }

    async fn put(
        &self,
        key: &str,
        content_type: Option<&str>,
        metadata: HashMap<String, String>,
        mut body: ByteStream,
        size_hint: Option<u64>,
    ) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let mut parts = PartBuffer::new();
        let mut upload_id: Option<String> = None;
        let mut completed: Vec<CompletedPart> = Vec::new();
        let mut total: u64 = 0;

        let result: StorageResult<()> = async {
            while let Some(chunk) = body.next().await {
                let chunk = chunk
                    .map_err(|e| StorageError::UploadFailed(format!("input stream: {}", e)))?;
                total += chunk.len() as u64;
                parts.push(&chunk);

                while let Some(part) = parts.take_full_part() {
                    let id = match &upload_id {
                        Some(id) => id.clone(),
                        None => {
                            let created = self
                                .client
                                .create_multipart_upload()
                                .bucket(&self.bucket)
                                .key(key)
                                .set_content_type(content_type.map(String::from))
                                .set_metadata(Some(metadata.clone()))
                                .send()
                                .await
                                .map_err(backend_error)?;
                            let id = created.upload_id().unwrap_or_default().to_string();
                            upload_id = Some(id.clone());
                            id
                        }
                    };

                    let part_number = completed.len() as i32 + 1;
                    let uploaded = self
                        .client
                        .upload_part()
                        .bucket(&self.bucket)
                        .key(key)
                        .upload_id(&id)
                        .part_number(part_number)
                        .body(part.into())
                        .send()
                        .await
                        .map_err(backend_error)?;
                    completed.push(
                        CompletedPart::builder()
                            .part_number(part_number)
                            .set_e_tag(uploaded.e_tag().map(String::from))
                            .build(),
                    );
                }
            }

            let rest = parts.take_rest();
            match &upload_id {
                None => {
                    // The whole payload fit below the part threshold; a plain
                    // put is cheaper than a one-part multipart upload.
                    self.client
                        .put_object()
                        .bucket(&self.bucket)
                        .key(key)
                        .set_content_type(content_type.map(String::from))
                        .set_metadata(Some(metadata.clone()))
                        .body(rest.into())
                        .send()
                        .await
                        .map_err(backend_error)?;
                }
                Some(id) => {
                    if !rest.is_empty() {
                        let part_number = completed.len() as i32 + 1;
                        let uploaded = self
                            .client
                            .upload_part()
                            .bucket(&self.bucket)
                            .key(key)
                            .upload_id(id)
                            .part_number(part_number)
                            .body(rest.into())
                            .send()
                            .await
                            .map_err(backend_error)?;
                        completed.push(
                            CompletedPart::builder()
                                .part_number(part_number)
                                .set_e_tag(uploaded.e_tag().map(String::from))
                                .build(),
                        );
                    }
                    self.client
                        .complete_multipart_upload()
                        .bucket(&self.bucket)
                        .key(key)
                        .upload_id(id)
                        .multipart_upload(
                            CompletedMultipartUpload::builder()
                                .set_parts(Some(completed.clone()))
                                .build(),
                        )
                        .send()
                        .await
                        .map_err(backend_error)?;
                }
            }
            Ok(())
        }
        .await;

        if let Err(err) = result {
            if let Some(id) = &upload_id {
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(id)
                    .send()
                    .await
                {
                    tracing::warn!(
                        bucket = %self.bucket,
                        key = %key,
                        error = %DisplayErrorContext(&abort_err),
                        "Failed to abort multipart upload"
                    );
                }
            }
            tracing::error!(
                error = %err,
                bucket = %self.bucket,
                key = %key,
                size_bytes = total,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            return Err(err);
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = total,
            size_hint = ?size_hint,
            multipart = upload_id.is_some(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );
        Ok(())
    }

    async fn get(&self, key: &str, opts: GetOptions) -> StorageResult<StoredObject> {
        let start = std::time::Instant::now();
        let mut req = self.client.get_object().bucket(&self.bucket).key(key);

        if let Some(range) = &opts.range {
            req = req.range(range);
        }
        if let Some(v) = &opts.if_match {
            req = req.if_match(v);
        }
        if let Some(v) = &opts.if_none_match {
            req = req.if_none_match(v);
        }
        if let Some(v) = &opts.if_modified_since {
            if let Ok(dt) = DateTime::from_str(v, Format::HttpDate) {
                req = req.if_modified_since(dt);
            }
        }
        if let Some(v) = &opts.if_unmodified_since {
            if let Ok(dt) = DateTime::from_str(v, Format::HttpDate) {
                req = req.if_unmodified_since(dt);
            }
        }

        let output = req.send().await.map_err(|err| {
            if err.as_service_error().map_or(false, |e| e.is_no_such_key()) {
                StorageError::NotFound(key.to_string())
            } else {
                let mapped = backend_error(err);
                tracing::error!(
                    error = %mapped,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 download failed"
                );
                mapped
            }
        })?;

        tracing::debug!(
            bucket = %self.bucket,
            key = %key,
            content_range = ?output.content_range(),
            "S3 download started"
        );

        let last_modified = output
            .last_modified()
            .and_then(|dt| dt.fmt(Format::HttpDate).ok());

        Ok(StoredObject {
            content_type: output.content_type().map(String::from),
            content_length: output.content_length().and_then(|n| u64::try_from(n).ok()),
            content_range: output.content_range().map(String::from),
            etag: output.e_tag().map(String::from),
            last_modified,
            metadata: output.metadata().cloned().unwrap_or_default(),
            body: Box::pin(ReaderStream::new(output.body.into_async_read())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_buffer_releases_nothing_below_threshold() {
        let mut parts = PartBuffer::new();
        parts.push(&vec![0u8; MIN_PART_SIZE - 1]);
        assert!(parts.take_full_part().is_none());
        assert_eq!(parts.take_rest().len(), MIN_PART_SIZE - 1);
    }

    #[test]
    fn part_buffer_splits_full_parts() {
        let mut parts = PartBuffer::new();
        parts.push(&vec![1u8; MIN_PART_SIZE]);
        parts.push(&vec![2u8; 100]);

        let part = parts.take_full_part().expect("one full part");
        assert_eq!(part.len(), MIN_PART_SIZE + 100);
        assert!(parts.take_full_part().is_none());
        assert_eq!(parts.len(), 0);
    }

    #[test]
    fn part_buffer_accumulates_across_small_chunks() {
        let mut parts = PartBuffer::new();
        for _ in 0..5 {
            parts.push(&vec![0u8; MIN_PART_SIZE / 4]);
            let _ = parts.take_full_part();
        }
        // 5 quarter-parts: one full part released at 4/4, one quarter left
        assert_eq!(parts.len(), MIN_PART_SIZE / 4);
    }
}
