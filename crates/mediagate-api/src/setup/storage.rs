//! Storage setup and bucket bootstrap.

use std::sync::Arc;

use anyhow::{Context, Result};

use mediagate_core::Config;
use mediagate_storage::{ObjectStore, S3ObjectStore};

/// Build the object store client and make sure the configured bucket exists.
pub async fn setup_storage(config: &Config) -> Result<Arc<dyn ObjectStore>> {
    tracing::info!(
        bucket = %config.s3_bucket,
        region = %config.s3_region,
        endpoint = config.s3_endpoint.as_deref().unwrap_or("aws"),
        "Initializing object store"
    );

    let store = S3ObjectStore::new(
        config.s3_bucket.clone(),
        config.s3_region.clone(),
        config.s3_endpoint.clone(),
        config.s3_force_path_style,
    )
    .await
    .context("Failed to create object store client")?;

    let store: Arc<dyn ObjectStore> = Arc::new(store);
    bootstrap_bucket(store.as_ref(), &config.s3_bucket).await?;

    Ok(store)
}

/// Create the bucket when it does not exist yet.
pub async fn bootstrap_bucket(store: &dyn ObjectStore, bucket: &str) -> Result<()> {
    let exists = store
        .bucket_exists()
        .await
        .context("Failed to check bucket existence")?;

    if exists {
        tracing::debug!(bucket = %bucket, "Bucket already exists");
    } else {
        store
            .create_bucket()
            .await
            .context("Failed to create bucket")?;
        tracing::info!(bucket = %bucket, "Bucket created");
    }

    Ok(())
}
