//! Mediagate storage library
//!
//! Object-store abstraction consumed by the gateway. The `ObjectStore` trait
//! covers exactly what the upload/download proxy and the transcode pipeline
//! need: metadata-carrying streamed writes, header-aware reads, and bucket
//! bootstrap. The S3 backend targets MinIO and other S3-compatible stores;
//! the in-memory backend backs tests.

pub mod memory;
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;
pub use traits::{
    ByteStream, GetOptions, ObjectStore, StorageError, StorageResult, StoredObject, MIN_PART_SIZE,
};
