//! Mediagate core library
//!
//! Shared building blocks for the gateway: configuration, error types, object
//! identifier generation, and HTTP header filtering.

pub mod config;
pub mod error;
pub mod file_id;
pub mod headers;

// Re-export commonly used types
pub use config::Config;
pub use error::AppError;
pub use file_id::generate_file_id;
