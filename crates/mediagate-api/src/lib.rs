//! Mediagate API library
//!
//! HTTP surface of the gateway: upload/replace handlers, the download proxy,
//! the HLS transcode endpoint, and application setup.

pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
