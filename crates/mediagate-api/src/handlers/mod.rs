pub mod download;
pub mod health;
pub mod transcode;
pub mod upload;
