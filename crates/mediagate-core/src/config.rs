//! Configuration module
//!
//! Environment-driven configuration for the gateway. Values come from the
//! process environment (with `.env` support via dotenvy) and fall back to
//! development defaults where that is safe.

use std::env;

const DEFAULT_PORT: u16 = 4000;
const DEFAULT_BUCKET: &str = "mediagate";
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";
const DEFAULT_HLS_SEGMENT_DURATION_SECS: u64 = 20;
const DEFAULT_MAX_UPLOAD_MB: usize = 500;

/// Gateway configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub server_port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
    // Object store
    pub s3_bucket: String,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub s3_force_path_style: bool,
    // Transcoding
    pub ffmpeg_path: String,
    pub hls_segment_duration: u64,
    // Limits
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Fails only on values that cannot be defaulted safely (a malformed
    /// PORT, or a wildcard CORS origin in production).
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }
        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let server_port = env::var("PORT")
            .unwrap_or_else(|_| DEFAULT_PORT.to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?;

        let s3_endpoint = env::var("S3_ENDPOINT").ok().filter(|s| !s.is_empty());
        // MinIO and most S3-compatible stores need path-style addressing.
        let s3_force_path_style = env::var("S3_FORCE_PATH_STYLE")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(s3_endpoint.is_some());

        let max_upload_mb = env::var("MAX_UPLOAD_MB")
            .unwrap_or_else(|_| DEFAULT_MAX_UPLOAD_MB.to_string())
            .parse::<usize>()
            .unwrap_or(DEFAULT_MAX_UPLOAD_MB);

        Ok(Self {
            server_port,
            environment,
            cors_origins,
            s3_bucket: env::var("S3_BUCKET").unwrap_or_else(|_| DEFAULT_BUCKET.to_string()),
            s3_region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .unwrap_or_else(|_| DEFAULT_REGION.to_string()),
            s3_endpoint,
            s3_force_path_style,
            ffmpeg_path: env::var("FFMPEG_PATH")
                .unwrap_or_else(|_| DEFAULT_FFMPEG_PATH.to_string()),
            hls_segment_duration: env::var("HLS_SEGMENT_DURATION")
                .unwrap_or_else(|_| DEFAULT_HLS_SEGMENT_DURATION_SECS.to_string())
                .parse::<u64>()
                .unwrap_or(DEFAULT_HLS_SEGMENT_DURATION_SECS),
            max_upload_bytes: max_upload_mb * 1024 * 1024,
        })
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}
