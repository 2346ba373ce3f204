//! ffmpeg-backed HLS transcoding.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::events::{ProgressParser, ProgressUpdate};

/// How many trailing stderr lines are kept for error reporting.
const STDERR_TAIL_LINES: usize = 40;

#[derive(Debug, thiserror::Error)]
pub enum TranscodeError {
    #[error("Failed to start transcoder process: {0}")]
    Spawn(std::io::Error),
    #[error("Transcoder exited with status {status}: {stderr}")]
    Failed { status: i32, stderr: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Turns a local video file into an HLS rendition on disk.
///
/// Implementations write `{base_id}.m3u8` and `{base_id}_NNN.ts` files into
/// `output_dir` and report progress through the provided channel. A closed
/// receiver must not interrupt the transcode.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn transcode(
        &self,
        input: &Path,
        output_dir: &Path,
        base_id: &str,
        progress: mpsc::UnboundedSender<ProgressUpdate>,
    ) -> Result<PathBuf, TranscodeError>;
}

pub struct FfmpegTranscoder {
    ffmpeg_path: String,
    segment_duration: u64,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: String, segment_duration: u64) -> Self {
        Self {
            ffmpeg_path,
            segment_duration,
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    #[tracing::instrument(skip(self, input, output_dir, progress))]
    async fn transcode(
        &self,
        input: &Path,
        output_dir: &Path,
        base_id: &str,
        progress: mpsc::UnboundedSender<ProgressUpdate>,
    ) -> Result<PathBuf, TranscodeError> {
        let playlist_path = output_dir.join(format!("{base_id}.m3u8"));
        let segment_pattern = output_dir.join(format!("{base_id}_%03d.ts"));

        let mut child = Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-f")
            .arg("hls")
            .arg("-hls_time")
            .arg(self.segment_duration.to_string())
            .arg("-hls_list_size")
            .arg("0")
            .arg("-hls_segment_filename")
            .arg(&segment_pattern)
            .arg("-progress")
            .arg("pipe:1")
            .arg("-nostats")
            .arg(&playlist_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(TranscodeError::Spawn)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TranscodeError::Spawn(std::io::Error::other("stdout not captured")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TranscodeError::Spawn(std::io::Error::other("stderr not captured")))?;

        let progress_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut parser = ProgressParser::new();
            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(update) = parser.feed_line(&line) {
                    // The listener may be gone; keep draining so ffmpeg
                    // never blocks on a full pipe.
                    let _ = progress.send(update);
                }
            }
        });

        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);
            while let Ok(Some(line)) = lines.next_line().await {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        let status = child.wait().await?;
        let _ = progress_task.await;
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let code = status.code().unwrap_or(-1);
            tracing::error!(
                status = code,
                input = %input.display(),
                "ffmpeg transcode failed"
            );
            return Err(TranscodeError::Failed {
                status: code,
                stderr: stderr_tail,
            });
        }

        tracing::debug!(playlist = %playlist_path.display(), "ffmpeg transcode complete");
        Ok(playlist_path)
    }
}
