pub mod events;
pub mod ffmpeg;
pub mod pipeline;

pub use events::{DoneSummary, ProgressParser, ProgressUpdate, SavingOutcome, TranscodeEvent};
pub use ffmpeg::{FfmpegTranscoder, TranscodeError, Transcoder};
pub use pipeline::{CleanupGuard, TranscodeJob, TranscodePipeline};
