use serde::Serialize;

/// Events published by a transcode job, in the order they occur:
/// zero or more `Progress`, then one `Saving` per published file, then
/// exactly one terminal `Done` or `Error` before the channel closes.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum TranscodeEvent {
    Progress(ProgressUpdate),
    Saving(SavingOutcome),
    Done(DoneSummary),
    Error { message: String },
}

impl TranscodeEvent {
    /// Stable event name used as the SSE `event:` field.
    pub fn name(&self) -> &'static str {
        match self {
            TranscodeEvent::Progress(_) => "progress",
            TranscodeEvent::Saving(_) => "saving",
            TranscodeEvent::Done(_) => "done",
            TranscodeEvent::Error { .. } => "error",
        }
    }
}

/// One block of ffmpeg `-progress` output.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ProgressUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,
    pub finished: bool,
}

/// Result of publishing one output file to the object store.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SavingOutcome {
    /// Playlist filename of the job this file belongs to.
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DoneSummary {
    pub filename: String,
    pub total_time_secs: f64,
}

/// Incremental parser for ffmpeg `-progress pipe:1` output. ffmpeg writes
/// blocks of `key=value` lines, each block terminated by a `progress=...`
/// line (`continue` while encoding, `end` on the last block).
#[derive(Debug, Default)]
pub struct ProgressParser {
    current: ProgressUpdate,
}

impl ProgressParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line of output. Returns a completed update when the line
    /// closes a block, `None` otherwise. Unknown keys are ignored so newer
    /// ffmpeg builds do not break parsing.
    pub fn feed_line(&mut self, line: &str) -> Option<ProgressUpdate> {
        let (key, value) = line.trim().split_once('=')?;
        let value = value.trim();
        match key.trim() {
            "frame" => self.current.frame = value.parse().ok(),
            "fps" => self.current.fps = value.parse().ok(),
            "bitrate" => self.current.bitrate = Some(value.to_string()),
            "total_size" => self.current.total_size = value.parse().ok(),
            "out_time" => self.current.out_time = Some(value.to_string()),
            "speed" => self.current.speed = Some(value.to_string()),
            "progress" => {
                let mut update = std::mem::take(&mut self.current);
                update.finished = value == "end";
                return Some(update);
            }
            _ => {}
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_complete_progress_block() {
        let mut parser = ProgressParser::new();
        assert_eq!(parser.feed_line("frame=120"), None);
        assert_eq!(parser.feed_line("fps=29.97"), None);
        assert_eq!(parser.feed_line("bitrate=1545.2kbits/s"), None);
        assert_eq!(parser.feed_line("total_size=786432"), None);
        assert_eq!(parser.feed_line("out_time=00:00:04.000000"), None);
        assert_eq!(parser.feed_line("speed=1.99x"), None);

        let update = parser.feed_line("progress=continue").unwrap();
        assert_eq!(update.frame, Some(120));
        assert_eq!(update.fps, Some(29.97));
        assert_eq!(update.bitrate.as_deref(), Some("1545.2kbits/s"));
        assert_eq!(update.out_time.as_deref(), Some("00:00:04.000000"));
        assert!(!update.finished);
    }

    #[test]
    fn final_block_is_marked_finished() {
        let mut parser = ProgressParser::new();
        parser.feed_line("frame=300");
        let update = parser.feed_line("progress=end").unwrap();
        assert_eq!(update.frame, Some(300));
        assert!(update.finished);
    }

    #[test]
    fn blocks_do_not_leak_into_each_other() {
        let mut parser = ProgressParser::new();
        parser.feed_line("frame=10");
        parser.feed_line("progress=continue");

        let update = parser.feed_line("progress=continue").unwrap();
        assert_eq!(update.frame, None);
    }

    #[test]
    fn unknown_keys_and_garbage_are_ignored() {
        let mut parser = ProgressParser::new();
        assert_eq!(parser.feed_line("stream_0_0_q=28.0"), None);
        assert_eq!(parser.feed_line("not a key value line"), None);
        assert_eq!(parser.feed_line(""), None);
    }

    #[test]
    fn event_names_match_wire_contract() {
        let progress = TranscodeEvent::Progress(ProgressUpdate::default());
        assert_eq!(progress.name(), "progress");
        let error = TranscodeEvent::Error {
            message: "boom".to_string(),
        };
        assert_eq!(error.name(), "error");
    }
}
