use std::{path::Path, time::Duration};

use ffmpeg_cmdline_utils::ToolPaths;
use serde::{Deserialize, Serialize};

use crate::definitions::{
    DEFAULT_DURATION_PROBE_TIMEOUT_SECS, DEFAULT_KEYFRAME_TIMEOUT_SECS, DEFAULT_TRIM_TIMEOUT_SECS,
};
use crate::Error;

/// Which external tools to run and how long each invocation may take.
///
/// Missing fields take their default values when deserialized, so a configuration
/// file only needs to mention what it changes:
/// ```json
/// { "tools": { "ffmpeg": "/opt/ffmpeg/bin/ffmpeg" }, "trim_timeout_secs": 120 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlapOptions {
    /// Locations of the ffmpeg and ffprobe executables.
    pub tools: ToolPaths,

    /// Upper bound on the ffprobe call that reads a video's duration.
    ///
    /// Unit: Seconds
    pub duration_probe_timeout_secs: u64,

    /// Upper bound on reading all keyframes (and their timestamps) of one video.
    ///
    /// Unit: Seconds
    pub keyframe_timeout_secs: u64,

    /// Upper bound on trimming or copying one video.
    ///
    /// Unit: Seconds
    pub trim_timeout_secs: u64,
}

impl Default for OverlapOptions {
    fn default() -> Self {
        Self {
            tools: ToolPaths::default(),
            duration_probe_timeout_secs: DEFAULT_DURATION_PROBE_TIMEOUT_SECS,
            keyframe_timeout_secs: DEFAULT_KEYFRAME_TIMEOUT_SECS,
            trim_timeout_secs: DEFAULT_TRIM_TIMEOUT_SECS,
        }
    }
}

impl OverlapOptions {
    pub fn from_json_str(text: &str) -> Result<Self, Error> {
        let opts: Self = serde_json::from_str(text).map_err(|e| {
            //limit maximum number of characters
            Error::Config(format!("{e}").chars().take(500).collect())
        })?;
        opts.validate()?;
        Ok(opts)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }

    fn validate(&self) -> Result<(), Error> {
        let timeouts = [
            ("duration_probe_timeout_secs", self.duration_probe_timeout_secs),
            ("keyframe_timeout_secs", self.keyframe_timeout_secs),
            ("trim_timeout_secs", self.trim_timeout_secs),
        ];

        match timeouts.iter().find(|(_name, secs)| *secs == 0) {
            Some((name, _)) => Err(Error::Config(format!("{name} must be at least 1"))),
            None => Ok(()),
        }
    }

    pub fn duration_probe_timeout(&self) -> Duration {
        Duration::from_secs(self.duration_probe_timeout_secs)
    }

    pub fn keyframe_timeout(&self) -> Duration {
        Duration::from_secs(self.keyframe_timeout_secs)
    }

    pub fn trim_timeout(&self) -> Duration {
        Duration::from_secs(self.trim_timeout_secs)
    }
}
