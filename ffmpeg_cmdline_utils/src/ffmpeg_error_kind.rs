use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::*;

/// Various causes of failure for ffmpeg/ffprobe functions.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FfmpegError {
    /// Ffmpeg/Ffprobe command was not found. Make sure Ffmpeg is installed and can be found on the command line.
    #[error("ffmpeg/ffprobe file not found. Make sure ffmpeg/ffprobe are installed and visible on the command line")]
    FfmpegNotFound,

    /// The operating system refused to launch the command.
    #[error("permission denied when launching {0}")]
    PermissionDenied(String),

    /// Io error occurred while executing Ffmpeg/Ffprobe command
    #[error("Ffmpeg IO error: {0}")]
    Io(String),

    /// Ffmpeg/Ffprobe ran to completion but returned a nonzero exit code. `code` is `None`
    /// when the process was terminated by a signal.
    #[error("{tool} exited with status {code:?}")]
    NonZeroExit { tool: String, code: Option<i32> },

    /// The command did not finish within its allotted time and was killed.
    #[error("{tool} did not finish within {secs} seconds")]
    Timeout { tool: String, secs: u64 },

    /// Waiting on the command was interrupted. The operation is abandoned.
    #[error("interrupted while waiting for {0}")]
    Interrupted(String),

    /// Failed to interpret Ffmpeg/Ffprobe output as a utf8-string.
    #[error("utf8 parsing/conversion failure")]
    Utf8Conversion,

    /// Ffprobe succeeded but its output could not be understood.
    #[error("Failed to parse ffprobe output")]
    Stats(#[from] VideoInfoError),
}

impl FfmpegError {
    pub(crate) fn from_io(tool: FfmpegCommandName, e: &std::io::Error) -> Self {
        use std::io::ErrorKind;

        match e.kind() {
            //by far the most likely cause is that ffmpeg is not installed.
            ErrorKind::NotFound => Self::FfmpegNotFound,
            ErrorKind::PermissionDenied => Self::PermissionDenied(tool.to_string()),
            ErrorKind::Interrupted => Self::Interrupted(tool.to_string()),
            kind => Self::Io(format!("{tool}: {kind:?}")),
        }
    }

    /// True if the command was killed for running too long.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
