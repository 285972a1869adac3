pub mod batch;
pub mod events;
pub mod key_frame;
pub mod keyframe_stream;
pub mod matcher;
pub mod options;
pub mod trim;
pub mod video;

use ffmpeg_cmdline_utils::FfmpegError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An error that prevented a video from being loaded, matched or trimmed.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Error {
    /// File is not a video.
    #[error("File is not a video: {0}")]
    NotVideo(String),

    /// ffmpeg decoded more keyframe images than ffprobe reported keyframe timestamps.
    #[error("timestamp/keyframe count mismatch: keyframe {keyframe} has no timestamp (only {timestamps} timestamps)")]
    KeyframeCountMismatch { keyframe: u32, timestamps: usize },

    #[error("External tool failure: {0}")]
    Tool(#[from] FfmpegError),

    /// The duration of the video could not be determined.
    #[error("Video is corrupted")]
    Corrupted,

    #[error("File operation failed: {0}")]
    FileOp(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Broad categories of [`Error`], used when reporting per-file failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Unreadable, not a video, or structurally corrupt. The file is left out of matching
    /// and trimming.
    InvalidFile,
    /// An external tool failed to start or reported failure.
    ExternalToolFailure,
    /// An external tool exceeded its time limit.
    Timeout,
    /// The operation was interrupted and abandoned.
    Interrupted,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotVideo(_)
            | Self::KeyframeCountMismatch { .. }
            | Self::Corrupted
            | Self::Config(_) => ErrorKind::InvalidFile,

            Self::Tool(FfmpegError::Timeout { .. }) => ErrorKind::Timeout,
            Self::Tool(FfmpegError::Interrupted(_)) => ErrorKind::Interrupted,
            Self::Tool(FfmpegError::Stats(_)) => ErrorKind::InvalidFile,
            Self::Tool(_) | Self::FileOp(_) => ErrorKind::ExternalToolFailure,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        match e.kind() {
            std::io::ErrorKind::Interrupted => Self::Tool(FfmpegError::Interrupted(e.to_string())),
            _ => Self::FileOp(e.to_string()),
        }
    }
}
