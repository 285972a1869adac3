#![warn(clippy::unwrap_used)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]

//! Thin wrappers around the ffmpeg and ffprobe command line tools.
//!
//! * [`keyframe_timestamps`] and [`video_duration`] run ffprobe to completion and parse its output.
//! * [`FfmpegKeyframeIter`] streams the keyframes of a video out of a running ffmpeg process.
//! * [`stream_copy`] copies (and optionally trims the start of) a video without re-encoding.
//!
//! Every invocation is bounded by a timeout. The tools' stderr is always discarded.

mod ffmpeg_error_kind;
mod ffmpeg_ops;
mod ffmpeg_stats;
mod png_stream;

pub use ffmpeg_error_kind::FfmpegError;
pub use ffmpeg_ops::{
    ffmpeg_and_ffprobe_are_callable, keyframe_timestamps, stream_copy, video_duration,
    FfmpegKeyframeIter, ToolPaths,
};
pub use ffmpeg_stats::{parse_duration, parse_keyframe_timestamps, VideoInfoError};
pub use png_stream::{PngRecord, PngStreamReader, PngStreamStats, PushbackReader, PNG_SIGNATURE};

pub(crate) use ffmpeg_ops::FfmpegCommandName;
