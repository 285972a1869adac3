#![warn(clippy::unwrap_used)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]

//! # Overview
//! vid_overlap_lib finds and removes footage that was recorded twice by a dashcam.
//!
//! Dashcams record in fixed-length clips, and many of them start the next clip a few
//! seconds before the previous one ends. Played back to back, the clips repeat those
//! seconds. This library finds out which clip continues which, and how much of the
//! start of each clip is already contained in the clip before it.
//!
//! # How it works
//! * Every keyframe of every clip is decoded with ffmpeg, and its timestamp is read with ffprobe.
//! * Two clips overlap when they contain a keyframe with exactly the same picture. The
//!   clip in which that keyframe appears later is the one that started first (the lead),
//!   and the other clip continues it (the secondary).
//! * Each lead is matched with the secondary whose overlap starts soonest. The secondary
//!   is then cut at the point where the lead ends.
//! * Cutting is a stream copy from the cut point onwards. Nothing is re-encoded.
//!
//! # High Level API
//! ```no_run
//! use vid_overlap_lib::{execute_cuts, LogEventHandler, OutputPolicy, OverlapOptions, VideoBatch};
//!
//! let clips = ["cam/0001.mp4", "cam/0002.mp4", "cam/0003.mp4"];
//! let opts = OverlapOptions::default();
//!
//! //load every clip and work out the cut points.
//! let batch = VideoBatch::build(clips, &opts, &LogEventHandler);
//!
//! //replace each clip with its trimmed version.
//! let outcomes = execute_cuts(&batch, &OutputPolicy::Overwrite, &opts, &LogEventHandler);
//! assert_eq!(outcomes.len(), 3);
//! ```
//!
//! Components never print. Progress and problems are reported as [`OverlapEvent`]s to an
//! [`EventHandler`] chosen by the caller. [`LogEventHandler`] forwards them to the `log`
//! crate, and [`configure_logs`] installs a terminal logger.
//!
//! # Limitations
//! Keyframes are compared exactly, pixel for pixel. Clips which were re-encoded separately
//! will not match. Only pairs of clips are considered: a secondary is never checked against
//! the clip before its lead.
//!
//! # Prerequisites
//! This crate calls ffmpeg and ffprobe from the command line. They must be on the PATH,
//! or their locations given in [`ToolPaths`].

mod definitions;
mod logging;
mod video_overlap;

pub use definitions::{
    DEFAULT_DURATION_PROBE_TIMEOUT_SECS, DEFAULT_KEYFRAME_TIMEOUT_SECS, DEFAULT_TRIM_TIMEOUT_SECS,
    OUTPUT_DIR_SUFFIX,
};
pub use logging::{configure_logs, ReportVerbosity};
pub use video_overlap::{
    batch::{Resolution, VideoBatch, VideoId},
    events::{EventHandler, LogEventHandler, NullEventHandler, OverlapEvent},
    key_frame::KeyFrame,
    keyframe_stream::{pair_keyframes, read_keyframes, KeyframeExtraction},
    matcher::{find_cut_point, find_overlap, OverlapMatch},
    options::OverlapOptions,
    trim::{default_output_dir, execute_cuts, OutputPolicy, TrimOutcome, TrimStatus},
    video::{Video, VideoFileType},
    Error, ErrorKind,
};

pub use ffmpeg_cmdline_utils::{ffmpeg_and_ffprobe_are_callable, FfmpegError, ToolPaths};
