/// The default time limit for probing the duration of a video.
///
/// Unit: Seconds
pub const DEFAULT_DURATION_PROBE_TIMEOUT_SECS: u64 = 15;

/// The default time limit for extracting every keyframe of a single video. Decoding
/// a long clip is slow, so this is generous.
///
/// Unit: Seconds
pub const DEFAULT_KEYFRAME_TIMEOUT_SECS: u64 = 180;

/// The default time limit for trimming (or copying) a single video. No re-encoding
/// takes place, so this is mostly bounded by disk speed.
///
/// Unit: Seconds
pub const DEFAULT_TRIM_TIMEOUT_SECS: u64 = 60;

/// Appended to the name of a directory of clips to name the directory that trimmed
/// copies are written to, when the originals are not overwritten.
pub const OUTPUT_DIR_SUFFIX: &str = " - Overlap Removed";
