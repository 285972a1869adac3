use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq, Error)]
pub enum VideoInfoError {
    #[error("Error parsing stats: {0}")]
    ParseFloatError(String),

    #[error("ffprobe did not report a duration")]
    MissingDuration,

    #[error("ffprobe reported an unusable duration: {0}")]
    InvalidDuration(String),
}

impl From<std::num::ParseFloatError> for VideoInfoError {
    fn from(e: std::num::ParseFloatError) -> Self {
        VideoInfoError::ParseFloatError(format!("{e}"))
    }
}

/// Parse the csv output of
/// `ffprobe -skip_frame nokey -show_entries frame=pts_time -of csv`.
///
/// Each line looks like `frame,12.345000`. The output is split on field and
/// record separators, the `frame` section markers are dropped and every other
/// non-empty token must be a number of seconds.
pub fn parse_keyframe_timestamps(text: &str) -> Result<Vec<f64>, VideoInfoError> {
    text.split(|c: char| c == ',' || c == '|' || c.is_whitespace())
        .filter(|token| !token.is_empty() && *token != "frame")
        .map(|token| {
            token.parse::<f64>().map_err(|_| {
                //limit maximum number of characters
                let token = token.chars().take(64).collect::<String>();
                VideoInfoError::ParseFloatError(format!("not a timestamp: {token:?}"))
            })
        })
        .collect()
}

/// Parse the output of `ffprobe -show_entries format=duration -of default=noprint_wrappers=1:nokey=1`,
/// which is a single number of seconds.
pub fn parse_duration(text: &str) -> Result<f64, VideoInfoError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(VideoInfoError::MissingDuration);
    }

    let duration = text
        .parse::<f64>()
        .map_err(|_| VideoInfoError::InvalidDuration(text.chars().take(64).collect()))?;

    if !duration.is_finite() || duration < 0.0 {
        return Err(VideoInfoError::InvalidDuration(text.to_string()));
    }

    Ok(duration)
}
