use std::path::{Path, PathBuf};

use ffmpeg_cmdline_utils::video_duration;
use serde::{Deserialize, Serialize};

use crate::video_overlap::events::{EventHandler, OverlapEvent};
use crate::video_overlap::key_frame::KeyFrame;
use crate::video_overlap::keyframe_stream::read_keyframes;
use crate::{Error, OverlapOptions};

/// Container formats recognised by their file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoFileType {
    Mp4,
    M4v,
    Mov,
    Mkv,
    Avi,
    Webm,
    Ts,
}

impl VideoFileType {
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let ext = path.as_ref().extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "mp4" => Some(Self::Mp4),
            "m4v" => Some(Self::M4v),
            "mov" => Some(Self::Mov),
            "mkv" => Some(Self::Mkv),
            "avi" => Some(Self::Avi),
            "webm" => Some(Self::Webm),
            "ts" => Some(Self::Ts),
            _ => None,
        }
    }
}

/// One clip of the batch: where it lives, how long it is, and its keyframes.
///
/// Everything except the cut point is fixed once the video has been loaded. The cut
/// point is written by the lead video which claims this one as its secondary, see
/// [`crate::VideoBatch::update_secondary`].
#[derive(Debug, Clone)]
pub struct Video {
    file_name: String,
    file_path: PathBuf,
    file_type: Option<VideoFileType>,
    duration: Option<f64>,
    corrupted: bool,
    key_frames: Vec<KeyFrame>,
    cut_point: Option<f64>,
    load_error: Option<Error>,
}

impl Video {
    /// Probe the duration of `src_path` and read all of its keyframes.
    ///
    /// Never fails. If the duration cannot be read the video is marked as corrupted
    /// and its keyframes are not read. If the keyframes cannot be read the video keeps
    /// an empty keyframe list. In both cases the reason is kept in [`Video::load_error`]
    /// and the video is not [usable](Video::is_usable).
    pub fn load(
        src_path: impl AsRef<Path>,
        opts: &OverlapOptions,
        events: &dyn EventHandler,
    ) -> Self {
        let src_path = src_path.as_ref();
        let mut video = Self::from_parts(src_path, None, vec![]);

        //unknown containers are never probed, so their duration stays unknown.
        if video.file_type.is_none() {
            let e = Error::NotVideo(src_path.display().to_string());
            events.handle(&OverlapEvent::VideoCorrupted {
                path: src_path.to_path_buf(),
                reason: e.to_string(),
            });
            video.load_error = Some(e);
            return video;
        }

        match video_duration(&opts.tools, src_path, opts.duration_probe_timeout()) {
            Ok(duration) => {
                video.duration = Some(duration);
                video.corrupted = false;
            }
            Err(e) => {
                events.handle(&OverlapEvent::VideoCorrupted {
                    path: src_path.to_path_buf(),
                    reason: e.to_string(),
                });
                video.load_error = Some(e.into());
                return video;
            }
        }

        match read_keyframes(src_path, opts) {
            Ok(extraction) => {
                events.handle(&OverlapEvent::KeyframesExtracted {
                    path: src_path.to_path_buf(),
                    keyframes: extraction.key_frames.len(),
                    corrupted_keyframes: extraction.corrupted_keyframes,
                    skipped_bytes: extraction.skipped_bytes,
                });
                video.key_frames = extraction.key_frames;
            }
            Err(e) => {
                events.handle(&OverlapEvent::KeyframeExtractionFailed {
                    path: src_path.to_path_buf(),
                    reason: e.to_string(),
                });
                video.load_error = Some(e);
            }
        }

        video
    }

    /// Build a video from already-known parts. A video without a duration is corrupted.
    pub fn from_parts(
        src_path: impl AsRef<Path>,
        duration: Option<f64>,
        mut key_frames: Vec<KeyFrame>,
    ) -> Self {
        let file_path = src_path.as_ref().to_path_buf();
        let file_name = file_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();

        key_frames.sort_by(|a, b| a.timestamp().total_cmp(&b.timestamp()));

        Self {
            file_name,
            file_type: VideoFileType::from_path(&file_path),
            file_path,
            corrupted: duration.is_none(),
            duration,
            key_frames,
            cut_point: None,
            load_error: None,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn file_type(&self) -> Option<VideoFileType> {
        self.file_type
    }

    /// Duration in seconds, if it could be determined.
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// True when the duration of the video could not be determined.
    pub fn is_corrupted(&self) -> bool {
        self.corrupted
    }

    /// Whether the video takes part in matching and trimming. Corrupted videos and
    /// videos whose keyframes could not be read are left out.
    pub fn is_usable(&self) -> bool {
        !self.corrupted && self.load_error.is_none()
    }

    /// Keyframes ascending by timestamp.
    pub fn key_frames(&self) -> &[KeyFrame] {
        &self.key_frames
    }

    /// Seconds of duplicated footage at the start of this video, if a lead video has claimed it.
    pub fn cut_point(&self) -> Option<f64> {
        self.cut_point
    }

    /// Why loading the video went wrong, if it did.
    pub fn load_error(&self) -> Option<&Error> {
        self.load_error.as_ref()
    }

    pub(crate) fn set_cut_point(&mut self, cut_point: Option<f64>) {
        self.cut_point = cut_point;
    }
}

#[cfg(test)]
mod test {
    use image::RgbImage;

    use super::*;

    #[test]
    fn test_file_types() {
        assert_eq!(VideoFileType::from_path("a/b/clip.MP4"), Some(VideoFileType::Mp4));
        assert_eq!(VideoFileType::from_path("clip.webm"), Some(VideoFileType::Webm));
        assert_eq!(VideoFileType::from_path("notes.txt"), None);
        assert_eq!(VideoFileType::from_path("no_extension"), None);
    }

    #[test]
    fn test_from_parts() {
        let frames = vec![
            KeyFrame::new(2, 4.0, RgbImage::new(1, 1)),
            KeyFrame::new(1, 1.0, RgbImage::new(1, 1)),
        ];
        let video = Video::from_parts("/clips/front.mov", Some(12.0), frames);

        assert_eq!(video.file_name(), "front.mov");
        assert_eq!(video.file_type(), Some(VideoFileType::Mov));
        assert_eq!(video.duration(), Some(12.0));
        assert!(!video.is_corrupted());
        assert!(video.is_usable());
        assert_eq!(video.cut_point(), None);
        assert_eq!(video.key_frames()[0].timestamp(), 1.0);

        let corrupt = Video::from_parts("/clips/rear.mov", None, vec![]);
        assert!(corrupt.is_corrupted());
        assert!(!corrupt.is_usable());
    }
}
