use std::path::Path;

use ffmpeg_cmdline_utils::{keyframe_timestamps, FfmpegError, FfmpegKeyframeIter, PngRecord};

use crate::video_overlap::key_frame::KeyFrame;
use crate::{Error, OverlapOptions};

/// The keyframes recovered from one video.
#[derive(Debug, Clone, Default)]
pub struct KeyframeExtraction {
    /// Successfully decoded keyframes, ascending by timestamp.
    pub key_frames: Vec<KeyFrame>,

    /// Image records which were found in the stream but could not be decoded.
    pub corrupted_keyframes: u32,

    /// Bytes of the stream which did not belong to any image.
    pub skipped_bytes: u64,
}

/// Read the timestamps of every keyframe in `src_path` with ffprobe, then decode the
/// keyframes themselves with ffmpeg and pair the two up by position.
///
/// Both tool invocations are bounded by [`OverlapOptions::keyframe_timeout`].
pub fn read_keyframes(
    src_path: impl AsRef<Path>,
    opts: &OverlapOptions,
) -> Result<KeyframeExtraction, Error> {
    let src_path = src_path.as_ref();
    let timeout = opts.keyframe_timeout();

    let timestamps = keyframe_timestamps(&opts.tools, src_path, timeout)?;

    let mut frames = FfmpegKeyframeIter::spawn(&opts.tools, src_path, timeout)?;
    let mut extraction = pair_keyframes(&timestamps, frames.by_ref())?;

    let stats = frames.finish()?;
    extraction.skipped_bytes = stats.skipped_bytes;

    Ok(extraction)
}

/// Pair the n'th image record with the n'th timestamp.
///
/// Records that could not be decoded still use up their timestamp, so that the
/// images after them stay aligned. A decoded image without a timestamp means the
/// two streams disagree about the structure of the file, and is an error.
pub fn pair_keyframes<I>(timestamps: &[f64], records: I) -> Result<KeyframeExtraction, Error>
where
    I: IntoIterator<Item = Result<PngRecord, FfmpegError>>,
{
    let mut extraction = KeyframeExtraction::default();

    for (position, record) in records.into_iter().enumerate() {
        let sequence_id = u32::try_from(position + 1).unwrap_or(u32::MAX);

        match record? {
            PngRecord::Image(image) => {
                let timestamp = *timestamps.get(position).ok_or(Error::KeyframeCountMismatch {
                    keyframe: sequence_id,
                    timestamps: timestamps.len(),
                })?;

                extraction
                    .key_frames
                    .push(KeyFrame::new(sequence_id, timestamp, image));
            }
            PngRecord::Corrupt(_reason) => extraction.corrupted_keyframes += 1,
        }
    }

    extraction
        .key_frames
        .sort_by(|a, b| a.timestamp().total_cmp(&b.timestamp()));

    Ok(extraction)
}

#[cfg(test)]
mod test {
    use image::{Rgb, RgbImage};

    use super::*;

    fn solid(value: u8) -> RgbImage {
        RgbImage::from_pixel(2, 2, Rgb([value, value, value]))
    }

    fn image(value: u8) -> Result<PngRecord, FfmpegError> {
        Ok(PngRecord::Image(solid(value)))
    }

    fn corrupt() -> Result<PngRecord, FfmpegError> {
        Ok(PngRecord::Corrupt("bad crc".to_string()))
    }

    #[test]
    fn test_positional_pairing() {
        let ts = [0.0, 2.0, 4.0];
        let extraction = pair_keyframes(&ts, vec![image(1), image(2), image(3)]).unwrap();

        let got = extraction
            .key_frames
            .iter()
            .map(|kf| (kf.sequence_id(), kf.timestamp(), kf.image().clone()))
            .collect::<Vec<_>>();

        assert_eq!(
            got,
            vec![(1, 0.0, solid(1)), (2, 2.0, solid(2)), (3, 4.0, solid(3))]
        );
        assert_eq!(extraction.corrupted_keyframes, 0);
    }

    #[test]
    fn test_corrupt_record_consumes_its_timestamp() {
        let ts = [0.0, 2.0, 4.0];
        let extraction = pair_keyframes(&ts, vec![image(1), corrupt(), image(3)]).unwrap();

        let got = extraction
            .key_frames
            .iter()
            .map(|kf| (kf.sequence_id(), kf.timestamp()))
            .collect::<Vec<_>>();

        assert_eq!(got, vec![(1, 0.0), (3, 4.0)]);
        assert_eq!(extraction.corrupted_keyframes, 1);
    }

    #[test]
    fn test_trailing_corrupt_records_leave_fewer_keyframes() {
        let ts = [0.0, 2.0, 4.0];
        let extraction = pair_keyframes(&ts, vec![image(1), corrupt(), corrupt()]).unwrap();
        assert_eq!(extraction.key_frames.len(), 1);
        assert_eq!(extraction.corrupted_keyframes, 2);
    }

    #[test]
    fn test_more_images_than_timestamps_is_an_error() {
        let ts = [0.0, 2.0];
        let res = pair_keyframes(&ts, vec![image(1), image(2), image(3)]);
        assert_eq!(
            res.unwrap_err(),
            Error::KeyframeCountMismatch {
                keyframe: 3,
                timestamps: 2
            }
        );
    }

    #[test]
    fn test_no_timestamps_at_all() {
        let res = pair_keyframes(&[], vec![image(1)]);
        assert!(matches!(res, Err(Error::KeyframeCountMismatch { .. })));

        let extraction = pair_keyframes(&[], Vec::<Result<PngRecord, FfmpegError>>::new()).unwrap();
        assert!(extraction.key_frames.is_empty());
    }

    #[test]
    fn test_stream_failure_is_propagated() {
        let ts = [0.0, 2.0];
        let timeout = Err(FfmpegError::Timeout {
            tool: "ffmpeg".to_string(),
            secs: 180,
        });
        let res = pair_keyframes(&ts, vec![image(1), timeout]);
        assert_eq!(res.unwrap_err().kind(), crate::ErrorKind::Timeout);
    }

    #[test]
    fn test_keyframes_sorted_by_timestamp() {
        let ts = [4.0, 0.0, 2.0];
        let extraction = pair_keyframes(&ts, vec![image(1), image(2), image(3)]).unwrap();
        let got = extraction
            .key_frames
            .iter()
            .map(KeyFrame::timestamp)
            .collect::<Vec<_>>();
        assert_eq!(got, vec![0.0, 2.0, 4.0]);
    }
}
