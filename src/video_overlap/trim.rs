use std::path::{Path, PathBuf};

use ffmpeg_cmdline_utils::stream_copy;
use serde::Serialize;

use crate::definitions::OUTPUT_DIR_SUFFIX;
use crate::video_overlap::batch::VideoBatch;
use crate::video_overlap::events::{EventHandler, OverlapEvent};
use crate::video_overlap::video::Video;
use crate::{Error, OverlapOptions};

/// Where trimmed videos are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OutputPolicy {
    /// Replace each original with its trimmed version. Videos without a cut point are left alone.
    Overwrite,

    /// Write every usable video into this (existing) directory under its original file
    /// name. Videos without a cut point are copied unchanged.
    MirrorInto(PathBuf),
}

impl OutputPolicy {
    /// Build a policy from an overwrite flag and an optional destination directory.
    /// The destination is ignored when overwriting, and required otherwise.
    pub fn from_flag(overwrite: bool, destination: Option<PathBuf>) -> Result<Self, Error> {
        match (overwrite, destination) {
            (true, _) => Ok(Self::Overwrite),
            (false, Some(dir)) => Ok(Self::MirrorInto(dir)),
            (false, None) => Err(Error::Config(
                "a destination directory is required when originals are not overwritten".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TrimStatus {
    /// The duplicated start of the video was removed. The result is at `output`.
    Trimmed { output: PathBuf },

    /// The video had no cut point and was copied to `output` unchanged.
    Copied { output: PathBuf },

    /// The video had no cut point, and the original was left in place.
    NoCutPoint,

    /// The video could not be loaded, for the given reason, so it was not touched.
    Corrupted(Error),

    Failed(Error),
}

/// What happened to one video of the batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrimOutcome {
    /// 1-based position of the video in the batch.
    pub index: usize,
    pub src_path: PathBuf,
    pub status: TrimStatus,
}

/// The conventional name of the directory that trimmed copies of the clips in `dir` go to.
/// The directory is not created.
pub fn default_output_dir(dir: impl AsRef<Path>) -> PathBuf {
    let dir = dir.as_ref();
    let name = dir
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    dir.with_file_name(format!("{name}{OUTPUT_DIR_SUFFIX}"))
}

/// Cut every usable video of the batch at its cut point, one video at a time, in batch order.
///
/// A failure only affects the video it happened to. Every video gets an outcome.
pub fn execute_cuts(
    batch: &VideoBatch,
    policy: &OutputPolicy,
    opts: &OverlapOptions,
    events: &dyn EventHandler,
) -> Vec<TrimOutcome> {
    let total = batch.len();

    batch
        .iter()
        .map(|(id, video)| {
            let index = id.index() + 1;
            let path = video.file_path().to_path_buf();

            let status = if !video.is_usable() {
                TrimStatus::Corrupted(video.load_error().cloned().unwrap_or(Error::Corrupted))
            } else {
                events.handle(&OverlapEvent::TrimStarted {
                    index,
                    total,
                    path: path.clone(),
                });
                trim_one(video, policy, opts).unwrap_or_else(TrimStatus::Failed)
            };
            report(events, index, &path, &status);

            TrimOutcome {
                index,
                src_path: path,
                status,
            }
        })
        .collect()
}

fn report(events: &dyn EventHandler, index: usize, path: &Path, status: &TrimStatus) {
    let path = path.to_path_buf();
    match status {
        TrimStatus::Trimmed { output } | TrimStatus::Copied { output } => {
            events.handle(&OverlapEvent::TrimSucceeded {
                index,
                path,
                output: output.clone(),
            })
        }
        TrimStatus::NoCutPoint => events.handle(&OverlapEvent::TrimSkipped {
            index,
            path,
            reason: "has no cut point yet".to_string(),
        }),
        TrimStatus::Corrupted(e) => events.handle(&OverlapEvent::TrimSkipped {
            index,
            path,
            reason: format!("video is unusable: {e}"),
        }),
        TrimStatus::Failed(e) => events.handle(&OverlapEvent::TrimFailed {
            index,
            path,
            error: e.to_string(),
        }),
    }
}

fn trim_one(
    video: &Video,
    policy: &OutputPolicy,
    opts: &OverlapOptions,
) -> Result<TrimStatus, Error> {
    let src_path = video.file_path();
    let timeout = opts.trim_timeout();

    match (video.cut_point(), policy) {
        (None, OutputPolicy::Overwrite) => Ok(TrimStatus::NoCutPoint),

        (None, OutputPolicy::MirrorInto(dir)) => {
            let output = mirror_path(dir, src_path)?;
            copy_or_clean_up(&output, || {
                stream_copy(&opts.tools, src_path, &output, None, timeout)
            })?;
            Ok(TrimStatus::Copied { output })
        }

        (Some(cut_point), OutputPolicy::MirrorInto(dir)) => {
            let output = mirror_path(dir, src_path)?;
            copy_or_clean_up(&output, || {
                stream_copy(&opts.tools, src_path, &output, Some(cut_point), timeout)
            })?;
            Ok(TrimStatus::Trimmed { output })
        }

        (Some(cut_point), OutputPolicy::Overwrite) => {
            //ffmpeg cannot write over its own input, so write beside it and swap it in afterwards.
            let temp_path = temp_path_for(src_path);
            copy_or_clean_up(&temp_path, || {
                stream_copy(&opts.tools, src_path, &temp_path, Some(cut_point), timeout)
            })?;

            if let Err(e) = replace_file(&temp_path, src_path) {
                let _remove_error = std::fs::remove_file(&temp_path);
                return Err(e);
            }

            Ok(TrimStatus::Trimmed {
                output: src_path.to_path_buf(),
            })
        }
    }
}

/// Run `copy`, deleting whatever it left at `output` if it fails.
fn copy_or_clean_up<F>(output: &Path, copy: F) -> Result<(), Error>
where
    F: FnOnce() -> Result<(), ffmpeg_cmdline_utils::FfmpegError>,
{
    copy().map_err(|e| {
        if output.exists() {
            let _remove_error = std::fs::remove_file(output);
        }
        Error::from(e)
    })
}

fn mirror_path(dest_dir: &Path, src_path: &Path) -> Result<PathBuf, Error> {
    if !dest_dir.is_dir() {
        return Err(Error::FileOp(format!(
            "destination directory does not exist: {}",
            dest_dir.display()
        )));
    }

    let file_name = src_path
        .file_name()
        .ok_or_else(|| Error::FileOp(format!("no file name in {}", src_path.display())))?;
    let dest = dest_dir.join(file_name);

    //a destination that does not exist yet cannot be the source.
    if let (Ok(dest_canon), Ok(src_canon)) = (dest.canonicalize(), src_path.canonicalize()) {
        if dest_canon == src_canon {
            return Err(Error::FileOp(format!(
                "refusing to write {} over itself",
                src_path.display()
            )));
        }
    }

    Ok(dest)
}

/// A hidden file beside `src_path` which keeps its extension, so that ffmpeg picks the
/// same container.
fn temp_path_for(src_path: &Path) -> PathBuf {
    let stem = src_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_default();

    let temp_name = match src_path.extension() {
        Some(ext) => format!(".{stem}.overlap-trim.{}", ext.to_string_lossy()),
        None => format!(".{stem}.overlap-trim"),
    };

    src_path.with_file_name(temp_name)
}

fn replace_file(source: &Path, dest: &Path) -> Result<(), Error> {
    if std::fs::rename(source, dest).is_ok() {
        return Ok(());
    }

    //rename can fail across filesystems. Try copy and delete.
    std::fs::copy(source, dest).map_err(|e| {
        Error::FileOp(format!(
            "could not replace {} with {}: {e}",
            dest.display(),
            source.display()
        ))
    })?;
    std::fs::remove_file(source)?;

    Ok(())
}
