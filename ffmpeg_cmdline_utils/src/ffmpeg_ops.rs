use std::{
    ffi::OsStr,
    fmt,
    io::prelude::*,
    path::{Path, PathBuf},
    process::{Child, ChildStdout, Command, ExitStatus, Stdio},
    time::{Duration, Instant},
};

#[cfg(target_family = "windows")]
use std::os::windows::process::CommandExt;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use serde::{Deserialize, Serialize};
use wait_timeout::ChildExt;
use FfmpegCommandName::*;
use FfmpegError::*;

use crate::*;

/// Where to find the ffmpeg and ffprobe executables. By default both are looked
/// up on the PATH.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        }
    }
}

/// Reads the keyframes of a video from a running ffmpeg process, as RGB images.
///
/// Records are produced in the order ffmpeg emits them. Call [`FfmpegKeyframeIter::finish`]
/// once the iterator is exhausted to learn whether ffmpeg exited cleanly.
#[derive(Debug)]
pub struct FfmpegKeyframeIter {
    child: Child,
    records: PngStreamReader<ChannelReader>,
    timeout: Duration,
    deadline: Instant,
    finished: bool,
}

impl FfmpegKeyframeIter {
    /// Start ffmpeg decoding only the I-frames of `src_path`. Audio is suppressed and
    /// each keyframe is written to stdout as a lossless rgb24 PNG.
    ///
    /// `timeout` bounds the whole extraction, counted from spawn: reading the stream
    /// fails once it has passed, and [`FfmpegKeyframeIter::finish`] only waits for
    /// whatever is left of it.
    pub fn spawn(
        tools: &ToolPaths,
        src_path: impl AsRef<Path>,
        timeout: Duration,
    ) -> Result<Self, FfmpegError> {
        #[rustfmt::skip]
        let args = [
            OsStr::new("-hide_banner"),
            OsStr::new("-loglevel"), OsStr::new("fatal"),
            OsStr::new("-nostdin"),
            OsStr::new("-i"),        src_path.as_ref().as_os_str(),
            OsStr::new("-vf"),       OsStr::new("select='eq(pict_type,PICT_TYPE_I)'"),
            OsStr::new("-vsync"),    OsStr::new("vfr"),
            OsStr::new("-an"),
            OsStr::new("-pix_fmt"),  OsStr::new("rgb24"),
            OsStr::new("-c:v"),      OsStr::new("png"),
            OsStr::new("-f"),        OsStr::new("image2pipe"),
            OsStr::new("-"),
        ];

        let mut child = spawn_ffmpeg_command(tools, Ffmpeg, &args)?;

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _kill_error = child.kill();
                let _wait_error = child.wait();
                return Err(Io("ffmpeg stdout was not captured".to_string()));
            }
        };

        let deadline = Instant::now() + timeout;
        let reader = ChannelReader::spawn(stdout, deadline);

        Ok(Self {
            child,
            records: PngStreamReader::new(reader),
            timeout,
            deadline,
            finished: false,
        })
    }

    pub fn stats(&self) -> PngStreamStats {
        self.records.stats()
    }

    /// Wait for ffmpeg to exit, until the deadline set at spawn time, and check
    /// that it exited successfully.
    pub fn finish(&mut self) -> Result<PngStreamStats, FfmpegError> {
        self.finished = true;
        let remaining = self.deadline.saturating_duration_since(Instant::now());
        let status = wait_with_timeout(&mut self.child, Ffmpeg, remaining).map_err(|e| {
            //report the whole budget, not what was left of it.
            if e.is_timeout() {
                Timeout {
                    tool: Ffmpeg.to_string(),
                    secs: self.timeout.as_secs(),
                }
            } else {
                e
            }
        })?;
        check_exit_status(Ffmpeg, status)?;
        Ok(self.records.stats())
    }
}

impl Iterator for FfmpegKeyframeIter {
    type Item = Result<PngRecord, FfmpegError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.records.next()? {
            Ok(record) => Some(Ok(record)),
            Err(e) => {
                self.finished = true;
                let _kill_error = self.child.kill();
                let _wait_error = self.child.wait();

                if e.kind() == std::io::ErrorKind::TimedOut {
                    Some(Err(Timeout {
                        tool: Ffmpeg.to_string(),
                        secs: self.timeout.as_secs(),
                    }))
                } else {
                    Some(Err(FfmpegError::from_io(Ffmpeg, &e)))
                }
            }
        }
    }
}

// to prevent accumulation of zombie processes, reap the return code of
// ffmpeg subcommands (if nothing else has done so already) here
impl Drop for FfmpegKeyframeIter {
    fn drop(&mut self) {
        let _kill_error = self.child.kill();
        let _wait_error = self.child.wait();
    }
}

/// Pumps a child's stdout on a helper thread so that reads can give up at a deadline
/// instead of blocking forever on a stalled process.
#[derive(Debug)]
pub(crate) struct ChannelReader {
    chunks: Receiver<std::io::Result<Vec<u8>>>,
    current: Vec<u8>,
    pos: usize,
    deadline: Instant,
    eof: bool,
}

impl ChannelReader {
    fn spawn(mut stdout: ChildStdout, deadline: Instant) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(16);

        std::thread::spawn(move || {
            let mut buf = [0u8; 64 * 1024];
            loop {
                match stdout.read(&mut buf) {
                    Ok(0) => return,
                    Ok(amount) => {
                        if tx.send(Ok(buf[..amount].to_vec())).is_err() {
                            return;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        let _send_error = tx.send(Err(e));
                        return;
                    }
                }
            }
        });

        Self {
            chunks: rx,
            current: vec![],
            pos: 0,
            deadline,
            eof: false,
        }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        while self.pos >= self.current.len() {
            if self.eof {
                return Ok(0);
            }

            match self.chunks.recv_deadline(self.deadline) {
                Ok(Ok(chunk)) => {
                    self.current = chunk;
                    self.pos = 0;
                }
                Ok(Err(e)) => return Err(e),
                //sender dropped: stdout was closed.
                Err(RecvTimeoutError::Disconnected) => self.eof = true,
                Err(RecvTimeoutError::Timeout) => {
                    return Err(std::io::Error::from(std::io::ErrorKind::TimedOut))
                }
            }
        }

        let amount = buf.len().min(self.current.len() - self.pos);
        buf[..amount].copy_from_slice(&self.current[self.pos..self.pos + amount]);
        self.pos += amount;
        Ok(amount)
    }
}

/// List the presentation timestamps (in seconds) of every keyframe in the first video
/// stream of `src_path`, in the order ffprobe reports them.
pub fn keyframe_timestamps(
    tools: &ToolPaths,
    src_path: impl AsRef<Path>,
    timeout: Duration,
) -> Result<Vec<f64>, FfmpegError> {
    //"ffprobe -loglevel fatal -skip_frame nokey -select_streams v:0 -show_entries frame=pts_time -of csv {}"

    #[rustfmt::skip]
    let args = [
        OsStr::new("-loglevel"),       OsStr::new("fatal"),
        OsStr::new("-skip_frame"),     OsStr::new("nokey"),
        OsStr::new("-select_streams"), OsStr::new("v:0"),
        OsStr::new("-show_entries"),   OsStr::new("frame=pts_time"),
        OsStr::new("-of"),             OsStr::new("csv"),
        src_path.as_ref().as_os_str(),
    ];

    let stdout = run_ffmpeg_command(tools, Ffprobe, &args, timeout)?;
    let text = String::from_utf8(stdout).map_err(|_| Utf8Conversion)?;

    Ok(parse_keyframe_timestamps(&text)?)
}

/// Use ffprobe to get the duration of the container, in seconds.
pub fn video_duration(
    tools: &ToolPaths,
    src_path: impl AsRef<Path>,
    timeout: Duration,
) -> Result<f64, FfmpegError> {
    #[rustfmt::skip]
    let args = [
        OsStr::new("-v"),            OsStr::new("error"),
        OsStr::new("-show_entries"), OsStr::new("format=duration"),
        OsStr::new("-of"),           OsStr::new("default=noprint_wrappers=1:nokey=1"),
        src_path.as_ref().as_os_str(),
    ];

    let stdout = run_ffmpeg_command(tools, Ffprobe, &args, timeout)?;
    let text = String::from_utf8(stdout).map_err(|_| Utf8Conversion)?;

    Ok(parse_duration(&text)?)
}

/// Write every stream of `src_path` into `dest_path` without re-encoding. If `seek_secs`
/// is given, the output starts at that offset into the input. An existing file at
/// `dest_path` is overwritten.
pub fn stream_copy(
    tools: &ToolPaths,
    src_path: impl AsRef<Path>,
    dest_path: impl AsRef<Path>,
    seek_secs: Option<f64>,
    timeout: Duration,
) -> Result<(), FfmpegError> {
    let seek_string = seek_secs.map(|secs| format!("{secs:.6}"));
    let seek_arg = match seek_string {
        Some(ref seek) => vec![OsStr::new("-ss"), OsStr::new(seek)],
        None => vec![],
    };

    #[rustfmt::skip]
    let mut args = vec![
        OsStr::new("-hide_banner"),
        OsStr::new("-loglevel"), OsStr::new("fatal"),
        OsStr::new("-nostdin"),
        OsStr::new("-y"),
    ];

    args.extend(seek_arg);

    #[rustfmt::skip]
    args.extend([
        OsStr::new("-i"),   src_path.as_ref().as_os_str(),
        OsStr::new("-map"), OsStr::new("0"),
        OsStr::new("-c"),   OsStr::new("copy"),
        dest_path.as_ref().as_os_str(),
    ]);

    let mut child = spawn_ffmpeg_command(tools, Ffmpeg, &args)?;

    //nothing useful is written to stdout.
    std::mem::drop(child.stdout.take());

    let status = wait_with_timeout(&mut child, Ffmpeg, timeout)?;
    check_exit_status(Ffmpeg, status)
}

pub fn ffmpeg_and_ffprobe_are_callable(tools: &ToolPaths) -> bool {
    let timeout = Duration::from_secs(15);

    //check ffprobe is callable.
    if run_ffmpeg_command(tools, Ffprobe, &[OsStr::new("-version")], timeout).is_err() {
        return false;
    }

    //now ffmpeg.
    if run_ffmpeg_command(tools, Ffmpeg, &[OsStr::new("-version")], timeout).is_err() {
        return false;
    }

    true
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FfmpegCommandName {
    Ffprobe,
    Ffmpeg,
}

impl FfmpegCommandName {
    fn program<'a>(&self, tools: &'a ToolPaths) -> &'a OsStr {
        match self {
            Self::Ffprobe => tools.ffprobe.as_os_str(),
            Self::Ffmpeg => tools.ffmpeg.as_os_str(),
        }
    }
}

impl fmt::Display for FfmpegCommandName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ffprobe => write!(f, "ffprobe"),
            Self::Ffmpeg => write!(f, "ffmpeg"),
        }
    }
}

// stderr always goes to the null device. ffmpeg can write a lot to it, and an unread
// pipe that fills up would stall the process.
fn spawn_ffmpeg_command(
    tools: &ToolPaths,
    name: FfmpegCommandName,
    args: &[&OsStr],
) -> Result<Child, FfmpegError> {
    let mut command = Command::new(name.program(tools));
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());

    //do not spawn a command window on windows when when in a gui application
    #[cfg(target_family = "windows")]
    command.creation_flags(winapi::um::winbase::CREATE_NO_WINDOW);

    command
        .spawn()
        .map_err(|e| FfmpegError::from_io(name, &e))
}

fn wait_with_timeout(
    child: &mut Child,
    name: FfmpegCommandName,
    timeout: Duration,
) -> Result<ExitStatus, FfmpegError> {
    match child.wait_timeout(timeout) {
        Ok(Some(status)) => Ok(status),
        Ok(None) => {
            let _kill_error = child.kill();
            let _wait_error = child.wait();
            Err(Timeout {
                tool: name.to_string(),
                secs: timeout.as_secs(),
            })
        }
        Err(e) => {
            let _kill_error = child.kill();
            let _wait_error = child.wait();
            Err(FfmpegError::from_io(name, &e))
        }
    }
}

fn check_exit_status(name: FfmpegCommandName, status: ExitStatus) -> Result<(), FfmpegError> {
    if status.success() {
        Ok(())
    } else {
        Err(NonZeroExit {
            tool: name.to_string(),
            code: status.code(),
        })
    }
}

// Run a command to completion and collect its stdout.
fn run_ffmpeg_command(
    tools: &ToolPaths,
    name: FfmpegCommandName,
    args: &[&OsStr],
    timeout: Duration,
) -> Result<Vec<u8>, FfmpegError> {
    let mut child = spawn_ffmpeg_command(tools, name, args)?;

    let mut stdout = match child.stdout.take() {
        Some(stdout) => stdout,
        None => {
            let _kill_error = child.kill();
            let _wait_error = child.wait();
            return Err(Io(format!("{name} stdout was not captured")));
        }
    };

    //stdout is drained on a separate thread so that a process which produces a lot of
    //output cannot block on a full pipe while we wait for it to exit.
    let reader = std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
        let mut acc = vec![];
        stdout.read_to_end(&mut acc)?;
        Ok(acc)
    });

    let status = wait_with_timeout(&mut child, name, timeout)?;

    let stdout = reader
        .join()
        .map_err(|_| Io(format!("{name} stdout reader panicked")))?
        .map_err(|e| FfmpegError::from_io(name, &e))?;

    check_exit_status(name, status)?;

    Ok(stdout)
}
