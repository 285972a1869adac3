#![cfg(unix)]

// Drives the whole pipeline against shell scripts standing in for ffmpeg and ffprobe.
//
// For a clip at `$input`, the fake ffprobe prints `$input.duration` or
// `$input.timestamps`, and the fake ffmpeg streams `$input.frames` as its keyframe
// images. Stream copies write `seek=<offset>` followed by the input's bytes, unless
// `$input.trimfail` exists (exit 1) or `$input.trimslow` exists (hang after writing).

use std::cell::RefCell;
use std::io::Cursor;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use vid_overlap_lib::*;

static SCRIPT_LOCK: Mutex<()> = Mutex::new(());

const FAKE_FFPROBE: &str = r#"
[ "$1" = "-version" ] && exec echo "ffprobe version fake"
for last; do :; done
case "$*" in
  *format=duration*) cat "$last.duration" ;;
  *) cat "$last.timestamps" ;;
esac
"#;

const FAKE_FFMPEG: &str = r#"
[ "$1" = "-version" ] && exec echo "ffmpeg version fake"
for last; do :; done
input=""
seek=""
while [ $# -gt 0 ]; do
  case "$1" in
    -i) input="$2"; shift ;;
    -ss) seek="$2"; shift ;;
  esac
  shift
done
if [ "$last" = "-" ]; then
  exec cat "$input.frames"
fi
if [ -e "$input.trimfail" ]; then
  exit 1
fi
if [ -e "$input.trimslow" ]; then
  printf 'partial' > "$last"
  exec sleep 10
fi
printf 'seek=%s\n' "$seek" > "$last"
cat "$input" >> "$last"
"#;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn picture(value: u8) -> RgbImage {
    RgbImage::from_fn(6, 4, |x, y| Rgb([value, x as u8 * 40, y as u8 * 60]))
}

fn png_bytes(img: &RgbImage) -> Vec<u8> {
    let mut buf = Cursor::new(vec![]);
    DynamicImage::ImageRgb8(img.clone())
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// Write a clip and the files the fake tools read for it. Keyframes are separated by junk bytes.
fn write_clip(dir: &Path, name: &str, duration: Option<&str>, frames: &[(f64, u8)]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("contents of {name}")).unwrap();

    if let Some(duration) = duration {
        std::fs::write(dir.join(format!("{name}.duration")), format!("{duration}\n")).unwrap();
    }

    let timestamps = frames
        .iter()
        .map(|(ts, _)| format!("frame,{ts:.6}\n"))
        .collect::<String>();
    std::fs::write(dir.join(format!("{name}.timestamps")), timestamps).unwrap();

    let mut stream = b"stray bytes".to_vec();
    for (_, value) in frames {
        stream.extend(png_bytes(&picture(*value)));
        stream.extend(b"\x00\x89junk");
    }
    std::fs::write(dir.join(format!("{name}.frames")), stream).unwrap();

    path
}

struct Fixture {
    dir: tempfile::TempDir,
    opts: OverlapOptions,
    clips: Vec<PathBuf>,
}

// a.mp4 and b.mp4 share a keyframe: a@5.0 == b@3.0, so b continues a and
// loses its first 5 seconds. c.mp4 has no duration, notes.txt is not a video.
fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let tools = ToolPaths {
        ffmpeg: write_script(dir.path(), "ffmpeg", FAKE_FFMPEG),
        ffprobe: write_script(dir.path(), "ffprobe", FAKE_FFPROBE),
    };
    let opts = OverlapOptions {
        tools,
        duration_probe_timeout_secs: 10,
        keyframe_timeout_secs: 10,
        trim_timeout_secs: 10,
    };

    let clips = vec![
        write_clip(dir.path(), "a.mp4", Some("10.000000"), &[(0.0, 1), (5.0, 2)]),
        write_clip(dir.path(), "b.mp4", Some("10.000000"), &[(3.0, 2), (8.0, 3)]),
        write_clip(dir.path(), "c.mp4", None, &[(0.0, 4)]),
        write_clip(dir.path(), "notes.txt", Some("1.0"), &[]),
    ];

    Fixture { dir, opts, clips }
}

#[test]
fn test_build_batch_from_files() {
    let _guard = SCRIPT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let fx = fixture();

    assert!(ffmpeg_and_ffprobe_are_callable(&fx.opts.tools));

    let batch = VideoBatch::build(&fx.clips, &fx.opts, &NullEventHandler);
    let [a, b, c, notes] = batch.ids().collect::<Vec<_>>()[..] else {
        panic!()
    };

    assert_eq!(batch[a].duration(), Some(10.0));
    let a_timestamps = batch[a]
        .key_frames()
        .iter()
        .map(KeyFrame::timestamp)
        .collect::<Vec<_>>();
    assert_eq!(a_timestamps, vec![0.0, 5.0]);
    assert_eq!(batch[a].key_frames()[1].image(), &picture(2));

    assert_eq!(batch.secondary_of(a), Some(b));
    assert_eq!(batch[b].cut_point(), Some(5.0));

    assert!(batch[c].is_corrupted());
    assert_eq!(
        batch[c].load_error().map(Error::kind),
        Some(ErrorKind::ExternalToolFailure)
    );

    assert!(batch[notes].is_corrupted());
    assert!(matches!(batch[notes].load_error(), Some(Error::NotVideo(_))));
}

#[test]
fn test_mirror_into_directory() {
    let _guard = SCRIPT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let fx = fixture();
    let out = fx.dir.path().join("out");
    std::fs::create_dir(&out).unwrap();

    let batch = VideoBatch::build(&fx.clips, &fx.opts, &NullEventHandler);
    let policy = OutputPolicy::from_flag(false, Some(out.clone())).unwrap();
    let outcomes = execute_cuts(&batch, &policy, &fx.opts, &NullEventHandler);

    assert_eq!(
        outcomes[0].status,
        TrimStatus::Copied {
            output: out.join("a.mp4")
        }
    );
    assert_eq!(
        outcomes[1].status,
        TrimStatus::Trimmed {
            output: out.join("b.mp4")
        }
    );
    assert!(matches!(
        &outcomes[2].status,
        TrimStatus::Corrupted(Error::Tool(FfmpegError::NonZeroExit { .. }))
    ));
    assert!(matches!(
        &outcomes[3].status,
        TrimStatus::Corrupted(Error::NotVideo(_))
    ));
    assert!(!out.join("c.mp4").exists());

    assert_eq!(
        std::fs::read_to_string(out.join("a.mp4")).unwrap(),
        "seek=\ncontents of a.mp4"
    );
    assert_eq!(
        std::fs::read_to_string(out.join("b.mp4")).unwrap(),
        "seek=5.000000\ncontents of b.mp4"
    );

    //originals untouched
    assert_eq!(
        std::fs::read_to_string(&fx.clips[1]).unwrap(),
        "contents of b.mp4"
    );
}

#[test]
fn test_overwrite_in_place() {
    let _guard = SCRIPT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let fx = fixture();

    let batch = VideoBatch::build(&fx.clips, &fx.opts, &NullEventHandler);

    let events = RefCell::new(vec![]);
    let handler = |e: &OverlapEvent| events.borrow_mut().push(e.clone());
    let outcomes = execute_cuts(&batch, &OutputPolicy::Overwrite, &fx.opts, &handler);

    assert_eq!(outcomes[0].status, TrimStatus::NoCutPoint);
    assert_eq!(
        outcomes[1].status,
        TrimStatus::Trimmed {
            output: fx.clips[1].clone()
        }
    );

    assert_eq!(
        std::fs::read_to_string(&fx.clips[0]).unwrap(),
        "contents of a.mp4"
    );
    assert_eq!(
        std::fs::read_to_string(&fx.clips[1]).unwrap(),
        "seek=5.000000\ncontents of b.mp4"
    );
    assert!(!fx.dir.path().join(".b.overlap-trim.mp4").exists());

    let started = events
        .borrow()
        .iter()
        .filter_map(|e| match e {
            OverlapEvent::TrimStarted { index, total, .. } => Some((*index, *total)),
            _ => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(started, vec![(1, 4), (2, 4)]);
}

#[test]
fn test_failures_do_not_stop_the_batch() {
    let _guard = SCRIPT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let fx = fixture();
    let d = write_clip(fx.dir.path(), "d.mp4", Some("10.000000"), &[(2.0, 3)]);
    std::fs::write(fx.dir.path().join("b.mp4.trimfail"), "").unwrap();

    let mut clips = fx.clips.clone();
    clips.push(d.clone());

    //d continues b, and b continues a.
    let batch = VideoBatch::build(&clips, &fx.opts, &NullEventHandler);
    assert_eq!(batch[batch.ids().nth(4).unwrap()].cut_point(), Some(2.0));

    let outcomes = execute_cuts(&batch, &OutputPolicy::Overwrite, &fx.opts, &NullEventHandler);

    match &outcomes[1].status {
        TrimStatus::Failed(e) => assert_eq!(e.kind(), ErrorKind::ExternalToolFailure),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(
        std::fs::read_to_string(&fx.clips[1]).unwrap(),
        "contents of b.mp4"
    );
    assert!(!fx.dir.path().join(".b.overlap-trim.mp4").exists());

    assert_eq!(
        outcomes[4].status,
        TrimStatus::Trimmed { output: d.clone() }
    );
    assert_eq!(
        std::fs::read_to_string(&d).unwrap(),
        "seek=2.000000\ncontents of d.mp4"
    );
}

#[test]
fn test_mirror_without_destination_directory() {
    let _guard = SCRIPT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let fx = fixture();

    let batch = VideoBatch::build(&fx.clips, &fx.opts, &NullEventHandler);
    let policy = OutputPolicy::MirrorInto(fx.dir.path().join("not created"));
    let outcomes = execute_cuts(&batch, &policy, &fx.opts, &NullEventHandler);

    assert!(matches!(outcomes[0].status, TrimStatus::Failed(Error::FileOp(_))));
    assert!(matches!(outcomes[1].status, TrimStatus::Failed(Error::FileOp(_))));
    assert!(matches!(outcomes[2].status, TrimStatus::Corrupted(_)));
}

#[test]
fn test_unreadable_keyframes_are_left_out() {
    let _guard = SCRIPT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let fx = fixture();
    let out = fx.dir.path().join("out");
    std::fs::create_dir(&out).unwrap();

    //two decodable keyframes, but ffprobe only reports one of them.
    let e = write_clip(fx.dir.path(), "e.mp4", Some("10.000000"), &[(0.0, 5), (4.0, 6)]);
    std::fs::write(fx.dir.path().join("e.mp4.timestamps"), "frame,0.000000\n").unwrap();

    let batch = VideoBatch::build([&fx.clips[0], &e], &fx.opts, &NullEventHandler);
    let ids = batch.ids().collect::<Vec<_>>();
    let (a_id, e_id) = (ids[0], ids[1]);

    let mismatch = Error::KeyframeCountMismatch {
        keyframe: 2,
        timestamps: 1,
    };
    assert!(!batch[e_id].is_corrupted());
    assert!(!batch[e_id].is_usable());
    assert_eq!(batch[e_id].load_error(), Some(&mismatch));
    assert_eq!(mismatch.kind(), ErrorKind::InvalidFile);
    assert_eq!(
        batch.resolutions(),
        vec![Resolution::NoCutPoint, Resolution::Corrupted]
    );

    let events = RefCell::new(vec![]);
    let handler = |event: &OverlapEvent| events.borrow_mut().push(event.clone());
    let policy = OutputPolicy::MirrorInto(out.clone());
    let outcomes = execute_cuts(&batch, &policy, &fx.opts, &handler);

    assert_eq!(
        outcomes[a_id.index()].status,
        TrimStatus::Copied {
            output: out.join("a.mp4")
        }
    );
    assert_eq!(
        outcomes[e_id.index()].status,
        TrimStatus::Corrupted(mismatch)
    );
    assert!(!out.join("e.mp4").exists());

    let started = events
        .borrow()
        .iter()
        .filter(|event| matches!(event, OverlapEvent::TrimStarted { .. }))
        .count();
    assert_eq!(started, 1);
    assert!(events.borrow().iter().any(|event| matches!(
        event,
        OverlapEvent::TrimSkipped { path, reason, .. }
            if *path == e && reason.contains("timestamp/keyframe count mismatch")
    )));
}

#[test]
fn test_trim_timeout_only_fails_that_clip() {
    let _guard = SCRIPT_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let fx = fixture();
    let d = write_clip(fx.dir.path(), "d.mp4", Some("10.000000"), &[(2.0, 3)]);
    std::fs::write(fx.dir.path().join("b.mp4.trimslow"), "").unwrap();

    let mut clips = fx.clips.clone();
    clips.push(d.clone());
    let batch = VideoBatch::build(&clips, &fx.opts, &NullEventHandler);

    let opts = OverlapOptions {
        trim_timeout_secs: 1,
        ..fx.opts.clone()
    };
    let started = Instant::now();
    let outcomes = execute_cuts(&batch, &OutputPolicy::Overwrite, &opts, &NullEventHandler);
    assert!(started.elapsed() < Duration::from_secs(8));

    match &outcomes[1].status {
        TrimStatus::Failed(e) => assert_eq!(e.kind(), ErrorKind::Timeout),
        other => panic!("expected a timeout, got {other:?}"),
    }
    assert_eq!(
        std::fs::read_to_string(&fx.clips[1]).unwrap(),
        "contents of b.mp4"
    );
    assert!(!fx.dir.path().join(".b.overlap-trim.mp4").exists());

    assert_eq!(
        outcomes[4].status,
        TrimStatus::Trimmed { output: d.clone() }
    );
    assert_eq!(
        std::fs::read_to_string(&d).unwrap(),
        "seek=2.000000\ncontents of d.mp4"
    );
}
