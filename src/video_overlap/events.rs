use std::path::PathBuf;

use log::{debug, error, info, warn};
use serde::Serialize;

/// Things that happen while a batch is loaded, resolved and trimmed.
///
/// Components never print. They hand events to an [`EventHandler`] supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum OverlapEvent {
    // Loading
    VideoLoadStarted {
        index: usize,
        total: usize,
        path: PathBuf,
    },
    VideoCorrupted {
        path: PathBuf,
        reason: String,
    },
    KeyframesExtracted {
        path: PathBuf,
        keyframes: usize,
        corrupted_keyframes: u32,
        skipped_bytes: u64,
    },
    KeyframeExtractionFailed {
        path: PathBuf,
        reason: String,
    },

    // Resolution
    ResolutionStarted {
        videos: usize,
    },
    OverlapTie {
        lead: PathBuf,
        kept: PathBuf,
        ignored: PathBuf,
        timestamp: f64,
    },
    StaleCutPointCleared {
        lead: PathBuf,
        secondary: PathBuf,
    },
    CutPointUpdated {
        lead: PathBuf,
        secondary: PathBuf,
        cut_point: Option<f64>,
    },
    NoCutPointFound {
        path: PathBuf,
    },

    // Trimming
    TrimStarted {
        index: usize,
        total: usize,
        path: PathBuf,
    },
    TrimSkipped {
        index: usize,
        path: PathBuf,
        reason: String,
    },
    TrimSucceeded {
        index: usize,
        path: PathBuf,
        output: PathBuf,
    },
    TrimFailed {
        index: usize,
        path: PathBuf,
        error: String,
    },
}

pub trait EventHandler {
    fn handle(&self, event: &OverlapEvent);
}

impl<F> EventHandler for F
where
    F: Fn(&OverlapEvent),
{
    fn handle(&self, event: &OverlapEvent) {
        self(event)
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventHandler;

impl EventHandler for NullEventHandler {
    fn handle(&self, _event: &OverlapEvent) {}
}

/// Forwards events to the `log` crate. Each stage logs under its own target
/// (`keyframe_extraction`, `overlap_resolution`, `trim`) so that stages can be filtered.
/// Stream noise statistics go to `keyframe_extraction_stats`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventHandler;

impl EventHandler for LogEventHandler {
    fn handle(&self, event: &OverlapEvent) {
        use OverlapEvent::*;

        match event {
            VideoLoadStarted { index, total, path } => info!(target: "keyframe_extraction",
                "Reading video {index} of {total}: {}", path.display()
            ),
            VideoCorrupted { path, reason } => warn!(target: "keyframe_extraction",
                "{} is corrupted and will not be matched or cut: {reason}", path.display()
            ),
            KeyframesExtracted {
                path,
                keyframes,
                corrupted_keyframes,
                skipped_bytes,
            } => {
                info!(target: "keyframe_extraction",
                    "{}: {keyframes} keyframes", path.display()
                );
                if *corrupted_keyframes > 0 || *skipped_bytes > 0 {
                    debug!(target: "keyframe_extraction_stats",
                        "{}: {corrupted_keyframes} corrupted keyframes, {skipped_bytes} bytes of noise skipped",
                        path.display()
                    );
                }
            }
            KeyframeExtractionFailed { path, reason } => warn!(target: "keyframe_extraction",
                "Failed to read keyframes of {}: {reason}", path.display()
            ),

            ResolutionStarted { videos } => info!(target: "overlap_resolution",
                "Finding cut points between {videos} videos..."
            ),
            OverlapTie {
                lead,
                kept,
                ignored,
                timestamp,
            } => warn!(target: "overlap_resolution",
                "{} overlaps {} and {} at the same time ({timestamp}s). Keeping {}",
                lead.display(), kept.display(), ignored.display(), kept.display()
            ),
            StaleCutPointCleared { lead, secondary } => debug!(target: "overlap_resolution",
                "Cleared cut point of {} previously claimed by {}",
                secondary.display(), lead.display()
            ),
            CutPointUpdated {
                lead,
                secondary,
                cut_point,
            } => match cut_point {
                Some(cut_point) => info!(target: "overlap_resolution",
                    "Cut point updated: {} continues {} and will be cut at {cut_point}s",
                    secondary.display(), lead.display()
                ),
                None => warn!(target: "overlap_resolution",
                    "{} continues {} but no cut point could be computed",
                    secondary.display(), lead.display()
                ),
            },
            NoCutPointFound { path } => info!(target: "overlap_resolution",
                "No cut point found for {}", path.display()
            ),

            TrimStarted { index, total, path } => info!(target: "trim",
                "Attempting to cut video {index} out of {total}: {}", path.display()
            ),
            TrimSkipped {
                index,
                path,
                reason,
            } => info!(target: "trim",
                "Video {index} ({}) skipped: {reason}", path.display()
            ),
            TrimSucceeded {
                index,
                path,
                output,
            } => info!(target: "trim",
                "Successfully cut video {index}: {} -> {}", path.display(), output.display()
            ),
            TrimFailed { index, path, error } => error!(target: "trim",
                "Error cutting video {index} ({}): {error}", path.display()
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use std::cell::RefCell;

    use super::*;

    #[test]
    fn test_closure_handler() {
        let seen = RefCell::new(vec![]);
        let handler = |e: &OverlapEvent| seen.borrow_mut().push(e.clone());

        let events: &dyn EventHandler = &handler;
        events.handle(&OverlapEvent::ResolutionStarted { videos: 3 });
        events.handle(&OverlapEvent::NoCutPointFound {
            path: PathBuf::from("a.mp4"),
        });

        assert_eq!(
            seen.into_inner(),
            vec![
                OverlapEvent::ResolutionStarted { videos: 3 },
                OverlapEvent::NoCutPointFound {
                    path: PathBuf::from("a.mp4")
                },
            ]
        );
    }

    #[test]
    fn test_events_serialize() {
        let event = OverlapEvent::CutPointUpdated {
            lead: PathBuf::from("front.mp4"),
            secondary: PathBuf::from("rear.mp4"),
            cut_point: Some(2.5),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"CutPointUpdated":{"lead":"front.mp4","secondary":"rear.mp4","cut_point":2.5}}"#
        );
    }
}
