use serde::{Deserialize, Serialize};

use crate::video_overlap::key_frame::KeyFrame;
use crate::video_overlap::video::Video;

/// How two videos relate through their first shared keyframe.
///
/// Timestamps are in seconds, each in its own video's timeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OverlapMatch {
    /// The videos share no keyframe.
    NoMatch,

    /// The shared keyframe is later in the lead candidate than in the other video, so the
    /// lead candidate started recording first and the other video continues it.
    Forward {
        lead_timestamp: f64,
        other_timestamp: f64,
    },

    /// The shared keyframe is earlier in the lead candidate: the other video started first.
    Reverse {
        lead_timestamp: f64,
        other_timestamp: f64,
    },

    /// The shared keyframe sits at the same time in both videos. Neither leads.
    Aligned { timestamp: f64 },
}

impl OverlapMatch {
    /// Where the overlap lies in the lead candidate's timeline, if the lead candidate really leads.
    pub fn forward_overlap(&self) -> Option<f64> {
        match self {
            Self::Forward { lead_timestamp, .. } => Some(*lead_timestamp),
            _ => None,
        }
    }
}

/// The first pair of identical keyframes, scanning `other` in order and, for each of
/// its keyframes, scanning `lead` in order.
fn first_shared_keyframe<'a>(
    lead: &'a Video,
    other: &'a Video,
) -> Option<(&'a KeyFrame, &'a KeyFrame)> {
    other.key_frames().iter().find_map(|other_kf| {
        lead.key_frames()
            .iter()
            .find(|lead_kf| lead_kf.same_picture(other_kf))
            .map(|lead_kf| (lead_kf, other_kf))
    })
}

/// Decide whether `lead` is the video that `other` continues.
pub fn find_overlap(lead: &Video, other: &Video) -> OverlapMatch {
    let Some((lead_kf, other_kf)) = first_shared_keyframe(lead, other) else {
        return OverlapMatch::NoMatch;
    };

    let lead_timestamp = lead_kf.timestamp();
    let other_timestamp = other_kf.timestamp();

    match lead_timestamp.total_cmp(&other_timestamp) {
        std::cmp::Ordering::Greater => OverlapMatch::Forward {
            lead_timestamp,
            other_timestamp,
        },
        std::cmp::Ordering::Less => OverlapMatch::Reverse {
            lead_timestamp,
            other_timestamp,
        },
        std::cmp::Ordering::Equal => OverlapMatch::Aligned {
            timestamp: lead_timestamp,
        },
    }
}

/// How many seconds at the start of `secondary` repeat the end of `lead`.
///
/// This is the remaining duration of `lead` after the first shared keyframe, clamped
/// at zero. `None` if the videos share no keyframe or the duration of `lead` is unknown.
pub fn find_cut_point(lead: &Video, secondary: &Video) -> Option<f64> {
    let (lead_kf, _) = first_shared_keyframe(lead, secondary)?;
    let duration = lead.duration()?;

    Some((duration - lead_kf.timestamp()).max(0.0))
}
