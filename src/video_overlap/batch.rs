use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::video_overlap::events::{EventHandler, OverlapEvent};
use crate::video_overlap::matcher::{find_cut_point, find_overlap};
use crate::video_overlap::video::Video;
use crate::OverlapOptions;

/// Position of a video within its [`VideoBatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VideoId(usize);

impl VideoId {
    /// 0-based position in the batch.
    pub fn index(self) -> usize {
        self.0
    }
}

/// What the resolver decided for one video, seen as a lead candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Resolution {
    /// Left out of matching, see [`Video::is_usable`].
    Corrupted,

    /// No other video continues this one.
    NoCutPoint,

    /// `secondary` continues this video, and should be cut at `cut_point`.
    Lead {
        secondary: VideoId,
        cut_point: Option<f64>,
    },
}

/// An ordered collection of videos, and which video continues which.
///
/// Associations are kept by index: each lead maps to at most one secondary, and
/// each secondary is claimed by at most one lead.
#[derive(Debug, Clone, Default)]
pub struct VideoBatch {
    videos: Vec<Video>,
    secondaries: HashMap<VideoId, VideoId>,
}

impl VideoBatch {
    pub fn from_videos(videos: impl IntoIterator<Item = Video>) -> Self {
        Self {
            videos: videos.into_iter().collect(),
            secondaries: HashMap::new(),
        }
    }

    /// Load every video in order. Videos that fail to load stay in the batch, marked as such.
    pub fn load<P: AsRef<Path>>(
        paths: impl IntoIterator<Item = P>,
        opts: &OverlapOptions,
        events: &dyn EventHandler,
    ) -> Self {
        let paths = paths.into_iter().collect::<Vec<_>>();
        let total = paths.len();

        let videos = paths.iter().enumerate().map(|(i, path)| {
            events.handle(&OverlapEvent::VideoLoadStarted {
                index: i + 1,
                total,
                path: path.as_ref().to_path_buf(),
            });
            Video::load(path, opts, events)
        });

        Self::from_videos(videos)
    }

    /// Load every video in order and work out which video continues which.
    pub fn build<P: AsRef<Path>>(
        paths: impl IntoIterator<Item = P>,
        opts: &OverlapOptions,
        events: &dyn EventHandler,
    ) -> Self {
        let mut batch = Self::load(paths, opts, events);
        batch.resolve_overlaps(events);
        batch
    }

    /// For each [usable](Video::is_usable) video, find the video which continues it
    /// soonest, and record the cut point of that video. Any previous associations are
    /// discarded first.
    ///
    /// When two videos overlap a lead at exactly the same point, the one earlier in the
    /// batch is kept.
    pub fn resolve_overlaps(&mut self, events: &dyn EventHandler) -> Vec<Resolution> {
        events.handle(&OverlapEvent::ResolutionStarted {
            videos: self.videos.len(),
        });

        self.secondaries.clear();
        for video in &mut self.videos {
            video.set_cut_point(None);
        }

        for lead in self.ids() {
            if !self[lead].is_usable() {
                continue;
            }

            let mut earliest = f64::INFINITY;
            let mut chosen: Option<VideoId> = None;

            for other in self.ids().filter(|&other| other != lead) {
                if !self[other].is_usable() {
                    continue;
                }

                let Some(overlap) = find_overlap(&self[lead], &self[other]).forward_overlap() else {
                    continue;
                };

                if overlap < earliest {
                    earliest = overlap;
                    chosen = Some(other);
                } else if overlap == earliest {
                    if let Some(kept) = chosen {
                        events.handle(&OverlapEvent::OverlapTie {
                            lead: self[lead].file_path().to_path_buf(),
                            kept: self[kept].file_path().to_path_buf(),
                            ignored: self[other].file_path().to_path_buf(),
                            timestamp: overlap,
                        });
                    }
                }
            }

            match chosen {
                Some(secondary) => {
                    self.update_secondary(lead, secondary, events);
                }
                None => events.handle(&OverlapEvent::NoCutPointFound {
                    path: self[lead].file_path().to_path_buf(),
                }),
            }
        }

        self.resolutions()
    }

    /// Make `new_secondary` the video that continues `lead`, and compute its cut point.
    ///
    /// The cut point of the previous secondary of `lead` is cleared, and so is any
    /// claim another lead had on `new_secondary`. A video cannot continue itself, so
    /// `lead == new_secondary` changes nothing.
    pub fn update_secondary(
        &mut self,
        lead: VideoId,
        new_secondary: VideoId,
        events: &dyn EventHandler,
    ) -> Option<f64> {
        if lead == new_secondary {
            return None;
        }

        if let Some(old) = self.secondaries.remove(&lead) {
            self.videos[old.0].set_cut_point(None);
            events.handle(&OverlapEvent::StaleCutPointCleared {
                lead: self[lead].file_path().to_path_buf(),
                secondary: self[old].file_path().to_path_buf(),
            });
        }

        if let Some(previous_lead) = self.lead_of(new_secondary) {
            self.secondaries.remove(&previous_lead);
            events.handle(&OverlapEvent::StaleCutPointCleared {
                lead: self[previous_lead].file_path().to_path_buf(),
                secondary: self[new_secondary].file_path().to_path_buf(),
            });
        }

        let cut_point = find_cut_point(&self[lead], &self[new_secondary]);
        self.secondaries.insert(lead, new_secondary);
        self.videos[new_secondary.0].set_cut_point(cut_point);

        events.handle(&OverlapEvent::CutPointUpdated {
            lead: self[lead].file_path().to_path_buf(),
            secondary: self[new_secondary].file_path().to_path_buf(),
            cut_point,
        });

        cut_point
    }

    /// The current decision for every video, in batch order.
    pub fn resolutions(&self) -> Vec<Resolution> {
        self.ids()
            .map(|id| {
                if !self[id].is_usable() {
                    return Resolution::Corrupted;
                }
                match self.secondary_of(id) {
                    Some(secondary) => Resolution::Lead {
                        secondary,
                        cut_point: self[secondary].cut_point(),
                    },
                    None => Resolution::NoCutPoint,
                }
            })
            .collect()
    }

    /// The video which continues `lead`, if any.
    pub fn secondary_of(&self, lead: VideoId) -> Option<VideoId> {
        self.secondaries.get(&lead).copied()
    }

    /// The video which `secondary` continues, if any.
    pub fn lead_of(&self, secondary: VideoId) -> Option<VideoId> {
        self.secondaries
            .iter()
            .find(|(_lead, s)| **s == secondary)
            .map(|(lead, _s)| *lead)
    }

    pub fn get(&self, id: VideoId) -> Option<&Video> {
        self.videos.get(id.0)
    }

    pub fn ids(&self) -> impl Iterator<Item = VideoId> {
        (0..self.videos.len()).map(VideoId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (VideoId, &Video)> {
        self.videos.iter().enumerate().map(|(i, v)| (VideoId(i), v))
    }

    pub fn videos(&self) -> &[Video] {
        &self.videos
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }
}

impl std::ops::Index<VideoId> for VideoBatch {
    type Output = Video;

    fn index(&self, id: VideoId) -> &Video {
        &self.videos[id.0]
    }
}
