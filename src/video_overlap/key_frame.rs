use image::RgbImage;

/// A single keyframe of a video: its position among the keyframes that ffmpeg
/// emitted, its presentation timestamp, and its decoded pixels.
///
/// Two keyframes are equal when their pictures are identical, pixel for pixel.
/// Timestamps and sequence numbers are ignored by the comparison.
#[derive(Debug, Clone)]
pub struct KeyFrame {
    sequence_id: u32,
    timestamp: f64,
    image: RgbImage,
}

impl KeyFrame {
    pub fn new(sequence_id: u32, timestamp: f64, image: RgbImage) -> Self {
        Self {
            sequence_id,
            timestamp,
            image,
        }
    }

    /// 1-based index of this keyframe in the extraction stream.
    pub fn sequence_id(&self) -> u32 {
        self.sequence_id
    }

    /// Presentation time in seconds.
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Exact comparison: same dimensions and every pixel identical. Frames of
    /// different sizes are never the same picture.
    pub fn same_picture(&self, other: &KeyFrame) -> bool {
        self.image.dimensions() == other.image.dimensions()
            && self.image.as_raw() == other.image.as_raw()
    }
}

impl PartialEq for KeyFrame {
    fn eq(&self, other: &Self) -> bool {
        self.same_picture(other)
    }
}
