use std::time::Instant;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::FrameError;

/// Rational time base of a presentation timestamp, in seconds per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeBase {
    pub num: i32,
    pub den: i32,
}

impl TimeBase {
    /// 90 kHz RTP video clock.
    pub const VIDEO_90KHZ: TimeBase = TimeBase::new(1, 90_000);

    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    pub fn seconds(&self, ticks: i64) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        ticks as f64 * self.num as f64 / self.den as f64
    }
}

/// Opaque timing carried verbatim from an input frame to its output frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameTiming {
    pub pts: Option<i64>,
    pub time_base: TimeBase,
}

impl FrameTiming {
    pub const fn new(pts: i64, time_base: TimeBase) -> Self {
        Self {
            pts: Some(pts),
            time_base,
        }
    }

    /// Presentation time in seconds since the stream origin.
    pub fn elapsed_secs(&self) -> f64 {
        self.pts
            .map(|pts| self.time_base.seconds(pts))
            .unwrap_or_default()
    }
}

impl Default for FrameTiming {
    fn default() -> Self {
        Self {
            pts: None,
            time_base: TimeBase::VIDEO_90KHZ,
        }
    }
}

/// Owned RGB24 pixel buffer plus the timing it was presented with
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbImage,
    pub timing: FrameTiming,
    pub sequence: u64,

    /// Arrival timestamp for latency tracking
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(image: RgbImage, timing: FrameTiming) -> Self {
        Self {
            image,
            timing,
            sequence: 0,
            captured_at: Instant::now(),
        }
    }

    /// Wrap a tightly packed RGB24 buffer.
    pub fn from_raw(
        width: u32,
        height: u32,
        data: Vec<u8>,
        timing: FrameTiming,
    ) -> Result<Self, FrameError> {
        let expected = width as usize * height as usize * 3;
        let actual = data.len();
        let image = RgbImage::from_raw(width, height, data).ok_or(FrameError::BufferSize {
            width,
            height,
            expected,
            actual,
        })?;
        Ok(Self::new(image, timing))
    }

    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Build an output frame from transformed pixels. Timing, sequence and
    /// arrival instant are copied from `self` unchanged.
    pub fn with_image(&self, image: RgbImage) -> Frame {
        Frame {
            image,
            timing: self.timing,
            sequence: self.sequence,
            captured_at: self.captured_at,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }
}
