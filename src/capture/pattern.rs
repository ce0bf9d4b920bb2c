//! Synthetic capture source producing a moving test pattern

use std::time::Duration;

use flume::Sender;
use image::{Rgb, RgbImage};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, instrument};

use crate::capture::frame::{Frame, FrameTiming, TimeBase};
use crate::SourceConfig;

/// Gradient test pattern with a bright bar sweeping left to right
pub struct TestPattern {
    config: SourceConfig,
    sequence: u64,
}

impl TestPattern {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            sequence: 0,
        }
    }

    fn ticks_per_frame(&self) -> i64 {
        let fps = self.config.fps.max(1) as i64;
        TimeBase::VIDEO_90KHZ.den as i64 / fps
    }

    /// Render the next frame and advance the sequence.
    pub fn next_frame(&mut self) -> Frame {
        let width = self.config.width.max(1);
        let height = self.config.height.max(1);
        let sequence = self.sequence;
        self.sequence += 1;

        let bar_width = (width / 16).max(1);
        let bar_x = (sequence as u32 * 4) % width;
        let image = RgbImage::from_fn(width, height, |x, y| {
            if x >= bar_x && x < bar_x + bar_width {
                return Rgb([255, 255, 255]);
            }
            let r = (x * 255 / width) as u8;
            let g = (y * 255 / height) as u8;
            let b = (sequence % 256) as u8;
            Rgb([r, g, b])
        });

        let timing = FrameTiming::new(sequence as i64 * self.ticks_per_frame(), TimeBase::VIDEO_90KHZ);
        Frame::new(image, timing).with_sequence(sequence)
    }

    /// Push frames at the configured rate until the frame limit is reached
    /// or the receiving side goes away.
    #[instrument(skip_all, fields(width = self.config.width, height = self.config.height, fps = self.config.fps))]
    pub async fn run(mut self, tx: Sender<Frame>) {
        let period = Duration::from_secs_f64(1.0 / self.config.fps.max(1) as f64);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!("Test pattern started");
        loop {
            if let Some(limit) = self.config.frame_limit {
                if self.sequence >= limit {
                    info!("Frame limit of {} reached", limit);
                    break;
                }
            }

            ticker.tick().await;
            let frame = self.next_frame();
            if tx.send_async(frame).await.is_err() {
                info!("Frame receiver dropped, stopping test pattern");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_advance_on_the_video_clock() {
        let mut pattern = TestPattern::new(SourceConfig {
            width: 64,
            height: 48,
            fps: 30,
            frame_limit: None,
        });

        let first = pattern.next_frame();
        let second = pattern.next_frame();
        assert_eq!((first.width(), first.height()), (64, 48));
        assert_eq!(first.timing.pts, Some(0));
        assert_eq!(second.timing.pts, Some(3_000));
        assert_eq!(second.sequence, 1);
        assert_eq!(second.timing.time_base, TimeBase::VIDEO_90KHZ);
    }

    #[tokio::test]
    async fn run_stops_at_frame_limit() {
        let pattern = TestPattern::new(SourceConfig {
            width: 8,
            height: 8,
            fps: 1_000,
            frame_limit: Some(3),
        });
        let (tx, rx) = flume::unbounded();
        pattern.run(tx).await;
        assert_eq!(rx.drain().count(), 3);
    }
}
