//! Per-stream frame loop: pull from a source, transform, push to a sink.

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, info, info_span, Instrument};

use crate::capture::Frame;
use crate::error::{Error, Result};
use crate::pipeline::dispatch::EffectDispatcher;

/// Producer of decoded frames in presentation order.
pub trait FrameSource: Send {
    /// Next frame, or `None` once the stream has ended.
    fn next_frame(&mut self) -> impl Future<Output = Option<Frame>> + Send;
}

/// Consumer of transformed frames.
pub trait FrameSink: Send {
    fn emit(&mut self, frame: Frame) -> impl Future<Output = Result<()>> + Send;
}

impl FrameSource for flume::Receiver<Frame> {
    async fn next_frame(&mut self) -> Option<Frame> {
        self.recv_async().await.ok()
    }
}

impl FrameSink for flume::Sender<Frame> {
    async fn emit(&mut self, frame: Frame) -> Result<()> {
        self.send_async(frame).await.map_err(|_| Error::SinkClosed)
    }
}

/// Counters for one finished stream.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StreamStats {
    pub frames: u64,
    pub elapsed: Duration,
    pub total_processing: Duration,
}

impl StreamStats {
    pub fn mean_processing(&self) -> Duration {
        if self.frames == 0 {
            Duration::ZERO
        } else {
            self.total_processing / self.frames as u32
        }
    }
}

/// Drives one stream through an [`EffectDispatcher`]. Frames leave in the
/// order they arrived, one output per input.
pub struct FramePipeline {
    dispatcher: EffectDispatcher,
}

impl FramePipeline {
    pub fn new(dispatcher: EffectDispatcher) -> Self {
        Self { dispatcher }
    }

    /// Run until the source ends. A closed sink stops the stream with
    /// [`Error::SinkClosed`].
    pub async fn run<S, K>(self, mut source: S, mut sink: K) -> Result<StreamStats>
    where
        S: FrameSource,
        K: FrameSink,
    {
        let span = info_span!("stream", detector = self.dispatcher.detector().id());
        async move {
            info!("Stream started");
            let started = Instant::now();
            let mut stats = StreamStats::default();

            while let Some(frame) = source.next_frame().await {
                let sequence = frame.sequence;
                let begin = Instant::now();
                // Effects run inline on this task: the cycle is synchronous and
                // the next frame is not pulled until this one is emitted.
                let out = self.dispatcher.process(frame);
                let took = begin.elapsed();

                metrics::histogram!("frame_processing_us").record(took.as_micros() as f64);
                stats.frames += 1;
                stats.total_processing += took;
                debug!(sequence, took_us = took.as_micros() as u64, "Frame processed");

                sink.emit(out).await?;
            }

            stats.elapsed = started.elapsed();
            info!(
                frames = stats.frames,
                mean_ms = stats.mean_processing().as_secs_f64() * 1_000.0,
                "Stream ended"
            );
            Ok(stats)
        }
        .instrument(span)
        .await
    }
}
