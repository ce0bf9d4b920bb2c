use std::thread;
use std::time::Duration;

use crate::capture::Frame;
use crate::detect::result::{Detection, DetectionResult};
use crate::error::InferenceError;
use crate::DetectorConfig;

/// Object-detection model driven by a detector worker.
///
/// Called from the worker thread only, one frame at a time. Implementations
/// may block for as long as inference takes.
pub trait InferenceBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame, keeping candidates scoring at least
    /// `confidence_threshold` and suppressing overlaps above
    /// `suppression_threshold`.
    fn infer(
        &mut self,
        frame: &Frame,
        confidence_threshold: f32,
        suppression_threshold: f32,
    ) -> Result<DetectionResult, InferenceError>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<(), InferenceError> {
        Ok(())
    }
}

impl<F> InferenceBackend for F
where
    F: FnMut(&Frame, f32, f32) -> Result<DetectionResult, InferenceError> + Send,
{
    fn name(&self) -> &'static str {
        "closure"
    }

    fn infer(
        &mut self,
        frame: &Frame,
        confidence_threshold: f32,
        suppression_threshold: f32,
    ) -> Result<DetectionResult, InferenceError> {
        self(frame, confidence_threshold, suppression_threshold)
    }
}

/// Reports a fixed set of detections after a fixed delay. Stands in for a
/// neural network in the bundled binary.
#[derive(Debug, Clone)]
pub struct StaticBackend {
    detections: Vec<Detection>,
    latency: Duration,
}

impl StaticBackend {
    pub fn new(detections: Vec<Detection>, latency: Duration) -> Self {
        Self {
            detections,
            latency,
        }
    }

    pub fn from_config(config: &DetectorConfig) -> Self {
        Self::new(
            config.static_detections.clone(),
            Duration::from_millis(config.static_latency_ms),
        )
    }
}

impl InferenceBackend for StaticBackend {
    fn name(&self) -> &'static str {
        "static"
    }

    fn infer(
        &mut self,
        _frame: &Frame,
        confidence_threshold: f32,
        _suppression_threshold: f32,
    ) -> Result<DetectionResult, InferenceError> {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        let kept = self
            .detections
            .iter()
            .filter(|d| d.confidence >= confidence_threshold)
            .copied()
            .collect();
        Ok(DetectionResult::new(kept))
    }
}
