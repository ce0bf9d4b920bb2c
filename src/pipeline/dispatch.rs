//! Routes each frame to the effect selected in the shared task state.

use image::RgbImage;

use crate::capture::Frame;
use crate::detect::Detector;
use crate::{effects, EffectsConfig};
use crate::pipeline::state::{Effect, TaskReader};
use crate::utils::timed;

/// Per-stream frame transformer. Owns the stream's detector and reads the
/// shared mode once per frame.
pub struct EffectDispatcher {
    tasks: TaskReader,
    config: EffectsConfig,
    detector: Detector,
}

impl EffectDispatcher {
    pub fn new(tasks: TaskReader, config: EffectsConfig, detector: Detector) -> Self {
        Self {
            tasks,
            config,
            detector,
        }
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    /// Transform one frame. Always returns a frame carrying the input's
    /// timing; failures inside an effect degrade that frame only.
    pub fn process(&self, frame: Frame) -> Frame {
        let task = self.tasks.current();
        metrics::counter!("frames_processed_total", "effect" => task.effect.as_str()).increment(1);

        let mut image = timed(task.effect.as_str(), || self.apply(task.effect, &frame));
        if task.mirror {
            effects::mirror(&mut image);
        }
        frame.with_image(image)
    }

    fn apply(&self, effect: Effect, frame: &Frame) -> RgbImage {
        match effect {
            Effect::None => frame.image.clone(),
            Effect::Cartoon => effects::cartoonize(&frame.image, &self.config.cartoon),
            Effect::Edges => effects::edges(&frame.image, &self.config.edges),
            Effect::Rotate => {
                let degrees = effects::rotation_degrees(&frame.timing, &self.config.rotate);
                effects::rotate(&frame.image, degrees)
            }
            Effect::Detect => {
                self.detector
                    .submit_and_get_annotated(frame.clone())
                    .image
            }
        }
    }
}
