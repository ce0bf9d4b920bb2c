pub mod capture;
pub mod control;
pub mod detect;
pub mod effects;
pub mod error;
pub mod pipeline;
pub mod utils;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use capture::{Frame, FrameTiming, TimeBase};
pub use error::{Error, Result};
pub use pipeline::{Effect, TaskReader, TaskSnapshot, TaskState};

use crate::detect::Detection;

/// Environment variable prefix for configuration overrides,
/// e.g. `LENSFX__DETECTOR__CONFIDENCE_THRESHOLD=0.25`.
pub const ENV_PREFIX: &str = "LENSFX";

/// System configuration
///
/// Loaded once at startup and handed down to the components that need it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub pipeline: PipelineConfig,
    pub control: ControlConfig,
    pub effects: EffectsConfig,
    pub detector: DetectorConfig,
    pub logging: LoggingConfig,
}

/// Synthetic test-pattern source used by the bundled binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub frame_limit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Capacity of the source and sink frame channels.
    pub channel_capacity: usize,
    /// Log throughput every N emitted frames.
    pub report_every: u64,
}

/// Mode selection applied before the first control request arrives.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub effect: Effect,
    pub mirror: bool,
}

impl ControlConfig {
    pub fn initial(&self) -> TaskSnapshot {
        TaskSnapshot {
            effect: self.effect,
            mirror: self.mirror,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsConfig {
    pub cartoon: CartoonConfig,
    pub edges: EdgesConfig,
    pub rotate: RotateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CartoonConfig {
    /// Number of halvings before smoothing (and doublings after).
    pub pyramid_levels: u32,
    pub smoothing_passes: u32,
    pub bilateral_diameter: u32,
    pub sigma_color: f32,
    pub sigma_space: f32,
    pub median_radius: u32,
    /// Side of the square neighbourhood used for the mean threshold.
    pub threshold_block: u32,
    pub threshold_offset: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgesConfig {
    pub low_threshold: f32,
    pub high_threshold: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RotateConfig {
    pub degrees_per_second: f32,
}

/// What the detector serves while an inference job is in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaleFramePolicy {
    /// Re-annotate the frame captured when the job started.
    #[default]
    Frozen,
    /// Annotate the newly arrived frame with the latest result.
    Freshest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub confidence_threshold: f32,
    pub suppression_threshold: f32,
    /// Newline-separated label file; the built-in COCO table when unset.
    pub class_names: Option<PathBuf>,
    pub stale_frames: StaleFramePolicy,
    /// Warn once per job that stays in flight longer than this.
    pub stall_warning_ms: Option<u64>,
    pub label_scale: u32,
    /// Simulated inference latency of the bundled static backend.
    pub static_latency_ms: u64,
    /// Detections reported by the bundled static backend.
    pub static_detections: Vec<Detection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30,
            frame_limit: None,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 8,
            report_every: 150,
        }
    }
}

impl Default for CartoonConfig {
    fn default() -> Self {
        Self {
            pyramid_levels: 2,
            smoothing_passes: 6,
            bilateral_diameter: 9,
            sigma_color: 9.0,
            sigma_space: 7.0,
            median_radius: 3,
            threshold_block: 9,
            threshold_offset: 2,
        }
    }
}

impl Default for EdgesConfig {
    fn default() -> Self {
        Self {
            low_threshold: 100.0,
            high_threshold: 200.0,
        }
    }
}

impl Default for RotateConfig {
    fn default() -> Self {
        Self {
            degrees_per_second: 45.0,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.1,
            suppression_threshold: 0.4,
            class_names: None,
            stale_frames: StaleFramePolicy::Frozen,
            stall_warning_ms: Some(5_000),
            label_scale: 2,
            static_latency_ms: 250,
            static_detections: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "lensfx=info".into(),
        }
    }
}

impl Config {
    /// Built-in defaults, overlaid with an optional TOML file, overlaid with
    /// `LENSFX__*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }
}
