//! Error types for the frame pipeline.
//!
//! Only setup and transport failures surface as [`Error`]. Per-frame problems
//! ([`EffectError`], [`InferenceError`]) are recovered where they happen and
//! never end a stream.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("failed to read class names from {path}: {source}")]
    ClassNames {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn detector worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    #[error("frame sink closed")]
    SinkClosed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("pixel buffer holds {actual} bytes but a {width}x{height} RGB24 frame needs {expected}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EffectError {
    #[error("colour layer is {color_width}x{color_height} but edge mask is {edge_width}x{edge_height}")]
    ShapeMismatch {
        color_width: u32,
        color_height: u32,
        edge_width: u32,
        edge_height: u32,
    },
}

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference backend `{backend}` failed: {reason}")]
    Backend {
        backend: &'static str,
        reason: String,
    },

    #[error("inference output is inconsistent: {classes} class ids, {confidences} confidences, {boxes} boxes")]
    MismatchedOutput {
        classes: usize,
        confidences: usize,
        boxes: usize,
    },

    #[error("inference backend panicked: {0}")]
    Panicked(String),
}

/// A control request rejected at the boundary. Task state is left untouched.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("unknown effect `{0}` (expected one of: none, cartoon, edges, rotate, detect)")]
    UnknownEffect(String),

    #[error("mirror must be \"true\" or \"false\", got `{0}`")]
    InvalidMirror(String),

    #[error("malformed control request: {0}")]
    Malformed(#[from] serde_json::Error),
}
