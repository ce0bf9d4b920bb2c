pub mod annotate;
pub mod backend;
pub mod font;
pub mod result;
pub mod worker;

pub use annotate::Renderer;
pub use backend::{InferenceBackend, StaticBackend};
pub use result::{BoundingBox, ClassNames, Detection, DetectionResult};
pub use worker::{AnnotatedSnapshot, Detector};
