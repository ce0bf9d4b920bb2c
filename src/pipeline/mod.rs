pub mod dispatch;
pub mod driver;
pub mod state;

pub use dispatch::EffectDispatcher;
pub use driver::{FramePipeline, FrameSink, FrameSource, StreamStats};
pub use state::{Effect, TaskReader, TaskSnapshot, TaskState};
