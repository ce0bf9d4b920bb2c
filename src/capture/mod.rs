pub mod frame;
pub mod pattern;

pub use frame::{Frame, FrameTiming, TimeBase};
pub use pattern::TestPattern;
