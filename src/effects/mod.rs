//! Per-frame image transforms.
//!
//! Every transform takes the RGB pixels of one frame and returns pixels of the
//! same dimensions. Timing is handled by the dispatcher, not here.

pub mod cartoon;
pub mod edges;
pub mod rotate;

use image::{imageops, RgbImage};

pub use cartoon::cartoonize;
pub use edges::edges;
pub use rotate::{rotate, rotation_degrees};

/// Horizontal flip for selfie view.
pub fn mirror(image: &mut RgbImage) {
    imageops::flip_horizontal_in_place(image);
}
