use image::{imageops, DynamicImage, RgbImage};
use imageproc::edges::canny;

use crate::EdgesConfig;

/// Canny edge map, re-expanded to three channels.
pub fn edges(image: &RgbImage, config: &EdgesConfig) -> RgbImage {
    let gray = imageops::grayscale(image);
    let edges = canny(&gray, config.low_threshold, config.high_threshold);
    DynamicImage::ImageLuma8(edges).to_rgb8()
}
