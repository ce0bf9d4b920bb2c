use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};

use crate::capture::FrameTiming;
use crate::RotateConfig;

/// Rotation angle in degrees, counter-clockwise, for a frame presented at
/// `timing`.
pub fn rotation_degrees(timing: &FrameTiming, config: &RotateConfig) -> f32 {
    (timing.elapsed_secs() * config.degrees_per_second as f64) as f32
}

/// Rotate about the frame centre. Output keeps the input size; corners that
/// leave the frame are clipped and uncovered areas are black.
pub fn rotate(image: &RgbImage, degrees: f32) -> RgbImage {
    // imageproc rotates clockwise for positive angles
    let theta = -degrees.to_radians();
    rotate_about_center(image, theta, Interpolation::Bilinear, Rgb([0, 0, 0]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::TimeBase;

    #[test]
    fn angle_grows_with_presentation_time() {
        let config = RotateConfig::default();
        let at_two_seconds = FrameTiming::new(180_000, TimeBase::VIDEO_90KHZ);
        assert!((rotation_degrees(&at_two_seconds, &config) - 90.0).abs() < 1e-4);

        let untimed = FrameTiming::default();
        assert_eq!(rotation_degrees(&untimed, &config), 0.0);
    }

    #[test]
    fn keeps_dimensions() {
        let image = RgbImage::from_pixel(40, 20, Rgb([10, 20, 30]));
        let out = rotate(&image, 90.0);
        assert_eq!(out.dimensions(), (40, 20));
    }

    #[test]
    fn quarter_turn_is_counter_clockwise() {
        // Bright block in the right half of a square frame.
        let image = RgbImage::from_fn(21, 21, |x, y| {
            if (14..=20).contains(&x) && (8..=12).contains(&y) {
                Rgb([255, 255, 255])
            } else {
                Rgb([0, 0, 0])
            }
        });
        let out = rotate(&image, 90.0);
        // Counter-clockwise moves the right side to the top.
        assert!(out.get_pixel(10, 3)[0] > 200);
        assert!(out.get_pixel(10, 17)[0] < 50);
    }
}
