//! Cartoon redraw: flattened colours under a dark outline mask.
//!
//! The colour layer is smoothed at reduced resolution with repeated
//! bilateral passes, then scaled back up. The outline mask is a mean adaptive
//! threshold over a median-blurred grayscale copy. The two are combined with
//! a channel-wise AND.

use image::{imageops, DynamicImage, GrayImage, Luma, RgbImage};
use image::imageops::FilterType;
use imageproc::filter::median_filter;
use tracing::debug;

use crate::error::EffectError;
use crate::CartoonConfig;

pub fn cartoonize(image: &RgbImage, config: &CartoonConfig) -> RgbImage {
    let color = smooth_colors(image, config);
    let mask = outline_mask(image, config);

    match combine(&color, &mask) {
        Ok(combined) => combined,
        Err(err) => {
            debug!("cartoon combine skipped: {err}");
            if color.dimensions() == image.dimensions() {
                color
            } else {
                imageops::resize(&color, image.width(), image.height(), FilterType::Triangle)
            }
        }
    }
}

/// Pyramid down, bilateral passes, pyramid up. The result can differ from
/// the input size by a few pixels when a dimension is not divisible by
/// `2^pyramid_levels`.
pub fn smooth_colors(image: &RgbImage, config: &CartoonConfig) -> RgbImage {
    let mut color = image.clone();
    for _ in 0..config.pyramid_levels {
        color = pyramid_down(&color);
    }
    for _ in 0..config.smoothing_passes {
        color = bilateral_filter(
            &color,
            config.bilateral_diameter,
            config.sigma_color,
            config.sigma_space,
        );
    }
    for _ in 0..config.pyramid_levels {
        color = pyramid_up(&color);
    }
    color
}

/// White where the pixel is brighter than its neighbourhood, black on edges.
pub fn outline_mask(image: &RgbImage, config: &CartoonConfig) -> RgbImage {
    let gray = imageops::grayscale(image);
    let blurred = median_filter(&gray, config.median_radius, config.median_radius);
    let mask = mean_adaptive_threshold(&blurred, config.threshold_block, config.threshold_offset);
    DynamicImage::ImageLuma8(mask).to_rgb8()
}

pub fn combine(color: &RgbImage, mask: &RgbImage) -> Result<RgbImage, EffectError> {
    if color.dimensions() != mask.dimensions() {
        return Err(EffectError::ShapeMismatch {
            color_width: color.width(),
            color_height: color.height(),
            edge_width: mask.width(),
            edge_height: mask.height(),
        });
    }

    let mut out = color.clone();
    for (dst, m) in out.pixels_mut().zip(mask.pixels()) {
        for c in 0..3 {
            dst[c] &= m[c];
        }
    }
    Ok(out)
}

fn pyramid_down(image: &RgbImage) -> RgbImage {
    let width = image.width().div_ceil(2).max(1);
    let height = image.height().div_ceil(2).max(1);
    imageops::resize(image, width, height, FilterType::Triangle)
}

fn pyramid_up(image: &RgbImage) -> RgbImage {
    imageops::resize(
        image,
        image.width() * 2,
        image.height() * 2,
        FilterType::Triangle,
    )
}

/// Edge-preserving smoothing. Colour distance is the sum of absolute channel
/// differences; borders are replicated.
pub fn bilateral_filter(
    image: &RgbImage,
    diameter: u32,
    sigma_color: f32,
    sigma_space: f32,
) -> RgbImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let radius = (diameter / 2).max(1) as i32;
    let space_coeff = -0.5 / (sigma_space * sigma_space).max(f32::EPSILON);
    let color_coeff = -0.5 / (sigma_color * sigma_color).max(f32::EPSILON);

    let mut kernel = Vec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let d2 = (dx * dx + dy * dy) as f32;
            if d2 <= (radius * radius) as f32 {
                kernel.push((dx, dy, (d2 * space_coeff).exp()));
            }
        }
    }
    let color_weights: Vec<f32> = (0..=255 * 3)
        .map(|d| ((d * d) as f32 * color_coeff).exp())
        .collect();

    let max_x = width as i32 - 1;
    let max_y = height as i32 - 1;
    RgbImage::from_fn(width, height, |x, y| {
        let center = image.get_pixel(x, y);
        let mut sum = [0f32; 3];
        let mut total = 0f32;
        for &(dx, dy, space_weight) in &kernel {
            let sx = (x as i32 + dx).clamp(0, max_x) as u32;
            let sy = (y as i32 + dy).clamp(0, max_y) as u32;
            let p = image.get_pixel(sx, sy);
            let diff = (0..3)
                .map(|c| (p[c] as i32 - center[c] as i32).unsigned_abs() as usize)
                .sum::<usize>();
            let weight = space_weight * color_weights[diff];
            for c in 0..3 {
                sum[c] += p[c] as f32 * weight;
            }
            total += weight;
        }
        let mut out = *center;
        if total > 0.0 {
            for c in 0..3 {
                out[c] = (sum[c] / total).round().clamp(0.0, 255.0) as u8;
            }
        }
        out
    })
}

/// Binary threshold against the mean of a `block x block` neighbourhood
/// minus `offset`. Windows are cut at the image border.
pub fn mean_adaptive_threshold(image: &GrayImage, block: u32, offset: i32) -> GrayImage {
    let (width, height) = image.dimensions();
    let radius = (block / 2) as i64;
    let stride = width as usize + 1;

    let mut integral = vec![0u64; stride * (height as usize + 1)];
    for y in 0..height as usize {
        let mut row = 0u64;
        for x in 0..width as usize {
            row += image.get_pixel(x as u32, y as u32)[0] as u64;
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row;
        }
    }

    GrayImage::from_fn(width, height, |x, y| {
        let x0 = (x as i64 - radius).max(0) as usize;
        let y0 = (y as i64 - radius).max(0) as usize;
        let x1 = (x as i64 + radius + 1).min(width as i64) as usize;
        let y1 = (y as i64 + radius + 1).min(height as i64) as usize;
        let area = ((x1 - x0) * (y1 - y0)) as f64;
        let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
            - integral[y0 * stride + x1]
            - integral[y1 * stride + x0];
        let threshold = (sum as f64 / area).round() - offset as f64;
        if image.get_pixel(x, y)[0] as f64 > threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    #[test]
    fn flat_image_survives_unchanged() {
        let image = RgbImage::from_pixel(32, 24, Rgb([120, 60, 200]));
        let out = cartoonize(&image, &CartoonConfig::default());
        assert_eq!(out, image);
    }

    #[test]
    fn odd_sizes_fall_back_to_the_colour_layer() {
        // 18 -> 9 -> 5 -> 10 -> 20: the smoothed layer comes back too wide.
        let config = CartoonConfig::default();
        let image = RgbImage::from_fn(18, 14, |x, y| Rgb([(x * 10) as u8, (y * 10) as u8, 50]));

        let color = smooth_colors(&image, &config);
        assert_ne!(color.dimensions(), image.dimensions());
        assert!(combine(&color, &outline_mask(&image, &config)).is_err());

        let out = cartoonize(&image, &config);
        assert_eq!(out.dimensions(), image.dimensions());
    }

    #[test]
    fn combine_masks_dark_outline() {
        let color = RgbImage::from_pixel(2, 1, Rgb([200, 150, 100]));
        let mut mask = RgbImage::from_pixel(2, 1, Rgb([255, 255, 255]));
        mask.put_pixel(1, 0, Rgb([0, 0, 0]));

        let out = combine(&color, &mask).unwrap();
        assert_eq!(out.get_pixel(0, 0), &Rgb([200, 150, 100]));
        assert_eq!(out.get_pixel(1, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn combine_rejects_mismatched_shapes() {
        let color = RgbImage::new(4, 4);
        let mask = RgbImage::new(4, 3);
        assert_eq!(
            combine(&color, &mask),
            Err(EffectError::ShapeMismatch {
                color_width: 4,
                color_height: 4,
                edge_width: 4,
                edge_height: 3,
            })
        );
    }

    #[test]
    fn bilateral_keeps_hard_edges() {
        let image = RgbImage::from_fn(16, 8, |x, _| {
            if x < 8 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        });
        let out = bilateral_filter(&image, 9, 9.0, 7.0);
        assert_eq!(out.get_pixel(7, 4), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(8, 4), &Rgb([255, 255, 255]));
    }

    #[test]
    fn threshold_marks_dark_lines() {
        let mut gray = GrayImage::from_pixel(9, 9, Luma([200]));
        for y in 0..9 {
            gray.put_pixel(4, y, Luma([20]));
        }
        let mask = mean_adaptive_threshold(&gray, 9, 2);
        assert_eq!(mask.get_pixel(4, 4), &Luma([0]));
        assert_eq!(mask.get_pixel(0, 4), &Luma([255]));
    }
}
