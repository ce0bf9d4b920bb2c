//! Burns detection boxes and labels into frames.

use std::sync::Arc;

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::capture::Frame;
use crate::detect::font::{draw_text, text_size};
use crate::detect::result::{BoundingBox, ClassNames, DetectionResult};

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BOX_THICKNESS: i32 = 2;

/// Draws boxes with `"<label>: <confidence>"` captions.
#[derive(Debug, Clone)]
pub struct Renderer {
    names: Arc<ClassNames>,
    label_scale: u32,
    color: Rgb<u8>,
}

impl Renderer {
    pub fn new(names: Arc<ClassNames>, label_scale: u32) -> Self {
        Self {
            names,
            label_scale: label_scale.max(1),
            color: BOX_COLOR,
        }
    }

    /// Caption text for one detection.
    pub fn label(&self, class_id: usize, confidence: f32) -> String {
        format!("{}: {:.2}", self.names.label(class_id), confidence)
    }

    /// Consume `frame` and return it with `detections` drawn on. No
    /// detections leaves the pixels untouched.
    pub fn render(&self, mut frame: Frame, detections: &DetectionResult) -> Frame {
        self.draw(&mut frame.image, detections);
        frame
    }

    pub fn draw(&self, image: &mut RgbImage, detections: &DetectionResult) {
        let text_color = Rgb([
            255 - self.color[0],
            255 - self.color[1],
            255 - self.color[2],
        ]);

        let (image_width, image_height) = image.dimensions();
        for detection in detections.detections() {
            let Some(bbox) = clip(detection.bbox, image_width, image_height) else {
                continue;
            };
            for inset in 0..BOX_THICKNESS {
                let width = bbox.width - 2 * inset;
                let height = bbox.height - 2 * inset;
                if width <= 0 || height <= 0 {
                    break;
                }
                let rect = Rect::at(bbox.left + inset, bbox.top + inset)
                    .of_size(width as u32, height as u32);
                draw_hollow_rect_mut(image, rect, self.color);
            }

            let label = self.label(detection.class_id, detection.confidence);
            let (label_width, label_height) = text_size(&label, self.label_scale);
            let pad = self.label_scale as i32;
            let caption_height = label_height as i32 + 2 * pad;
            // Keep the caption on screen for boxes touching the top edge.
            let top = bbox.top.max(caption_height);

            let background = Rect::at(bbox.left - 1, top - caption_height)
                .of_size(label_width + 1 + pad as u32, caption_height as u32);
            draw_filled_rect_mut(image, background, self.color);
            draw_text(
                image,
                bbox.left,
                top - caption_height + pad,
                &label,
                self.label_scale,
                text_color,
            );
        }
    }
}

/// Intersect `bbox` with the image grown by the outline thickness on every
/// side, so edges that hang off the frame stay off it. `None` for empty boxes
/// and boxes entirely outside the image.
fn clip(bbox: BoundingBox, image_width: u32, image_height: u32) -> Option<BoundingBox> {
    let margin = i64::from(BOX_THICKNESS);
    let (image_width, image_height) = (i64::from(image_width), i64::from(image_height));

    let left = i64::from(bbox.left);
    let top = i64::from(bbox.top);
    let right = left + i64::from(bbox.width);
    let bottom = top + i64::from(bbox.height);
    if right <= left.max(0) || bottom <= top.max(0) || left >= image_width || top >= image_height {
        return None;
    }

    let left = left.max(-margin);
    let top = top.max(-margin);
    let right = right.min(image_width + margin);
    let bottom = bottom.min(image_height + margin);
    Some(BoundingBox::new(
        i32::try_from(left).ok()?,
        i32::try_from(top).ok()?,
        i32::try_from(right - left).ok()?,
        i32::try_from(bottom - top).ok()?,
    ))
}
