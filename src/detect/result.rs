use std::borrow::Cow;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, InferenceError};

const COCO_NAMES: &str = include_str!("../../assets/coco.names");

/// Axis-aligned box in frame pixel coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub const fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// Single detection returned by an inference backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class_id: usize,
    /// Always within `[0, 1]`.
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(class_id: usize, confidence: f32, bbox: BoundingBox) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            class_id,
            confidence,
            bbox,
        }
    }
}

/// Ordered detections produced by one inference call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionResult {
    detections: Vec<Detection>,
}

impl DetectionResult {
    pub fn new(detections: Vec<Detection>) -> Self {
        let detections = detections
            .into_iter()
            .map(|d| Detection::new(d.class_id, d.confidence, d.bbox))
            .collect();
        Self { detections }
    }

    /// Zip the parallel arrays an inference call returns.
    pub fn from_parallel(
        class_ids: &[usize],
        confidences: &[f32],
        boxes: &[BoundingBox],
    ) -> Result<Self, InferenceError> {
        if class_ids.len() != confidences.len() || class_ids.len() != boxes.len() {
            return Err(InferenceError::MismatchedOutput {
                classes: class_ids.len(),
                confidences: confidences.len(),
                boxes: boxes.len(),
            });
        }

        let detections = class_ids
            .iter()
            .zip(confidences)
            .zip(boxes)
            .map(|((&class_id, &confidence), &bbox)| Detection::new(class_id, confidence, bbox))
            .collect();
        Ok(Self { detections })
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }
}

/// Human readable labels indexed by class id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassNames {
    names: Vec<String>,
}

impl ClassNames {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }

    /// The 80 COCO labels.
    pub fn coco() -> Self {
        Self::parse(COCO_NAMES)
    }

    pub fn parse(text: &str) -> Self {
        let names = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        Self { names }
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(path).map_err(|source| Error::ClassNames {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&text))
    }

    /// Load from `path`, or the COCO table when none is configured.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::coco()),
        }
    }

    pub fn label(&self, class_id: usize) -> Cow<'_, str> {
        match self.names.get(class_id) {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(format!("#{class_id}")),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for ClassNames {
    fn default() -> Self {
        Self::coco()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn coco_table_is_complete() {
        let names = ClassNames::coco();
        assert_eq!(names.len(), 80);
        assert_eq!(names.label(0), "person");
        assert_eq!(names.label(79), "toothbrush");
        assert_eq!(names.label(80), "#80");
    }

    #[test]
    fn loads_labels_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cat\n\ndog\n").unwrap();

        let names = ClassNames::load(Some(file.path())).unwrap();
        assert_eq!(names, ClassNames::new(vec!["cat".into(), "dog".into()]));
    }

    #[test]
    fn missing_label_file_is_reported() {
        let err = ClassNames::from_file(Path::new("/nonexistent/labels.names")).unwrap_err();
        assert!(matches!(err, Error::ClassNames { .. }));
    }

    #[test]
    fn parallel_arrays_must_line_up() {
        let boxes = [BoundingBox::new(0, 0, 4, 4)];
        let result = DetectionResult::from_parallel(&[2], &[1.7], &boxes).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.detections()[0].confidence, 1.0);

        let err = DetectionResult::from_parallel(&[1, 2], &[0.5], &boxes).unwrap_err();
        assert!(matches!(
            err,
            InferenceError::MismatchedOutput {
                classes: 2,
                confidences: 1,
                boxes: 1
            }
        ));
    }
}
