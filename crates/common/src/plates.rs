//! Plate data model shared by the detector, OCR and evaluation stages.
//!
//! Boxes are stored as corner coordinates `[x1, y1, x2, y2]` in pixels, which is
//! also their JSON representation in ground-truth and detection files.

use crate::validation::PlateFormat;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box in pixel coordinates
///
/// `x1 < x2` and `y1 < y2` are expected but not enforced; inverted boxes have
/// zero area.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Build a box from a top-left corner and a size
    pub fn from_xywh(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Area of the overlap with `other`, 0 when the boxes do not intersect
    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        let left = self.x1.max(other.x1);
        let top = self.y1.max(other.y1);
        let right = self.x2.min(other.x2);
        let bottom = self.y2.min(other.y2);

        if right < left || bottom < top {
            return 0.0;
        }

        (right - left) * (bottom - top)
    }

    /// Intersection over Union
    ///
    /// Returns 0 when the union area is not positive (degenerate boxes).
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Integer crop rectangle `(x, y, width, height)` clamped to an image of the
    /// given size, or `None` if nothing of the box lies inside the image.
    pub fn to_pixel_rect(&self, image_width: u32, image_height: u32) -> Option<(u32, u32, u32, u32)> {
        let clamp_x = |v: f32| v.max(0.0).min(image_width as f32) as u32;
        let clamp_y = |v: f32| v.max(0.0).min(image_height as f32) as u32;

        let x1 = clamp_x(self.x1);
        let y1 = clamp_y(self.y1);
        let x2 = clamp_x(self.x2);
        let y2 = clamp_y(self.y2);

        if x2 <= x1 || y2 <= y1 {
            return None;
        }

        Some((x1, y1, x2 - x1, y2 - y1))
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from([x1, y1, x2, y2]: [f32; 4]) -> Self {
        Self::new(x1, y1, x2, y2)
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// A plate candidate produced by a detector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub position: BoundingBox,

    /// Detection confidence (0.0 to 1.0)
    pub confidence: f32,
}

impl DetectionRecord {
    pub fn new(position: BoundingBox, confidence: f32) -> Self {
        Self {
            position,
            confidence,
        }
    }
}

/// An annotated plate from a ground-truth file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthRecord {
    pub position: BoundingBox,
    pub text: String,
}

impl GroundTruthRecord {
    pub fn new(position: BoundingBox, text: impl Into<String>) -> Self {
        Self {
            position,
            text: text.into(),
        }
    }
}

/// Normalized OCR output for one plate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    /// Cleaned plate text (A-Z, 0-9 only)
    pub text: String,

    /// Whether the text matches a known plate format
    pub is_valid: bool,

    /// First plate format that matched, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<PlateFormat>,

    /// OCR confidence (0.0 to 1.0)
    pub confidence: f32,
}

impl RecognitionResult {
    /// Result used when the OCR engine produced nothing
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            is_valid: false,
            format: None,
            confidence: 0.0,
        }
    }
}

/// One detected and read plate, as reported by the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedPlate {
    pub text: String,
    pub position: BoundingBox,
    pub detection_confidence: f32,
    pub ocr_confidence: f32,
    pub is_valid: bool,
}

impl RecognizedPlate {
    pub fn new(detection: &DetectionRecord, recognition: &RecognitionResult) -> Self {
        Self {
            text: recognition.text.clone(),
            position: detection.position,
            detection_confidence: detection.confidence,
            ocr_confidence: recognition.confidence,
            is_valid: recognition.is_valid,
        }
    }

    pub fn detection(&self) -> DetectionRecord {
        DetectionRecord::new(self.position, self.detection_confidence)
    }
}
