//! Plate detectors

pub mod fixed;
pub mod onnx;

use anyhow::Result;
use common::{BoundingBox, DetectionRecord};
use image::DynamicImage;

pub use fixed::FixedDetector;
pub use onnx::OnnxPlateDetector;

/// Finds plate candidates in an image
pub trait PlateDetector {
    fn name(&self) -> &'static str;

    /// Plate boxes in original image coordinates, best first
    ///
    /// `image_name` is the file name the image was loaded from; replaying
    /// detectors key their results on it.
    fn detect(&mut self, image: &DynamicImage, image_name: &str) -> Result<Vec<DetectionRecord>>;
}

/// Apply Non-Maximum Suppression (NMS)
///
/// Keeps the highest-confidence box of every cluster whose pairwise IoU
/// reaches `iou_threshold`.
pub fn nms(mut candidates: Vec<DetectionRecord>, iou_threshold: f32) -> Vec<DetectionRecord> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<DetectionRecord> = Vec::new();
    for candidate in candidates {
        if keep
            .iter()
            .all(|kept| kept.position.iou(&candidate.position) < iou_threshold)
        {
            keep.push(candidate);
        }
    }

    keep
}

/// Clamp a box to the image bounds
pub fn clamp_to_image(bbox: BoundingBox, width: u32, height: u32) -> BoundingBox {
    let w = width as f32;
    let h = height as f32;
    BoundingBox::new(
        bbox.x1.clamp(0.0, w),
        bbox.y1.clamp(0.0, h),
        bbox.x2.clamp(0.0, w),
        bbox.y2.clamp(0.0, h),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nms() {
        let boxes = vec![
            DetectionRecord::new(BoundingBox::from_xywh(10.0, 10.0, 100.0, 30.0), 0.8),
            DetectionRecord::new(BoundingBox::from_xywh(15.0, 12.0, 100.0, 30.0), 0.9),
            DetectionRecord::new(BoundingBox::from_xywh(200.0, 200.0, 100.0, 30.0), 0.85),
        ];

        let filtered = nms(boxes, 0.45);
        // Should keep highest confidence from overlapping + non-overlapping
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].confidence, 0.9);
        assert_eq!(filtered[1].confidence, 0.85);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(Vec::new(), 0.45).is_empty());
    }

    #[test]
    fn test_clamp_to_image() {
        let clamped = clamp_to_image(BoundingBox::new(-4.0, 3.0, 120.0, 70.0), 100, 50);
        assert_eq!(clamped, BoundingBox::new(0.0, 3.0, 100.0, 50.0));
    }
}
