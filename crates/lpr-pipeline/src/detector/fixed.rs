//! Replays detections recorded in a JSON file
//!
//! ```json
//! { "car_01.jpg": [ { "position": [10, 20, 110, 60], "confidence": 0.91 } ] }
//! ```

use anyhow::{Context, Result};
use common::DetectionRecord;
use image::DynamicImage;
use std::collections::BTreeMap;
use std::path::Path;

use super::{clamp_to_image, PlateDetector};

#[derive(Debug, Clone, Default)]
pub struct FixedDetector {
    detections: BTreeMap<String, Vec<DetectionRecord>>,
    confidence_threshold: f32,
}

impl FixedDetector {
    pub fn new(detections: BTreeMap<String, Vec<DetectionRecord>>) -> Self {
        Self {
            detections,
            confidence_threshold: 0.0,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let detections: BTreeMap<String, Vec<DetectionRecord>> =
            serde_json::from_str(json).context("Invalid detections file")?;
        Ok(Self::new(detections))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read detections file {}", path.display()))?;
        Self::from_json_str(&json)
            .with_context(|| format!("Failed to parse detections file {}", path.display()))
    }

    /// Drop recorded boxes below `threshold`
    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn insert(&mut self, image_name: impl Into<String>, detections: Vec<DetectionRecord>) {
        self.detections.insert(image_name.into(), detections);
    }
}

impl PlateDetector for FixedDetector {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn detect(&mut self, image: &DynamicImage, image_name: &str) -> Result<Vec<DetectionRecord>> {
        let Some(recorded) = self.detections.get(image_name) else {
            tracing::debug!(image = %image_name, "No recorded detections");
            return Ok(Vec::new());
        };

        Ok(recorded
            .iter()
            .filter(|d| d.confidence >= self.confidence_threshold)
            .map(|d| {
                DetectionRecord::new(
                    clamp_to_image(d.position, image.width(), image.height()),
                    d.confidence,
                )
            })
            .collect())
    }
}
