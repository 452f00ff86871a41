//! OCR backends for cropped plates

pub mod fixed;
pub mod onnx_ctc;
pub mod tesseract;

use anyhow::Result;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

pub use fixed::FixedOcr;
pub use onnx_ctc::OnnxCtcOcr;
pub use tesseract::TesseractOcr;

/// Raw text read from one plate crop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrReading {
    pub text: String,
    /// Engine confidence (0.0 to 1.0)
    pub confidence: f32,
}

impl OcrReading {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }

    pub fn empty() -> Self {
        Self::new(String::new(), 0.0)
    }
}

/// Reads the characters on a plate crop
pub trait PlateOcr {
    fn name(&self) -> &'static str;

    /// Turn a raw crop into the image this engine reads best
    fn prepare(&self, crop: &DynamicImage) -> DynamicImage {
        crop.clone()
    }

    fn recognize(&mut self, plate: &DynamicImage) -> Result<OcrReading>;
}
