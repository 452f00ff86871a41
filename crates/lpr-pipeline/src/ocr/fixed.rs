use anyhow::{anyhow, Result};
use image::DynamicImage;
use std::collections::VecDeque;

use super::{OcrReading, PlateOcr};

/// Scripted OCR: hands out queued readings in order
#[derive(Debug, Clone, Default)]
pub struct FixedOcr {
    readings: VecDeque<Result<OcrReading, String>>,
}

impl FixedOcr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_readings<I, S>(readings: I) -> Self
    where
        I: IntoIterator<Item = (S, f32)>,
        S: Into<String>,
    {
        let mut ocr = Self::new();
        for (text, confidence) in readings {
            ocr.push(OcrReading::new(text, confidence));
        }
        ocr
    }

    pub fn push(&mut self, reading: OcrReading) {
        self.readings.push_back(Ok(reading));
    }

    /// Queue a failure for the next call
    pub fn push_failure(&mut self, message: impl Into<String>) {
        self.readings.push_back(Err(message.into()));
    }

    pub fn remaining(&self) -> usize {
        self.readings.len()
    }
}

impl PlateOcr for FixedOcr {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn recognize(&mut self, _plate: &DynamicImage) -> Result<OcrReading> {
        match self.readings.pop_front() {
            Some(Ok(reading)) => Ok(reading),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(OcrReading::empty()),
        }
    }
}
