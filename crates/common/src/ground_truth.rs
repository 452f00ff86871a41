//! Ground-truth annotations keyed by image file name
//!
//! Accepted layouts per image:
//!
//! ```json
//! { "car_01.jpg": { "plates": [ { "position": [10, 20, 110, 60], "text": "ABC1234" } ] },
//!   "car_02.jpg": [ { "position": [5, 5, 80, 30], "text": "ABC1D23" } ] }
//! ```
//!
//! Entries that fail to parse are logged and dropped so that the image is
//! simply left out of the evaluation.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::plates::GroundTruthRecord;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImageAnnotations {
    Wrapped { plates: Vec<GroundTruthRecord> },
    Bare(Vec<GroundTruthRecord>),
}

impl ImageAnnotations {
    fn into_records(self) -> Vec<GroundTruthRecord> {
        match self {
            ImageAnnotations::Wrapped { plates } => plates,
            ImageAnnotations::Bare(plates) => plates,
        }
    }
}

/// Ground-truth plates for a set of images
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroundTruth {
    images: BTreeMap<String, Vec<GroundTruthRecord>>,
}

impl GroundTruth {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a ground-truth document, skipping malformed image entries
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: serde_json::Value =
            serde_json::from_str(json).context("Ground truth is not valid JSON")?;

        let entries = match document {
            serde_json::Value::Object(entries) => entries,
            other => {
                return Err(anyhow!(
                    "Ground truth must be a JSON object keyed by image name, got {}",
                    json_kind(&other)
                ))
            }
        };

        let mut images = BTreeMap::new();
        for (image_name, value) in entries {
            match serde_json::from_value::<ImageAnnotations>(value) {
                Ok(annotations) => {
                    images.insert(image_name, annotations.into_records());
                }
                Err(e) => {
                    tracing::warn!(image = %image_name, error = %e, "Skipping malformed ground truth entry");
                }
            }
        }

        Ok(Self { images })
    }

    /// Load a ground-truth file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read ground truth file {}", path.display()))?;
        Self::from_json_str(&json)
            .with_context(|| format!("Failed to parse ground truth file {}", path.display()))
    }

    /// Load a ground-truth file if one is given and readable, otherwise return an empty set
    pub fn load_or_empty(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::empty();
        };

        if !path.exists() {
            tracing::warn!(path = %path.display(), "Ground truth file not found, metrics will not be computed");
            return Self::empty();
        }

        match Self::load(path) {
            Ok(gt) => {
                tracing::info!(path = %path.display(), images = gt.len(), "Loaded ground truth");
                gt
            }
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "Ignoring unusable ground truth file");
                Self::empty()
            }
        }
    }

    pub fn insert(&mut self, image_name: impl Into<String>, plates: Vec<GroundTruthRecord>) {
        self.images.insert(image_name.into(), plates);
    }

    /// Plates annotated for `image_name`
    pub fn get(&self, image_name: &str) -> Option<&[GroundTruthRecord]> {
        self.images.get(image_name).map(Vec::as_slice)
    }

    pub fn image_names(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
