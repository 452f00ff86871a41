//! YOLOv8 plate detector running on ONNX Runtime

use anyhow::{anyhow, Context, Result};
use common::{BoundingBox, DetectionRecord};
use image::DynamicImage;
use ndarray::{Array, IxDyn};
use ort::{session::Session, value::Value};
use std::borrow::Cow;

use super::{clamp_to_image, nms, PlateDetector};
use crate::config::DetectorConfig;
use crate::onnx::create_session;
use crate::preprocessing;

pub struct OnnxPlateDetector {
    config: DetectorConfig,
    session: Session,
}

impl OnnxPlateDetector {
    pub fn new(config: DetectorConfig) -> Result<Self> {
        let (session, _) = create_session(&config.model_path, &config.execution, "detector")
            .context("Failed to initialize plate detector")?;

        Ok(Self { config, session })
    }
}

impl PlateDetector for OnnxPlateDetector {
    fn name(&self) -> &'static str {
        "onnx_yolov8"
    }

    fn detect(&mut self, image: &DynamicImage, _image_name: &str) -> Result<Vec<DetectionRecord>> {
        let input_array = model_input(image, &self.config);
        let input_tensor = Value::from_array(input_array)?;

        let outputs = self.session.run(ort::inputs![input_tensor])?;

        // Get detection output - try common YOLO output names
        let output_value = outputs
            .get("output0")
            .or_else(|| outputs.get("output"))
            .or_else(|| outputs.get("boxes"))
            .context("No detection output tensor found (tried: output0, output, boxes)")?;
        let (shape, data) = output_value.try_extract_tensor::<f32>()?;

        let shape_usize: Vec<usize> = shape.as_ref().iter().map(|&x| x as usize).collect();
        let output = Array::from_shape_vec(IxDyn(&shape_usize), data.to_vec())?;

        postprocess_detection(&output, &self.config, image.width(), image.height())
    }
}

/// Detector input for `image`, contrast-enhanced first when configured
pub fn model_input(image: &DynamicImage, config: &DetectorConfig) -> Array<f32, IxDyn> {
    let source = if config.enhance_contrast {
        Cow::Owned(DynamicImage::ImageLuma8(preprocessing::preprocess_for_detection(image)))
    } else {
        Cow::Borrowed(image)
    };
    to_input_tensor(&source, config.input_size)
}

/// Resize to a square model input in NCHW layout, normalized to [0, 1]
pub fn to_input_tensor(img: &DynamicImage, size: u32) -> Array<f32, IxDyn> {
    let resized = img.resize_exact(size, size, image::imageops::FilterType::Triangle);
    let rgb_img = resized.to_rgb8();

    let mut input = Array::zeros(IxDyn(&[1, 3, size as usize, size as usize]));
    for (x, y, pixel) in rgb_img.enumerate_pixels() {
        for channel in 0..3 {
            input[[0, channel, y as usize, x as usize]] = pixel[channel] as f32 / 255.0;
        }
    }

    input
}

/// Decode a YOLOv8 head of shape `[1, 4 + classes, predictions]`
///
/// Each prediction is `cx, cy, w, h` in model input pixels followed by one
/// score per class; the best class score is the plate confidence. Boxes are
/// scaled back to the original image, filtered, suppressed and truncated to
/// `max_detections`.
pub fn postprocess_detection(
    output: &Array<f32, IxDyn>,
    config: &DetectorConfig,
    original_width: u32,
    original_height: u32,
) -> Result<Vec<DetectionRecord>> {
    let shape = output.shape();
    if shape.len() != 3 || shape[1] < 5 {
        return Err(anyhow!(
            "Unexpected detector output shape {:?}, expected [1, 4 + classes, N]",
            shape
        ));
    }

    let num_classes = shape[1] - 4;
    let num_predictions = shape[2];
    let scale_x = original_width as f32 / config.input_size as f32;
    let scale_y = original_height as f32 / config.input_size as f32;

    let mut candidates = Vec::new();
    for i in 0..num_predictions {
        let confidence = (0..num_classes)
            .map(|class_idx| output[[0, 4 + class_idx, i]])
            .fold(f32::MIN, f32::max);

        if confidence < config.confidence_threshold {
            continue;
        }

        let cx = output[[0, 0, i]];
        let cy = output[[0, 1, i]];
        let w = output[[0, 2, i]];
        let h = output[[0, 3, i]];

        let bbox = BoundingBox::new(
            (cx - w / 2.0) * scale_x,
            (cy - h / 2.0) * scale_y,
            (cx + w / 2.0) * scale_x,
            (cy + h / 2.0) * scale_y,
        );
        let bbox = clamp_to_image(bbox, original_width, original_height);
        if bbox.area() <= 0.0 {
            continue;
        }

        candidates.push(DetectionRecord::new(bbox, confidence));
    }

    let mut kept = nms(candidates, config.nms_iou_threshold);
    kept.truncate(config.max_detections);
    Ok(kept)
}
