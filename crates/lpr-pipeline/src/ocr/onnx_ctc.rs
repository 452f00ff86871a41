//! CRNN plate reader on ONNX Runtime with greedy CTC decoding

use anyhow::{anyhow, Context, Result};
use image::DynamicImage;
use ndarray::{Array, IxDyn};
use ort::{session::Session, value::Value};

use super::{OcrReading, PlateOcr};
use crate::config::OnnxOcrConfig;
use crate::onnx::create_session;

pub struct OnnxCtcOcr {
    config: OnnxOcrConfig,
    vocab: Vec<char>,
    session: Session,
}

impl OnnxCtcOcr {
    pub fn new(config: OnnxOcrConfig) -> Result<Self> {
        let (session, _provider) = create_session(&config.model_path, &config.execution, "ocr")
            .context("Failed to initialize OCR model")?;

        Ok(Self {
            vocab: config.char_vocab.chars().collect(),
            config,
            session,
        })
    }
}

impl PlateOcr for OnnxCtcOcr {
    fn name(&self) -> &'static str {
        "onnx_ctc"
    }

    fn recognize(&mut self, plate: &DynamicImage) -> Result<OcrReading> {
        let input_array =
            preprocess_for_ocr(plate, self.config.input_width, self.config.input_height);
        let input_tensor = Value::from_array(input_array)?;

        let outputs = self.session.run(ort::inputs![input_tensor])?;

        // Get output tensor (probabilities over vocabulary)
        // Expected shape: [batch, sequence_length, vocab_size]
        let output_value = outputs
            .get("output")
            .or_else(|| outputs.get("output0"))
            .or_else(|| outputs.get("logits"))
            .context("No OCR output tensor found (tried: output, output0, logits)")?;
        let (shape, data) = output_value.try_extract_tensor::<f32>()?;

        let shape_usize: Vec<usize> = shape.as_ref().iter().map(|&x| x as usize).collect();
        let output = Array::from_shape_vec(IxDyn(&shape_usize), data.to_vec())?;

        let (text, confidence) = ctc_decode(&output, &self.vocab)?;
        Ok(OcrReading::new(text, confidence))
    }
}

/// Resize to the model input and lay out as `[1, 1, H, W]` grayscale in [0, 1]
pub fn preprocess_for_ocr(img: &DynamicImage, width: u32, height: u32) -> Array<f32, IxDyn> {
    let resized = img.resize_exact(width, height, image::imageops::FilterType::Triangle);
    let gray_img = resized.to_luma8();

    let mut input = Array::zeros(IxDyn(&[1, 1, height as usize, width as usize]));
    for (x, y, pixel) in gray_img.enumerate_pixels() {
        input[[0, 0, y as usize, x as usize]] = pixel[0] as f32 / 255.0;
    }

    input
}

/// CTC greedy decoding
///
/// Index 0 is the blank; index `i > 0` maps to `vocab[i - 1]`. Repeats are
/// collapsed unless separated by a blank. The confidence is the mean of the
/// winning probability over emitted characters (0 when nothing is emitted).
pub fn ctc_decode(output: &Array<f32, IxDyn>, vocab: &[char]) -> Result<(String, f32)> {
    let shape = output.shape();
    if shape.len() != 3 || shape[2] == 0 {
        return Err(anyhow!(
            "Unexpected OCR output shape {:?}, expected [1, T, vocab]",
            shape
        ));
    }
    let sequence_length = shape[1];
    let vocab_size = shape[2];

    let mut text = String::new();
    let mut prob_sum = 0.0f32;
    let mut prev_idx = 0usize;

    for t in 0..sequence_length {
        // Find character with highest probability at this timestep
        let mut max_prob = output[[0, t, 0]];
        let mut max_idx = 0;
        for c in 1..vocab_size {
            let prob = output[[0, t, c]];
            if prob > max_prob {
                max_prob = prob;
                max_idx = c;
            }
        }

        if max_idx > 0 && max_idx != prev_idx {
            if let Some(&ch) = vocab.get(max_idx - 1) {
                text.push(ch);
                prob_sum += max_prob;
            }
        }
        prev_idx = max_idx;
    }

    let emitted = text.chars().count();
    let confidence = if emitted > 0 {
        (prob_sum / emitted as f32).clamp(0.0, 1.0)
    } else {
        0.0
    };

    Ok((text, confidence))
}
