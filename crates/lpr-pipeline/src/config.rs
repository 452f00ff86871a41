use anyhow::{anyhow, Context, Result};
use common::validation::validate_range;
use common::PlateValidator;
use evaluation::{Evaluator, MatcherKind, DEFAULT_IOU_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// ONNX Runtime placement shared by the detector and OCR models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Execution provider preference (CPU, CUDA, TensorRT)
    #[serde(default = "default_execution_provider")]
    pub execution_provider: String,

    /// GPU device ID (0, 1, 2, etc.)
    #[serde(default = "default_device_id")]
    pub device_id: i32,

    /// Number of intra-operation threads
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,

    /// Number of inter-operation threads
    #[serde(default = "default_inter_threads")]
    pub inter_threads: usize,
}

fn default_execution_provider() -> String {
    "CUDA".to_string()
}

fn default_device_id() -> i32 {
    0
}

fn default_intra_threads() -> usize {
    4
}

fn default_inter_threads() -> usize {
    1
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            execution_provider: default_execution_provider(),
            device_id: default_device_id(),
            intra_threads: default_intra_threads(),
            inter_threads: default_inter_threads(),
        }
    }
}

impl ExecutionConfig {
    /// Read GPU configuration from environment variables if set
    pub fn apply_env_overrides(&mut self) {
        if let Ok(provider) = std::env::var("LPR_EXECUTION_PROVIDER") {
            self.execution_provider = provider;
        }
        if let Ok(device_id) = std::env::var("LPR_DEVICE_ID") {
            if let Ok(id) = device_id.parse::<i32>() {
                self.device_id = id;
            }
        }
    }
}

// ============================================================================
// Detector
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Path to the plate detection ONNX model (YOLOv8 export)
    #[serde(default = "default_detector_model")]
    pub model_path: String,

    /// Confidence threshold for plate detections (0.0 to 1.0)
    #[serde(default = "default_confidence")]
    pub confidence_threshold: f32,

    /// IoU threshold for NMS
    #[serde(default = "default_nms_iou_threshold")]
    pub nms_iou_threshold: f32,

    /// Maximum number of plates to keep per image
    #[serde(default = "default_max_detections")]
    pub max_detections: usize,

    /// Detection model input size (width and height)
    #[serde(default = "default_detection_input_size")]
    pub input_size: u32,

    /// Grayscale, blur and equalize images before they reach the model
    #[serde(default)]
    pub enhance_contrast: bool,

    #[serde(flatten)]
    pub execution: ExecutionConfig,
}

fn default_detector_model() -> String {
    "models/plate_detector.onnx".to_string()
}

fn default_confidence() -> f32 {
    0.25
}

fn default_nms_iou_threshold() -> f32 {
    0.45
}

fn default_max_detections() -> usize {
    10
}

fn default_detection_input_size() -> u32 {
    640
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: default_detector_model(),
            confidence_threshold: default_confidence(),
            nms_iou_threshold: default_nms_iou_threshold(),
            max_detections: default_max_detections(),
            input_size: default_detection_input_size(),
            enhance_contrast: false,
            execution: ExecutionConfig::default(),
        }
    }
}

// ============================================================================
// OCR
// ============================================================================

/// Which OCR backend reads the plate crops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrEngine {
    #[default]
    Tesseract,
    Onnx,
}

impl std::str::FromStr for OcrEngine {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tesseract" => Ok(OcrEngine::Tesseract),
            "onnx" | "crnn" => Ok(OcrEngine::Onnx),
            other => Err(anyhow!("unknown OCR engine '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TesseractConfig {
    /// Tesseract executable, looked up on PATH when not absolute
    #[serde(default = "default_tesseract_binary")]
    pub binary_path: String,

    #[serde(default = "default_tesseract_language")]
    pub language: String,

    /// OCR engine mode (3 = default, based on what is available)
    #[serde(default = "default_oem")]
    pub oem: u8,

    /// Page segmentation mode (7 = single text line)
    #[serde(default = "default_psm")]
    pub psm: u8,

    #[serde(default = "default_char_whitelist")]
    pub char_whitelist: String,
}

fn default_tesseract_binary() -> String {
    "tesseract".to_string()
}

fn default_tesseract_language() -> String {
    "eng".to_string()
}

fn default_oem() -> u8 {
    3
}

fn default_psm() -> u8 {
    7
}

fn default_char_whitelist() -> String {
    "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789".to_string()
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            binary_path: default_tesseract_binary(),
            language: default_tesseract_language(),
            oem: default_oem(),
            psm: default_psm(),
            char_whitelist: default_char_whitelist(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnnxOcrConfig {
    /// Path to the CRNN OCR ONNX model
    #[serde(default = "default_ocr_model")]
    pub model_path: String,

    /// OCR model input width
    #[serde(default = "default_ocr_input_width")]
    pub input_width: u32,

    /// OCR model input height
    #[serde(default = "default_ocr_input_height")]
    pub input_height: u32,

    /// Character vocabulary for OCR (default: digits + uppercase letters)
    #[serde(default = "default_char_vocab")]
    pub char_vocab: String,

    #[serde(flatten)]
    pub execution: ExecutionConfig,
}

fn default_ocr_model() -> String {
    "models/plate_ocr.onnx".to_string()
}

fn default_ocr_input_width() -> u32 {
    200
}

fn default_ocr_input_height() -> u32 {
    64
}

fn default_char_vocab() -> String {
    // CTC blank character is at index 0, so vocab starts at index 1
    "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ-".to_string()
}

impl Default for OnnxOcrConfig {
    fn default() -> Self {
        Self {
            model_path: default_ocr_model(),
            input_width: default_ocr_input_width(),
            input_height: default_ocr_input_height(),
            char_vocab: default_char_vocab(),
            execution: ExecutionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default)]
    pub engine: OcrEngine,

    #[serde(default)]
    pub tesseract: TesseractConfig,

    #[serde(default)]
    pub onnx: OnnxOcrConfig,
}

// ============================================================================
// Evaluation and output
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// IoU a detection needs to count as a true positive
    #[serde(default = "default_iou_threshold")]
    pub iou_threshold: f32,

    #[serde(default)]
    pub matcher: MatcherKind,
}

fn default_iou_threshold() -> f32 {
    DEFAULT_IOU_THRESHOLD
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            iou_threshold: default_iou_threshold(),
            matcher: MatcherKind::default(),
        }
    }
}

impl EvaluationConfig {
    pub fn evaluator(&self) -> Evaluator {
        Evaluator::with_matcher(self.matcher.build(), self.iou_threshold)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_results_dir")]
    pub results_dir: String,

    /// Save annotated images and plate crops
    #[serde(default = "default_save_results")]
    pub save_results: bool,

    /// TTF/OTF font for annotation and chart labels, replacing the embedded DejaVu Sans Mono
    #[serde(default)]
    pub font_path: Option<String>,
}

fn default_results_dir() -> String {
    "results".to_string()
}

fn default_save_results() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
            save_results: default_save_results(),
            font_path: None,
        }
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Complete pipeline configuration, loadable from a JSON file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub detector: DetectorConfig,

    #[serde(default)]
    pub ocr: OcrConfig,

    #[serde(default)]
    pub validator: PlateValidator,

    #[serde(default)]
    pub evaluation: EvaluationConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl PipelineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Invalid pipeline configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json_str(&json).with_context(|| format!("Failed to load {}", path.display()))
    }

    /// Apply `LPR_EXECUTION_PROVIDER` / `LPR_DEVICE_ID` to both models
    pub fn apply_env_overrides(&mut self) {
        self.detector.execution.apply_env_overrides();
        self.ocr.onnx.execution.apply_env_overrides();
    }

    pub fn validate(&self) -> Result<()> {
        validate_range(
            self.detector.confidence_threshold,
            0.0,
            1.0,
            "detector.confidence_threshold",
        )?;
        validate_range(
            self.detector.nms_iou_threshold,
            0.0,
            1.0,
            "detector.nms_iou_threshold",
        )?;
        validate_range(
            self.evaluation.iou_threshold,
            0.0,
            1.0,
            "evaluation.iou_threshold",
        )?;
        if self.detector.max_detections == 0 {
            return Err(anyhow!("detector.max_detections must be at least 1"));
        }
        if self.detector.input_size == 0 {
            return Err(anyhow!("detector.input_size must be positive"));
        }
        if self.ocr.onnx.input_width == 0 || self.ocr.onnx.input_height == 0 {
            return Err(anyhow!("ocr.onnx input dimensions must be positive"));
        }
        if self.ocr.onnx.char_vocab.is_empty() {
            return Err(anyhow!("ocr.onnx.char_vocab must not be empty"));
        }
        self.validator.validate().context("Invalid validator settings")?;
        Ok(())
    }
}
