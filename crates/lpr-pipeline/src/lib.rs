pub mod annotate;
pub mod config;
pub mod detector;
pub mod ocr;
pub mod onnx;
pub mod pipeline;
pub mod preprocessing;

pub use config::{OcrEngine, PipelineConfig};
pub use detector::{FixedDetector, OnnxPlateDetector, PlateDetector};
pub use ocr::{FixedOcr, OcrReading, OnnxCtcOcr, PlateOcr, TesseractOcr};
pub use pipeline::{DatasetReport, DatasetSummary, ImageResult, LprPipeline, PlateReading};
