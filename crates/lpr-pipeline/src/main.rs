//! `lpr`: license plate detection and recognition
//!
//! Usage:
//!   lpr --image car.jpg                                   - Read plates in one image
//!   lpr --dataset data/images --ground-truth gt.json      - Process and score a dataset
//!   lpr --dataset data/images --detections boxes.json     - Score recorded detections

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use common::GroundTruth;
use evaluation::{MatcherKind, ReportWriter, DEFAULT_CHART_TITLE};
use lpr_pipeline::{LprPipeline, OcrEngine, PipelineConfig};
use std::fs;
use std::path::{Path, PathBuf};
use telemetry::{init_structured_logging, LogConfig};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "lpr")]
#[command(about = "License plate detection, recognition and evaluation", long_about = None)]
#[command(group(ArgGroup::new("input").required(true).args(["image", "dataset"])))]
struct Cli {
    /// Single image to process
    #[arg(long)]
    image: Option<PathBuf>,

    /// Directory of images to process and evaluate
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// JSON pipeline configuration; command-line flags take precedence
    #[arg(long, env = "LPR_CONFIG")]
    config: Option<PathBuf>,

    /// Plate detector ONNX model
    #[arg(long, env = "LPR_DETECTOR_MODEL")]
    model: Option<String>,

    /// Ground-truth annotations for dataset mode
    #[arg(long, env = "LPR_GROUND_TRUTH")]
    ground_truth: Option<PathBuf>,

    /// OCR engine (tesseract, onnx)
    #[arg(long, env = "LPR_OCR_ENGINE")]
    ocr: Option<OcrEngine>,

    /// CRNN OCR ONNX model
    #[arg(long, env = "LPR_OCR_MODEL")]
    ocr_model: Option<String>,

    /// Tesseract executable
    #[arg(long, env = "TESSERACT_PATH")]
    tesseract_path: Option<String>,

    /// Minimum detection confidence [default: 0.25]
    #[arg(long)]
    conf_threshold: Option<f32>,

    /// IoU needed for a detection to match a ground-truth plate [default: 0.5]
    #[arg(long)]
    iou_threshold: Option<f32>,

    /// Box matching strategy (greedy, optimal)
    #[arg(long)]
    matcher: Option<MatcherKind>,

    /// Output directory for annotated images, crops and reports
    #[arg(long, env = "LPR_RESULTS_DIR")]
    results_dir: Option<String>,

    /// TTF/OTF font for labels on annotated images and charts
    #[arg(long, env = "LPR_FONT")]
    font: Option<String>,

    #[arg(long)]
    min_plate_len: Option<usize>,

    #[arg(long)]
    max_plate_len: Option<usize>,

    /// Replay detections recorded in a JSON file instead of running the detector model
    #[arg(long)]
    detections: Option<PathBuf>,

    /// Do not write annotated images, crops or reports
    #[arg(long)]
    no_save: bool,

    /// Write Prometheus metrics to this file when done
    #[arg(long)]
    metrics_out: Option<PathBuf>,

    /// Title of the metrics chart
    #[arg(long, default_value = DEFAULT_CHART_TITLE)]
    title: String,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn pipeline_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };
        config.apply_env_overrides();

        if let Some(model) = &self.model {
            config.detector.model_path = model.clone();
        }
        if let Some(threshold) = self.conf_threshold {
            config.detector.confidence_threshold = threshold;
        }
        if let Some(engine) = self.ocr {
            config.ocr.engine = engine;
        }
        if let Some(model) = &self.ocr_model {
            config.ocr.onnx.model_path = model.clone();
        }
        if let Some(path) = &self.tesseract_path {
            config.ocr.tesseract.binary_path = path.clone();
        }
        if let Some(threshold) = self.iou_threshold {
            config.evaluation.iou_threshold = threshold;
        }
        if let Some(matcher) = self.matcher {
            config.evaluation.matcher = matcher;
        }
        if let Some(dir) = &self.results_dir {
            config.output.results_dir = dir.clone();
        }
        if let Some(font) = &self.font {
            config.output.font_path = Some(font.clone());
        }
        if self.no_save {
            config.output.save_results = false;
        }
        if let Some(len) = self.min_plate_len {
            config.validator.min_len = len;
        }
        if let Some(len) = self.max_plate_len {
            config.validator.max_len = len;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    let _log_guard = init_structured_logging(
        LogConfig::new("lpr")
            .with_version(env!("CARGO_PKG_VERSION"))
            .with_default_level(log_level),
    );

    let config = cli.pipeline_config()?;
    info!(
        detector_model = %config.detector.model_path,
        ocr = ?config.ocr.engine,
        results_dir = %config.output.results_dir,
        "Starting license plate recognition"
    );

    let mut pipeline = LprPipeline::from_config(&config, cli.detections.as_deref())?;

    if let Some(image) = &cli.image {
        run_single_image(&mut pipeline, image)?;
    } else if let Some(dataset) = &cli.dataset {
        run_dataset(&mut pipeline, &config, dataset, cli.ground_truth.as_deref(), &cli.title)?;
    }

    if let Some(path) = &cli.metrics_out {
        let metrics = telemetry::encode_metrics()?;
        fs::write(path, metrics)
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
        info!(path = %path.display(), "Metrics written");
    }

    Ok(())
}

fn run_single_image(pipeline: &mut LprPipeline, path: &Path) -> Result<()> {
    let result = pipeline.process_single_image(path)?;
    let plates = result.plates();

    println!("Found {} plate(s) in {}", plates.len(), result.image_name);
    for (i, plate) in plates.iter().enumerate() {
        let text = if plate.text.is_empty() {
            "<unreadable>"
        } else {
            plate.text.as_str()
        };
        println!(
            "  [{}] {} (OCR confidence: {:.2}, detection confidence: {:.2}, {})",
            i + 1,
            text,
            plate.ocr_confidence,
            plate.detection_confidence,
            if plate.is_valid { "valid" } else { "invalid" }
        );
    }
    println!("Processing time: {:.3}s", result.elapsed.as_secs_f64());

    Ok(())
}

fn run_dataset(
    pipeline: &mut LprPipeline,
    config: &PipelineConfig,
    dir: &Path,
    ground_truth_path: Option<&Path>,
    title: &str,
) -> Result<()> {
    let ground_truth = GroundTruth::load_or_empty(ground_truth_path);
    let evaluator = config.evaluation.evaluator();

    let summary = pipeline.process_dataset(dir, &ground_truth, &evaluator)?;
    println!(
        "Processed {} of {} image(s) in {:.2}s ({:.3}s per image, {} skipped)",
        summary.processed,
        summary.total_images,
        summary.elapsed.as_secs_f64(),
        summary.average_time().as_secs_f64(),
        summary.skipped
    );

    if ground_truth.is_empty() {
        warn!("No ground truth available, metrics will be zero");
    }

    let metrics = summary.accumulator.overall_metrics();
    println!("\nEvaluation ({} images scored)", summary.evaluated);
    println!("{}", metrics);

    if config.output.save_results {
        let mut writer = ReportWriter::new(&config.output.results_dir)?;
        if let Some(font_path) = &config.output.font_path {
            writer = writer.with_font(evaluation::load_font(font_path)?);
        }

        let report = summary.write_report(&writer, title)?;
        println!("Chart:   {}", report.paths.plot.display());
        println!("CSV:     {}", report.paths.csv.display());
        println!("Details: {}", report.details.display());
    }

    Ok(())
}
