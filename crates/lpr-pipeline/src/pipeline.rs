//! Detect → crop → OCR → validate, for one image or a whole dataset directory

use ab_glyph::FontArc;
use anyhow::{Context, Result};
use common::{
    DetectionRecord, GroundTruth, GroundTruthRecord, PlateValidator, RecognitionResult,
    RecognizedPlate,
};
use evaluation::{
    evaluate_ocr, report_timestamp, EvaluationAccumulator, Evaluator, PlateDetail, ReportPaths,
    ReportWriter,
};
use image::DynamicImage;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use telemetry::metrics::{
    LPR_IMAGES_PROCESSED, LPR_OCR_READINGS, LPR_PLATES_DETECTED, LPR_STAGE_DURATION,
};

use crate::annotate::{annotate, crop_plate};
use crate::config::{OcrConfig, OcrEngine, PipelineConfig};
use crate::detector::{FixedDetector, OnnxPlateDetector, PlateDetector};
use crate::ocr::{OcrReading, OnnxCtcOcr, PlateOcr, TesseractOcr};

/// File extensions picked up in dataset mode (compared case-insensitively)
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

const PROGRESS_EVERY: usize = 10;

/// One detection together with what was read from it
#[derive(Debug, Clone)]
pub struct PlateReading {
    pub detection: DetectionRecord,
    pub recognition: RecognitionResult,
    /// Raw crop, `None` when the box held no pixels
    pub crop: Option<DynamicImage>,
}

impl PlateReading {
    pub fn plate(&self) -> RecognizedPlate {
        RecognizedPlate::new(&self.detection, &self.recognition)
    }
}

/// Everything the pipeline produced for one image
#[derive(Debug, Clone)]
pub struct ImageResult {
    pub image_name: String,
    pub readings: Vec<PlateReading>,
    pub elapsed: Duration,
}

impl ImageResult {
    pub fn plates(&self) -> Vec<RecognizedPlate> {
        self.readings.iter().map(PlateReading::plate).collect()
    }

    pub fn detections(&self) -> Vec<DetectionRecord> {
        self.readings.iter().map(|r| r.detection).collect()
    }
}

/// Outcome of a dataset run
#[derive(Debug, Clone, Default)]
pub struct DatasetSummary {
    pub total_images: usize,
    pub processed: usize,
    pub skipped: usize,
    pub evaluated: usize,
    pub elapsed: Duration,
    pub accumulator: EvaluationAccumulator,
}

/// Files written by [`DatasetSummary::write_report`]
#[derive(Debug, Clone)]
pub struct DatasetReport {
    pub paths: ReportPaths,
    pub details: PathBuf,
}

impl DatasetSummary {
    pub fn average_time(&self) -> Duration {
        if self.processed == 0 {
            Duration::ZERO
        } else {
            self.elapsed / self.processed as u32
        }
    }

    /// Write chart, CSV and detail JSON for the run
    ///
    /// A run without ground truth still gets a report, with all metrics at zero.
    pub fn write_report(&self, writer: &ReportWriter, title: &str) -> Result<DatasetReport> {
        if self.evaluated == 0 {
            tracing::warn!("No images were scored, writing an all-zero report");
        }

        let paths = writer.write_report(&self.accumulator.overall_metrics(), title)?;
        let details = writer.timestamped_path("detections", &report_timestamp(), "json");
        writer.write_details(&self.accumulator, &details)?;

        Ok(DatasetReport { paths, details })
    }
}

pub struct LprPipeline {
    detector: Box<dyn PlateDetector>,
    ocr: Box<dyn PlateOcr>,
    validator: PlateValidator,
    results_dir: PathBuf,
    save_results: bool,
    font: FontArc,
}

impl LprPipeline {
    /// Pipeline with the embedded label font and saving disabled
    pub fn new(
        detector: Box<dyn PlateDetector>,
        ocr: Box<dyn PlateOcr>,
        validator: PlateValidator,
    ) -> Result<Self> {
        Ok(Self {
            detector,
            ocr,
            validator,
            results_dir: PathBuf::from("results"),
            save_results: false,
            font: evaluation::default_font()?,
        })
    }

    /// Build the detector, OCR engine and validator described by `config`
    ///
    /// With `detections` set, recorded boxes are replayed instead of loading
    /// the detector model.
    pub fn from_config(config: &PipelineConfig, detections: Option<&Path>) -> Result<Self> {
        let detector: Box<dyn PlateDetector> = match detections {
            Some(path) => {
                tracing::info!(path = %path.display(), "Replaying recorded detections");
                Box::new(
                    FixedDetector::load(path)?
                        .with_confidence_threshold(config.detector.confidence_threshold),
                )
            }
            None => Box::new(OnnxPlateDetector::new(config.detector.clone())?),
        };
        let ocr = build_ocr(&config.ocr)?;

        tracing::info!(
            detector = detector.name(),
            ocr = ocr.name(),
            min_len = config.validator.min_len,
            max_len = config.validator.max_len,
            "Pipeline ready"
        );

        let mut pipeline = Self::new(detector, ocr, config.validator.clone())?.with_output(
            &config.output.results_dir,
            config.output.save_results,
        );
        if let Some(font_path) = &config.output.font_path {
            pipeline = pipeline.with_font(evaluation::load_font(font_path)?);
        }
        Ok(pipeline)
    }

    /// Save annotated images and crops under `results_dir` when `save` is set
    pub fn with_output(mut self, results_dir: impl Into<PathBuf>, save: bool) -> Self {
        self.results_dir = results_dir.into();
        self.save_results = save;
        self
    }

    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = font;
        self
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Run detection and OCR on an already decoded image
    ///
    /// Detector and OCR failures are logged and degrade to "no plates" and
    /// "empty reading" respectively.
    pub fn process_image(&mut self, image: &DynamicImage, image_name: &str) -> ImageResult {
        let start = Instant::now();

        let detect_start = Instant::now();
        let detections = match self.detector.detect(image, image_name) {
            Ok(detections) => detections,
            Err(e) => {
                tracing::warn!(
                    image = %image_name,
                    detector = self.detector.name(),
                    error = %e,
                    "Detection failed, treating as no plates"
                );
                Vec::new()
            }
        };
        LPR_STAGE_DURATION
            .with_label_values(&["detection"])
            .observe(detect_start.elapsed().as_secs_f64());
        LPR_PLATES_DETECTED.inc_by(detections.len() as u64);

        let mut readings = Vec::with_capacity(detections.len());
        for detection in detections {
            let crop = crop_plate(image, &detection.position);
            let reading = self.read_plate(crop.as_ref(), image_name);
            let recognition = self.validator.analyze(&reading.text, reading.confidence);

            let outcome = if recognition.text.is_empty() {
                "empty"
            } else if recognition.is_valid {
                "valid"
            } else {
                "invalid"
            };
            LPR_OCR_READINGS.with_label_values(&[outcome]).inc();

            tracing::debug!(
                image = %image_name,
                text = %recognition.text,
                valid = recognition.is_valid,
                detection_confidence = detection.confidence,
                ocr_confidence = recognition.confidence,
                "Plate read"
            );

            readings.push(PlateReading {
                detection,
                recognition,
                crop,
            });
        }

        let elapsed = start.elapsed();
        LPR_STAGE_DURATION
            .with_label_values(&["total"])
            .observe(elapsed.as_secs_f64());

        ImageResult {
            image_name: image_name.to_string(),
            readings,
            elapsed,
        }
    }

    fn read_plate(&mut self, crop: Option<&DynamicImage>, image_name: &str) -> OcrReading {
        let Some(crop) = crop else {
            tracing::warn!(image = %image_name, "Empty plate crop, skipping OCR");
            return OcrReading::empty();
        };

        let ocr_start = Instant::now();
        let prepared = self.ocr.prepare(crop);
        let reading = self.ocr.recognize(&prepared).unwrap_or_else(|e| {
            tracing::warn!(
                image = %image_name,
                ocr = self.ocr.name(),
                error = %e,
                "OCR failed"
            );
            OcrReading::empty()
        });
        LPR_STAGE_DURATION
            .with_label_values(&["ocr"])
            .observe(ocr_start.elapsed().as_secs_f64());

        reading
    }

    /// Load, process and (optionally) save results for a single image file
    pub fn process_single_image(&mut self, path: &Path) -> Result<ImageResult> {
        let image = image::open(path)
            .with_context(|| format!("Failed to load image {}", path.display()))?;
        let image_name = file_name(path);

        let result = self.process_image(&image, &image_name);
        LPR_IMAGES_PROCESSED.with_label_values(&["ok"]).inc();

        tracing::info!(
            image = %image_name,
            plates = result.readings.len(),
            elapsed_ms = result.elapsed.as_millis() as u64,
            "Image processed"
        );

        if self.save_results {
            self.save_result(&image, &result)?;
        }

        Ok(result)
    }

    /// Write `images/result_<name>` and `plates/plate_<i>_<name>`
    pub fn save_result(&self, image: &DynamicImage, result: &ImageResult) -> Result<()> {
        let images_dir = self.results_dir.join("images");
        let plates_dir = self.results_dir.join("plates");
        fs::create_dir_all(&images_dir)
            .with_context(|| format!("Failed to create {}", images_dir.display()))?;
        fs::create_dir_all(&plates_dir)
            .with_context(|| format!("Failed to create {}", plates_dir.display()))?;

        let annotated = annotate(image, &result.plates(), &self.font);
        let annotated_path = images_dir.join(format!("result_{}", result.image_name));
        annotated
            .save(&annotated_path)
            .with_context(|| format!("Failed to save {}", annotated_path.display()))?;

        for (i, reading) in result.readings.iter().enumerate() {
            let Some(crop) = &reading.crop else {
                continue;
            };
            let crop_path = plates_dir.join(format!("plate_{}_{}", i, result.image_name));
            crop.to_rgb8()
                .save(&crop_path)
                .with_context(|| format!("Failed to save {}", crop_path.display()))?;
        }

        tracing::debug!(path = %annotated_path.display(), "Saved annotated image");
        Ok(())
    }

    /// Process every image in `dir` and score it against `ground_truth`
    ///
    /// Images without a ground-truth entry are processed but not scored.
    pub fn process_dataset(
        &mut self,
        dir: &Path,
        ground_truth: &GroundTruth,
        evaluator: &Evaluator,
    ) -> Result<DatasetSummary> {
        let images = list_images(dir)?;
        let start = Instant::now();
        let mut summary = DatasetSummary {
            total_images: images.len(),
            ..DatasetSummary::default()
        };

        tracing::info!(
            dir = %dir.display(),
            images = images.len(),
            annotated = ground_truth.len(),
            matcher = evaluator.matcher_name(),
            iou_threshold = evaluator.iou_threshold(),
            "Processing dataset"
        );

        for (index, path) in images.iter().enumerate() {
            let image_name = file_name(path);
            let image = match image::open(path) {
                Ok(image) => image,
                Err(e) => {
                    tracing::warn!(image = %image_name, error = %e, "Failed to load image, skipping");
                    LPR_IMAGES_PROCESSED.with_label_values(&["load_failed"]).inc();
                    summary.skipped += 1;
                    continue;
                }
            };

            let result = self.process_image(&image, &image_name);
            LPR_IMAGES_PROCESSED.with_label_values(&["ok"]).inc();
            summary.processed += 1;

            if self.save_results {
                self.save_result(&image, &result)?;
            }

            match ground_truth.get(&image_name) {
                Some(expected) => {
                    score_image(&mut summary.accumulator, evaluator, expected, &result);
                    summary.evaluated += 1;
                }
                None => tracing::debug!(image = %image_name, "No ground truth, not scored"),
            }

            if (index + 1) % PROGRESS_EVERY == 0 {
                tracing::info!(
                    done = index + 1,
                    total = images.len(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Dataset progress"
                );
            }
        }

        summary.elapsed = start.elapsed();
        tracing::info!(
            processed = summary.processed,
            skipped = summary.skipped,
            evaluated = summary.evaluated,
            total_ms = summary.elapsed.as_millis() as u64,
            avg_ms = summary.average_time().as_millis() as u64,
            "Dataset finished"
        );

        Ok(summary)
    }
}

pub fn build_ocr(config: &OcrConfig) -> Result<Box<dyn PlateOcr>> {
    Ok(match config.engine {
        OcrEngine::Tesseract => Box::new(TesseractOcr::new(config.tesseract.clone())),
        OcrEngine::Onnx => Box::new(OnnxCtcOcr::new(config.onnx.clone())?),
    })
}

/// Add one image's detection and OCR results to the running totals
///
/// Ground truth and detections are paired by position for OCR scoring and
/// detail records, up to the shorter of the two lists.
pub fn score_image(
    accumulator: &mut EvaluationAccumulator,
    evaluator: &Evaluator,
    expected: &[GroundTruthRecord],
    result: &ImageResult,
) {
    evaluator.evaluate_detection(accumulator, expected, &result.detections());

    let paired = expected.len().min(result.readings.len());
    if paired == 0 {
        return;
    }

    let gt_texts: Vec<&str> = expected[..paired].iter().map(|gt| gt.text.as_str()).collect();
    let read_texts: Vec<&str> = result.readings[..paired]
        .iter()
        .map(|r| r.recognition.text.as_str())
        .collect();
    evaluate_ocr(accumulator, &gt_texts, &read_texts);

    for (gt, reading) in expected.iter().zip(&result.readings) {
        accumulator.add_detail(PlateDetail {
            image_name: result.image_name.clone(),
            ground_truth: gt.clone(),
            detection: reading.detection,
            recognition: reading.recognition.clone(),
        });
    }
}

/// Image files directly under `dir`, sorted by path
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read directory {}", dir.display()))?;

    let mut images = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("Failed to list {}", dir.display()))?
            .path();
        if path.is_file() && is_image_file(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::FixedDetector;
    use crate::ocr::FixedOcr;
    use common::BoundingBox;
    use image::RgbImage;
    use tempfile::TempDir;

    fn detection(x1: f32, y1: f32, x2: f32, y2: f32, confidence: f32) -> DetectionRecord {
        DetectionRecord::new(BoundingBox::new(x1, y1, x2, y2), confidence)
    }

    fn pipeline(detector: FixedDetector, ocr: FixedOcr) -> LprPipeline {
        LprPipeline::new(Box::new(detector), Box::new(ocr), PlateValidator::default()).unwrap()
    }

    #[test]
    fn test_process_image_validates_readings() {
        let mut detector = FixedDetector::default();
        detector.insert(
            "car.jpg",
            vec![
                detection(10.0, 10.0, 60.0, 30.0, 0.9),
                detection(70.0, 10.0, 95.0, 30.0, 0.6),
            ],
        );
        let ocr = FixedOcr::with_readings([("abc-1234", 0.8), ("XY", 0.4)]);

        let image = DynamicImage::new_rgb8(100, 50);
        let result = pipeline(detector, ocr).process_image(&image, "car.jpg");

        let plates = result.plates();
        assert_eq!(plates.len(), 2);
        assert_eq!(plates[0].text, "ABC1234");
        assert!(plates[0].is_valid);
        assert_eq!(plates[0].detection_confidence, 0.9);
        assert_eq!(plates[1].text, "XY");
        assert!(!plates[1].is_valid);
        assert!(result.readings[0].crop.is_some());
    }

    #[test]
    fn test_ocr_failure_and_empty_crop_give_empty_text() {
        let mut detector = FixedDetector::default();
        detector.insert(
            "car.jpg",
            vec![
                detection(10.0, 10.0, 60.0, 30.0, 0.9),
                detection(20.0, 20.0, 20.0, 40.0, 0.5),
            ],
        );
        let mut ocr = FixedOcr::new();
        ocr.push_failure("engine unavailable");

        let image = DynamicImage::new_rgb8(100, 50);
        let result = pipeline(detector, ocr).process_image(&image, "car.jpg");

        assert_eq!(result.readings.len(), 2);
        for reading in &result.readings {
            assert!(reading.recognition.text.is_empty());
            assert_eq!(reading.recognition.confidence, 0.0);
            assert!(!reading.recognition.is_valid);
        }
        assert!(result.readings[1].crop.is_none());
    }

    #[test]
    fn test_score_image_pairs_up_to_shorter_list() {
        let mut detector = FixedDetector::default();
        detector.insert("a.png", vec![detection(0.0, 0.0, 50.0, 20.0, 0.9)]);
        let ocr = FixedOcr::with_readings([("ABC1234", 0.9)]);

        let image = DynamicImage::new_rgb8(200, 100);
        let result = pipeline(detector, ocr).process_image(&image, "a.png");

        let expected = vec![
            GroundTruthRecord::new(BoundingBox::new(0.0, 0.0, 50.0, 20.0), "ABC1234"),
            GroundTruthRecord::new(BoundingBox::new(100.0, 50.0, 150.0, 70.0), "XYZ9876"),
        ];
        let mut accumulator = EvaluationAccumulator::new();
        score_image(&mut accumulator, &Evaluator::default(), &expected, &result);

        assert_eq!(accumulator.true_positives, 1);
        assert_eq!(accumulator.false_negatives, 1);
        assert_eq!(accumulator.false_positives, 0);
        assert_eq!(accumulator.total_plates, 2);
        assert_eq!(accumulator.ocr_correct, 1);
        assert_eq!(accumulator.ocr_incorrect, 0);
        assert_eq!(accumulator.details.len(), 1);
        assert_eq!(accumulator.details[0].ground_truth.text, "ABC1234");
    }

    #[test]
    fn test_list_images_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        for name in ["b.PNG", "a.jpg", "c.jpeg", "notes.txt", "d.bmp", "e.gif"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("nested.jpg")).unwrap();

        let names: Vec<String> = list_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| file_name(p))
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "c.jpeg", "d.bmp"]);
    }

    #[test]
    fn test_process_dataset_skips_unreadable_images() {
        let dir = TempDir::new().unwrap();
        RgbImage::new(120, 60).save(dir.path().join("good.png")).unwrap();
        fs::write(dir.path().join("broken.jpg"), b"not an image").unwrap();

        let mut detector = FixedDetector::default();
        detector.insert("good.png", vec![detection(10.0, 10.0, 70.0, 30.0, 0.8)]);
        let ocr = FixedOcr::with_readings([("ABC1234", 0.9)]);

        let mut ground_truth = GroundTruth::empty();
        ground_truth.insert(
            "good.png",
            vec![GroundTruthRecord::new(
                BoundingBox::new(10.0, 10.0, 70.0, 30.0),
                "ABC1234",
            )],
        );

        let summary = pipeline(detector, ocr)
            .process_dataset(dir.path(), &ground_truth, &Evaluator::default())
            .unwrap();

        assert_eq!(summary.total_images, 2);
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.evaluated, 1);
        assert_eq!(summary.accumulator.true_positives, 1);
        assert_eq!(summary.accumulator.ocr_correct, 1);
    }

    #[test]
    fn test_report_without_ground_truth_is_all_zero() {
        let dir = TempDir::new().unwrap();
        RgbImage::new(120, 60).save(dir.path().join("car.png")).unwrap();

        let mut detector = FixedDetector::default();
        detector.insert("car.png", vec![detection(10.0, 10.0, 70.0, 30.0, 0.8)]);
        let summary = pipeline(detector, FixedOcr::with_readings([("ABC1234", 0.9)]))
            .process_dataset(dir.path(), &GroundTruth::empty(), &Evaluator::default())
            .unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.evaluated, 0);

        let writer = ReportWriter::new(dir.path().join("results")).unwrap();
        let report = summary.write_report(&writer, "no ground truth").unwrap();

        assert!(report.paths.plot.exists());
        let csv = fs::read_to_string(&report.paths.csv).unwrap();
        assert!(csv.contains("precision,0.0000"));
        assert!(csv.contains("exact_match_accuracy,0.0000"));

        let details: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report.details).unwrap()).unwrap();
        assert_eq!(details, serde_json::json!([]));
    }

    #[test]
    fn test_save_result_writes_annotation_and_crops() {
        let out = TempDir::new().unwrap();
        let mut detector = FixedDetector::default();
        detector.insert("car.png", vec![detection(5.0, 5.0, 45.0, 20.0, 0.7)]);

        let mut pipeline =
            pipeline(detector, FixedOcr::new()).with_output(out.path().to_path_buf(), true);
        let image = DynamicImage::new_rgb8(60, 30);
        let result = pipeline.process_image(&image, "car.png");
        pipeline.save_result(&image, &result).unwrap();

        assert!(out.path().join("images/result_car.png").exists());
        assert!(out.path().join("plates/plate_0_car.png").exists());
    }

    #[test]
    fn test_from_config_with_recorded_detections() {
        let dir = TempDir::new().unwrap();
        let detections = dir.path().join("detections.json");
        fs::write(
            &detections,
            r#"{ "car.png": [ { "position": [5, 5, 45, 20], "confidence": 0.7 } ] }"#,
        )
        .unwrap();

        let mut config = PipelineConfig::default();
        config.output.results_dir = dir.path().join("out").display().to_string();
        config.output.save_results = false;

        let pipeline = LprPipeline::from_config(&config, Some(detections.as_path())).unwrap();
        assert_eq!(pipeline.results_dir(), dir.path().join("out"));

        let missing = dir.path().join("missing.json");
        assert!(LprPipeline::from_config(&config, Some(missing.as_path())).is_err());
    }

    #[test]
    fn test_missing_image_is_an_error() {
        let mut pipeline = pipeline(FixedDetector::default(), FixedOcr::new());
        assert!(pipeline
            .process_single_image(Path::new("/nonexistent/car.jpg"))
            .is_err());
    }
}
