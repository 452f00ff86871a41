//! Report files: metric CSV, bar-chart PNG and detail JSON

use ab_glyph::{FontArc, FontRef, FontVec, PxScale};
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use crate::accumulator::EvaluationAccumulator;
use crate::report::OverallMetrics;

pub const DEFAULT_CHART_TITLE: &str = "License Plate Detection and Recognition Results";

const CHART_WIDTH: u32 = 1200;
const CHART_HEIGHT: u32 = 520;
const PANEL_MARGIN_LEFT: u32 = 60;
const PANEL_MARGIN_RIGHT: u32 = 20;
const PANEL_MARGIN_TOP: u32 = 80;
const PANEL_MARGIN_BOTTOM: u32 = 60;

const DEFAULT_FONT_DATA: &[u8] = include_bytes!("../assets/DejaVuSansMono.ttf");

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);

const DETECTION_COLORS: [Rgb<u8>; 4] = [
    Rgb([0x34, 0x98, 0xdb]),
    Rgb([0x2e, 0xcc, 0x71]),
    Rgb([0xe7, 0x4c, 0x3c]),
    Rgb([0xf3, 0x9c, 0x12]),
];
const OCR_COLORS: [Rgb<u8>; 2] = [Rgb([0x9b, 0x59, 0xb6]), Rgb([0x1a, 0xbc, 0x9c])];

/// Paths written by [`ReportWriter::write_report`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub plot: PathBuf,
    pub csv: PathBuf,
}

/// Embedded DejaVu Sans Mono, used for labels unless another font is given
pub fn default_font() -> Result<FontArc> {
    let font = FontRef::try_from_slice(DEFAULT_FONT_DATA)
        .map_err(|e| anyhow!("Invalid embedded font: {}", e))?;
    Ok(FontArc::new(font))
}

/// Load a TrueType/OpenType font for chart and annotation labels
pub fn load_font(path: impl AsRef<Path>) -> Result<FontArc> {
    let path = path.as_ref();
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read font file {}", path.display()))?;
    let font = FontVec::try_from_vec(bytes)
        .map_err(|e| anyhow!("Invalid font file {}: {}", path.display(), e))?;
    Ok(FontArc::new(font))
}

/// Current local time as used in report file names
pub fn report_timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Writes evaluation artifacts into one output directory
pub struct ReportWriter {
    output_dir: PathBuf,
    font: FontArc,
}

impl ReportWriter {
    /// Create the writer with the embedded font, creating `output_dir` if needed
    pub fn new(output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).with_context(|| {
            format!("Failed to create results directory {}", output_dir.display())
        })?;

        Ok(Self {
            output_dir,
            font: default_font()?,
        })
    }

    /// Use `font` for chart titles, labels and values
    pub fn with_font(mut self, font: FontArc) -> Self {
        self.font = font;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// `<output_dir>/<prefix>_<timestamp>.<extension>`
    pub fn timestamped_path(&self, prefix: &str, timestamp: &str, extension: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.{}", prefix, timestamp, extension))
    }

    /// Two-column `metric,value` CSV, values with four decimals
    pub fn write_csv(&self, metrics: &OverallMetrics, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;

        writer.write_record(["metric", "value"])?;
        for (name, value) in metrics.rows() {
            writer.write_record([name.to_string(), format!("{:.4}", value)])?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write {}", path.display()))?;

        Ok(())
    }

    /// Detection and OCR bar charts side by side, y axis fixed to [0, 1]
    pub fn render_chart(&self, metrics: &OverallMetrics, title: &str) -> RgbImage {
        let mut canvas = RgbImage::from_pixel(CHART_WIDTH, CHART_HEIGHT, WHITE);
        let panel_width = CHART_WIDTH / 2;

        self.draw_centered_text(&mut canvas, title, CHART_WIDTH / 2, 12, 28.0);

        self.draw_panel(
            &mut canvas,
            0,
            panel_width,
            "Detection Performance",
            &[
                ("Precision", metrics.precision),
                ("Recall", metrics.recall),
                ("F1-Score", metrics.f1),
                ("Accuracy", metrics.accuracy),
            ],
            &DETECTION_COLORS,
        );
        self.draw_panel(
            &mut canvas,
            panel_width,
            panel_width,
            "OCR Performance",
            &[
                ("Character Accuracy", metrics.character_accuracy),
                ("Exact Match", metrics.exact_match_accuracy),
            ],
            &OCR_COLORS,
        );

        canvas
    }

    /// Write `metrics_plot_<ts>.png` and `metrics_<ts>.csv`
    pub fn write_report(&self, metrics: &OverallMetrics, title: &str) -> Result<ReportPaths> {
        let timestamp = report_timestamp();
        let plot = self.timestamped_path("metrics_plot", &timestamp, "png");
        let csv = self.timestamped_path("metrics", &timestamp, "csv");

        self.render_chart(metrics, title)
            .save(&plot)
            .with_context(|| format!("Failed to save chart {}", plot.display()))?;
        self.write_csv(metrics, &csv)?;

        tracing::info!(plot = %plot.display(), csv = %csv.display(), "Evaluation report written");
        Ok(ReportPaths { plot, csv })
    }

    /// Dump the per-plate detail records as pretty JSON
    pub fn write_details(&self, accumulator: &EvaluationAccumulator, path: &Path) -> Result<()> {
        let file =
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &accumulator.details)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    fn draw_panel(
        &self,
        canvas: &mut RgbImage,
        origin_x: u32,
        width: u32,
        title: &str,
        bars: &[(&str, f64)],
        colors: &[Rgb<u8>],
    ) {
        let left = origin_x + PANEL_MARGIN_LEFT;
        let right = origin_x + width - PANEL_MARGIN_RIGHT;
        let top = PANEL_MARGIN_TOP;
        let bottom = CHART_HEIGHT - PANEL_MARGIN_BOTTOM;
        let plot_height = (bottom - top) as f32;

        self.draw_centered_text(canvas, title, (left + right) / 2, top - 36, 22.0);

        // horizontal grid every 0.25
        for step in 0..=4 {
            let value = step as f32 * 0.25;
            let y = bottom as f32 - value * plot_height;
            draw_line_segment_mut(canvas, (left as f32, y), (right as f32, y), GRID);
            draw_text_mut(
                canvas,
                BLACK,
                origin_x as i32 + 14,
                y as i32 - 8,
                PxScale::from(16.0),
                &self.font,
                &format!("{:.2}", value),
            );
        }

        draw_line_segment_mut(
            canvas,
            (left as f32, top as f32),
            (left as f32, bottom as f32),
            BLACK,
        );
        draw_line_segment_mut(
            canvas,
            (left as f32, bottom as f32),
            (right as f32, bottom as f32),
            BLACK,
        );

        if bars.is_empty() {
            return;
        }

        let slot = (right - left) / bars.len() as u32;
        let bar_width = (slot * 3 / 5).max(1);

        for (i, &(label, value)) in bars.iter().enumerate() {
            let value = value.clamp(0.0, 1.0) as f32;
            let center = left + slot * i as u32 + slot / 2;
            let bar_x = center - bar_width / 2;
            let bar_height = (value * plot_height).round() as u32;
            let color = colors[i % colors.len()];

            if bar_height > 0 {
                let rect = Rect::at(bar_x as i32, (bottom - bar_height) as i32)
                    .of_size(bar_width, bar_height);
                draw_filled_rect_mut(canvas, rect, color);
            }

            let value_y = (bottom - bar_height).saturating_sub(22);
            self.draw_centered_text(canvas, &format!("{:.2}", value), center, value_y, 18.0);
            self.draw_centered_text(canvas, label, center, bottom + 10, 18.0);
        }
    }

    fn draw_centered_text(&self, canvas: &mut RgbImage, text: &str, center_x: u32, y: u32, size: f32) {
        let scale = PxScale::from(size);
        let (text_width, _) = text_size(scale, &self.font, text);
        let x = center_x as i32 - text_width as i32 / 2;
        draw_text_mut(canvas, BLACK, x.max(0), y as i32, scale, &self.font, text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::PlateDetail;
    use common::{BoundingBox, DetectionRecord, GroundTruthRecord, RecognitionResult};
    use tempfile::TempDir;

    fn sample_metrics() -> OverallMetrics {
        OverallMetrics {
            precision: 0.8,
            recall: 0.5,
            f1: 0.615_384_6,
            accuracy: 0.444_444_4,
            character_accuracy: 0.75,
            exact_match_accuracy: 0.6,
        }
    }

    #[test]
    fn test_new_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("nested").join("results");

        let writer = ReportWriter::new(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(writer.output_dir(), dir.as_path());
    }

    #[test]
    fn test_write_csv_format() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(temp_dir.path()).unwrap();
        let path = temp_dir.path().join("metrics.csv");

        writer.write_csv(&sample_metrics(), &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                "metric,value",
                "precision,0.8000",
                "recall,0.5000",
                "f1,0.6154",
                "accuracy,0.4444",
                "character_accuracy,0.7500",
                "exact_match_accuracy,0.6000",
            ]
        );
    }

    #[test]
    fn test_render_chart_draws_bars() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(temp_dir.path()).unwrap();

        let chart = writer.render_chart(&sample_metrics(), DEFAULT_CHART_TITLE);
        assert_eq!(chart.dimensions(), (CHART_WIDTH, CHART_HEIGHT));

        // precision bar sits in the first slot of the left panel
        let slot = (CHART_WIDTH / 2 - PANEL_MARGIN_LEFT - PANEL_MARGIN_RIGHT) / 4;
        let center = PANEL_MARGIN_LEFT + slot / 2;
        let just_above_axis = CHART_HEIGHT - PANEL_MARGIN_BOTTOM - 5;
        assert_eq!(*chart.get_pixel(center, just_above_axis), DETECTION_COLORS[0]);
    }

    #[test]
    fn test_render_chart_with_zero_metrics() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(temp_dir.path()).unwrap();

        let chart = writer.render_chart(&OverallMetrics::default(), "empty");
        let slot = (CHART_WIDTH / 2 - PANEL_MARGIN_LEFT - PANEL_MARGIN_RIGHT) / 4;
        let center = PANEL_MARGIN_LEFT + slot / 2;
        let just_above_axis = CHART_HEIGHT - PANEL_MARGIN_BOTTOM - 5;
        assert_eq!(*chart.get_pixel(center, just_above_axis), WHITE);
    }

    #[test]
    fn test_write_report_files() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(temp_dir.path()).unwrap();

        let paths = writer
            .write_report(&sample_metrics(), DEFAULT_CHART_TITLE)
            .unwrap();

        assert!(paths.plot.exists());
        assert!(paths.csv.exists());

        let plot_name = paths.plot.file_name().unwrap().to_string_lossy().to_string();
        let csv_name = paths.csv.file_name().unwrap().to_string_lossy().to_string();
        assert!(plot_name.starts_with("metrics_plot_") && plot_name.ends_with(".png"));
        assert!(csv_name.starts_with("metrics_") && csv_name.ends_with(".csv"));
        // metrics_plot_YYYYmmdd_HHMMSS.png
        assert_eq!(plot_name.len(), "metrics_plot_".len() + 15 + ".png".len());

        let decoded = image::open(&paths.plot).unwrap();
        assert_eq!(decoded.width(), CHART_WIDTH);
    }

    #[test]
    fn test_write_details_json() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(temp_dir.path()).unwrap();

        let mut acc = EvaluationAccumulator::new();
        acc.add_detail(PlateDetail {
            image_name: "car.jpg".to_string(),
            ground_truth: GroundTruthRecord::new(BoundingBox::new(0.0, 0.0, 10.0, 5.0), "ABC1234"),
            detection: DetectionRecord::new(BoundingBox::new(1.0, 0.0, 10.0, 5.0), 0.9),
            recognition: RecognitionResult::empty(),
        });

        let path = writer.timestamped_path("detections", "20250101_000000", "json");
        writer.write_details(&acc, &path).unwrap();

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json[0]["image_name"], "car.jpg");
        assert_eq!(json[0]["ground_truth"]["text"], "ABC1234");
        assert_eq!(json[0]["detection"]["position"][0], 1.0);
    }

    #[test]
    fn test_render_chart_labels_with_embedded_font() {
        let temp_dir = TempDir::new().unwrap();
        let writer = ReportWriter::new(temp_dir.path()).unwrap();

        let chart = writer.render_chart(&OverallMetrics::default(), DEFAULT_CHART_TITLE);

        // title band above both panels
        let title_ink = (0..CHART_WIDTH)
            .flat_map(|x| (8..48).map(move |y| (x, y)))
            .filter(|&(x, y)| *chart.get_pixel(x, y) != WHITE)
            .count();
        assert!(title_ink > 100, "title drew {} pixels", title_ink);

        // bar labels below the x axis
        let label_top = CHART_HEIGHT - PANEL_MARGIN_BOTTOM + 8;
        let label_ink = (0..CHART_WIDTH / 2)
            .flat_map(|x| (label_top..CHART_HEIGHT).map(move |y| (x, y)))
            .filter(|&(x, y)| *chart.get_pixel(x, y) != WHITE)
            .count();
        assert!(label_ink > 0);
    }

    #[test]
    fn test_load_font_reads_ttf_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("mono.ttf");
        fs::write(&path, DEFAULT_FONT_DATA).unwrap();

        assert!(load_font(&path).is_ok());
    }

    #[test]
    fn test_load_font_rejects_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("font.ttf");
        fs::write(&path, b"definitely not a font").unwrap();

        assert!(load_font(&path).is_err());
        assert!(load_font(temp_dir.path().join("missing.ttf")).is_err());
    }
}
