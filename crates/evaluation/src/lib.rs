//! Detection and OCR evaluation
//!
//! - [`matcher`]: one-to-one box assignment (greedy or optimal)
//! - [`accumulator`]: running TP/FP/FN and OCR totals plus per-plate details
//! - [`ocr_score`]: character and exact-match accuracy
//! - [`report`] / [`export`]: final metrics, CSV, chart and JSON output

pub mod accumulator;
pub mod export;
pub mod matcher;
pub mod ocr_score;
pub mod report;

pub use accumulator::{EvaluationAccumulator, Evaluator, PlateDetail};
pub use export::{
    default_font, load_font, report_timestamp, ReportPaths, ReportWriter, DEFAULT_CHART_TITLE,
};
pub use matcher::{
    BoxMatch, BoxMatcher, GreedyMatcher, MatchOutcome, MatcherKind, OptimalMatcher,
    DEFAULT_IOU_THRESHOLD,
};
pub use ocr_score::{evaluate_ocr, OcrScores};
pub use report::{precision_recall_f1, DetectionScores, OverallMetrics};
