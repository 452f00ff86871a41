//! Running evaluation totals and the per-image detection scorer

use common::{BoundingBox, DetectionRecord, GroundTruthRecord, RecognitionResult};
use serde::{Deserialize, Serialize};

use crate::matcher::{BoxMatcher, GreedyMatcher, MatchOutcome, DEFAULT_IOU_THRESHOLD};
use crate::report::{precision_recall_f1, DetectionScores};

/// One ground-truth plate paired with what the pipeline produced for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateDetail {
    pub image_name: String,
    pub ground_truth: GroundTruthRecord,
    pub detection: DetectionRecord,
    pub recognition: RecognitionResult,
}

/// Counts collected over an evaluation run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationAccumulator {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub ocr_correct: usize,
    pub ocr_incorrect: usize,
    /// Ground-truth plates seen by detection scoring
    pub total_plates: usize,
    pub details: Vec<PlateDetail>,
}

impl EvaluationAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything collected so far
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Fold a partial accumulator into this one
    pub fn merge(&mut self, other: EvaluationAccumulator) {
        self.true_positives += other.true_positives;
        self.false_positives += other.false_positives;
        self.false_negatives += other.false_negatives;
        self.ocr_correct += other.ocr_correct;
        self.ocr_incorrect += other.ocr_incorrect;
        self.total_plates += other.total_plates;
        self.details.extend(other.details);
    }

    pub fn add_detail(&mut self, detail: PlateDetail) {
        self.details.push(detail);
    }

    pub fn record_matches(&mut self, outcome: &MatchOutcome, ground_truth_boxes: usize) {
        self.true_positives += outcome.true_positives();
        self.false_positives += outcome.false_positives();
        self.false_negatives += outcome.false_negatives();
        self.total_plates += ground_truth_boxes;
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Scores detections against ground truth with a configurable matching strategy
pub struct Evaluator {
    matcher: Box<dyn BoxMatcher>,
    iou_threshold: f32,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(DEFAULT_IOU_THRESHOLD)
    }
}

impl Evaluator {
    /// Greedy matching at the given IoU threshold
    pub fn new(iou_threshold: f32) -> Self {
        Self::with_matcher(Box::new(GreedyMatcher), iou_threshold)
    }

    pub fn with_matcher(matcher: Box<dyn BoxMatcher>, iou_threshold: f32) -> Self {
        Self {
            matcher,
            iou_threshold,
        }
    }

    pub fn iou_threshold(&self) -> f32 {
        self.iou_threshold
    }

    pub fn matcher_name(&self) -> &'static str {
        self.matcher.name()
    }

    /// Match one image's detections, add the counts to `accumulator` and
    /// return the scores of this image alone
    pub fn evaluate_detection(
        &self,
        accumulator: &mut EvaluationAccumulator,
        ground_truth: &[GroundTruthRecord],
        detections: &[DetectionRecord],
    ) -> DetectionScores {
        let gt_boxes: Vec<BoundingBox> = ground_truth.iter().map(|gt| gt.position).collect();
        let det_boxes: Vec<BoundingBox> = detections.iter().map(|d| d.position).collect();

        let outcome = self
            .matcher
            .match_boxes(&gt_boxes, &det_boxes, self.iou_threshold);
        accumulator.record_matches(&outcome, ground_truth.len());

        tracing::debug!(
            matcher = self.matcher.name(),
            tp = outcome.true_positives(),
            fp = outcome.false_positives(),
            fn_ = outcome.false_negatives(),
            "Scored detections"
        );

        precision_recall_f1(
            outcome.true_positives(),
            outcome.false_positives(),
            outcome.false_negatives(),
        )
    }
}
