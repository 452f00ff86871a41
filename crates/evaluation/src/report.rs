//! Precision/recall/F1 and the end-of-run metric summary

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::accumulator::EvaluationAccumulator;
use crate::ocr_score::ratio;

/// Detection scores for a single image (or any TP/FP/FN triple)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DetectionScores {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Precision, recall and F1; each is 0 when its denominator is 0
pub fn precision_recall_f1(
    true_positives: usize,
    false_positives: usize,
    false_negatives: usize,
) -> DetectionScores {
    let precision = ratio(true_positives, true_positives + false_positives);
    let recall = ratio(true_positives, true_positives + false_negatives);
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    DetectionScores {
        precision,
        recall,
        f1,
    }
}

/// Lifetime metrics of an evaluation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// TP / (TP + FP + FN)
    pub accuracy: f64,
    /// Share of scored OCR pairs that matched exactly
    pub character_accuracy: f64,
    /// Exact OCR matches over all ground-truth plates
    pub exact_match_accuracy: f64,
}

impl OverallMetrics {
    /// `(name, value)` rows in report order
    pub fn rows(&self) -> [(&'static str, f64); 6] {
        [
            ("precision", self.precision),
            ("recall", self.recall),
            ("f1", self.f1),
            ("accuracy", self.accuracy),
            ("character_accuracy", self.character_accuracy),
            ("exact_match_accuracy", self.exact_match_accuracy),
        ]
    }
}

impl fmt::Display for OverallMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.rows().iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{:<22} {:.4}", name, value)?;
        }
        Ok(())
    }
}

impl EvaluationAccumulator {
    /// Metrics over everything accumulated so far
    pub fn overall_metrics(&self) -> OverallMetrics {
        let tp = self.true_positives;
        let fp = self.false_positives;
        let fn_ = self.false_negatives;

        let DetectionScores {
            precision,
            recall,
            f1,
        } = precision_recall_f1(tp, fp, fn_);

        OverallMetrics {
            precision,
            recall,
            f1,
            accuracy: ratio(tp, tp + fp + fn_),
            character_accuracy: ratio(self.ocr_correct, self.ocr_correct + self.ocr_incorrect),
            exact_match_accuracy: ratio(self.ocr_correct, self.total_plates),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_precision_recall_f1() {
        let scores = precision_recall_f1(8, 2, 4);
        assert!(close(scores.precision, 0.8));
        assert!(close(scores.recall, 8.0 / 12.0));
        let expected_f1 = 2.0 * 0.8 * (8.0 / 12.0) / (0.8 + 8.0 / 12.0);
        assert!(close(scores.f1, expected_f1));
    }

    #[test]
    fn test_zero_denominators() {
        assert_eq!(precision_recall_f1(0, 0, 0), DetectionScores::default());
        let only_fp = precision_recall_f1(0, 3, 0);
        assert_eq!(only_fp.precision, 0.0);
        assert_eq!(only_fp.f1, 0.0);
    }

    #[test]
    fn test_overall_metrics() {
        let acc = EvaluationAccumulator {
            true_positives: 8,
            false_positives: 2,
            false_negatives: 2,
            ocr_correct: 6,
            ocr_incorrect: 2,
            total_plates: 10,
            details: Vec::new(),
        };

        let metrics = acc.overall_metrics();
        assert!(close(metrics.precision, 0.8));
        assert!(close(metrics.recall, 0.8));
        assert!(close(metrics.f1, 0.8));
        assert!(close(metrics.accuracy, 8.0 / 12.0));
        assert!(close(metrics.character_accuracy, 0.75));
        assert!(close(metrics.exact_match_accuracy, 0.6));
    }

    #[test]
    fn test_empty_accumulator_metrics_are_zero() {
        assert_eq!(
            EvaluationAccumulator::new().overall_metrics(),
            OverallMetrics::default()
        );
    }

    #[test]
    fn test_metrics_stay_in_unit_range() {
        let acc = EvaluationAccumulator {
            true_positives: 3,
            false_positives: 7,
            false_negatives: 1,
            ocr_correct: 3,
            ocr_incorrect: 0,
            total_plates: 4,
            details: Vec::new(),
        };
        for (name, value) in acc.overall_metrics().rows() {
            assert!((0.0..=1.0).contains(&value), "{name} = {value}");
        }
    }

    #[test]
    fn test_display_lists_every_metric() {
        let text = OverallMetrics::default().to_string();
        assert_eq!(text.lines().count(), 6);
        assert!(text.contains("exact_match_accuracy"));
        assert!(text.contains("0.0000"));
    }
}
