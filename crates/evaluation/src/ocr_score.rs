//! Character-level and exact-match scoring of recognized plate text

use serde::Serialize;

use crate::accumulator::EvaluationAccumulator;

/// OCR scores for one batch of paired texts
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct OcrScores {
    pub character_accuracy: f64,
    pub exact_match_accuracy: f64,
}

/// Score `recognized` against `ground_truth`, paired by position
///
/// Pairs stop at the shorter list. Characters are compared position by
/// position up to the shorter string and divided by the longer length, so
/// both missing and extra characters count against the reading. Every pair
/// also bumps `ocr_correct` or `ocr_incorrect` on the accumulator.
pub fn evaluate_ocr<G, R>(
    accumulator: &mut EvaluationAccumulator,
    ground_truth: &[G],
    recognized: &[R],
) -> OcrScores
where
    G: AsRef<str>,
    R: AsRef<str>,
{
    let mut pairs = 0usize;
    let mut exact_matches = 0usize;
    let mut chars_correct = 0usize;
    let mut chars_total = 0usize;

    for (gt_text, rec_text) in ground_truth.iter().zip(recognized) {
        let gt_text = gt_text.as_ref();
        let rec_text = rec_text.as_ref();
        pairs += 1;

        if gt_text == rec_text {
            exact_matches += 1;
            accumulator.ocr_correct += 1;
        } else {
            accumulator.ocr_incorrect += 1;
        }

        chars_correct += gt_text
            .chars()
            .zip(rec_text.chars())
            .filter(|(g, r)| g == r)
            .count();
        chars_total += gt_text.chars().count().max(rec_text.chars().count());
    }

    OcrScores {
        character_accuracy: ratio(chars_correct, chars_total),
        exact_match_accuracy: ratio(exact_matches, pairs),
    }
}

pub(crate) fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_exact_match() {
        let mut acc = EvaluationAccumulator::new();
        let scores = evaluate_ocr(&mut acc, &["ABC1234"], &["ABC1234"]);

        assert_eq!(scores.character_accuracy, 1.0);
        assert_eq!(scores.exact_match_accuracy, 1.0);
        assert_eq!(acc.ocr_correct, 1);
        assert_eq!(acc.ocr_incorrect, 0);
    }

    #[test]
    fn test_missing_last_character() {
        let mut acc = EvaluationAccumulator::new();
        let scores = evaluate_ocr(&mut acc, &["ABC1234"], &["ABC123"]);

        assert!(close(scores.character_accuracy, 6.0 / 7.0));
        assert_eq!(scores.exact_match_accuracy, 0.0);
        assert_eq!(acc.ocr_incorrect, 1);
    }

    #[test]
    fn test_extra_characters_count_against() {
        let mut acc = EvaluationAccumulator::new();
        let scores = evaluate_ocr(&mut acc, &["AB"], &["ABCD"]);
        assert!(close(scores.character_accuracy, 0.5));
    }

    #[test]
    fn test_one_substitution() {
        let mut acc = EvaluationAccumulator::new();
        let scores = evaluate_ocr(&mut acc, &["ABC1234"], &["ABC1284"]);
        assert!(close(scores.character_accuracy, 6.0 / 7.0));
    }

    #[test]
    fn test_pairs_truncate_to_shorter_list() {
        let mut acc = EvaluationAccumulator::new();
        let scores = evaluate_ocr(&mut acc, &["ABC1234", "XYZ9876", "QQQ1111"], &["ABC1234"]);

        assert_eq!(scores.exact_match_accuracy, 1.0);
        assert_eq!(acc.ocr_correct + acc.ocr_incorrect, 1);
    }

    #[test]
    fn test_empty_inputs() {
        let mut acc = EvaluationAccumulator::new();
        let empty: [&str; 0] = [];
        let scores = evaluate_ocr(&mut acc, &empty, &["ABC1234"]);

        assert_eq!(scores, OcrScores::default());
        assert!(acc.is_empty());
    }

    #[test]
    fn test_empty_strings_pair() {
        let mut acc = EvaluationAccumulator::new();
        let scores = evaluate_ocr(&mut acc, &[""], &[""]);

        assert_eq!(scores.character_accuracy, 0.0);
        assert_eq!(scores.exact_match_accuracy, 1.0);
        assert_eq!(acc.ocr_correct, 1);
    }

    #[test]
    fn test_owned_strings_and_multibyte_text() {
        let mut acc = EvaluationAccumulator::new();
        let gt = vec!["ÇAB123".to_string()];
        let rec = vec!["CAB123".to_string()];
        let scores = evaluate_ocr(&mut acc, &gt, &rec);

        assert!(close(scores.character_accuracy, 5.0 / 6.0));
    }
}
