//! One-to-one assignment of detected boxes to ground-truth boxes
//!
//! Every strategy partitions its inputs the same way: matched pairs are true
//! positives, ground-truth boxes left over are false negatives and detections
//! left over are false positives.

use common::BoundingBox;
use serde::{Deserialize, Serialize};

/// Default IoU a detection needs to count as a hit
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.5;

/// An accepted ground-truth/detection pair, by index into the inputs
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoxMatch {
    pub ground_truth: usize,
    pub detection: usize,
    pub iou: f32,
}

/// Partition produced by a [`BoxMatcher`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchOutcome {
    pub matches: Vec<BoxMatch>,
    pub unmatched_ground_truth: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

impl MatchOutcome {
    fn from_matches(mut matches: Vec<BoxMatch>, ground_truth: usize, detections: usize) -> Self {
        matches.sort_by_key(|m| m.ground_truth);

        let mut gt_used = vec![false; ground_truth];
        let mut det_used = vec![false; detections];
        for m in &matches {
            gt_used[m.ground_truth] = true;
            det_used[m.detection] = true;
        }

        Self {
            matches,
            unmatched_ground_truth: unused_indices(&gt_used),
            unmatched_detections: unused_indices(&det_used),
        }
    }

    pub fn true_positives(&self) -> usize {
        self.matches.len()
    }

    pub fn false_positives(&self) -> usize {
        self.unmatched_detections.len()
    }

    pub fn false_negatives(&self) -> usize {
        self.unmatched_ground_truth.len()
    }
}

fn unused_indices(used: &[bool]) -> Vec<usize> {
    used.iter()
        .enumerate()
        .filter(|(_, used)| !**used)
        .map(|(i, _)| i)
        .collect()
}

/// Strategy for pairing detections with ground truth
pub trait BoxMatcher: Send + Sync {
    fn name(&self) -> &'static str;

    /// Pair boxes whose IoU reaches `iou_threshold`, each box used at most once
    fn match_boxes(
        &self,
        ground_truth: &[BoundingBox],
        detections: &[BoundingBox],
        iou_threshold: f32,
    ) -> MatchOutcome;
}

/// Matcher selection, as exposed on the command line and in config files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatcherKind {
    #[default]
    Greedy,
    Optimal,
}

impl MatcherKind {
    pub fn build(self) -> Box<dyn BoxMatcher> {
        match self {
            MatcherKind::Greedy => Box::new(GreedyMatcher),
            MatcherKind::Optimal => Box::new(OptimalMatcher),
        }
    }
}

impl std::str::FromStr for MatcherKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "greedy" => Ok(MatcherKind::Greedy),
            "optimal" | "hungarian" => Ok(MatcherKind::Optimal),
            other => Err(anyhow::anyhow!("unknown matcher '{}'", other)),
        }
    }
}

// ============================================================================
// Greedy
// ============================================================================

/// Walks ground truth in input order and takes the best remaining detection
///
/// Not globally optimal: an early ground-truth box can take a detection that a
/// later one needed more.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyMatcher;

impl BoxMatcher for GreedyMatcher {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn match_boxes(
        &self,
        ground_truth: &[BoundingBox],
        detections: &[BoundingBox],
        iou_threshold: f32,
    ) -> MatchOutcome {
        let mut available = vec![true; detections.len()];
        let mut matches = Vec::new();

        for (gt_idx, gt_box) in ground_truth.iter().enumerate() {
            let mut best: Option<(usize, f32)> = None;

            for (det_idx, det_box) in detections.iter().enumerate() {
                if !available[det_idx] {
                    continue;
                }
                let iou = gt_box.iou(det_box);
                // strict comparison keeps the earliest detection on ties
                if iou > best.map_or(0.0, |(_, best_iou)| best_iou) {
                    best = Some((det_idx, iou));
                }
            }

            if let Some((det_idx, iou)) = best {
                if iou >= iou_threshold {
                    available[det_idx] = false;
                    matches.push(BoxMatch {
                        ground_truth: gt_idx,
                        detection: det_idx,
                        iou,
                    });
                }
            }
        }

        MatchOutcome::from_matches(matches, ground_truth.len(), detections.len())
    }
}

// ============================================================================
// Optimal (Hungarian)
// ============================================================================

/// Maximum-weight assignment over pairs at or above the threshold
///
/// Maximizes the summed IoU of accepted pairs, which also maximizes the number
/// of true positives whenever a greedy pass would strand a ground-truth box.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimalMatcher;

impl BoxMatcher for OptimalMatcher {
    fn name(&self) -> &'static str {
        "optimal"
    }

    fn match_boxes(
        &self,
        ground_truth: &[BoundingBox],
        detections: &[BoundingBox],
        iou_threshold: f32,
    ) -> MatchOutcome {
        let size = ground_truth.len().max(detections.len());
        if ground_truth.is_empty() || detections.is_empty() {
            return MatchOutcome::from_matches(Vec::new(), ground_truth.len(), detections.len());
        }

        let accepted = |gt: usize, det: usize| -> Option<f32> {
            let iou = ground_truth[gt].iou(&detections[det]);
            (iou > 0.0 && iou >= iou_threshold).then_some(iou)
        };

        // Square cost matrix, padded with zero-cost dummy rows/columns
        let mut cost = vec![vec![0.0f64; size]; size];
        for (gt, row) in cost.iter_mut().enumerate().take(ground_truth.len()) {
            for (det, cell) in row.iter_mut().enumerate().take(detections.len()) {
                if let Some(iou) = accepted(gt, det) {
                    *cell = -(iou as f64);
                }
            }
        }

        let matches = hungarian(&cost)
            .into_iter()
            .filter(|&(gt, det)| gt < ground_truth.len() && det < detections.len())
            .filter_map(|(gt, det)| {
                accepted(gt, det).map(|iou| BoxMatch {
                    ground_truth: gt,
                    detection: det,
                    iou,
                })
            })
            .collect();

        MatchOutcome::from_matches(matches, ground_truth.len(), detections.len())
    }
}

/// Minimum-cost perfect assignment on a square matrix, as `(row, column)` pairs
fn hungarian(cost: &[Vec<f64>]) -> Vec<(usize, usize)> {
    let n = cost.len();
    if n == 0 {
        return Vec::new();
    }

    // 1-based potentials; column 0 is a virtual start node
    let mut u = vec![0.0f64; n + 1];
    let mut v = vec![0.0f64; n + 1];
    let mut row_of = vec![0usize; n + 1];
    let mut way = vec![0usize; n + 1];

    for row in 1..=n {
        row_of[0] = row;
        let mut col0 = 0;
        let mut min_slack = vec![f64::INFINITY; n + 1];
        let mut used = vec![false; n + 1];

        loop {
            used[col0] = true;
            let row0 = row_of[col0];
            let mut delta = f64::INFINITY;
            let mut col1 = 0;

            for col in 1..=n {
                if used[col] {
                    continue;
                }
                let slack = cost[row0 - 1][col - 1] - u[row0] - v[col];
                if slack < min_slack[col] {
                    min_slack[col] = slack;
                    way[col] = col0;
                }
                if min_slack[col] < delta {
                    delta = min_slack[col];
                    col1 = col;
                }
            }

            for col in 0..=n {
                if used[col] {
                    u[row_of[col]] += delta;
                    v[col] -= delta;
                } else {
                    min_slack[col] -= delta;
                }
            }

            col0 = col1;
            if row_of[col0] == 0 {
                break;
            }
        }

        loop {
            let prev = way[col0];
            row_of[col0] = row_of[prev];
            col0 = prev;
            if col0 == 0 {
                break;
            }
        }
    }

    (1..=n)
        .filter(|&col| row_of[col] != 0)
        .map(|col| (row_of[col] - 1, col - 1))
        .collect()
}
