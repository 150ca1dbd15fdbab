//! Ranking and classification metrics over predicted link scores.
//!
//! Per-query kernels take `(labels, preds)` for one source and return `NaN`
//! when the query has no true links; `TraceMatrix` skips those queries when
//! averaging. Ranking uses a stable descending sort, so tied scores keep
//! their input order.
//!
//! | Metric            | Scope     | Definition                                         |
//! |-------------------|-----------|----------------------------------------------------|
//! | MAP               | per query | mean of precision at each true-link rank           |
//! | MAP@k             | per query | MAP over the top-k ranked candidates               |
//! | Precision@k       | per query | true links in top k, divided by k                  |
//! | Recall            | per query | true links scored >= threshold / true links        |
//! | Upper recall      | global    | highest threshold whose recall reaches the target  |
//! | F1 / F2           | global    | max over every threshold of the PR curve           |

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::config::MetricsConfig;
use crate::constants::metrics::{
    F1_KEY, F2_KEY, MAP_AT_K_PREFIX, MAP_KEY, PRECISION_AT_K_PREFIX, RECALL_KEY,
    UPPER_RECALL_PRECISION_KEY, UPPER_RECALL_THRESHOLD_KEY,
};
use crate::errors::TraceError;
use crate::trace_matrix::{TraceMatrix, rank_by_score};
use crate::types::MetricReport;

/// Tagged registry of report metrics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportedMetric {
    /// Mean average precision over every query.
    Map,
    /// MAP over each query's top `k` candidates, for every configured `k`.
    MapAtK,
    /// Precision of each query's top `k` candidates.
    PrecisionAtK,
    /// Per-query recall at the score threshold.
    Recall,
    /// Highest global threshold reaching the target recall.
    UpperRecallThreshold,
    /// Max F1 and F2 over the global precision-recall curve.
    FScores,
}

impl SupportedMetric {
    /// Every registered metric, in report order.
    pub const ALL: [SupportedMetric; 6] = [
        SupportedMetric::Map,
        SupportedMetric::MapAtK,
        SupportedMetric::PrecisionAtK,
        SupportedMetric::Recall,
        SupportedMetric::UpperRecallThreshold,
        SupportedMetric::FScores,
    ];

    /// Registry name, as accepted by `FromStr`.
    pub fn name(self) -> &'static str {
        match self {
            SupportedMetric::Map => "map",
            SupportedMetric::MapAtK => "map_at_k",
            SupportedMetric::PrecisionAtK => "precision_at_k",
            SupportedMetric::Recall => "recall",
            SupportedMetric::UpperRecallThreshold => "upper_recall_threshold",
            SupportedMetric::FScores => "f_scores",
        }
    }
}

impl fmt::Display for SupportedMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SupportedMetric {
    type Err = TraceError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|metric| metric.name() == normalized)
            .ok_or_else(|| TraceError::Configuration(format!("unknown metric '{raw}'")))
    }
}

/// Max F1 and F2 over all thresholds of a precision-recall curve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FScores {
    /// Best F1.
    pub f1: f64,
    /// Best F2.
    pub f2: f64,
}

/// Average precision of one query: precision at every true-link rank,
/// summed and divided by the number of true links. `NaN` without true links.
pub fn average_precision(labels: &[u8], preds: &[f64]) -> f64 {
    let total_pos = labels.iter().filter(|&&label| label == 1).count();
    if total_pos == 0 {
        return f64::NAN;
    }
    let mut hits = 0usize;
    let mut sum = 0.0;
    for (rank, (label, _)) in rank_by_score(labels, preds).into_iter().enumerate() {
        if label == 1 {
            hits += 1;
            sum += hits as f64 / (rank + 1) as f64;
        }
    }
    sum / total_pos as f64
}

/// True links among the top `k` candidates divided by `k`. `NaN` without true links.
pub fn precision_at_k(labels: &[u8], preds: &[f64], k: usize) -> f64 {
    if k == 0 || !labels.contains(&1) {
        return f64::NAN;
    }
    let hits = rank_by_score(labels, preds)
        .into_iter()
        .take(k)
        .filter(|(label, _)| *label == 1)
        .count();
    hits as f64 / k as f64
}

/// Share of true links scored at or above `threshold`. `NaN` without true links.
pub fn recall_at_threshold(labels: &[u8], preds: &[f64], threshold: f64) -> f64 {
    let total_pos = labels.iter().filter(|&&label| label == 1).count();
    if total_pos == 0 {
        return f64::NAN;
    }
    let found = labels
        .iter()
        .zip(preds)
        .filter(|(label, pred)| **label == 1 && **pred >= threshold)
        .count();
    found as f64 / total_pos as f64
}

/// One point of the precision-recall curve.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CurvePoint {
    /// Lowest score counted as a predicted link at this point.
    pub threshold: f64,
    /// True links over predicted links at or above `threshold`.
    pub precision: f64,
    /// True links at or above `threshold` over all true links.
    pub recall: f64,
}

/// Precision-recall points at every distinct score, highest threshold first.
pub fn precision_recall_curve(labels: &[u8], preds: &[f64]) -> Result<Vec<CurvePoint>, TraceError> {
    if labels.len() != preds.len() {
        return Err(TraceError::Configuration(format!(
            "{} labels supplied for {} predictions",
            labels.len(),
            preds.len()
        )));
    }
    if let Some(idx) = preds.iter().position(|pred| pred.is_nan()) {
        return Err(TraceError::Configuration(format!("prediction {idx} is NaN")));
    }
    let total_pos = labels.iter().filter(|&&label| label == 1).count();
    if total_pos == 0 {
        return Err(TraceError::UndefinedMetric {
            metric: "precision_recall_curve".into(),
            reason: "no true links among the labels".into(),
        });
    }
    let ranked = rank_by_score(labels, preds);
    let mut points = Vec::new();
    let mut true_pos = 0usize;
    for (idx, (label, score)) in ranked.iter().enumerate() {
        if *label == 1 {
            true_pos += 1;
        }
        let group_ends = ranked
            .get(idx + 1)
            .is_none_or(|(_, next_score)| next_score != score);
        if group_ends {
            points.push(CurvePoint {
                threshold: *score,
                precision: true_pos as f64 / (idx + 1) as f64,
                recall: true_pos as f64 / total_pos as f64,
            });
        }
    }
    Ok(points)
}

/// `(1 + beta^2) * P * R / (beta^2 * P + R)`, with `0` when the denominator is `0`.
pub fn f_beta(precision: f64, recall: f64, beta: f64) -> f64 {
    let beta_sq = beta * beta;
    let denominator = beta_sq * precision + recall;
    if denominator == 0.0 {
        return 0.0;
    }
    (1.0 + beta_sq) * precision * recall / denominator
}

/// Max F1 and F2 across all thresholds of the flat `(labels, preds)` arrays.
pub fn max_f_scores(labels: &[u8], preds: &[f64]) -> Result<FScores, TraceError> {
    let curve = precision_recall_curve(labels, preds)?;
    let mut best = FScores { f1: 0.0, f2: 0.0 };
    for point in curve {
        best.f1 = best.f1.max(f_beta(point.precision, point.recall, 1.0));
        best.f2 = best.f2.max(f_beta(point.precision, point.recall, 2.0));
    }
    Ok(best)
}

/// Highest threshold whose global recall reaches `target`, with the precision there.
pub fn threshold_for_recall(
    labels: &[u8],
    preds: &[f64],
    target: f64,
) -> Result<CurvePoint, TraceError> {
    let curve = precision_recall_curve(labels, preds)?;
    curve
        .iter()
        .copied()
        .find(|point| point.recall + f64::EPSILON >= target)
        .or_else(|| curve.last().copied())
        .ok_or_else(|| TraceError::UndefinedMetric {
            metric: UPPER_RECALL_THRESHOLD_KEY.into(),
            reason: "empty precision-recall curve".into(),
        })
}

/// Mean average precision over the matrix's queries.
pub fn mean_average_precision(matrix: &TraceMatrix) -> Result<f64, TraceError> {
    matrix.calculate_query_metric(average_precision)
}

/// `{"map@k": value}` for every cutoff.
///
/// A query with true links but none in its top `k` contributes `0`.
pub fn map_at_k(matrix: &TraceMatrix, k_values: &[usize]) -> Result<MetricReport, TraceError> {
    let mut report = MetricReport::new();
    for &k in k_values {
        let value = matrix.calculate_query_metric_at_k(average_precision, k)?;
        report.insert(format!("{MAP_AT_K_PREFIX}{k}"), value);
    }
    Ok(report)
}

/// Build the configured metric report for scored links.
pub fn compute_metrics(
    matrix: &TraceMatrix,
    config: &MetricsConfig,
) -> Result<MetricReport, TraceError> {
    config.validate()?;
    let mut report = MetricReport::new();
    for metric in &config.metrics {
        match metric {
            SupportedMetric::Map => {
                report.insert(MAP_KEY.into(), mean_average_precision(matrix)?);
            }
            SupportedMetric::MapAtK => {
                report.extend(map_at_k(matrix, &config.k_values)?);
            }
            SupportedMetric::PrecisionAtK => {
                for &k in &config.k_values {
                    let value = matrix
                        .calculate_query_metric(|labels, preds| precision_at_k(labels, preds, k))?;
                    report.insert(format!("{PRECISION_AT_K_PREFIX}{k}"), value);
                }
            }
            SupportedMetric::Recall => {
                let threshold = config.score_threshold;
                let value = matrix.calculate_query_metric(|labels, preds| {
                    recall_at_threshold(labels, preds, threshold)
                })?;
                report.insert(RECALL_KEY.into(), value);
            }
            SupportedMetric::UpperRecallThreshold => {
                let (labels, preds) = matrix.flat_labels_and_preds()?;
                let point = threshold_for_recall(&labels, &preds, config.upper_recall)?;
                report.insert(UPPER_RECALL_THRESHOLD_KEY.into(), point.threshold);
                report.insert(UPPER_RECALL_PRECISION_KEY.into(), point.precision);
            }
            SupportedMetric::FScores => {
                let (labels, preds) = matrix.flat_labels_and_preds()?;
                let scores = max_f_scores(&labels, &preds)?;
                report.insert(F1_KEY.into(), scores.f1);
                report.insert(F2_KEY.into(), scores.f2);
            }
        }
        debug!("[tracelinks:metrics] computed {metric}");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::TraceLink;
    use crate::test_support::link;

    fn single_query(labels: &[u8], preds: &[f64]) -> TraceMatrix {
        let links: Vec<TraceLink> = labels
            .iter()
            .enumerate()
            .map(|(idx, label)| link("s1", &format!("t{idx}"), *label == 1))
            .collect();
        TraceMatrix::new(&links, Some(preds)).unwrap()
    }

    #[test]
    fn average_precision_matches_reference_values() {
        assert!((average_precision(&[1, 0, 1], &[0.9, 0.8, 0.7]) - 5.0 / 6.0).abs() < 1e-9);
        assert!((average_precision(&[0, 1, 1], &[0.9, 0.8, 0.7]) - 7.0 / 12.0).abs() < 1e-9);
        assert!(average_precision(&[0, 0], &[0.3, 0.2]).is_nan());
    }

    #[test]
    fn map_at_k_truncates_ranked_queries() {
        // Ranked by score the labels read [1, 1, 0].
        let matrix = single_query(&[1, 0, 1], &[0.9, 0.6, 0.7]);
        let report = map_at_k(&matrix, &[1, 2, 3]).unwrap();
        assert_eq!(report["map@1"], 1.0);
        assert_eq!(report["map@2"], 1.0);
        assert_eq!(report["map@3"], 1.0);
    }

    #[test]
    fn map_at_k_uses_score_order_not_input_order() {
        // Ranked by score the labels read [0, 1, 1].
        let matrix = single_query(&[1, 0, 1], &[0.6, 0.9, 0.7]);
        let report = map_at_k(&matrix, &[2, 3]).unwrap();
        assert!((report["map@2"] - 0.5).abs() < 1e-9);
        assert!((report["map@3"] - 7.0 / 12.0).abs() < 1e-9);
        // The top-1 candidate is false, so the query scores zero.
        assert_eq!(map_at_k(&matrix, &[1]).unwrap()["map@1"], 0.0);
    }

    #[test]
    fn map_at_k_averages_hits_and_misses() {
        let links = vec![
            link("r0", "c0", true),
            link("r0", "c1", false),
            link("r1", "c0", false),
            link("r1", "c1", true),
        ];
        // r0 ranks its true link first, r1 ranks it second.
        let matrix = TraceMatrix::new(&links, Some(&[0.9, 0.1, 0.8, 0.7])).unwrap();
        let report = map_at_k(&matrix, &[1, 2]).unwrap();
        assert!((report["map@1"] - 0.5).abs() < 1e-9);
        assert!((report["map@2"] - 0.75).abs() < 1e-9);
    }

    #[test]
    fn map_at_k_with_every_top_candidate_wrong_is_zero() {
        let links = vec![
            link("r0", "c0", true),
            link("r0", "c1", false),
            link("r1", "c0", false),
            link("r1", "c1", true),
        ];
        let matrix = TraceMatrix::new(&links, Some(&[0.2, 0.9, 0.8, 0.7])).unwrap();
        assert_eq!(map_at_k(&matrix, &[1]).unwrap()["map@1"], 0.0);
    }

    #[test]
    fn curve_rejects_nan_predictions() {
        let labels: Vec<u8> = (0..64).map(|idx| u8::from(idx % 4 == 0)).collect();
        let preds: Vec<f64> = (0..64)
            .map(|idx| if idx % 5 == 0 { f64::NAN } else { idx as f64 / 64.0 })
            .collect();
        assert!(matches!(
            max_f_scores(&labels, &preds),
            Err(TraceError::Configuration(_))
        ));
    }

    #[test]
    fn ties_are_ranked_in_input_order() {
        assert_eq!(average_precision(&[0, 1], &[0.5, 0.5]), 0.5);
        assert_eq!(average_precision(&[1, 0], &[0.5, 0.5]), 1.0);
    }

    #[test]
    fn map_skips_queries_without_true_links() {
        let links = vec![
            link("s1", "t1", true),
            link("s1", "t2", false),
            link("s2", "t1", false),
            link("s2", "t2", false),
        ];
        let matrix = TraceMatrix::new(&links, Some(&[0.2, 0.8, 0.5, 0.4])).unwrap();
        assert!((mean_average_precision(&matrix).unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn precision_and_recall_kernels() {
        assert!((precision_at_k(&[1, 0, 1, 0], &[0.9, 0.8, 0.7, 0.1], 2) - 0.5).abs() < 1e-9);
        assert!((precision_at_k(&[1], &[0.9], 3) - 1.0 / 3.0).abs() < 1e-9);
        assert!(precision_at_k(&[0, 0], &[0.9, 0.1], 1).is_nan());
        assert!((recall_at_threshold(&[1, 1, 0], &[0.9, 0.4, 0.8], 0.5) - 0.5).abs() < 1e-9);
        assert!(recall_at_threshold(&[0], &[0.9], 0.5).is_nan());
    }

    #[test]
    fn perfect_separation_maxes_f_scores() {
        let scores = max_f_scores(&[1, 0], &[0.9, 0.1]).unwrap();
        assert_eq!(scores.f1, 1.0);
        assert_eq!(scores.f2, 1.0);
    }

    #[test]
    fn f_scores_sweep_every_threshold() {
        // Thresholds 0.9, 0.8, 0.7: (P, R) = (1, .5), (.5, .5), (.667, 1).
        let scores = max_f_scores(&[1, 0, 1], &[0.9, 0.8, 0.7]).unwrap();
        assert!((scores.f1 - 0.8).abs() < 1e-9);
        assert!((scores.f2 - 10.0 / 11.0).abs() < 1e-9);
        assert_eq!(f_beta(0.0, 0.0, 1.0), 0.0);
    }

    #[test]
    fn f_scores_require_true_links() {
        assert!(matches!(
            max_f_scores(&[0, 0], &[0.4, 0.3]),
            Err(TraceError::UndefinedMetric { .. })
        ));
        assert!(matches!(
            max_f_scores(&[1], &[0.4, 0.3]),
            Err(TraceError::Configuration(_))
        ));
    }

    #[test]
    fn upper_recall_threshold_picks_highest_qualifying_score() {
        let point = threshold_for_recall(&[1, 0, 1, 1], &[0.9, 0.8, 0.6, 0.2], 0.6).unwrap();
        assert_eq!(point.threshold, 0.6);
        assert!((point.precision - 2.0 / 3.0).abs() < 1e-9);
        let full = threshold_for_recall(&[1, 0, 1, 1], &[0.9, 0.8, 0.6, 0.2], 0.95).unwrap();
        assert_eq!(full.threshold, 0.2);
    }

    #[test]
    fn curve_groups_tied_scores() {
        let curve = precision_recall_curve(&[1, 0, 1], &[0.7, 0.7, 0.2]).unwrap();
        assert_eq!(curve.len(), 2);
        assert_eq!(curve[0].threshold, 0.7);
        assert!((curve[0].precision - 0.5).abs() < 1e-9);
    }

    #[test]
    fn compute_metrics_builds_flat_report() {
        let links = vec![
            link("s1", "t1", true),
            link("s1", "t2", false),
            link("s2", "t1", false),
            link("s2", "t2", true),
        ];
        let matrix = TraceMatrix::new(&links, Some(&[0.9, 0.1, 0.3, 0.8])).unwrap();
        let report = compute_metrics(&matrix, &MetricsConfig::default()).unwrap();
        for key in [
            "map", "map@1", "map@2", "map@3", "precision@1", "precision@3", "recall",
            "upper_recall_threshold", "precision@upper_recall", "f1", "f2",
        ] {
            assert!(report.contains_key(key), "missing {key}");
        }
        assert_eq!(report["map"], 1.0);
        assert_eq!(report["precision@1"], 1.0);
        assert!((report["precision@3"] - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(report["recall"], 1.0);
        assert_eq!(report["upper_recall_threshold"], 0.8);
        assert_eq!(report["f1"], 1.0);
    }

    #[test]
    fn compute_metrics_honors_selection() {
        let matrix = single_query(&[1, 0], &[0.9, 0.1]);
        let config = MetricsConfig {
            metrics: vec![SupportedMetric::Map],
            ..MetricsConfig::default()
        };
        let report = compute_metrics(&matrix, &config).unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!("F_Scores".parse::<SupportedMetric>().unwrap(), SupportedMetric::FScores);
        assert!("ndcg".parse::<SupportedMetric>().is_err());
    }
}
