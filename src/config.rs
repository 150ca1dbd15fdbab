use serde::{Deserialize, Serialize};

use crate::constants::metrics::{
    DEFAULT_K_VALUES, DEFAULT_SCORE_THRESHOLD, DEFAULT_UPPER_RECALL,
};
use crate::constants::splits::{DEFAULT_SEED, PERCENT_SUM_EPSILON};
use crate::errors::TraceError;
use crate::metrics::SupportedMetric;
use crate::splits::StrategySpec;
use crate::utils::TextCleaner;

/// Ordered split percentages and the strategy used for each.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SplitConfig {
    /// Fraction of the full dataset assigned to each split after the first.
    /// The first (train) slice receives `1 - sum(percentages)`.
    pub percentages: Vec<f64>,
    /// Per-split strategies; empty means label-stratified random everywhere.
    pub strategies: Vec<StrategySpec>,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            percentages: vec![0.1, 0.1],
            strategies: Vec::new(),
        }
    }
}

impl SplitConfig {
    /// Validate percentage ranges, their sum, and strategy count.
    pub fn validate(&self) -> Result<(), TraceError> {
        validate_percentages(&self.percentages)?;
        if !self.strategies.is_empty() && self.strategies.len() != self.percentages.len() {
            return Err(TraceError::Configuration(format!(
                "{} split strategies configured for {} split percentages",
                self.strategies.len(),
                self.percentages.len()
            )));
        }
        Ok(())
    }
}

/// Resampling applied to the training slice before feature export.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    /// Positive links are resampled to `rate * count` (1 leaves them as is).
    pub resample_rate: usize,
    /// Resize negatives to the positive count.
    pub balance: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            resample_rate: 1,
            balance: false,
        }
    }
}

impl TrainingConfig {
    /// Reject a zero resample rate.
    pub fn validate(&self) -> Result<(), TraceError> {
        if self.resample_rate == 0 {
            return Err(TraceError::Configuration(
                "resample_rate must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Metric selection and cutoffs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Metrics included in the report.
    pub metrics: Vec<SupportedMetric>,
    /// Cutoffs for MAP@k and precision@k.
    pub k_values: Vec<usize>,
    /// Score at or above which a link counts as predicted for recall.
    pub score_threshold: f64,
    /// Recall target used to pick the operating threshold.
    pub upper_recall: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            metrics: SupportedMetric::ALL.to_vec(),
            k_values: DEFAULT_K_VALUES.to_vec(),
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            upper_recall: DEFAULT_UPPER_RECALL,
        }
    }
}

impl MetricsConfig {
    /// Reject zero cutoffs and thresholds outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), TraceError> {
        if self.k_values.contains(&0) {
            return Err(TraceError::Configuration(
                "metric cutoffs must be at least 1".into(),
            ));
        }
        for (name, value) in [
            ("score_threshold", self.score_threshold),
            ("upper_recall", self.upper_recall),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(TraceError::Configuration(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// Top-level dataset/split/metrics configuration for one job.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TraceConfig {
    /// Seed for every randomized split and resample.
    pub seed: u64,
    /// Restrict generated targets to those with at least one true link.
    pub use_linked_targets_only: bool,
    /// Cleaning steps applied to artifact tokens.
    pub cleaning: TextCleaner,
    /// Split percentages and strategies.
    pub split: SplitConfig,
    /// Train-slice balancing and resampling.
    pub training: TrainingConfig,
    /// Report metrics and their parameters.
    pub metrics: MetricsConfig,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            use_linked_targets_only: false,
            cleaning: TextCleaner::default(),
            split: SplitConfig::default(),
            training: TrainingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl TraceConfig {
    /// Parse a JSON job configuration and validate it.
    pub fn from_json_str(raw: &str) -> Result<Self, TraceError> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|err| TraceError::Configuration(format!("invalid trace config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), TraceError> {
        self.split.validate()?;
        self.training.validate()?;
        self.metrics.validate()
    }
}

/// Check each percentage lies in `[0, 1]` and the list sums to at most one.
pub fn validate_percentages(percentages: &[f64]) -> Result<(), TraceError> {
    for value in percentages {
        validate_percentage(*value)?;
    }
    let sum: f64 = percentages.iter().sum();
    if sum > 1.0 + PERCENT_SUM_EPSILON {
        return Err(TraceError::Configuration(format!(
            "split percentages must sum to at most 1.0, got {sum}"
        )));
    }
    Ok(())
}

/// Check a single split percentage lies in `[0, 1]`.
pub fn validate_percentage(value: f64) -> Result<(), TraceError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(TraceError::Configuration(format!(
            "split percentage must be within [0, 1], got {value}"
        )));
    }
    Ok(())
}
