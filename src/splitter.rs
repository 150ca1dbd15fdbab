//! Chains two-way splits to realize an ordered list of split percentages.

use serde_json::Map;
use tracing::info;

use crate::config::{TraceConfig, validate_percentage, validate_percentages};
use crate::constants::splits::{DEFAULT_SEED, PERCENT_SUM_EPSILON};
use crate::dataset::TraceDataset;
use crate::errors::TraceError;
use crate::hash::derive_seed;
use crate::splits::{RandomSplitStrategy, SplitStrategy, StrategySpec, SupportedSplitStrategy};

/// Splits one dataset into train plus any number of further slices.
pub struct TraceDatasetSplitter<'a> {
    dataset: &'a TraceDataset,
    seed: u64,
}

impl<'a> TraceDatasetSplitter<'a> {
    /// Splitter using the default seed.
    pub fn new(dataset: &'a TraceDataset) -> Self {
        Self {
            dataset,
            seed: DEFAULT_SEED,
        }
    }

    /// Override the seed used for every randomized split.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Two-way split; `percent` sizes the second slice. Defaults to the
    /// label-stratified random strategy.
    pub fn split(
        &self,
        percent: f64,
        strategy: Option<SupportedSplitStrategy>,
    ) -> Result<(TraceDataset, TraceDataset), TraceError> {
        let strategy = strategy
            .unwrap_or(SupportedSplitStrategy::Random)
            .build(&Map::new())?;
        self.split_with(percent, strategy.as_ref())
    }

    /// Two-way split with an explicit strategy instance.
    pub fn split_with(
        &self,
        percent: f64,
        strategy: &dyn SplitStrategy,
    ) -> Result<(TraceDataset, TraceDataset), TraceError> {
        validate_percentage(percent)?;
        Ok(strategy
            .split_pair(self.dataset, percent, self.seed)?
            .into_pair())
    }

    /// Split into `1 + percent_splits.len()` slices. Slice `i + 1` receives
    /// `percent_splits[i]` of the whole dataset and slice 0 the remainder.
    ///
    /// Each step peels its share off the still-unsplit pool, so the requested
    /// fraction is re-normalized against what remains.
    pub fn split_multiple(
        &self,
        percent_splits: &[f64],
        strategies: Option<&[SupportedSplitStrategy]>,
    ) -> Result<Vec<TraceDataset>, TraceError> {
        let built = strategies
            .unwrap_or_default()
            .iter()
            .map(|strategy| strategy.build(&Map::new()))
            .collect::<Result<Vec<_>, _>>()?;
        self.split_multiple_with(percent_splits, &built)
    }

    /// `split_multiple` with strategy instances; an empty list means random everywhere.
    pub fn split_multiple_with(
        &self,
        percent_splits: &[f64],
        strategies: &[Box<dyn SplitStrategy>],
    ) -> Result<Vec<TraceDataset>, TraceError> {
        validate_percentages(percent_splits)?;
        if !strategies.is_empty() && strategies.len() != percent_splits.len() {
            return Err(TraceError::Configuration(format!(
                "{} split strategies supplied for {} split percentages",
                strategies.len(),
                percent_splits.len()
            )));
        }

        let requested: f64 = percent_splits.iter().sum();
        let train_share = snap_to_zero((1.0 - requested).max(0.0));
        let mut pool = self.dataset.clone();
        let mut peeled = Vec::with_capacity(percent_splits.len());
        for (idx, percent) in percent_splits.iter().copied().enumerate() {
            let strategy: &dyn SplitStrategy = match strategies.get(idx) {
                Some(strategy) => strategy.as_ref(),
                None => &RandomSplitStrategy,
            };
            let pool_share = train_share + percent_splits[idx..].iter().sum::<f64>();
            let relative = relative_share(percent, pool_share);
            let (rest, taken) = strategy
                .split_pair(&pool, relative, derive_seed(self.seed, idx as u64))?
                .into_pair();
            info!(
                "[tracelinks:splitter] split {} via {}: {} links ({} positive), {} remain",
                idx + 1,
                strategy.name(),
                taken.len(),
                taken.pos_link_ids().len(),
                rest.len()
            );
            peeled.push(taken);
            pool = rest;
        }

        let mut splits = Vec::with_capacity(peeled.len() + 1);
        splits.push(pool);
        splits.extend(peeled);
        Ok(splits)
    }

    /// Split `dataset` as configured and prepare the train slice for training.
    pub fn split_with_config(
        dataset: &TraceDataset,
        config: &TraceConfig,
    ) -> Result<Vec<TraceDataset>, TraceError> {
        config.validate()?;
        let strategies = config
            .split
            .strategies
            .iter()
            .map(StrategySpec::build)
            .collect::<Result<Vec<_>, _>>()?;
        let splitter = TraceDatasetSplitter::new(dataset).with_seed(config.seed);
        let mut splits = splitter.split_multiple_with(&config.split.percentages, &strategies)?;
        if let Some(train) = splits.first_mut() {
            train.prepare_for_training(&config.training, config.seed)?;
        }
        Ok(splits)
    }
}

/// Share of the remaining pool that `percent` of the whole represents.
///
/// Values within `PERCENT_SUM_EPSILON` of `0` or `1` snap to the bound.
fn relative_share(percent: f64, pool_share: f64) -> f64 {
    if pool_share <= PERCENT_SUM_EPSILON {
        return 0.0;
    }
    let relative = (percent / pool_share).clamp(0.0, 1.0);
    if relative >= 1.0 - PERCENT_SUM_EPSILON {
        1.0
    } else {
        snap_to_zero(relative)
    }
}

fn snap_to_zero(share: f64) -> f64 {
    if share <= PERCENT_SUM_EPSILON { 0.0 } else { share }
}
