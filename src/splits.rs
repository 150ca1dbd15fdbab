//! Two-way split strategies and their name registry.

use indexmap::IndexSet;
use rand::seq::SliceRandom;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::config::validate_percentage;
use crate::constants::splits::{
    DEFAULT_COMBINATION_SOURCES, STRATEGY_COMBINATION, STRATEGY_RANDOM, STRATEGY_REMAINDER,
    STRATEGY_SOURCE_RANDOM,
};
use crate::dataset::TraceDataset;
use crate::errors::TraceError;
use crate::rng::DeterministicRng;
use crate::types::{ArtifactId, LinkId};

/// Side of a two-way split.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SliceNum {
    /// The remainder side (`1 - percentage`).
    First,
    /// The side sized by `second_split_percentage`.
    Second,
}

impl TryFrom<u8> for SliceNum {
    type Error = TraceError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(SliceNum::First),
            2 => Ok(SliceNum::Second),
            other => Err(TraceError::Configuration(format!(
                "slice number must be 1 or 2, got {other}"
            ))),
        }
    }
}

/// Both sides of one split. `second` is `None` when a strategy performs no split.
#[derive(Clone, Debug)]
pub struct TwoWaySplit {
    /// Remainder side.
    pub first: TraceDataset,
    /// Side sized by the requested percentage.
    pub second: Option<TraceDataset>,
}

impl TwoWaySplit {
    /// Take one side.
    pub fn slice(self, slice_num: SliceNum) -> Option<TraceDataset> {
        match slice_num {
            SliceNum::First => Some(self.first),
            SliceNum::Second => self.second,
        }
    }

    /// Both sides, with a missing second side as an empty dataset.
    pub fn into_pair(self) -> (TraceDataset, TraceDataset) {
        (self.first, self.second.unwrap_or_default())
    }
}

/// Policy dividing a dataset's links into two disjoint datasets.
pub trait SplitStrategy: Send + Sync {
    /// Registry name of the strategy.
    fn name(&self) -> &'static str;

    /// Compute both sides; `second_split_percentage` sizes the second side.
    fn split_pair(
        &self,
        dataset: &TraceDataset,
        second_split_percentage: f64,
        seed: u64,
    ) -> Result<TwoWaySplit, TraceError>;

    /// Materialize one side of the split.
    fn create_split(
        &self,
        dataset: &TraceDataset,
        second_split_percentage: f64,
        slice_num: SliceNum,
        seed: u64,
    ) -> Result<Option<TraceDataset>, TraceError> {
        Ok(self
            .split_pair(dataset, second_split_percentage, seed)?
            .slice(slice_num))
    }
}

/// Label-stratified random split: positives and negatives are split separately
/// by the same percentage.
#[derive(Clone, Copy, Debug, Default)]
pub struct RandomSplitStrategy;

impl SplitStrategy for RandomSplitStrategy {
    fn name(&self) -> &'static str {
        STRATEGY_RANDOM
    }

    fn split_pair(
        &self,
        dataset: &TraceDataset,
        second_split_percentage: f64,
        seed: u64,
    ) -> Result<TwoWaySplit, TraceError> {
        validate_percentage(second_split_percentage)?;
        let mut rng = DeterministicRng::new(seed);
        let (first, second) = stratified_split(dataset, second_split_percentage, &mut rng);
        Ok(TwoWaySplit {
            first,
            second: Some(second),
        })
    }
}

/// Source-stratified split: whole queries go to one side.
#[derive(Clone, Copy, Debug, Default)]
pub struct SourceRandomSplitStrategy;

impl SplitStrategy for SourceRandomSplitStrategy {
    fn name(&self) -> &'static str {
        STRATEGY_SOURCE_RANDOM
    }

    fn split_pair(
        &self,
        dataset: &TraceDataset,
        second_split_percentage: f64,
        seed: u64,
    ) -> Result<TwoWaySplit, TraceError> {
        validate_percentage(second_split_percentage)?;
        let mut sources = dataset.source_ids();
        let total = sources.len();
        let wanted = split_count(total, second_split_percentage);
        if second_split_percentage > 0.0 && wanted == 0 {
            return Err(TraceError::SplitFeasibility {
                percentage: second_split_percentage,
                reason: format!("{total} sources cannot fill a whole-source second slice"),
            });
        }
        if second_split_percentage < 1.0 && total > 0 && wanted == total {
            return Err(TraceError::SplitFeasibility {
                percentage: second_split_percentage,
                reason: format!("all {total} sources would land in the second slice"),
            });
        }
        sources.shuffle(&mut DeterministicRng::new(seed));
        let chosen: HashSet<&ArtifactId> = sources[..wanted].iter().collect();
        let (first, second) = partition_by_source(dataset, &chosen);
        debug!(
            "[tracelinks:split] source_random sources={}/{} links={}/{}",
            wanted,
            total,
            second.len(),
            dataset.len()
        );
        Ok(TwoWaySplit {
            first,
            second: Some(second),
        })
    }
}

/// No split: the whole dataset stays on the first side.
#[derive(Clone, Copy, Debug, Default)]
pub struct RemainderSplitStrategy;

impl SplitStrategy for RemainderSplitStrategy {
    fn name(&self) -> &'static str {
        STRATEGY_REMAINDER
    }

    fn split_pair(
        &self,
        dataset: &TraceDataset,
        _second_split_percentage: f64,
        _seed: u64,
    ) -> Result<TwoWaySplit, TraceError> {
        Ok(TwoWaySplit {
            first: dataset.clone(),
            second: None,
        })
    }
}

/// Reserves `n_sources` whole sources for the second side, then fills the rest
/// of the requested share with a label-stratified random split.
#[derive(Clone, Copy, Debug)]
pub struct CombinationSplitStrategy {
    n_sources: usize,
}

impl Default for CombinationSplitStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_COMBINATION_SOURCES)
    }
}

impl CombinationSplitStrategy {
    /// Strategy reserving `n_sources` whole sources.
    pub fn new(n_sources: usize) -> Self {
        Self { n_sources }
    }
}

impl SplitStrategy for CombinationSplitStrategy {
    fn name(&self) -> &'static str {
        STRATEGY_COMBINATION
    }

    fn split_pair(
        &self,
        dataset: &TraceDataset,
        second_split_percentage: f64,
        seed: u64,
    ) -> Result<TwoWaySplit, TraceError> {
        validate_percentage(second_split_percentage)?;
        let mut sources = dataset.source_ids();
        let total = sources.len();
        let leaves_first_empty =
            total > 0 && self.n_sources == total && second_split_percentage < 1.0;
        if self.n_sources > total || leaves_first_empty {
            return Err(TraceError::SplitFeasibility {
                percentage: second_split_percentage,
                reason: format!("cannot reserve {} of {total} sources", self.n_sources),
            });
        }
        let mut rng = DeterministicRng::new(seed);
        sources.shuffle(&mut rng);
        let reserved_sources: HashSet<&ArtifactId> = sources[..self.n_sources].iter().collect();
        let (pool, reserved) = partition_by_source(dataset, &reserved_sources);

        let target = split_count(dataset.len(), second_split_percentage);
        let needed = target.saturating_sub(reserved.len());
        let pool_percentage = if pool.is_empty() {
            0.0
        } else {
            (needed as f64 / pool.len() as f64).min(1.0)
        };
        let (first, pool_second) = stratified_split(&pool, pool_percentage, &mut rng);
        debug!(
            "[tracelinks:split] combination reserved_sources={} reserved_links={} target={} pool_share={:.4}",
            self.n_sources,
            reserved.len(),
            target,
            pool_percentage
        );
        let second = TraceDataset::union([&reserved, &pool_second]);
        Ok(TwoWaySplit {
            first,
            second: Some(second),
        })
    }
}

/// Tagged registry of split strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportedSplitStrategy {
    /// Label-stratified random split.
    Random,
    /// Whole sources land on one side.
    SourceRandom,
    /// Keeps everything on the first side.
    Remainder,
    /// Reserved sources plus a stratified random fill.
    Combination,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArgs {}

#[derive(Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CombinationArgs {
    n_sources: usize,
}

impl Default for CombinationArgs {
    fn default() -> Self {
        Self {
            n_sources: DEFAULT_COMBINATION_SOURCES,
        }
    }
}

impl SupportedSplitStrategy {
    /// Every registered strategy.
    pub const ALL: [SupportedSplitStrategy; 4] = [
        SupportedSplitStrategy::Random,
        SupportedSplitStrategy::SourceRandom,
        SupportedSplitStrategy::Remainder,
        SupportedSplitStrategy::Combination,
    ];

    /// Registry name, as accepted by `FromStr`.
    pub fn name(self) -> &'static str {
        match self {
            SupportedSplitStrategy::Random => STRATEGY_RANDOM,
            SupportedSplitStrategy::SourceRandom => STRATEGY_SOURCE_RANDOM,
            SupportedSplitStrategy::Remainder => STRATEGY_REMAINDER,
            SupportedSplitStrategy::Combination => STRATEGY_COMBINATION,
        }
    }

    /// Instantiate the strategy; unknown argument keys are a configuration error.
    pub fn build(self, args: &Map<String, Value>) -> Result<Box<dyn SplitStrategy>, TraceError> {
        Ok(match self {
            SupportedSplitStrategy::Random => {
                parse_args::<NoArgs>(self, args)?;
                Box::new(RandomSplitStrategy)
            }
            SupportedSplitStrategy::SourceRandom => {
                parse_args::<NoArgs>(self, args)?;
                Box::new(SourceRandomSplitStrategy)
            }
            SupportedSplitStrategy::Remainder => {
                parse_args::<NoArgs>(self, args)?;
                Box::new(RemainderSplitStrategy)
            }
            SupportedSplitStrategy::Combination => {
                let parsed = parse_args::<CombinationArgs>(self, args)?;
                Box::new(CombinationSplitStrategy::new(parsed.n_sources))
            }
        })
    }
}

impl fmt::Display for SupportedSplitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SupportedSplitStrategy {
    type Err = TraceError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|strategy| strategy.name() == normalized)
            .ok_or_else(|| TraceError::Configuration(format!("unknown split strategy '{raw}'")))
    }
}

/// A strategy name plus its keyword arguments, as found in job configs:
/// `{"strategy": "combination", "n_sources": 3}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategySpec {
    /// Registered strategy name.
    pub strategy: SupportedSplitStrategy,
    /// Remaining keys, passed to the strategy as arguments.
    #[serde(flatten)]
    pub args: Map<String, Value>,
}

impl StrategySpec {
    /// Instantiate the named strategy with its arguments.
    pub fn build(&self) -> Result<Box<dyn SplitStrategy>, TraceError> {
        self.strategy.build(&self.args)
    }
}

impl From<SupportedSplitStrategy> for StrategySpec {
    fn from(strategy: SupportedSplitStrategy) -> Self {
        Self {
            strategy,
            args: Map::new(),
        }
    }
}

fn parse_args<T: DeserializeOwned>(
    strategy: SupportedSplitStrategy,
    args: &Map<String, Value>,
) -> Result<T, TraceError> {
    serde_json::from_value(Value::Object(args.clone())).map_err(|err| {
        TraceError::Configuration(format!(
            "invalid arguments for split strategy '{strategy}': {err}"
        ))
    })
}

/// Round `total * percentage` to the nearest count.
pub fn split_count(total: usize, percentage: f64) -> usize {
    ((total as f64 * percentage).round() as usize).min(total)
}

/// Shuffle unique ids and cut off the rounded share for the second side.
fn split_ids(
    ids: &[LinkId],
    percentage: f64,
    rng: &mut DeterministicRng,
) -> (Vec<LinkId>, Vec<LinkId>) {
    let mut unique: Vec<LinkId> = ids
        .iter()
        .copied()
        .collect::<IndexSet<_>>()
        .into_iter()
        .collect();
    unique.shuffle(rng);
    let second = unique.split_off(unique.len() - split_count(unique.len(), percentage));
    (unique, second)
}

fn stratified_split(
    dataset: &TraceDataset,
    percentage: f64,
    rng: &mut DeterministicRng,
) -> (TraceDataset, TraceDataset) {
    let (pos_first, pos_second) = split_ids(dataset.pos_link_ids(), percentage, rng);
    let (neg_first, neg_second) = split_ids(dataset.neg_link_ids(), percentage, rng);
    debug!(
        "[tracelinks:split] random pos={}/{} neg={}/{}",
        pos_second.len(),
        pos_first.len() + pos_second.len(),
        neg_second.len(),
        neg_first.len() + neg_second.len()
    );
    (
        dataset.subset(pos_first.iter().chain(&neg_first)),
        dataset.subset(pos_second.iter().chain(&neg_second)),
    )
}

fn partition_by_source(
    dataset: &TraceDataset,
    chosen: &HashSet<&ArtifactId>,
) -> (TraceDataset, TraceDataset) {
    let mut first = Vec::new();
    let mut second = Vec::new();
    for link in dataset.links().values() {
        if chosen.contains(&link.source.id) {
            second.push(link.id);
        } else {
            first.push(link.id);
        }
    }
    (dataset.subset(&first), dataset.subset(&second))
}
