//! Link population for one partition: all links plus positive/negative ids.

use indexmap::{IndexMap, IndexSet};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

use crate::config::TrainingConfig;
use crate::data::{LinkFeature, TraceLink};
use crate::errors::TraceError;
use crate::hash::derive_seed;
use crate::rng::DeterministicRng;
use crate::trace_matrix::TraceMatrix;
use crate::types::{ArtifactId, LinkId};

/// Labeled trace links for one dataset partition.
///
/// Invariant: every id in `pos_link_ids`/`neg_link_ids` is a key of `links`,
/// every key appears in one of the two lists, and the lists never share an id.
/// The id lists may repeat ids after resampling; `links` never does.
#[derive(Clone, Debug, Default)]
pub struct TraceDataset {
    links: IndexMap<LinkId, TraceLink>,
    pos_link_ids: Vec<LinkId>,
    neg_link_ids: Vec<LinkId>,
}

/// Size and per-source balance of a dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    /// Distinct links.
    pub links: usize,
    /// Distinct true links.
    pub positives: usize,
    /// Distinct false links.
    pub negatives: usize,
    /// Distinct sources (queries).
    pub sources: usize,
    /// `positives / links`, `0` when empty.
    pub positive_ratio: f64,
    /// Smallest query (links per source).
    pub min_query: usize,
    /// Largest query (links per source).
    pub max_query: usize,
    /// Mean links per source.
    pub mean_query: f64,
}

impl TraceDataset {
    /// Build a dataset, deriving positive/negative ids from link labels in map order.
    pub fn new(links: IndexMap<LinkId, TraceLink>) -> Self {
        let mut pos_link_ids = Vec::new();
        let mut neg_link_ids = Vec::new();
        for (id, link) in &links {
            if link.is_true_link {
                pos_link_ids.push(*id);
            } else {
                neg_link_ids.push(*id);
            }
        }
        Self {
            links,
            pos_link_ids,
            neg_link_ids,
        }
    }

    /// Build from a link iterator; the first link seen for an id wins.
    pub fn from_links<I>(links: I) -> Self
    where
        I: IntoIterator<Item = TraceLink>,
    {
        let mut map = IndexMap::new();
        for link in links {
            map.entry(link.id).or_insert(link);
        }
        Self::new(map)
    }

    /// Build from explicit id lists, checking them against the links.
    pub fn with_link_ids(
        links: IndexMap<LinkId, TraceLink>,
        pos_link_ids: Vec<LinkId>,
        neg_link_ids: Vec<LinkId>,
    ) -> Result<Self, TraceError> {
        let dataset = Self {
            links,
            pos_link_ids,
            neg_link_ids,
        };
        dataset.check_invariants()?;
        Ok(dataset)
    }

    /// Number of distinct links.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// Whether the dataset holds no links.
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// All links keyed by id, in insertion order.
    pub fn links(&self) -> &IndexMap<LinkId, TraceLink> {
        &self.links
    }

    /// Link with the given id.
    pub fn link(&self, id: LinkId) -> Option<&TraceLink> {
        self.links.get(&id)
    }

    /// Positive ids, possibly repeated after resampling.
    pub fn pos_link_ids(&self) -> &[LinkId] {
        &self.pos_link_ids
    }

    /// Negative ids, possibly repeated after resampling.
    pub fn neg_link_ids(&self) -> &[LinkId] {
        &self.neg_link_ids
    }

    /// Group links by source in first-seen order.
    pub fn trace_matrix(&self) -> TraceMatrix {
        let mut matrix = TraceMatrix::default();
        for link in self.links.values() {
            matrix.add_link(link.clone(), None);
        }
        matrix
    }

    /// Distinct source ids in first-seen order.
    pub fn source_ids(&self) -> Vec<ArtifactId> {
        self.links
            .values()
            .map(|link| link.source.id.clone())
            .collect::<IndexSet<_>>()
            .into_iter()
            .collect()
    }

    /// New dataset holding the given ids, in this dataset's link order.
    /// Unknown ids are ignored.
    pub fn subset<'a, I>(&self, ids: I) -> TraceDataset
    where
        I: IntoIterator<Item = &'a LinkId>,
    {
        let wanted: HashSet<LinkId> = ids.into_iter().copied().collect();
        let links = self
            .links
            .iter()
            .filter(|(id, _)| wanted.contains(*id))
            .map(|(id, link)| (*id, link.clone()))
            .collect();
        TraceDataset::new(links)
    }

    /// Merge datasets in order; the first occurrence of an id wins.
    pub fn union<'a, I>(parts: I) -> TraceDataset
    where
        I: IntoIterator<Item = &'a TraceDataset>,
    {
        TraceDataset::from_links(
            parts
                .into_iter()
                .flat_map(|part| part.links.values().cloned()),
        )
    }

    /// Resize the positive ids to exactly `n` entries.
    ///
    /// Shrinking keeps a seeded random subset in original relative order.
    /// Growing repeats randomly chosen ids and requires `include_duplicates`;
    /// without it, `n > len` is a configuration error rather than a clamp.
    pub fn resize_pos_links(
        &mut self,
        n: usize,
        include_duplicates: bool,
        seed: u64,
    ) -> Result<(), TraceError> {
        self.pos_link_ids = resize_ids(&self.pos_link_ids, n, include_duplicates, seed, "positive")?;
        self.retain_referenced_links();
        Ok(())
    }

    /// Resize the negative ids to exactly `n` entries; see `resize_pos_links`.
    pub fn resize_neg_links(
        &mut self,
        n: usize,
        include_duplicates: bool,
        seed: u64,
    ) -> Result<(), TraceError> {
        self.neg_link_ids = resize_ids(&self.neg_link_ids, n, include_duplicates, seed, "negative")?;
        self.retain_referenced_links();
        Ok(())
    }

    /// Grow the positive ids to `rate` times their count by sampling with replacement.
    pub fn resample_pos_links(&mut self, rate: usize, seed: u64) -> Result<(), TraceError> {
        let target = resample_target(self.pos_link_ids.len(), rate)?;
        self.resize_pos_links(target, true, seed)
    }

    /// Grow the negative ids to `rate` times their count by sampling with replacement.
    pub fn resample_neg_links(&mut self, rate: usize, seed: u64) -> Result<(), TraceError> {
        let target = resample_target(self.neg_link_ids.len(), rate)?;
        self.resize_neg_links(target, true, seed)
    }

    /// Resample positives and optionally balance negatives to the positive count.
    pub fn prepare_for_training(
        &mut self,
        config: &TrainingConfig,
        seed: u64,
    ) -> Result<(), TraceError> {
        config.validate()?;
        self.resample_pos_links(config.resample_rate, derive_seed(seed, 0))?;
        if !config.balance {
            return Ok(());
        }
        let target = self.pos_link_ids.len();
        if target == 0 || self.neg_link_ids.is_empty() {
            warn!(
                "[tracelinks:dataset] skipping balance (positives={}, negatives={})",
                target,
                self.neg_link_ids.len()
            );
            return Ok(());
        }
        let include_duplicates = self.neg_link_ids.len() < target;
        self.resize_neg_links(target, include_duplicates, derive_seed(seed, 1))
    }

    /// Apply `feature_fn` to every link id in `pos ++ neg` order (duplicates
    /// included), optionally shuffled with `shuffle_seed`.
    pub fn to_features<T, F>(
        &self,
        mut feature_fn: F,
        shuffle_seed: Option<u64>,
    ) -> Result<Vec<T>, TraceError>
    where
        F: FnMut(&TraceLink) -> Result<T, TraceError>,
    {
        let mut ids: Vec<LinkId> = self
            .pos_link_ids
            .iter()
            .chain(&self.neg_link_ids)
            .copied()
            .collect();
        if let Some(seed) = shuffle_seed {
            ids.shuffle(&mut DeterministicRng::new(seed));
        }
        let mut features = Vec::with_capacity(ids.len());
        for id in ids {
            let link = self.links.get(&id).ok_or_else(|| {
                TraceError::Configuration(format!("link id {id} is missing from the dataset"))
            })?;
            features.push(feature_fn(link)?);
        }
        Ok(features)
    }

    /// Built-in features: cleaned source/target text and label per link.
    pub fn link_features(&self) -> Vec<LinkFeature> {
        self.pos_link_ids
            .iter()
            .chain(&self.neg_link_ids)
            .filter_map(|id| self.links.get(id))
            .map(LinkFeature::from)
            .collect()
    }

    /// Size and query-skew statistics.
    pub fn summary(&self) -> DatasetSummary {
        let matrix = self.trace_matrix();
        let sizes: Vec<usize> = matrix.queries().map(|(_, query)| query.links.len()).collect();
        let positives = self.links.values().filter(|link| link.is_true_link).count();
        let links = self.links.len();
        DatasetSummary {
            links,
            positives,
            negatives: links - positives,
            sources: sizes.len(),
            positive_ratio: if links == 0 {
                0.0
            } else {
                positives as f64 / links as f64
            },
            min_query: sizes.iter().copied().min().unwrap_or(0),
            max_query: sizes.iter().copied().max().unwrap_or(0),
            mean_query: if sizes.is_empty() {
                0.0
            } else {
                links as f64 / sizes.len() as f64
            },
        }
    }

    fn retain_referenced_links(&mut self) {
        let referenced: HashSet<LinkId> = self
            .pos_link_ids
            .iter()
            .chain(&self.neg_link_ids)
            .copied()
            .collect();
        self.links.retain(|id, _| referenced.contains(id));
    }

    fn check_invariants(&self) -> Result<(), TraceError> {
        let integrity = |id: LinkId, reason: &str| TraceError::DataIntegrity {
            context: "trace dataset".into(),
            id: id.to_string(),
            reason: reason.into(),
        };
        let pos: HashSet<LinkId> = self.pos_link_ids.iter().copied().collect();
        for id in &self.pos_link_ids {
            match self.links.get(id) {
                Some(link) if link.is_true_link => {}
                Some(_) => return Err(integrity(*id, "negative link listed as positive")),
                None => return Err(integrity(*id, "positive id without a link")),
            }
        }
        for id in &self.neg_link_ids {
            if pos.contains(id) {
                return Err(integrity(*id, "link listed as both positive and negative"));
            }
            match self.links.get(id) {
                Some(link) if !link.is_true_link => {}
                Some(_) => return Err(integrity(*id, "positive link listed as negative")),
                None => return Err(integrity(*id, "negative id without a link")),
            }
        }
        let listed: HashSet<LinkId> = pos.into_iter().chain(self.neg_link_ids.iter().copied()).collect();
        if let Some(id) = self.links.keys().find(|id| !listed.contains(*id)) {
            return Err(integrity(*id, "link missing from both id lists"));
        }
        Ok(())
    }
}

fn resample_target(len: usize, rate: usize) -> Result<usize, TraceError> {
    if rate == 0 {
        return Err(TraceError::Configuration(
            "resample rate must be at least 1".into(),
        ));
    }
    Ok(len.saturating_mul(rate))
}

fn resize_ids(
    ids: &[LinkId],
    n: usize,
    include_duplicates: bool,
    seed: u64,
    side: &str,
) -> Result<Vec<LinkId>, TraceError> {
    let len = ids.len();
    if n == len {
        return Ok(ids.to_vec());
    }
    let mut rng = DeterministicRng::new(seed);
    if n < len {
        let mut keep = rand::seq::index::sample(&mut rng, len, n).into_vec();
        keep.sort_unstable();
        return Ok(keep.into_iter().map(|idx| ids[idx]).collect());
    }
    if !include_duplicates {
        return Err(TraceError::Configuration(format!(
            "cannot resize {side} links from {len} to {n} without duplicates"
        )));
    }
    if len == 0 {
        return Err(TraceError::Configuration(format!(
            "cannot resize empty {side} links to {n}"
        )));
    }
    let mut resized = ids.to_vec();
    resized.extend((len..n).map(|_| ids[rng.random_range(0..len)]));
    Ok(resized)
}
