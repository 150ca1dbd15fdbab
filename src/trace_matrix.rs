//! Per-source grouping of trace links ("queries") for ranking metrics.

use indexmap::IndexMap;
use rand::seq::SliceRandom;

use crate::data::TraceLink;
use crate::errors::TraceError;
use crate::rng::DeterministicRng;
use crate::types::ArtifactId;

/// All links sharing one source artifact, with their predicted scores.
#[derive(Clone, Debug, Default)]
pub struct Query {
    /// Links in query order.
    pub links: Vec<TraceLink>,
    /// Parallel to `links` when predictions were supplied, otherwise empty.
    pub preds: Vec<f64>,
}

impl Query {
    /// Labels in the query's current link order.
    pub fn labels(&self) -> Vec<u8> {
        self.links.iter().map(TraceLink::label).collect()
    }

    /// Number of true links in the query.
    pub fn num_positive(&self) -> usize {
        self.links.iter().filter(|link| link.is_true_link).count()
    }
}

/// Links grouped by source id in first-seen order.
#[derive(Clone, Debug, Default)]
pub struct TraceMatrix {
    query_matrix: IndexMap<ArtifactId, Query>,
    source_ids: Vec<ArtifactId>,
}

impl TraceMatrix {
    /// Group `links` by source. `preds`, when given, must be parallel to `links`
    /// and free of `NaN`.
    pub fn new<'a, I>(links: I, preds: Option<&[f64]>) -> Result<Self, TraceError>
    where
        I: IntoIterator<Item = &'a TraceLink>,
    {
        let links: Vec<&TraceLink> = links.into_iter().collect();
        if let Some(preds) = preds
            && preds.len() != links.len()
        {
            return Err(TraceError::Configuration(format!(
                "trace matrix received {} predictions for {} links",
                preds.len(),
                links.len()
            )));
        }
        if let Some(idx) = preds.and_then(|preds| preds.iter().position(|pred| pred.is_nan())) {
            return Err(TraceError::Configuration(format!(
                "prediction for link {} ({} -> {}) is NaN",
                idx, links[idx].source.id, links[idx].target.id
            )));
        }
        let mut matrix = Self::default();
        for (idx, link) in links.into_iter().enumerate() {
            matrix.add_link(link.clone(), preds.map(|preds| preds[idx]));
        }
        Ok(matrix)
    }

    /// Shuffle source order and each query's internal order (links and preds together).
    pub fn randomize(&mut self, seed: u64) {
        let mut rng = DeterministicRng::new(seed);
        self.source_ids.shuffle(&mut rng);
        for query in self.query_matrix.values_mut() {
            let mut order: Vec<usize> = (0..query.links.len()).collect();
            order.shuffle(&mut rng);
            query.links = order.iter().map(|&idx| query.links[idx].clone()).collect();
            if !query.preds.is_empty() {
                query.preds = order.iter().map(|&idx| query.preds[idx]).collect();
            }
        }
    }

    /// Append `link` to its source's query, creating the query when absent.
    pub fn add_link(&mut self, link: TraceLink, pred: Option<f64>) {
        let source_id = link.source.id.clone();
        if !self.query_matrix.contains_key(&source_id) {
            self.source_ids.push(source_id.clone());
        }
        let query = self.query_matrix.entry(source_id).or_default();
        query.links.push(link);
        if let Some(pred) = pred {
            query.preds.push(pred);
        }
    }

    /// Distinct source ids in first-seen (or randomized) order.
    pub fn source_ids(&self) -> &[ArtifactId] {
        &self.source_ids
    }

    /// Query for `source_id`, if any link has that source.
    pub fn query(&self, source_id: &str) -> Option<&Query> {
        self.query_matrix.get(source_id)
    }

    /// Queries in `source_ids` order.
    pub fn queries(&self) -> impl Iterator<Item = (&ArtifactId, &Query)> {
        self.source_ids
            .iter()
            .filter_map(|id| self.query_matrix.get_key_value(id))
    }

    /// Number of distinct sources.
    pub fn num_queries(&self) -> usize {
        self.source_ids.len()
    }

    /// Total number of grouped links.
    pub fn num_links(&self) -> usize {
        self.query_matrix.values().map(|query| query.links.len()).sum()
    }

    /// Flat `(labels, preds)` over every query in source order.
    pub fn flat_labels_and_preds(&self) -> Result<(Vec<u8>, Vec<f64>), TraceError> {
        let mut labels = Vec::with_capacity(self.num_links());
        let mut preds = Vec::with_capacity(self.num_links());
        for (source_id, query) in self.queries() {
            ensure_predictions(source_id, query)?;
            labels.extend(query.labels());
            preds.extend_from_slice(&query.preds);
        }
        Ok((labels, preds))
    }

    /// Mean of `metric_fn(labels, preds)` over queries, skipping NaN results.
    pub fn calculate_query_metric<F>(&self, metric_fn: F) -> Result<f64, TraceError>
    where
        F: Fn(&[u8], &[f64]) -> f64,
    {
        self.mean_over_queries(|query| metric_fn(&query.labels(), &query.preds))
    }

    /// Like `calculate_query_metric`, but each query is first ranked by score
    /// (stable, descending) and truncated to its top `k` entries.
    ///
    /// Queries without true links are skipped. A query whose true links all
    /// fall below the cutoff scores `0` when `metric_fn` is undefined on its
    /// truncated list.
    pub fn calculate_query_metric_at_k<F>(&self, metric_fn: F, k: usize) -> Result<f64, TraceError>
    where
        F: Fn(&[u8], &[f64]) -> f64,
    {
        if k == 0 {
            return Err(TraceError::Configuration(
                "metric cutoff k must be at least 1".into(),
            ));
        }
        self.mean_over_queries(|query| {
            if query.num_positive() == 0 {
                return f64::NAN;
            }
            let (labels, preds) = top_k(&query.labels(), &query.preds, k);
            let value = metric_fn(&labels, &preds);
            if value.is_nan() { 0.0 } else { value }
        })
    }

    fn mean_over_queries<F>(&self, query_fn: F) -> Result<f64, TraceError>
    where
        F: Fn(&Query) -> f64,
    {
        let mut total = 0.0;
        let mut counted = 0usize;
        for (source_id, query) in self.queries() {
            ensure_predictions(source_id, query)?;
            let value = query_fn(query);
            if value.is_nan() {
                continue;
            }
            total += value;
            counted += 1;
        }
        if counted == 0 {
            return Err(TraceError::NoValidQueries {
                queries: self.num_queries(),
            });
        }
        Ok(total / counted as f64)
    }
}

/// Rank `(label, pred)` pairs by descending score, keeping input order on ties.
///
/// Scores compare by `f64::total_cmp`, so a `NaN` ranks above every number.
pub fn rank_by_score(labels: &[u8], preds: &[f64]) -> Vec<(u8, f64)> {
    let mut pairs: Vec<(u8, f64)> = labels.iter().copied().zip(preds.iter().copied()).collect();
    pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
    pairs
}

fn top_k(labels: &[u8], preds: &[f64], k: usize) -> (Vec<u8>, Vec<f64>) {
    rank_by_score(labels, preds).into_iter().take(k).unzip()
}

fn ensure_predictions(source_id: &str, query: &Query) -> Result<(), TraceError> {
    if query.preds.len() != query.links.len() {
        return Err(TraceError::Configuration(format!(
            "query for source '{source_id}' has {} predictions for {} links",
            query.preds.len(),
            query.links.len()
        )));
    }
    Ok(())
}
