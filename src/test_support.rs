//! Dataset fixtures shared by unit tests.

use std::collections::HashSet;
use std::sync::Arc;

use crate::data::{Artifact, TraceLink};
use crate::dataset::TraceDataset;
use crate::types::{ArtifactId, LinkId};

pub fn link(source: &str, target: &str, is_true_link: bool) -> TraceLink {
    TraceLink::new(
        Arc::new(Artifact::new(source, format!("{source} body"))),
        Arc::new(Artifact::new(target, format!("{target} body"))),
        is_true_link,
    )
}

/// `sources x targets` links named `s{i}`/`t{j}`, labeled by `positive(i, j)`.
pub fn grid(sources: usize, targets: usize, positive: impl Fn(usize, usize) -> bool) -> TraceDataset {
    let mut links = Vec::with_capacity(sources * targets);
    for s in 0..sources {
        for t in 0..targets {
            links.push(link(&format!("s{s}"), &format!("t{t}"), positive(s, t)));
        }
    }
    TraceDataset::from_links(links)
}

pub fn link_ids(dataset: &TraceDataset) -> HashSet<LinkId> {
    dataset.links().keys().copied().collect()
}

pub fn sources(dataset: &TraceDataset) -> HashSet<ArtifactId> {
    dataset.source_ids().into_iter().collect()
}

pub fn assert_consistent(dataset: &TraceDataset) {
    let pos: HashSet<LinkId> = dataset.pos_link_ids().iter().copied().collect();
    let neg: HashSet<LinkId> = dataset.neg_link_ids().iter().copied().collect();
    assert!(pos.is_disjoint(&neg));
    let all: HashSet<LinkId> = pos.union(&neg).copied().collect();
    assert_eq!(all, link_ids(dataset));
}
