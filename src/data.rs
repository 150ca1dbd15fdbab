use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::hash::link_hash;

pub use crate::types::{ArtifactId, LinkId, Token};

/// A single textual unit (requirement, code file, commit, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Identifier, unique within the artifact's layer.
    pub id: ArtifactId,
    /// Cleaned body text.
    pub token: Token,
}

impl Artifact {
    /// Create an artifact from any string-like id and token.
    pub fn new(id: impl Into<ArtifactId>, token: impl Into<Token>) -> Self {
        Self {
            id: id.into(),
            token: token.into(),
        }
    }
}

/// Deterministic id for the `(source_id, target_id)` pair.
///
/// Independent calls with the same ids always agree, so creators and
/// ground-truth lookups compute matching ids without sharing state.
pub fn generate_link_id(source_id: &str, target_id: &str) -> LinkId {
    link_hash(source_id, target_id)
}

/// Candidate relationship between a source and a target artifact.
///
/// Artifacts are shared behind `Arc`; splitting copies the link, never the text.
#[derive(Clone, Debug, PartialEq)]
pub struct TraceLink {
    /// Id derived from `(source.id, target.id)`.
    pub id: LinkId,
    /// Source artifact (the query side).
    pub source: Arc<Artifact>,
    /// Candidate target artifact.
    pub target: Arc<Artifact>,
    /// Ground-truth label.
    pub is_true_link: bool,
}

impl TraceLink {
    /// Build a link and derive its id from the artifact ids.
    pub fn new(source: Arc<Artifact>, target: Arc<Artifact>, is_true_link: bool) -> Self {
        Self {
            id: generate_link_id(&source.id, &target.id),
            source,
            target,
            is_true_link,
        }
    }

    /// `1` for a true link, `0` otherwise.
    pub fn label(&self) -> u8 {
        u8::from(self.is_true_link)
    }
}

/// Default trainer-facing feature entry for one link.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkFeature {
    /// Source artifact id.
    pub source_id: ArtifactId,
    /// Source text.
    pub source: Token,
    /// Target artifact id.
    pub target_id: ArtifactId,
    /// Target text.
    pub target: Token,
    /// `1` for a true link.
    pub label: u8,
}

impl From<&TraceLink> for LinkFeature {
    fn from(link: &TraceLink) -> Self {
        Self {
            source_id: link.source.id.clone(),
            source: link.source.token.clone(),
            target_id: link.target.id.clone(),
            target: link.target.token.clone(),
            label: link.label(),
        }
    }
}
