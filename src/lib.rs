#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Job configuration types.
pub mod config;
/// Centralized constants used across splits, metrics, and creators.
pub mod constants;
/// Dataset creators for in-memory, CSV, and project-directory inputs.
pub mod creators;
/// Artifact, trace link, and link feature types.
pub mod data;
/// Labeled link populations.
pub mod dataset;
mod hash;
/// Retrieval and classification metrics over scored links.
pub mod metrics;
/// Seeded random source used by every randomized operation.
pub mod rng;
/// Two-way split strategies and their registry.
pub mod splits;
/// Multi-way splitting built on the split strategies.
pub mod splitter;
/// Per-source query grouping for ranking metrics.
pub mod trace_matrix;
/// Input transports used by creators (filesystem today).
pub mod transport;
/// Shared type aliases.
pub mod types;
/// Text cleaning helpers.
pub mod utils;

mod errors;

#[cfg(test)]
mod test_support;

pub use config::{MetricsConfig, SplitConfig, TraceConfig, TrainingConfig};
pub use creators::{
    ArtifactLayer, ClassicTraceCreator, CoestDatasetCreator, CreatorOptions, CsvDatasetCreator,
    DatasetCreator, ProjectOverrides, SafaDatasetCreator, StructuredDatasetCreator,
    SupportedDatasetCreator, artifact_layer,
};
pub use data::{Artifact, LinkFeature, TraceLink, generate_link_id};
pub use dataset::{DatasetSummary, TraceDataset};
pub use errors::TraceError;
pub use metrics::{SupportedMetric, compute_metrics};
pub use splits::{SplitStrategy, StrategySpec, SupportedSplitStrategy};
pub use splitter::TraceDatasetSplitter;
pub use trace_matrix::{Query, TraceMatrix};
pub use types::{ArtifactId, LinkId, MetricReport, Token, TruePair};
pub use utils::{CleaningStep, TextCleaner};
