//! Dataset creators: turn raw project data into a labeled [`TraceDataset`].
//!
//! Every creator funnels into [`build_layered_dataset`] (or, for explicit
//! link rows, [`TraceDataset::from_links`]), so cleaning, labeling, and link
//! deduplication behave the same regardless of the input format.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::config::TraceConfig;
use crate::data::{Artifact, TraceLink, generate_link_id};
use crate::dataset::TraceDataset;
use crate::errors::TraceError;
use crate::types::{ArtifactId, LinkId, Token, TruePair};
use crate::utils::TextCleaner;

mod classic;
mod coest;
mod csv_file;
pub mod readers;
mod safa;
mod structured;

pub use classic::ClassicTraceCreator;
pub use coest::CoestDatasetCreator;
pub use csv_file::{CsvDatasetCreator, save_split_csvs, write_dataset_csv};
pub use readers::ProjectOverrides;
pub use safa::SafaDatasetCreator;
pub use structured::StructuredDatasetCreator;

/// One layer of artifacts (`id -> token`) in insertion order.
pub type ArtifactLayer = IndexMap<ArtifactId, Token>;

/// Build an [`ArtifactLayer`] from `(id, token)` pairs.
pub fn artifact_layer<I, K, V>(pairs: I) -> ArtifactLayer
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<ArtifactId>,
    V: Into<Token>,
{
    pairs
        .into_iter()
        .map(|(id, token)| (id.into(), token.into()))
        .collect()
}

/// Anything that can produce a labeled dataset.
pub trait DatasetCreator {
    /// Registry name used in log messages.
    fn name(&self) -> &'static str;

    /// Build the dataset. Either the whole dataset is returned or an error.
    fn create(&self) -> Result<TraceDataset, TraceError>;
}

/// Options shared by every creator.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CreatorOptions {
    /// Cleaning applied to artifact tokens before links are built.
    pub cleaning: TextCleaner,
    /// Keep only targets that appear in at least one true link.
    pub use_linked_targets_only: bool,
}

impl From<&TraceConfig> for CreatorOptions {
    fn from(config: &TraceConfig) -> Self {
        Self {
            cleaning: config.cleaning.clone(),
            use_linked_targets_only: config.use_linked_targets_only,
        }
    }
}

/// Cross product of each source layer with its paired target layer, labeled
/// by membership in `true_links`. The first link built for an id wins.
pub fn build_layered_dataset(
    source_layers: &[ArtifactLayer],
    target_layers: &[ArtifactLayer],
    true_links: &[TruePair],
    options: &CreatorOptions,
) -> Result<TraceDataset, TraceError> {
    if source_layers.len() != target_layers.len() {
        return Err(TraceError::Configuration(format!(
            "{} source layers paired with {} target layers",
            source_layers.len(),
            target_layers.len()
        )));
    }
    let positive: HashSet<LinkId> = true_links
        .iter()
        .map(|(source, target)| generate_link_id(source, target))
        .collect();
    let linked_targets: HashSet<&str> = true_links
        .iter()
        .map(|(_, target)| target.as_str())
        .collect();

    let mut links: IndexMap<LinkId, TraceLink> = IndexMap::new();
    for (sources, targets) in source_layers.iter().zip(target_layers) {
        let sources = clean_layer(sources, &options.cleaning, |_| true);
        let targets = clean_layer(targets, &options.cleaning, |id| {
            !options.use_linked_targets_only || linked_targets.contains(id)
        });
        for source in &sources {
            for target in &targets {
                let id = generate_link_id(&source.id, &target.id);
                links.entry(id).or_insert_with(|| {
                    TraceLink::new(Arc::clone(source), Arc::clone(target), positive.contains(&id))
                });
            }
        }
    }
    Ok(TraceDataset::new(links))
}

fn clean_layer(
    layer: &ArtifactLayer,
    cleaner: &TextCleaner,
    keep: impl Fn(&str) -> bool,
) -> Vec<Arc<Artifact>> {
    layer
        .iter()
        .filter(|(id, _)| keep(id))
        .filter_map(|(id, token)| cleaner.artifact(id.clone(), token))
        .collect()
}

pub(crate) fn log_created(creator: &str, dataset: &TraceDataset) {
    let summary = dataset.summary();
    info!(
        "[tracelinks:creators] {creator} created {} links ({} positive, {} negative) over {} sources",
        summary.links, summary.positives, summary.negatives, summary.sources
    );
}

/// Tagged registry of dataset creators.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportedDatasetCreator {
    /// In-memory layers; built directly with [`ClassicTraceCreator::new`].
    Classic,
    /// One link per row in a CSV file.
    Csv,
    /// Project with a `definition.json` file.
    Structured,
    /// Project with a `tim.json` file.
    Safa,
    /// Directory-per-layer project with an answer set.
    Coest,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileCreatorArgs {
    cleaning: TextCleaner,
    use_linked_targets_only: bool,
    overrides: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct CoestArgs {
    cleaning: TextCleaner,
    use_linked_targets_only: bool,
    sources: Option<String>,
    targets: Option<String>,
    answer_set: Option<String>,
    overrides: Option<Value>,
}

impl SupportedDatasetCreator {
    /// Every registered creator.
    pub const ALL: [SupportedDatasetCreator; 5] = [
        SupportedDatasetCreator::Classic,
        SupportedDatasetCreator::Csv,
        SupportedDatasetCreator::Structured,
        SupportedDatasetCreator::Safa,
        SupportedDatasetCreator::Coest,
    ];

    /// Registry name.
    pub fn name(self) -> &'static str {
        match self {
            SupportedDatasetCreator::Classic => "classic",
            SupportedDatasetCreator::Csv => "csv",
            SupportedDatasetCreator::Structured => "structured",
            SupportedDatasetCreator::Safa => "safa",
            SupportedDatasetCreator::Coest => "coest",
        }
    }

    /// Build a file-backed creator rooted at `path`. Unknown `args` keys fail.
    pub fn build(
        self,
        path: impl AsRef<Path>,
        args: &Map<String, Value>,
    ) -> Result<Box<dyn DatasetCreator>, TraceError> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let args_value = Value::Object(args.clone());
        let invalid =
            |err: serde_json::Error| TraceError::Configuration(format!("{} creator: {err}", self.name()));
        match self {
            SupportedDatasetCreator::Classic => Err(TraceError::Configuration(
                "classic creator takes in-memory layers, not a project path".into(),
            )),
            SupportedDatasetCreator::Coest => {
                let args: CoestArgs = serde_json::from_value(args_value).map_err(invalid)?;
                let mut creator = CoestDatasetCreator::new(path).with_options(CreatorOptions {
                    cleaning: args.cleaning,
                    use_linked_targets_only: args.use_linked_targets_only,
                });
                if let Some(sources) = args.sources {
                    creator = creator.with_source_dir(sources);
                }
                if let Some(targets) = args.targets {
                    creator = creator.with_target_dir(targets);
                }
                if let Some(answer_set) = args.answer_set {
                    creator = creator.with_answer_set(answer_set);
                }
                if let Some(overrides) = &args.overrides {
                    creator = creator.with_overrides(ProjectOverrides::from_value(overrides)?);
                }
                Ok(Box::new(creator))
            }
            SupportedDatasetCreator::Csv
            | SupportedDatasetCreator::Structured
            | SupportedDatasetCreator::Safa => {
                let args: FileCreatorArgs = serde_json::from_value(args_value).map_err(invalid)?;
                let options = CreatorOptions {
                    cleaning: args.cleaning,
                    use_linked_targets_only: args.use_linked_targets_only,
                };
                let overrides = args
                    .overrides
                    .as_ref()
                    .map(ProjectOverrides::from_value)
                    .transpose()?;
                match self {
                    SupportedDatasetCreator::Csv => {
                        if overrides.is_some() {
                            return Err(TraceError::Configuration(
                                "csv creator does not accept overrides".into(),
                            ));
                        }
                        Ok(Box::new(CsvDatasetCreator::new(path).with_options(options)))
                    }
                    SupportedDatasetCreator::Structured => {
                        let mut creator = StructuredDatasetCreator::new(path).with_options(options);
                        if let Some(overrides) = overrides {
                            creator = creator.with_overrides(overrides);
                        }
                        Ok(Box::new(creator))
                    }
                    _ => {
                        let mut creator = SafaDatasetCreator::new(path).with_options(options);
                        if let Some(overrides) = overrides {
                            creator = creator.with_overrides(overrides);
                        }
                        Ok(Box::new(creator))
                    }
                }
            }
        }
    }
}

impl fmt::Display for SupportedDatasetCreator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SupportedDatasetCreator {
    type Err = TraceError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|creator| creator.name() == normalized)
            .ok_or_else(|| TraceError::Configuration(format!("unknown dataset creator '{raw}'")))
    }
}
