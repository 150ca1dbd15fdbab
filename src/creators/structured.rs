use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::creators::{ARTIFACTS_KEY, STRUCTURED_DEFINITION_FILE, TRACES_KEY};
use crate::creators::readers::{
    ColumnConversions, ProjectOverrides, check_trace_references, parse_uncased, read_artifacts,
    read_traces, uncased_object,
};
use crate::creators::{
    ArtifactLayer, CreatorOptions, DatasetCreator, build_layered_dataset, log_created,
};
use crate::dataset::TraceDataset;
use crate::errors::TraceError;
use crate::transport::fs::resolve;
use crate::types::{LayerName, TruePair};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArtifactTableDefinition {
    path: String,
    #[serde(default)]
    cols: ColumnConversions,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TraceTableDefinition {
    source: LayerName,
    target: LayerName,
    path: String,
    #[serde(default)]
    cols: ColumnConversions,
}

/// Artifact layers and the trace tables between them, as declared by a project.
pub(crate) struct ProjectTables {
    pub layers: IndexMap<LayerName, ArtifactLayer>,
    pub traces: Vec<TraceTable>,
    pub overrides: ProjectOverrides,
}

pub(crate) struct TraceTable {
    pub name: String,
    pub source: LayerName,
    pub target: LayerName,
    pub path: PathBuf,
    pub conversions: ColumnConversions,
}

impl ProjectTables {
    /// Layer name as declared, matched case-insensitively.
    fn layer_key(&self, name: &str, table: &str) -> Result<LayerName, TraceError> {
        self.layers
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| {
                TraceError::Configuration(format!(
                    "trace table '{table}' references undeclared artifact layer '{name}'"
                ))
            })
    }

    /// Pair every trace table with its layers and cross each distinct layer pairing once.
    pub fn into_dataset(self, options: &CreatorOptions) -> Result<TraceDataset, TraceError> {
        let mut pairings: IndexMap<(LayerName, LayerName), Vec<TruePair>> = IndexMap::new();
        for table in &self.traces {
            let source = self.layer_key(&table.source, &table.name)?;
            let target = self.layer_key(&table.target, &table.name)?;
            let traces = check_trace_references(
                &table.name,
                read_traces(&table.path, &table.conversions)?,
                &self.layers[&source],
                &self.layers[&target],
                self.overrides,
            )?;
            debug!(
                "[tracelinks:creators] {}: {} true links between '{source}' and '{target}'",
                table.name,
                traces.len()
            );
            pairings.entry((source, target)).or_default().extend(traces);
        }
        let mut source_layers = Vec::with_capacity(pairings.len());
        let mut target_layers = Vec::with_capacity(pairings.len());
        let mut true_links = Vec::new();
        for ((source, target), traces) in pairings {
            source_layers.push(self.layers[&source].clone());
            target_layers.push(self.layers[&target].clone());
            true_links.extend(traces);
        }
        build_layered_dataset(&source_layers, &target_layers, &true_links, options)
    }
}

/// Creator for projects described by a `definition.json` file:
///
/// ```json
/// {
///   "artifacts": {"Requirements": {"path": "reqs.csv", "cols": {"name": "id", "text": "content"}}},
///   "traces": {"req2code": {"source": "Requirements", "target": "Code", "path": "r2c.json"}},
///   "overrides": {"ALLOW_MISSING_TARGET": true}
/// }
/// ```
///
/// Table paths are relative to the definition file. Definition keys match in
/// any case.
#[derive(Clone, Debug)]
pub struct StructuredDatasetCreator {
    project_path: PathBuf,
    overrides: Option<ProjectOverrides>,
    options: CreatorOptions,
}

impl StructuredDatasetCreator {
    /// `project_path` is the definition file or the directory holding `definition.json`.
    pub fn new(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
            overrides: None,
            options: CreatorOptions::default(),
        }
    }

    /// Replace the cleaning and target-filter options.
    pub fn with_options(mut self, options: CreatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Overrides used instead of those in the definition file.
    pub fn with_overrides(mut self, overrides: ProjectOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }

    fn definition_path(&self) -> PathBuf {
        if self.project_path.is_dir() {
            self.project_path.join(STRUCTURED_DEFINITION_FILE)
        } else {
            self.project_path.clone()
        }
    }

    fn read_tables(&self) -> Result<ProjectTables, TraceError> {
        let definition_path = self.definition_path();
        let base = definition_path.parent().unwrap_or(Path::new("."));
        let root: Value = serde_json::from_reader(BufReader::new(File::open(&definition_path)?))?;
        let root = uncased_object(&root, "structured definition")?;
        for key in root.keys() {
            if !matches!(key.as_str(), ARTIFACTS_KEY | TRACES_KEY | "overrides") {
                return Err(TraceError::Configuration(format!(
                    "structured definition: unknown key '{key}'"
                )));
            }
        }

        let mut layers = IndexMap::new();
        for (name, entry) in section(&root, ARTIFACTS_KEY)? {
            let table: ArtifactTableDefinition = parse_uncased(entry, name)?;
            let layer = read_artifacts(&resolve(base, &table.path), &table.cols)?;
            layers.insert(name.clone(), layer);
        }
        let mut traces = Vec::new();
        for (name, entry) in section(&root, TRACES_KEY)? {
            let table: TraceTableDefinition = parse_uncased(entry, name)?;
            traces.push(TraceTable {
                name: name.clone(),
                source: table.source,
                target: table.target,
                path: resolve(base, &table.path),
                conversions: table.cols,
            });
        }
        let overrides = match (self.overrides, root.get("overrides")) {
            (Some(overrides), _) => overrides,
            (None, Some(value)) => ProjectOverrides::from_value(value)?,
            (None, None) => ProjectOverrides::default(),
        };
        Ok(ProjectTables {
            layers,
            traces,
            overrides,
        })
    }
}

fn section<'a>(
    root: &'a serde_json::Map<String, Value>,
    key: &str,
) -> Result<&'a serde_json::Map<String, Value>, TraceError> {
    root.get(key)
        .and_then(Value::as_object)
        .ok_or_else(|| {
            TraceError::Configuration(format!("structured definition: missing '{key}' object"))
        })
}

impl DatasetCreator for StructuredDatasetCreator {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn create(&self) -> Result<TraceDataset, TraceError> {
        let dataset = self.read_tables()?.into_dataset(&self.options)?;
        log_created(self.name(), &dataset);
        Ok(dataset)
    }
}
