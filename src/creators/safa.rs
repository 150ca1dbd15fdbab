use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use crate::constants::creators::{
    SAFA_ARTIFACT_COLUMNS, SAFA_DATAFILES_KEY, SAFA_DEFINITION_FILE, SAFA_TRACE_COLUMNS,
};
use crate::creators::readers::{
    ColumnConversions, ProjectOverrides, parse_uncased, read_artifacts, uncased_object,
};
use crate::creators::structured::{ProjectTables, TraceTable};
use crate::creators::{CreatorOptions, DatasetCreator, log_created};
use crate::dataset::TraceDataset;
use crate::errors::TraceError;
use crate::transport::fs::resolve;
use crate::types::{LayerName, MatrixName};

const OVERRIDES_KEY: &str = "overrides";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SafaDataFile {
    file: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SafaMatrix {
    source: LayerName,
    target: LayerName,
    file: String,
}

fn conversions(pairs: &[(&str, &str)]) -> ColumnConversions {
    pairs
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}

/// Creator for SAFA projects: a directory with a `tim.json` such as
///
/// ```json
/// {
///   "DataFiles": {"Requirements": {"File": "requirements.json"}, "Code": {"File": "code.csv"}},
///   "req2code": {"Source": "Requirements", "Target": "Code", "File": "req2code.json"}
/// }
/// ```
///
/// Artifact tables use `name`/`body` (or `id`/`content`) columns and trace
/// tables `sourceName`/`targetName` (or `source`/`target`).
#[derive(Clone, Debug)]
pub struct SafaDatasetCreator {
    project_dir: PathBuf,
    overrides: Option<ProjectOverrides>,
    options: CreatorOptions,
}

impl SafaDatasetCreator {
    /// Creator for the project directory holding `tim.json`.
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            overrides: None,
            options: CreatorOptions::default(),
        }
    }

    /// Replace the cleaning and target-filter options.
    pub fn with_options(mut self, options: CreatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Overrides used instead of those in `tim.json`.
    pub fn with_overrides(mut self, overrides: ProjectOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }

    fn read_tables(&self) -> Result<ProjectTables, TraceError> {
        let tim_path = self.project_dir.join(SAFA_DEFINITION_FILE);
        let root: Value = serde_json::from_reader(BufReader::new(File::open(&tim_path)?))?;
        let mut root = uncased_object(&root, SAFA_DEFINITION_FILE)?;
        let data_files = root
            .remove(SAFA_DATAFILES_KEY)
            .and_then(|value| match value {
                Value::Object(object) => Some(object),
                _ => None,
            })
            .ok_or_else(|| {
                TraceError::Configuration(format!(
                    "{SAFA_DEFINITION_FILE}: missing '{SAFA_DATAFILES_KEY}' object"
                ))
            })?;
        let file_overrides = root.remove(OVERRIDES_KEY);

        let artifact_cols = conversions(&SAFA_ARTIFACT_COLUMNS);
        let mut layers = IndexMap::new();
        for (name, entry) in data_files {
            let data_file: SafaDataFile = parse_uncased(&entry, &name)?;
            let layer = read_artifacts(&self.resolve(&data_file.file), &artifact_cols)?;
            layers.insert(name, layer);
        }

        let trace_cols = conversions(&SAFA_TRACE_COLUMNS);
        let mut traces = Vec::new();
        for (name, entry) in root {
            let matrix: SafaMatrix = parse_uncased(&entry, &name)?;
            traces.push(TraceTable {
                name: MatrixName::from(name),
                source: matrix.source,
                target: matrix.target,
                path: self.resolve(&matrix.file),
                conversions: trace_cols.clone(),
            });
        }

        let overrides = match (self.overrides, file_overrides) {
            (Some(overrides), _) => overrides,
            (None, Some(value)) => ProjectOverrides::from_value(&value)?,
            (None, None) => ProjectOverrides::default(),
        };
        Ok(ProjectTables {
            layers,
            traces,
            overrides,
        })
    }

    fn resolve(&self, file: &str) -> PathBuf {
        resolve(&self.project_dir, file)
    }
}

impl DatasetCreator for SafaDatasetCreator {
    fn name(&self) -> &'static str {
        "safa"
    }

    fn create(&self) -> Result<TraceDataset, TraceError> {
        let dataset = self.read_tables()?.into_dataset(&self.options)?;
        log_created(self.name(), &dataset);
        Ok(dataset)
    }
}
