use std::fs;
use std::path::{Path, PathBuf};

use crate::creators::readers::{ProjectOverrides, check_trace_references};
use crate::creators::{
    ArtifactLayer, CreatorOptions, DatasetCreator, build_layered_dataset, log_created,
};
use crate::dataset::TraceDataset;
use crate::errors::TraceError;
use crate::transport::fs::{list_files, read_text_or_skip, relative_id};
use crate::types::TruePair;

const DEFAULT_SOURCE_DIR: &str = "sources";
const DEFAULT_TARGET_DIR: &str = "targets";
const DEFAULT_ANSWER_SET: &str = "answer.txt";

/// Creator for Coest-style projects: one directory per layer, one artifact
/// per file (id = path relative to the layer directory, token = file text),
/// and an answer-set file listing true `source target` pairs per line.
#[derive(Clone, Debug)]
pub struct CoestDatasetCreator {
    project_dir: PathBuf,
    source_dir: String,
    target_dir: String,
    answer_set: String,
    overrides: ProjectOverrides,
    options: CreatorOptions,
}

impl CoestDatasetCreator {
    /// Layout defaults: `sources/`, `targets/`, `answer.txt`.
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            source_dir: DEFAULT_SOURCE_DIR.into(),
            target_dir: DEFAULT_TARGET_DIR.into(),
            answer_set: DEFAULT_ANSWER_SET.into(),
            overrides: ProjectOverrides::default(),
            options: CreatorOptions::default(),
        }
    }

    /// Replace the cleaning and target-filter options.
    pub fn with_options(mut self, options: CreatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Source layer directory, relative to the project.
    pub fn with_source_dir(mut self, dir: impl Into<String>) -> Self {
        self.source_dir = dir.into();
        self
    }

    /// Target layer directory, relative to the project.
    pub fn with_target_dir(mut self, dir: impl Into<String>) -> Self {
        self.target_dir = dir.into();
        self
    }

    /// Answer set file, relative to the project.
    pub fn with_answer_set(mut self, file: impl Into<String>) -> Self {
        self.answer_set = file.into();
        self
    }

    /// Allow answer-set entries naming missing artifacts.
    pub fn with_overrides(mut self, overrides: ProjectOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

fn read_layer(dir: &Path) -> Result<ArtifactLayer, TraceError> {
    let mut layer = ArtifactLayer::new();
    for path in list_files(dir)? {
        if let Some(text) = read_text_or_skip(&path) {
            layer.insert(relative_id(dir, &path), text);
        }
    }
    Ok(layer)
}

/// Parse `source target` pairs, split on commas or whitespace.
fn parse_answer_set(path: &Path) -> Result<Vec<TruePair>, TraceError> {
    let text = fs::read_to_string(path)?;
    let mut pairs = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line
            .split(|ch: char| ch == ',' || ch.is_whitespace())
            .filter(|field| !field.is_empty())
            .collect();
        match fields.as_slice() {
            [source, target] => pairs.push((source.to_string(), target.to_string())),
            _ => {
                return Err(TraceError::DataIntegrity {
                    context: format!("{}:{}", path.display(), line_no + 1),
                    id: line.to_string(),
                    reason: "answer set line must hold exactly a source and a target".into(),
                });
            }
        }
    }
    Ok(pairs)
}

impl DatasetCreator for CoestDatasetCreator {
    fn name(&self) -> &'static str {
        "coest"
    }

    fn create(&self) -> Result<TraceDataset, TraceError> {
        let sources = read_layer(&self.project_dir.join(&self.source_dir))?;
        let targets = read_layer(&self.project_dir.join(&self.target_dir))?;
        let answer_path = self.project_dir.join(&self.answer_set);
        let true_links = check_trace_references(
            &self.answer_set,
            parse_answer_set(&answer_path)?,
            &sources,
            &targets,
            self.overrides,
        )?;
        let dataset = build_layered_dataset(&[sources], &[targets], &true_links, &self.options)?;
        log_created(self.name(), &dataset);
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::generate_link_id;
    use tempfile::tempdir;

    fn write_project(root: &Path, answers: &str) {
        fs::create_dir_all(root.join("sources")).unwrap();
        fs::create_dir_all(root.join("targets")).unwrap();
        fs::write(root.join("sources/UC1.txt"), "withdraw cash").unwrap();
        fs::write(root.join("sources/UC2.txt"), "check balance").unwrap();
        fs::write(root.join("targets/Atm.java"), "class Atm").unwrap();
        fs::write(root.join("targets/Ledger.java"), "class Ledger").unwrap();
        fs::write(root.join("answer.txt"), answers).unwrap();
    }

    #[test]
    fn files_become_artifacts_and_answers_become_true_links() {
        let temp = tempdir().unwrap();
        write_project(
            temp.path(),
            "# use case -> class\nUC1.txt Atm.java\n\nUC2.txt,Ledger.java\n",
        );
        let dataset = CoestDatasetCreator::new(temp.path()).create().unwrap();
        assert_eq!(dataset.len(), 4);
        assert_eq!(dataset.pos_link_ids().len(), 2);
        let link = dataset.link(generate_link_id("UC1.txt", "Atm.java")).unwrap();
        assert_eq!(link.source.token, "withdraw cash");
    }

    #[test]
    fn malformed_answer_line_is_rejected() {
        let temp = tempdir().unwrap();
        write_project(temp.path(), "UC1.txt\n");
        let err = CoestDatasetCreator::new(temp.path()).create().unwrap_err();
        assert!(matches!(err, TraceError::DataIntegrity { context, .. } if context.ends_with(":1")));
    }

    #[test]
    fn unknown_answer_ids_respect_overrides() {
        let temp = tempdir().unwrap();
        write_project(temp.path(), "UC1.txt Atm.java\nUC1.txt Missing.java\n");
        assert!(matches!(
            CoestDatasetCreator::new(temp.path()).create(),
            Err(TraceError::DataIntegrity { id, .. }) if id == "Missing.java"
        ));
        let dataset = CoestDatasetCreator::new(temp.path())
            .with_overrides(ProjectOverrides {
                allow_missing_source: false,
                allow_missing_target: true,
            })
            .create()
            .unwrap();
        assert_eq!(dataset.pos_link_ids().len(), 1);
    }

    #[test]
    fn custom_layout_names() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("req")).unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("req/R1"), "store orders").unwrap();
        fs::write(temp.path().join("src/orders.rs"), "fn store").unwrap();
        fs::write(temp.path().join("oracle.csv"), "R1,orders.rs\n").unwrap();
        let dataset = CoestDatasetCreator::new(temp.path())
            .with_source_dir("req")
            .with_target_dir("src")
            .with_answer_set("oracle.csv")
            .create()
            .unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.pos_link_ids().len(), 1);
    }
}
