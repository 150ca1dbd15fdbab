use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::constants::creators::SPLIT_FILENAMES;
use crate::creators::{CreatorOptions, DatasetCreator, log_created};
use crate::data::{Artifact, TraceLink};
use crate::dataset::TraceDataset;
use crate::errors::TraceError;
use crate::types::ArtifactId;

const LINK_COLUMNS: [&str; 5] = ["source_id", "source_text", "target_id", "target_text", "label"];

#[derive(Debug, Deserialize)]
struct LinkRow {
    source_id: String,
    source_text: String,
    target_id: String,
    target_text: String,
    label: String,
}

#[derive(Serialize)]
struct LinkRecord<'a> {
    source_id: &'a str,
    source_text: &'a str,
    target_id: &'a str,
    target_text: &'a str,
    label: u8,
}

/// Creator reading one labeled link per CSV row.
///
/// Columns: `source_id, source_text, target_id, target_text, label` with
/// `label` in `{0, 1}`. No cross product is built; the first row for a pair
/// wins. `use_linked_targets_only` has no effect here.
#[derive(Clone, Debug)]
pub struct CsvDatasetCreator {
    path: PathBuf,
    options: CreatorOptions,
}

impl CsvDatasetCreator {
    /// Creator reading the link file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            options: CreatorOptions::default(),
        }
    }

    /// Replace the cleaning and target-filter options.
    pub fn with_options(mut self, options: CreatorOptions) -> Self {
        self.options = options;
        self
    }

    fn artifact(
        &self,
        cache: &mut HashMap<ArtifactId, Arc<Artifact>>,
        id: String,
        text: &str,
    ) -> Option<Arc<Artifact>> {
        if let Some(artifact) = cache.get(&id) {
            return Some(Arc::clone(artifact));
        }
        let artifact = self.options.cleaning.artifact(id.clone(), text)?;
        cache.insert(id, Arc::clone(&artifact));
        Some(artifact)
    }
}

impl DatasetCreator for CsvDatasetCreator {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn create(&self) -> Result<TraceDataset, TraceError> {
        let mut reader = csv::Reader::from_path(&self.path)?;
        let headers = reader.headers()?.clone();
        for column in LINK_COLUMNS {
            if !headers.iter().any(|header| header.trim() == column) {
                return Err(TraceError::Configuration(format!(
                    "{}: missing link column '{column}'",
                    self.path.display()
                )));
            }
        }

        let context = self.path.display().to_string();
        let mut sources = HashMap::new();
        let mut targets = HashMap::new();
        let mut links = Vec::new();
        let mut skipped = 0usize;
        for row in reader.deserialize::<LinkRow>() {
            let row = row?;
            let is_true_link = match row.label.trim() {
                "1" => true,
                "0" => false,
                other => {
                    return Err(TraceError::DataIntegrity {
                        context,
                        id: format!("{}->{}", row.source_id, row.target_id),
                        reason: format!("label '{other}' is not 0 or 1 for link"),
                    });
                }
            };
            let source = self.artifact(&mut sources, row.source_id, &row.source_text);
            let target = self.artifact(&mut targets, row.target_id, &row.target_text);
            match (source, target) {
                (Some(source), Some(target)) => {
                    links.push(TraceLink::new(source, target, is_true_link));
                }
                _ => skipped += 1,
            }
        }
        if skipped > 0 {
            debug!("[tracelinks:csv] {context}: dropped {skipped} rows with empty cleaned text");
        }
        let dataset = TraceDataset::from_links(links);
        log_created(self.name(), &dataset);
        Ok(dataset)
    }
}

/// Write every unique link of `dataset` in the CSV creator's column schema.
/// The header is written even for an empty dataset.
pub fn write_dataset_csv(dataset: &TraceDataset, path: &Path) -> Result<(), TraceError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(LINK_COLUMNS)?;
    for link in dataset.links().values() {
        writer.serialize(LinkRecord {
            source_id: &link.source.id,
            source_text: &link.source.token,
            target_id: &link.target.id,
            target_text: &link.target.token,
            label: link.label(),
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Persist up to three splits as `train.csv`, `val.csv`, `eval.csv` under `dir`.
pub fn save_split_csvs(dir: &Path, splits: &[TraceDataset]) -> Result<Vec<PathBuf>, TraceError> {
    if splits.len() > SPLIT_FILENAMES.len() {
        return Err(TraceError::Configuration(format!(
            "{} splits given but only {} split files are defined",
            splits.len(),
            SPLIT_FILENAMES.len()
        )));
    }
    fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(splits.len());
    for (split, filename) in splits.iter().zip(SPLIT_FILENAMES) {
        let path = dir.join(filename);
        write_dataset_csv(split, &path)?;
        info!(
            "[tracelinks:csv] wrote {} links to {}",
            split.len(),
            path.display()
        );
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::generate_link_id;
    use crate::utils::{CleaningStep, TextCleaner};
    use tempfile::tempdir;

    #[test]
    fn rows_become_links_without_cross_product() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("links.csv");
        fs::write(
            &path,
            "source_id,source_text,target_id,target_text,label\n\
             s1,alpha,t1,beta,1\n\
             s2,gamma,t1,beta,0\n\
             s1,alpha,t1,beta,0\n",
        )
        .unwrap();
        let dataset = CsvDatasetCreator::new(&path).create().unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.pos_link_ids(), &[generate_link_id("s1", "t1")]);
        assert_eq!(dataset.neg_link_ids(), &[generate_link_id("s2", "t1")]);
    }

    #[test]
    fn invalid_label_names_the_link() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("links.csv");
        fs::write(
            &path,
            "source_id,source_text,target_id,target_text,label\ns1,a,t1,b,yes\n",
        )
        .unwrap();
        let err = CsvDatasetCreator::new(&path).create().unwrap_err();
        assert!(matches!(err, TraceError::DataIntegrity { id, .. } if id == "s1->t1"));
    }

    #[test]
    fn missing_column_is_reported() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("links.csv");
        fs::write(&path, "source_id,target_id,label\ns1,t1,1\n").unwrap();
        let err = CsvDatasetCreator::new(&path).create().unwrap_err();
        assert!(matches!(err, TraceError::Configuration(msg) if msg.contains("source_text")));
    }

    #[test]
    fn rows_with_empty_cleaned_text_are_dropped() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("links.csv");
        fs::write(
            &path,
            "source_id,source_text,target_id,target_text,label\ns1,alpha,t1,beta,1\ns2,***,t1,beta,0\n",
        )
        .unwrap();
        let dataset = CsvDatasetCreator::new(&path)
            .with_options(CreatorOptions {
                cleaning: TextCleaner::new(vec![CleaningStep::RemoveUnwantedChars]),
                use_linked_targets_only: false,
            })
            .create()
            .unwrap();
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn saved_splits_round_trip() {
        let temp = tempdir().unwrap();
        let dataset = crate::test_support::grid(3, 3, |s, t| s == t);
        let (first, second) = {
            let mut ids: Vec<_> = dataset.links().keys().copied().collect();
            let tail = ids.split_off(5);
            (dataset.subset(&ids), dataset.subset(&tail))
        };
        let paths = save_split_csvs(temp.path(), &[first.clone(), second]).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("train.csv"));
        assert!(paths[1].ends_with("val.csv"));

        let reread = CsvDatasetCreator::new(&paths[0]).create().unwrap();
        assert_eq!(reread.len(), first.len());
        for (id, link) in first.links() {
            let copy = reread.link(*id).unwrap();
            assert_eq!(copy.is_true_link, link.is_true_link);
            assert_eq!(copy.source.token, link.source.token);
        }
    }

    #[test]
    fn empty_split_reads_back_empty() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("eval.csv");
        write_dataset_csv(&TraceDataset::default(), &path).unwrap();
        assert!(CsvDatasetCreator::new(&path).create().unwrap().is_empty());
    }

    #[test]
    fn too_many_splits_are_rejected() {
        let temp = tempdir().unwrap();
        let splits = vec![TraceDataset::default(); 4];
        assert!(matches!(
            save_split_csvs(temp.path(), &splits),
            Err(TraceError::Configuration(_))
        ));
    }
}
