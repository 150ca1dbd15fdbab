use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

use crate::errors::TraceError;

/// Table formats understood by the project readers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    /// Comma-separated table with a header row.
    Csv,
    /// Array of row objects, optionally wrapped in an object.
    Json,
}

impl FileFormat {
    /// Detect the format from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Result<Self, TraceError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        if extension.eq_ignore_ascii_case("csv") {
            Ok(FileFormat::Csv)
        } else if extension.eq_ignore_ascii_case("json") {
            Ok(FileFormat::Json)
        } else {
            Err(TraceError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension: extension.to_string(),
            })
        }
    }
}

/// Every regular file under `root`, sorted by path so listings are reproducible.
pub fn list_files(root: &Path) -> Result<Vec<PathBuf>, TraceError> {
    if !root.is_dir() {
        return Err(TraceError::Configuration(format!(
            "expected a directory at {}",
            root.display()
        )));
    }
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.path().to_path_buf())
        .collect();
    files.sort();
    Ok(files)
}

/// Read a file as UTF-8 text, or `None` (with a warning) when it cannot be read.
pub fn read_text_or_skip(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(err) => {
            warn!(
                "[tracelinks:fs] skipping unreadable file {}: {err}",
                path.display()
            );
            None
        }
    }
}

/// `path` relative to `root` with `/` separators, used as a stable artifact id.
pub fn relative_id(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Resolve `path` against `base` unless it is already absolute.
pub fn resolve(base: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn detects_formats_case_insensitively() {
        assert_eq!(FileFormat::from_path(Path::new("a/b.CSV")).unwrap(), FileFormat::Csv);
        assert_eq!(FileFormat::from_path(Path::new("b.json")).unwrap(), FileFormat::Json);
        let err = FileFormat::from_path(Path::new("b.xlsx")).unwrap_err();
        assert!(matches!(err, TraceError::UnsupportedFormat { extension, .. } if extension == "xlsx"));
    }

    #[test]
    fn lists_nested_files_in_sorted_order() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("nested")).unwrap();
        for name in ["b.txt", "a.txt", "nested/c.txt"] {
            fs::write(root.join(name), name).unwrap();
        }
        let ids: Vec<String> = list_files(root)
            .unwrap()
            .iter()
            .map(|path| relative_id(root, path))
            .collect();
        assert_eq!(ids, vec!["a.txt", "b.txt", "nested/c.txt"]);
    }

    #[test]
    fn missing_directory_is_a_configuration_error() {
        let temp = tempdir().unwrap();
        assert!(matches!(
            list_files(&temp.path().join("absent")),
            Err(TraceError::Configuration(_))
        ));
    }

    #[test]
    fn unreadable_text_is_skipped() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("binary.bin");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        assert!(read_text_or_skip(&path).is_none());
        assert!(read_text_or_skip(&temp.path().join("absent.txt")).is_none());
    }

    #[test]
    fn resolves_relative_paths_against_base() {
        let base = Path::new("/project");
        assert_eq!(resolve(base, "reqs.csv"), PathBuf::from("/project/reqs.csv"));
        assert_eq!(resolve(base, "/abs/reqs.csv"), PathBuf::from("/abs/reqs.csv"));
    }
}
