//! Artifact and trace table readers shared by the project creators.
//!
//! Tables are `.csv` (header row) or `.json` (an array of row objects, or an
//! object wrapping that array under `artifacts`/`traces`). Column names are
//! matched case-insensitively and renamed through per-table conversions into
//! the canonical `id`/`content` and `source`/`target` columns.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, warn};

use crate::constants::creators::{
    ARTIFACTS_KEY, CONTENT_COLUMN, ID_COLUMN, SOURCE_COLUMN, TARGET_COLUMN, TRACES_KEY,
};
use crate::creators::ArtifactLayer;
use crate::errors::TraceError;
use crate::transport::fs::FileFormat;
use crate::types::TruePair;

/// Column renames applied to a table, `original -> canonical`.
pub type ColumnConversions = IndexMap<String, String>;

type Row = HashMap<String, String>;

/// Handling of trace rows that reference artifacts absent from their tables.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectOverrides {
    /// Skip (with a warning) traces whose source artifact is missing.
    pub allow_missing_source: bool,
    /// Skip (with a warning) traces whose target artifact is missing.
    pub allow_missing_target: bool,
}

impl ProjectOverrides {
    /// Parse `{"ALLOW_MISSING_SOURCE": bool, ...}` with keys matched in any case.
    pub fn from_value(value: &Value) -> Result<Self, TraceError> {
        parse_uncased(value, "overrides")
    }
}

/// Deserialize `value` after lowercasing its top-level object keys.
pub(crate) fn parse_uncased<T: DeserializeOwned>(value: &Value, context: &str) -> Result<T, TraceError> {
    let object = uncased_object(value, context)?;
    serde_json::from_value(Value::Object(object))
        .map_err(|err| TraceError::Configuration(format!("{context}: {err}")))
}

/// Copy of a JSON object with lowercased keys.
pub(crate) fn uncased_object(value: &Value, context: &str) -> Result<Map<String, Value>, TraceError> {
    let object = value.as_object().ok_or_else(|| {
        TraceError::Configuration(format!("{context}: expected a JSON object"))
    })?;
    Ok(object
        .iter()
        .map(|(key, value)| (key.to_lowercase(), value.clone()))
        .collect())
}

/// Read an artifact table into a layer keyed by the canonical id column.
pub fn read_artifacts(
    path: &Path,
    conversions: &ColumnConversions,
) -> Result<ArtifactLayer, TraceError> {
    let rows = read_table(path, ARTIFACTS_KEY, conversions)?;
    let mut layer = ArtifactLayer::with_capacity(rows.len());
    for row in rows {
        let id = required(&row, ID_COLUMN, path)?;
        let content = required(&row, CONTENT_COLUMN, path)?;
        if layer.insert(id.clone(), content).is_some() {
            return Err(TraceError::DataIntegrity {
                context: path.display().to_string(),
                id,
                reason: "duplicate artifact id".into(),
            });
        }
    }
    debug!(
        "[tracelinks:readers] read {} artifacts from {}",
        layer.len(),
        path.display()
    );
    Ok(layer)
}

/// Read a trace table into `(source, target)` pairs in row order.
pub fn read_traces(
    path: &Path,
    conversions: &ColumnConversions,
) -> Result<Vec<TruePair>, TraceError> {
    read_table(path, TRACES_KEY, conversions)?
        .into_iter()
        .map(|row| -> Result<TruePair, TraceError> {
            Ok((
                required(&row, SOURCE_COLUMN, path)?,
                required(&row, TARGET_COLUMN, path)?,
            ))
        })
        .collect()
}

/// Drop or reject traces whose endpoints are missing from their layers.
pub fn check_trace_references(
    context: &str,
    traces: Vec<TruePair>,
    sources: &ArtifactLayer,
    targets: &ArtifactLayer,
    overrides: ProjectOverrides,
) -> Result<Vec<TruePair>, TraceError> {
    let mut kept = Vec::with_capacity(traces.len());
    for (source, target) in traces {
        if !sources.contains_key(&source) {
            if !overrides.allow_missing_source {
                return Err(TraceError::missing_artifact(context, source, "source"));
            }
            warn!("[tracelinks:readers] {context}: skipping trace from missing source '{source}'");
            continue;
        }
        if !targets.contains_key(&target) {
            if !overrides.allow_missing_target {
                return Err(TraceError::missing_artifact(context, target, "target"));
            }
            warn!("[tracelinks:readers] {context}: skipping trace to missing target '{target}'");
            continue;
        }
        kept.push((source, target));
    }
    Ok(kept)
}

fn read_table(
    path: &Path,
    wrapper_key: &str,
    conversions: &ColumnConversions,
) -> Result<Vec<Row>, TraceError> {
    let rows = match FileFormat::from_path(path)? {
        FileFormat::Csv => read_csv_rows(path)?,
        FileFormat::Json => read_json_rows(path, wrapper_key)?,
    };
    let conversions: HashMap<String, &str> = conversions
        .iter()
        .map(|(original, canonical)| (original.to_lowercase(), canonical.as_str()))
        .collect();
    Ok(rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|(column, value)| match conversions.get(&column) {
                    Some(canonical) => (canonical.to_lowercase(), value),
                    None => (column, value),
                })
                .collect()
        })
        .collect())
}

fn read_csv_rows(path: &Path) -> Result<Vec<Row>, TraceError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|header| header.trim().to_lowercase())
        .collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            headers
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect(),
        );
    }
    Ok(rows)
}

fn read_json_rows(path: &Path, wrapper_key: &str) -> Result<Vec<Row>, TraceError> {
    let value: Value = serde_json::from_reader(BufReader::new(File::open(path)?))?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(object) => object
            .into_iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(wrapper_key))
            .and_then(|(_, rows)| match rows {
                Value::Array(items) => Some(items),
                _ => None,
            })
            .ok_or_else(|| {
                TraceError::Configuration(format!(
                    "{}: expected an array of rows under '{wrapper_key}'",
                    path.display()
                ))
            })?,
        _ => {
            return Err(TraceError::Configuration(format!(
                "{}: expected an array of rows",
                path.display()
            )));
        }
    };
    items
        .into_iter()
        .map(|item| json_row(item, path))
        .collect()
}

fn json_row(item: Value, path: &Path) -> Result<Row, TraceError> {
    let Value::Object(object) = item else {
        return Err(TraceError::Configuration(format!(
            "{}: every row must be a JSON object",
            path.display()
        )));
    };
    let mut row = Row::with_capacity(object.len());
    for (key, value) in object {
        let text = match value {
            Value::String(text) => text,
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            Value::Null | Value::Array(_) | Value::Object(_) => continue,
        };
        row.insert(key.to_lowercase(), text);
    }
    Ok(row)
}

fn required(row: &Row, column: &str, path: &Path) -> Result<String, TraceError> {
    row.get(column).cloned().ok_or_else(|| {
        TraceError::Configuration(format!(
            "{}: row is missing column '{column}'",
            path.display()
        ))
    })
}
