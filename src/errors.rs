use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Error type for dataset creation, splitting, and metric failures.
#[derive(Debug, Error)]
pub enum TraceError {
    /// Input data breaks a structural rule (dangling reference, duplicate id).
    #[error("data integrity error in '{context}': {reason} '{id}'")]
    DataIntegrity {
        /// File, table, or structure being read.
        context: String,
        /// Offending artifact or link id.
        id: String,
        /// What went wrong.
        reason: String,
    },
    /// A project file has an extension no reader handles.
    #[error("unsupported project file format '{extension}' for {}", path.display())]
    UnsupportedFormat {
        /// File that was rejected.
        path: PathBuf,
        /// Its extension, lowercased.
        extension: String,
    },
    /// A strategy cannot honor the requested percentage.
    #[error("cannot split at percentage {percentage}: {reason}")]
    SplitFeasibility {
        /// Requested share of the second side.
        percentage: f64,
        /// Why the split is infeasible.
        reason: String,
    },
    /// Every query yielded an undefined value.
    #[error("all {queries} queries produced undefined metric values")]
    NoValidQueries {
        /// Number of queries inspected.
        queries: usize,
    },
    /// A global metric has no defined value for the input.
    #[error("metric '{metric}' is undefined: {reason}")]
    UndefinedMetric {
        /// Metric name.
        metric: String,
        /// Why it is undefined.
        reason: String,
    },
    /// Invalid arguments or configuration values.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// CSV read or write failure.
    #[error(transparent)]
    Csv(#[from] csv::Error),
    /// JSON parse failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl TraceError {
    pub(crate) fn missing_artifact(
        context: impl Into<String>,
        id: impl Into<String>,
        role: &str,
    ) -> Self {
        TraceError::DataIntegrity {
            context: context.into(),
            id: id.into(),
            reason: format!("trace references missing {role} artifact"),
        }
    }
}
