/// Constants used by split strategies and the splitter.
pub mod splits {
    /// Seed used when the caller does not provide one.
    pub const DEFAULT_SEED: u64 = 0;
    /// Whole sources reserved for the second slice by the combination strategy.
    pub const DEFAULT_COMBINATION_SOURCES: usize = 2;
    /// Tolerance applied when checking that split percentages sum to at most one.
    pub const PERCENT_SUM_EPSILON: f64 = 1e-9;
    /// Registry name of the label-stratified random strategy.
    pub const STRATEGY_RANDOM: &str = "random";
    /// Registry name of the source-stratified random strategy.
    pub const STRATEGY_SOURCE_RANDOM: &str = "source_random";
    /// Registry name of the no-op remainder strategy.
    pub const STRATEGY_REMAINDER: &str = "remainder";
    /// Registry name of the reserved-sources combination strategy.
    pub const STRATEGY_COMBINATION: &str = "combination";
}

/// Constants used by metric computation and report keys.
pub mod metrics {
    /// Default cutoffs for MAP@k and precision@k.
    pub const DEFAULT_K_VALUES: [usize; 3] = [1, 2, 3];
    /// Default score threshold for recall.
    pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.5;
    /// Default recall target used to pick an operating threshold.
    pub const DEFAULT_UPPER_RECALL: f64 = 0.95;
    /// Report key for mean average precision.
    pub const MAP_KEY: &str = "map";
    /// Report key prefix for MAP@k (`map@1`).
    pub const MAP_AT_K_PREFIX: &str = "map@";
    /// Report key prefix for precision@k (`precision@1`).
    pub const PRECISION_AT_K_PREFIX: &str = "precision@";
    /// Report key for per-query recall at the score threshold.
    pub const RECALL_KEY: &str = "recall";
    /// Report key for the score threshold reaching the upper recall target.
    pub const UPPER_RECALL_THRESHOLD_KEY: &str = "upper_recall_threshold";
    /// Report key for global precision at the upper recall threshold.
    pub const UPPER_RECALL_PRECISION_KEY: &str = "precision@upper_recall";
    /// Report key for max F1.
    pub const F1_KEY: &str = "f1";
    /// Report key for max F2.
    pub const F2_KEY: &str = "f2";
}

/// Constants used by dataset creators and persisted split files.
pub mod creators {
    /// Canonical artifact-table id column.
    pub const ID_COLUMN: &str = "id";
    /// Canonical artifact-table body column.
    pub const CONTENT_COLUMN: &str = "content";
    /// Canonical trace-table source column.
    pub const SOURCE_COLUMN: &str = "source";
    /// Canonical trace-table target column.
    pub const TARGET_COLUMN: &str = "target";
    /// Row wrapper key for JSON artifact tables.
    pub const ARTIFACTS_KEY: &str = "artifacts";
    /// Row wrapper key for JSON trace tables.
    pub const TRACES_KEY: &str = "traces";
    /// Default structured-project definition file name.
    pub const STRUCTURED_DEFINITION_FILE: &str = "definition.json";
    /// SAFA project definition file name.
    pub const SAFA_DEFINITION_FILE: &str = "tim.json";
    /// SAFA definition key listing artifact tables.
    pub const SAFA_DATAFILES_KEY: &str = "datafiles";
    /// SAFA artifact-table column aliases mapped to canonical names.
    pub const SAFA_ARTIFACT_COLUMNS: [(&str, &str); 2] = [("name", "id"), ("body", "content")];
    /// SAFA trace-table column aliases mapped to canonical names.
    pub const SAFA_TRACE_COLUMNS: [(&str, &str); 2] =
        [("sourcename", "source"), ("targetname", "target")];
    /// Persisted split file names in slice order.
    pub const SPLIT_FILENAMES: [&str; 3] = ["train.csv", "val.csv", "eval.csv"];
}
