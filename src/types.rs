/// Artifact identifier, unique within its layer.
/// Examples: `RE-12`, `src/parser.rs`, `42`
pub type ArtifactId = String;
/// Raw or cleaned artifact body text.
/// Example: `The system shall parse configuration files.`
pub type Token = String;
/// Deterministic trace-link identifier derived from `(source.id, target.id)`.
pub type LinkId = u64;
/// Layer (artifact type) name declared by a project definition.
/// Examples: `Requirements`, `Code`, `Design`
pub type LayerName = String;
/// Name of a trace matrix declared by a project definition.
/// Example: `req2code`
pub type MatrixName = String;
/// Ground-truth `(source_id, target_id)` pair.
pub type TruePair = (ArtifactId, ArtifactId);
/// Flat metric report keyed by metric name.
/// Example: `{"map": 0.42, "map@1": 1.0, "f1": 0.18}`
pub type MetricReport = std::collections::BTreeMap<String, f64>;
