use crate::creators::{
    ArtifactLayer, CreatorOptions, DatasetCreator, build_layered_dataset, log_created,
};
use crate::dataset::TraceDataset;
use crate::errors::TraceError;
use crate::types::{ArtifactId, TruePair};

/// Creator over in-memory artifact layers and ground-truth pairs.
///
/// `source_layers[i]` is crossed with `target_layers[i]`; every pair listed in
/// `true_links` becomes a positive link, every other generated pair negative.
#[derive(Clone, Debug)]
pub struct ClassicTraceCreator {
    source_layers: Vec<ArtifactLayer>,
    target_layers: Vec<ArtifactLayer>,
    true_links: Vec<TruePair>,
    options: CreatorOptions,
}

impl ClassicTraceCreator {
    /// Validate layer pairing and capture the inputs.
    pub fn new<I, S, T>(
        source_layers: Vec<ArtifactLayer>,
        target_layers: Vec<ArtifactLayer>,
        true_links: I,
    ) -> Result<Self, TraceError>
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<ArtifactId>,
        T: Into<ArtifactId>,
    {
        if source_layers.len() != target_layers.len() {
            return Err(TraceError::Configuration(format!(
                "{} source layers paired with {} target layers",
                source_layers.len(),
                target_layers.len()
            )));
        }
        Ok(Self {
            source_layers,
            target_layers,
            true_links: true_links
                .into_iter()
                .map(|(source, target)| (source.into(), target.into()))
                .collect(),
            options: CreatorOptions::default(),
        })
    }

    /// Replace cleaning and target filtering options.
    pub fn with_options(mut self, options: CreatorOptions) -> Self {
        self.options = options;
        self
    }
}

impl DatasetCreator for ClassicTraceCreator {
    fn name(&self) -> &'static str {
        "classic"
    }

    fn create(&self) -> Result<TraceDataset, TraceError> {
        let dataset = build_layered_dataset(
            &self.source_layers,
            &self.target_layers,
            &self.true_links,
            &self.options,
        )?;
        log_created(self.name(), &dataset);
        Ok(dataset)
    }
}
