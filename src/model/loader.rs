use std::{fs, path::Path};

use crate::{
    error::StartupError,
    model::{ModelMetadata, ModelPipeline},
};

pub struct ModelArtifact {
    pub pipeline: ModelPipeline,
    pub metadata: ModelMetadata,
}

impl ModelArtifact {
    pub fn load(path: &Path) -> Result<Self, StartupError> {
        if !path.exists() {
            return Err(StartupError::ModelMissing(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path)?;
        let pipeline: ModelPipeline = serde_json::from_str(&raw)?;
        pipeline.check()?;

        let metadata = ModelMetadata {
            estimator: pipeline.estimator.kind().to_string(),
            scaled: pipeline.scaler.is_some(),
            size_bytes: raw.len() as u64,
        };

        Ok(Self { pipeline, metadata })
    }
}
