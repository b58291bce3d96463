use std::{path::Path, sync::Arc};

use ndarray::{Array1, Array2, Axis};
use tokio::task;

use crate::{
    error::{ServiceError, StartupError},
    features::{feature_matrix, feature_vector},
    model::{HousingRecord, ModelMetadata, Regressor, loader::ModelArtifact},
};

/// Runs the process-wide model. Cloning shares the same model.
#[derive(Clone)]
pub struct Predictor {
    model: Arc<dyn Regressor>,
    metadata: Option<ModelMetadata>,
}

impl Predictor {
    pub fn new(model: Arc<dyn Regressor>) -> Self {
        Self {
            model,
            metadata: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self, StartupError> {
        let artifact = ModelArtifact::load(path)?;
        Ok(Self {
            model: Arc::new(artifact.pipeline),
            metadata: Some(artifact.metadata),
        })
    }

    pub fn metadata(&self) -> Option<&ModelMetadata> {
        self.metadata.as_ref()
    }

    pub async fn predict_one(&self, record: HousingRecord) -> Result<f64, ServiceError> {
        let features = feature_vector(&record).insert_axis(Axis(0));
        let predictions = self.spawn_inference(features).await?;
        predictions
            .first()
            .copied()
            .ok_or_else(|| ServiceError::Inference("model returned no prediction".into()))
    }

    /// Predictions come back in the same order as `records`.
    pub async fn predict_batch(&self, records: &[HousingRecord]) -> Result<Vec<f64>, ServiceError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let predictions = self.spawn_inference(feature_matrix(records)).await?;
        Ok(predictions.to_vec())
    }

    async fn spawn_inference(&self, features: Array2<f64>) -> Result<Array1<f64>, ServiceError> {
        let model = self.model.clone();
        let rows = features.nrows();

        let predictions = task::spawn_blocking(move || model.predict(features.view()))
            .await
            .map_err(|err| ServiceError::Inference(format!("inference task failed: {err}")))??;

        if predictions.len() != rows {
            return Err(ServiceError::Inference(format!(
                "model returned {} predictions for {rows} rows",
                predictions.len()
            )));
        }
        Ok(predictions)
    }
}
