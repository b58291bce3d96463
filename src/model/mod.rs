mod loader;
mod pipeline;
mod predictor;
mod types;

pub use loader::ModelArtifact;
pub use pipeline::{Estimator, ModelPipeline, RegressionTree, Regressor, StandardScaler, TreeNode};
pub use predictor::Predictor;
pub use types::{
    BulkPredictionRequest, BulkPredictionResponse, HousingRecord, ModelMetadata,
    PredictionResponse,
};
