use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One district of the California housing dataset.
///
/// Records that reach the model have passed [`crate::schema::validate_record`],
/// so the latitude/longitude bounds hold for them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "PascalCase")]
pub struct HousingRecord {
    pub med_inc: f64,
    pub house_age: f64,
    pub ave_rooms: f64,
    pub ave_bedrms: f64,
    pub population: f64,
    pub ave_occup: f64,
    /// Must be in the range of -90 to 90.
    pub latitude: f64,
    /// Must be in the range of -180 to 180.
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct BulkPredictionRequest {
    pub houses: Vec<HousingRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PredictionResponse {
    pub prediction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BulkPredictionResponse {
    pub predictions: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct ModelMetadata {
    pub estimator: String,
    pub scaled: bool,
    pub size_bytes: u64,
}
