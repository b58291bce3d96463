//! Conversion from validated records to model inputs.
//!
//! The column order below is a contract with the model artifact. Changing it
//! requires retraining.

use ndarray::{Array1, Array2};

use crate::model::HousingRecord;

pub const FEATURE_COUNT: usize = 8;

pub const FEATURE_ORDER: [&str; FEATURE_COUNT] = [
    "MedInc",
    "HouseAge",
    "AveRooms",
    "AveBedrms",
    "Population",
    "AveOccup",
    "Latitude",
    "Longitude",
];

impl HousingRecord {
    pub fn from_features(values: [f64; FEATURE_COUNT]) -> Self {
        let [
            med_inc,
            house_age,
            ave_rooms,
            ave_bedrms,
            population,
            ave_occup,
            latitude,
            longitude,
        ] = values;
        Self {
            med_inc,
            house_age,
            ave_rooms,
            ave_bedrms,
            population,
            ave_occup,
            latitude,
            longitude,
        }
    }

    pub fn to_features(&self) -> [f64; FEATURE_COUNT] {
        [
            self.med_inc,
            self.house_age,
            self.ave_rooms,
            self.ave_bedrms,
            self.population,
            self.ave_occup,
            self.latitude,
            self.longitude,
        ]
    }
}

pub fn feature_vector(record: &HousingRecord) -> Array1<f64> {
    Array1::from(record.to_features().to_vec())
}

/// Stacks records into an `(N, 8)` matrix, one row per record in input order.
pub fn feature_matrix(records: &[HousingRecord]) -> Array2<f64> {
    let mut matrix = Array2::zeros((records.len(), FEATURE_COUNT));
    for (mut row, record) in matrix.rows_mut().into_iter().zip(records) {
        row.assign(&Array1::from(record.to_features().to_vec()));
    }
    matrix
}
