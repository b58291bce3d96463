use serde::Serialize;
use sha2::{Digest, Sha256};

/// Builds the cache key for a validated request body.
///
/// The body is hashed in its canonical serialized form, so the raw
/// payload's key order or number spelling never changes the key.
pub fn fingerprint<B: Serialize>(
    prefix: &str,
    route: &str,
    body: &B,
) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_vec(body)?;
    let mut hasher = Sha256::new();
    hasher.update(route.as_bytes());
    hasher.update([0u8]);
    hasher.update(&canonical);
    Ok(format!("{prefix}:{route}:{}", hex::encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::schema::validate_record;

    #[test]
    fn equivalent_payloads_share_a_key() {
        let a = validate_record(&json!({
            "MedInc": 8.3252, "HouseAge": 41, "AveRooms": 6.984127, "AveBedrms": 1.02381,
            "Population": 322, "AveOccup": 2.555556, "Latitude": 37.88, "Longitude": -122.23
        }))
        .unwrap();
        let b = validate_record(&json!({
            "Longitude": -122.23, "Latitude": "37.88", "AveOccup": 2.555556, "Population": 322.0,
            "AveBedrms": 1.02381, "AveRooms": 6.984127, "HouseAge": 41.0, "MedInc": 8.3252
        }))
        .unwrap();
        assert_eq!(
            fingerprint("p", "/predict", &a).unwrap(),
            fingerprint("p", "/predict", &b).unwrap()
        );
    }

    #[test]
    fn route_and_body_change_the_key() {
        let body = json!({ "x": 1 });
        let base = fingerprint("p", "/predict", &body).unwrap();
        assert!(base.starts_with("p:/predict:"));
        assert_eq!(base.len(), "p:/predict:".len() + 64);
        assert_ne!(base, fingerprint("p", "/bulk-predict", &body).unwrap());
        assert_ne!(base, fingerprint("p", "/predict", &json!({ "x": 2 })).unwrap());
    }
}
