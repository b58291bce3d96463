//! Request validation for the prediction endpoints.
//!
//! A [`Schema`] is a list of numeric [`FieldDescriptor`]s evaluated uniformly
//! against a JSON object. Every violation is collected before returning, in
//! field declaration order followed by any unexpected keys, and batches
//! report records in input order.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::features::FEATURE_COUNT;
use crate::model::{BulkPredictionRequest, HousingRecord};

pub const MSG_EXTRA_FORBIDDEN: &str = "Extra inputs are not permitted";
pub const MSG_MISSING: &str = "Field required";
pub const MSG_FLOAT_PARSING: &str =
    "Input should be a valid number, unable to parse string as a number";
pub const MSG_FLOAT_TYPE: &str = "Input should be a valid number";
pub const MSG_FINITE_NUMBER: &str = "Input should be a finite number";
pub const MSG_OBJECT_TYPE: &str =
    "Input should be a valid dictionary or object to extract fields from";
pub const MSG_LIST_TYPE: &str = "Input should be a valid list";
pub const MSG_JSON_INVALID: &str = "JSON decode error";

/// Post-coercion check for a single field. The error string becomes the
/// `Value error, ...` message.
pub type RangeCheck = fn(&'static str, f64) -> Result<(), String>;

#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub check: Option<RangeCheck>,
}

impl FieldDescriptor {
    pub const fn number(name: &'static str) -> Self {
        Self { name, check: None }
    }

    pub const fn bounded(name: &'static str, check: RangeCheck) -> Self {
        Self {
            name,
            check: Some(check),
        }
    }
}

#[derive(Debug)]
pub struct Schema {
    fields: &'static [FieldDescriptor],
}

fn check_latitude(name: &'static str, v: f64) -> Result<(), String> {
    if (-90.0..=90.0).contains(&v) {
        Ok(())
    } else {
        Err(format!("Invalid value for {name}"))
    }
}

fn check_longitude(name: &'static str, v: f64) -> Result<(), String> {
    if (-180.0..=180.0).contains(&v) {
        Ok(())
    } else {
        Err(format!("Invalid value for {name}"))
    }
}

/// Field order here is the feature order the model was trained on.
pub static HOUSING_SCHEMA: Schema = Schema {
    fields: &[
        FieldDescriptor::number("MedInc"),
        FieldDescriptor::number("HouseAge"),
        FieldDescriptor::number("AveRooms"),
        FieldDescriptor::number("AveBedrms"),
        FieldDescriptor::number("Population"),
        FieldDescriptor::number("AveOccup"),
        FieldDescriptor::bounded("Latitude", check_latitude),
        FieldDescriptor::bounded("Longitude", check_longitude),
    ],
};

/// One segment of an error location: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(untagged)]
pub enum LocItem {
    Key(String),
    Index(usize),
}

impl From<&str> for LocItem {
    fn from(key: &str) -> Self {
        LocItem::Key(key.to_string())
    }
}

impl From<usize> for LocItem {
    fn from(index: usize) -> Self {
        LocItem::Index(index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    ExtraForbidden,
    Missing,
    FloatParsing,
    FloatType,
    FiniteNumber,
    ValueError,
    ModelAttributesType,
    ListType,
    JsonInvalid,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ValidationIssue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub loc: Vec<LocItem>,
    pub msg: String,
    #[schema(value_type = Object)]
    pub input: Value,
}

impl ValidationIssue {
    fn new(kind: IssueKind, loc: Vec<LocItem>, msg: impl Into<String>, input: Value) -> Self {
        Self {
            kind,
            loc,
            msg: msg.into(),
            input,
        }
    }
}

/// Body of every 422 response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ValidationErrorResponse {
    pub detail: Vec<ValidationIssue>,
}

/// A non-empty, ordered list of validation issues.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationErrors(Vec<ValidationIssue>);

impl ValidationErrors {
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.0
    }

    pub fn into_issues(self) -> Vec<ValidationIssue> {
        self.0
    }

    pub fn missing_query(name: &str) -> Self {
        Self(vec![ValidationIssue::new(
            IssueKind::Missing,
            vec!["query".into(), name.into()],
            MSG_MISSING,
            Value::Null,
        )])
    }

    pub fn missing_body() -> Self {
        Self(vec![ValidationIssue::new(
            IssueKind::Missing,
            vec!["body".into()],
            MSG_MISSING,
            Value::Null,
        )])
    }

    pub fn json_invalid(err: &serde_json::Error) -> Self {
        Self(vec![ValidationIssue::new(
            IssueKind::JsonInvalid,
            vec!["body".into(), err.column().into()],
            MSG_JSON_INVALID,
            serde_json::json!({ "error": err.to_string() }),
        )])
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.0.len())?;
        for issue in &self.0 {
            write!(f, "; {}", issue.msg)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

enum Coercion {
    Number(f64),
    Invalid(IssueKind, &'static str),
}

fn coerce_number(raw: &Value) -> Coercion {
    let parsed = match raw {
        Value::Number(n) => match n.as_f64() {
            Some(v) => v,
            None => return Coercion::Invalid(IssueKind::FloatType, MSG_FLOAT_TYPE),
        },
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(v) => v,
            Err(_) => return Coercion::Invalid(IssueKind::FloatParsing, MSG_FLOAT_PARSING),
        },
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null | Value::Array(_) | Value::Object(_) => {
            return Coercion::Invalid(IssueKind::FloatType, MSG_FLOAT_TYPE);
        }
    };
    if parsed.is_finite() {
        Coercion::Number(parsed)
    } else {
        Coercion::Invalid(IssueKind::FiniteNumber, MSG_FINITE_NUMBER)
    }
}

fn with_key(base: &[LocItem], key: &str) -> Vec<LocItem> {
    let mut loc = base.to_vec();
    loc.push(key.into());
    loc
}

impl Schema {
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }

    fn declares(&self, key: &str) -> bool {
        self.fields.iter().any(|f| f.name == key)
    }

    /// Validates `value` as an object of this schema located at `loc`.
    ///
    /// Issues are appended to `issues`; the coerced values are returned, in
    /// declaration order, only when this object produced no issues.
    pub fn validate_object(
        &self,
        value: &Value,
        loc: &[LocItem],
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<Vec<f64>> {
        let Some(object) = value.as_object() else {
            issues.push(ValidationIssue::new(
                IssueKind::ModelAttributesType,
                loc.to_vec(),
                MSG_OBJECT_TYPE,
                value.clone(),
            ));
            return None;
        };

        let before = issues.len();
        let mut values = Vec::with_capacity(self.fields.len());

        for field in self.fields {
            let field_loc = with_key(loc, field.name);
            let Some(raw) = object.get(field.name) else {
                issues.push(ValidationIssue::new(
                    IssueKind::Missing,
                    field_loc,
                    MSG_MISSING,
                    value.clone(),
                ));
                continue;
            };
            match coerce_number(raw) {
                Coercion::Number(v) => {
                    if let Some(Err(reason)) = field.check.map(|check| check(field.name, v)) {
                        issues.push(ValidationIssue::new(
                            IssueKind::ValueError,
                            field_loc,
                            format!("Value error, {reason}"),
                            raw.clone(),
                        ));
                    } else {
                        values.push(v);
                    }
                }
                Coercion::Invalid(kind, msg) => {
                    issues.push(ValidationIssue::new(kind, field_loc, msg, raw.clone()));
                }
            }
        }

        for (key, raw) in object {
            if !self.declares(key) {
                issues.push(ValidationIssue::new(
                    IssueKind::ExtraForbidden,
                    with_key(loc, key),
                    MSG_EXTRA_FORBIDDEN,
                    raw.clone(),
                ));
            }
        }

        (issues.len() == before).then_some(values)
    }
}

fn housing_record_at(
    value: &Value,
    loc: &[LocItem],
    issues: &mut Vec<ValidationIssue>,
) -> Option<HousingRecord> {
    let values = HOUSING_SCHEMA.validate_object(value, loc, issues)?;
    let array: [f64; FEATURE_COUNT] = values.try_into().ok()?;
    Some(HousingRecord::from_features(array))
}

/// Validates a `/predict` body.
pub fn validate_record(body: &Value) -> Result<HousingRecord, ValidationErrors> {
    let mut issues = Vec::new();
    housing_record_at(body, &["body".into()], &mut issues).ok_or(ValidationErrors(issues))
}

/// Validates a `/bulk-predict` body. One bad record rejects the whole batch.
pub fn validate_bulk(body: &Value) -> Result<BulkPredictionRequest, ValidationErrors> {
    let root: [LocItem; 1] = ["body".into()];
    let mut issues = Vec::new();

    let Some(object) = body.as_object() else {
        return Err(ValidationErrors(vec![ValidationIssue::new(
            IssueKind::ModelAttributesType,
            root.to_vec(),
            MSG_OBJECT_TYPE,
            body.clone(),
        )]));
    };

    let mut houses = Vec::new();
    match object.get("houses") {
        None => issues.push(ValidationIssue::new(
            IssueKind::Missing,
            with_key(&root, "houses"),
            MSG_MISSING,
            body.clone(),
        )),
        Some(Value::Array(items)) => {
            houses.reserve(items.len());
            for (index, item) in items.iter().enumerate() {
                let mut loc = with_key(&root, "houses");
                loc.push(index.into());
                if let Some(record) = housing_record_at(item, &loc, &mut issues) {
                    houses.push(record);
                }
            }
        }
        Some(other) => issues.push(ValidationIssue::new(
            IssueKind::ListType,
            with_key(&root, "houses"),
            MSG_LIST_TYPE,
            other.clone(),
        )),
    }

    for (key, raw) in object {
        if key != "houses" {
            issues.push(ValidationIssue::new(
                IssueKind::ExtraForbidden,
                with_key(&root, key),
                MSG_EXTRA_FORBIDDEN,
                raw.clone(),
            ));
        }
    }

    if issues.is_empty() {
        Ok(BulkPredictionRequest { houses })
    } else {
        Err(ValidationErrors(issues))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_ORDER;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "MedInc": 8.3252,
            "HouseAge": 41.0,
            "AveRooms": 6.984127,
            "AveBedrms": 1.02381,
            "Population": 322.0,
            "AveOccup": 2.555556,
            "Latitude": 37.88,
            "Longitude": -122.23
        })
    }

    fn messages(errors: &ValidationErrors) -> Vec<&str> {
        errors.issues().iter().map(|i| i.msg.as_str()).collect()
    }

    #[test]
    fn schema_fields_follow_feature_order() {
        let names: Vec<_> = HOUSING_SCHEMA.field_names().collect();
        assert_eq!(names, FEATURE_ORDER.to_vec());
    }

    #[test]
    fn accepts_valid_record() {
        let record = validate_record(&sample()).unwrap();
        assert_eq!(record.med_inc, 8.3252);
        assert_eq!(record.longitude, -122.23);
    }

    #[test]
    fn coerces_numeric_strings_and_integers() {
        let mut body = sample();
        body["HouseAge"] = json!("41");
        body["Population"] = json!(322);
        let record = validate_record(&body).unwrap();
        assert_eq!(record.house_age, 41.0);
        assert_eq!(record.population, 322.0);
    }

    #[test]
    fn rejects_extra_field() {
        let mut body = sample();
        body["Should"] = json!("not be here");
        let err = validate_record(&body).unwrap_err();
        assert_eq!(messages(&err), vec![MSG_EXTRA_FORBIDDEN]);
        let issue = &err.issues()[0];
        assert_eq!(issue.kind, IssueKind::ExtraForbidden);
        assert_eq!(issue.loc, vec![LocItem::from("body"), LocItem::from("Should")]);
        assert_eq!(issue.input, json!("not be here"));
    }

    #[test]
    fn rejects_missing_field() {
        let mut body = sample();
        body.as_object_mut().unwrap().remove("AveOccup");
        let err = validate_record(&body).unwrap_err();
        assert_eq!(messages(&err), vec![MSG_MISSING]);
        assert_eq!(err.issues()[0].loc, vec![LocItem::from("body"), LocItem::from("AveOccup")]);
    }

    #[test]
    fn rejects_unparseable_string() {
        let mut body = sample();
        body["MedInc"] = json!("This is a string");
        let err = validate_record(&body).unwrap_err();
        assert_eq!(messages(&err), vec![MSG_FLOAT_PARSING]);
        assert_eq!(err.issues()[0].kind, IssueKind::FloatParsing);
    }

    #[test]
    fn rejects_non_scalar_value() {
        let mut body = sample();
        body["AveRooms"] = json!([1.0]);
        body["AveBedrms"] = Value::Null;
        let err = validate_record(&body).unwrap_err();
        assert_eq!(messages(&err), vec![MSG_FLOAT_TYPE, MSG_FLOAT_TYPE]);
    }

    #[test]
    fn rejects_non_finite_string() {
        let mut body = sample();
        body["MedInc"] = json!("inf");
        let err = validate_record(&body).unwrap_err();
        assert_eq!(messages(&err), vec![MSG_FINITE_NUMBER]);
    }

    #[test]
    fn range_checks_latitude_and_longitude() {
        for (field, value, msg) in [
            ("Latitude", 97.0, "Value error, Invalid value for Latitude"),
            ("Latitude", -97.0, "Value error, Invalid value for Latitude"),
            ("Longitude", 190.0, "Value error, Invalid value for Longitude"),
            ("Longitude", -190.0, "Value error, Invalid value for Longitude"),
        ] {
            let mut body = sample();
            body[field] = json!(value);
            let err = validate_record(&body).unwrap_err();
            assert_eq!(messages(&err), vec![msg]);
            assert_eq!(err.issues()[0].kind, IssueKind::ValueError);
        }
    }

    #[test]
    fn range_bounds_are_inclusive() {
        for (lat, lon) in [(90.0, 180.0), (-90.0, -180.0)] {
            let mut body = sample();
            body["Latitude"] = json!(lat);
            body["Longitude"] = json!(lon);
            let record = validate_record(&body).unwrap();
            assert_eq!((record.latitude, record.longitude), (lat, lon));
        }
    }

    #[test]
    fn collects_all_issues_in_declaration_order() {
        let body = json!({
            "Zeta": 1,
            "Longitude": 500,
            "MedInc": "abc",
            "HouseAge": 41.0,
            "AveRooms": 6.9,
            "AveBedrms": 1.0,
            "Population": 322.0,
            "Latitude": -97
        });
        let err = validate_record(&body).unwrap_err();
        assert_eq!(
            messages(&err),
            vec![
                MSG_FLOAT_PARSING,
                MSG_MISSING,
                "Value error, Invalid value for Latitude",
                "Value error, Invalid value for Longitude",
                MSG_EXTRA_FORBIDDEN,
            ]
        );
    }

    #[test]
    fn non_object_body_is_rejected() {
        let err = validate_record(&json!([1, 2, 3])).unwrap_err();
        assert_eq!(messages(&err), vec![MSG_OBJECT_TYPE]);
    }

    #[test]
    fn bulk_preserves_record_order() {
        let mut second = sample();
        second["MedInc"] = json!(1.5);
        let body = json!({ "houses": [sample(), second] });
        let request = validate_bulk(&body).unwrap();
        assert_eq!(request.houses.len(), 2);
        assert_eq!(request.houses[0].med_inc, 8.3252);
        assert_eq!(request.houses[1].med_inc, 1.5);
    }

    #[test]
    fn bulk_accepts_empty_list() {
        let request = validate_bulk(&json!({ "houses": [] })).unwrap();
        assert!(request.houses.is_empty());
    }

    #[test]
    fn bulk_reports_nested_locations_per_record() {
        let mut first = sample();
        first["Latitude"] = json!(97);
        let mut third = sample();
        third["Should"] = json!("Not Be Here");
        let body = json!({ "houses": [first, sample(), third] });

        let err = validate_bulk(&body).unwrap_err();
        let locs: Vec<_> = err.issues().iter().map(|i| i.loc.clone()).collect();
        assert_eq!(
            locs,
            vec![
                vec![
                    LocItem::from("body"),
                    LocItem::from("houses"),
                    LocItem::from(0usize),
                    LocItem::from("Latitude"),
                ],
                vec![
                    LocItem::from("body"),
                    LocItem::from("houses"),
                    LocItem::from(2usize),
                    LocItem::from("Should"),
                ],
            ]
        );
    }

    #[test]
    fn bulk_rejects_wrapper_problems() {
        let err = validate_bulk(&json!({})).unwrap_err();
        assert_eq!(messages(&err), vec![MSG_MISSING]);

        let err = validate_bulk(&json!({ "houses": sample() })).unwrap_err();
        assert_eq!(messages(&err), vec![MSG_LIST_TYPE]);

        let err = validate_bulk(&json!({ "houses": [], "page": 1 })).unwrap_err();
        assert_eq!(messages(&err), vec![MSG_EXTRA_FORBIDDEN]);

        let err = validate_bulk(&json!("houses")).unwrap_err();
        assert_eq!(messages(&err), vec![MSG_OBJECT_TYPE]);
    }

    #[test]
    fn issues_serialize_in_detail_shape() {
        let err = ValidationErrors::missing_query("name");
        let value = serde_json::to_value(err.issues()).unwrap();
        assert_eq!(
            value,
            json!([{ "type": "missing", "loc": ["query", "name"], "msg": "Field required", "input": null }])
        );
    }
}
