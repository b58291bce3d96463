use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    routing::{get, post},
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use tower_http::trace::TraceLayer;
use utoipa::{OpenApi, ToSchema, openapi::server::Server};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    cache::{Cached, ResponseCache},
    config::AppConfig,
    error::ServiceError,
    model::{
        BulkPredictionRequest, BulkPredictionResponse, HousingRecord, PredictionResponse,
        Predictor,
    },
    schema::{
        IssueKind, LocItem, ValidationErrorResponse, ValidationErrors, ValidationIssue,
        validate_bulk, validate_record,
    },
};

const PREDICT_ROUTE: &str = "/predict";
const BULK_PREDICT_ROUTE: &str = "/bulk-predict";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub predictor: Arc<Predictor>,
    pub cache: Arc<ResponseCache>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Current server time, RFC 3339.
    pub time: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HelloResponse {
    pub message: String,
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Housing price prediction API",
        description = "Median house value predictions for California districts."
    ),
    paths(health, hello, predict, bulk_predict),
    components(schemas(
        HousingRecord,
        BulkPredictionRequest,
        PredictionResponse,
        BulkPredictionResponse,
        HealthResponse,
        HelloResponse,
        ValidationErrorResponse,
        ValidationIssue,
        LocItem,
        IssueKind
    )),
    tags((name = "housing", description = "Prediction endpoints"))
)]
pub struct ApiDoc;

/// Builds the service: the API mounted under the configured prefix plus
/// Swagger UI and the OpenAPI document at the root and under the prefix.
pub fn build_router(
    config: Arc<AppConfig>,
    predictor: Arc<Predictor>,
    cache: Arc<ResponseCache>,
) -> Router {
    let prefix = config.api_prefix.clone();
    let state = AppState {
        config,
        predictor,
        cache,
    };

    let api = Router::new()
        .route("/health", get(health))
        .route("/hello", get(hello))
        .route(PREDICT_ROUTE, post(predict))
        .route("/predict/", post(predict))
        .route(BULK_PREDICT_ROUTE, post(bulk_predict))
        .route("/bulk-predict/", post(bulk_predict));

    Router::new()
        .nest(&prefix, api)
        .with_state(state)
        .merge(docs_router(&prefix))
        .layer(TraceLayer::new_for_http())
}

fn docs_router(prefix: &str) -> Router {
    let mut doc = ApiDoc::openapi();
    doc.servers = Some(vec![Server::new(prefix)]);

    Router::new()
        .merge(SwaggerUi::new("/docs").url("/openapi.json", doc.clone()))
        .merge(
            SwaggerUi::new(format!("{prefix}/docs"))
                .url(format!("{prefix}/openapi.json"), doc),
        )
}

fn parse_body(body: &Bytes) -> Result<Value, ValidationErrors> {
    if body.is_empty() {
        return Err(ValidationErrors::missing_body());
    }
    serde_json::from_slice(body).map_err(|err| ValidationErrors::json_invalid(&err))
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "housing",
    responses((status = 200, description = "Current server time", body = HealthResponse))
)]
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
    })
}

#[utoipa::path(
    get,
    path = "/hello",
    tag = "housing",
    params(("name" = String, Query, description = "Name to greet")),
    responses(
        (status = 200, description = "Greeting", body = HelloResponse),
        (status = 422, description = "Missing name", body = ValidationErrorResponse)
    )
)]
async fn hello(
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<HelloResponse>, ServiceError> {
    // A repeated `name` resolves to its last occurrence.
    let name = params
        .into_iter()
        .rev()
        .find_map(|(key, value)| (key == "name").then_some(value))
        .ok_or_else(|| ValidationErrors::missing_query("name"))?;
    Ok(Json(HelloResponse {
        message: format!("Hello {name}"),
    }))
}

#[utoipa::path(
    post,
    path = "/predict",
    tag = "housing",
    request_body = HousingRecord,
    responses(
        (status = 200, description = "Predicted median house value", body = PredictionResponse),
        (status = 422, description = "Invalid record", body = ValidationErrorResponse),
        (status = 500, description = "Model invocation failed")
    )
)]
async fn predict(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Cached<PredictionResponse>, ServiceError> {
    let record = validate_record(&parse_body(&body)?)?;
    let predictor = state.predictor.clone();

    state
        .cache
        .get_or_compute(PREDICT_ROUTE, &record, || async move {
            let prediction = predictor.predict_one(record).await?;
            Ok::<_, ServiceError>(PredictionResponse { prediction })
        })
        .await
}

#[utoipa::path(
    post,
    path = "/bulk-predict",
    tag = "housing",
    request_body = BulkPredictionRequest,
    responses(
        (status = 200, description = "Predictions in input order", body = BulkPredictionResponse),
        (status = 422, description = "At least one invalid record", body = ValidationErrorResponse),
        (status = 500, description = "Model invocation failed")
    )
)]
async fn bulk_predict(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Cached<BulkPredictionResponse>, ServiceError> {
    let request = validate_bulk(&parse_body(&body)?)?;
    let predictor = state.predictor.clone();
    tracing::debug!(records = request.houses.len(), "bulk prediction");

    state
        .cache
        .get_or_compute(BULK_PREDICT_ROUTE, &request, || {
            let houses = request.houses.clone();
            async move {
                let predictions = predictor.predict_batch(&houses).await?;
                Ok::<_, ServiceError>(BulkPredictionResponse { predictions })
            }
        })
        .await
}
