//! REST API for route analysis.
//!
//! Analyses are submitted as datasets and evaluated in the background; the
//! summary CSV of a finished analysis is served as `text/csv`. A single route
//! can also be evaluated inline against great-circle distances. The OpenAPI
//! document is browsable at /q/swagger-ui.

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use crate::config::AnalyzerConfig;
use crate::demo_data::{available_datasets, DemoDataset};
use crate::distance::{DistanceMode, DistanceService};
use crate::dto::{
    AnalysisDto, CreateAnalysisRequest, DatasetDto, EvaluateRouteRequest, HealthResponse,
    InfoResponse, PackageDto, RouteDto, RouteReportDto, StatusResponse, StopDto, VehicleDto,
};
use crate::error::{RoutingError, ValidationError};
use crate::service::{AnalysisService, AnalysisStatus};

/// Error responses carry a status code and a plain-text message.
type ApiError = (StatusCode, String);

fn not_found(id: &str) -> ApiError {
    (StatusCode::NOT_FOUND, format!("no analysis with id '{}'", id))
}

/// Application state shared across handlers.
pub struct AppState {
    pub analyses: AnalysisService,
}

impl AppState {
    pub fn new(distances: DistanceService) -> Self {
        Self {
            analyses: AnalysisService::new(distances),
        }
    }

    /// Builds the shared HTTP session and providers from configuration.
    pub fn from_config(config: &AnalyzerConfig) -> Result<Self, RoutingError> {
        let client = config.http_client()?;
        Ok(Self::new(config.distance_service(client)))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(DistanceService::default())
    }
}

/// Creates the API router with CORS and Swagger UI enabled.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health & Info
        .route("/health", get(health))
        .route("/info", get(info))
        // Demo data
        .route("/demo-data", get(list_demo_data))
        .route("/demo-data/{name}", get(get_demo_data))
        // Analyses
        .route("/analyses", get(list_analyses).post(create_analysis))
        .route("/analyses/{id}", get(get_analysis).delete(delete_analysis))
        .route("/analyses/{id}/status", get(get_analysis_status))
        .route("/analyses/{id}/summary.csv", get(get_analysis_summary_csv))
        // Single route
        .route("/routes/evaluate", put(evaluate_route))
        .merge(SwaggerUi::new("/q/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health & Info
// ============================================================================

/// GET /health - Health check endpoint.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "UP" })
}

/// GET /info - Application info endpoint.
#[utoipa::path(
    get,
    path = "/info",
    responses((status = 200, description = "Application info", body = InfoResponse))
)]
async fn info() -> Json<InfoResponse> {
    Json(InfoResponse {
        name: "Last Mile Analyzer",
        version: env!("CARGO_PKG_VERSION"),
        distance_modes: DistanceMode::ALL.iter().map(|m| m.as_str()).collect(),
    })
}

// ============================================================================
// Demo Data
// ============================================================================

/// GET /demo-data - List available demo datasets.
#[utoipa::path(
    get,
    path = "/demo-data",
    responses((status = 200, description = "List of demo dataset names", body = Vec<String>))
)]
async fn list_demo_data() -> Json<Vec<&'static str>> {
    Json(available_datasets())
}

/// GET /demo-data/{name} - Get a specific demo dataset.
#[utoipa::path(
    get,
    path = "/demo-data/{name}",
    params(("name" = String, Path, description = "Demo dataset name")),
    responses(
        (status = 200, description = "Demo data retrieved", body = DatasetDto),
        (status = 404, description = "Dataset not found")
    )
)]
async fn get_demo_data(Path(name): Path<String>) -> Result<Json<DatasetDto>, ApiError> {
    let dataset: DemoDataset = name
        .parse()
        .map_err(|e: ValidationError| (StatusCode::NOT_FOUND, e.to_string()))?;
    let data = dataset
        .generate()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(DatasetDto::from_dataset(&data)))
}

// ============================================================================
// Analysis Handlers
// ============================================================================

/// POST /analyses - Create an analysis and start evaluating it.
#[utoipa::path(
    post,
    path = "/analyses",
    request_body = CreateAnalysisRequest,
    responses(
        (status = 200, description = "Job ID", body = String),
        (status = 400, description = "Invalid dataset")
    )
)]
async fn create_analysis(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateAnalysisRequest>,
) -> Result<String, ApiError> {
    let analysis = request
        .dataset
        .to_analysis()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let id = Uuid::new_v4().to_string();
    let job = state
        .analyses
        .create_job(id.clone(), analysis, request.distance_mode, request.sequence);
    state.analyses.start_evaluation(job);
    Ok(id)
}

/// GET /analyses - List all analysis IDs.
#[utoipa::path(
    get,
    path = "/analyses",
    responses((status = 200, description = "List of job IDs", body = Vec<String>))
)]
async fn list_analyses(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.analyses.list_jobs())
}

/// GET /analyses/{id} - Get the current state of an analysis.
#[utoipa::path(
    get,
    path = "/analyses/{id}",
    params(("id" = String, Path, description = "Analysis ID")),
    responses(
        (status = 200, description = "Analysis retrieved", body = AnalysisDto),
        (status = 404, description = "Not found")
    )
)]
async fn get_analysis(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AnalysisDto>, ApiError> {
    let job = state.analyses.get_job(&id).ok_or_else(|| not_found(&id))?;
    let guard = job.read();
    Ok(Json(AnalysisDto::from_job(&guard)))
}

/// GET /analyses/{id}/status - Get the evaluation status only.
#[utoipa::path(
    get,
    path = "/analyses/{id}/status",
    params(("id" = String, Path, description = "Analysis ID")),
    responses(
        (status = 200, description = "Status retrieved", body = StatusResponse),
        (status = 404, description = "Not found")
    )
)]
async fn get_analysis_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let job = state.analyses.get_job(&id).ok_or_else(|| not_found(&id))?;
    let guard = job.read();
    Ok(Json(StatusResponse {
        status: guard.status,
        error: guard.error.clone(),
    }))
}

/// GET /analyses/{id}/summary.csv - One CSV row per route.
#[utoipa::path(
    get,
    path = "/analyses/{id}/summary.csv",
    params(("id" = String, Path, description = "Analysis ID")),
    responses(
        (status = 200, description = "Route summary CSV", content_type = "text/csv", body = String),
        (status = 404, description = "Not found")
    )
)]
async fn get_analysis_summary_csv(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let job = state.analyses.get_job(&id).ok_or_else(|| not_found(&id))?;
    let mut body = Vec::new();
    {
        let guard = job.read();
        guard
            .analysis
            .write_summary(&mut body, guard.sequence)
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    }
    Ok(([(header::CONTENT_TYPE, "text/csv")], body).into_response())
}

/// DELETE /analyses/{id} - Stop evaluating and remove the analysis.
#[utoipa::path(
    delete,
    path = "/analyses/{id}",
    params(("id" = String, Path, description = "Analysis ID")),
    responses(
        (status = 200, description = "Analysis removed", body = AnalysisDto),
        (status = 404, description = "Not found")
    )
)]
async fn delete_analysis(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AnalysisDto>, ApiError> {
    state.analyses.stop_evaluation(&id);
    let job = state.analyses.remove_job(&id).ok_or_else(|| not_found(&id))?;
    let mut guard = job.write();
    if !guard.status.is_finished() {
        guard.status = AnalysisStatus::Cancelled;
    }
    Ok(Json(AnalysisDto::from_job(&guard)))
}

// ============================================================================
// Single Route
// ============================================================================

/// PUT /routes/evaluate - Great-circle report of one route, computed inline.
#[utoipa::path(
    put,
    path = "/routes/evaluate",
    request_body = EvaluateRouteRequest,
    responses(
        (status = 200, description = "Route report", body = RouteReportDto),
        (status = 400, description = "Invalid route")
    )
)]
async fn evaluate_route(
    Json(request): Json<EvaluateRouteRequest>,
) -> Result<Json<RouteReportDto>, ApiError> {
    let mut route = request
        .route
        .to_domain()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    Ok(Json(RouteReportDto::evaluate(&mut route, request.sequence)))
}

// ============================================================================
// OpenAPI Documentation
// ============================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        info,
        list_demo_data,
        get_demo_data,
        create_analysis,
        list_analyses,
        get_analysis,
        get_analysis_status,
        get_analysis_summary_csv,
        delete_analysis,
        evaluate_route,
    ),
    components(schemas(
        HealthResponse,
        InfoResponse,
        PackageDto,
        StopDto,
        VehicleDto,
        RouteDto,
        DatasetDto,
        CreateAnalysisRequest,
        EvaluateRouteRequest,
        AnalysisDto,
        StatusResponse,
        RouteReportDto,
    ))
)]
struct ApiDoc;
