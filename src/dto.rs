//! DTOs for REST API requests/responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::analysis::{CircuitySummary, RouteSummary, StatusSummary, TimePeriod};
use crate::distance::DistanceMode;
use crate::domain::{Location, LocationType, PackageStatus, SequenceKind};
use crate::metrics::{Centroid, LegSeries, RouteStatus, SequenceBounds};
use crate::service::AnalysisStatus;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PackageDto {
    pub name: String,
    pub depth: f64,
    pub height: f64,
    pub width: f64,
    pub status: PackageStatus,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StopDto {
    pub name: String,
    pub location: Location,
    pub location_type: LocationType,
    pub time_window_start: DateTime<Utc>,
    pub time_window_end: DateTime<Utc>,
    /// Planned service time in seconds.
    #[serde(default)]
    pub planned_service_time: f64,
    #[serde(default)]
    pub packages: Vec<PackageDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDto {
    pub name: String,
    pub capacity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteDto {
    pub name: String,
    pub departure_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<VehicleDto>,
    pub stops: Vec<StopDto>,
    /// Stop names in planned visiting order.
    #[serde(default)]
    pub planned_sequence: Vec<String>,
    /// Stop names in actual visiting order.
    #[serde(default)]
    pub actual_sequence: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatasetDto {
    pub name: String,
    pub routes: Vec<RouteDto>,
}

fn default_sequence() -> SequenceKind {
    SequenceKind::Actual
}

/// Body of `POST /analyses`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnalysisRequest {
    pub dataset: DatasetDto,
    #[serde(default)]
    pub distance_mode: DistanceMode,
    #[serde(default = "default_sequence")]
    pub sequence: SequenceKind,
}

/// Body of `PUT /routes/evaluate`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateRouteRequest {
    pub route: RouteDto,
    #[serde(default = "default_sequence")]
    pub sequence: SequenceKind,
}

/// Current state of an analysis job.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisDto {
    pub id: String,
    pub name: String,
    pub status: AnalysisStatus,
    pub distance_mode: DistanceMode,
    pub sequence: SequenceKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub status_summary: StatusSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuity: Option<CircuitySummary>,
    pub time_period: TimePeriod,
    pub routes: Vec<RouteSummary>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub status: AnalysisStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Great-circle metrics of one route sequence.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteReportDto {
    pub route: String,
    pub sequence: SequenceKind,
    pub stops: Vec<String>,
    pub euclidean: LegSeries,
    pub total_km: f64,
    pub status: RouteStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<SequenceBounds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub centroid: Option<Centroid>,
    /// Area of the minimum rotated rectangle, square degrees.
    pub minimum_rotated_rectangle_area: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InfoResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub distance_modes: Vec<&'static str>,
}
