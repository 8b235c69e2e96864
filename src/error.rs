//! Error types shared across the analyzer.
//!
//! Validation errors are raised at construction or assignment time and are
//! never retried. Routing errors come from external services and always
//! propagate to the caller.

use crate::domain::Location;

/// Invalid input rejected at a construction or assignment boundary.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("invalid package status '{0}': must be one of 'to-be-delivered', 'rejected', 'attempted', 'delivered'")]
    PackageStatus(String),
    #[error("invalid stop location type '{0}': must be one of 'depot', 'pickup', 'delivery'")]
    LocationType(String),
    #[error("invalid sequence '{0}': must be one of 'planned', 'actual'")]
    SequenceKind(String),
    #[error("invalid distance mode '{0}': must be one of 'haversine', 'osm', 'osmnx', 'gmaps'")]
    DistanceMode(String),
    #[error("invalid dimensions for package '{package}': all of depth, height and width must be positive")]
    Dimensions { package: String },
    #[error("invalid {field} for package '{package}': must be non-negative, got {value}")]
    Negative {
        package: String,
        field: &'static str,
        value: f64,
    },
    #[error("invalid time window for stop '{stop}': start time is greater than end time")]
    TimeWindow { stop: String },
    #[error("invalid timestamp '{0}': expected 'YYYY-MM-DD HH:MM:SS'")]
    Timestamp(String),
    #[error("stop '{stop}' is not part of route '{route}'")]
    UnknownStop { route: String, stop: String },
    #[error("the {kind} sequence of route '{route}' is empty")]
    EmptySequence { route: String, kind: &'static str },
    #[error("an analysis needs at least one route")]
    EmptyAnalysis,
    #[error("unknown demo dataset '{0}'")]
    UnknownDataset(String),
}

/// Failure reported by, or while talking to, a driving-distance provider.
#[derive(thiserror::Error, Debug)]
pub enum RoutingError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request to {url} failed with HTTP status {status}")]
    Http { url: String, status: u16 },
    #[error("{service} returned '{code}' when calculating the distance from {origin} to {destination}")]
    Service {
        service: &'static str,
        code: String,
        origin: Location,
        destination: Location,
    },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("no route found from {origin} to {destination}")]
    NoRoute {
        origin: Location,
        destination: Location,
    },
    #[error("the Google Maps provider requires an API key")]
    MissingApiKey,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for RoutingError {
    fn from(e: reqwest::Error) -> Self {
        RoutingError::Network(e.to_string())
    }
}

/// Metrics requested out of order or backed by missing data.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MetricsError {
    #[error("{stage} distances of the {kind} sequence of route '{route}' must be evaluated first")]
    StageNotEvaluated {
        route: String,
        kind: &'static str,
        stage: &'static str,
    },
    #[error("the distance matrix has no distance for stop '{stop}' of route '{route}'")]
    MissingDistance { route: String, stop: String },
}

/// Top-level error of the analyzer.
#[derive(thiserror::Error, Debug)]
pub enum AnalyzerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error(transparent)]
    Metrics(#[from] MetricsError),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
