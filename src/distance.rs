//! Driving-distance providers and the distance-mode dispatcher.
//!
//! Every provider answers one question: how far, and how long, is it to
//! drive from one location to another. Providers are one-shot per leg, with
//! no retries; failures surface as [`RoutingError`]s.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use tracing::debug;
use utoipa::ToSchema;

use crate::domain::Location;
use crate::error::{RoutingError, ValidationError};
use crate::geometry::haversine;
use crate::routing::RoadGraphProvider;

/// Default OSRM-compatible routing service.
pub const DEFAULT_OSRM_URL: &str = "http://router.project-osrm.org";

/// Default Google Maps API host.
pub const DEFAULT_GMAPS_URL: &str = "https://maps.googleapis.com";

/// Default number of driving-distance requests in flight per sequence.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 4;

/// How the distance between two locations is obtained.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMode {
    /// Great-circle distance, no duration.
    Haversine,
    /// OSRM-compatible routing service.
    #[default]
    Osm,
    /// Shortest path over a locally built street graph, no duration.
    Osmnx,
    /// Google Directions API.
    Gmaps,
}

impl DistanceMode {
    pub const ALL: [DistanceMode; 4] = [
        DistanceMode::Haversine,
        DistanceMode::Osm,
        DistanceMode::Osmnx,
        DistanceMode::Gmaps,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DistanceMode::Haversine => "haversine",
            DistanceMode::Osm => "osm",
            DistanceMode::Osmnx => "osmnx",
            DistanceMode::Gmaps => "gmaps",
        }
    }
}

impl FromStr for DistanceMode {
    type Err = ValidationError;

    /// ```
    /// use last_mile_analyzer::distance::DistanceMode;
    ///
    /// assert_eq!("osmnx".parse::<DistanceMode>().unwrap(), DistanceMode::Osmnx);
    /// let err = "bing".parse::<DistanceMode>().unwrap_err();
    /// assert!(err.to_string().contains("'haversine', 'osm', 'osmnx', 'gmaps'"));
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DistanceMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| ValidationError::DistanceMode(s.to_string()))
    }
}

impl fmt::Display for DistanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One driving leg.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Leg {
    pub distance_km: f64,
    pub duration_min: f64,
}

impl Leg {
    pub fn new(distance_km: f64, duration_min: f64) -> Self {
        Self {
            distance_km,
            duration_min,
        }
    }
}

/// A source of driving legs.
pub trait DrivingDistanceProvider {
    fn provide(
        &self,
        origin: Location,
        destination: Location,
    ) -> impl Future<Output = Result<Leg, RoutingError>> + Send;
}

// ============================================================================
// Haversine
// ============================================================================

/// Straight-line provider. Never fails.
#[derive(Clone, Copy, Debug, Default)]
pub struct HaversineProvider;

impl DrivingDistanceProvider for HaversineProvider {
    async fn provide(&self, origin: Location, destination: Location) -> Result<Leg, RoutingError> {
        Ok(Leg::new(
            haversine(origin.lat, origin.lon, destination.lat, destination.lon),
            0.0,
        ))
    }
}

// ============================================================================
// OSRM
// ============================================================================

/// Client for an OSRM-compatible `route/v1/driving` endpoint.
#[derive(Clone, Debug)]
pub struct OsrmProvider {
    client: reqwest::Client,
    base_url: String,
}

impl OsrmProvider {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url(&self, origin: Location, destination: Location) -> String {
        format!(
            "{}/route/v1/driving/{},{};{},{}",
            self.base_url.trim_end_matches('/'),
            origin.lon,
            origin.lat,
            destination.lon,
            destination.lat
        )
    }
}

impl DrivingDistanceProvider for OsrmProvider {
    async fn provide(&self, origin: Location, destination: Location) -> Result<Leg, RoutingError> {
        let url = self.url(origin, destination);
        debug!(%url, "OSRM request");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        // An error status with a parseable body is judged by its `code`
        match parse_osrm_response(&body, origin, destination) {
            Err(RoutingError::Parse(_)) if !status.is_success() => Err(RoutingError::Http {
                url,
                status: status.as_u16(),
            }),
            result => result,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    /// Meters.
    distance: f64,
    /// Seconds.
    duration: f64,
}

/// Parses an OSRM route response into a leg.
///
/// ```
/// use last_mile_analyzer::distance::parse_osrm_response;
/// use last_mile_analyzer::domain::Location;
///
/// let body = r#"{"code":"Ok","routes":[{"distance":1500.0,"duration":180.0}]}"#;
/// let leg = parse_osrm_response(body, Location::new(0.0, 0.0), Location::new(0.0, 0.01)).unwrap();
/// assert_eq!(leg.distance_km, 1.5);
/// assert_eq!(leg.duration_min, 3.0);
/// ```
pub fn parse_osrm_response(
    body: &str,
    origin: Location,
    destination: Location,
) -> Result<Leg, RoutingError> {
    let parsed: OsrmResponse =
        serde_json::from_str(body).map_err(|e| RoutingError::Parse(e.to_string()))?;

    if parsed.code != "Ok" {
        return Err(RoutingError::Service {
            service: "OSRM",
            code: parsed.code,
            origin,
            destination,
        });
    }

    let route = parsed
        .routes
        .first()
        .ok_or(RoutingError::NoRoute { origin, destination })?;
    Ok(Leg::new(route.distance / 1000.0, route.duration / 60.0))
}

// ============================================================================
// Google Directions
// ============================================================================

/// Client for the Google Directions API.
#[derive(Clone, Debug)]
pub struct GoogleMapsProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl GoogleMapsProvider {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }
}

impl DrivingDistanceProvider for GoogleMapsProvider {
    async fn provide(&self, origin: Location, destination: Location) -> Result<Leg, RoutingError> {
        let key = self.api_key.as_deref().ok_or(RoutingError::MissingApiKey)?;

        let endpoint = format!("{}/maps/api/directions/json", self.base_url.trim_end_matches('/'));
        let url = reqwest::Url::parse_with_params(
            &endpoint,
            &[
                ("origin", format!("{},{}", origin.lat, origin.lon)),
                ("destination", format!("{},{}", destination.lat, destination.lon)),
                ("mode", "driving".to_string()),
                ("key", key.to_string()),
            ],
        )
        .map_err(|e| RoutingError::Parse(e.to_string()))?;
        debug!(%endpoint, "Google Directions request");

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RoutingError::Http {
                url: endpoint,
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        parse_directions_response(&body, origin, destination)
    }
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    legs: Vec<DirectionsLeg>,
}

#[derive(Debug, Deserialize)]
struct DirectionsLeg {
    distance: DirectionsValue,
    duration: DirectionsValue,
}

#[derive(Debug, Deserialize)]
struct DirectionsValue {
    value: f64,
}

/// Parses a Google Directions response into a leg.
pub fn parse_directions_response(
    body: &str,
    origin: Location,
    destination: Location,
) -> Result<Leg, RoutingError> {
    let parsed: DirectionsResponse =
        serde_json::from_str(body).map_err(|e| RoutingError::Parse(e.to_string()))?;

    if parsed.status != "OK" {
        return Err(RoutingError::Service {
            service: "Google Directions",
            code: parsed.status,
            origin,
            destination,
        });
    }

    let leg = parsed
        .routes
        .first()
        .and_then(|r| r.legs.first())
        .ok_or(RoutingError::NoRoute { origin, destination })?;
    Ok(Leg::new(leg.distance.value / 1000.0, leg.duration.value / 60.0))
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes distance requests to a provider by [`DistanceMode`].
///
/// All HTTP providers share one `reqwest::Client`, which pools connections
/// across requests.
///
/// # Examples
///
/// ```
/// use last_mile_analyzer::distance::{DistanceMode, DistanceService};
/// use last_mile_analyzer::domain::Location;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let service = DistanceService::default();
/// let leg = service
///     .get_distance(Location::new(0.0, 0.0), Location::new(0.0, 1.0), DistanceMode::Haversine)
///     .await
///     .unwrap();
/// assert!((leg.distance_km - 111.19).abs() < 0.1);
/// assert_eq!(leg.duration_min, 0.0);
/// # });
/// ```
#[derive(Clone, Debug)]
pub struct DistanceService {
    osrm: OsrmProvider,
    gmaps: GoogleMapsProvider,
    road_graph: RoadGraphProvider,
    max_concurrent_requests: usize,
}

impl DistanceService {
    /// Creates a service with default endpoints around the given session.
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            osrm: OsrmProvider::new(client.clone(), DEFAULT_OSRM_URL),
            gmaps: GoogleMapsProvider::new(client.clone(), DEFAULT_GMAPS_URL, None),
            road_graph: RoadGraphProvider::new(client),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
        }
    }

    pub fn with_osrm(mut self, osrm: OsrmProvider) -> Self {
        self.osrm = osrm;
        self
    }

    pub fn with_gmaps(mut self, gmaps: GoogleMapsProvider) -> Self {
        self.gmaps = gmaps;
        self
    }

    pub fn with_road_graph(mut self, road_graph: RoadGraphProvider) -> Self {
        self.road_graph = road_graph;
        self
    }

    /// Sets the number of requests in flight per sequence (at least 1).
    pub fn with_max_concurrent_requests(mut self, n: usize) -> Self {
        self.max_concurrent_requests = n.max(1);
        self
    }

    pub fn max_concurrent_requests(&self) -> usize {
        self.max_concurrent_requests
    }

    /// Distance and duration from `a` to `b` using the given mode.
    ///
    /// Haversine and osmnx modes always report a duration of 0.
    pub async fn get_distance(
        &self,
        a: Location,
        b: Location,
        mode: DistanceMode,
    ) -> Result<Leg, RoutingError> {
        match mode {
            DistanceMode::Haversine => HaversineProvider.provide(a, b).await,
            DistanceMode::Osm => self.osrm.provide(a, b).await,
            DistanceMode::Osmnx => {
                let leg = self.road_graph.provide(a, b).await?;
                Ok(Leg::new(leg.distance_km, 0.0))
            }
            DistanceMode::Gmaps => self.gmaps.provide(a, b).await,
        }
    }
}

impl Default for DistanceService {
    fn default() -> Self {
        Self::new(reqwest::Client::default())
    }
}

/// One-off distance lookup, reusing the caller's session when given one.
pub async fn get_distance(
    a: Location,
    b: Location,
    mode: DistanceMode,
    client: Option<&reqwest::Client>,
) -> Result<Leg, RoutingError> {
    let client = client.cloned().unwrap_or_default();
    DistanceService::new(client).get_distance(a, b, mode).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a() -> Location {
        Location::new(39.9526, -75.1652)
    }

    fn b() -> Location {
        Location::new(39.9496, -75.1503)
    }

    #[test]
    fn test_distance_mode_round_trip_names() {
        for mode in DistanceMode::ALL {
            assert_eq!(mode.as_str().parse::<DistanceMode>().unwrap(), mode);
        }
        assert_eq!(DistanceMode::default(), DistanceMode::Osm);
    }

    #[test]
    fn test_distance_mode_invalid() {
        let err = "invalid_mode".parse::<DistanceMode>().unwrap_err();
        assert_eq!(err, ValidationError::DistanceMode("invalid_mode".to_string()));
    }

    #[tokio::test]
    async fn test_get_distance_haversine() {
        let leg = get_distance(a(), b(), DistanceMode::Haversine, None).await.unwrap();
        assert_eq!(leg.distance_km, haversine(a().lat, a().lon, b().lat, b().lon));
        assert_eq!(leg.duration_min, 0.0);
    }

    #[tokio::test]
    async fn test_get_distance_reuses_session() {
        let client = reqwest::Client::new();
        let leg = get_distance(a(), a(), DistanceMode::Haversine, Some(&client)).await.unwrap();
        assert_eq!(leg, Leg::new(0.0, 0.0));
    }

    #[tokio::test]
    async fn test_gmaps_without_key_fails_before_request() {
        let service = DistanceService::default();
        let err = service.get_distance(a(), b(), DistanceMode::Gmaps).await.unwrap_err();
        assert!(matches!(err, RoutingError::MissingApiKey));
    }

    #[test]
    fn test_osrm_url_is_lon_lat() {
        let provider = OsrmProvider::new(reqwest::Client::new(), "http://localhost:5000/");
        assert_eq!(
            provider.url(Location::new(1.5, 2.5), Location::new(3.5, 4.5)),
            "http://localhost:5000/route/v1/driving/2.5,1.5;4.5,3.5"
        );
    }

    #[test]
    fn test_parse_osrm_non_ok_code() {
        let body = r#"{"code":"NoRoute","message":"Impossible route between points"}"#;
        let err = parse_osrm_response(body, a(), b()).unwrap_err();
        match err {
            RoutingError::Service {
                code,
                origin,
                destination,
                ..
            } => {
                assert_eq!(code, "NoRoute");
                assert_eq!(origin, a());
                assert_eq!(destination, b());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_parse_osrm_ok_without_routes() {
        let err = parse_osrm_response(r#"{"code":"Ok","routes":[]}"#, a(), b()).unwrap_err();
        assert!(matches!(err, RoutingError::NoRoute { .. }));
    }

    #[test]
    fn test_parse_osrm_garbage() {
        let err = parse_osrm_response("<html>502</html>", a(), b()).unwrap_err();
        assert!(matches!(err, RoutingError::Parse(_)));
    }

    #[test]
    fn test_parse_directions_response() {
        let body = r#"{
            "status": "OK",
            "routes": [{"legs": [{"distance": {"text": "2.3 km", "value": 2300}, "duration": {"text": "6 mins", "value": 390}}]}]
        }"#;
        let leg = parse_directions_response(body, a(), b()).unwrap();
        assert_eq!(leg.distance_km, 2.3);
        assert_eq!(leg.duration_min, 6.5);
    }

    #[test]
    fn test_parse_directions_denied() {
        let body = r#"{"status":"REQUEST_DENIED","routes":[],"error_message":"The provided API key is invalid."}"#;
        let err = parse_directions_response(body, a(), b()).unwrap_err();
        assert!(matches!(err, RoutingError::Service { ref code, .. } if code == "REQUEST_DENIED"));
    }

    #[test]
    fn test_max_concurrent_requests_at_least_one() {
        let service = DistanceService::default().with_max_concurrent_requests(0);
        assert_eq!(service.max_concurrent_requests(), 1);
    }

    /// Serves one canned HTTP response on a local port and returns its base URL.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        url
    }

    #[tokio::test]
    async fn test_osrm_ok_response() {
        let url = serve_once("200 OK", r#"{"code":"Ok","routes":[{"distance":2500.0,"duration":300.0}]}"#).await;
        let leg = OsrmProvider::new(reqwest::Client::new(), url)
            .provide(a(), b())
            .await
            .unwrap();
        assert_eq!(leg, Leg::new(2.5, 5.0));
    }

    #[tokio::test]
    async fn test_osrm_error_status_with_code_is_a_service_error() {
        let url = serve_once(
            "500 Internal Server Error",
            r#"{"code":"NoRoute","message":"Impossible route between points"}"#,
        )
        .await;
        let err = OsrmProvider::new(reqwest::Client::new(), url)
            .provide(a(), b())
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::Service { service: "OSRM", ref code, .. } if code == "NoRoute"));
    }

    #[tokio::test]
    async fn test_osrm_error_status_without_body_is_an_http_error() {
        let url = serve_once("502 Bad Gateway", "<html>502 Bad Gateway</html>").await;
        let err = OsrmProvider::new(reqwest::Client::new(), url)
            .provide(a(), b())
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::Http { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_gmaps_error_status_is_an_http_error() {
        let url = serve_once("403 Forbidden", r#"{"status":"REQUEST_DENIED","routes":[]}"#).await;
        let err = GoogleMapsProvider::new(reqwest::Client::new(), url, Some("key".to_string()))
            .provide(a(), b())
            .await
            .unwrap_err();
        match err {
            RoutingError::Http { url, status } => {
                assert_eq!(status, 403);
                assert!(url.ends_with("/maps/api/directions/json"));
                assert!(!url.contains("key"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_gmaps_ok_response() {
        let url = serve_once(
            "200 OK",
            r#"{"status":"OK","routes":[{"legs":[{"distance":{"value":1200},"duration":{"value":120}}]}]}"#,
        )
        .await;
        let leg = GoogleMapsProvider::new(reqwest::Client::new(), url, Some("key".to_string()))
            .provide(a(), b())
            .await
            .unwrap();
        assert_eq!(leg, Leg::new(1.2, 2.0));
    }
}
