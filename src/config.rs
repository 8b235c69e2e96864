//! Analyzer configuration.
//!
//! Loaded from a TOML file; every field has a default, so an empty file (or
//! no file at all) gives a working setup against the public OSRM, Overpass
//! and Nominatim servers.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::distance::{
    DistanceMode, DistanceService, GoogleMapsProvider, OsrmProvider, DEFAULT_GMAPS_URL,
    DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_OSRM_URL,
};
use crate::error::{AnalyzerError, RoutingError};
use crate::geocode::DEFAULT_NOMINATIM_URL;
use crate::routing::{RoadGraphProvider, DEFAULT_CACHE_DIR, DEFAULT_OVERPASS_URL};

/// Environment variable holding the Google Maps API key.
pub const GMAPS_API_KEY_VAR: &str = "GMAPS_API_KEY";

/// Settings shared by the binaries.
///
/// # Examples
///
/// ```
/// use last_mile_analyzer::config::AnalyzerConfig;
/// use last_mile_analyzer::distance::DistanceMode;
///
/// let config = AnalyzerConfig::from_toml_str("distance_mode = 'haversine'").unwrap();
/// assert_eq!(config.distance_mode, DistanceMode::Haversine);
/// assert_eq!(config.max_concurrent_requests, 4);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub distance_mode: DistanceMode,
    pub osrm_url: String,
    pub gmaps_url: String,
    pub gmaps_api_key: Option<String>,
    pub overpass_url: String,
    pub nominatim_url: String,
    /// Sent with every request. Nominatim and Overpass reject anonymous clients.
    pub user_agent: String,
    pub max_concurrent_requests: usize,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// Where downloaded street graphs are cached.
    pub cache_dir: PathBuf,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            distance_mode: DistanceMode::default(),
            osrm_url: DEFAULT_OSRM_URL.to_string(),
            gmaps_url: DEFAULT_GMAPS_URL.to_string(),
            gmaps_api_key: None,
            overpass_url: DEFAULT_OVERPASS_URL.to_string(),
            nominatim_url: DEFAULT_NOMINATIM_URL.to_string(),
            user_agent: format!("last-mile-analyzer/{}", env!("CARGO_PKG_VERSION")),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            connect_timeout_secs: 30,
            request_timeout_secs: 180,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
        }
    }
}

impl AnalyzerConfig {
    /// Parses a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, AnalyzerError> {
        Ok(toml::from_str(s)?)
    }

    /// Reads a TOML file, then applies environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AnalyzerError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading configuration");
        let s = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&s)?.with_env_overrides())
    }

    /// Reads `path` when given, else starts from the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, AnalyzerError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default().with_env_overrides()),
        }
    }

    /// `GMAPS_API_KEY` replaces the configured key when set and non-empty.
    pub fn with_env_overrides(self) -> Self {
        self.with_api_key_override(std::env::var(GMAPS_API_KEY_VAR).ok())
    }

    fn with_api_key_override(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.gmaps_api_key = Some(key);
        }
        self
    }

    /// Builds the HTTP session shared by every provider.
    pub fn http_client(&self) -> Result<reqwest::Client, RoutingError> {
        let client = reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .build()?;
        Ok(client)
    }

    /// Builds the distance dispatcher around an existing session.
    pub fn distance_service(&self, client: reqwest::Client) -> DistanceService {
        DistanceService::new(client.clone())
            .with_osrm(OsrmProvider::new(client.clone(), self.osrm_url.as_str()))
            .with_gmaps(GoogleMapsProvider::new(
                client.clone(),
                self.gmaps_url.as_str(),
                self.gmaps_api_key.clone(),
            ))
            .with_road_graph(self.road_graph(client))
            .with_max_concurrent_requests(self.max_concurrent_requests)
    }

    /// Street-graph provider with the configured Overpass endpoint and cache.
    pub fn road_graph(&self, client: reqwest::Client) -> RoadGraphProvider {
        RoadGraphProvider::new(client)
            .with_overpass_url(self.overpass_url.as_str())
            .with_cache_dir(self.cache_dir.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = AnalyzerConfig::from_toml_str("").unwrap();
        assert_eq!(config, AnalyzerConfig::default());
        assert_eq!(config.distance_mode, DistanceMode::Osm);
        assert_eq!(config.connect_timeout_secs, 30);
        assert_eq!(config.request_timeout_secs, 180);
        assert_eq!(config.cache_dir, PathBuf::from(".osm_cache"));
    }

    #[test]
    fn test_partial_document() {
        let config = AnalyzerConfig::from_toml_str(
            r#"
            distance_mode = "gmaps"
            osrm_url = "http://localhost:5000"
            max_concurrent_requests = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.distance_mode, DistanceMode::Gmaps);
        assert_eq!(config.osrm_url, "http://localhost:5000");
        assert_eq!(config.max_concurrent_requests, 8);
        assert_eq!(config.overpass_url, DEFAULT_OVERPASS_URL);
    }

    #[test]
    fn test_invalid_mode_is_rejected() {
        let err = AnalyzerConfig::from_toml_str("distance_mode = 'teleport'").unwrap_err();
        assert!(matches!(err, AnalyzerError::Toml(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "nominatim_url = 'http://localhost:8080'").unwrap();
        writeln!(file, "request_timeout_secs = 10").unwrap();

        let config = AnalyzerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.nominatim_url, "http://localhost:8080");
        assert_eq!(config.request_timeout_secs, 10);
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = AnalyzerConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, AnalyzerError::Io(_)));
    }

    #[test]
    fn test_api_key_override() {
        let config = AnalyzerConfig {
            gmaps_api_key: Some("from-file".into()),
            ..Default::default()
        };
        let kept = config.clone().with_api_key_override(Some("  ".into()));
        assert_eq!(kept.gmaps_api_key.as_deref(), Some("from-file"));

        let replaced = config.with_api_key_override(Some("from-env".into()));
        assert_eq!(replaced.gmaps_api_key.as_deref(), Some("from-env"));
    }

    #[test]
    fn test_distance_service_concurrency() {
        let config = AnalyzerConfig {
            max_concurrent_requests: 0,
            ..Default::default()
        };
        let client = config.http_client().unwrap();
        assert_eq!(config.distance_service(client).max_concurrent_requests(), 1);
    }
}
