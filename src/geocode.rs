//! Reverse geocoding through a Nominatim endpoint.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::Location;
use crate::error::RoutingError;

/// Default Nominatim host.
pub const DEFAULT_NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";

/// City and state of a location.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Place {
    pub city: String,
    pub state: String,
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    address: Option<Address>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Address {
    city: Option<String>,
    town: Option<String>,
    county: Option<String>,
    state: Option<String>,
}

/// Looks up the city and state of a location. Nominatim requires a
/// descriptive user agent, which is set on the client.
pub async fn reverse_geocode(
    client: &reqwest::Client,
    base_url: &str,
    location: Location,
) -> Result<Place, RoutingError> {
    let url = format!(
        "{}/reverse?format=jsonv2&lat={}&lon={}",
        base_url.trim_end_matches('/'),
        location.lat,
        location.lon
    );
    debug!(%url, "Reverse geocoding");

    let response = client.get(&url).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(RoutingError::Http {
            url,
            status: status.as_u16(),
        });
    }
    let body = response.text().await?;
    parse_reverse_response(&body, location)
}

/// Extracts the place from a `format=jsonv2` reverse response. The city
/// falls back to the town, then to the county.
///
/// ```
/// use last_mile_analyzer::domain::Location;
/// use last_mile_analyzer::geocode::parse_reverse_response;
///
/// let body = r#"{"address": {"county": "Travis County", "state": "Texas"}}"#;
/// let place = parse_reverse_response(body, Location::new(30.26, -97.74)).unwrap();
/// assert_eq!(place.city, "Travis County");
/// assert_eq!(place.state, "Texas");
/// ```
pub fn parse_reverse_response(body: &str, location: Location) -> Result<Place, RoutingError> {
    let parsed: ReverseResponse =
        serde_json::from_str(body).map_err(|e| RoutingError::Parse(e.to_string()))?;

    if let Some(error) = parsed.error {
        return Err(RoutingError::Service {
            service: "Nominatim",
            code: error,
            origin: location,
            destination: location,
        });
    }

    let address = parsed
        .address
        .ok_or_else(|| RoutingError::Parse(format!("no address for {location}")))?;
    let city = address
        .city
        .or(address.town)
        .or(address.county)
        .ok_or_else(|| RoutingError::Parse(format!("no city or county for {location}")))?;
    let state = address
        .state
        .ok_or_else(|| RoutingError::Parse(format!("no state for {location}")))?;

    Ok(Place { city, state })
}
