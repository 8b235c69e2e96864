//! Amazon Last Mile Routing dataset ingestion.
//!
//! Reads the `route_data.json`, `package_data.json` and optional
//! `actual_sequences.json` files of the research dataset and converts them
//! into [`Route`]s with their actual sequence set.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::info;

use crate::domain::{Location, LocationType, Package, PackageStatus, Route, SequenceKind, Stop, Vehicle};
use crate::error::{AnalyzerError, ValidationError};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Deserialize)]
struct RouteRecord {
    station_code: String,
    #[serde(rename = "date_YYYY_MM_DD")]
    date: String,
    departure_time_utc: String,
    executor_capacity_cm3: f64,
    stops: BTreeMap<String, StopRecord>,
}

#[derive(Debug, Deserialize)]
struct StopRecord {
    lat: f64,
    lng: f64,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct PackageRecord {
    scan_status: String,
    #[serde(default)]
    time_window: TimeWindowRecord,
    #[serde(default)]
    planned_service_time_seconds: f64,
    dimensions: DimensionsRecord,
}

#[derive(Debug, Default, Deserialize)]
struct TimeWindowRecord {
    start_time_utc: Option<String>,
    end_time_utc: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DimensionsRecord {
    depth_cm: f64,
    height_cm: f64,
    width_cm: f64,
}

#[derive(Debug, Deserialize)]
struct SequenceRecord {
    actual: HashMap<String, usize>,
}

type PackageData = HashMap<String, HashMap<String, BTreeMap<String, PackageRecord>>>;

/// Loads routes from the dataset files. Routes come back sorted by id.
pub fn load(
    route_data: impl AsRef<Path>,
    package_data: impl AsRef<Path>,
    actual_sequences: Option<&Path>,
) -> Result<Vec<Route>, AnalyzerError> {
    let routes = std::fs::read_to_string(route_data)?;
    let packages = std::fs::read_to_string(package_data)?;
    let sequences = actual_sequences.map(std::fs::read_to_string).transpose()?;
    routes_from_json(&routes, &packages, sequences.as_deref())
}

/// Builds routes from the raw JSON documents.
pub fn routes_from_json(
    route_data: &str,
    package_data: &str,
    actual_sequences: Option<&str>,
) -> Result<Vec<Route>, AnalyzerError> {
    let route_records: BTreeMap<String, RouteRecord> = serde_json::from_str(&null_nans(route_data))?;
    let package_records: PackageData = serde_json::from_str(&null_nans(package_data))?;
    let sequence_records: HashMap<String, SequenceRecord> = match actual_sequences {
        Some(json) => serde_json::from_str(json)?,
        None => HashMap::new(),
    };

    let mut routes = Vec::with_capacity(route_records.len());
    for (route_id, record) in &route_records {
        let mut route = build_route(route_id, record, package_records.get(route_id))?;
        if let Some(sequence) = sequence_records.get(route_id) {
            route.set_sequence(SequenceKind::Actual, actual_order(sequence))?;
        }
        routes.push(route);
    }

    info!(routes = routes.len(), "Amazon dataset loaded");
    Ok(routes)
}

/// The dataset writes missing time windows as bare `NaN`, which is not JSON.
/// Bare tokens become `null`; string contents are left alone.
fn null_nans(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut rest = json;

    while let Some(c) = rest.chars().next() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
        } else if c == '"' {
            in_string = true;
        } else if rest.starts_with("NaN") {
            out.push_str("null");
            rest = &rest[3..];
            continue;
        }
        out.push(c);
        rest = &rest[c.len_utf8()..];
    }
    out
}

fn build_route(
    route_id: &str,
    record: &RouteRecord,
    packages: Option<&HashMap<String, BTreeMap<String, PackageRecord>>>,
) -> Result<Route, ValidationError> {
    let departure_time = parse_timestamp(&format!("{} {}", record.date, record.departure_time_utc))?;

    let mut stops = Vec::with_capacity(record.stops.len());
    for (stop_id, stop) in &record.stops {
        let location_type = match stop.kind.as_str() {
            "Station" => LocationType::Depot,
            "Dropoff" => LocationType::Delivery,
            other => return Err(ValidationError::LocationType(other.to_string())),
        };
        let stop_packages = packages.and_then(|p| p.get(stop_id));
        stops.push(build_stop(stop_id, stop, location_type, stop_packages, departure_time)?);
    }

    let vehicle = Vehicle::new(record.station_code.clone(), record.executor_capacity_cm3);
    Ok(Route::new(route_id, stops, departure_time).with_vehicle(vehicle))
}

fn build_stop(
    stop_id: &str,
    record: &StopRecord,
    location_type: LocationType,
    packages: Option<&BTreeMap<String, PackageRecord>>,
    departure_time: DateTime<Utc>,
) -> Result<Stop, ValidationError> {
    let mut window: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
    let mut service_time = 0.0;
    let mut built = Vec::new();

    for (package_id, package) in packages.into_iter().flatten() {
        let status = match package.scan_status.as_str() {
            "DELIVERED" => PackageStatus::Delivered,
            "REJECTED" => PackageStatus::Rejected,
            "DELIVERY_ATTEMPTED" => PackageStatus::Attempted,
            other => return Err(ValidationError::PackageStatus(other.to_string())),
        };
        let dims = &package.dimensions;
        built.push(Package::new(
            package_id.clone(),
            (dims.depth_cm, dims.height_cm, dims.width_cm),
            status,
            0.0,
            0.0,
        )?);
        service_time += package.planned_service_time_seconds;

        if let (Some(start), Some(end)) = (&package.time_window.start_time_utc, &package.time_window.end_time_utc) {
            let (start, end) = (parse_timestamp(start)?, parse_timestamp(end)?);
            window = Some(match window {
                Some((s, e)) => (s.min(start), e.max(end)),
                None => (start, end),
            });
        }
    }

    let time_window = window.unwrap_or((departure_time, departure_time));
    Ok(Stop::new(
        stop_id,
        Location::new(record.lat, record.lng),
        location_type,
        time_window,
        built,
    )?
    .with_planned_service_time(service_time))
}

/// Stop names ordered by their recorded visit index.
fn actual_order(sequence: &SequenceRecord) -> Vec<String> {
    let mut entries: Vec<(&String, &usize)> = sequence.actual.iter().collect();
    entries.sort_by_key(|&(name, index)| (*index, name.clone()));
    entries.into_iter().map(|(name, _)| name.clone()).collect()
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| ValidationError::Timestamp(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    const ROUTES: &str = r#"{
        "RouteID_1": {
            "station_code": "DAU1",
            "date_YYYY_MM_DD": "2018-07-27",
            "departure_time_utc": "16:02:10",
            "executor_capacity_cm3": 3313071.0,
            "route_score": "High",
            "stops": {
                "AD": {"lat": 30.263, "lng": -97.759, "type": "Dropoff", "zone_id": "A-2.2A"},
                "AF": {"lat": 30.265, "lng": -97.761, "type": "Dropoff", "zone_id": "A-2.2A"},
                "ZZ": {"lat": 30.201, "lng": -97.701, "type": "Station", "zone_id": NaN}
            }
        }
    }"#;

    const PACKAGES: &str = r#"{
        "RouteID_1": {
            "AD": {
                "PackageID_1": {
                    "scan_status": "DELIVERED",
                    "time_window": {"start_time_utc": "2018-07-27 17:00:00", "end_time_utc": "2018-07-27 19:00:00"},
                    "planned_service_time_seconds": 59.0,
                    "dimensions": {"depth_cm": 25.4, "height_cm": 12.2, "width_cm": 3.8}
                },
                "PackageID_2": {
                    "scan_status": "DELIVERY_ATTEMPTED",
                    "time_window": {"start_time_utc": "2018-07-27 16:30:00", "end_time_utc": "2018-07-27 18:00:00"},
                    "planned_service_time_seconds": 20.0,
                    "dimensions": {"depth_cm": 10.0, "height_cm": 10.0, "width_cm": 10.0}
                }
            },
            "AF": {
                "PackageID_3": {
                    "scan_status": "REJECTED",
                    "time_window": {"start_time_utc": NaN, "end_time_utc": NaN},
                    "planned_service_time_seconds": 30.0,
                    "dimensions": {"depth_cm": 1.0, "height_cm": 2.0, "width_cm": 3.0}
                }
            },
            "ZZ": {}
        }
    }"#;

    const SEQUENCES: &str = r#"{"RouteID_1": {"actual": {"AD": 2, "AF": 1, "ZZ": 0}}}"#;

    #[test]
    fn test_null_nans_leaves_strings_alone() {
        let json = r#"{"start": NaN, "end":NaN, "note": "window: NaN", "quote": "a \"b\": NaN"}"#;
        let value: serde_json::Value = serde_json::from_str(&null_nans(json)).unwrap();
        assert!(value["start"].is_null());
        assert!(value["end"].is_null());
        assert_eq!(value["note"], "window: NaN");
        assert_eq!(value["quote"], r#"a "b": NaN"#);
    }

    #[test]
    fn test_routes_from_json() {
        let routes = routes_from_json(ROUTES, PACKAGES, Some(SEQUENCES)).unwrap();
        assert_eq!(routes.len(), 1);
        let route = &routes[0];

        assert_eq!(route.name, "RouteID_1");
        assert_eq!(route.departure_time, Utc.with_ymd_and_hms(2018, 7, 27, 16, 2, 10).unwrap());
        assert_eq!(route.vehicle.as_ref().map(|v| v.capacity), Some(3313071.0));
        assert_eq!(route.sequence_names(SequenceKind::Actual), vec!["ZZ", "AF", "AD"]);
        assert!(route.sequence(SequenceKind::Planned).is_empty());
    }

    #[test]
    fn test_stop_conversion() {
        let routes = routes_from_json(ROUTES, PACKAGES, None).unwrap();
        let route = &routes[0];

        let depot = route.stop_by_name("ZZ").unwrap();
        assert_eq!(depot.location_type, LocationType::Depot);
        assert_eq!(depot.number_of_packages(), 0);
        assert_eq!(depot.time_window.start, route.departure_time);

        let ad = route.stop_by_name("AD").unwrap();
        assert_eq!(ad.location_type, LocationType::Delivery);
        assert_eq!(ad.location, Location::new(30.263, -97.759));
        assert_eq!(ad.number_of_delivered_packages(), 1);
        assert_eq!(ad.number_of_attempted_packages(), 1);
        assert_eq!(ad.planned_service_time, 79.0);
        // Window spans both package windows
        assert_eq!(ad.time_window.start.hour(), 16);
        assert_eq!(ad.time_window.start.minute(), 30);
        assert_eq!(ad.time_window.end.hour(), 19);

        let af = route.stop_by_name("AF").unwrap();
        assert_eq!(af.number_of_rejected_packages(), 1);
        assert_eq!(af.delivery_time().num_seconds(), 0);
        assert_eq!(af.time_window.start.day(), 27);
    }

    #[test]
    fn test_unknown_scan_status() {
        let packages = PACKAGES.replace("REJECTED", "LOST");
        let err = routes_from_json(ROUTES, &packages, None).unwrap_err();
        assert!(matches!(
            err,
            AnalyzerError::Validation(ValidationError::PackageStatus(ref s)) if s == "LOST"
        ));
    }

    #[test]
    fn test_unknown_stop_type() {
        let routes = ROUTES.replace("\"Station\"", "\"Warehouse\"");
        let err = routes_from_json(&routes, PACKAGES, None).unwrap_err();
        assert!(matches!(err, AnalyzerError::Validation(ValidationError::LocationType(_))));
    }

    #[test]
    fn test_sequence_with_unknown_stop() {
        let sequences = r#"{"RouteID_1": {"actual": {"QQ": 0}}}"#;
        let err = routes_from_json(ROUTES, PACKAGES, Some(sequences)).unwrap_err();
        assert!(matches!(err, AnalyzerError::Validation(ValidationError::UnknownStop { .. })));
    }

    #[test]
    fn test_bad_departure_time() {
        let routes = ROUTES.replace("16:02:10", "4pm");
        let err = routes_from_json(&routes, PACKAGES, None).unwrap_err();
        assert!(matches!(err, AnalyzerError::Validation(ValidationError::Timestamp(_))));
    }

    #[test]
    fn test_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let route_path = dir.path().join("route_data.json");
        let package_path = dir.path().join("package_data.json");
        let sequence_path = dir.path().join("actual_sequences.json");
        std::fs::write(&route_path, ROUTES).unwrap();
        std::fs::write(&package_path, PACKAGES).unwrap();
        std::fs::write(&sequence_path, SEQUENCES).unwrap();

        let routes = load(&route_path, &package_path, Some(sequence_path.as_path())).unwrap();
        assert_eq!(routes[0].number_of_stops(SequenceKind::Actual), 3);
    }
}
