//! Domain model for last-mile route analysis.
//!
//! # Overview
//!
//! - [`Package`]s with dimensions, scan status, weight and price
//! - [`Stop`]s with a location, a location type, a time window and packages
//! - [`Vehicle`]s with a volume capacity
//! - [`Route`]s owning a stop arena plus a planned and an actual visiting sequence
//!
//! # Design
//!
//! A route owns its stops in a `Vec` (the arena). Sequences are ordered lists
//! of [`StopId`]s into that arena, so a stop appears once no matter how many
//! sequences visit it. Metrics derived from a sequence are cached on the
//! route and cleared whenever the sequence or a stop changes.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::error::ValidationError;
use crate::geometry::haversine;
use crate::metrics::SequenceMetrics;

/// A geographic point in decimal degrees.
///
/// # Examples
///
/// ```
/// use last_mile_analyzer::domain::Location;
///
/// let philadelphia = Location::new(39.9526, -75.1652);
/// let new_york = Location::new(40.7128, -74.0060);
///
/// // Distance is approximately 130 km
/// let distance = philadelphia.distance_km(&new_york);
/// assert!(distance > 120.0 && distance < 140.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Location {
    /// Latitude in degrees (-90 to 90).
    pub lat: f64,
    /// Longitude in degrees (-180 to 180).
    pub lon: f64,
}

impl Location {
    /// Creates a new location.
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance to another location in kilometers.
    pub fn distance_km(&self, other: &Location) -> f64 {
        haversine(self.lat, self.lon, other.lat, other.lon)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lon)
    }
}

/// Scan status of a package.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum PackageStatus {
    ToBeDelivered,
    Rejected,
    Attempted,
    Delivered,
}

impl PackageStatus {
    /// All statuses, in reporting order.
    pub const ALL: [PackageStatus; 4] = [
        PackageStatus::ToBeDelivered,
        PackageStatus::Rejected,
        PackageStatus::Attempted,
        PackageStatus::Delivered,
    ];

    /// Returns the canonical lowercase name.
    ///
    /// ```
    /// use last_mile_analyzer::domain::PackageStatus;
    ///
    /// assert_eq!(PackageStatus::ToBeDelivered.as_str(), "to-be-delivered");
    /// assert_eq!("delivered".parse::<PackageStatus>().unwrap(), PackageStatus::Delivered);
    /// assert!("lost".parse::<PackageStatus>().is_err());
    /// ```
    pub fn as_str(self) -> &'static str {
        match self {
            PackageStatus::ToBeDelivered => "to-be-delivered",
            PackageStatus::Rejected => "rejected",
            PackageStatus::Attempted => "attempted",
            PackageStatus::Delivered => "delivered",
        }
    }
}

impl FromStr for PackageStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PackageStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ValidationError::PackageStatus(s.to_string()))
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role of a stop in a route.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LocationType {
    Depot,
    Pickup,
    Delivery,
}

impl LocationType {
    pub fn as_str(self) -> &'static str {
        match self {
            LocationType::Depot => "depot",
            LocationType::Pickup => "pickup",
            LocationType::Delivery => "delivery",
        }
    }
}

impl FromStr for LocationType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "depot" => Ok(LocationType::Depot),
            "pickup" => Ok(LocationType::Pickup),
            "delivery" => Ok(LocationType::Delivery),
            other => Err(ValidationError::LocationType(other.to_string())),
        }
    }
}

impl fmt::Display for LocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Package dimensions (depth, height, width).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, ToSchema)]
pub struct Dimensions {
    pub depth: f64,
    pub height: f64,
    pub width: f64,
}

impl Dimensions {
    pub fn volume(&self) -> f64 {
        self.depth * self.height * self.width
    }

    fn is_positive(&self) -> bool {
        self.depth > 0.0 && self.height > 0.0 && self.width > 0.0
    }
}

impl From<(f64, f64, f64)> for Dimensions {
    fn from((depth, height, width): (f64, f64, f64)) -> Self {
        Self { depth, height, width }
    }
}

/// A package delivered (or not) at a stop.
///
/// # Examples
///
/// ```
/// use last_mile_analyzer::domain::{Package, PackageStatus};
///
/// let package = Package::new("package_1", (1.0, 2.0, 3.0), PackageStatus::Delivered, 0.5, 10.0).unwrap();
/// assert_eq!(package.volume(), 6.0);
///
/// assert!(Package::new("bad", (0.0, 1.0, 1.0), PackageStatus::Delivered, 0.0, 0.0).is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Package {
    pub name: String,
    pub dimensions: Dimensions,
    status: PackageStatus,
    pub weight: f64,
    pub price: f64,
}

impl Package {
    /// Creates a package, validating dimensions, weight and price.
    pub fn new(
        name: impl Into<String>,
        dimensions: impl Into<Dimensions>,
        status: PackageStatus,
        weight: f64,
        price: f64,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let dimensions = dimensions.into();

        if !dimensions.is_positive() {
            return Err(ValidationError::Dimensions { package: name });
        }
        for (field, value) in [("weight", weight), ("price", price)] {
            if value.is_nan() || value < 0.0 {
                return Err(ValidationError::Negative {
                    package: name,
                    field,
                    value,
                });
            }
        }

        Ok(Self {
            name,
            dimensions,
            status,
            weight,
            price,
        })
    }

    pub fn status(&self) -> PackageStatus {
        self.status
    }

    /// Replaces the status.
    pub fn set_status(&mut self, status: PackageStatus) {
        self.status = status;
    }

    /// Replaces the status from its string form, leaving it untouched on error.
    pub fn set_status_str(&mut self, status: &str) -> Result<(), ValidationError> {
        self.status = status.parse()?;
        Ok(())
    }

    pub fn volume(&self) -> f64 {
        self.dimensions.volume()
    }
}

/// Ordered service interval of a stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Length of the window.
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }
}

/// A stop of a route: a location with a role, a time window and packages.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use last_mile_analyzer::domain::{LocationType, Location, Package, PackageStatus, Stop};
///
/// let start = Utc.with_ymd_and_hms(2022, 11, 20, 10, 0, 0).unwrap();
/// let end = Utc.with_ymd_and_hms(2022, 11, 20, 12, 0, 0).unwrap();
/// let packages = vec![
///     Package::new("p1", (1.0, 1.0, 1.0), PackageStatus::Delivered, 0.5, 10.0).unwrap(),
///     Package::new("p2", (1.0, 1.0, 1.0), PackageStatus::Rejected, 0.5, 10.0).unwrap(),
/// ];
/// let stop = Stop::new("AB", Location::new(0.0, 0.0), LocationType::Delivery, (start, end), packages).unwrap();
///
/// assert_eq!(stop.number_of_packages(), 2);
/// assert_eq!(stop.number_of_delivered_packages(), 1);
/// assert_eq!(stop.delivery_time().num_seconds(), 7200);
///
/// // Inverted windows are rejected
/// assert!(Stop::new("BA", Location::new(0.0, 0.0), LocationType::Delivery, (end, start), vec![]).is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Stop {
    pub name: String,
    pub location: Location,
    pub location_type: LocationType,
    pub time_window: TimeWindow,
    /// Planned service time in seconds.
    pub planned_service_time: f64,
    pub packages: Vec<Package>,
}

impl Stop {
    /// Creates a stop. Packages may come from any collection, including the
    /// values of a name-keyed map; they are stored as a list.
    pub fn new(
        name: impl Into<String>,
        location: Location,
        location_type: LocationType,
        time_window: (DateTime<Utc>, DateTime<Utc>),
        packages: impl IntoIterator<Item = Package>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        let (start, end) = time_window;
        if start > end {
            return Err(ValidationError::TimeWindow { stop: name });
        }

        Ok(Self {
            name,
            location,
            location_type,
            time_window: TimeWindow { start, end },
            planned_service_time: 0.0,
            packages: packages.into_iter().collect(),
        })
    }

    /// Sets the planned service time in seconds.
    pub fn with_planned_service_time(mut self, seconds: f64) -> Self {
        self.planned_service_time = seconds;
        self
    }

    pub fn is_delivery(&self) -> bool {
        self.location_type == LocationType::Delivery
    }

    /// Length of the stop's time window.
    pub fn delivery_time(&self) -> TimeDelta {
        self.time_window.duration()
    }

    pub fn number_of_packages(&self) -> usize {
        self.packages.len()
    }

    /// Number of packages with the given status.
    pub fn count(&self, status: PackageStatus) -> usize {
        self.packages.iter().filter(|p| p.status() == status).count()
    }

    /// Total volume of packages with the given status.
    pub fn volume(&self, status: PackageStatus) -> f64 {
        self.packages
            .iter()
            .filter(|p| p.status() == status)
            .map(Package::volume)
            .sum()
    }

    pub fn number_of_delivered_packages(&self) -> usize {
        self.count(PackageStatus::Delivered)
    }

    pub fn number_of_rejected_packages(&self) -> usize {
        self.count(PackageStatus::Rejected)
    }

    pub fn number_of_attempted_packages(&self) -> usize {
        self.count(PackageStatus::Attempted)
    }

    pub fn number_of_to_be_delivered_packages(&self) -> usize {
        self.count(PackageStatus::ToBeDelivered)
    }

    pub fn total_volume_of_packages(&self) -> f64 {
        self.packages.iter().map(Package::volume).sum()
    }

    pub fn total_volume_of_delivered_packages(&self) -> f64 {
        self.volume(PackageStatus::Delivered)
    }

    pub fn total_volume_of_rejected_packages(&self) -> f64 {
        self.volume(PackageStatus::Rejected)
    }

    pub fn total_volume_of_attempted_packages(&self) -> f64 {
        self.volume(PackageStatus::Attempted)
    }

    pub fn total_volume_of_to_be_delivered_packages(&self) -> f64 {
        self.volume(PackageStatus::ToBeDelivered)
    }

    pub fn total_weight_of_packages(&self) -> f64 {
        self.packages.iter().map(|p| p.weight).sum()
    }

    /// Average package weight, 0 for a stop without packages.
    pub fn average_weight_of_packages(&self) -> f64 {
        average(self.total_weight_of_packages(), self.packages.len())
    }

    pub fn total_price_of_packages(&self) -> f64 {
        self.packages.iter().map(|p| p.price).sum()
    }

    /// Average package price, 0 for a stop without packages.
    pub fn average_price_of_packages(&self) -> f64 {
        average(self.total_price_of_packages(), self.packages.len())
    }
}

fn average(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

/// A delivery vehicle with a volume capacity.
///
/// ```
/// use last_mile_analyzer::domain::Vehicle;
///
/// let vehicle = Vehicle::new("Van", 500.0);
/// assert_eq!(vehicle.to_string(), "Vehicle(name=Van, capacity=500)");
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Vehicle {
    pub name: String,
    /// Capacity in package-volume units.
    pub capacity: f64,
}

impl Vehicle {
    pub fn new(name: impl Into<String>, capacity: f64) -> Self {
        Self {
            name: name.into(),
            capacity,
        }
    }
}

impl fmt::Display for Vehicle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Vehicle(name={}, capacity={})", self.name, self.capacity)
    }
}

/// Index of a stop in its route's stop arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StopId(pub usize);

/// Which visiting order of a route.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SequenceKind {
    Planned,
    Actual,
}

impl SequenceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SequenceKind::Planned => "planned",
            SequenceKind::Actual => "actual",
        }
    }
}

impl FromStr for SequenceKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planned" => Ok(SequenceKind::Planned),
            "actual" => Ok(SequenceKind::Actual),
            other => Err(ValidationError::SequenceKind(other.to_string())),
        }
    }
}

impl fmt::Display for SequenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A visiting order given either by stop names or by arena ids.
#[derive(Clone, Debug, PartialEq)]
pub enum SequenceInput {
    Names(Vec<String>),
    Stops(Vec<StopId>),
}

impl From<Vec<String>> for SequenceInput {
    fn from(names: Vec<String>) -> Self {
        SequenceInput::Names(names)
    }
}

impl From<Vec<&str>> for SequenceInput {
    fn from(names: Vec<&str>) -> Self {
        SequenceInput::Names(names.into_iter().map(String::from).collect())
    }
}

impl From<Vec<StopId>> for SequenceInput {
    fn from(ids: Vec<StopId>) -> Self {
        SequenceInput::Stops(ids)
    }
}

/// A delivery route: stops, two visiting sequences and cached metrics.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use last_mile_analyzer::domain::{Location, LocationType, Route, SequenceKind, Stop};
///
/// let t = Utc.with_ymd_and_hms(2018, 7, 27, 16, 0, 0).unwrap();
/// let stops = vec![
///     Stop::new("DEPOT", Location::new(0.0, 0.0), LocationType::Depot, (t, t), vec![]).unwrap(),
///     Stop::new("A", Location::new(0.0, 0.01), LocationType::Delivery, (t, t), vec![]).unwrap(),
/// ];
/// let mut route = Route::new("RouteID_1", stops, t);
/// route.set_sequence(SequenceKind::Actual, vec!["DEPOT", "A"]).unwrap();
///
/// assert_eq!(route.sequence_names(SequenceKind::Actual), vec!["DEPOT", "A"]);
/// assert!(route.set_sequence(SequenceKind::Planned, vec!["DEPOT", "Z"]).is_err());
/// ```
#[derive(Clone, Debug)]
pub struct Route {
    pub name: String,
    pub departure_time: DateTime<Utc>,
    pub vehicle: Option<Vehicle>,
    stops: Vec<Stop>,
    index: HashMap<String, StopId>,
    planned: Vec<StopId>,
    actual: Vec<StopId>,
    pub(crate) planned_metrics: SequenceMetrics,
    pub(crate) actual_metrics: SequenceMetrics,
}

impl Route {
    /// Creates a route with empty sequences. Stops sharing a name are
    /// deduplicated; the last one wins.
    pub fn new(
        name: impl Into<String>,
        stops: impl IntoIterator<Item = Stop>,
        departure_time: DateTime<Utc>,
    ) -> Self {
        let mut arena: Vec<Stop> = Vec::new();
        let mut index: HashMap<String, StopId> = HashMap::new();

        for stop in stops {
            match index.get(&stop.name) {
                Some(&id) => arena[id.0] = stop,
                None => {
                    index.insert(stop.name.clone(), StopId(arena.len()));
                    arena.push(stop);
                }
            }
        }

        Self {
            name: name.into(),
            departure_time,
            vehicle: None,
            stops: arena,
            index,
            planned: Vec::new(),
            actual: Vec::new(),
            planned_metrics: SequenceMetrics::default(),
            actual_metrics: SequenceMetrics::default(),
        }
    }

    /// Attaches a vehicle.
    pub fn with_vehicle(mut self, vehicle: Vehicle) -> Self {
        self.vehicle = Some(vehicle);
        self
    }

    /// All stops, in arena order.
    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn stop(&self, id: StopId) -> Option<&Stop> {
        self.stops.get(id.0)
    }

    pub fn stop_id(&self, name: &str) -> Option<StopId> {
        self.index.get(name).copied()
    }

    pub fn stop_by_name(&self, name: &str) -> Option<&Stop> {
        self.stop_id(name).and_then(|id| self.stop(id))
    }

    /// Mutable access to a stop. Clears every cached metric of the route.
    pub fn stop_mut(&mut self, id: StopId) -> Option<&mut Stop> {
        self.invalidate_metrics();
        self.stops.get_mut(id.0)
    }

    /// Replaces a sequence, resolving names through the stop map.
    ///
    /// Every member must belong to the route. On success the cached metrics
    /// of that sequence are cleared; on error the sequence is unchanged.
    pub fn set_sequence(
        &mut self,
        kind: SequenceKind,
        input: impl Into<SequenceInput>,
    ) -> Result<(), ValidationError> {
        let ids = match input.into() {
            SequenceInput::Names(names) => names
                .iter()
                .map(|name| {
                    self.stop_id(name).ok_or_else(|| ValidationError::UnknownStop {
                        route: self.name.clone(),
                        stop: name.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            SequenceInput::Stops(ids) => {
                if let Some(bad) = ids.iter().find(|id| id.0 >= self.stops.len()) {
                    return Err(ValidationError::UnknownStop {
                        route: self.name.clone(),
                        stop: format!("#{}", bad.0),
                    });
                }
                ids
            }
        };

        match kind {
            SequenceKind::Planned => self.planned = ids,
            SequenceKind::Actual => self.actual = ids,
        }
        *self.metrics_mut(kind) = SequenceMetrics::default();
        Ok(())
    }

    /// Stop ids of a sequence, in visiting order.
    pub fn sequence(&self, kind: SequenceKind) -> &[StopId] {
        match kind {
            SequenceKind::Planned => &self.planned,
            SequenceKind::Actual => &self.actual,
        }
    }

    /// Stops of a sequence, in visiting order.
    pub fn sequence_stops(&self, kind: SequenceKind) -> impl Iterator<Item = &Stop> + '_ {
        self.sequence(kind).iter().filter_map(|&id| self.stop(id))
    }

    pub fn sequence_names(&self, kind: SequenceKind) -> Vec<&str> {
        self.sequence_stops(kind).map(|s| s.name.as_str()).collect()
    }

    pub fn sequence_locations(&self, kind: SequenceKind) -> Vec<Location> {
        self.sequence_stops(kind).map(|s| s.location).collect()
    }

    pub fn number_of_stops(&self, kind: SequenceKind) -> usize {
        self.sequence(kind).len()
    }

    /// Stops whose location type is delivery.
    pub fn delivery_stops(&self) -> impl Iterator<Item = &Stop> + '_ {
        self.stops.iter().filter(|s| s.is_delivery())
    }

    /// Total package volume across every stop.
    pub fn total_volume_of_packages(&self) -> f64 {
        self.stops.iter().map(Stop::total_volume_of_packages).sum()
    }

    /// Share of the vehicle capacity filled by the route's packages.
    ///
    /// `None` without a vehicle or with a non-positive capacity.
    pub fn capacity_utilization(&self) -> Option<f64> {
        self.vehicle
            .as_ref()
            .filter(|v| v.capacity > 0.0)
            .map(|v| self.total_volume_of_packages() / v.capacity)
    }

    pub(crate) fn metrics(&self, kind: SequenceKind) -> &SequenceMetrics {
        match kind {
            SequenceKind::Planned => &self.planned_metrics,
            SequenceKind::Actual => &self.actual_metrics,
        }
    }

    pub(crate) fn metrics_mut(&mut self, kind: SequenceKind) -> &mut SequenceMetrics {
        match kind {
            SequenceKind::Planned => &mut self.planned_metrics,
            SequenceKind::Actual => &mut self.actual_metrics,
        }
    }

    /// Drops every cached metric so the next evaluation starts from scratch.
    pub fn invalidate_metrics(&mut self) {
        self.planned_metrics = SequenceMetrics::default();
        self.actual_metrics = SequenceMetrics::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2022, 11, 20, hour, 0, 0).unwrap()
    }

    fn package(name: &str, status: PackageStatus) -> Package {
        Package::new(name, (1.0, 1.0, 1.0), status, 0.5, 10.0).unwrap()
    }

    fn example_stop() -> Stop {
        Stop::new(
            "example_stop",
            Location::new(0.0, 0.0),
            LocationType::Delivery,
            (t(10), t(12)),
            vec![
                package("package_1", PackageStatus::Delivered),
                package("package_2", PackageStatus::Delivered),
            ],
        )
        .unwrap()
        .with_planned_service_time(60.0)
    }

    #[test]
    fn test_package_invalid_status_string() {
        assert_eq!(
            "lost".parse::<PackageStatus>(),
            Err(ValidationError::PackageStatus("lost".to_string()))
        );
    }

    #[test]
    fn test_sequence_kind_parse() {
        assert_eq!("planned".parse::<SequenceKind>(), Ok(SequenceKind::Planned));
        assert_eq!(SequenceKind::Actual.to_string().parse::<SequenceKind>(), Ok(SequenceKind::Actual));
        assert!(matches!(
            "executed".parse::<SequenceKind>(),
            Err(ValidationError::SequenceKind(_))
        ));
    }

    #[test]
    fn test_package_modify_status() {
        let mut p = package("package_1", PackageStatus::ToBeDelivered);
        p.set_status_str("delivered").unwrap();
        assert_eq!(p.status(), PackageStatus::Delivered);

        assert!(p.set_status_str("invalid status").is_err());
        assert_eq!(p.status(), PackageStatus::Delivered);

        p.set_status(PackageStatus::Attempted);
        assert_eq!(p.status(), PackageStatus::Attempted);
    }

    #[test]
    fn test_package_volume() {
        assert_eq!(package("unit", PackageStatus::Delivered).volume(), 1.0);
        let p = Package::new("box", (2.0, 3.0, 4.5), PackageStatus::Rejected, 0.0, 0.0).unwrap();
        assert_eq!(p.volume(), 27.0);
    }

    #[test]
    fn test_package_rejects_negative_weight_and_price() {
        let weight = Package::new("w", (1.0, 1.0, 1.0), PackageStatus::Delivered, -1.0, 0.0);
        assert!(matches!(weight, Err(ValidationError::Negative { field: "weight", .. })));
        let price = Package::new("p", (1.0, 1.0, 1.0), PackageStatus::Delivered, 0.0, -0.01);
        assert!(matches!(price, Err(ValidationError::Negative { field: "price", .. })));
    }

    #[test]
    fn test_package_rejects_nan_weight_and_price() {
        let weight = Package::new("w", (1.0, 1.0, 1.0), PackageStatus::Delivered, f64::NAN, 0.0);
        assert!(matches!(weight, Err(ValidationError::Negative { field: "weight", .. })));
        let price = Package::new("p", (1.0, 1.0, 1.0), PackageStatus::Delivered, 0.0, f64::NAN);
        assert!(matches!(price, Err(ValidationError::Negative { field: "price", .. })));
        assert!(Package::new("d", (f64::NAN, 1.0, 1.0), PackageStatus::Delivered, 0.0, 0.0).is_err());
    }

    #[test]
    fn test_package_status_serde_names() {
        let json = serde_json::to_string(&PackageStatus::ToBeDelivered).unwrap();
        assert_eq!(json, "\"to-be-delivered\"");
        let back: PackageStatus = serde_json::from_str("\"attempted\"").unwrap();
        assert_eq!(back, PackageStatus::Attempted);
    }

    #[test]
    fn test_location_type_parse() {
        assert_eq!("pickup".parse::<LocationType>().unwrap(), LocationType::Pickup);
        assert!(matches!(
            "warehouse".parse::<LocationType>(),
            Err(ValidationError::LocationType(_))
        ));
    }

    #[test]
    fn test_stop_object() {
        let stop = example_stop();
        assert_eq!(stop.name, "example_stop");
        assert_eq!(stop.location, Location::new(0.0, 0.0));
        assert_eq!(stop.location_type, LocationType::Delivery);
        assert_eq!(stop.time_window.start, t(10));
        assert_eq!(stop.time_window.end, t(12));
        assert_eq!(stop.planned_service_time, 60.0);
        assert_eq!(stop.packages.len(), 2);
    }

    #[test]
    fn test_stop_properties() {
        let stop = example_stop();
        assert_eq!(stop.delivery_time().num_seconds(), 7200);
        assert_eq!(stop.number_of_delivered_packages(), 2);
        assert_eq!(stop.number_of_rejected_packages(), 0);
        assert_eq!(stop.number_of_attempted_packages(), 0);
        assert_eq!(stop.number_of_to_be_delivered_packages(), 0);
        assert_eq!(stop.number_of_packages(), 2);
        assert_eq!(stop.total_volume_of_packages(), 2.0);
        assert_eq!(stop.total_volume_of_delivered_packages(), 2.0);
        assert_eq!(stop.total_weight_of_packages(), 1.0);
        assert_eq!(stop.average_weight_of_packages(), 0.5);
        assert_eq!(stop.total_price_of_packages(), 20.0);
        assert_eq!(stop.average_price_of_packages(), 10.0);
    }

    #[test]
    fn test_stop_status_counts_sum_to_total() {
        let packages = vec![
            package("a", PackageStatus::Delivered),
            package("b", PackageStatus::Rejected),
            package("c", PackageStatus::Attempted),
            package("d", PackageStatus::ToBeDelivered),
            package("e", PackageStatus::Delivered),
        ];
        let stop = Stop::new("s", Location::new(1.0, 1.0), LocationType::Delivery, (t(8), t(9)), packages).unwrap();
        let sum: usize = PackageStatus::ALL.into_iter().map(|s| stop.count(s)).sum();
        assert_eq!(sum, stop.number_of_packages());
        assert_eq!(stop.total_volume_of_rejected_packages(), 1.0);
    }

    #[test]
    fn test_stop_accepts_keyed_packages() {
        let mut keyed = HashMap::new();
        keyed.insert("a".to_string(), package("a", PackageStatus::Delivered));
        keyed.insert("b".to_string(), package("b", PackageStatus::Attempted));
        let stop = Stop::new("s", Location::new(0.0, 0.0), LocationType::Delivery, (t(8), t(8)), keyed.into_values()).unwrap();
        assert_eq!(stop.number_of_packages(), 2);
    }

    #[test]
    fn test_stop_inverted_time_window() {
        let err = Stop::new("late", Location::new(0.0, 0.0), LocationType::Pickup, (t(12), t(10)), vec![]);
        assert_eq!(err, Err(ValidationError::TimeWindow { stop: "late".to_string() }));
    }

    #[test]
    fn test_stop_without_packages_averages_zero() {
        let stop = Stop::new("empty", Location::new(0.0, 0.0), LocationType::Depot, (t(8), t(8)), vec![]).unwrap();
        assert_eq!(stop.average_weight_of_packages(), 0.0);
        assert_eq!(stop.average_price_of_packages(), 0.0);
    }

    #[test]
    fn test_route_deduplicates_stops_last_wins() {
        let first = Stop::new("A", Location::new(0.0, 0.0), LocationType::Delivery, (t(8), t(8)), vec![]).unwrap();
        let second = Stop::new("A", Location::new(1.0, 1.0), LocationType::Delivery, (t(8), t(8)), vec![]).unwrap();
        let route = Route::new("r", vec![first, second], t(8));
        assert_eq!(route.stops().len(), 1);
        assert_eq!(route.stop_by_name("A").unwrap().location, Location::new(1.0, 1.0));
    }

    #[test]
    fn test_route_sequence_from_ids_and_names() {
        let stops = ["S", "A", "B"].map(|n| {
            Stop::new(n, Location::new(0.0, 0.0), LocationType::Delivery, (t(8), t(8)), vec![]).unwrap()
        });
        let mut route = Route::new("r", stops, t(8));

        route.set_sequence(SequenceKind::Planned, vec![StopId(2), StopId(0)]).unwrap();
        assert_eq!(route.sequence_names(SequenceKind::Planned), vec!["B", "S"]);

        let err = route.set_sequence(SequenceKind::Planned, vec![StopId(7)]).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownStop { .. }));
        // Failed assignment leaves the previous sequence in place
        assert_eq!(route.number_of_stops(SequenceKind::Planned), 2);

        route.set_sequence(SequenceKind::Actual, vec!["A", "B", "S"]).unwrap();
        assert_eq!(route.sequence(SequenceKind::Actual), &[StopId(1), StopId(2), StopId(0)]);
    }

    #[test]
    fn test_route_capacity_utilization() {
        let stop = example_stop();
        let route = Route::new("r", vec![stop.clone()], t(8));
        assert_eq!(route.capacity_utilization(), None);

        let route = Route::new("r", vec![stop], t(8)).with_vehicle(Vehicle::new("Van", 4.0));
        assert_eq!(route.capacity_utilization(), Some(0.5));
    }

    #[test]
    fn test_vehicle_display() {
        let vehicle = Vehicle::new("Van", 500.5);
        assert_eq!(vehicle.name, "Van");
        assert_eq!(vehicle.capacity, 500.5);
        assert_eq!(vehicle.to_string(), "Vehicle(name=Van, capacity=500.5)");
    }
}
