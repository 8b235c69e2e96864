//! Cross-route analysis.
//!
//! An [`Analysis`] owns a non-empty set of routes, runs the metric stages
//! over all of them, and folds the results into corpus summaries and a
//! one-row-per-route CSV export.

use chrono::{DateTime, Datelike, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use tracing::info;
use utoipa::ToSchema;

use crate::domain::{Location, PackageStatus, Route, SequenceKind};
use crate::error::{AnalyzerError, MetricsError, ValidationError};
use crate::geometry::{minimum_rotated_rectangle_area, BoundingBox};
use crate::metrics::{DrivingSource, RouteStatus};

/// A named collection of routes.
#[derive(Clone, Debug)]
pub struct Analysis {
    pub name: String,
    routes: Vec<Route>,
    index: HashMap<String, usize>,
}

/// Package status totals over every route.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub number_of_routes: usize,
    pub status: RouteStatus,
}

/// Spread of the aggregate circuity across routes.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CircuitySummary {
    pub evaluated_routes: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub min_route: String,
    pub max_route: String,
}

/// Departure-time coverage of an analysis.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimePeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Routes departing on each weekday, Monday first.
    pub routes_per_weekday: Vec<usize>,
}

/// Routes inside one region.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct RegionRoutes {
    pub region: String,
    pub routes: Vec<String>,
}

/// Route names grouped by region, in region order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct RegionPartition {
    pub regions: Vec<RegionRoutes>,
    pub unassigned: Vec<String>,
}

/// One exported row: everything known about a route and one of its sequences.
///
/// Metrics that were not evaluated export as empty cells.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct RouteSummary {
    pub route: String,
    pub sequence: SequenceKind,
    pub departure_time: DateTime<Utc>,
    pub vehicle_capacity: Option<f64>,
    pub capacity_utilization: Option<f64>,
    pub number_of_stops: usize,
    pub number_of_delivery_stops: usize,
    pub number_of_non_delivery_stops: usize,
    pub number_of_packages: usize,
    pub number_of_delivered_packages: usize,
    pub number_of_rejected_packages: usize,
    pub number_of_attempted_packages: usize,
    pub number_of_to_be_delivered_packages: usize,
    pub percentage_delivered: f64,
    pub percentage_rejected: f64,
    pub percentage_attempted: f64,
    pub percentage_to_be_delivered: f64,
    pub average_packages_per_stop: f64,
    pub euclidean_total_km: Option<f64>,
    pub euclidean_mean_km: Option<f64>,
    pub euclidean_max_km: Option<f64>,
    pub euclidean_min_km: Option<f64>,
    pub driving_total_km: Option<f64>,
    pub driving_mean_km: Option<f64>,
    pub driving_max_km: Option<f64>,
    pub driving_min_km: Option<f64>,
    pub driving_duration_min: Option<f64>,
    pub circuity_factor: Option<f64>,
    pub mean_leg_circuity: Option<f64>,
    pub lat_min: Option<f64>,
    pub lat_max: Option<f64>,
    pub lon_min: Option<f64>,
    pub lon_max: Option<f64>,
    pub bbox_area_km2: Option<f64>,
    pub centroid_lat: Option<f64>,
    pub centroid_lon: Option<f64>,
    pub dispersion_mean_km: Option<f64>,
    pub dispersion_std_km: Option<f64>,
    pub min_rotated_rect_area_deg2: f64,
}

impl Analysis {
    /// Creates an analysis. Fails on an empty route list.
    pub fn new(name: impl Into<String>, routes: Vec<Route>) -> Result<Self, ValidationError> {
        if routes.is_empty() {
            return Err(ValidationError::EmptyAnalysis);
        }
        let index = routes
            .iter()
            .enumerate()
            .map(|(i, r)| (r.name.clone(), i))
            .collect();
        Ok(Self {
            name: name.into(),
            routes,
            index,
        })
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn route(&self, name: &str) -> Option<&Route> {
        self.index.get(name).and_then(|&i| self.routes.get(i))
    }

    pub fn route_mut(&mut self, name: &str) -> Option<&mut Route> {
        let i = *self.index.get(name)?;
        self.routes.get_mut(i)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Euclidean stage for every route, in parallel.
    pub fn evaluate_euclidean_distances(&mut self, kind: SequenceKind) {
        self.routes.par_iter_mut().for_each(|route| {
            route.evaluate_euclidean_distances(kind);
        });
        info!(analysis = %self.name, routes = self.routes.len(), sequence = %kind, "Euclidean distances evaluated");
    }

    /// Driving stage for every route, one route at a time. Stops at the
    /// first failing route.
    pub async fn evaluate_driving_distances(
        &mut self,
        kind: SequenceKind,
        source: DrivingSource<'_>,
    ) -> Result<(), AnalyzerError> {
        for route in &mut self.routes {
            route.evaluate_driving_distances(kind, source).await?;
        }
        info!(analysis = %self.name, sequence = %kind, "Driving distances evaluated");
        Ok(())
    }

    pub fn evaluate_circuity_factor(&mut self, kind: SequenceKind) -> Result<(), MetricsError> {
        for route in &mut self.routes {
            route.evaluate_circuity_factor(kind)?;
        }
        Ok(())
    }

    /// Runs all three distance stages.
    pub async fn evaluate(&mut self, kind: SequenceKind, source: DrivingSource<'_>) -> Result<(), AnalyzerError> {
        self.evaluate_euclidean_distances(kind);
        self.evaluate_driving_distances(kind, source).await?;
        self.evaluate_circuity_factor(kind)?;
        Ok(())
    }

    /// Package status totals over the delivery stops of every route.
    pub fn status_summary(&self) -> StatusSummary {
        let mut delivery_stops = 0;
        let mut non_delivery_stops = 0;
        let mut counts = [0usize; 4];

        for route in &self.routes {
            for stop in route.stops() {
                if !stop.is_delivery() {
                    non_delivery_stops += 1;
                    continue;
                }
                delivery_stops += 1;
                for (count, status) in counts.iter_mut().zip(PackageStatus::ALL) {
                    *count += stop.count(status);
                }
            }
        }

        StatusSummary {
            number_of_routes: self.routes.len(),
            status: RouteStatus::from_counts(&self.name, delivery_stops, non_delivery_stops, counts),
        }
    }

    /// Mean and extrema of the aggregate circuity over the routes where it
    /// has been evaluated. `None` if no route has one.
    pub fn circuity_summary(&self, kind: SequenceKind) -> Option<CircuitySummary> {
        let evaluated: Vec<(&str, f64)> = self
            .routes
            .iter()
            .filter_map(|r| r.circuity(kind).map(|c| (r.name.as_str(), c.aggregate)))
            .collect();
        let &(first_name, first) = evaluated.first()?;

        let (mut min_route, mut min) = (first_name, first);
        let (mut max_route, mut max) = (first_name, first);
        for &(name, value) in &evaluated[1..] {
            if value < min {
                (min_route, min) = (name, value);
            }
            if value > max {
                (max_route, max) = (name, value);
            }
        }
        let mean = evaluated.iter().map(|(_, v)| v).sum::<f64>() / evaluated.len() as f64;

        Some(CircuitySummary {
            evaluated_routes: evaluated.len(),
            mean,
            min,
            max,
            min_route: min_route.to_string(),
            max_route: max_route.to_string(),
        })
    }

    /// Earliest and latest departure, and departures per weekday.
    pub fn time_period(&self) -> TimePeriod {
        let mut start = self.routes[0].departure_time;
        let mut end = start;
        let mut routes_per_weekday = vec![0usize; 7];

        for route in &self.routes {
            start = start.min(route.departure_time);
            end = end.max(route.departure_time);
            routes_per_weekday[route.departure_time.weekday().num_days_from_monday() as usize] += 1;
        }

        TimePeriod {
            start,
            end,
            routes_per_weekday,
        }
    }

    /// Assigns each route to the first region containing the centre of its
    /// delivery stops (all stops when it has none).
    pub fn partition_by_region(&self, regions: &[BoundingBox]) -> RegionPartition {
        let mut partition = RegionPartition {
            regions: regions
                .iter()
                .map(|r| RegionRoutes {
                    region: r.name.clone(),
                    routes: Vec::new(),
                })
                .collect(),
            unassigned: Vec::new(),
        };

        for route in &self.routes {
            let slot = route_center(route)
                .and_then(|center| regions.iter().position(|region| region.contains(center)));
            match slot {
                Some(i) => partition.regions[i].routes.push(route.name.clone()),
                None => partition.unassigned.push(route.name.clone()),
            }
        }

        partition
    }

    /// One summary row per route for the given sequence.
    pub fn summary_rows(&self, kind: SequenceKind) -> Vec<RouteSummary> {
        self.routes.iter().map(|r| RouteSummary::new(r, kind)).collect()
    }

    pub fn export_summary_csv(&self, path: impl AsRef<Path>, kind: SequenceKind) -> Result<(), csv::Error> {
        let path = path.as_ref();
        self.write_summary(std::fs::File::create(path)?, kind)?;
        info!(analysis = %self.name, path = %path.display(), "Summary exported");
        Ok(())
    }

    pub fn write_summary<W: io::Write>(&self, writer: W, kind: SequenceKind) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_writer(writer);
        for row in self.summary_rows(kind) {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

fn route_center(route: &Route) -> Option<Location> {
    let mut locations: Vec<Location> = route.delivery_stops().map(|s| s.location).collect();
    if locations.is_empty() {
        locations = route.stops().iter().map(|s| s.location).collect();
    }
    if locations.is_empty() {
        return None;
    }
    let n = locations.len() as f64;
    Some(Location::new(
        locations.iter().map(|l| l.lat).sum::<f64>() / n,
        locations.iter().map(|l| l.lon).sum::<f64>() / n,
    ))
}

impl RouteSummary {
    pub fn new(route: &Route, kind: SequenceKind) -> Self {
        let status = route.evaluate_status();
        let euclidean = route.euclidean_distances(kind);
        let driving = route.driving_distances(kind);
        let circuity = route.circuity(kind);
        let bounds = route.bounding_box(kind);
        let centroid = route.centroid(kind);

        Self {
            route: route.name.clone(),
            sequence: kind,
            departure_time: route.departure_time,
            vehicle_capacity: route.vehicle.as_ref().map(|v| v.capacity),
            capacity_utilization: route.capacity_utilization(),
            number_of_stops: route.number_of_stops(kind),
            number_of_delivery_stops: status.number_of_delivery_stops,
            number_of_non_delivery_stops: status.number_of_non_delivery_stops,
            number_of_packages: status.number_of_packages,
            number_of_delivered_packages: status.number_of_delivered_packages,
            number_of_rejected_packages: status.number_of_rejected_packages,
            number_of_attempted_packages: status.number_of_attempted_packages,
            number_of_to_be_delivered_packages: status.number_of_to_be_delivered_packages,
            percentage_delivered: status.percentage_delivered,
            percentage_rejected: status.percentage_rejected,
            percentage_attempted: status.percentage_attempted,
            percentage_to_be_delivered: status.percentage_to_be_delivered,
            average_packages_per_stop: status.average_packages_per_stop,
            euclidean_total_km: euclidean.map(|e| e.total()),
            euclidean_mean_km: euclidean.map(|e| e.mean()),
            euclidean_max_km: euclidean.map(|e| e.max()),
            euclidean_min_km: euclidean.map(|e| e.min()),
            driving_total_km: driving.map(|d| d.distances.total()),
            driving_mean_km: driving.map(|d| d.distances.mean()),
            driving_max_km: driving.map(|d| d.distances.max()),
            driving_min_km: driving.map(|d| d.distances.min()),
            driving_duration_min: driving.map(|d| d.durations.total()),
            circuity_factor: circuity.map(|c| c.aggregate),
            mean_leg_circuity: circuity.map(|c| c.mean_leg_circuity()),
            lat_min: bounds.as_ref().map(|b| b.lat_min),
            lat_max: bounds.as_ref().map(|b| b.lat_max),
            lon_min: bounds.as_ref().map(|b| b.lon_min),
            lon_max: bounds.as_ref().map(|b| b.lon_max),
            bbox_area_km2: bounds.as_ref().map(|b| b.area_km2),
            centroid_lat: centroid.as_ref().map(|c| c.lat_mean),
            centroid_lon: centroid.as_ref().map(|c| c.lon_mean),
            dispersion_mean_km: centroid.as_ref().map(|c| c.dispersion_mean_km),
            dispersion_std_km: centroid.as_ref().map(|c| c.dispersion_std_km),
            min_rotated_rect_area_deg2: minimum_rotated_rectangle_area(&route.sequence_locations(kind)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::{DistanceMode, DistanceService};
    use crate::domain::{LocationType, Package, Stop, Vehicle};
    use chrono::TimeZone;

    fn route(name: &str, day: u32, origin: (f64, f64), statuses: &[PackageStatus]) -> Route {
        let t = Utc.with_ymd_and_hms(2018, 7, day, 16, 0, 0).unwrap();
        let (lat, lon) = origin;
        let packages: Vec<Package> = statuses
            .iter()
            .enumerate()
            .map(|(i, &s)| Package::new(format!("p{i}"), (1.0, 1.0, 1.0), s, 1.0, 2.0).unwrap())
            .collect();
        let stops = vec![
            Stop::new("D", Location::new(lat, lon), LocationType::Depot, (t, t), vec![]).unwrap(),
            Stop::new("A", Location::new(lat, lon + 0.01), LocationType::Delivery, (t, t), packages).unwrap(),
            Stop::new("B", Location::new(lat + 0.01, lon + 0.01), LocationType::Delivery, (t, t), vec![]).unwrap(),
        ];
        let mut route = Route::new(name, stops, t).with_vehicle(Vehicle::new("Van", 10.0));
        route.set_sequence(SequenceKind::Actual, vec!["D", "A", "B"]).unwrap();
        route
    }

    fn analysis() -> Analysis {
        Analysis::new(
            "test",
            vec![
                // 2018-07-23 is a Monday
                route("R1", 23, (30.0, -97.0), &[PackageStatus::Delivered, PackageStatus::Rejected]),
                route("R2", 25, (47.0, -122.0), &[PackageStatus::Delivered, PackageStatus::Delivered]),
                route("R3", 25, (30.1, -97.1), &[]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_empty_analysis_rejected() {
        assert!(matches!(Analysis::new("empty", vec![]), Err(ValidationError::EmptyAnalysis)));
    }

    #[test]
    fn test_route_lookup() {
        let analysis = analysis();
        assert_eq!(analysis.len(), 3);
        assert_eq!(analysis.route("R2").map(|r| r.name.as_str()), Some("R2"));
        assert!(analysis.route("R9").is_none());
    }

    #[test]
    fn test_status_summary() {
        let summary = analysis().status_summary();
        assert_eq!(summary.number_of_routes, 3);
        assert_eq!(summary.status.number_of_delivery_stops, 6);
        assert_eq!(summary.status.number_of_non_delivery_stops, 3);
        assert_eq!(summary.status.number_of_packages, 4);
        assert_eq!(summary.status.percentage_delivered, 75.0);
        assert_eq!(summary.status.percentage_rejected, 25.0);
    }

    #[test]
    fn test_time_period() {
        let period = analysis().time_period();
        assert_eq!(period.start, Utc.with_ymd_and_hms(2018, 7, 23, 16, 0, 0).unwrap());
        assert_eq!(period.end, Utc.with_ymd_and_hms(2018, 7, 25, 16, 0, 0).unwrap());
        assert_eq!(period.routes_per_weekday, vec![1, 0, 2, 0, 0, 0, 0]);
    }

    #[test]
    fn test_partition_by_region() {
        let regions = [
            BoundingBox::new("Austin", 29.5, 31.0, -98.0, -96.0),
            BoundingBox::new("Boston", 42.0, 43.0, -71.5, -70.5),
        ];
        let partition = analysis().partition_by_region(&regions);
        assert_eq!(partition.regions[0].region, "Austin");
        assert_eq!(partition.regions[0].routes, vec!["R1".to_string(), "R3".to_string()]);
        assert!(partition.regions[1].routes.is_empty());
        assert_eq!(partition.unassigned, vec!["R2".to_string()]);
    }

    #[test]
    fn test_circuity_summary_requires_evaluation() {
        assert!(analysis().circuity_summary(SequenceKind::Actual).is_none());
    }

    #[tokio::test]
    async fn test_evaluate_all_routes() {
        let mut analysis = analysis();
        let service = DistanceService::default();
        analysis
            .evaluate(
                SequenceKind::Actual,
                DrivingSource::Service {
                    service: &service,
                    mode: DistanceMode::Haversine,
                },
            )
            .await
            .unwrap();

        let summary = analysis.circuity_summary(SequenceKind::Actual).unwrap();
        assert_eq!(summary.evaluated_routes, 3);
        assert!((summary.mean - 1.0).abs() < 1e-12);
        assert!((summary.max - 1.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_driving_failure_propagates() {
        let mut analysis = analysis();
        let service = DistanceService::default();
        let err = analysis
            .evaluate_driving_distances(
                SequenceKind::Actual,
                DrivingSource::Service {
                    service: &service,
                    mode: DistanceMode::Gmaps,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::Routing(_)));
    }

    #[test]
    fn test_summary_rows_and_csv() {
        let mut analysis = analysis();
        analysis.evaluate_euclidean_distances(SequenceKind::Actual);

        let rows = analysis.summary_rows(SequenceKind::Actual);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].number_of_stops, 3);
        assert_eq!(rows[0].capacity_utilization, Some(0.2));
        assert!(rows[0].euclidean_total_km.unwrap() > 0.0);
        assert_eq!(rows[0].driving_total_km, None);
        assert_eq!(rows[0].circuity_factor, None);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");
        analysis.export_summary_csv(&path, SequenceKind::Actual).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("route,sequence,departure_time,"));
        assert!(header.contains("circuity_factor"));
        assert_eq!(lines.count(), 3);
    }
}
