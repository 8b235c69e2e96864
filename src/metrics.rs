//! Staged route metrics.
//!
//! Each sequence of a [`Route`] moves through three stages:
//!
//! 1. [`Route::evaluate_euclidean_distances`] - cyclic haversine legs
//! 2. [`Route::evaluate_driving_distances`] - driving legs from a distance
//!    matrix or a routing service
//! 3. [`Route::evaluate_circuity_factor`] - driving over euclidean, per leg
//!    and in aggregate
//!
//! Results are cached per sequence in [`SequenceMetrics`]. Re-running an
//! earlier stage drops the circuity computed from the previous values.

use futures::stream::{self, StreamExt, TryStreamExt};
use geo::Polygon;
use serde::Serialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::distance::{DistanceMode, DistanceService, Leg};
use crate::distance_matrix::DistanceMatrix;
use crate::domain::{Location, PackageStatus, Route, SequenceKind, Stop};
use crate::error::{AnalyzerError, MetricsError, ValidationError};
use crate::geometry::{cap_area_km2, haversine, minimum_rotated_rectangle};

/// Ordered leg values of a cyclic sequence with summary statistics.
///
/// ```
/// use last_mile_analyzer::metrics::LegSeries;
///
/// let series = LegSeries::new(vec![5.0, 15.0, 25.0]);
/// assert_eq!(series.total(), 45.0);
/// assert_eq!(series.mean(), 15.0);
/// assert_eq!(series.max(), 25.0);
/// assert_eq!(series.min(), 5.0);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct LegSeries {
    pub legs: Vec<f64>,
}

impl LegSeries {
    pub fn new(legs: Vec<f64>) -> Self {
        Self { legs }
    }

    pub fn len(&self) -> usize {
        self.legs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.legs.iter().sum()
    }

    /// Mean leg value, 0 for an empty series.
    pub fn mean(&self) -> f64 {
        if self.legs.is_empty() {
            0.0
        } else {
            self.total() / self.legs.len() as f64
        }
    }

    /// Longest leg, 0 for an empty series.
    pub fn max(&self) -> f64 {
        self.legs.iter().copied().reduce(f64::max).unwrap_or(0.0)
    }

    /// Shortest leg, 0 for an empty series.
    pub fn min(&self) -> f64 {
        self.legs.iter().copied().reduce(f64::min).unwrap_or(0.0)
    }
}

/// Driving legs: distances in km and durations in minutes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct DrivingLegs {
    pub distances: LegSeries,
    pub durations: LegSeries,
}

impl DrivingLegs {
    fn from_legs(legs: impl IntoIterator<Item = Leg>) -> Self {
        let (distances, durations): (Vec<f64>, Vec<f64>) = legs
            .into_iter()
            .map(|leg| (leg.distance_km, leg.duration_min))
            .unzip();
        Self {
            distances: LegSeries::new(distances),
            durations: LegSeries::new(durations),
        }
    }
}

/// Circuity of a sequence.
///
/// `aggregate` is total driving distance over total euclidean distance.
/// The plain mean of the per-leg ratios is a different quantity and is only
/// available through [`Circuity::mean_leg_circuity`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct Circuity {
    pub per_leg: Vec<f64>,
    pub aggregate: f64,
}

impl Circuity {
    /// Computes circuity from matching euclidean and driving distance legs.
    ///
    /// ```
    /// use last_mile_analyzer::metrics::{Circuity, LegSeries};
    ///
    /// let euclidean = LegSeries::new(vec![5.0, 5.0]);
    /// let driving = LegSeries::new(vec![10.0, 10.0]);
    /// let circuity = Circuity::from_series(&euclidean, &driving);
    /// assert_eq!(circuity.per_leg, vec![2.0, 2.0]);
    /// assert_eq!(circuity.aggregate, 2.0);
    /// ```
    pub fn from_series(euclidean: &LegSeries, driving: &LegSeries) -> Self {
        let per_leg = euclidean
            .legs
            .iter()
            .zip(&driving.legs)
            .map(|(&e, &d)| if e == 0.0 { 1.0 } else { d / e })
            .collect();

        let total_euclidean = euclidean.total();
        let aggregate = if total_euclidean == 0.0 {
            warn!("Total euclidean distance is 0, circuity factor set to 1");
            1.0
        } else {
            driving.total() / total_euclidean
        };

        Self { per_leg, aggregate }
    }

    /// Mean of the per-leg ratios, 0 when there are no legs.
    pub fn mean_leg_circuity(&self) -> f64 {
        mean(&self.per_leg)
    }
}

/// Cached stage results of one sequence.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SequenceMetrics {
    pub euclidean: Option<LegSeries>,
    pub driving: Option<DrivingLegs>,
    pub circuity: Option<Circuity>,
}

/// Where driving distances come from.
#[derive(Clone, Copy)]
pub enum DrivingSource<'a> {
    /// Precomputed distance to the next stop, looked up by route and stop name.
    Matrix(&'a DistanceMatrix),
    /// One request per transition through the dispatcher.
    Service {
        service: &'a DistanceService,
        mode: DistanceMode,
    },
}

/// Package status breakdown over the delivery stops of a route.
#[derive(Clone, Debug, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteStatus {
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
}

impl RouteStatus {
    /// Builds the breakdown from raw counts, guarding every division.
    pub(crate) fn from_counts(
        route: &str,
        delivery_stops: usize,
        non_delivery_stops: usize,
        counts: [usize; 4],
    ) -> Self {
        let [to_be_delivered, rejected, attempted, delivered] = counts;
        let packages: usize = counts.iter().sum();

        if packages == 0 {
            warn!(route = %route, "Route has no packages, status percentages set to 0");
        }
        let percentage = |n: usize| {
            if packages == 0 {
                0.0
            } else {
                n as f64 / packages as f64 * 100.0
            }
        };
        let average_packages_per_stop = if delivery_stops == 0 {
            warn!(route = %route, "Route has no delivery stops, average packages per stop set to 0");
            0.0
        } else {
            packages as f64 / delivery_stops as f64
        };

        Self {
            number_of_delivery_stops: delivery_stops,
            number_of_non_delivery_stops: non_delivery_stops,
            number_of_packages: packages,
            number_of_delivered_packages: delivered,
            number_of_rejected_packages: rejected,
            number_of_attempted_packages: attempted,
            number_of_to_be_delivered_packages: to_be_delivered,
            percentage_delivered: percentage(delivered),
            percentage_rejected: percentage(rejected),
            percentage_attempted: percentage(attempted),
            percentage_to_be_delivered: percentage(to_be_delivered),
            average_packages_per_stop,
        }
    }
}

/// Axis-aligned extent of a sequence.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SequenceBounds {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
    pub area_km2: f64,
}

/// Centre and spread of the delivery stops of a sequence.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Centroid {
    pub lat_mean: f64,
    pub lat_std: f64,
    pub lon_mean: f64,
    pub lon_std: f64,
    /// Mean haversine distance from the stops to the centroid, km.
    pub dispersion_mean_km: f64,
    /// Population standard deviation of those distances, km.
    pub dispersion_std_km: f64,
}

impl Centroid {
    pub fn location(&self) -> Location {
        Location::new(self.lat_mean, self.lon_mean)
    }
}

// ============================================================================
// Route stages
// ============================================================================

impl Route {
    /// Computes the cyclic haversine legs of a sequence (last stop back to
    /// the first) and caches them.
    pub fn evaluate_euclidean_distances(&mut self, kind: SequenceKind) -> &LegSeries {
        let locations = self.sequence_locations(kind);
        if locations.is_empty() {
            warn!(route = %self.name, sequence = %kind, "Sequence is empty, no euclidean legs");
        }

        let legs = cyclic_pairs(&locations)
            .map(|(a, b)| haversine(a.lat, a.lon, b.lat, b.lon))
            .collect();

        let metrics = self.metrics_mut(kind);
        metrics.circuity = None;
        metrics.euclidean.insert(LegSeries::new(legs))
    }

    /// Computes and caches the driving legs of a sequence.
    ///
    /// With a [`DrivingSource::Service`] the transitions are requested
    /// concurrently, at most `max_concurrent_requests` at a time, and kept
    /// in transition order. The first failure aborts the stage.
    pub async fn evaluate_driving_distances(
        &mut self,
        kind: SequenceKind,
        source: DrivingSource<'_>,
    ) -> Result<&DrivingLegs, AnalyzerError> {
        if self.sequence(kind).is_empty() {
            return Err(ValidationError::EmptySequence {
                route: self.name.clone(),
                kind: kind.as_str(),
            }
            .into());
        }

        let legs = match source {
            DrivingSource::Matrix(matrix) => self.legs_from_matrix(kind, matrix)?,
            DrivingSource::Service { service, mode } => {
                let transitions: Vec<(Location, Location)> =
                    cyclic_pairs(&self.sequence_locations(kind)).collect();
                debug!(
                    route = %self.name,
                    sequence = %kind,
                    %mode,
                    transitions = transitions.len(),
                    "Requesting driving distances"
                );
                stream::iter(transitions)
                    .map(|(origin, destination)| service.get_distance(origin, destination, mode))
                    .buffered(service.max_concurrent_requests())
                    .try_collect::<Vec<Leg>>()
                    .await?
            }
        };

        let driving = DrivingLegs::from_legs(legs);
        info!(
            route = %self.name,
            sequence = %kind,
            total_km = driving.distances.total(),
            "Driving distances evaluated"
        );

        let metrics = self.metrics_mut(kind);
        metrics.circuity = None;
        Ok(metrics.driving.insert(driving))
    }

    fn legs_from_matrix(
        &self,
        kind: SequenceKind,
        matrix: &DistanceMatrix,
    ) -> Result<Vec<Leg>, MetricsError> {
        self.sequence_stops(kind)
            .map(|stop| {
                matrix
                    .leg(&self.name, &stop.name)
                    .ok_or_else(|| MetricsError::MissingDistance {
                        route: self.name.clone(),
                        stop: stop.name.clone(),
                    })
            })
            .collect()
    }

    /// Computes and caches the circuity of a sequence. Both distance stages
    /// must have been evaluated.
    pub fn evaluate_circuity_factor(&mut self, kind: SequenceKind) -> Result<&Circuity, MetricsError> {
        let not_evaluated = |stage| MetricsError::StageNotEvaluated {
            route: self.name.clone(),
            kind: kind.as_str(),
            stage,
        };
        let metrics = self.metrics(kind);
        let euclidean = metrics.euclidean.as_ref().ok_or_else(|| not_evaluated("euclidean"))?;
        let driving = metrics.driving.as_ref().ok_or_else(|| not_evaluated("driving"))?;

        let circuity = Circuity::from_series(euclidean, &driving.distances);
        debug!(route = %self.name, sequence = %kind, aggregate = circuity.aggregate, "Circuity evaluated");

        Ok(self.metrics_mut(kind).circuity.insert(circuity))
    }

    pub fn euclidean_distances(&self, kind: SequenceKind) -> Option<&LegSeries> {
        self.metrics(kind).euclidean.as_ref()
    }

    pub fn driving_distances(&self, kind: SequenceKind) -> Option<&DrivingLegs> {
        self.metrics(kind).driving.as_ref()
    }

    pub fn circuity(&self, kind: SequenceKind) -> Option<&Circuity> {
        self.metrics(kind).circuity.as_ref()
    }

    /// Package status breakdown. Counts only packages of delivery stops.
    pub fn evaluate_status(&self) -> RouteStatus {
        let delivery_stops: Vec<&Stop> = self.delivery_stops().collect();
        let counts = PackageStatus::ALL.map(|status| {
            delivery_stops.iter().map(|stop| stop.count(status)).sum::<usize>()
        });

        RouteStatus::from_counts(
            &self.name,
            delivery_stops.len(),
            self.stops().len() - delivery_stops.len(),
            counts,
        )
    }

    /// Lat/lon extent of a sequence, `None` when it is empty.
    pub fn bounding_box(&self, kind: SequenceKind) -> Option<SequenceBounds> {
        let locations = self.sequence_locations(kind);
        let first = locations.first()?;

        let (mut lat_min, mut lat_max, mut lon_min, mut lon_max) = (first.lat, first.lat, first.lon, first.lon);
        for l in &locations[1..] {
            lat_min = lat_min.min(l.lat);
            lat_max = lat_max.max(l.lat);
            lon_min = lon_min.min(l.lon);
            lon_max = lon_max.max(l.lon);
        }

        Some(SequenceBounds {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
            area_km2: cap_area_km2(lat_min, lat_max, lon_min, lon_max),
        })
    }

    /// Centroid of the delivery stops of a sequence, `None` without any.
    pub fn centroid(&self, kind: SequenceKind) -> Option<Centroid> {
        let locations: Vec<Location> = self
            .sequence_stops(kind)
            .filter(|s| s.is_delivery())
            .map(|s| s.location)
            .collect();
        if locations.is_empty() {
            return None;
        }

        let lats: Vec<f64> = locations.iter().map(|l| l.lat).collect();
        let lons: Vec<f64> = locations.iter().map(|l| l.lon).collect();
        let center = Location::new(mean(&lats), mean(&lons));
        let distances: Vec<f64> = locations.iter().map(|l| l.distance_km(&center)).collect();

        Some(Centroid {
            lat_mean: center.lat,
            lat_std: std_dev(&lats),
            lon_mean: center.lon,
            lon_std: std_dev(&lons),
            dispersion_mean_km: mean(&distances),
            dispersion_std_km: std_dev(&distances),
        })
    }

    /// Minimum rotated rectangle around the stops of a sequence.
    pub fn minimum_rotated_rectangle(&self, kind: SequenceKind) -> Option<Polygon<f64>> {
        minimum_rotated_rectangle(&self.sequence_locations(kind))
    }
}

/// Consecutive pairs of a cycle, closing with (last, first).
fn cyclic_pairs(locations: &[Location]) -> impl Iterator<Item = (Location, Location)> + '_ {
    let n = locations.len();
    (0..n).map(move |i| (locations[i], locations[(i + 1) % n]))
}

/// Arithmetic mean, 0 for an empty slice.
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Population standard deviation, 0 for an empty slice.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance_matrix::DistanceRecord;
    use crate::domain::{LocationType, Package, StopId};
    use chrono::{DateTime, TimeZone, Utc};

    fn t() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 7, 27, 16, 0, 0).unwrap()
    }

    fn stop(name: &str, lat: f64, lon: f64, location_type: LocationType, statuses: &[PackageStatus]) -> Stop {
        let packages = statuses
            .iter()
            .enumerate()
            .map(|(i, &s)| Package::new(format!("{name}_{i}"), (1.0, 1.0, 1.0), s, 1.0, 1.0).unwrap());
        Stop::new(name, Location::new(lat, lon), location_type, (t(), t()), packages).unwrap()
    }

    fn square_route() -> Route {
        let stops = vec![
            stop("D", 0.0, 0.0, LocationType::Depot, &[]),
            stop("A", 0.0, 0.01, LocationType::Delivery, &[PackageStatus::Delivered]),
            stop("B", 0.01, 0.01, LocationType::Delivery, &[PackageStatus::Delivered, PackageStatus::Rejected]),
            stop("C", 0.01, 0.0, LocationType::Delivery, &[PackageStatus::Attempted]),
        ];
        let mut route = Route::new("RouteID_1", stops, t());
        route.set_sequence(SequenceKind::Actual, vec!["D", "A", "B", "C"]).unwrap();
        route
    }

    fn matrix_for(route: &Route, kind: SequenceKind, km: f64) -> DistanceMatrix {
        let records = route
            .sequence_stops(kind)
            .map(|s| DistanceRecord {
                route: route.name.clone(),
                stop: s.name.clone(),
                lat: s.location.lat,
                lon: s.location.lon,
                distance_km: Some(km),
                duration_min: Some(2.0),
            })
            .collect();
        DistanceMatrix::new(records)
    }

    #[test]
    fn test_leg_series_empty() {
        let series = LegSeries::default();
        assert_eq!(series.total(), 0.0);
        assert_eq!(series.mean(), 0.0);
        assert_eq!(series.max(), 0.0);
        assert_eq!(series.min(), 0.0);
    }

    #[test]
    fn test_circuity_from_series() {
        let circuity = Circuity::from_series(&LegSeries::new(vec![5.0, 5.0]), &LegSeries::new(vec![10.0, 10.0]));
        assert_eq!(circuity.per_leg, vec![2.0, 2.0]);
        assert_eq!(circuity.aggregate, 2.0);
        assert_eq!(circuity.mean_leg_circuity(), 2.0);
    }

    #[test]
    fn test_circuity_aggregate_differs_from_leg_mean() {
        let circuity = Circuity::from_series(&LegSeries::new(vec![1.0, 3.0]), &LegSeries::new(vec![2.0, 3.0]));
        assert_eq!(circuity.per_leg, vec![2.0, 1.0]);
        assert_eq!(circuity.aggregate, 1.25);
        assert_eq!(circuity.mean_leg_circuity(), 1.5);
    }

    #[test]
    fn test_circuity_degenerate_euclidean() {
        let circuity = Circuity::from_series(&LegSeries::new(vec![0.0, 0.0]), &LegSeries::new(vec![0.4, 0.0]));
        assert_eq!(circuity.per_leg, vec![1.0, 1.0]);
        assert_eq!(circuity.aggregate, 1.0);
    }

    #[test]
    fn test_euclidean_legs_are_cyclic() {
        let mut route = square_route();
        let legs = route.evaluate_euclidean_distances(SequenceKind::Actual).clone();
        assert_eq!(legs.len(), 4);
        // Closing leg C -> D equals the first leg D -> A on this square
        assert!((legs.legs[3] - legs.legs[0]).abs() < 1e-9);
        assert!((legs.legs[0] - haversine(0.0, 0.0, 0.0, 0.01)).abs() < 1e-12);
    }

    #[test]
    fn test_euclidean_empty_sequence() {
        let mut route = square_route();
        assert!(route.evaluate_euclidean_distances(SequenceKind::Planned).is_empty());
    }

    #[test]
    fn test_circuity_requires_both_stages() {
        let mut route = square_route();
        let err = route.evaluate_circuity_factor(SequenceKind::Actual).unwrap_err();
        assert!(matches!(err, MetricsError::StageNotEvaluated { stage: "euclidean", .. }));

        route.evaluate_euclidean_distances(SequenceKind::Actual);
        let err = route.evaluate_circuity_factor(SequenceKind::Actual).unwrap_err();
        assert!(matches!(err, MetricsError::StageNotEvaluated { stage: "driving", .. }));
    }

    #[tokio::test]
    async fn test_pipeline_with_matrix() {
        let mut route = square_route();
        let matrix = matrix_for(&route, SequenceKind::Actual, 2.0);

        route.evaluate_euclidean_distances(SequenceKind::Actual);
        let driving = route
            .evaluate_driving_distances(SequenceKind::Actual, DrivingSource::Matrix(&matrix))
            .await
            .unwrap();
        assert_eq!(driving.distances.legs, vec![2.0; 4]);
        assert_eq!(driving.durations.total(), 8.0);

        let circuity = route.evaluate_circuity_factor(SequenceKind::Actual).unwrap().clone();
        let euclidean_total = route.euclidean_distances(SequenceKind::Actual).unwrap().total();
        assert!((circuity.aggregate - 8.0 / euclidean_total).abs() < 1e-9);
        assert_eq!(circuity.per_leg.len(), 4);
    }

    #[tokio::test]
    async fn test_pipeline_with_haversine_service() {
        let mut route = square_route();
        let service = DistanceService::default();

        route.evaluate_euclidean_distances(SequenceKind::Actual);
        route
            .evaluate_driving_distances(
                SequenceKind::Actual,
                DrivingSource::Service {
                    service: &service,
                    mode: DistanceMode::Haversine,
                },
            )
            .await
            .unwrap();
        let circuity = route.evaluate_circuity_factor(SequenceKind::Actual).unwrap();
        assert!((circuity.aggregate - 1.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_driving_distances_empty_sequence_fails() {
        let mut route = square_route();
        let matrix = DistanceMatrix::default();
        let err = route
            .evaluate_driving_distances(SequenceKind::Planned, DrivingSource::Matrix(&matrix))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyzerError::Validation(ValidationError::EmptySequence { .. })));
    }

    #[tokio::test]
    async fn test_driving_distances_missing_matrix_entry() {
        let mut route = square_route();
        let mut records = matrix_for(&route, SequenceKind::Actual, 1.0).into_records();
        records[2].distance_km = None;
        let matrix = DistanceMatrix::new(records);
        let err = route
            .evaluate_driving_distances(SequenceKind::Actual, DrivingSource::Matrix(&matrix))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AnalyzerError::Metrics(MetricsError::MissingDistance { ref stop, .. }) if stop == "B"
        ));
    }

    #[tokio::test]
    async fn test_sequence_assignment_clears_cached_metrics() {
        let mut route = square_route();
        let matrix = matrix_for(&route, SequenceKind::Actual, 1.0);
        route.evaluate_euclidean_distances(SequenceKind::Actual);
        route
            .evaluate_driving_distances(SequenceKind::Actual, DrivingSource::Matrix(&matrix))
            .await
            .unwrap();
        route.evaluate_circuity_factor(SequenceKind::Actual).unwrap();

        route.set_sequence(SequenceKind::Actual, vec!["A", "B"]).unwrap();
        assert!(route.euclidean_distances(SequenceKind::Actual).is_none());
        assert!(route.driving_distances(SequenceKind::Actual).is_none());
        assert!(route.circuity(SequenceKind::Actual).is_none());
    }

    #[test]
    fn test_stop_mutation_clears_cached_metrics() {
        let mut route = square_route();
        route.evaluate_euclidean_distances(SequenceKind::Actual);
        if let Some(stop) = route.stop_mut(StopId(1)) {
            stop.location = Location::new(1.0, 1.0);
        }
        assert!(route.euclidean_distances(SequenceKind::Actual).is_none());
    }

    #[test]
    fn test_evaluate_status_counts_delivery_stops_only() {
        let mut stops = square_route().stops().to_vec();
        stops[0] = stop("D", 0.0, 0.0, LocationType::Depot, &[PackageStatus::Delivered; 3]);
        let route = Route::new("r", stops, t());

        let status = route.evaluate_status();
        assert_eq!(status.number_of_delivery_stops, 3);
        assert_eq!(status.number_of_non_delivery_stops, 1);
        assert_eq!(status.number_of_packages, 4);
        assert_eq!(status.number_of_delivered_packages, 2);
        assert_eq!(status.percentage_delivered, 50.0);
        assert_eq!(status.percentage_rejected, 25.0);
        assert_eq!(status.percentage_to_be_delivered, 0.0);
        assert!((status.average_packages_per_stop - 4.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_evaluate_status_without_packages() {
        let route = Route::new("empty", vec![stop("A", 0.0, 0.0, LocationType::Delivery, &[])], t());
        let status = route.evaluate_status();
        assert_eq!(status.number_of_packages, 0);
        assert_eq!(status.percentage_delivered, 0.0);
        assert_eq!(status.average_packages_per_stop, 0.0);
    }

    #[test]
    fn test_bounding_box_and_centroid() {
        let route = square_route();
        let bounds = route.bounding_box(SequenceKind::Actual).unwrap();
        assert_eq!((bounds.lat_min, bounds.lat_max), (0.0, 0.01));
        assert_eq!((bounds.lon_min, bounds.lon_max), (0.0, 0.01));
        assert!((bounds.area_km2 - cap_area_km2(0.0, 0.01, 0.0, 0.01)).abs() < 1e-12);
        assert!(route.bounding_box(SequenceKind::Planned).is_none());

        // Depot is excluded from the centroid
        let centroid = route.centroid(SequenceKind::Actual).unwrap();
        assert!((centroid.lat_mean - 0.02 / 3.0).abs() < 1e-12);
        assert!((centroid.lon_mean - 0.02 / 3.0).abs() < 1e-12);
        assert!(centroid.dispersion_mean_km > 0.0);
    }

    #[test]
    fn test_std_dev_population() {
        assert_eq!(std_dev(&[5.0, 15.0, 25.0]), (200.0f64 / 3.0).sqrt());
        assert_eq!(std_dev(&[]), 0.0);
    }
}
