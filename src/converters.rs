//! Converters between domain models and DTOs.

use crate::analysis::Analysis;
use crate::demo_data::Dataset;
use crate::domain::{Package, Route, SequenceKind, Stop, Vehicle};
use crate::dto::{
    AnalysisDto, DatasetDto, PackageDto, RouteDto, RouteReportDto, StopDto, VehicleDto,
};
use crate::error::ValidationError;
use crate::geometry::minimum_rotated_rectangle_area;
use crate::service::AnalysisJob;

impl PackageDto {
    pub fn from_package(package: &Package) -> Self {
        Self {
            name: package.name.clone(),
            depth: package.dimensions.depth,
            height: package.dimensions.height,
            width: package.dimensions.width,
            status: package.status(),
            weight: package.weight,
            price: package.price,
        }
    }

    pub fn to_domain(&self) -> Result<Package, ValidationError> {
        Package::new(
            self.name.clone(),
            (self.depth, self.height, self.width),
            self.status,
            self.weight,
            self.price,
        )
    }
}

impl StopDto {
    pub fn from_stop(stop: &Stop) -> Self {
        Self {
            name: stop.name.clone(),
            location: stop.location,
            location_type: stop.location_type,
            time_window_start: stop.time_window.start,
            time_window_end: stop.time_window.end,
            planned_service_time: stop.planned_service_time,
            packages: stop.packages.iter().map(PackageDto::from_package).collect(),
        }
    }

    pub fn to_domain(&self) -> Result<Stop, ValidationError> {
        let packages = self
            .packages
            .iter()
            .map(PackageDto::to_domain)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Stop::new(
            self.name.clone(),
            self.location,
            self.location_type,
            (self.time_window_start, self.time_window_end),
            packages,
        )?
        .with_planned_service_time(self.planned_service_time))
    }
}

impl RouteDto {
    pub fn from_route(route: &Route) -> Self {
        let names = |kind: SequenceKind| -> Vec<String> {
            route
                .sequence_names(kind)
                .into_iter()
                .map(str::to_string)
                .collect()
        };
        Self {
            name: route.name.clone(),
            departure_time: route.departure_time,
            vehicle: route.vehicle.as_ref().map(|v| VehicleDto {
                name: v.name.clone(),
                capacity: v.capacity,
            }),
            stops: route.stops().iter().map(StopDto::from_stop).collect(),
            planned_sequence: names(SequenceKind::Planned),
            actual_sequence: names(SequenceKind::Actual),
        }
    }

    /// Builds the route. Empty sequences are left unset; every named stop
    /// of a non-empty one must exist.
    pub fn to_domain(&self) -> Result<Route, ValidationError> {
        let stops = self
            .stops
            .iter()
            .map(StopDto::to_domain)
            .collect::<Result<Vec<_>, _>>()?;
        let mut route = Route::new(self.name.clone(), stops, self.departure_time);
        if let Some(v) = &self.vehicle {
            route = route.with_vehicle(Vehicle::new(v.name.clone(), v.capacity));
        }
        for (kind, sequence) in [
            (SequenceKind::Planned, &self.planned_sequence),
            (SequenceKind::Actual, &self.actual_sequence),
        ] {
            if !sequence.is_empty() {
                route.set_sequence(kind, sequence.clone())?;
            }
        }
        Ok(route)
    }
}

impl DatasetDto {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        Self {
            name: dataset.name.clone(),
            routes: dataset.routes.iter().map(RouteDto::from_route).collect(),
        }
    }

    pub fn to_analysis(&self) -> Result<Analysis, ValidationError> {
        let routes = self
            .routes
            .iter()
            .map(RouteDto::to_domain)
            .collect::<Result<Vec<_>, _>>()?;
        Analysis::new(self.name.clone(), routes)
    }
}

impl AnalysisDto {
    pub fn from_job(job: &AnalysisJob) -> Self {
        let analysis = &job.analysis;
        Self {
            id: job.id.clone(),
            name: analysis.name.clone(),
            status: job.status,
            distance_mode: job.distance_mode,
            sequence: job.sequence,
            error: job.error.clone(),
            created_at: job.created_at,
            finished_at: job.finished_at,
            status_summary: analysis.status_summary(),
            circuity: analysis.circuity_summary(job.sequence),
            time_period: analysis.time_period(),
            routes: analysis.summary_rows(job.sequence),
        }
    }
}

impl RouteReportDto {
    /// Evaluates the great-circle stage of a sequence and reports it with
    /// the route's static metrics.
    pub fn evaluate(route: &mut Route, kind: SequenceKind) -> Self {
        let euclidean = route.evaluate_euclidean_distances(kind).clone();
        Self {
            route: route.name.clone(),
            sequence: kind,
            stops: route
                .sequence_names(kind)
                .into_iter()
                .map(str::to_string)
                .collect(),
            total_km: euclidean.total(),
            euclidean,
            status: route.evaluate_status(),
            bounds: route.bounding_box(kind),
            centroid: route.centroid(kind),
            minimum_rotated_rectangle_area: minimum_rotated_rectangle_area(
                &route.sequence_locations(kind),
            ),
        }
    }
}
