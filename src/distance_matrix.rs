//! Persisted next-stop distance table.
//!
//! One row per stop of a route sequence, in visiting order:
//!
//! ```text
//! route,stop,lat,lon,distance_to_next_stop(km),duration(min)
//! RouteID_1,AB,30.26,-97.74,1.215,3.0
//! RouteID_1,CD,30.27,-97.75,-,-
//! ```
//!
//! A `-` marks a leg not computed yet. The last row of a route holds the leg
//! back to the route's first row.

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::Path;
use tracing::{debug, info};

use crate::distance::{DistanceMode, DistanceService, Leg};
use crate::domain::{Location, Route, SequenceKind};
use crate::error::RoutingError;
use crate::metrics::{mean, std_dev};

/// One row of the distance table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistanceRecord {
    pub route: String,
    pub stop: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(rename = "distance_to_next_stop(km)", with = "dash")]
    pub distance_km: Option<f64>,
    #[serde(rename = "duration(min)", with = "dash")]
    pub duration_min: Option<f64>,
}

impl DistanceRecord {
    pub fn location(&self) -> Location {
        Location::new(self.lat, self.lon)
    }
}

/// `-` in the file, `None` in memory.
mod dash {
    use serde::{Deserialize, Deserializer, Serializer};

    const MISSING: &str = "-";

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_f64(*v),
            None => serializer.serialize_str(MISSING),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let raw = raw.trim();
        if raw.is_empty() || raw == MISSING {
            return Ok(None);
        }
        raw.parse::<f64>().map(Some).map_err(serde::de::Error::custom)
    }
}

/// Summary statistics over the stored distances.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MatrixStatistics {
    pub count: usize,
    pub max: f64,
    pub min: f64,
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
}

/// Next-stop distances for many routes, looked up by route and stop name.
#[derive(Clone, Debug, Default)]
pub struct DistanceMatrix {
    records: Vec<DistanceRecord>,
    index: HashMap<String, HashMap<String, usize>>,
}

impl DistanceMatrix {
    /// Builds a matrix from rows. When a route lists a stop twice the later
    /// row answers lookups.
    pub fn new(records: Vec<DistanceRecord>) -> Self {
        let mut index: HashMap<String, HashMap<String, usize>> = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            index
                .entry(record.route.clone())
                .or_default()
                .insert(record.stop.clone(), i);
        }
        Self { records, index }
    }

    /// Skeleton with one empty row per stop of each route's sequence.
    pub fn from_routes<'a>(routes: impl IntoIterator<Item = &'a Route>, kind: SequenceKind) -> Self {
        let records = routes
            .into_iter()
            .flat_map(|route| {
                route.sequence_stops(kind).map(move |stop| DistanceRecord {
                    route: route.name.clone(),
                    stop: stop.name.clone(),
                    lat: stop.location.lat,
                    lon: stop.location.lon,
                    distance_km: None,
                    duration_min: None,
                })
            })
            .collect();
        Self::new(records)
    }

    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self, csv::Error> {
        let path = path.as_ref();
        let matrix = Self::from_reader(std::fs::File::open(path)?)?;
        info!(path = %path.display(), rows = matrix.len(), "Distance matrix loaded");
        Ok(matrix)
    }

    pub fn from_reader<R: io::Read>(reader: R) -> Result<Self, csv::Error> {
        let records = csv::Reader::from_reader(reader)
            .deserialize()
            .collect::<Result<Vec<DistanceRecord>, _>>()?;
        Ok(Self::new(records))
    }

    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<(), csv::Error> {
        let path = path.as_ref();
        self.to_writer(std::fs::File::create(path)?)?;
        info!(path = %path.display(), rows = self.len(), "Distance matrix saved");
        Ok(())
    }

    pub fn to_writer<W: io::Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut writer = csv::Writer::from_writer(writer);
        for record in &self.records {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn records(&self) -> &[DistanceRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<DistanceRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of rows still marked `-`.
    pub fn missing(&self) -> usize {
        self.records.iter().filter(|r| r.distance_km.is_none()).count()
    }

    fn record(&self, route: &str, stop: &str) -> Option<&DistanceRecord> {
        let i = *self.index.get(route)?.get(stop)?;
        self.records.get(i)
    }

    /// Distance in km from a stop to the next one of its route.
    pub fn distance(&self, route: &str, stop: &str) -> Option<f64> {
        self.record(route, stop)?.distance_km
    }

    /// Leg from a stop to the next one. A missing duration reads as 0.
    pub fn leg(&self, route: &str, stop: &str) -> Option<Leg> {
        let record = self.record(route, stop)?;
        Some(Leg::new(record.distance_km?, record.duration_min.unwrap_or(0.0)))
    }

    /// Max, min, mean and population standard deviation of the stored
    /// distances. `None` when nothing has been computed.
    ///
    /// ```
    /// use last_mile_analyzer::distance_matrix::{DistanceMatrix, DistanceRecord};
    ///
    /// let records = [5.0, 15.0, 25.0]
    ///     .iter()
    ///     .enumerate()
    ///     .map(|(i, &d)| DistanceRecord {
    ///         route: "R".into(),
    ///         stop: format!("S{i}"),
    ///         lat: 0.0,
    ///         lon: 0.0,
    ///         distance_km: Some(d),
    ///         duration_min: None,
    ///     })
    ///     .collect();
    /// let stats = DistanceMatrix::new(records).statistics().unwrap();
    /// assert_eq!((stats.max, stats.min, stats.mean), (25.0, 5.0, 15.0));
    /// assert!((stats.std - 8.1649658).abs() < 1e-6);
    /// ```
    pub fn statistics(&self) -> Option<MatrixStatistics> {
        let distances: Vec<f64> = self.records.iter().filter_map(|r| r.distance_km).collect();
        if distances.is_empty() {
            return None;
        }
        Some(MatrixStatistics {
            count: distances.len(),
            max: distances.iter().copied().fold(f64::MIN, f64::max),
            min: distances.iter().copied().fold(f64::MAX, f64::min),
            mean: mean(&distances),
            std: std_dev(&distances),
        })
    }

    /// Index of the row each row's leg ends at: the next row of the same
    /// route, or the route's first row for the last one.
    fn successors(&self) -> Vec<usize> {
        let n = self.records.len();
        let mut next = vec![0; n];
        let mut group_start = 0;
        for i in 0..n {
            if i > 0 && self.records[i].route != self.records[i - 1].route {
                group_start = i;
            }
            let last_of_group = i + 1 == n || self.records[i + 1].route != self.records[i].route;
            next[i] = if last_of_group { group_start } else { i + 1 };
        }
        next
    }

    /// Computes every leg still marked `-`.
    ///
    /// Distances are rounded to 3 decimals and durations to whole minutes.
    /// Rows already filled are skipped. `on_progress(done, total)` runs after
    /// each stored leg. On the first failure the legs stored so far stay in
    /// the matrix and the error is returned, so the caller can save the
    /// partial result.
    pub async fn fill_missing<F>(
        &mut self,
        service: &DistanceService,
        mode: DistanceMode,
        mut on_progress: F,
    ) -> Result<usize, RoutingError>
    where
        F: FnMut(usize, usize),
    {
        let successors = self.successors();
        let pending: Vec<(usize, Location, Location)> = self
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.distance_km.is_none())
            .map(|(i, r)| (i, r.location(), self.records[successors[i]].location()))
            .collect();

        let total = pending.len();
        info!(total, %mode, "Filling distance matrix");

        let mut legs = stream::iter(pending)
            .map(|(i, origin, destination)| async move {
                (i, service.get_distance(origin, destination, mode).await)
            })
            .buffered(service.max_concurrent_requests());

        let mut done = 0;
        while let Some((i, result)) = legs.next().await {
            let leg = result?;
            let record = &mut self.records[i];
            record.distance_km = Some(round_to(leg.distance_km, 3));
            record.duration_min = Some(leg.duration_min.round());
            done += 1;
            debug!(route = %record.route, stop = %record.stop, done, total, "Leg stored");
            on_progress(done, total);
        }

        Ok(done)
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
