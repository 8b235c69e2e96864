//! Street-graph routing over OpenStreetMap data.
//!
//! The drivable ways inside an extent are downloaded from the Overpass API
//! and turned into a directed petgraph graph whose nodes are [`Location`]s
//! and whose edge weights are lengths in meters. Shortest paths use
//! Dijkstra. Graphs are kept in memory per provider and written to a
//! snapshot file per extent, so a restart does not download them again.

use ordered_float::OrderedFloat;
use petgraph::algo::dijkstra;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::distance::{DrivingDistanceProvider, Leg};
use crate::domain::Location;
use crate::error::RoutingError;

/// Default Overpass API URL.
pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";

/// Default directory for street graph snapshots.
pub const DEFAULT_CACHE_DIR: &str = ".osm_cache";

/// Axes narrower than this (degrees) are padded before querying.
const MIN_SPAN_DEG: f64 = 0.01;

/// Padding applied to each side of a narrow axis (degrees).
const PAD_DEG: f64 = 0.005;

/// Server-side timeout of an Overpass query, seconds.
const OVERPASS_TIMEOUT_SECS: u32 = 120;

/// Highway classes of the drive network.
const DRIVABLE_HIGHWAYS: &[&str] = &[
    "motorway",
    "motorway_link",
    "trunk",
    "trunk_link",
    "primary",
    "primary_link",
    "secondary",
    "secondary_link",
    "tertiary",
    "tertiary_link",
    "residential",
    "unclassified",
    "living_street",
];

/// Snapshot layout version. Files with another version are downloaded again.
const SNAPSHOT_FORMAT: u32 = 3;

/// Query extent for street-graph downloads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

impl Extent {
    pub fn new(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }
    }

    /// Smallest extent containing both locations.
    pub fn spanning(a: Location, b: Location) -> Self {
        Self::new(a.lat.min(b.lat), a.lon.min(b.lon), a.lat.max(b.lat), a.lon.max(b.lon))
    }

    /// Pads each axis narrower than 0.01° by 0.005° on both sides.
    ///
    /// ```
    /// use last_mile_analyzer::domain::Location;
    /// use last_mile_analyzer::routing::Extent;
    ///
    /// let extent = Extent::spanning(Location::new(40.0, -75.0), Location::new(40.001, -75.5)).pad_degenerate();
    /// assert!((extent.min_lat - 39.995).abs() < 1e-9);
    /// assert!((extent.max_lat - 40.006).abs() < 1e-9);
    /// assert_eq!(extent.min_lon, -75.5);
    /// ```
    pub fn pad_degenerate(self) -> Self {
        let (min_lat, max_lat) = pad_axis(self.min_lat, self.max_lat);
        let (min_lon, max_lon) = pad_axis(self.min_lon, self.max_lon);
        Self::new(min_lat, min_lon, max_lat, max_lon)
    }

    /// Name of the extent in the memory cache and on disk. Coordinates are
    /// written in their shortest exact form, so distinct extents never share
    /// a key.
    fn cache_key(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            self.min_lat, self.min_lon, self.max_lat, self.max_lon
        )
    }

    /// Overpass QL selecting the drive network inside the extent, with the
    /// nodes of every way.
    fn overpass_query(&self) -> String {
        format!(
            "[out:json][timeout:{}];way[\"highway\"~\"^({})$\"]({},{},{},{});(._;>;);out body;",
            OVERPASS_TIMEOUT_SECS,
            DRIVABLE_HIGHWAYS.join("|"),
            self.min_lat,
            self.min_lon,
            self.max_lat,
            self.max_lon
        )
    }
}

fn pad_axis(min: f64, max: f64) -> (f64, f64) {
    if (max - min).abs() < MIN_SPAN_DEG {
        (min - PAD_DEG, max + PAD_DEG)
    } else {
        (min, max)
    }
}

/// Directed drive network. Edge weights are lengths in meters.
#[derive(Debug, Default)]
pub struct RoadNetwork {
    graph: DiGraph<Location, f64>,
}

impl RoadNetwork {
    /// Creates an empty network.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the network from an Overpass JSON document.
    ///
    /// Ways tagged `oneway=yes` (or part of a roundabout) get forward edges
    /// only, `oneway=-1` backward edges only, and every other way both.
    pub fn from_overpass_json(body: &str) -> Result<Self, RoutingError> {
        let document: OverpassDocument =
            serde_json::from_str(body).map_err(|e| RoutingError::Parse(e.to_string()))?;
        Ok(Self::from_elements(document.elements))
    }

    fn from_elements(elements: Vec<OverpassElement>) -> Self {
        let mut coordinates: HashMap<i64, Location> = HashMap::new();
        let mut ways: Vec<(Vec<i64>, Direction)> = Vec::new();
        for element in elements {
            match element {
                OverpassElement::Node { id, lat, lon } => {
                    coordinates.insert(id, Location::new(lat, lon));
                }
                OverpassElement::Way { nodes, tags } => ways.push((nodes, Direction::from_tags(&tags))),
                OverpassElement::Other => {}
            }
        }

        let mut network = Self::new();
        let mut indices: HashMap<i64, NodeIndex> = HashMap::new();
        for (nodes, direction) in &ways {
            for pair in nodes.windows(2) {
                let (Some(&a), Some(&b)) = (coordinates.get(&pair[0]), coordinates.get(&pair[1])) else {
                    continue;
                };
                let from = *indices.entry(pair[0]).or_insert_with(|| network.graph.add_node(a));
                let to = *indices.entry(pair[1]).or_insert_with(|| network.graph.add_node(b));
                let length_m = a.distance_km(&b) * 1000.0;

                if direction.forward() {
                    network.graph.add_edge(from, to, length_m);
                }
                if direction.backward() {
                    network.graph.add_edge(to, from, length_m);
                }
            }
        }

        debug!(
            ways = ways.len(),
            nodes = network.node_count(),
            edges = network.edge_count(),
            "Street graph built"
        );
        network
    }

    /// Graph node nearest to a location.
    pub fn snap_to_road(&self, location: Location) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .min_by_key(|&idx| OrderedFloat(location.distance_km(&self.graph[idx])))
    }

    /// Length in km of the shortest path between the nodes nearest to the
    /// two locations. `None` when the graph is empty or the nodes are not
    /// connected.
    pub fn shortest_path_km(&self, from: Location, to: Location) -> Option<f64> {
        let start = self.snap_to_road(from)?;
        let end = self.snap_to_road(to)?;
        if start == end {
            return Some(0.0);
        }

        let costs = dijkstra(&self.graph, start, Some(end), |e| OrderedFloat(*e.weight()));
        costs.get(&end).map(|cost| cost.0 / 1000.0)
    }

    /// Compass bearing in degrees [0, 360) of every edge.
    pub fn edge_bearings(&self) -> Vec<f64> {
        self.graph
            .edge_indices()
            .filter_map(|idx| self.graph.edge_endpoints(idx))
            .map(|(from, to)| {
                let (a, b) = (self.graph[from], self.graph[to]);
                bearing(a.lat, a.lon, b.lat, b.lon)
            })
            .collect()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Reads a snapshot. `Ok(None)` when the file does not exist.
    async fn read_snapshot(path: &Path) -> Result<Option<Self>, RoutingError> {
        let data = match tokio::fs::read_to_string(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let snapshot: GraphSnapshot =
            serde_json::from_str(&data).map_err(|e| RoutingError::Parse(e.to_string()))?;
        if snapshot.format != SNAPSHOT_FORMAT {
            return Err(RoutingError::Parse(format!(
                "snapshot format {} (expected {})",
                snapshot.format, SNAPSHOT_FORMAT
            )));
        }
        Self::from_snapshot(snapshot).map(Some)
    }

    fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self, RoutingError> {
        let mut network = Self::new();
        for [lat, lon] in snapshot.nodes {
            network.graph.add_node(Location::new(lat, lon));
        }
        let n = network.graph.node_count();
        for (from, to, length_m) in snapshot.edges {
            if from >= n || to >= n {
                return Err(RoutingError::Parse(format!(
                    "snapshot edge {from} -> {to} refers to a missing node"
                )));
            }
            network.graph.add_edge(NodeIndex::new(from), NodeIndex::new(to), length_m);
        }
        Ok(network)
    }

    async fn write_snapshot(&self, path: &Path) -> Result<(), RoutingError> {
        let snapshot = GraphSnapshot {
            format: SNAPSHOT_FORMAT,
            nodes: self.graph.node_weights().map(|l| [l.lat, l.lon]).collect(),
            edges: self
                .graph
                .edge_indices()
                .filter_map(|idx| {
                    let (from, to) = self.graph.edge_endpoints(idx)?;
                    Some((from.index(), to.index(), self.graph[idx]))
                })
                .collect(),
        };
        let data = serde_json::to_string(&snapshot).map_err(|e| RoutingError::Parse(e.to_string()))?;
        tokio::fs::write(path, data).await?;
        Ok(())
    }
}

/// Travel directions allowed on a way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Both,
    Forward,
    Backward,
}

impl Direction {
    fn from_tags(tags: &HashMap<String, String>) -> Self {
        match tags.get("oneway").map(String::as_str) {
            Some("yes" | "true" | "1") => Direction::Forward,
            Some("-1" | "reverse") => Direction::Backward,
            Some(_) => Direction::Both,
            None if tags.get("junction").is_some_and(|j| j == "roundabout") => Direction::Forward,
            None => Direction::Both,
        }
    }

    fn forward(self) -> bool {
        self != Direction::Backward
    }

    fn backward(self) -> bool {
        self != Direction::Forward
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Driving distances over the street graph of the extent spanning each leg.
///
/// Clones share one in-memory graph cache.
#[derive(Clone, Debug)]
pub struct RoadGraphProvider {
    client: reqwest::Client,
    overpass_url: String,
    cache_dir: PathBuf,
    networks: Arc<Mutex<HashMap<String, Arc<OnceCell<Arc<RoadNetwork>>>>>>,
}

impl RoadGraphProvider {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            overpass_url: DEFAULT_OVERPASS_URL.to_string(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            networks: Arc::default(),
        }
    }

    pub fn with_overpass_url(mut self, url: impl Into<String>) -> Self {
        self.overpass_url = url.into();
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Street graph of an extent: from memory, else from its snapshot file,
    /// else downloaded and written to a snapshot.
    ///
    /// Concurrent requests for an uncached extent wait for the first
    /// download instead of repeating it. Other extents are not held up.
    /// A failed load leaves the extent uncached.
    pub async fn network(&self, extent: &Extent) -> Result<Arc<RoadNetwork>, RoutingError> {
        let key = extent.cache_key();
        let cell = Arc::clone(self.networks.lock().entry(key.clone()).or_default());

        let network = cell
            .get_or_try_init(|| async {
                let path = self.cache_dir.join(format!("{key}.json"));
                let network = match RoadNetwork::read_snapshot(&path).await {
                    Ok(Some(network)) => {
                        info!(path = %path.display(), nodes = network.node_count(), "Street graph loaded from snapshot");
                        network
                    }
                    Ok(None) => self.download(extent, &path).await?,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Discarding unreadable street graph snapshot");
                        let _ = tokio::fs::remove_file(&path).await;
                        self.download(extent, &path).await?
                    }
                };
                Ok::<_, RoutingError>(Arc::new(network))
            })
            .await?;
        Ok(Arc::clone(network))
    }

    async fn download(&self, extent: &Extent, snapshot: &Path) -> Result<RoadNetwork, RoutingError> {
        info!(url = %self.overpass_url, ?extent, "Downloading street graph");
        let response = self
            .client
            .post(&self.overpass_url)
            .header("Content-Type", "text/plain")
            .body(extent.overpass_query())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RoutingError::Http {
                url: self.overpass_url.clone(),
                status: status.as_u16(),
            });
        }

        let network = RoadNetwork::from_overpass_json(&response.text().await?)?;
        tokio::fs::create_dir_all(&self.cache_dir).await?;
        network.write_snapshot(snapshot).await?;
        info!(
            path = %snapshot.display(),
            nodes = network.node_count(),
            edges = network.edge_count(),
            "Street graph saved"
        );
        Ok(network)
    }
}

impl DrivingDistanceProvider for RoadGraphProvider {
    async fn provide(&self, origin: Location, destination: Location) -> Result<Leg, RoutingError> {
        let extent = Extent::spanning(origin, destination).pad_degenerate();
        let network = self.network(&extent).await?;
        let km = network
            .shortest_path_km(origin, destination)
            .ok_or(RoutingError::NoRoute { origin, destination })?;
        Ok(Leg::new(km, 0.0))
    }
}

// ============================================================================
// Overpass and snapshot documents
// ============================================================================

#[derive(Debug, Deserialize)]
struct OverpassDocument {
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum OverpassElement {
    Node {
        id: i64,
        lat: f64,
        lon: f64,
    },
    Way {
        nodes: Vec<i64>,
        #[serde(default)]
        tags: HashMap<String, String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Serialize, Deserialize)]
struct GraphSnapshot {
    format: u32,
    /// `[lat, lon]` by node index.
    nodes: Vec<[f64; 2]>,
    /// `(from, to, length_m)`.
    edges: Vec<(usize, usize, f64)>,
}

/// Initial compass bearing from one point to another, degrees in [0, 360).
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dlon = (lon2 - lon1).to_radians();
    let y = dlon.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlon.cos();
    y.atan2(x).to_degrees().rem_euclid(360.0)
}
