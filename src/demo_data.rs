//! Synthetic demo datasets.
//!
//! Three cities, each a set of delivery routes out of real depot locations:
//! - Philadelphia (49 delivery stops, 6 routes)
//! - Hartford (30 delivery stops, 5 routes)
//! - Firenze (48 delivery stops, 6 routes)
//!
//! Stops are drawn from real addresses and given a customer type that shapes
//! their time window, package count and service time. Generation is seeded,
//! so a dataset is identical on every call.

use chrono::{DateTime, TimeDelta, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::str::FromStr;

use self::CustomerType::{Business, Residential, Restaurant};
use crate::analysis::Analysis;
use crate::domain::{
    Location, LocationType, Package, PackageStatus, Route, SequenceKind, Stop, Vehicle,
};
use crate::error::ValidationError;

/// Midnight UTC, Monday 23 July 2018.
const BASE_DATE_TIMESTAMP: i64 = 1_532_304_000;

const VEHICLE_NAMES: [&str; 10] = [
    "Alpha", "Bravo", "Charlie", "Delta", "Echo",
    "Foxtrot", "Golf", "Hotel", "India", "Juliet",
];

#[derive(Clone, Copy, Debug)]
enum CustomerType {
    /// Evening deliveries, few packages.
    Residential,
    /// Business hours.
    Business,
    /// Early morning, many packages.
    Restaurant,
}

impl CustomerType {
    /// Opening and closing hour.
    fn time_window(self) -> (i64, i64) {
        match self {
            Residential => (17, 20),
            Business => (9, 17),
            Restaurant => (6, 10),
        }
    }

    fn package_range(self) -> (usize, usize) {
        match self {
            Residential => (1, 2),
            Business => (2, 5),
            Restaurant => (3, 8),
        }
    }

    /// Service time range in seconds.
    fn service_range(self) -> (u32, u32) {
        match self {
            Residential => (60, 180),
            Business => (120, 420),
            Restaurant => (300, 900),
        }
    }
}

/// Customer type, name, latitude, longitude.
type Site = (CustomerType, &'static str, f64, f64);

struct CityConfig {
    seed: u64,
    route_count: usize,
    departure_hour: i64,
    min_capacity: f64,
    max_capacity: f64,
}

// ============================================================================
// Philadelphia Sites
// ============================================================================

const PHILADELPHIA_DEPOTS: &[(&str, f64, f64)] = &[
    ("Central Depot - City Hall", 39.9526, -75.1652),
    ("South Philly Depot", 39.9256, -75.1697),
    ("University City Depot", 39.9522, -75.1932),
    ("North Philly Depot", 39.9907, -75.1556),
    ("Fishtown Depot", 39.9712, -75.1340),
    ("West Philly Depot", 39.9601, -75.2175),
];

const PHILADELPHIA_VISITS: &[Site] = &[
    (Restaurant, "Reading Terminal Market", 39.9535, -75.1589),
    (Restaurant, "Parc Restaurant", 39.9493, -75.1727),
    (Restaurant, "Zahav", 39.9430, -75.1474),
    (Restaurant, "Vetri Cucina", 39.9499, -75.1659),
    (Restaurant, "Talula's Garden", 39.9470, -75.1709),
    (Restaurant, "Fork", 39.9493, -75.1539),
    (Restaurant, "Morimoto", 39.9488, -75.1559),
    (Restaurant, "Vernick Food & Drink", 39.9508, -75.1718),
    (Restaurant, "Friday Saturday Sunday", 39.9492, -75.1715),
    (Restaurant, "Royal Izakaya", 39.9410, -75.1509),
    (Restaurant, "Laurel", 39.9392, -75.1538),
    (Restaurant, "Marigold Kitchen", 39.9533, -75.1920),
    (Business, "Comcast Center", 39.9543, -75.1690),
    (Business, "Liberty Place", 39.9520, -75.1685),
    (Business, "BNY Mellon Center", 39.9505, -75.1660),
    (Business, "One Liberty Place", 39.9520, -75.1685),
    (Business, "Aramark Tower", 39.9550, -75.1705),
    (Business, "PSFS Building", 39.9510, -75.1618),
    (Business, "Three Logan Square", 39.9567, -75.1720),
    (Business, "Two Commerce Square", 39.9551, -75.1675),
    (Business, "Penn Medicine", 39.9495, -75.1935),
    (Business, "Children's Hospital", 39.9482, -75.1950),
    (Business, "Drexel University", 39.9566, -75.1899),
    (Business, "Temple University", 39.9812, -75.1554),
    (Business, "Jefferson Hospital", 39.9487, -75.1577),
    (Business, "Pennsylvania Hospital", 39.9445, -75.1545),
    (Business, "FMC Tower", 39.9499, -75.1780),
    (Business, "Cira Centre", 39.9560, -75.1822),
    (Residential, "Rittenhouse Square", 39.9496, -75.1718),
    (Residential, "Washington Square West", 39.9468, -75.1545),
    (Residential, "Society Hill", 39.9425, -75.1478),
    (Residential, "Old City", 39.9510, -75.1450),
    (Residential, "Northern Liberties", 39.9650, -75.1420),
    (Residential, "Fishtown", 39.9712, -75.1340),
    (Residential, "Queen Village", 39.9380, -75.1520),
    (Residential, "Bella Vista", 39.9395, -75.1598),
    (Residential, "Graduate Hospital", 39.9425, -75.1768),
    (Residential, "Fairmount", 39.9680, -75.1750),
    (Residential, "Spring Garden", 39.9620, -75.1620),
    (Residential, "Art Museum Area", 39.9656, -75.1810),
    (Residential, "Brewerytown", 39.9750, -75.1850),
    (Residential, "East Passyunk", 39.9310, -75.1605),
    (Residential, "Point Breeze", 39.9285, -75.1780),
    (Residential, "Pennsport", 39.9320, -75.1450),
    (Residential, "Powelton Village", 39.9610, -75.1950),
    (Residential, "Spruce Hill", 39.9530, -75.2100),
    (Residential, "Cedar Park", 39.9490, -75.2200),
    (Residential, "Kensington", 39.9850, -75.1280),
    (Residential, "Port Richmond", 39.9870, -75.1120),
];

// ============================================================================
// Hartford Sites
// ============================================================================

const HARTFORD_DEPOTS: &[(&str, f64, f64)] = &[
    ("Downtown Hartford Depot", 41.7658, -72.6734),
    ("Asylum Hill Depot", 41.7700, -72.6900),
    ("South End Depot", 41.7400, -72.6750),
    ("West End Depot", 41.7680, -72.7100),
    ("Barry Square Depot", 41.7450, -72.6800),
    ("Clay Arsenal Depot", 41.7750, -72.6850),
];

const HARTFORD_VISITS: &[Site] = &[
    (Restaurant, "Max Downtown", 41.7670, -72.6730),
    (Restaurant, "Trumbull Kitchen", 41.7650, -72.6750),
    (Restaurant, "Salute", 41.7630, -72.6740),
    (Restaurant, "Peppercorns Grill", 41.7690, -72.6680),
    (Restaurant, "Feng Asian Bistro", 41.7640, -72.6725),
    (Restaurant, "On20", 41.7655, -72.6728),
    (Restaurant, "First and Last Tavern", 41.7620, -72.7050),
    (Restaurant, "Agave Grill", 41.7580, -72.6820),
    (Restaurant, "Bear's Smokehouse", 41.7550, -72.6780),
    (Restaurant, "City Steam Brewery", 41.7630, -72.6750),
    (Business, "Travelers Tower", 41.7658, -72.6734),
    (Business, "Hartford Steam Boiler", 41.7680, -72.6700),
    (Business, "Aetna Building", 41.7700, -72.6900),
    (Business, "Connecticut Convention Center", 41.7615, -72.6820),
    (Business, "Hartford Hospital", 41.7547, -72.6858),
    (Business, "Connecticut Children's", 41.7560, -72.6850),
    (Business, "Trinity College", 41.7474, -72.6909),
    (Business, "Connecticut Science Center", 41.7650, -72.6695),
    (Residential, "West End Hartford", 41.7680, -72.7000),
    (Residential, "Asylum Hill", 41.7720, -72.6850),
    (Residential, "Frog Hollow", 41.7580, -72.6900),
    (Residential, "Barry Square", 41.7450, -72.6800),
    (Residential, "South End", 41.7400, -72.6750),
    (Residential, "Blue Hills", 41.7850, -72.7050),
    (Residential, "Parkville", 41.7650, -72.7100),
    (Residential, "Behind the Rocks", 41.7550, -72.7050),
    (Residential, "Charter Oak", 41.7495, -72.6650),
    (Residential, "Sheldon Charter Oak", 41.7510, -72.6700),
    (Residential, "Clay Arsenal", 41.7750, -72.6850),
    (Residential, "Upper Albany", 41.7780, -72.6950),
];

// ============================================================================
// Firenze Sites
// ============================================================================

const FIRENZE_DEPOTS: &[(&str, f64, f64)] = &[
    ("Centro Storico Depot", 43.7696, 11.2558),
    ("Santa Maria Novella Depot", 43.7745, 11.2487),
    ("Campo di Marte Depot", 43.7820, 11.2820),
    ("Rifredi Depot", 43.7950, 11.2410),
    ("Novoli Depot", 43.7880, 11.2220),
    ("Gavinana Depot", 43.7520, 11.2680),
];

const FIRENZE_VISITS: &[Site] = &[
    (Restaurant, "Trattoria Mario", 43.7750, 11.2530),
    (Restaurant, "Buca Mario", 43.7698, 11.2505),
    (Restaurant, "Il Latini", 43.7705, 11.2495),
    (Restaurant, "Osteria dell'Enoteca", 43.7680, 11.2545),
    (Restaurant, "Trattoria Sostanza", 43.7735, 11.2470),
    (Restaurant, "All'Antico Vinaio", 43.7690, 11.2570),
    (Restaurant, "Mercato Centrale", 43.7762, 11.2540),
    (Restaurant, "Cibreo", 43.7702, 11.2670),
    (Restaurant, "Ora d'Aria", 43.7710, 11.2610),
    (Restaurant, "Buca Lapi", 43.7720, 11.2535),
    (Restaurant, "Il Palagio", 43.7680, 11.2550),
    (Restaurant, "Enoteca Pinchiorri", 43.7695, 11.2620),
    (Restaurant, "La Giostra", 43.7745, 11.2650),
    (Restaurant, "Fishing Lab", 43.7730, 11.2560),
    (Restaurant, "Trattoria Cammillo", 43.7665, 11.2520),
    (Business, "Palazzo Vecchio", 43.7693, 11.2563),
    (Business, "Uffizi Gallery", 43.7677, 11.2553),
    (Business, "Gucci Garden", 43.7692, 11.2556),
    (Business, "Ferragamo Museum", 43.7700, 11.2530),
    (Business, "Ospedale Santa Maria", 43.7830, 11.2690),
    (Business, "Universita degli Studi", 43.7765, 11.2555),
    (Business, "Palazzo Strozzi", 43.7706, 11.2515),
    (Business, "Biblioteca Nazionale", 43.7660, 11.2650),
    (Business, "Teatro del Maggio", 43.7780, 11.2470),
    (Business, "Palazzo Pitti", 43.7650, 11.2500),
    (Business, "Accademia Gallery", 43.7768, 11.2590),
    (Business, "Ospedale Meyer", 43.7910, 11.2520),
    (Business, "Polo Universitario", 43.7920, 11.2180),
    (Residential, "Santo Spirito", 43.7665, 11.2470),
    (Residential, "San Frediano", 43.7680, 11.2420),
    (Residential, "Santa Croce", 43.7688, 11.2620),
    (Residential, "San Lorenzo", 43.7755, 11.2540),
    (Residential, "San Marco", 43.7780, 11.2585),
    (Residential, "Sant'Ambrogio", 43.7705, 11.2680),
    (Residential, "Campo di Marte", 43.7820, 11.2820),
    (Residential, "Novoli", 43.7880, 11.2220),
    (Residential, "Rifredi", 43.7950, 11.2410),
    (Residential, "Le Cure", 43.7890, 11.2580),
    (Residential, "Careggi", 43.8020, 11.2530),
    (Residential, "Peretola", 43.7960, 11.2050),
    (Residential, "Isolotto", 43.7620, 11.2200),
    (Residential, "Gavinana", 43.7520, 11.2680),
    (Residential, "Galluzzo", 43.7400, 11.2480),
    (Residential, "Porta Romana", 43.7610, 11.2560),
    (Residential, "Bellosguardo", 43.7650, 11.2350),
    (Residential, "Arcetri", 43.7500, 11.2530),
    (Residential, "Fiesole", 43.8055, 11.2935),
    (Residential, "Settignano", 43.7850, 11.3100),
];

// ============================================================================
// Generation
// ============================================================================

/// A named set of generated routes.
#[derive(Clone, Debug)]
pub struct Dataset {
    pub name: String,
    pub routes: Vec<Route>,
}

impl Dataset {
    pub fn into_analysis(self) -> Result<Analysis, ValidationError> {
        Analysis::new(self.name, self.routes)
    }
}

/// The demo datasets.
///
/// # Examples
///
/// ```
/// use last_mile_analyzer::demo_data::DemoDataset;
///
/// let dataset: DemoDataset = "hartford".parse().unwrap();
/// let data = dataset.generate().unwrap();
/// assert_eq!(data.name, "Hartford");
/// assert_eq!(data.routes.len(), 5);
///
/// assert!("UNKNOWN".parse::<DemoDataset>().is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DemoDataset {
    Philadelphia,
    Hartford,
    Firenze,
}

impl DemoDataset {
    pub const ALL: [DemoDataset; 3] = [
        DemoDataset::Philadelphia,
        DemoDataset::Hartford,
        DemoDataset::Firenze,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DemoDataset::Philadelphia => "PHILADELPHIA",
            DemoDataset::Hartford => "HARTFORD",
            DemoDataset::Firenze => "FIRENZE",
        }
    }

    pub fn generate(self) -> Result<Dataset, ValidationError> {
        match self {
            DemoDataset::Philadelphia => generate_city(
                "Philadelphia",
                &CityConfig {
                    seed: 0,
                    route_count: 6,
                    departure_hour: 6,
                    min_capacity: 2_500_000.0,
                    max_capacity: 4_000_000.0,
                },
                PHILADELPHIA_DEPOTS,
                PHILADELPHIA_VISITS,
            ),
            DemoDataset::Hartford => generate_city(
                "Hartford",
                &CityConfig {
                    seed: 1,
                    route_count: 5,
                    departure_hour: 6,
                    min_capacity: 3_000_000.0,
                    max_capacity: 4_000_000.0,
                },
                HARTFORD_DEPOTS,
                HARTFORD_VISITS,
            ),
            DemoDataset::Firenze => generate_city(
                "Firenze",
                &CityConfig {
                    seed: 2,
                    route_count: 6,
                    departure_hour: 5,
                    min_capacity: 2_000_000.0,
                    max_capacity: 3_500_000.0,
                },
                FIRENZE_DEPOTS,
                FIRENZE_VISITS,
            ),
        }
    }
}

impl FromStr for DemoDataset {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DemoDataset::ALL
            .into_iter()
            .find(|d| d.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::UnknownDataset(s.to_string()))
    }
}

impl fmt::Display for DemoDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns all available demo dataset names.
pub fn available_datasets() -> Vec<&'static str> {
    DemoDataset::ALL.iter().map(|d| d.as_str()).collect()
}

fn generate_city(
    name: &str,
    config: &CityConfig,
    depots: &[(&'static str, f64, f64)],
    sites: &[Site],
) -> Result<Dataset, ValidationError> {
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut shuffled: Vec<Site> = sites.to_vec();
    for i in (1..shuffled.len()).rev() {
        let j = rng.gen_range(0..=i);
        shuffled.swap(i, j);
    }

    let per_route = shuffled.len().div_ceil(config.route_count.max(1));
    let base = DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(BASE_DATE_TIMESTAMP);
    let mut routes = Vec::with_capacity(config.route_count);

    for (i, chunk) in shuffled.chunks(per_route.max(1)).enumerate() {
        // Routes spread over the working week
        let day = base + TimeDelta::days((i % 5) as i64);
        let departure = day + TimeDelta::hours(config.departure_hour);

        let (depot_name, lat, lon) = depots[i % depots.len()];
        let mut stops = Vec::with_capacity(chunk.len() + 1);
        stops.push(Stop::new(
            depot_name,
            Location::new(lat, lon),
            LocationType::Depot,
            (departure, departure),
            Vec::new(),
        )?);
        for &(kind, stop_name, lat, lon) in chunk {
            stops.push(demo_stop(&mut rng, day, kind, stop_name, Location::new(lat, lon))?);
        }

        let planned: Vec<String> = stops.iter().map(|s| s.name.clone()).collect();
        let actual = perturb(&mut rng, &planned);
        let capacity = rng.gen_range(config.min_capacity..=config.max_capacity).round();
        let vehicle = Vehicle::new(VEHICLE_NAMES[i % VEHICLE_NAMES.len()], capacity);

        let mut route = Route::new(
            format!("{}_{:02}", name.to_uppercase(), i + 1),
            stops,
            departure,
        )
        .with_vehicle(vehicle);
        route.set_sequence(SequenceKind::Planned, planned)?;
        route.set_sequence(SequenceKind::Actual, actual)?;
        routes.push(route);
    }

    Ok(Dataset {
        name: name.to_string(),
        routes,
    })
}

fn demo_stop(
    rng: &mut StdRng,
    day: DateTime<Utc>,
    kind: CustomerType,
    name: &str,
    location: Location,
) -> Result<Stop, ValidationError> {
    let (open, close) = kind.time_window();
    let window = (day + TimeDelta::hours(open), day + TimeDelta::hours(close));

    let (min_packages, max_packages) = kind.package_range();
    let count = rng.gen_range(min_packages..=max_packages);
    let packages = (0..count)
        .map(|n| demo_package(rng, name, n))
        .collect::<Result<Vec<_>, _>>()?;

    let (min_service, max_service) = kind.service_range();
    let service = rng.gen_range(min_service..=max_service);

    Ok(Stop::new(name, location, LocationType::Delivery, window, packages)?
        .with_planned_service_time(f64::from(service)))
}

fn demo_package(rng: &mut StdRng, stop: &str, n: usize) -> Result<Package, ValidationError> {
    let dimensions = (
        rng.gen_range(10.0..60.0f64).round(),
        rng.gen_range(5.0..40.0f64).round(),
        rng.gen_range(5.0..40.0f64).round(),
    );
    let weight = (rng.gen_range(0.2..15.0f64) * 10.0).round() / 10.0;
    let price = (rng.gen_range(5.0..250.0f64) * 100.0).round() / 100.0;
    Package::new(format!("{stop} #{}", n + 1), dimensions, random_status(rng), weight, price)
}

/// 85% delivered, 5% attempted, 5% rejected, 5% still to be delivered.
fn random_status(rng: &mut StdRng) -> PackageStatus {
    match rng.gen_range(1..=100u32) {
        1..=85 => PackageStatus::Delivered,
        86..=90 => PackageStatus::Attempted,
        91..=95 => PackageStatus::Rejected,
        _ => PackageStatus::ToBeDelivered,
    }
}

/// The driven order: the planned one with a few neighbouring deliveries
/// swapped. The depot stays first.
fn perturb(rng: &mut StdRng, planned: &[String]) -> Vec<String> {
    let mut actual = planned.to_vec();
    if actual.len() > 2 {
        for _ in 0..actual.len() / 4 {
            let k = rng.gen_range(1..actual.len() - 1);
            actual.swap(k, k + 1);
        }
    }
    actual
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_sizes() {
        let philadelphia = DemoDataset::Philadelphia.generate().unwrap();
        assert_eq!(philadelphia.routes.len(), 6);
        let stops: usize = philadelphia.routes.iter().map(|r| r.delivery_stops().count()).sum();
        assert_eq!(stops, 49);

        let firenze = DemoDataset::Firenze.generate().unwrap();
        assert_eq!(firenze.routes.len(), 6);
        let stops: usize = firenze.routes.iter().map(|r| r.delivery_stops().count()).sum();
        assert_eq!(stops, 48);
    }

    #[test]
    fn test_generation_is_deterministic() {
        let a = DemoDataset::Hartford.generate().unwrap();
        let b = DemoDataset::Hartford.generate().unwrap();
        for (ra, rb) in a.routes.iter().zip(&b.routes) {
            assert_eq!(ra.name, rb.name);
            assert_eq!(ra.sequence_names(SequenceKind::Actual), rb.sequence_names(SequenceKind::Actual));
            assert_eq!(ra.total_volume_of_packages(), rb.total_volume_of_packages());
        }
    }

    #[test]
    fn test_sequences_cover_every_stop_once() {
        let data = DemoDataset::Philadelphia.generate().unwrap();
        for route in &data.routes {
            let planned = route.sequence_names(SequenceKind::Planned);
            let mut actual = route.sequence_names(SequenceKind::Actual);
            assert_eq!(planned.len(), route.stops().len());
            assert_eq!(actual[0], planned[0]);
            assert_eq!(route.stop_by_name(planned[0]).unwrap().location_type, LocationType::Depot);

            let mut sorted = planned.clone();
            sorted.sort_unstable();
            actual.sort_unstable();
            assert_eq!(sorted, actual);
        }
    }

    #[test]
    fn test_routes_span_the_week() {
        let analysis = DemoDataset::Philadelphia.generate().unwrap().into_analysis().unwrap();
        let period = analysis.time_period();
        // Six routes over five weekdays: Monday gets two
        assert_eq!(period.routes_per_weekday, vec![2, 1, 1, 1, 1, 0, 0]);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Firenze".parse::<DemoDataset>().unwrap(), DemoDataset::Firenze);
        assert_eq!(available_datasets(), vec!["PHILADELPHIA", "HARTFORD", "FIRENZE"]);
        assert!(matches!(
            "atlantis".parse::<DemoDataset>(),
            Err(ValidationError::UnknownDataset(_))
        ));
    }
}
