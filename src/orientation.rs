//! Street orientation statistics.
//!
//! Summarizes how the streets of an area are oriented, from the compass
//! bearings of the street graph's edges. Streets are undirected for this
//! purpose, so bearings are folded into `[0, 180)` before counting.

use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

/// Width of an orientation bin in degrees.
pub const BIN_WIDTH_DEG: f64 = 10.0;

/// Bins over the half circle `[0, 180)`.
pub const HALF_CIRCLE_BINS: usize = 18;

/// Bins over the full circle, used for the entropy.
pub const FULL_CIRCLE_BINS: usize = 36;

/// Orientation summary of a set of street bearings.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StreetOrientation {
    pub edges: usize,
    /// Edge counts per 10° bin of `[0, 180)`.
    pub counts: Vec<usize>,
    /// Shannon entropy (natural log) over 36 bins of the full circle.
    pub entropy: f64,
    /// 0 for a uniform spread of directions, 1 for a perfect grid.
    pub order: f64,
    /// Centre of the most populated bin, degrees.
    pub dominant_direction: f64,
    pub dominant_percentage: f64,
    pub second_dominant_direction: f64,
    pub second_dominant_percentage: f64,
    /// Count per bin if edges were spread uniformly.
    pub uniform_value: f64,
    /// Mean of `|count - uniform| / uniform` over the bins.
    pub mean_deviation: f64,
    pub quadratic_sum_deviation: f64,
    /// Moments of the bin-centre cosines weighted by bin counts.
    pub mean: f64,
    pub std: f64,
    pub skew: f64,
    pub kurt: f64,
}

/// Folds a compass bearing into `[0, 180)`.
pub fn fold_bearing(bearing: f64) -> f64 {
    bearing.rem_euclid(180.0)
}

fn bin_of(angle: f64, bins: usize) -> usize {
    ((angle / BIN_WIDTH_DEG).floor() as usize).min(bins - 1)
}

fn bin_center(bin: usize) -> f64 {
    bin as f64 * BIN_WIDTH_DEG + BIN_WIDTH_DEG / 2.0
}

/// Shannon entropy of the bearing distribution over 36 bins of the full
/// circle. Each street counts in both of its directions.
///
/// ```
/// use last_mile_analyzer::orientation::orientation_entropy;
///
/// // A perfect grid occupies 4 of the 36 bins
/// let grid = orientation_entropy(&[0.0, 90.0, 180.0, 270.0]);
/// assert!((grid - 4f64.ln()).abs() < 1e-12);
/// ```
pub fn orientation_entropy(bearings: &[f64]) -> f64 {
    let mut counts = [0usize; FULL_CIRCLE_BINS];
    for &b in bearings {
        let folded = fold_bearing(b);
        counts[bin_of(folded, FULL_CIRCLE_BINS)] += 1;
        counts[bin_of(folded + 180.0, FULL_CIRCLE_BINS)] += 1;
    }
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }

    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * p.ln()
        })
        .sum()
}

/// Orientation order from an entropy: `1 - ((H - H_grid) / (H_max - H_grid))²`,
/// clamped to `[0, 1]`.
pub fn orientation_order(entropy: f64) -> f64 {
    let h_max = (FULL_CIRCLE_BINS as f64).ln();
    let h_grid = 4f64.ln();
    let normalized = (entropy - h_grid) / (h_max - h_grid);
    (1.0 - normalized.powi(2)).clamp(0.0, 1.0)
}

/// Computes the orientation summary of a set of bearings in degrees.
///
/// Returns `None` when there are no bearings.
pub fn street_orientation(bearings: &[f64]) -> Option<StreetOrientation> {
    if bearings.is_empty() {
        return None;
    }

    let mut counts = vec![0usize; HALF_CIRCLE_BINS];
    for &b in bearings {
        counts[bin_of(fold_bearing(b), HALF_CIRCLE_BINS)] += 1;
    }
    let total = bearings.len() as f64;

    // Ties go to the lower bin
    let ranked = |skip: Option<usize>| {
        counts
            .iter()
            .enumerate()
            .filter(|&(i, _)| Some(i) != skip)
            .fold(None, |best: Option<(usize, usize)>, (i, &c)| match best {
                Some((_, bc)) if bc >= c => best,
                _ => Some((i, c)),
            })
            .map(|(i, _)| i)
            .unwrap_or(0)
    };
    let dominant = ranked(None);
    let second = ranked(Some(dominant));

    let uniform = total / HALF_CIRCLE_BINS as f64;
    let deviations: Vec<f64> = counts.iter().map(|&c| (c as f64 - uniform).abs() / uniform).collect();
    let mean_deviation = deviations.iter().sum::<f64>() / HALF_CIRCLE_BINS as f64;
    let quadratic_sum_deviation = deviations.iter().map(|d| d * d).sum();

    let cosines: Vec<f64> = (0..HALF_CIRCLE_BINS).map(|i| bin_center(i).to_radians().cos()).collect();
    let moment = |center: f64, power: i32| {
        counts
            .iter()
            .zip(&cosines)
            .map(|(&c, &cos)| c as f64 * (cos - center).powi(power))
            .sum::<f64>()
            / total
    };
    let mean = moment(0.0, 1);
    let std = moment(mean, 2).sqrt();
    let (skew, kurt) = if std < 1e-12 {
        warn!("Bearing cosines have no spread, skewness and kurtosis set to 0");
        (0.0, 0.0)
    } else {
        (moment(mean, 3) / std.powi(3), moment(mean, 4) / std.powi(4))
    };

    let entropy = orientation_entropy(bearings);

    Some(StreetOrientation {
        edges: bearings.len(),
        dominant_direction: bin_center(dominant),
        dominant_percentage: counts[dominant] as f64 / total * 100.0,
        second_dominant_direction: bin_center(second),
        second_dominant_percentage: counts[second] as f64 / total * 100.0,
        counts,
        entropy,
        order: orientation_order(entropy),
        uniform_value: uniform,
        mean_deviation,
        quadratic_sum_deviation,
        mean,
        std,
        skew,
        kurt,
    })
}
