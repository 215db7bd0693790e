//! Trail analytics over a finalized (distance, elevation) path.
//!
//! Everything here is a pure function of its inputs, recomputed wholesale
//! when the path changes:
//!
//! - [`compute_stats`] — aggregate altitude and up/down/flat distance
//!   statistics,
//! - [`turning_points`] — local elevation direction changes via a small
//!   gradient state machine,
//! - [`rolling_hills`] — short low-relief up/down pairs flagged by a
//!   hypotenuse threshold,
//! - [`split_segments`] — K near-equal-distance segments, each with its
//!   own gain, hill count and grade.

use serde::{Deserialize, Serialize};

/// Aggregate statistics for a finalized path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailStats {
    pub altitude_min: f64,
    pub altitude_max: f64,
    pub altitude_start: f64,
    pub altitude_end: f64,
    /// `altitude_end - altitude_start`
    pub altitude_change: f64,
    /// Meters traveled while ascending
    pub distance_up: f64,
    /// Meters traveled while descending
    pub distance_down: f64,
    /// Meters traveled on the level
    pub distance_flat: f64,
    /// Overall grade in percent
    pub grade: f64,
}

/// A local elevation extremum just before the gradient changes sign.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurningPoint {
    pub distance_km: f64,
    pub elevation: f64,
}

/// Per-segment statistics from equal-distance splitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentStats {
    /// Cumulative elevation gain within the segment (positive deltas only)
    pub gain: f64,
    /// Number of rolling-hill pairs within the segment
    pub hill_count: usize,
    /// Local grade as a ratio (0.05 = 5%); 0 on a zero-distance span
    pub grade: f64,
    /// Rolling-hill endpoints within the segment, distance in km
    pub rolling_x: Vec<f64>,
    /// Rolling-hill endpoint elevations
    pub rolling_y: Vec<f64>,
}

/// Running gradient sign for the turning-point scan.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Trend {
    Neutral,
    Pos,
    Neg,
}

/// Compute aggregate statistics for parallel distance/elevation arrays.
///
/// Ascending/descending/flat distance accumulates the *distance* delta of
/// each consecutive pair, classified by the sign of its elevation delta;
/// pairs with a non-positive distance delta are skipped. When the total
/// distance is zero the grade divides by 1 meter instead (documented
/// degenerate convention, not an error).
pub fn compute_stats(distances_m: &[f64], elevations: &[f64]) -> TrailStats {
    if elevations.is_empty() {
        return TrailStats {
            altitude_min: 0.0,
            altitude_max: 0.0,
            altitude_start: 0.0,
            altitude_end: 0.0,
            altitude_change: 0.0,
            distance_up: 0.0,
            distance_down: 0.0,
            distance_flat: 0.0,
            grade: 0.0,
        };
    }

    let altitude_min = elevations.iter().copied().fold(f64::INFINITY, f64::min);
    let altitude_max = elevations.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let altitude_start = elevations[0];
    let altitude_end = elevations[elevations.len() - 1];
    let altitude_change = altitude_end - altitude_start;

    let mut distance_up = 0.0;
    let mut distance_down = 0.0;
    let mut distance_flat = 0.0;
    for i in 1..elevations.len().min(distances_m.len()) {
        let step = distances_m[i] - distances_m[i - 1];
        if step <= 0.0 {
            continue;
        }
        let rise = elevations[i] - elevations[i - 1];
        if rise > 0.0 {
            distance_up += step;
        } else if rise < 0.0 {
            distance_down += step;
        } else {
            distance_flat += step;
        }
    }

    let total = distances_m.last().copied().unwrap_or(0.0);
    let divisor = if total > 0.0 { total } else { 1.0 };
    let grade = altitude_change / divisor * 100.0;

    TrailStats {
        altitude_min,
        altitude_max,
        altitude_start,
        altitude_end,
        altitude_change,
        distance_up,
        distance_down,
        distance_flat,
        grade,
    }
}

/// Detect local elevation turning points.
///
/// Scans consecutive elevation deltas through a `{neutral, pos, neg}`
/// state machine. A sign change at step `i` stores the *preceding* sample
/// `i - 1` (the local extremum just before the direction change); a zero
/// delta leaves the state unchanged and stores nothing. Index 0 is never
/// stored.
pub fn turning_points(distances_m: &[f64], elevations: &[f64]) -> Vec<TurningPoint> {
    let mut points = Vec::new();
    let mut trend = Trend::Neutral;

    for i in 1..elevations.len().min(distances_m.len()) {
        let diff = elevations[i] - elevations[i - 1];
        let next = if diff > 0.0 {
            Trend::Pos
        } else if diff < 0.0 {
            Trend::Neg
        } else {
            continue;
        };
        if next != trend && i - 1 > 0 {
            points.push(TurningPoint {
                distance_km: distances_m[i - 1] / 1000.0,
                elevation: elevations[i - 1],
            });
        }
        trend = next;
    }

    points
}

/// Tag turning-point pairs belonging to rolling hills.
///
/// For each consecutive pair the straight-line length of the
/// (horizontal-meters, vertical-meters) triangle is compared against the
/// threshold; both endpoints of a qualifying pair are returned (in
/// encounter order, duplicates preserved).
pub fn rolling_hills(turning: &[TurningPoint], threshold_m: f64) -> (Vec<f64>, Vec<f64>) {
    let mut rolling_x = Vec::new();
    let mut rolling_y = Vec::new();

    for pair in turning.windows(2) {
        let run = (pair[1].distance_km - pair[0].distance_km) * 1000.0;
        let rise = (pair[1].elevation - pair[0].elevation).abs();
        if run.hypot(rise) < threshold_m {
            rolling_x.extend([pair[0].distance_km, pair[1].distance_km]);
            rolling_y.extend([pair[0].elevation, pair[1].elevation]);
        }
    }

    (rolling_x, rolling_y)
}

/// Split the turning-point sequence into up to `segment_count`
/// near-equal-distance segments.
///
/// A split boundary lands on the first turning point whose cumulative
/// distance exceeds `i * total / count`; the final turning point closes
/// the last segment. Returns the per-segment statistics and the
/// end-of-segment positions in kilometers. Requesting more segments than
/// there are turning points degrades to fewer segments.
pub fn split_segments(
    turning: &[TurningPoint],
    total_distance_m: f64,
    segment_count: usize,
    rolling_threshold_m: f64,
) -> (Vec<SegmentStats>, Vec<f64>) {
    let n = turning.len();
    if n == 0 || segment_count == 0 {
        return (Vec::new(), Vec::new());
    }

    let ideal = total_distance_m / segment_count as f64;
    let mut boundaries: Vec<usize> = Vec::with_capacity(segment_count);
    let mut cursor = 0;
    for i in 1..segment_count {
        let target = i as f64 * ideal;
        while cursor < n && turning[cursor].distance_km * 1000.0 <= target {
            cursor += 1;
        }
        if cursor < n && boundaries.last() != Some(&cursor) {
            boundaries.push(cursor);
        }
    }
    if boundaries.last() != Some(&n) {
        boundaries.push(n);
    }

    let mut segments = Vec::with_capacity(boundaries.len());
    let mut positions = Vec::with_capacity(boundaries.len());
    let mut start = 0;
    for &end in &boundaries {
        if end == start {
            continue;
        }
        let slice = &turning[start..end];
        segments.push(segment_stats(slice, rolling_threshold_m));
        positions.push(slice[slice.len() - 1].distance_km);
        start = end;
    }

    (segments, positions)
}

fn segment_stats(slice: &[TurningPoint], rolling_threshold_m: f64) -> SegmentStats {
    let gain = slice
        .windows(2)
        .map(|pair| (pair[1].elevation - pair[0].elevation).max(0.0))
        .sum();

    let (rolling_x, rolling_y) = rolling_hills(slice, rolling_threshold_m);
    let hill_count = rolling_x.len() / 2;

    let first = &slice[0];
    let last = &slice[slice.len() - 1];
    let run_km = last.distance_km - first.distance_km;
    let grade = if run_km > 0.0 {
        (last.elevation - first.elevation) / run_km / 1000.0
    } else {
        0.0
    };

    SegmentStats {
        gain,
        hill_count,
        grade,
        rolling_x,
        rolling_y,
    }
}
