//! Path-metric construction: raw track samples into a measured [`Path`].
//!
//! A [`Path`] carries parallel arrays of latitude, longitude, optional
//! elevation and cumulative great-circle distance. Elevation is rebased so
//! the lowest known sample reads 0; the subtracted minimum is kept as
//! [`Path::base_elevation`] for callers that need absolute altitude.

use crate::error::{Result, TrailError};
use crate::geo_utils::{compute_bounds, haversine_distance};
use crate::{Bounds, TrackPoint};
use log::debug;

/// A measured track: ordered samples with cumulative distance and a
/// normalized elevation baseline.
///
/// Invariants: all arrays have identical length `N >= 1`,
/// `cumulative_m[0] == 0.0` and `cumulative_m` is non-decreasing.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
    /// Elevation in meters above the path's lowest point; `None` where the
    /// recorder dropped the sample
    pub elevations: Vec<Option<f64>>,
    /// Cumulative distance from sample 0 in meters
    pub cumulative_m: Vec<f64>,
    /// The absolute elevation subtracted during normalization
    pub base_elevation: f64,
}

impl Path {
    /// Build a path from one or more ordered point groups (e.g. the
    /// segments of a GPX track), concatenated in encounter order.
    ///
    /// Fails with [`TrailError::MissingElevation`] if the first sample of
    /// any non-empty group lacks elevation, and [`TrailError::EmptyPath`]
    /// if the concatenation has zero samples. A non-finite pairwise
    /// distance contributes 0 to the accumulation rather than aborting
    /// the path.
    pub fn from_groups(groups: &[Vec<TrackPoint>]) -> Result<Self> {
        let mut latitudes = Vec::new();
        let mut longitudes = Vec::new();
        let mut elevations: Vec<Option<f64>> = Vec::new();

        for (group, points) in groups.iter().enumerate() {
            let Some(first) = points.first() else {
                continue;
            };
            if first.elevation.is_none() {
                return Err(TrailError::MissingElevation { group });
            }

            for point in points {
                latitudes.push(point.latitude);
                longitudes.push(point.longitude);
                elevations.push(point.elevation);
            }
        }

        if latitudes.is_empty() {
            return Err(TrailError::EmptyPath);
        }

        let mut cumulative_m = Vec::with_capacity(latitudes.len());
        cumulative_m.push(0.0);
        let mut total = 0.0;
        for i in 1..latitudes.len() {
            let a = TrackPoint::new(latitudes[i - 1], longitudes[i - 1], None);
            let b = TrackPoint::new(latitudes[i], longitudes[i], None);
            let step = haversine_distance(&a, &b);
            if step.is_finite() {
                total += step;
            }
            cumulative_m.push(total);
        }

        // Rebase elevation so the lowest known sample reads 0. At least one
        // sample is known here: each group's first sample carries elevation.
        let base_elevation = elevations
            .iter()
            .flatten()
            .fold(f64::INFINITY, |min, &e| min.min(e));
        for elevation in elevations.iter_mut() {
            if let Some(e) = elevation {
                *e -= base_elevation;
            }
        }

        debug!(
            "Built path: {} samples, {:.1}m total, base elevation {:.1}m",
            latitudes.len(),
            total,
            base_elevation
        );

        Ok(Self {
            latitudes,
            longitudes,
            elevations,
            cumulative_m,
            base_elevation,
        })
    }

    /// Number of samples in the path.
    pub fn len(&self) -> usize {
        self.latitudes.len()
    }

    /// A path is never empty after construction; provided for idiom.
    pub fn is_empty(&self) -> bool {
        self.latitudes.is_empty()
    }

    /// Total path length in meters.
    pub fn total_distance_m(&self) -> f64 {
        self.cumulative_m.last().copied().unwrap_or(0.0)
    }

    /// Total path length in kilometers.
    pub fn total_distance_km(&self) -> f64 {
        self.total_distance_m() / 1000.0
    }

    /// Cumulative distances converted to kilometers.
    pub fn cumulative_km(&self) -> Vec<f64> {
        self.cumulative_m.iter().map(|d| d / 1000.0).collect()
    }

    /// Geographic bounding box of the path.
    pub fn bounds(&self) -> Bounds {
        compute_bounds(&self.latitudes, &self.longitudes)
    }

    /// Mean longitude of the path, used for zone inference.
    pub fn mean_longitude(&self) -> f64 {
        self.longitudes.iter().sum::<f64>() / self.longitudes.len() as f64
    }

    /// Mean latitude of the path.
    pub fn mean_latitude(&self) -> f64 {
        self.latitudes.iter().sum::<f64>() / self.latitudes.len() as f64
    }

    /// Replace the elevation array with a finalized (gap-free) sequence,
    /// yielding the next path generation.
    pub fn with_elevations(mut self, elevations: Vec<f64>) -> Result<Self> {
        if elevations.len() != self.len() {
            return Err(TrailError::LengthMismatch {
                track: self.len(),
                cloud: elevations.len(),
            });
        }
        self.elevations = elevations.into_iter().map(Some).collect();
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_group() -> Vec<TrackPoint> {
        vec![
            TrackPoint::new(0.0, 0.0, Some(10.0)),
            TrackPoint::new(0.0, 0.001, Some(12.0)),
            TrackPoint::new(0.0, 0.002, Some(11.0)),
        ]
    }

    #[test]
    fn test_cumulative_distance_monotonic() {
        let path = Path::from_groups(&[sample_group()]).unwrap();
        assert_eq!(path.cumulative_m[0], 0.0);
        for w in path.cumulative_m.windows(2) {
            assert!(w[1] >= w[0]);
        }
        // 0.001 degrees of longitude at the equator is ~111m
        assert!((path.total_distance_m() - 222.6).abs() < 5.0);
    }

    #[test]
    fn test_elevation_normalized_to_zero() {
        let path = Path::from_groups(&[sample_group()]).unwrap();
        let min = path
            .elevations
            .iter()
            .flatten()
            .fold(f64::INFINITY, |m, &e| m.min(e));
        assert_eq!(min, 0.0);
        assert_eq!(path.base_elevation, 10.0);
        assert_eq!(path.elevations, vec![Some(0.0), Some(2.0), Some(1.0)]);
    }

    #[test]
    fn test_groups_concatenated_in_order() {
        let g1 = vec![
            TrackPoint::new(0.0, 0.0, Some(5.0)),
            TrackPoint::new(0.0, 0.001, Some(6.0)),
        ];
        let g2 = vec![
            TrackPoint::new(0.0, 0.002, Some(7.0)),
            TrackPoint::new(0.0, 0.003, Some(8.0)),
        ];
        let path = Path::from_groups(&[g1, g2]).unwrap();
        assert_eq!(path.len(), 4);
        assert_eq!(path.longitudes, vec![0.0, 0.001, 0.002, 0.003]);
        // Distance accumulates across the group boundary too
        assert!(path.cumulative_m[2] > path.cumulative_m[1]);
    }

    #[test]
    fn test_empty_groups_skipped() {
        let path = Path::from_groups(&[vec![], sample_group(), vec![]]).unwrap();
        assert_eq!(path.len(), 3);
    }

    #[test]
    fn test_empty_path_rejected() {
        assert_eq!(Path::from_groups(&[]), Err(TrailError::EmptyPath));
        assert_eq!(Path::from_groups(&[vec![]]), Err(TrailError::EmptyPath));
    }

    #[test]
    fn test_missing_first_elevation_rejected() {
        let bad = vec![
            TrackPoint::new(0.0, 0.0, None),
            TrackPoint::new(0.0, 0.001, Some(12.0)),
        ];
        let result = Path::from_groups(&[sample_group(), bad]);
        assert_eq!(result, Err(TrailError::MissingElevation { group: 1 }));
    }

    #[test]
    fn test_missing_interior_elevation_tolerated() {
        let group = vec![
            TrackPoint::new(0.0, 0.0, Some(10.0)),
            TrackPoint::new(0.0, 0.001, None),
            TrackPoint::new(0.0, 0.002, Some(14.0)),
        ];
        let path = Path::from_groups(&[group]).unwrap();
        assert_eq!(path.elevations, vec![Some(0.0), None, Some(4.0)]);
    }

    #[test]
    fn test_with_elevations_replaces_array() {
        let path = Path::from_groups(&[sample_group()]).unwrap();
        let path = path.with_elevations(vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(path.elevations, vec![Some(1.0), Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_with_elevations_length_checked() {
        let path = Path::from_groups(&[sample_group()]).unwrap();
        assert!(matches!(
            path.with_elevations(vec![1.0]),
            Err(TrailError::LengthMismatch { .. })
        ));
    }
}
