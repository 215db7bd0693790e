//! Point-cloud subsetting and nearest-neighbor elevation matching.
//!
//! The cloud may cover an area orders of magnitude larger than the route,
//! so matching proceeds in three steps:
//!
//! 1. reproject the path's bounding box (plus margin) into the cloud's
//!    reference and keep only cloud points inside it,
//! 2. bulk-load a static R-tree over the subset's (x, y) plane,
//! 3. query the nearest point for every path sample and accept the match
//!    only within a distance threshold.
//!
//! The index and subset are owned by one matching run and dropped at its
//! end; nothing is cached across runs.

use crate::error::Result;
use crate::path::Path;
use crate::projection::{resolve_crs, ZoneCrs};
use log::{debug, warn};
use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// A single survey return in a projected, meter-based reference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CloudPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl CloudPoint {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// An unordered point-cloud survey plus optional coordinate-reference
/// metadata (EPSG identifier or WKT fragment).
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    pub points: Vec<CloudPoint>,
    pub crs: Option<String>,
}

impl PointCloud {
    pub fn new(points: Vec<CloudPoint>, crs: Option<String>) -> Self {
        Self { points, crs }
    }

    /// Planar bounding box of the cloud, `None` when empty.
    pub fn bounds(&self) -> Option<PlanarBounds> {
        if self.points.is_empty() {
            return None;
        }
        let mut bounds = PlanarBounds {
            min_x: f64::MAX,
            max_x: f64::MIN,
            min_y: f64::MAX,
            max_y: f64::MIN,
        };
        for p in &self.points {
            bounds.min_x = bounds.min_x.min(p.x);
            bounds.max_x = bounds.max_x.max(p.x);
            bounds.min_y = bounds.min_y.min(p.y);
            bounds.max_y = bounds.max_y.max(p.y);
        }
        Some(bounds)
    }
}

/// Axis-aligned bounding box in projected (meter) coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanarBounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl PlanarBounds {
    /// Smallest box enclosing a set of corner coordinates.
    pub fn from_corners(corners: &[(f64, f64)]) -> Self {
        let mut bounds = Self {
            min_x: f64::MAX,
            max_x: f64::MIN,
            min_y: f64::MAX,
            max_y: f64::MIN,
        };
        for &(x, y) in corners {
            bounds.min_x = bounds.min_x.min(x);
            bounds.max_x = bounds.max_x.max(x);
            bounds.min_y = bounds.min_y.min(y);
            bounds.max_y = bounds.max_y.max(y);
        }
        bounds
    }

    /// Pad each side by a fraction of the box extent.
    pub fn expand_fraction(&self, fraction: f64) -> Self {
        let dx = (self.max_x - self.min_x) * fraction;
        let dy = (self.max_y - self.min_y) * fraction;
        Self {
            min_x: self.min_x - dx,
            max_x: self.max_x + dx,
            min_y: self.min_y - dy,
            max_y: self.max_y + dy,
        }
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// Configuration for spatial matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    /// Maximum planar distance for a cloud point to count as a match.
    /// Default: 1.5 meters
    pub distance_threshold_m: f64,

    /// Fractional margin added to the path's bounding box before
    /// subsetting the cloud. Default: 0.001 (0.1% of the box extent)
    pub bbox_margin: f64,

    /// Fraction of reprojected path points that must land inside the
    /// cloud's bounds for a projection candidate to be accepted.
    /// Default: 0.6
    pub accept_fraction: f64,

    /// Projection tried before the cloud's metadata and zone inference.
    /// Default: none
    pub default_crs: Option<ZoneCrs>,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            distance_threshold_m: 1.5,
            bbox_margin: 0.001,
            accept_fraction: 0.6,
            default_crs: None,
        }
    }
}

/// Per-path-sample match result against the cloud.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchedElevation {
    /// Cloud elevation, rebased to the matched set's minimum; `None` when
    /// no cloud point lies within the acceptance radius
    pub elevation: Option<f64>,
    /// Planar distance to the nearest cloud point, when one exists
    pub query_distance_m: Option<f64>,
}

impl MatchedElevation {
    pub fn unmatched() -> Self {
        Self {
            elevation: None,
            query_distance_m: None,
        }
    }
}

/// A cloud point indexed by position in the filtered subset.
#[derive(Debug, Clone, Copy)]
struct IndexedCloudPoint {
    idx: usize,
    x: f64,
    y: f64,
}

impl RTreeObject for IndexedCloudPoint {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.x, self.y])
    }
}

impl PointDistance for IndexedCloudPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.x - point[0];
        let dy = self.y - point[1];
        dx * dx + dy * dy
    }
}

/// Resolve one candidate elevation per path sample from the point cloud.
///
/// Returns one [`MatchedElevation`] per sample, in path order. An empty
/// cloud or an empty subset after bounding-box filtering yields all
/// unmatched samples (reported via `warn!`, not an error) so fusion can
/// fall back to the track's own elevation. Matched elevations are rebased
/// so the lowest matched value reads 0, putting them on the same baseline
/// as the normalized track.
pub fn match_path_to_cloud(
    path: &Path,
    cloud: &PointCloud,
    config: &MatcherConfig,
) -> Result<Vec<MatchedElevation>> {
    if cloud.points.is_empty() {
        warn!("Point cloud is empty, all samples unmatched");
        return Ok(vec![MatchedElevation::unmatched(); path.len()]);
    }

    let crs = resolve_crs(path, cloud, config)?;

    // Reproject the expanded path bbox and keep only cloud points inside it
    let geo_bounds = path.bounds().expand_fraction(config.bbox_margin);
    let corners = [
        crs.project(geo_bounds.min_lat, geo_bounds.min_lng),
        crs.project(geo_bounds.min_lat, geo_bounds.max_lng),
        crs.project(geo_bounds.max_lat, geo_bounds.min_lng),
        crs.project(geo_bounds.max_lat, geo_bounds.max_lng),
    ];
    let search_box = PlanarBounds::from_corners(&corners);

    let subset: Vec<CloudPoint> = cloud
        .points
        .iter()
        .filter(|p| search_box.contains(p.x, p.y))
        .copied()
        .collect();

    debug!(
        "Cloud subset: {} of {} points inside route bounds",
        subset.len(),
        cloud.points.len()
    );

    if subset.is_empty() {
        warn!("No cloud points inside route bounds, all samples unmatched");
        return Ok(vec![MatchedElevation::unmatched(); path.len()]);
    }

    let indexed: Vec<IndexedCloudPoint> = subset
        .iter()
        .enumerate()
        .map(|(idx, p)| IndexedCloudPoint {
            idx,
            x: p.x,
            y: p.y,
        })
        .collect();
    let tree = RTree::bulk_load(indexed);

    let query = |(&lat, &lng): (&f64, &f64)| -> MatchedElevation {
        let (x, y) = crs.project(lat, lng);
        match tree.nearest_neighbor_iter_with_distance_2(&[x, y]).next() {
            Some((nearest, distance_2)) => {
                let distance = distance_2.sqrt();
                let elevation = if distance < config.distance_threshold_m {
                    Some(subset[nearest.idx].z)
                } else {
                    None
                };
                MatchedElevation {
                    elevation,
                    query_distance_m: Some(distance),
                }
            }
            None => MatchedElevation::unmatched(),
        }
    };

    #[cfg(feature = "parallel")]
    let mut matches: Vec<MatchedElevation> = path
        .latitudes
        .par_iter()
        .zip(path.longitudes.par_iter())
        .map(query)
        .collect();

    #[cfg(not(feature = "parallel"))]
    let mut matches: Vec<MatchedElevation> = path
        .latitudes
        .iter()
        .zip(path.longitudes.iter())
        .map(query)
        .collect();

    // Rebase matched elevations to their own minimum so they share the
    // track's "lowest point reads 0" baseline.
    let min_matched = matches
        .iter()
        .filter_map(|m| m.elevation)
        .fold(f64::INFINITY, f64::min);
    if min_matched.is_finite() {
        for m in matches.iter_mut() {
            if let Some(e) = m.elevation.as_mut() {
                *e -= min_matched;
            }
        }
    } else {
        warn!("No path sample matched a cloud point within threshold");
    }

    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrailError;
    use crate::TrackPoint;

    const CRS: u32 = 32756; // UTM zone 56 south, covers Brisbane

    /// A short straight track near Brisbane plus a cloud sampled exactly
    /// under it (offset by `offset_m` to the east).
    fn track_and_cloud(offset_m: f64) -> (Path, PointCloud) {
        let crs = ZoneCrs::from_epsg(CRS).unwrap();
        let mut points = Vec::new();
        let mut cloud = Vec::new();
        for i in 0..20 {
            let lat = -27.47 + i as f64 * 0.0001;
            let lng = 153.03;
            points.push(TrackPoint::new(lat, lng, Some(100.0 + i as f64)));
            let (x, y) = crs.project(lat, lng);
            cloud.push(CloudPoint::new(x + offset_m, y, 200.0 + i as f64 * 2.0));
        }
        let path = Path::from_groups(&[points]).unwrap();
        (path, PointCloud::new(cloud, Some("EPSG:32756".to_string())))
    }

    #[test]
    fn test_all_samples_matched() {
        let (path, cloud) = track_and_cloud(0.0);
        let matches = match_path_to_cloud(&path, &cloud, &MatcherConfig::default()).unwrap();
        assert_eq!(matches.len(), path.len());
        assert!(matches.iter().all(|m| m.elevation.is_some()));
        // Rebased: lowest matched elevation reads 0
        let min = matches
            .iter()
            .filter_map(|m| m.elevation)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(min, 0.0);
    }

    #[test]
    fn test_threshold_rejects_distant_points() {
        // Cloud shifted 10m east of the route, threshold is 1.5m
        let (path, cloud) = track_and_cloud(10.0);
        let matches = match_path_to_cloud(&path, &cloud, &MatcherConfig::default()).unwrap();
        assert!(matches.iter().all(|m| m.elevation.is_none()));
        // The query distance is still reported
        assert!(matches
            .iter()
            .all(|m| m.query_distance_m.is_some_and(|d| d > 1.5)));
    }

    #[test]
    fn test_empty_cloud_not_fatal() {
        let (path, _) = track_and_cloud(0.0);
        let cloud = PointCloud::default();
        let matches = match_path_to_cloud(&path, &cloud, &MatcherConfig::default()).unwrap();
        assert_eq!(matches.len(), path.len());
        assert!(matches.iter().all(|m| m.elevation.is_none()));
    }

    #[test]
    fn test_metadata_fallback_to_inferred_zone() {
        // Metadata names a zone two over; its reprojection misses the
        // cloud bounds so the chain falls through to the inferred zone.
        let (path, mut cloud) = track_and_cloud(0.0);
        cloud.crs = Some("EPSG:28354".to_string());
        let matches = match_path_to_cloud(&path, &cloud, &MatcherConfig::default()).unwrap();
        assert!(matches.iter().all(|m| m.elevation.is_some()));
    }

    #[test]
    fn test_no_usable_projection() {
        let (path, _) = track_and_cloud(0.0);
        // Cloud in a completely different part of the world
        let far = PointCloud::new(
            vec![
                CloudPoint::new(400_000.0, 5_700_000.0, 50.0),
                CloudPoint::new(400_100.0, 5_700_100.0, 51.0),
            ],
            None,
        );
        let result = match_path_to_cloud(&path, &far, &MatcherConfig::default());
        assert!(matches!(
            result,
            Err(TrailError::NoUsableProjection { .. })
        ));
    }

    #[test]
    fn test_subset_excludes_far_points() {
        let (path, mut cloud) = track_and_cloud(0.0);
        // Junk returns a few kilometers away must not disturb matching
        for i in 0..100 {
            cloud
                .points
                .push(CloudPoint::new(450_000.0 + i as f64, 6_900_000.0, 999.0));
        }
        let matches = match_path_to_cloud(&path, &cloud, &MatcherConfig::default()).unwrap();
        assert!(matches.iter().all(|m| m.elevation.is_some()));
        assert!(matches
            .iter()
            .all(|m| m.query_distance_m.is_some_and(|d| d < 1.5)));
    }
}
