//! One-call orchestration of the full profiling pipeline.
//!
//! Data flows strictly downstream: path metrics → spatial matching →
//! elevation fusion → trail analytics. Only the matching stage sees the
//! point cloud; analytics is a pure function of the finalized path. Each
//! run owns its spatial index and cloud subset exclusively, so concurrent
//! profiling of independent track/cloud pairs needs no locks.

use crate::analytics::{
    compute_stats, rolling_hills, split_segments, turning_points, SegmentStats,
};
use crate::cloud::{match_path_to_cloud, MatchedElevation, MatcherConfig, PointCloud};
use crate::error::{Result, TrailError};
use crate::fusion::{fuse, FusionConfig};
use crate::path::Path;
use crate::TrackPoint;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// All tunables for one profiling run, with documented defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub matcher: MatcherConfig,
    pub fusion: FusionConfig,
    /// Hypotenuse threshold for rolling-hill tagging. Default: 10.0 meters
    pub rolling_hill_m: f64,
    /// Number of equal-distance segments. Default: 5
    pub segment_count: usize,
    /// Fall back to track-only elevation when no projection resolves,
    /// instead of surfacing the error. Default: true
    pub allow_track_fallback: bool,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            matcher: MatcherConfig::default(),
            fusion: FusionConfig::default(),
            rolling_hill_m: 10.0,
            segment_count: 5,
            allow_track_fallback: true,
        }
    }
}

impl ProfileConfig {
    fn validate(&self) -> Result<()> {
        if self.segment_count == 0 {
            return Err(TrailError::InvalidConfig {
                message: "segment_count must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.fusion.cloud_weight) {
            return Err(TrailError::InvalidConfig {
                message: format!(
                    "cloud_weight must be within 0..=1, got {}",
                    self.fusion.cloud_weight
                ),
            });
        }
        if self.fusion.smoothing_window == 0 {
            return Err(TrailError::InvalidConfig {
                message: "smoothing_window must be at least 1".to_string(),
            });
        }
        if !(self.matcher.distance_threshold_m > 0.0) {
            return Err(TrailError::InvalidConfig {
                message: "distance_threshold_m must be positive".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.matcher.accept_fraction) {
            return Err(TrailError::InvalidConfig {
                message: format!(
                    "accept_fraction must be within 0..=1, got {}",
                    self.matcher.accept_fraction
                ),
            });
        }
        Ok(())
    }
}

/// The finalized, JSON-serializable profile record consumed by a
/// presentation or API layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailProfile {
    pub latitudes: Vec<f64>,
    pub longitudes: Vec<f64>,
    /// Finalized elevation, no missing values
    pub elevations: Vec<f64>,
    pub cumulative_distances_m: Vec<f64>,
    pub cumulative_distances_km: Vec<f64>,
    pub total_distance_m: f64,
    pub total_distance_km: f64,
    pub altitude_change: f64,
    pub altitude_min: f64,
    pub altitude_max: f64,
    pub altitude_start: f64,
    pub altitude_end: f64,
    pub distance_up: f64,
    pub distance_down: f64,
    pub distance_flat: f64,
    pub grade: f64,
    pub turning_x: Vec<f64>,
    pub turning_y: Vec<f64>,
    pub rolling_x: Vec<f64>,
    pub rolling_y: Vec<f64>,
    pub segment_stats: Vec<SegmentStats>,
    /// End-of-segment positions in kilometers, parallel to `segment_stats`
    pub segment_x_positions: Vec<f64>,
}

/// Run the full pipeline for one track/cloud pair.
///
/// `cloud` is optional; without one (or when every sample goes unmatched)
/// the profile rests entirely on the track's own elevation. A
/// [`TrailError::NoUsableProjection`] from matching is downgraded to the
/// track-only fallback when `config.allow_track_fallback` is set.
pub fn build_profile(
    groups: &[Vec<TrackPoint>],
    cloud: Option<&PointCloud>,
    config: &ProfileConfig,
) -> Result<TrailProfile> {
    config.validate()?;

    let path = Path::from_groups(groups)?;

    let matched: Vec<MatchedElevation> = match cloud {
        Some(cloud) => match match_path_to_cloud(&path, cloud, &config.matcher) {
            Ok(matched) => matched,
            Err(err @ TrailError::NoUsableProjection { .. }) if config.allow_track_fallback => {
                warn!("{err}; falling back to track elevation");
                vec![MatchedElevation::unmatched(); path.len()]
            }
            Err(err) => return Err(err),
        },
        None => vec![MatchedElevation::unmatched(); path.len()],
    };

    let cloud_elevations: Vec<Option<f64>> = matched.iter().map(|m| m.elevation).collect();
    let elevations = fuse(&path.elevations, &cloud_elevations, &config.fusion)?;

    let stats = compute_stats(&path.cumulative_m, &elevations);
    let turning = turning_points(&path.cumulative_m, &elevations);
    let (rolling_x, rolling_y) = rolling_hills(&turning, config.rolling_hill_m);
    let (segment_stats, segment_x_positions) = split_segments(
        &turning,
        path.total_distance_m(),
        config.segment_count,
        config.rolling_hill_m,
    );

    info!(
        "Profile built: {} samples, {:.2}km, {} turning points, {} segments",
        path.len(),
        path.total_distance_km(),
        turning.len(),
        segment_stats.len()
    );

    Ok(TrailProfile {
        cumulative_distances_km: path.cumulative_km(),
        total_distance_m: path.total_distance_m(),
        total_distance_km: path.total_distance_km(),
        latitudes: path.latitudes,
        longitudes: path.longitudes,
        elevations,
        cumulative_distances_m: path.cumulative_m,
        altitude_change: stats.altitude_change,
        altitude_min: stats.altitude_min,
        altitude_max: stats.altitude_max,
        altitude_start: stats.altitude_start,
        altitude_end: stats.altitude_end,
        distance_up: stats.distance_up,
        distance_down: stats.distance_down,
        distance_flat: stats.distance_flat,
        grade: stats.grade,
        turning_x: turning.iter().map(|t| t.distance_km).collect(),
        turning_y: turning.iter().map(|t| t.elevation).collect(),
        rolling_x,
        rolling_y,
        segment_stats,
        segment_x_positions,
    })
}
