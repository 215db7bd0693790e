//! # Trail Profiler
//!
//! Elevation-profile and difficulty analysis for GPS trails, fusing a
//! recorded track (noisy elevation, precise planar position) with an
//! aerial point-cloud survey (precise elevation, sparse coverage,
//! vegetation-contaminated).
//!
//! The pipeline runs strictly downstream:
//!
//! 1. **Path metrics** — cumulative great-circle distance and a
//!    normalized elevation baseline ([`path`])
//! 2. **Spatial matching** — coordinate-reference resolution, cloud
//!    subsetting and R-tree nearest-neighbor queries ([`projection`],
//!    [`cloud`])
//! 3. **Elevation fusion** — spike pruning, clamped weighted blending,
//!    smoothing and gap interpolation ([`fusion`])
//! 4. **Trail analytics** — stats, turning points, rolling hills and
//!    equal-distance segments ([`analytics`])
//!
//! ## Features
//!
//! - **`parallel`** - Parallel reprojection of path samples with rayon
//!
//! ## Quick Start
//!
//! ```rust
//! use trail_profiler::{build_profile, ProfileConfig, TrackPoint};
//!
//! let track = vec![vec![
//!     TrackPoint::new(-27.470, 153.030, Some(100.0)),
//!     TrackPoint::new(-27.471, 153.030, Some(104.0)),
//!     TrackPoint::new(-27.472, 153.030, Some(102.0)),
//! ]];
//!
//! // No point cloud: the profile rests on the track's own elevation
//! let profile = build_profile(&track, None, &ProfileConfig::default()).unwrap();
//! assert_eq!(profile.elevations.len(), 3);
//! println!("Total: {:.2} km, grade {:.1}%", profile.total_distance_km, profile.grade);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{Result, TrailError};

// Geographic utilities (haversine distance, bounds)
pub mod geo_utils;

// Path-metric construction
pub mod path;
pub use path::Path;

// Coordinate-reference resolution
pub mod projection;
pub use projection::ZoneCrs;

// Point-cloud subsetting and nearest-neighbor matching
pub mod cloud;
pub use cloud::{match_path_to_cloud, CloudPoint, MatchedElevation, MatcherConfig, PointCloud};

// Elevation fusion and repair
pub mod fusion;
pub use fusion::{fuse, FusionConfig};

// Trail analytics
pub mod analytics;
pub use analytics::{
    compute_stats, rolling_hills, split_segments, turning_points, SegmentStats, TrailStats,
    TurningPoint,
};

// Pipeline orchestration
pub mod pipeline;
pub use pipeline::{build_profile, ProfileConfig, TrailProfile};

// ============================================================================
// Core Types
// ============================================================================

/// A raw GPS track sample.
///
/// Elevation is optional: recorders drop samples, and anything but the
/// first sample of a group may arrive without one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: Option<f64>,
}

impl TrackPoint {
    /// Create a new track sample.
    pub fn new(latitude: f64, longitude: f64, elevation: Option<f64>) -> Self {
        Self {
            latitude,
            longitude,
            elevation,
        }
    }
}

/// Geographic bounding box in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Pad each side by a fraction of the box extent.
    pub fn expand_fraction(&self, fraction: f64) -> Self {
        let dlat = (self.max_lat - self.min_lat) * fraction;
        let dlng = (self.max_lng - self.min_lng) * fraction;
        Self {
            min_lat: self.min_lat - dlat,
            max_lat: self.max_lat + dlat,
            min_lng: self.min_lng - dlng,
            max_lng: self.max_lng + dlng,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
