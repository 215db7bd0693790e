//! Coordinate-reference resolution for point-cloud matching.
//!
//! Survey point clouds arrive in a projected, meter-based reference while
//! GPS tracks are WGS84 degrees. The pipeline resolves one zone-based
//! projection (UTM or the Australian MGA family) through an ordered
//! candidate chain:
//!
//! 1. a caller-supplied default,
//! 2. a reference parsed out of the cloud's own metadata,
//! 3. a zone inferred from the path's mean longitude.
//!
//! Candidates are evaluated lazily; the first one that lands a sufficient
//! fraction of reprojected path points inside the cloud's bounding box
//! wins. A candidate that fails is logged and skipped, never fatal on its
//! own — only exhausting the whole chain raises
//! [`NoUsableProjection`](crate::TrailError::NoUsableProjection).

use crate::cloud::{MatcherConfig, PointCloud};
use crate::error::{Result, TrailError};
use crate::path::Path;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fractional margin applied to the cloud's bounding box when testing
/// whether reprojected path points land inside it. Looser than exact
/// containment so tracks slightly larger than the surveyed tile still
/// resolve.
const BOUNDS_TEST_MARGIN: f64 = 0.1;

/// A zone-based projected coordinate reference (UTM / MGA).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneCrs {
    /// EPSG code this reference was resolved from
    pub epsg: u32,
    /// UTM-style zone number (1-60)
    pub zone: u8,
    /// Southern-hemisphere variant (false northing applied)
    pub south: bool,
}

impl ZoneCrs {
    /// Interpret an EPSG code as a zone-based projection.
    ///
    /// Recognized families: 326xx (WGS84 / UTM north), 327xx (WGS84 / UTM
    /// south), 283xx (GDA94 / MGA) and 78xx (GDA2020 / MGA). Returns
    /// `None` for anything else.
    pub fn from_epsg(epsg: u32) -> Option<Self> {
        let (zone, south) = match epsg {
            32601..=32660 => ((epsg - 32600) as u8, false),
            32701..=32760 => ((epsg - 32700) as u8, true),
            28348..=28358 => ((epsg - 28300) as u8, true),
            7846..=7859 => ((epsg - 7800) as u8, true),
            _ => return None,
        };
        Some(Self { epsg, zone, south })
    }

    /// Scan a CRS identifier or WKT fragment for a recognizable EPSG code.
    ///
    /// Accepts plain codes (`"28356"`), prefixed identifiers
    /// (`"EPSG:28356"`) and WKT containing an EPSG authority entry. The
    /// first digit run that maps to a known zone family wins.
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        let mut digits = String::new();
        for c in identifier.chars().chain(std::iter::once(' ')) {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            if !digits.is_empty() {
                if let Some(crs) = digits.parse().ok().and_then(Self::from_epsg) {
                    return Some(crs);
                }
                digits.clear();
            }
        }
        None
    }

    /// The standard WGS84 UTM zone covering a coordinate.
    pub fn inferred_from(latitude: f64, longitude: f64) -> Self {
        let zone = (((longitude + 180.0) / 6.0).floor() as i32 + 1).clamp(1, 60) as u8;
        let south = latitude < 0.0;
        let epsg = if south {
            32700 + zone as u32
        } else {
            32600 + zone as u32
        };
        Self { epsg, zone, south }
    }

    /// Project a WGS84 coordinate into this reference.
    ///
    /// Returns (x, y) = (easting, northing) in meters, with the southern
    /// 10,000 km false northing applied.
    pub fn project(&self, latitude: f64, longitude: f64) -> (f64, f64) {
        let (mut northing, easting, _convergence) =
            utm::to_utm_wgs84(latitude, longitude, self.zone);
        if latitude < 0.0 && northing < 0.0 {
            northing += 10_000_000.0;
        }
        (easting, northing)
    }
}

impl fmt::Display for ZoneCrs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

/// Resolve the projection linking a path to a point cloud.
///
/// Walks the candidate chain (caller default, cloud metadata, inferred
/// zone) and accepts the first reference for which at least
/// `config.accept_fraction` of reprojected path points fall inside the
/// cloud's bounding box (expanded by a 10% margin).
pub fn resolve_crs(path: &Path, cloud: &PointCloud, config: &MatcherConfig) -> Result<ZoneCrs> {
    let candidates = [
        ("caller default", config.default_crs),
        (
            "cloud metadata",
            cloud.crs.as_deref().and_then(ZoneCrs::from_identifier),
        ),
        (
            "inferred zone",
            Some(ZoneCrs::inferred_from(
                path.mean_latitude(),
                path.mean_longitude(),
            )),
        ),
    ];

    let cloud_bounds = cloud.bounds().map(|b| b.expand_fraction(BOUNDS_TEST_MARGIN));
    let mut tried = Vec::new();

    for (source, candidate) in candidates {
        let Some(crs) = candidate else {
            continue;
        };
        if tried.contains(&crs.to_string()) {
            continue;
        }
        tried.push(crs.to_string());

        let Some(bounds) = &cloud_bounds else {
            warn!("Point cloud has no extent, cannot validate {crs} ({source})");
            continue;
        };

        let inside = path
            .latitudes
            .iter()
            .zip(&path.longitudes)
            .filter(|&(&lat, &lng)| {
                let (x, y) = crs.project(lat, lng);
                x.is_finite() && y.is_finite() && bounds.contains(x, y)
            })
            .count();
        let fraction = inside as f64 / path.len() as f64;

        if fraction >= config.accept_fraction {
            info!(
                "Resolved projection {crs} from {source} ({:.0}% of path inside cloud bounds)",
                fraction * 100.0
            );
            return Ok(crs);
        }
        debug!(
            "Rejected projection {crs} from {source}: only {:.0}% of path inside cloud bounds",
            fraction * 100.0
        );
    }

    Err(TrailError::NoUsableProjection {
        candidates_tried: tried,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_epsg_families() {
        let mga = ZoneCrs::from_epsg(28356).unwrap();
        assert_eq!(mga.zone, 56);
        assert!(mga.south);

        let utm_north = ZoneCrs::from_epsg(32633).unwrap();
        assert_eq!(utm_north.zone, 33);
        assert!(!utm_north.south);

        let utm_south = ZoneCrs::from_epsg(32756).unwrap();
        assert_eq!(utm_south.zone, 56);
        assert!(utm_south.south);

        assert_eq!(ZoneCrs::from_epsg(4326), None);
        assert_eq!(ZoneCrs::from_epsg(3857), None);
    }

    #[test]
    fn test_from_identifier() {
        assert_eq!(
            ZoneCrs::from_identifier("EPSG:28356"),
            ZoneCrs::from_epsg(28356)
        );
        assert_eq!(ZoneCrs::from_identifier("32756"), ZoneCrs::from_epsg(32756));
        assert_eq!(
            ZoneCrs::from_identifier(r#"PROJCS["GDA94 / MGA zone 56",AUTHORITY["EPSG","28356"]]"#),
            ZoneCrs::from_epsg(28356)
        );
        assert_eq!(ZoneCrs::from_identifier("WGS 84"), None);
        assert_eq!(ZoneCrs::from_identifier(""), None);
    }

    #[test]
    fn test_inferred_zone() {
        // Brisbane sits in UTM zone 56 south
        let crs = ZoneCrs::inferred_from(-27.47, 153.03);
        assert_eq!(crs.zone, 56);
        assert!(crs.south);
        assert_eq!(crs.epsg, 32756);

        // London, zone 30 north
        let crs = ZoneCrs::inferred_from(51.5, -0.13);
        assert_eq!(crs.zone, 30);
        assert!(!crs.south);
    }

    #[test]
    fn test_project_southern_hemisphere() {
        let crs = ZoneCrs::from_epsg(32756).unwrap();
        let (x, y) = crs.project(-27.47, 153.03);
        // Easting near the central meridian, northing carries the false
        // 10,000km offset south of the equator
        assert!(x > 100_000.0 && x < 900_000.0);
        assert!(y > 6_000_000.0 && y < 10_000_000.0);
    }

    #[test]
    fn test_display() {
        let crs = ZoneCrs::from_epsg(28356).unwrap();
        assert_eq!(crs.to_string(), "EPSG:28356");
    }
}
