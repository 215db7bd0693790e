//! Unified error handling for the trail-profiler library.
//!
//! This module provides a consistent error type for all pipeline operations,
//! replacing mixed error handling patterns (Option, panic, silent failures).
//!
//! Degraded-mode conditions (an empty cloud subset after filtering, a single
//! projection candidate failing) are deliberately *not* variants here: they
//! are logged and the pipeline falls back to best-effort output.

use std::fmt;

/// Unified error type for trail-profiler operations.
#[derive(Debug, Clone, PartialEq)]
pub enum TrailError {
    /// The concatenated track contains no samples
    EmptyPath,
    /// The first sample of a track group lacks elevation data
    MissingElevation { group: usize },
    /// No coordinate-reference candidate placed the path inside the
    /// point cloud's bounds
    NoUsableProjection { candidates_tried: Vec<String> },
    /// Both elevation sources are entirely absent, nothing to fuse
    NoElevationData,
    /// Parallel input sequences have different lengths
    LengthMismatch { track: usize, cloud: usize },
    /// A tunable is out of its valid range
    InvalidConfig { message: String },
}

impl fmt::Display for TrailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrailError::EmptyPath => {
                write!(f, "Track contains no samples")
            }
            TrailError::MissingElevation { group } => {
                write!(
                    f,
                    "First sample of track group {} has no elevation data",
                    group
                )
            }
            TrailError::NoUsableProjection { candidates_tried } => {
                write!(
                    f,
                    "No usable projection found (tried: {})",
                    candidates_tried.join(", ")
                )
            }
            TrailError::NoElevationData => {
                write!(f, "Neither elevation source has any values")
            }
            TrailError::LengthMismatch { track, cloud } => {
                write!(
                    f,
                    "Elevation sequences differ in length: track {} vs cloud {}",
                    track, cloud
                )
            }
            TrailError::InvalidConfig { message } => {
                write!(f, "Configuration error: {}", message)
            }
        }
    }
}

impl std::error::Error for TrailError {}

/// Result type alias for trail-profiler operations.
pub type Result<T> = std::result::Result<T, TrailError>;
