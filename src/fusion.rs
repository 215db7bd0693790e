//! Elevation fusion: merge track and point-cloud elevation into one
//! gap-free sequence.
//!
//! The track's elevation is complete but noisy; the cloud's is accurate
//! but sparse and contaminated by vegetation returns. Fusion runs four
//! passes, in order:
//!
//! 1. **Spike pruning** — multi-sample canopy plateaus in the cloud
//!    sequence are reinterpolated away,
//! 2. **Clamp and blend** — per sample, a cloud value implausibly above
//!    the track value is replaced by the track value, then the two are
//!    mixed by a fixed weight,
//! 3. **Smoothing** — a centered, edge-clamped moving average suppresses
//!    residual matching noise,
//! 4. **Gap fill** — samples missing from both sources are linearly
//!    interpolated, with flat extrapolation at the ends.
//!
//! The whole fusion is a pure function of the two input sequences and the
//! tunables in [`FusionConfig`]; re-running it is bit-identical.

use crate::error::{Result, TrailError};
use log::debug;
use serde::{Deserialize, Serialize};

/// Tunables for elevation fusion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusionConfig {
    /// A cloud value this far above the track value is treated as a
    /// vegetation artifact and clamped. Default: 3.0 meters
    pub max_gap_m: f64,
    /// Blend weight for the cloud value (track gets `1 - weight`).
    /// Default: 0.7, favoring the surveyed value where trustworthy
    pub cloud_weight: f64,
    /// Moving-average window in samples, edge-clamped. Default: 5
    pub smoothing_window: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            max_gap_m: 3.0,
            cloud_weight: 0.7,
            smoothing_window: 5,
        }
    }
}

/// Fuse parallel track and cloud elevation sequences into one finalized
/// sequence with no missing values.
///
/// Fails with [`TrailError::LengthMismatch`] on unequal input lengths and
/// [`TrailError::NoElevationData`] when both sequences are entirely
/// absent. Any other absence pattern is repaired.
pub fn fuse(
    track: &[Option<f64>],
    cloud: &[Option<f64>],
    config: &FusionConfig,
) -> Result<Vec<f64>> {
    if track.len() != cloud.len() {
        return Err(TrailError::LengthMismatch {
            track: track.len(),
            cloud: cloud.len(),
        });
    }

    // With no cloud values anywhere the fusion is a no-op: the track
    // passes through untouched (gaps still repaired), not smoothed.
    if cloud.iter().all(Option::is_none) {
        return fill_gaps(track);
    }

    let cloud = prune_spikes(cloud, config.max_gap_m);

    let merged: Vec<Option<f64>> = track
        .iter()
        .zip(&cloud)
        .map(|(&t, &c)| match (t, c) {
            (None, None) => None,
            (Some(t), None) => Some(t),
            (None, Some(c)) => Some(c),
            (Some(t), Some(c)) => {
                // Clamp sees raw values; a cloud sample more than max_gap
                // above the track is a canopy return
                let c = if c - t > config.max_gap_m { t } else { c };
                Some(config.cloud_weight * c + (1.0 - config.cloud_weight) * t)
            }
        })
        .collect();

    let smoothed = smooth(&merged, config.smoothing_window);
    fill_gaps(&smoothed)
}

/// Reinterpolate runs of cloud samples that jump more than `max_gap`
/// above the last accepted value.
///
/// Unlike the per-sample clamp, this removes *plateaus*: consecutive
/// returns off a canopy that would each individually pass a pairwise
/// check. The run ends at the first sample back within `max_gap` of the
/// anchor; everything in between (missing samples included) is replaced
/// by the line from anchor to that sample. A run that never ends is left
/// untouched.
pub fn prune_spikes(elevations: &[Option<f64>], max_gap: f64) -> Vec<Option<f64>> {
    let mut pruned = elevations.to_vec();
    let n = pruned.len();
    let mut i = 0;

    while i + 1 < n {
        let Some(current) = pruned[i] else {
            i += 1;
            continue;
        };

        // Next known sample after the anchor
        let mut j = i + 1;
        while j < n && pruned[j].is_none() {
            j += 1;
        }
        let Some(next) = (j < n).then(|| pruned[j]).flatten() else {
            break;
        };

        if next - current > max_gap {
            // Walk to the first sample back near the anchor level
            let mut end = j + 1;
            while end < n && pruned[end].is_none_or(|v| v - current > max_gap) {
                end += 1;
            }
            if let Some(end_val) = (end < n).then(|| pruned[end]).flatten() {
                let span = (end - i) as f64;
                for k in (i + 1)..end {
                    pruned[k] = Some(current + (end_val - current) * (k - i) as f64 / span);
                }
                i = end;
            } else {
                // Spike runs off the end of the data, leave it alone
                i = j;
            }
        } else {
            i = j;
        }
    }

    pruned
}

/// Centered moving average over the known samples of a sequence.
///
/// The window is clamped at the edges. Missing samples stay missing
/// (smoothing never invents values, gap fill does) and do not contribute
/// to their neighbors' averages.
pub fn smooth(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window <= 1 || values.len() < 2 {
        return values.to_vec();
    }
    let half = window / 2;
    let n = values.len();

    values
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            v?;
            let lo = i.saturating_sub(half);
            let hi = (i + half).min(n - 1);
            let known: Vec<f64> = values[lo..=hi].iter().flatten().copied().collect();
            Some(known.iter().sum::<f64>() / known.len() as f64)
        })
        .collect()
}

/// Fill remaining gaps by linear interpolation between the nearest known
/// neighbors; endpoints are held flat to the boundary.
pub fn fill_gaps(values: &[Option<f64>]) -> Result<Vec<f64>> {
    let known: Vec<usize> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.as_ref().map(|_| i))
        .collect();

    if known.is_empty() {
        return Err(TrailError::NoElevationData);
    }
    if known.len() < values.len() {
        debug!(
            "Interpolating {} of {} missing samples",
            values.len() - known.len(),
            values.len()
        );
    }

    let mut filled = Vec::with_capacity(values.len());
    let mut next_known = 0;
    for (i, v) in values.iter().enumerate() {
        if let Some(v) = v {
            filled.push(*v);
            continue;
        }
        while next_known < known.len() && known[next_known] < i {
            next_known += 1;
        }
        let after = known.get(next_known).copied();
        let before = next_known.checked_sub(1).map(|k| known[k]);
        let value = match (before, after) {
            (Some(b), Some(a)) => {
                let vb = values[b].unwrap_or_default();
                let va = values[a].unwrap_or_default();
                vb + (va - vb) * (i - b) as f64 / (a - b) as f64
            }
            (Some(b), None) => values[b].unwrap_or_default(),
            (None, Some(a)) => values[a].unwrap_or_default(),
            (None, None) => unreachable!("known is non-empty"),
        };
        filled.push(value);
    }

    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_correctness() {
        // Cloud 50 sits more than max_gap above track 10: clamped to 10
        // before blending, so the blend is 10 regardless of weight
        let config = FusionConfig {
            max_gap_m: 5.0,
            cloud_weight: 0.7,
            smoothing_window: 1,
        };
        let fused = fuse(&[Some(10.0)], &[Some(50.0)], &config).unwrap();
        assert_eq!(fused, vec![10.0]);
    }

    #[test]
    fn test_blend_weight() {
        let config = FusionConfig {
            max_gap_m: 5.0,
            cloud_weight: 0.7,
            smoothing_window: 1,
        };
        let fused = fuse(&[Some(10.0)], &[Some(12.0)], &config).unwrap();
        assert!((fused[0] - (0.7 * 12.0 + 0.3 * 10.0)).abs() < 1e-9);
    }

    #[test]
    fn test_cloud_absent_is_noop() {
        // No smoothing either: the track passes through unchanged
        let track = vec![Some(10.0), Some(12.0), Some(11.0)];
        let cloud = vec![None, None, None];
        let fused = fuse(&track, &cloud, &FusionConfig::default()).unwrap();
        assert_eq!(fused, vec![10.0, 12.0, 11.0]);
    }

    #[test]
    fn test_totality_with_mixed_gaps() {
        let track = vec![Some(10.0), None, None, Some(13.0), None];
        let cloud = vec![None, Some(11.0), None, None, None];
        let fused = fuse(&track, &cloud, &FusionConfig::default()).unwrap();
        assert_eq!(fused.len(), 5);
        assert!(fused.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_both_absent_everywhere_fails() {
        let absent = vec![None, None, None];
        assert_eq!(
            fuse(&absent, &absent, &FusionConfig::default()),
            Err(TrailError::NoElevationData)
        );
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let result = fuse(&[Some(1.0)], &[None, None], &FusionConfig::default());
        assert!(matches!(result, Err(TrailError::LengthMismatch { .. })));
    }

    #[test]
    fn test_prune_spikes_removes_plateau() {
        // Canopy plateau of three samples ~20m above ground level
        let cloud = vec![
            Some(10.0),
            Some(30.0),
            Some(31.0),
            Some(29.0),
            Some(11.0),
            Some(10.5),
        ];
        let pruned = prune_spikes(&cloud, 5.0);
        // Interior samples replaced by the line from 10 to 11
        assert_eq!(pruned[0], Some(10.0));
        assert_eq!(pruned[4], Some(11.0));
        for k in 1..4 {
            let expected = 10.0 + (11.0 - 10.0) * k as f64 / 4.0;
            assert!((pruned[k].unwrap() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_prune_spikes_keeps_real_climb() {
        // A sustained climb never comes back down: left untouched
        let cloud = vec![Some(10.0), Some(20.0), Some(30.0), Some(40.0)];
        let pruned = prune_spikes(&cloud, 5.0);
        assert_eq!(pruned, cloud);
    }

    #[test]
    fn test_prune_spikes_interpolates_across_missing() {
        let cloud = vec![Some(10.0), Some(30.0), None, Some(10.0)];
        let pruned = prune_spikes(&cloud, 5.0);
        assert!(pruned.iter().all(|v| v.is_some()));
        assert_eq!(pruned[3], Some(10.0));
    }

    #[test]
    fn test_smooth_window_averages_neighbors() {
        let values = vec![Some(0.0), Some(3.0), Some(0.0)];
        let smoothed = smooth(&values, 3);
        assert_eq!(smoothed[1], Some(1.0));
        // Edge-clamped: first sample averages itself and its right neighbor
        assert_eq!(smoothed[0], Some(1.5));
    }

    #[test]
    fn test_smooth_preserves_gaps() {
        let values = vec![Some(1.0), None, Some(3.0)];
        let smoothed = smooth(&values, 3);
        assert_eq!(smoothed[1], None);
        assert_eq!(smoothed[0], Some(2.0));
    }

    #[test]
    fn test_fill_gaps_interpolates_and_extrapolates() {
        let values = vec![None, Some(10.0), None, None, Some(16.0), None];
        let filled = fill_gaps(&values).unwrap();
        assert_eq!(filled, vec![10.0, 10.0, 12.0, 14.0, 16.0, 16.0]);
    }

    #[test]
    fn test_fusion_is_deterministic() {
        let track = vec![Some(10.0), None, Some(12.0), Some(11.0)];
        let cloud = vec![Some(10.5), Some(11.0), None, Some(11.2)];
        let a = fuse(&track, &cloud, &FusionConfig::default()).unwrap();
        let b = fuse(&track, &cloud, &FusionConfig::default()).unwrap();
        assert_eq!(a, b);
    }
}
