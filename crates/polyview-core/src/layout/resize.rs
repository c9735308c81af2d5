//! Pure resize arithmetic shared by the linear and grid gestures.

use crate::service::ServiceKey;
use std::collections::BTreeMap;

/// Moves the boundary between two adjacent tracks by `delta`.
///
/// Neither side may drop below `min_extent`: a side that would is pinned at
/// the minimum and the other side receives the rest of the pair's combined
/// extent, so `a + b` is always conserved. A pair too small to give both
/// sides the minimum cannot be resized and is returned unchanged.
pub fn clamp_pair(size_a: f64, size_b: f64, delta: f64, min_extent: f64) -> (f64, f64) {
    let total = size_a + size_b;
    if total < 2.0 * min_extent {
        return (size_a, size_b);
    }
    let a = size_a + delta;
    let b = size_b - delta;
    if a < min_extent {
        (min_extent, total - min_extent)
    } else if b < min_extent {
        (total - min_extent, min_extent)
    } else {
        (a, b)
    }
}

/// Flex weights for a resized pair. The pair always carries a combined
/// weight of 2, the same as two untouched siblings of weight 1.
pub fn pair_weights(size_a: f64, size_b: f64) -> (f64, f64) {
    let total = size_a + size_b;
    if total <= 0.0 {
        return (1.0, 1.0);
    }
    (size_a / total * 2.0, size_b / total * 2.0)
}

/// Weights proportional to `extents`, scaled so the smallest is exactly 1.
pub fn normalize_to_smallest(extents: &[(ServiceKey, f64)]) -> BTreeMap<ServiceKey, f64> {
    let smallest = extents
        .iter()
        .map(|(_, extent)| *extent)
        .filter(|extent| *extent > 0.0)
        .fold(f64::INFINITY, f64::min);
    extents
        .iter()
        .map(|(service, extent)| {
            let weight = if smallest.is_finite() && *extent > 0.0 {
                extent / smallest
            } else {
                1.0
            };
            (service.clone(), weight)
        })
        .collect()
}

/// Proportional units for `sizes`, scaled to sum to `sizes.len()`.
///
/// Independent of the container's pixel size, so a record saved at one window
/// size restores correctly at another.
pub fn to_fractions(sizes: &[f64]) -> Vec<f64> {
    let total: f64 = sizes.iter().sum();
    if total <= 0.0 {
        return vec![1.0; sizes.len()];
    }
    let count = sizes.len() as f64;
    sizes.iter().map(|size| size / total * count).collect()
}
