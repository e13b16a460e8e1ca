use std::cmp::Ordering;

use foundation::math::{LonLat, haversine_m, stable_total_cmp_f64};

use crate::geometry::GeometryKind;
use crate::source::Feature;

/// Chooses the feature a click refers to.
pub trait HitStrategy {
    /// Index into `features` of the hit, or `None` for an empty slice.
    fn pick(&self, features: &[Feature], point: LonLat) -> Option<usize>;
}

/// Tiered hit test with a fixed distance threshold.
///
/// Ordering contract:
/// 1. The first polygon (in source order) containing the point.
/// 2. Else the nearest point feature within `threshold_m`.
/// 3. Else the nearest line feature within `threshold_m`.
/// 4. Else the feature whose centroid is nearest.
///
/// Distance ties go to the lower index.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ThresholdHitStrategy {
    pub threshold_m: f64,
}

impl Default for ThresholdHitStrategy {
    fn default() -> Self {
        Self { threshold_m: 50.0 }
    }
}

impl ThresholdHitStrategy {
    pub fn new(threshold_m: f64) -> Self {
        Self { threshold_m }
    }

    fn nearest_within(&self, features: &[Feature], point: LonLat, kind: GeometryKind) -> Option<usize> {
        nearest(features.iter().enumerate().filter_map(|(i, f)| {
            if f.geometry.kind() != kind {
                return None;
            }
            let d = f.geometry.distance_m(point)?;
            (d <= self.threshold_m).then_some((i, d))
        }))
    }
}

impl HitStrategy for ThresholdHitStrategy {
    fn pick(&self, features: &[Feature], point: LonLat) -> Option<usize> {
        if let Some(i) = features
            .iter()
            .position(|f| f.geometry.kind() == GeometryKind::Polygon && f.geometry.contains(point))
        {
            return Some(i);
        }
        self.nearest_within(features, point, GeometryKind::Point)
            .or_else(|| self.nearest_within(features, point, GeometryKind::Line))
            .or_else(|| {
                nearest(features.iter().enumerate().filter_map(|(i, f)| {
                    let c = f.geometry.centroid()?;
                    Some((i, haversine_m(point, c)))
                }))
            })
    }
}

fn nearest(candidates: impl Iterator<Item = (usize, f64)>) -> Option<usize> {
    candidates
        .min_by(|a, b| match stable_total_cmp_f64(a.1, b.1) {
            Ordering::Equal => a.0.cmp(&b.0),
            ord => ord,
        })
        .map(|(i, _)| i)
}
