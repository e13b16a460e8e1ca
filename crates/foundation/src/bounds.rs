use serde::{Deserialize, Serialize};

use crate::math::LonLat;

/// Axis-aligned bounding box in lon/lat degrees.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb2 {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Aabb2 {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        Aabb2 { min, max }
    }

    /// Box spanning two arbitrary corners (e.g. a drag start and end).
    pub fn from_corners(a: LonLat, b: LonLat) -> Self {
        Aabb2 {
            min: [a.lon.min(b.lon), a.lat.min(b.lat)],
            max: [a.lon.max(b.lon), a.lat.max(b.lat)],
        }
    }
}
