use foundation::Aabb2;
use foundation::math::{LonLat, haversine_m, stable_total_cmp_f64};
use geo::{
    Area, Centroid, Closest, ClosestPoint, Contains, Coord, Geometry as GeoGeometry, Intersects,
    LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon, Rect,
};
use serde::{Deserialize, Serialize};

/// `[lon, lat]` in degrees.
pub type Position = [f64; 2];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryKind {
    Point,
    Line,
    Polygon,
}

/// GeoJSON-shaped geometry. Polygon rings are exterior first, then holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Position),
    MultiPoint(Vec<Position>),
    LineString(Vec<Position>),
    MultiLineString(Vec<Vec<Position>>),
    Polygon(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

impl Geometry {
    pub fn kind(&self) -> GeometryKind {
        match self {
            Geometry::Point(_) | Geometry::MultiPoint(_) => GeometryKind::Point,
            Geometry::LineString(_) | Geometry::MultiLineString(_) => GeometryKind::Line,
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) => GeometryKind::Polygon,
        }
    }

    /// The same shape as a `geo` geometry, x = lon and y = lat.
    pub fn to_geo(&self) -> GeoGeometry<f64> {
        match self {
            Geometry::Point(p) => GeoGeometry::Point(Point::from(coord(p))),
            Geometry::MultiPoint(ps) => GeoGeometry::MultiPoint(MultiPoint::new(
                ps.iter().map(|p| Point::from(coord(p))).collect(),
            )),
            Geometry::LineString(ps) => GeoGeometry::LineString(line(ps)),
            Geometry::MultiLineString(lines) => GeoGeometry::MultiLineString(MultiLineString::new(
                lines.iter().map(|l| line(l)).collect(),
            )),
            Geometry::Polygon(rings) => GeoGeometry::Polygon(polygon(rings)),
            Geometry::MultiPolygon(polys) => GeoGeometry::MultiPolygon(MultiPolygon::new(
                polys.iter().map(|rings| polygon(rings)).collect(),
            )),
        }
    }

    fn polygons(&self) -> Vec<Polygon<f64>> {
        match self {
            Geometry::Polygon(rings) => vec![polygon(rings)],
            Geometry::MultiPolygon(polys) => polys.iter().map(|rings| polygon(rings)).collect(),
            _ => Vec::new(),
        }
    }

    /// Representative point: centroid of the largest polygon by area, the
    /// length-weighted centroid for lines, the mean for points.
    pub fn centroid(&self) -> Option<LonLat> {
        let c = match self.kind() {
            GeometryKind::Polygon => self
                .polygons()
                .into_iter()
                .max_by(|a, b| stable_total_cmp_f64(a.unsigned_area(), b.unsigned_area()))?
                .centroid()?,
            GeometryKind::Point | GeometryKind::Line => self.to_geo().centroid()?,
        };
        Some(LonLat::new(c.x(), c.y()))
    }

    /// Point-in-polygon with holes; always `false` for points and lines.
    pub fn contains(&self, p: LonLat) -> bool {
        let point = Point::new(p.lon, p.lat);
        self.polygons().iter().any(|poly| poly.contains(&point))
    }

    /// Great-circle distance in meters from `p` to the nearest point of the
    /// geometry. Zero inside polygons; `None` for empty geometries.
    pub fn distance_m(&self, p: LonLat) -> Option<f64> {
        if self.contains(p) {
            return Some(0.0);
        }
        match self.to_geo().closest_point(&Point::new(p.lon, p.lat)) {
            Closest::Intersection(q) | Closest::SinglePoint(q) => {
                Some(haversine_m(p, LonLat::new(q.x(), q.y())))
            }
            Closest::Indeterminate => None,
        }
    }

    /// True unless the geometry and `bbox` are disjoint. Touching counts.
    pub fn intersects_bbox(&self, bbox: &Aabb2) -> bool {
        let rect = Rect::new(coord(&bbox.min), coord(&bbox.max));
        self.to_geo().intersects(&rect)
    }
}

fn coord(p: &Position) -> Coord<f64> {
    Coord { x: p[0], y: p[1] }
}

fn line(ps: &[Position]) -> LineString<f64> {
    ps.iter().map(coord).collect()
}

fn polygon(rings: &[Vec<Position>]) -> Polygon<f64> {
    let mut rings = rings.iter().map(|r| line(r));
    let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
    Polygon::new(exterior, rings.collect())
}
