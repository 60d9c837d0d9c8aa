//! Planar containment tests and bounding boxes over GeoJSON-style polygon coordinates.
//!
//! Coordinates are `[lng, lat]` pairs. Rings are tested with the even-odd rule, so holes
//! listed after the outer ring of a polygon are excluded without any special handling.
//! A point lying exactly on an edge may be classified either way.

use serde::{Deserialize, Serialize};

pub type Position = [f64; 2];
pub type Ring = Vec<Position>;

/// An axis-aligned geographic box in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bounds {
    pub min_lng: f64,
    pub max_lng: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl Bounds {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Bounds {
        Bounds {
            min_lng: west,
            max_lng: east,
            min_lat: south,
            max_lat: north,
        }
    }

    pub fn lng_range(&self) -> f64 {
        self.max_lng - self.min_lng
    }

    pub fn lat_range(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// True when every edge is finite and the box encloses a positive area.
    pub fn has_area(&self) -> bool {
        [self.min_lng, self.max_lng, self.min_lat, self.max_lat]
            .iter()
            .all(|v| v.is_finite())
            && self.lng_range() > 0.0
            && self.lat_range() > 0.0
    }

    /// The overlap of two boxes, or `None` when they only touch or are disjoint.
    pub fn intersection(&self, other: &Bounds) -> Option<Bounds> {
        let result = Bounds {
            min_lng: self.min_lng.max(other.min_lng),
            max_lng: self.max_lng.min(other.max_lng),
            min_lat: self.min_lat.max(other.min_lat),
            max_lat: self.max_lat.min(other.max_lat),
        };

        if result.max_lng <= result.min_lng || result.max_lat <= result.min_lat {
            None
        } else {
            Some(result)
        }
    }

    fn extend(&mut self, p: &Position) {
        self.min_lng = self.min_lng.min(p[0]);
        self.max_lng = self.max_lng.max(p[0]);
        self.min_lat = self.min_lat.min(p[1]);
        self.max_lat = self.max_lat.max(p[1]);
    }
}

/// Containment geometry attached to a rule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

impl Geometry {
    pub fn contains(&self, point: Position) -> bool {
        match self {
            Geometry::Polygon(rings) => point_in_polygon(point, rings),
            Geometry::MultiPolygon(polygons) => point_in_multipolygon(point, polygons),
        }
    }

    /// Bounding box of every ring coordinate. `None` if the geometry has no coordinates.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut positions: Box<dyn Iterator<Item = &Position> + '_> = match self {
            Geometry::Polygon(rings) => Box::new(rings.iter().flatten()),
            Geometry::MultiPolygon(polygons) => Box::new(polygons.iter().flatten().flatten()),
        };

        let first = positions.next()?;
        let mut bounds = Bounds::new(first[0], first[1], first[0], first[1]);
        for p in positions {
            bounds.extend(p);
        }

        Some(bounds)
    }
}

/// Even-odd ray casting across every ring of a polygon (outer boundary and holes).
pub fn point_in_polygon(point: Position, rings: &[Ring]) -> bool {
    let [x, y] = point;
    let mut inside = false;

    for ring in rings {
        if ring.is_empty() {
            continue;
        }

        let mut j = ring.len() - 1;
        for i in 0..ring.len() {
            let [xi, yi] = ring[i];
            let [xj, yj] = ring[j];

            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
    }

    inside
}

pub fn point_in_multipolygon(point: Position, polygons: &[Vec<Ring>]) -> bool {
    polygons.iter().any(|rings| point_in_polygon(point, rings))
}
