//! Geometry helpers for bound extraction, built on the `geo` crate.
//!
//! Covers what the index needs beyond plain envelopes: splitting shapes that
//! cross the antimeridian, densifying bounding boxes, buffering `DWITHIN`
//! literals in degrees, detecting axis-aligned rectangles and subtracting
//! rectangles from the world.

use geo::{
    BooleanOps, BoundingRect, Coord, Distance, Euclidean, Geometry, Haversine, LineString,
    Polygon, Rect, Translate, coord,
};
use spatio_keyspace_types::extent::{WORLD_MAX_X, WORLD_MAX_Y, WORLD_MIN_X, WORLD_MIN_Y};
use std::fmt;

/// Meters per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Bounding box edges longer than this many degrees get intermediate points.
pub const WAYPOINT_SPACING: f64 = 10.0;

/// Meters per degree along a meridian on the haversine sphere; slightly
/// below [`METERS_PER_DEGREE`] so buffers cover both distance measures.
const MERIDIAN_METERS_PER_DEGREE: f64 = 111_195.0;

/// Distance units accepted by `DWITHIN`.
#[derive(Debug, Clone, PartialEq)]
pub enum DistanceUnit {
    Meters,
    Kilometers,
    Feet,
    StatuteMiles,
    NauticalMiles,
    /// Unrecognised unit name; treated as meters.
    Other(String),
}

impl DistanceUnit {
    /// Parse a unit name as written in filter text.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "m" | "meter" | "meters" | "metre" | "metres" => Self::Meters,
            "km" | "kilometer" | "kilometers" | "kilometre" | "kilometres" => Self::Kilometers,
            "ft" | "feet" | "foot" => Self::Feet,
            "mi" | "mile" | "miles" | "statute miles" => Self::StatuteMiles,
            "nm" | "nautical mile" | "nautical miles" => Self::NauticalMiles,
            _ => Self::Other(name.to_string()),
        }
    }

    pub fn meters_multiplier(&self) -> f64 {
        match self {
            Self::Meters => 1.0,
            Self::Kilometers => 1000.0,
            Self::Feet => 0.3048,
            Self::StatuteMiles => 1609.347,
            Self::NauticalMiles => 1852.0,
            Self::Other(name) => {
                log::warn!("Unknown distance unit '{}', assuming meters", name);
                1.0
            }
        }
    }

    pub fn to_meters(&self, distance: f64) -> f64 {
        distance * self.meters_multiplier()
    }
}

impl fmt::Display for DistanceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Meters => "meters",
            Self::Kilometers => "kilometers",
            Self::Feet => "feet",
            Self::StatuteMiles => "statute miles",
            Self::NauticalMiles => "nautical miles",
            Self::Other(name) => name,
        };
        f.write_str(name)
    }
}

impl From<&str> for DistanceUnit {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

/// Distance between two lon/lat geometries in meters.
///
/// Point pairs use the Haversine formula; anything else falls back to the
/// planar distance in degrees scaled by [`METERS_PER_DEGREE`].
pub fn distance_meters(a: &Geometry, b: &Geometry) -> f64 {
    match (a, b) {
        (Geometry::Point(p), Geometry::Point(q)) => Haversine.distance(*p, *q),
        _ => Euclidean.distance(a, b) * METERS_PER_DEGREE,
    }
}

pub fn world_rect() -> Rect {
    rect(WORLD_MIN_X, WORLD_MIN_Y, WORLD_MAX_X, WORLD_MAX_Y)
}

pub fn world() -> Geometry {
    Geometry::Rect(world_rect())
}

fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Rect {
    Rect::new(coord! { x: min_x, y: min_y }, coord! { x: max_x, y: max_y })
}

/// Intersection of two rectangles; touching rectangles yield a degenerate one.
pub fn intersect_rects(a: &Rect, b: &Rect) -> Option<Rect> {
    let min_x = a.min().x.max(b.min().x);
    let min_y = a.min().y.max(b.min().y);
    let max_x = a.max().x.min(b.max().x);
    let max_y = a.max().y.min(b.max().y);
    (min_x <= max_x && min_y <= max_y).then(|| rect(min_x, min_y, max_x, max_y))
}

/// Split collections and multi-geometries into their simple parts.
pub fn flatten(geometry: &Geometry) -> Vec<Geometry> {
    match geometry {
        Geometry::GeometryCollection(gc) => gc.0.iter().flat_map(flatten).collect(),
        Geometry::MultiPoint(mp) => mp.0.iter().copied().map(Geometry::Point).collect(),
        Geometry::MultiLineString(ml) => ml.0.iter().cloned().map(Geometry::LineString).collect(),
        Geometry::MultiPolygon(mp) => mp.0.iter().cloned().map(Geometry::Polygon).collect(),
        other => vec![other.clone()],
    }
}

/// Polygon for a bounding box, with waypoints every [`WAYPOINT_SPACING`]
/// degrees along its edges.
///
/// Without waypoints a box wider than 180 degrees is ambiguous once it is
/// reprojected or split, since the short way round is the other side of the
/// globe.
pub fn bbox_polygon(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Polygon {
    let corners = [
        coord! { x: min_x, y: min_y },
        coord! { x: max_x, y: min_y },
        coord! { x: max_x, y: max_y },
        coord! { x: min_x, y: max_y },
    ];
    let mut ring = Vec::new();
    for (i, from) in corners.iter().enumerate() {
        push_edge(*from, corners[(i + 1) % corners.len()], &mut ring);
    }
    Polygon::new(LineString::new(ring), Vec::new())
}

fn push_edge(from: Coord, to: Coord, out: &mut Vec<Coord>) {
    let length = (to.x - from.x).abs().max((to.y - from.y).abs());
    let steps = (length / WAYPOINT_SPACING).ceil().max(1.0) as usize;
    for step in 0..steps {
        let f = step as f64 / steps as f64;
        out.push(coord! {
            x: from.x + (to.x - from.x) * f,
            y: from.y + (to.y - from.y) * f,
        });
    }
}

/// The rectangle a geometry covers exactly, if it is an axis-aligned
/// rectangle.
///
/// A polygon qualifies when it has no holes and every edge runs along a side
/// of its envelope, so densified boxes from [`bbox_polygon`] are rectangles
/// too.
pub fn rectangle_of(geometry: &Geometry) -> Option<Rect> {
    match geometry {
        Geometry::Rect(r) => Some(*r),
        Geometry::Polygon(p) => polygon_rectangle(p),
        _ => None,
    }
}

fn polygon_rectangle(polygon: &Polygon) -> Option<Rect> {
    if !polygon.interiors().is_empty() {
        return None;
    }
    let envelope = polygon.bounding_rect()?;
    if envelope.width() == 0.0 || envelope.height() == 0.0 {
        return None;
    }

    let (min, max) = (envelope.min(), envelope.max());
    let on_side = |line: geo::Line| {
        if line.start.y == line.end.y {
            line.start.y == min.y || line.start.y == max.y
        } else if line.start.x == line.end.x {
            line.start.x == min.x || line.start.x == max.x
        } else {
            false
        }
    };
    polygon.exterior().lines().all(on_side).then_some(envelope)
}

/// Grow a geometry's envelope by `meters` in every direction.
///
/// Latitude uses a fixed meters-per-degree factor; longitude is widened by the
/// cosine of the highest latitude the buffer reaches, so the result always
/// covers the true buffer. A buffer reaching a pole covers every longitude.
pub fn buffer_envelope(geometry: &Geometry, meters: f64) -> Option<Geometry> {
    let envelope = geometry.bounding_rect()?;
    let dy = meters.max(0.0) / MERIDIAN_METERS_PER_DEGREE;
    let min_y = envelope.min().y - dy;
    let max_y = envelope.max().y + dy;

    let max_lat = min_y.abs().max(max_y.abs());
    let dx = if max_lat >= WORLD_MAX_Y {
        None
    } else {
        Some(dy / max_lat.to_radians().cos()).filter(|dx| dx.is_finite() && *dx < 180.0)
    };
    let (min_x, max_x) = match dx {
        Some(dx) => (envelope.min().x - dx, envelope.max().x + dx),
        None => (WORLD_MIN_X, WORLD_MAX_X),
    };

    Some(Geometry::Rect(rect(
        min_x,
        min_y.max(WORLD_MIN_Y),
        max_x,
        max_y.min(WORLD_MAX_Y),
    )))
}

/// Split a geometry whose longitudes leave [-180, 180] into pieces that
/// don't, shifting each piece back into the world window.
///
/// Rectangles are cut exactly, polygons are clipped, and other geometries
/// are carried as their envelope.
pub fn split_antimeridian(geometry: Geometry) -> Vec<Geometry> {
    let Some(envelope) = geometry.bounding_rect() else {
        return Vec::new();
    };
    if envelope.min().x >= WORLD_MIN_X && envelope.max().x <= WORLD_MAX_X {
        return vec![geometry];
    }
    if envelope.width() >= 360.0 {
        return vec![Geometry::Rect(rect(
            WORLD_MIN_X,
            envelope.min().y,
            WORLD_MAX_X,
            envelope.max().y,
        ))];
    }

    let first = ((envelope.min().x - WORLD_MIN_X) / 360.0).floor() as i64;
    let last = ((envelope.max().x - WORLD_MAX_X) / 360.0).ceil() as i64;
    let rectangle = rectangle_of(&geometry);

    (first..=last)
        .filter_map(|k| {
            let shift = 360.0 * k as f64;
            let window = rect(
                WORLD_MIN_X + shift,
                envelope.min().y,
                WORLD_MAX_X + shift,
                envelope.max().y,
            );
            let piece = match (&rectangle, &geometry) {
                (Some(r), _) => intersect_rects(r, &window).map(Geometry::Rect),
                (None, Geometry::Polygon(p)) => clip(p.intersection(&window.to_polygon())),
                (None, Geometry::MultiPolygon(mp)) => clip(mp.intersection(&window.to_polygon())),
                (None, _) => intersect_rects(&envelope, &window).map(Geometry::Rect),
            };
            piece.map(|p| p.translate(-shift, 0.0))
        })
        .collect()
}

fn clip(clipped: geo::MultiPolygon) -> Option<Geometry> {
    (!clipped.0.is_empty()).then_some(Geometry::MultiPolygon(clipped))
}

/// The world minus a rectangle, as up to four rectangles.
pub fn world_minus(hole: &Rect) -> Vec<Geometry> {
    let Some(hole) = intersect_rects(hole, &world_rect()) else {
        return vec![world()];
    };
    let (min, max) = (hole.min(), hole.max());

    let mut pieces = Vec::with_capacity(4);
    if min.x > WORLD_MIN_X {
        pieces.push(rect(WORLD_MIN_X, WORLD_MIN_Y, min.x, WORLD_MAX_Y));
    }
    if max.x < WORLD_MAX_X {
        pieces.push(rect(max.x, WORLD_MIN_Y, WORLD_MAX_X, WORLD_MAX_Y));
    }
    if min.y > WORLD_MIN_Y {
        pieces.push(rect(min.x, WORLD_MIN_Y, max.x, min.y));
    }
    if max.y < WORLD_MAX_Y {
        pieces.push(rect(min.x, max.y, max.x, WORLD_MAX_Y));
    }
    pieces.into_iter().map(Geometry::Rect).collect()
}
