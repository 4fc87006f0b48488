use geo::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Longitude / latitude limits of the indexed world.
pub const WORLD_MIN_X: f64 = -180.0;
pub const WORLD_MAX_X: f64 = 180.0;
pub const WORLD_MIN_Y: f64 = -90.0;
pub const WORLD_MAX_Y: f64 = 90.0;

/// An axis-aligned bounding box extracted from a spatial predicate.
///
/// Extents never wrap the antimeridian: a query region crossing it is carried
/// as two extents, one ending at 180 and one starting at -180.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryExtent {
    /// The underlying geometric rectangle
    pub rect: Rect,
}

impl GeometryExtent {
    /// Create a new extent from minimum and maximum coordinates.
    ///
    /// # Examples
    ///
    /// ```
    /// use spatio_keyspace_types::extent::GeometryExtent;
    ///
    /// let extent = GeometryExtent::new(-74.0, 40.7, -73.9, 40.8);
    /// assert!(extent.width() > 0.0);
    /// ```
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            rect: Rect::new(
                geo::coord! { x: min_x, y: min_y },
                geo::coord! { x: max_x, y: max_y },
            ),
        }
    }

    /// Create an extent from a `geo::Rect`.
    pub fn from_rect(rect: Rect) -> Self {
        Self { rect }
    }

    /// The whole indexed world.
    pub fn world() -> Self {
        Self::new(WORLD_MIN_X, WORLD_MIN_Y, WORLD_MAX_X, WORLD_MAX_Y)
    }

    pub fn min_x(&self) -> f64 {
        self.rect.min().x
    }

    pub fn min_y(&self) -> f64 {
        self.rect.min().y
    }

    pub fn max_x(&self) -> f64 {
        self.rect.max().x
    }

    pub fn max_y(&self) -> f64 {
        self.rect.max().y
    }

    pub fn width(&self) -> f64 {
        self.max_x() - self.min_x()
    }

    pub fn height(&self) -> f64 {
        self.max_y() - self.min_y()
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x() + self.max_x()) / 2.0,
            (self.min_y() + self.max_y()) / 2.0,
        )
    }

    /// Check if a point is contained within this extent (edges included).
    pub fn contains_point(&self, point: &Point) -> bool {
        point.x() >= self.min_x()
            && point.x() <= self.max_x()
            && point.y() >= self.min_y()
            && point.y() <= self.max_y()
    }

    /// Check if this extent intersects with another.
    pub fn intersects(&self, other: &GeometryExtent) -> bool {
        !(self.max_x() < other.min_x()
            || self.min_x() > other.max_x()
            || self.max_y() < other.min_y()
            || self.min_y() > other.max_y())
    }

    /// The overlapping part of two extents, if any.
    pub fn intersection(&self, other: &GeometryExtent) -> Option<GeometryExtent> {
        if !self.intersects(other) {
            return None;
        }
        Some(Self::new(
            self.min_x().max(other.min_x()),
            self.min_y().max(other.min_y()),
            self.max_x().min(other.max_x()),
            self.max_y().min(other.max_y()),
        ))
    }

    /// Check whether this extent lies entirely within `other`.
    pub fn within(&self, other: &GeometryExtent) -> bool {
        self.min_x() >= other.min_x()
            && self.max_x() <= other.max_x()
            && self.min_y() >= other.min_y()
            && self.max_y() <= other.max_y()
    }

    /// Clamp to the world bounds, or `None` if nothing is left.
    pub fn clip_to_world(&self) -> Option<GeometryExtent> {
        self.intersection(&Self::world())
    }

    pub fn is_world(&self) -> bool {
        self.min_x() <= WORLD_MIN_X
            && self.max_x() >= WORLD_MAX_X
            && self.min_y() <= WORLD_MIN_Y
            && self.max_y() >= WORLD_MAX_Y
    }

    /// Expand the extent by a given amount in all directions.
    pub fn expand(&self, amount: f64) -> Self {
        Self::new(
            self.min_x() - amount,
            self.min_y() - amount,
            self.max_x() + amount,
            self.max_y() + amount,
        )
    }
}

impl From<Rect> for GeometryExtent {
    fn from(rect: Rect) -> Self {
        Self::from_rect(rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_dimensions() {
        let extent = GeometryExtent::new(0.0, 0.0, 10.0, 5.0);
        assert_eq!(extent.width(), 10.0);
        assert_eq!(extent.height(), 5.0);
        assert_eq!(extent.center(), Point::new(5.0, 2.5));
    }

    #[test]
    fn test_extent_contains_edges() {
        let extent = GeometryExtent::new(0.0, 0.0, 10.0, 10.0);
        assert!(extent.contains_point(&Point::new(0.0, 0.0)));
        assert!(extent.contains_point(&Point::new(10.0, 10.0)));
        assert!(!extent.contains_point(&Point::new(-1.0, 5.0)));
    }

    #[test]
    fn test_extent_intersection() {
        let a = GeometryExtent::new(0.0, 0.0, 10.0, 10.0);
        let b = GeometryExtent::new(5.0, 5.0, 15.0, 15.0);
        let c = GeometryExtent::new(20.0, 20.0, 30.0, 30.0);

        assert_eq!(
            a.intersection(&b),
            Some(GeometryExtent::new(5.0, 5.0, 10.0, 10.0))
        );
        assert_eq!(a.intersection(&c), None);
    }

    #[test]
    fn test_clip_to_world() {
        let extent = GeometryExtent::new(170.0, 80.0, 200.0, 100.0);
        assert_eq!(
            extent.clip_to_world(),
            Some(GeometryExtent::new(170.0, 80.0, 180.0, 90.0))
        );
        assert!(GeometryExtent::world().is_world());
    }

    #[test]
    fn test_extent_expand() {
        let expanded = GeometryExtent::new(0.0, 0.0, 10.0, 10.0).expand(5.0);
        assert_eq!(expanded, GeometryExtent::new(-5.0, -5.0, 15.0, 15.0));
    }
}
