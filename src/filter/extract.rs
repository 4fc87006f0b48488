//! Extraction of index bounds from filter trees.
//!
//! Extraction never fails. Anything that cannot be analysed widens the
//! result: an unrelated predicate contributes no constraint, and a predicate
//! on the attribute that cannot be turned into bounds yields the full domain
//! flagged as imprecise.

use super::{CompareOp, Expr, Filter, SpatialOp, TemporalOp};
use crate::geometry::{self, intersect_rects, rectangle_of};
use crate::record::Value;
use chrono::{DateTime, Utc};
use geo::{BoundingRect, Geometry, Rect};
use spatio_keyspace_types::bounds::Bound;
use spatio_keyspace_types::{FilterValues, GeometryExtent, Interval};

/// A value type bounds can be extracted for.
pub trait BoundValue: Ord + Clone + Sized {
    /// Convert a filter literal, `None` if it has the wrong type.
    fn from_value(value: &Value) -> Option<Self>;

    /// Convert a temporal literal.
    fn from_date(_date: DateTime<Utc>) -> Option<Self> {
        None
    }

    /// Range of values starting with `prefix`, for `LIKE 'prefix%'`.
    fn prefix_range(_prefix: &str) -> Option<Interval<Self>> {
        None
    }
}

impl BoundValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_date()
    }

    fn from_date(date: DateTime<Utc>) -> Option<Self> {
        Some(date)
    }
}

impl BoundValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_i64()
    }
}

impl BoundValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }

    fn prefix_range(prefix: &str) -> Option<Interval<Self>> {
        // smallest string above every extension of the prefix
        let mut upper: Vec<char> = prefix.chars().collect();
        while let Some(last) = upper.pop() {
            if let Some(next) = (last as u32 + 1..=char::MAX as u32).find_map(char::from_u32) {
                upper.push(next);
                return Interval::new(
                    Bound::inclusive(prefix.to_string()),
                    Bound::exclusive(upper.into_iter().collect()),
                );
            }
        }
        Some(Interval::at_least(prefix.to_string()))
    }
}

/// How the operands of a binary predicate relate to the target attribute.
enum Operands<'a> {
    /// `attribute OP literal`
    Forward(&'a Value),
    /// `literal OP attribute`
    Reversed(&'a Value),
    /// Attribute on neither side, on both sides, or compared to a computed
    /// value.
    Unconstrained,
    /// The attribute is wrapped in a function.
    Opaque,
}

fn operands<'a>(attribute: &str, left: &'a Expr, right: &'a Expr) -> Operands<'a> {
    let wrapped = |e: &Expr| matches!(e, Expr::Function { .. }) && e.references(attribute);
    if wrapped(left) || wrapped(right) {
        return Operands::Opaque;
    }
    match (left, right) {
        (Expr::Property(name), Expr::Literal(value)) if name == attribute => {
            Operands::Forward(value)
        }
        (Expr::Literal(value), Expr::Property(name)) if name == attribute => {
            Operands::Reversed(value)
        }
        _ => Operands::Unconstrained,
    }
}

/// Check whether a leaf predicate reads `attribute`.
fn leaf_references(filter: &Filter, attribute: &str) -> bool {
    match filter {
        Filter::Compare { left, right, .. }
        | Filter::Spatial { left, right, .. }
        | Filter::Temporal { left, right, .. } => {
            left.references(attribute) || right.references(attribute)
        }
        Filter::Between { expr, lower, upper } => {
            expr.references(attribute) || lower.references(attribute) || upper.references(attribute)
        }
        Filter::Like { expr, .. } | Filter::BBox { expr, .. } | Filter::IsNull(expr) => {
            expr.references(attribute)
        }
        Filter::Include | Filter::Exclude | Filter::And(_) | Filter::Or(_) | Filter::Not(_) => {
            false
        }
    }
}

fn unconvertible<T>(filter: &Filter, value: &Value) -> FilterValues<T> {
    log::warn!(
        "Ignoring predicate '{}': cannot convert literal {} for bound extraction",
        filter,
        value
    );
    FilterValues::unknown()
}

/// Extract the values `attribute` may take for `filter` to match.
///
/// The binding is the type parameter: `DateTime<Utc>` for dates, `i64` for
/// integers and `String` for strings.
pub fn extract_attribute_bounds<T: BoundValue>(
    filter: &Filter,
    attribute: &str,
) -> FilterValues<Interval<T>> {
    match filter {
        Filter::Include => FilterValues::empty(),
        Filter::Exclude => FilterValues::disjoint(),
        Filter::And(children) => children.iter().fold(FilterValues::empty(), |acc, child| {
            acc.and(extract_attribute_bounds(child, attribute))
        }),
        Filter::Or(children) => children.iter().fold(FilterValues::disjoint(), |acc, child| {
            acc.or(extract_attribute_bounds(child, attribute))
        }),
        Filter::Not(child) => {
            let inner = extract_attribute_bounds::<T>(child, attribute);
            if !inner.precise {
                log::warn!(
                    "Cannot invert imprecise bounds on '{}' for NOT {}; scanning the whole attribute range",
                    attribute,
                    child
                );
            }
            if inner.precise && !inner.exact {
                log::debug!(
                    "NOT {} depends on more than '{}'; no constraint extracted",
                    child,
                    attribute
                );
            }
            inner.complement()
        }
        Filter::Compare { op, left, right } => match operands(attribute, left, right) {
            Operands::Forward(value) => compare_bounds(*op, value, filter),
            Operands::Reversed(value) => compare_bounds(op.flip(), value, filter),
            Operands::Unconstrained => FilterValues::unknown(),
            Operands::Opaque => FilterValues::everything_imprecise(),
        },
        Filter::Between { expr, lower, upper } => {
            if !expr.references(attribute) {
                return FilterValues::unknown();
            }
            if !expr.is_property(attribute) {
                return FilterValues::everything_imprecise();
            }
            let (Some(lower), Some(upper)) = (lower.as_literal(), upper.as_literal()) else {
                return FilterValues::unknown();
            };
            match (T::from_value(lower), T::from_value(upper)) {
                (Some(l), Some(u)) => Interval::closed(l, u)
                    .map(|i| FilterValues::new(vec![i]))
                    .unwrap_or_else(FilterValues::disjoint),
                (None, _) => unconvertible(filter, lower),
                (_, None) => unconvertible(filter, upper),
            }
        }
        Filter::Like {
            expr,
            pattern,
            match_case,
        } => {
            if !expr.references(attribute) {
                return FilterValues::unknown();
            }
            if !expr.is_property(attribute) {
                return FilterValues::everything_imprecise();
            }
            if !match_case {
                return FilterValues::unknown();
            }
            like_prefix(pattern)
                .and_then(T::prefix_range)
                .map(|i| FilterValues::new(vec![i]))
                .unwrap_or_default()
        }
        Filter::Temporal { op, left, right } => match operands(attribute, left, right) {
            Operands::Forward(value) => temporal_bounds(*op, value, filter),
            Operands::Reversed(value) => match op {
                TemporalOp::During => FilterValues::unknown(),
                _ => temporal_bounds(op.flip(), value, filter),
            },
            Operands::Unconstrained => FilterValues::unknown(),
            Operands::Opaque => FilterValues::everything_imprecise(),
        },
        Filter::Spatial { .. } | Filter::BBox { .. } | Filter::IsNull(_) => {
            if leaf_references(filter, attribute) {
                FilterValues::everything_imprecise()
            } else {
                FilterValues::unknown()
            }
        }
    }
}

/// Time intervals for the date attribute `dtg`.
pub fn extract_intervals(filter: &Filter, dtg: &str) -> FilterValues<Interval<DateTime<Utc>>> {
    extract_attribute_bounds(filter, dtg)
}

fn compare_bounds<T: BoundValue>(
    op: CompareOp,
    value: &Value,
    filter: &Filter,
) -> FilterValues<Interval<T>> {
    let Some(v) = T::from_value(value) else {
        return unconvertible(filter, value);
    };
    let interval = match op {
        CompareOp::Eq => Interval::point(v),
        CompareOp::NotEq => return FilterValues::new(vec![Interval::point(v)]).complement(),
        CompareOp::Lt => Interval::less_than(v),
        CompareOp::Le => Interval::at_most(v),
        CompareOp::Gt => Interval::greater_than(v),
        CompareOp::Ge => Interval::at_least(v),
    };
    FilterValues::new(vec![interval])
}

fn temporal_bounds<T: BoundValue>(
    op: TemporalOp,
    value: &Value,
    filter: &Filter,
) -> FilterValues<Interval<T>> {
    let instant = |v: &Value| match v {
        Value::Period(start, end) => match op {
            TemporalOp::After => T::from_date(*end),
            _ => T::from_date(*start),
        },
        other => T::from_value(other),
    };

    let interval = match op {
        TemporalOp::During => {
            let Value::Period(start, end) = value else {
                return unconvertible(filter, value);
            };
            match (T::from_date(*start), T::from_date(*end)) {
                (Some(s), Some(e)) => match Interval::open(s, e) {
                    Some(i) => i,
                    None => return FilterValues::disjoint(),
                },
                _ => return unconvertible(filter, value),
            }
        }
        TemporalOp::Before => match instant(value) {
            Some(v) => Interval::less_than(v),
            None => return unconvertible(filter, value),
        },
        TemporalOp::After => match instant(value) {
            Some(v) => Interval::greater_than(v),
            None => return unconvertible(filter, value),
        },
        TemporalOp::TEquals => match instant(value) {
            Some(v) => Interval::point(v),
            None => return unconvertible(filter, value),
        },
    };
    FilterValues::new(vec![interval])
}

/// The literal prefix of a `prefix%` pattern with no other wildcard.
fn like_prefix(pattern: &str) -> Option<&str> {
    let prefix = pattern.strip_suffix('%')?;
    (!prefix.is_empty() && !prefix.contains(['%', '_'])).then_some(prefix)
}

fn world_imprecise() -> FilterValues<Geometry> {
    FilterValues::new(vec![geometry::world()]).with_precise(false)
}

/// Extract the regions the geometry attribute must intersect for `filter`
/// to match.
///
/// Returned geometries never cross the antimeridian. Intersections of
/// axis-aligned rectangles are exact; any other intersection falls back to
/// envelopes and is flagged imprecise.
pub fn extract_geometries(filter: &Filter, attribute: &str) -> FilterValues<Geometry> {
    match filter {
        Filter::Include => FilterValues::empty(),
        Filter::Exclude => FilterValues::disjoint(),
        Filter::And(children) => children.iter().fold(FilterValues::empty(), |acc, child| {
            and_geometries(acc, extract_geometries(child, attribute))
        }),
        Filter::Or(children) => children.iter().fold(FilterValues::disjoint(), |acc, child| {
            acc.or_with(extract_geometries(child, attribute), |values| values)
        }),
        Filter::Not(child) => invert_geometries(extract_geometries(child, attribute), child),
        Filter::Spatial { op, left, right } => match operands(attribute, left, right) {
            Operands::Forward(value) => spatial_geometries(op.clone(), value, filter),
            Operands::Reversed(value) => spatial_geometries(op.clone().flip(), value, filter),
            Operands::Unconstrained => FilterValues::unknown(),
            Operands::Opaque => world_imprecise(),
        },
        Filter::BBox {
            expr,
            min_x,
            min_y,
            max_x,
            max_y,
        } => {
            if !expr.references(attribute) {
                return FilterValues::unknown();
            }
            if !expr.is_property(attribute) {
                return world_imprecise();
            }
            bbox_geometries(*min_x, *min_y, *max_x, *max_y)
        }
        Filter::Compare { .. }
        | Filter::Between { .. }
        | Filter::Like { .. }
        | Filter::Temporal { .. }
        | Filter::IsNull(_) => {
            if leaf_references(filter, attribute) {
                world_imprecise()
            } else {
                FilterValues::unknown()
            }
        }
    }
}

fn spatial_geometries(op: SpatialOp, value: &Value, filter: &Filter) -> FilterValues<Geometry> {
    let Some(literal) = value.as_geometry() else {
        return unconvertible(filter, value);
    };
    let (region, precise) = match op {
        SpatialOp::Intersects | SpatialOp::Within => (literal.clone(), true),
        SpatialOp::Contains | SpatialOp::Overlaps => (literal.clone(), false),
        SpatialOp::DWithin { distance, units } => {
            match geometry::buffer_envelope(literal, units.to_meters(distance)) {
                Some(buffered) => (buffered, false),
                None => return unconvertible(filter, value),
            }
        }
    };

    let pieces: Vec<Geometry> = geometry::flatten(&region)
        .into_iter()
        .flat_map(geometry::split_antimeridian)
        .collect();
    if pieces.is_empty() {
        return FilterValues::disjoint();
    }
    FilterValues::new(pieces).with_precise(precise)
}

fn bbox_geometries(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> FilterValues<Geometry> {
    if min_y > max_y {
        return FilterValues::disjoint();
    }
    let boxes = if min_x > max_x {
        vec![
            geometry::bbox_polygon(min_x, min_y, geometry::world_rect().max().x, max_y),
            geometry::bbox_polygon(geometry::world_rect().min().x, min_y, max_x, max_y),
        ]
    } else {
        vec![geometry::bbox_polygon(min_x, min_y, max_x, max_y)]
    };
    FilterValues::new(
        boxes
            .into_iter()
            .map(Geometry::Polygon)
            .flat_map(geometry::split_antimeridian)
            .collect(),
    )
}

fn and_geometries(a: FilterValues<Geometry>, b: FilterValues<Geometry>) -> FilterValues<Geometry> {
    let rectangular = a.is_empty()
        || b.is_empty()
        || a.iter().chain(b.iter()).all(|g| rectangle_of(g).is_some());
    a.and_with(b, intersect_geometries).with_precise(rectangular)
}

fn intersect_geometries(a: &Geometry, b: &Geometry) -> Option<Geometry> {
    let (ra, rb) = match (rectangle_of(a), rectangle_of(b)) {
        (Some(ra), Some(rb)) => (ra, rb),
        _ => (a.bounding_rect()?, b.bounding_rect()?),
    };
    intersect_rects(&ra, &rb).map(Geometry::Rect)
}

fn invert_geometries(inner: FilterValues<Geometry>, child: &Filter) -> FilterValues<Geometry> {
    if !inner.precise {
        log::warn!(
            "Cannot invert imprecise geometry bounds for NOT {}; scanning the whole world",
            child
        );
        return world_imprecise();
    }
    if !inner.exact {
        log::debug!("NOT {} depends on more than the geometry; no spatial constraint", child);
        return FilterValues::unknown();
    }
    if inner.disjoint {
        return FilterValues::empty();
    }
    if inner.is_empty() {
        return FilterValues::disjoint();
    }

    let rects: Option<Vec<Rect>> = inner.iter().map(rectangle_of).collect();
    let Some(rects) = rects else {
        log::warn!(
            "Cannot invert non-rectangular geometries for NOT {}; scanning the whole world",
            child
        );
        return world_imprecise();
    };

    rects
        .iter()
        .fold(FilterValues::new(vec![geometry::world()]), |acc, hole| {
            let pieces = geometry::world_minus(hole);
            if pieces.is_empty() {
                FilterValues::disjoint()
            } else {
                and_geometries(acc, FilterValues::new(pieces))
            }
        })
}

/// Bounding boxes of the regions the geometry attribute must intersect.
///
/// Collections are flattened before taking envelopes, and every extent is
/// clipped to the world.
pub fn extract_extent(filter: &Filter, attribute: &str) -> FilterValues<GeometryExtent> {
    let geometries = extract_geometries(filter, attribute);
    if geometries.is_empty() {
        return FilterValues {
            values: Vec::new(),
            precise: geometries.precise,
            disjoint: geometries.disjoint,
            exact: geometries.exact,
        };
    }

    let precise = geometries.precise;
    let extents: Vec<GeometryExtent> = geometries
        .iter()
        .flat_map(geometry::flatten)
        .flat_map(geometry::split_antimeridian)
        .filter_map(|g| g.bounding_rect())
        .filter_map(|r| GeometryExtent::from_rect(r).clip_to_world())
        .collect();

    if extents.is_empty() {
        FilterValues::disjoint().with_precise(precise)
    } else {
        FilterValues::new(extents).with_precise(precise)
    }
}
