//! Filter expression trees.
//!
//! Filters are built programmatically; there is no text grammar. The planner
//! walks them twice: once to extract index bounds ([`extract`]) and once per
//! scanned row as a residual filter ([`evaluate`]).
//!
//! ```rust
//! use spatio_keyspace::filter::Filter;
//!
//! let filter = Filter::and(vec![
//!     Filter::bbox("geom", -10.0, -10.0, 10.0, 10.0),
//!     Filter::between("dtg", "2017-01-01T00:00:00Z", "2017-01-02T00:00:00Z"),
//! ]);
//! assert_eq!(
//!     filter.to_string(),
//!     "(BBOX(geom, -10, -10, 10, 10) AND dtg BETWEEN '2017-01-01T00:00:00Z' AND '2017-01-02T00:00:00Z')"
//! );
//! ```

pub mod evaluate;
pub mod extract;

use crate::geometry::DistanceUnit;
use crate::record::Value;
use chrono::{DateTime, Utc};
use geo::Geometry;
use std::fmt;

pub use extract::{
    BoundValue, extract_attribute_bounds, extract_extent, extract_geometries, extract_intervals,
};

/// Operand of a predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Reference to a record attribute.
    Property(String),
    Literal(Value),
    /// A computed value; the evaluator knows a handful of string and math
    /// functions and yields `Null` for anything else.
    Function { name: String, args: Vec<Expr> },
}

impl Expr {
    pub fn property(name: impl Into<String>) -> Self {
        Self::Property(name.into())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::Function {
            name: name.into(),
            args,
        }
    }

    /// Check whether this expression reads `attribute` anywhere.
    pub fn references(&self, attribute: &str) -> bool {
        match self {
            Self::Property(name) => name == attribute,
            Self::Literal(_) => false,
            Self::Function { args, .. } => args.iter().any(|a| a.references(attribute)),
        }
    }

    pub fn is_property(&self, attribute: &str) -> bool {
        matches!(self, Self::Property(name) if name == attribute)
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            Self::Literal(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    /// Operator with the operands swapped: `a < b` is `b > a`.
    pub fn flip(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
            other => other,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SpatialOp {
    Intersects,
    Within,
    Contains,
    Overlaps,
    DWithin { distance: f64, units: DistanceUnit },
}

impl SpatialOp {
    pub fn flip(self) -> Self {
        match self {
            Self::Within => Self::Contains,
            Self::Contains => Self::Within,
            other => other,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Intersects => "INTERSECTS",
            Self::Within => "WITHIN",
            Self::Contains => "CONTAINS",
            Self::Overlaps => "OVERLAPS",
            Self::DWithin { .. } => "DWITHIN",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemporalOp {
    Before,
    After,
    During,
    TEquals,
}

impl TemporalOp {
    pub fn flip(self) -> Self {
        match self {
            Self::Before => Self::After,
            Self::After => Self::Before,
            other => other,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Before => "BEFORE",
            Self::After => "AFTER",
            Self::During => "DURING",
            Self::TEquals => "TEQUALS",
        }
    }
}

/// A filter expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches everything.
    Include,
    /// Matches nothing.
    Exclude,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Compare {
        op: CompareOp,
        left: Expr,
        right: Expr,
    },
    Between {
        expr: Expr,
        lower: Expr,
        upper: Expr,
    },
    Like {
        expr: Expr,
        pattern: String,
        match_case: bool,
    },
    Spatial {
        op: SpatialOp,
        left: Expr,
        right: Expr,
    },
    /// Bounding box in lon/lat. `min_x > max_x` denotes a box crossing the
    /// antimeridian.
    BBox {
        expr: Expr,
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    },
    Temporal {
        op: TemporalOp,
        left: Expr,
        right: Expr,
    },
    IsNull(Expr),
}

impl Filter {
    pub fn and(children: Vec<Filter>) -> Self {
        Self::And(children)
    }

    pub fn or(children: Vec<Filter>) -> Self {
        Self::Or(children)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(child: Filter) -> Self {
        Self::Not(Box::new(child))
    }

    pub fn compare(attribute: &str, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            op,
            left: Expr::property(attribute),
            right: Expr::literal(value),
        }
    }

    pub fn eq(attribute: &str, value: impl Into<Value>) -> Self {
        Self::compare(attribute, CompareOp::Eq, value)
    }

    pub fn lt(attribute: &str, value: impl Into<Value>) -> Self {
        Self::compare(attribute, CompareOp::Lt, value)
    }

    pub fn le(attribute: &str, value: impl Into<Value>) -> Self {
        Self::compare(attribute, CompareOp::Le, value)
    }

    pub fn gt(attribute: &str, value: impl Into<Value>) -> Self {
        Self::compare(attribute, CompareOp::Gt, value)
    }

    pub fn ge(attribute: &str, value: impl Into<Value>) -> Self {
        Self::compare(attribute, CompareOp::Ge, value)
    }

    pub fn between(attribute: &str, lower: impl Into<Value>, upper: impl Into<Value>) -> Self {
        Self::Between {
            expr: Expr::property(attribute),
            lower: Expr::literal(lower),
            upper: Expr::literal(upper),
        }
    }

    /// Case-sensitive `LIKE`, with `%` and `_` wildcards.
    pub fn like(attribute: &str, pattern: impl Into<String>) -> Self {
        Self::Like {
            expr: Expr::property(attribute),
            pattern: pattern.into(),
            match_case: true,
        }
    }

    pub fn bbox(attribute: &str, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self::BBox {
            expr: Expr::property(attribute),
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn spatial(attribute: &str, op: SpatialOp, geometry: impl Into<Geometry<f64>>) -> Self {
        Self::Spatial {
            op,
            left: Expr::property(attribute),
            right: Expr::Literal(Value::Geometry(geometry.into())),
        }
    }

    pub fn intersects(attribute: &str, geometry: impl Into<Geometry<f64>>) -> Self {
        Self::spatial(attribute, SpatialOp::Intersects, geometry)
    }

    pub fn within(attribute: &str, geometry: impl Into<Geometry<f64>>) -> Self {
        Self::spatial(attribute, SpatialOp::Within, geometry)
    }

    pub fn dwithin(
        attribute: &str,
        geometry: impl Into<Geometry<f64>>,
        distance: f64,
        units: DistanceUnit,
    ) -> Self {
        Self::spatial(attribute, SpatialOp::DWithin { distance, units }, geometry)
    }

    pub fn temporal(attribute: &str, op: TemporalOp, value: impl Into<Value>) -> Self {
        Self::Temporal {
            op,
            left: Expr::property(attribute),
            right: Expr::literal(value),
        }
    }

    pub fn before(attribute: &str, date: DateTime<Utc>) -> Self {
        Self::temporal(attribute, TemporalOp::Before, date)
    }

    pub fn after(attribute: &str, date: DateTime<Utc>) -> Self {
        Self::temporal(attribute, TemporalOp::After, date)
    }

    /// Exclusive on both ends.
    pub fn during(attribute: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self::temporal(attribute, TemporalOp::During, Value::Period(start, end))
    }

    pub fn is_null(attribute: &str) -> Self {
        Self::IsNull(Expr::property(attribute))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Property(name) => f.write_str(name),
            Self::Literal(value) => write!(f, "{}", value),
            Self::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, children: &[Filter], sep: &str) -> fmt::Result {
    f.write_str("(")?;
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, " {} ", sep)?;
        }
        write!(f, "{}", child)?;
    }
    f.write_str(")")
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Include => f.write_str("INCLUDE"),
            Self::Exclude => f.write_str("EXCLUDE"),
            Self::And(children) => write_joined(f, children, "AND"),
            Self::Or(children) => write_joined(f, children, "OR"),
            Self::Not(child) => write!(f, "NOT {}", child),
            Self::Compare { op, left, right } => {
                write!(f, "{} {} {}", left, op.symbol(), right)
            }
            Self::Between { expr, lower, upper } => {
                write!(f, "{} BETWEEN {} AND {}", expr, lower, upper)
            }
            Self::Like {
                expr,
                pattern,
                match_case,
            } => {
                let op = if *match_case { "LIKE" } else { "ILIKE" };
                write!(f, "{} {} '{}'", expr, op, pattern)
            }
            Self::Spatial { op, left, right } => match op {
                SpatialOp::DWithin { distance, units } => {
                    write!(f, "DWITHIN({}, {}, {}, {})", left, right, distance, units)
                }
                _ => write!(f, "{}({}, {})", op.name(), left, right),
            },
            Self::BBox {
                expr,
                min_x,
                min_y,
                max_x,
                max_y,
            } => write!(
                f,
                "BBOX({}, {}, {}, {}, {})",
                expr, min_x, min_y, max_x, max_y
            ),
            Self::Temporal { op, left, right } => {
                write!(f, "{} {} {}", left, op.name(), right)
            }
            Self::IsNull(expr) => write!(f, "{} IS NULL", expr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expr_references() {
        let f = Expr::function("abs", vec![Expr::property("x")]);
        assert!(f.references("x"));
        assert!(!f.references("y"));
        assert!(!f.is_property("x"));
        assert!(Expr::property("x").is_property("x"));
    }

    #[test]
    fn test_op_flips() {
        assert_eq!(CompareOp::Lt.flip(), CompareOp::Gt);
        assert_eq!(CompareOp::Ge.flip(), CompareOp::Le);
        assert_eq!(CompareOp::Eq.flip(), CompareOp::Eq);
        assert_eq!(SpatialOp::Within.flip(), SpatialOp::Contains);
        assert_eq!(TemporalOp::Before.flip(), TemporalOp::After);
    }

    #[test]
    fn test_display() {
        let filter = Filter::not(Filter::or(vec![
            Filter::gt("count", 5i64),
            Filter::like("name", "ab%"),
        ]));
        assert_eq!(filter.to_string(), "NOT (count > 5 OR name LIKE 'ab%')");
    }
}
