//! Residual filter evaluation against records.
//!
//! Comparisons involving a missing or `NULL` attribute are false, as in SQL;
//! only `IS NULL` matches them.

use super::{CompareOp, Expr, Filter, SpatialOp, TemporalOp};
use crate::geometry;
use crate::record::{Record, Value};
use geo::{Geometry, Intersects, Relate};
use std::cmp::Ordering;

impl Filter {
    /// Check whether `record` matches this filter.
    pub fn evaluate(&self, record: &Record) -> bool {
        match self {
            Self::Include => true,
            Self::Exclude => false,
            Self::And(children) => children.iter().all(|c| c.evaluate(record)),
            Self::Or(children) => children.iter().any(|c| c.evaluate(record)),
            Self::Not(child) => !child.evaluate(record),
            Self::Compare { op, left, right } => {
                let ordering = compare_values(&resolve(left, record), &resolve(right, record));
                match (op, ordering) {
                    (_, None) => false,
                    (CompareOp::Eq, Some(o)) => o == Ordering::Equal,
                    (CompareOp::NotEq, Some(o)) => o != Ordering::Equal,
                    (CompareOp::Lt, Some(o)) => o == Ordering::Less,
                    (CompareOp::Le, Some(o)) => o != Ordering::Greater,
                    (CompareOp::Gt, Some(o)) => o == Ordering::Greater,
                    (CompareOp::Ge, Some(o)) => o != Ordering::Less,
                }
            }
            Self::Between { expr, lower, upper } => {
                let value = resolve(expr, record);
                let above = compare_values(&value, &resolve(lower, record));
                let below = compare_values(&value, &resolve(upper, record));
                matches!(above, Some(Ordering::Greater | Ordering::Equal))
                    && matches!(below, Some(Ordering::Less | Ordering::Equal))
            }
            Self::Like {
                expr,
                pattern,
                match_case,
            } => match resolve(expr, record) {
                Value::String(s) if *match_case => like_matches(&s, pattern),
                Value::String(s) => like_matches(&s.to_lowercase(), &pattern.to_lowercase()),
                _ => false,
            },
            Self::Spatial { op, left, right } => {
                let (Value::Geometry(a), Value::Geometry(b)) =
                    (resolve(left, record), resolve(right, record))
                else {
                    return false;
                };
                match op {
                    SpatialOp::Intersects => a.intersects(&b),
                    SpatialOp::Within => a.relate(&b).is_within(),
                    SpatialOp::Contains => a.relate(&b).is_contains(),
                    SpatialOp::Overlaps => a.relate(&b).is_overlaps(),
                    SpatialOp::DWithin { distance, units } => {
                        geometry::distance_meters(&a, &b) <= units.to_meters(*distance)
                    }
                }
            }
            Self::BBox {
                expr,
                min_x,
                min_y,
                max_x,
                max_y,
            } => {
                let Value::Geometry(g) = resolve(expr, record) else {
                    return false;
                };
                let boxes = if min_x > max_x {
                    vec![
                        geometry::bbox_polygon(*min_x, *min_y, 180.0, *max_y),
                        geometry::bbox_polygon(-180.0, *min_y, *max_x, *max_y),
                    ]
                } else {
                    vec![geometry::bbox_polygon(*min_x, *min_y, *max_x, *max_y)]
                };
                boxes.iter().any(|b| g.intersects(b))
            }
            Self::Temporal { op, left, right } => {
                evaluate_temporal(*op, &resolve(left, record), &resolve(right, record))
            }
            Self::IsNull(expr) => resolve(expr, record).is_null(),
        }
    }
}

fn resolve(expr: &Expr, record: &Record) -> Value {
    match expr {
        Expr::Property(name) => record.get(name).cloned().unwrap_or(Value::Null),
        Expr::Literal(value) => value.clone(),
        Expr::Function { name, args } => {
            let args: Vec<Value> = args.iter().map(|a| resolve(a, record)).collect();
            call_function(name, &args)
        }
    }
}

fn call_function(name: &str, args: &[Value]) -> Value {
    match (name.to_ascii_lowercase().as_str(), args) {
        ("strtouppercase", [Value::String(s)]) => Value::String(s.to_uppercase()),
        ("strtolowercase", [Value::String(s)]) => Value::String(s.to_lowercase()),
        ("strlength", [Value::String(s)]) => Value::Integer(s.chars().count() as i64),
        ("abs", [Value::Integer(i)]) => Value::Integer(i.abs()),
        ("abs", [Value::Double(d)]) => Value::Double(d.abs()),
        _ => {
            log::debug!("Function '{}' cannot be evaluated for {:?}", name, args);
            Value::Null
        }
    }
}

/// Order two values, coercing numbers and date strings; `None` when they are
/// not comparable.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Integer(x), Value::Integer(y)) => Some(x.cmp(y)),
        (Value::Boolean(x), Value::Boolean(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Date(_), _) | (_, Value::Date(_)) => Some(a.as_date()?.cmp(&b.as_date()?)),
        (Value::Integer(_) | Value::Double(_), _) | (_, Value::Integer(_) | Value::Double(_)) => {
            a.as_f64()?.partial_cmp(&b.as_f64()?)
        }
        _ => None,
    }
}

fn evaluate_temporal(op: TemporalOp, value: &Value, literal: &Value) -> bool {
    let Some(instant) = value.as_date() else {
        return false;
    };
    match (op, literal) {
        (TemporalOp::Before, Value::Period(start, _)) => instant < *start,
        (TemporalOp::After, Value::Period(_, end)) => instant > *end,
        (TemporalOp::During, Value::Period(start, end)) => *start < instant && instant < *end,
        (TemporalOp::During, _) => false,
        (_, literal) => {
            let Some(other) = literal.as_date() else {
                return false;
            };
            match op {
                TemporalOp::Before => instant < other,
                TemporalOp::After => instant > other,
                _ => instant == other,
            }
        }
    }
}

/// SQL `LIKE` matching with `%` (any run) and `_` (one character).
fn like_matches(value: &str, pattern: &str) -> bool {
    let value: Vec<char> = value.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    // backtracking over the last `%` seen
    let (mut v, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while v < value.len() {
        match pattern.get(p) {
            Some('%') => {
                star = Some((p, v));
                p += 1;
            }
            Some('_') => {
                v += 1;
                p += 1;
            }
            Some(c) if *c == value[v] => {
                v += 1;
                p += 1;
            }
            _ => match star {
                Some((sp, sv)) => {
                    p = sp + 1;
                    v = sv + 1;
                    star = Some((sp, sv + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}

/// Geometry of `record` for `attribute`, if present.
pub fn record_geometry<'a>(record: &'a Record, attribute: &str) -> Option<&'a Geometry> {
    record.get(attribute).and_then(Value::as_geometry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use chrono::{TimeZone, Utc};
    use geo::{Point, polygon};

    fn record() -> Record {
        Record::new("r1")
            .with("name", "alpha")
            .with("count", 7i64)
            .with("dtg", Utc.with_ymd_and_hms(2017, 1, 1, 12, 0, 0).unwrap())
            .with("geom", Point::new(10.0, 20.0))
    }

    #[test]
    fn test_comparisons() {
        let r = record();
        assert!(Filter::gt("count", 5i64).evaluate(&r));
        assert!(Filter::le("count", 7.0).evaluate(&r));
        assert!(!Filter::eq("name", "beta").evaluate(&r));
        assert!(Filter::between("dtg", "2017-01-01", "2017-01-02").evaluate(&r));
        assert!(!Filter::gt("missing", 1i64).evaluate(&r));
        assert!(!Filter::compare("missing", CompareOp::NotEq, 1i64).evaluate(&r));
        assert!(Filter::is_null("missing").evaluate(&r));
    }

    #[test]
    fn test_functions() {
        let r = record();
        let upper = Filter::Compare {
            op: CompareOp::Eq,
            left: Expr::function("strToUpperCase", vec![Expr::property("name")]),
            right: Expr::literal("ALPHA"),
        };
        assert!(upper.evaluate(&r));

        let unknown = Filter::Compare {
            op: CompareOp::Eq,
            left: Expr::function("nope", vec![]),
            right: Expr::literal(1i64),
        };
        assert!(!unknown.evaluate(&r));
    }

    #[test]
    fn test_like() {
        assert!(like_matches("alpha", "al%"));
        assert!(like_matches("alpha", "%ph_"));
        assert!(like_matches("alpha", "%"));
        assert!(!like_matches("alpha", "b%"));
        assert!(!like_matches("alpha", "alph"));
        assert!(like_matches("a%b", "a%b"));

        let insensitive = Filter::Like {
            expr: Expr::property("name"),
            pattern: "AL%".into(),
            match_case: false,
        };
        assert!(insensitive.evaluate(&record()));
    }

    #[test]
    fn test_spatial() {
        let r = record();
        assert!(Filter::bbox("geom", 0.0, 0.0, 15.0, 25.0).evaluate(&r));
        assert!(!Filter::bbox("geom", 170.0, 0.0, -170.0, 25.0).evaluate(&r));

        let square = polygon![(x: 0.0, y: 0.0), (x: 30.0, y: 0.0), (x: 30.0, y: 30.0), (x: 0.0, y: 30.0)];
        assert!(Filter::within("geom", square.clone()).evaluate(&r));
        assert!(Filter::intersects("geom", square).evaluate(&r));

        let near = Filter::dwithin(
            "geom",
            Point::new(10.0, 20.5),
            60.0,
            crate::geometry::DistanceUnit::Kilometers,
        );
        assert!(near.evaluate(&r));
    }

    #[test]
    fn test_temporal() {
        let r = record();
        let day = |d| Utc.with_ymd_and_hms(2017, 1, d, 0, 0, 0).unwrap();
        assert!(Filter::during("dtg", day(1), day(2)).evaluate(&r));
        assert!(Filter::before("dtg", day(2)).evaluate(&r));
        assert!(!Filter::after("dtg", day(2)).evaluate(&r));
    }
}
