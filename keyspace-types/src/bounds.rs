//! Interval algebra over totally ordered domains.
//!
//! Bounds extracted from filters are expressed as [`Interval`]s whose ends are
//! [`Bound`]s that may be open, closed or missing (unbounded). A disjunction of
//! extracted values, together with its precision, is a [`FilterValues`].
//!
//! ```
//! use spatio_keyspace_types::bounds::{Bound, Interval};
//!
//! let a = Interval::closed(1, 5).unwrap();
//! let b = Interval::new(Bound::exclusive(3), Bound::unbounded()).unwrap();
//!
//! let both = a.intersect(&b).unwrap();
//! assert_eq!(both.lower(), &Bound::exclusive(3));
//! assert_eq!(both.upper(), &Bound::inclusive(5));
//! ```

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One end of an interval.
///
/// A `None` value means the interval is unbounded in that direction; the
/// `inclusive` flag is meaningless (and kept `false`) in that case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bound<T> {
    pub value: Option<T>,
    pub inclusive: bool,
}

impl<T> Bound<T> {
    /// A missing bound.
    pub const fn unbounded() -> Self {
        Self {
            value: None,
            inclusive: false,
        }
    }

    /// A closed bound at `value`.
    pub fn inclusive(value: T) -> Self {
        Self {
            value: Some(value),
            inclusive: true,
        }
    }

    /// An open bound at `value`.
    pub fn exclusive(value: T) -> Self {
        Self {
            value: Some(value),
            inclusive: false,
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.value.is_some()
    }

    /// Bound at the same value with the opposite inclusivity.
    fn flipped(&self) -> Self
    where
        T: Clone,
    {
        Self {
            value: self.value.clone(),
            inclusive: !self.inclusive,
        }
    }
}

/// Orders two lower bounds: a missing bound is the smallest, and at equal
/// values the inclusive bound comes first.
fn cmp_lower<T: Ord>(a: &Bound<T>, b: &Bound<T>) -> Ordering {
    match (&a.value, &b.value) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => x.cmp(y).then(match (a.inclusive, b.inclusive) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => Ordering::Equal,
        }),
    }
}

/// Orders two upper bounds: a missing bound is the largest, and at equal
/// values the inclusive bound comes last.
fn cmp_upper<T: Ord>(a: &Bound<T>, b: &Bound<T>) -> Ordering {
    match (&a.value, &b.value) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => x.cmp(y).then(match (a.inclusive, b.inclusive) {
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            _ => Ordering::Equal,
        }),
    }
}

/// A non-empty interval over a totally ordered domain.
///
/// Intervals can only be built through checked constructors, so an instance
/// always satisfies `lower <= upper` (and both ends are inclusive when they
/// share a value). An empty interval is represented by `None`, never by a
/// swapped pair of bounds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Interval<T> {
    lower: Bound<T>,
    upper: Bound<T>,
}

impl<T: Ord + Clone> Interval<T> {
    /// Build an interval, returning `None` if the bounds describe an empty set.
    pub fn new(lower: Bound<T>, upper: Bound<T>) -> Option<Self> {
        let valid = match (&lower.value, &upper.value) {
            (Some(l), Some(u)) => match l.cmp(u) {
                Ordering::Less => true,
                Ordering::Equal => lower.inclusive && upper.inclusive,
                Ordering::Greater => false,
            },
            _ => true,
        };
        valid.then_some(Self { lower, upper })
    }

    /// The full domain.
    pub fn everything() -> Self {
        Self {
            lower: Bound::unbounded(),
            upper: Bound::unbounded(),
        }
    }

    /// `[value, value]`
    pub fn point(value: T) -> Self {
        Self {
            lower: Bound::inclusive(value.clone()),
            upper: Bound::inclusive(value),
        }
    }

    /// `[lower, upper]`
    pub fn closed(lower: T, upper: T) -> Option<Self> {
        Self::new(Bound::inclusive(lower), Bound::inclusive(upper))
    }

    /// `(lower, upper)`
    pub fn open(lower: T, upper: T) -> Option<Self> {
        Self::new(Bound::exclusive(lower), Bound::exclusive(upper))
    }

    /// `[value, +inf)`
    pub fn at_least(value: T) -> Self {
        Self {
            lower: Bound::inclusive(value),
            upper: Bound::unbounded(),
        }
    }

    /// `(value, +inf)`
    pub fn greater_than(value: T) -> Self {
        Self {
            lower: Bound::exclusive(value),
            upper: Bound::unbounded(),
        }
    }

    /// `(-inf, value]`
    pub fn at_most(value: T) -> Self {
        Self {
            lower: Bound::unbounded(),
            upper: Bound::inclusive(value),
        }
    }

    /// `(-inf, value)`
    pub fn less_than(value: T) -> Self {
        Self {
            lower: Bound::unbounded(),
            upper: Bound::exclusive(value),
        }
    }

    pub fn lower(&self) -> &Bound<T> {
        &self.lower
    }

    pub fn upper(&self) -> &Bound<T> {
        &self.upper
    }

    pub fn is_bounded_both_sides(&self) -> bool {
        self.lower.is_bounded() && self.upper.is_bounded()
    }

    pub fn is_everything(&self) -> bool {
        !self.lower.is_bounded() && !self.upper.is_bounded()
    }

    /// Check whether `value` falls inside the interval.
    pub fn contains(&self, value: &T) -> bool {
        let above_lower = match &self.lower.value {
            None => true,
            Some(l) if self.lower.inclusive => value >= l,
            Some(l) => value > l,
        };
        let below_upper = match &self.upper.value {
            None => true,
            Some(u) if self.upper.inclusive => value <= u,
            Some(u) => value < u,
        };
        above_lower && below_upper
    }

    /// Intersection of two intervals, or `None` if they do not overlap.
    ///
    /// When both intervals end at the same value the result is inclusive only
    /// if both inputs were inclusive there.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let lower = match cmp_lower(&self.lower, &other.lower) {
            Ordering::Less => other.lower.clone(),
            _ => self.lower.clone(),
        };
        let upper = match cmp_upper(&self.upper, &other.upper) {
            Ordering::Greater => other.upper.clone(),
            _ => self.upper.clone(),
        };
        Self::new(lower, upper)
    }

    /// Union of two intervals.
    ///
    /// Overlapping or touching intervals merge into one; anything else comes
    /// back unchanged, ordered by lower bound.
    pub fn union(&self, other: &Self) -> Vec<Self> {
        let (first, second) = if cmp_lower(&self.lower, &other.lower) == Ordering::Greater {
            (other, self)
        } else {
            (self, other)
        };

        let connected = match (&first.upper.value, &second.lower.value) {
            (None, _) | (_, None) => true,
            (Some(u), Some(l)) => match u.cmp(l) {
                Ordering::Greater => true,
                Ordering::Equal => first.upper.inclusive || second.lower.inclusive,
                Ordering::Less => false,
            },
        };

        if !connected {
            return vec![first.clone(), second.clone()];
        }

        let upper = match cmp_upper(&first.upper, &second.upper) {
            Ordering::Less => second.upper.clone(),
            _ => first.upper.clone(),
        };
        vec![Self {
            lower: first.lower.clone(),
            upper,
        }]
    }

    /// Everything not covered by this interval.
    ///
    /// Yields two pieces for an interval bounded on both sides, one for a
    /// half-open interval and none for the full domain.
    pub fn complement(&self) -> Vec<Self> {
        let mut pieces = Vec::with_capacity(2);
        if self.lower.is_bounded() {
            pieces.push(Self {
                lower: Bound::unbounded(),
                upper: self.lower.flipped(),
            });
        }
        if self.upper.is_bounded() {
            pieces.push(Self {
                lower: self.upper.flipped(),
                upper: Bound::unbounded(),
            });
        }
        pieces
    }

    /// Sort and coalesce a set of intervals so no two of the results overlap
    /// or touch.
    pub fn merge_all(mut intervals: Vec<Self>) -> Vec<Self> {
        intervals.sort_by(|a, b| cmp_lower(&a.lower, &b.lower));
        let mut merged: Vec<Self> = Vec::with_capacity(intervals.len());
        for interval in intervals {
            match merged.pop() {
                None => merged.push(interval),
                Some(last) => merged.extend(last.union(&interval)),
            }
        }
        merged
    }
}

/// A disjunction of values extracted from a filter.
///
/// * `precise == false` means the values over-approximate the filter and rows
///   must still be checked against it.
/// * `disjoint == true` means the filter can match nothing.
/// * No values and not disjoint means the filter does not constrain the
///   attribute at all.
/// * `exact == true` means the filter matches exactly when the attribute
///   falls in the values. Ignored clauses clear it, and only exact values may
///   be complemented.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterValues<T> {
    pub values: Vec<T>,
    pub precise: bool,
    pub disjoint: bool,
    pub exact: bool,
}

impl<T> Default for FilterValues<T> {
    fn default() -> Self {
        Self::unknown()
    }
}

impl<T> FilterValues<T> {
    /// Precise values.
    pub fn new(values: Vec<T>) -> Self {
        Self {
            values,
            precise: true,
            disjoint: false,
            exact: true,
        }
    }

    /// No constraint: the filter matches every value.
    pub fn empty() -> Self {
        Self {
            values: Vec::new(),
            precise: true,
            disjoint: false,
            exact: true,
        }
    }

    /// No constraint extracted, although the filter may still reject rows
    /// on grounds the values do not capture.
    pub fn unknown() -> Self {
        Self::empty().with_exact(false)
    }

    /// Matches nothing.
    pub fn disjoint() -> Self {
        Self {
            values: Vec::new(),
            precise: true,
            disjoint: true,
            exact: true,
        }
    }

    /// Imprecise values are never exact.
    pub fn with_precise(mut self, precise: bool) -> Self {
        self.precise = self.precise && precise;
        self.exact = self.exact && precise;
        self
    }

    pub fn with_exact(mut self, exact: bool) -> Self {
        self.exact = self.exact && exact;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn non_empty(&self) -> bool {
        !self.values.is_empty()
    }

    /// True when the attribute is not constrained at all.
    pub fn is_unconstrained(&self) -> bool {
        self.values.is_empty() && !self.disjoint
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.values.iter()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> FilterValues<U> {
        FilterValues {
            values: self.values.into_iter().map(f).collect(),
            precise: self.precise,
            disjoint: self.disjoint,
            exact: self.exact,
        }
    }

    /// Conjunction of two value sets using `intersect` pairwise.
    ///
    /// An unconstrained side yields the other side, a disjoint side or an
    /// empty intersection yields a disjoint result.
    pub fn and_with<F>(self, other: Self, intersect: F) -> Self
    where
        F: Fn(&T, &T) -> Option<T>,
    {
        let precise = self.precise && other.precise;
        let exact = self.exact && other.exact;
        if self.disjoint || other.disjoint {
            return Self::disjoint().with_precise(precise).with_exact(exact);
        }
        if self.is_empty() {
            return other.with_precise(precise).with_exact(exact);
        }
        if other.is_empty() {
            return self.with_precise(precise).with_exact(exact);
        }

        let values: Vec<T> = self
            .values
            .iter()
            .flat_map(|a| other.values.iter().filter_map(|b| intersect(a, b)))
            .collect();

        if values.is_empty() {
            Self::disjoint().with_precise(precise).with_exact(exact)
        } else {
            Self::new(values).with_precise(precise).with_exact(exact)
        }
    }

    /// Disjunction of two value sets.
    ///
    /// Disjoint sides drop out; an unconstrained side makes the whole result
    /// unconstrained, since nothing can be pruned from it.
    pub fn or_with<F>(self, other: Self, merge: F) -> Self
    where
        F: FnOnce(Vec<T>) -> Vec<T>,
    {
        let precise = self.precise && other.precise;
        let exact = self.exact && other.exact;
        match (self.disjoint, other.disjoint) {
            (true, true) => return Self::disjoint().with_precise(precise).with_exact(exact),
            (true, false) => return other.with_precise(precise).with_exact(exact),
            (false, true) => return self.with_precise(precise).with_exact(exact),
            (false, false) => {}
        }
        if self.is_empty() || other.is_empty() {
            return Self::empty().with_precise(precise).with_exact(exact);
        }

        let mut values = self.values;
        values.extend(other.values);
        Self::new(merge(values)).with_precise(precise).with_exact(exact)
    }
}

impl<T> IntoIterator for FilterValues<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl<T: Ord + Clone> FilterValues<Interval<T>> {
    /// Full domain, flagged as an over-approximation.
    pub fn everything_imprecise() -> Self {
        Self::new(vec![Interval::everything()]).with_precise(false)
    }

    /// Intersect two interval sets.
    pub fn and(self, other: Self) -> Self {
        let mut result = self.and_with(other, Interval::intersect);
        result.values = Interval::merge_all(result.values);
        result
    }

    /// Union two interval sets.
    pub fn or(self, other: Self) -> Self {
        self.or_with(other, Interval::merge_all)
    }

    /// Negate an interval set.
    ///
    /// Only exact values are inverted. An imprecise input yields the full
    /// domain (still imprecise), and values that ignored part of the filter
    /// yield no constraint.
    pub fn complement(self) -> Self {
        if !self.precise {
            return Self::everything_imprecise();
        }
        if !self.exact {
            return Self::unknown();
        }
        if self.disjoint {
            return Self::empty();
        }
        if self.is_empty() {
            return Self::disjoint();
        }

        self.values
            .iter()
            .fold(Self::new(vec![Interval::everything()]), |acc, interval| {
                let pieces = interval.complement();
                if pieces.is_empty() {
                    Self::disjoint()
                } else {
                    acc.and(Self::new(pieces))
                }
            })
    }
}
