//! # spatio-keyspace-types
//!
//! Core value types shared by the spatio-keyspace index engine:
//!
//! - **Bounds algebra**: `Bound`, `Interval`, `FilterValues`
//! - **Extents**: `GeometryExtent`
//! - **Keys**: `BinnedTime`, `Z3IndexKey`, `ScanRange`
//!
//! ## Examples
//!
//! ```rust
//! use spatio_keyspace_types::bounds::{FilterValues, Interval};
//!
//! let late = FilterValues::new(vec![Interval::greater_than(10)]);
//! let early = FilterValues::new(vec![Interval::less_than(5)]);
//!
//! // nothing can be both
//! assert!(late.and(early).disjoint);
//! ```

pub mod bounds;
pub mod extent;
pub mod key;

pub use bounds::{Bound, FilterValues, Interval};
pub use extent::GeometryExtent;
pub use key::{BinnedTime, ScanRange, Z3IndexKey};
