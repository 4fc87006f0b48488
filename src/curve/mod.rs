//! Space-filling curves.
//!
//! The Z3 curve interleaves normalized longitude, latitude and time offset
//! into a 63-bit key; see [`zorder`] for the bit layout and the range
//! decomposition.

pub mod dimension;
pub mod z3;
pub mod zorder;

pub use dimension::NormalizedDimension;
pub use z3::Z3Sfc;
pub use zorder::{DEFAULT_MAX_RECURSE, IndexRange, Z3, ZBox, zranges};
