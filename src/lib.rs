//! Spatio-temporal key space for ordered key-value stores.
//!
//! Point records with a timestamp are written under Z3 row keys (longitude,
//! latitude and time offset interleaved inside a coarse time bin). Queries
//! are planned by extracting bounds from a filter and decomposing them into
//! a bounded number of key ranges.
//!
//! ```rust
//! use spatio_keyspace::prelude::*;
//!
//! let schema = Schema::parse("tracks", "name:String,dtg:Date,*geom:Point")?;
//! let mut planner = QueryPlanner::new(PlannerConfig::default(), MemoryStore::new(4))?;
//!
//! let keyspace = planner.keyspace(&schema)?;
//! let record = Record::new("a")
//!     .with("geom", Point::new(0.5, 0.5))
//!     .with("dtg", Value::Date(parse_date("2017-01-01T12:00:00Z").unwrap()));
//! planner.adapter_mut().write(&keyspace, record)?;
//!
//! let filter = Filter::and(vec![
//!     Filter::bbox("geom", 0.0, 0.0, 1.0, 1.0),
//!     Filter::between("dtg", "2017-01-01T00:00:00Z", "2017-01-02T00:00:00Z"),
//! ]);
//! let plan = planner.plan_query(&schema, &filter, &QueryHints::default())?;
//! assert_eq!(planner.adapter().query(&plan).len(), 1);
//! # Ok::<(), spatio_keyspace::KeyspaceError>(())
//! ```

pub mod config;
pub mod curve;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod index;
pub mod planner;
pub mod record;
pub mod schema;
pub mod storage;
pub mod time;

pub use config::{IndexKind, PlannerConfig, QueryHints, RangeEnd};
pub use curve::Z3Sfc;
pub use error::{KeyspaceError, Result};
pub use filter::{Filter, extract_attribute_bounds, extract_extent};
pub use index::{KeyspaceCache, Z3KeySpace};
pub use planner::{QueryPlan, QueryPlanner, StatsProvider, StrategyKind};
pub use record::{Record, Value};
pub use schema::{AttributeType, Schema};
pub use storage::{MemoryStore, StorageAdapter};
pub use time::TimePeriod;

pub use spatio_keyspace_types::{
    BinnedTime, Bound, FilterValues, GeometryExtent, Interval, ScanRange, Z3IndexKey,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{KeyspaceError, Result};

    pub use crate::{IndexKind, PlannerConfig, QueryHints, RangeEnd, TimePeriod};

    pub use crate::{QueryPlan, QueryPlanner, StatsProvider, StrategyKind};

    pub use crate::filter::Filter;
    pub use crate::record::{Record, Value, parse_date};
    pub use crate::schema::Schema;

    pub use crate::{MemoryStore, StorageAdapter};

    pub use crate::{FilterValues, GeometryExtent, Interval, ScanRange};

    pub use geo::{Point, Polygon, Rect};
}
