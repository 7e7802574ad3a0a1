//! waypoint-query: global listings over a sharded catalog.
//!
//! [`ScatterGather`] fans a query out to every shard of one catalog
//! snapshot, merges the partial results, and re-applies sort and
//! pagination in memory.

pub mod error;
pub mod gather;

pub use error::{QueryError, QueryResult};
pub use gather::ScatterGather;
