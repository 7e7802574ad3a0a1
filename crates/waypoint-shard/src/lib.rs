//! waypoint-shard: shard routing for Waypoint.
//!
//! A [`ShardCatalog`] holds the live [`ShardMap`] (shard key → [`ShardPool`])
//! and replaces it atomically on reload. Maps are loaded from a pluggable
//! [`MapSource`]: a JSON file, an inline table from the config, or the
//! `shard_catalog` control table of a registry database.
//!
//! Which shard a unit of work targets is carried by an explicit
//! [`ShardContext`] value, never by process-wide state.

pub mod catalog;
pub mod context;
pub mod error;
pub mod map;
pub mod pool;
pub mod source;

pub use catalog::{CatalogHealth, CatalogState, ShardCatalog};
pub use context::{ContextGuard, ShardContext};
pub use error::{ShardError, ShardResult};
pub use map::ShardMap;
pub use pool::{ShardConn, ShardPool};
pub use source::{ControlTableSource, FileSource, InlineSource, MapSource};
