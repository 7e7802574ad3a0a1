//! waypoint-state: embedded per-shard store for Waypoint.
//!
//! Backed by [redb](https://docs.rs/redb). One `ShardStore` holds the plans
//! and items of exactly one shard; a `CatalogStore` holds the control table
//! that maps shard keys to endpoints.
//!
//! # Architecture
//!
//! Domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Items use composite keys (`{plan_id}:{item_id}`) so a plan's items can be
//! read with one prefix range scan; a secondary table maps item ids back to
//! their plan.
//!
//! redb admits one write transaction per database at a time. Every
//! read-check-write sequence (version checks, position allocation, cascade
//! deletes) runs inside a single write transaction and is therefore
//! serialized against every other writer on the same shard.

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| $crate::error::StateError::$variant(e.to_string())
    };
}

pub mod catalog;
pub mod error;
pub mod store;
pub mod tables;

pub use catalog::CatalogStore;
pub use error::{StateError, StateResult};
pub use store::{ShardStats, ShardStore};
