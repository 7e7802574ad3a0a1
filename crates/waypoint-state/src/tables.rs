//! redb table definitions for the Waypoint shard store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain
//! types) except the control table, whose values are plain endpoint strings.

use redb::TableDefinition;

/// Plans keyed by `{plan_id}`.
pub const PLANS: TableDefinition<&str, &[u8]> = TableDefinition::new("plans");

/// Items keyed by `{plan_id}:{item_id}`.
pub const ITEMS: TableDefinition<&str, &[u8]> = TableDefinition::new("items");

/// Item → owning plan, keyed by `{item_id}`.
pub const ITEM_PARENTS: TableDefinition<&str, &str> = TableDefinition::new("item_parents");

/// Control table: `shard_key` → `endpoint`.
pub const SHARD_CATALOG: TableDefinition<&str, &str> = TableDefinition::new("shard_catalog");
