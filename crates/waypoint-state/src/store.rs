//! ShardStore: redb-backed persistence for one shard.
//!
//! Provides point lookup, insert, version-checked update and delete,
//! count-all, and a locally sorted/limited scan over plans, plus the item
//! operations that keep positions dense within a plan. The store supports
//! both on-disk and in-memory backends.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use redb::{Database, ReadTransaction, ReadableDatabase, ReadableTable, WriteTransaction};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use waypoint_core::{Item, ItemChanges, NewItem, Plan, PlanChanges, PlanComparator, SortOrder};

use crate::error::{StateError, StateResult};
use crate::tables::*;

/// Plan and item counts for one shard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShardStats {
    pub plans: u64,
    pub items: u64,
}

/// Thread-safe store for one shard, backed by redb.
#[derive(Clone)]
pub struct ShardStore {
    db: Arc<Database>,
}

pub(crate) fn create_database(path: &Path) -> StateResult<Database> {
    Database::create(path).map_err(map_err!(Open))
}

pub(crate) fn create_in_memory_database() -> StateResult<Database> {
    let backend = redb::backends::InMemoryBackend::new();
    Database::builder()
        .create_with_backend(backend)
        .map_err(map_err!(Open))
}

fn encode<T: Serialize>(value: &T) -> StateResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(map_err!(Serialize))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StateResult<T> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}

fn get_json<T: DeserializeOwned>(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    key: &str,
) -> StateResult<Option<T>> {
    match table.get(key).map_err(map_err!(Read))? {
        Some(guard) => Ok(Some(decode(guard.value())?)),
        None => Ok(None),
    }
}

fn item_key(plan_id: Uuid, item_id: Uuid) -> String {
    format!("{plan_id}:{item_id}")
}

/// All items of a plan, ordered by position.
fn load_children(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    plan_id: Uuid,
) -> StateResult<Vec<Item>> {
    let prefix = format!("{plan_id}:");
    let mut items = Vec::new();
    for entry in table.range(prefix.as_str()..).map_err(map_err!(Read))? {
        let (key, value) = entry.map_err(map_err!(Read))?;
        if !key.value().starts_with(&prefix) {
            break;
        }
        items.push(decode::<Item>(value.value())?);
    }
    items.sort_by_key(|item| item.position);
    Ok(items)
}

fn check_version(entity: &'static str, id: Uuid, expected: u64, actual: u64) -> StateResult<()> {
    if expected != actual {
        return Err(StateError::VersionConflict {
            entity,
            id,
            expected,
            actual,
        });
    }
    Ok(())
}

impl ShardStore {
    /// Open (or create) a persistent shard store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let store = Self {
            db: Arc::new(create_database(path)?),
        };
        store.ensure_tables()?;
        debug!(?path, "shard store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory shard store.
    pub fn open_in_memory() -> StateResult<Self> {
        let store = Self {
            db: Arc::new(create_in_memory_database()?),
        };
        store.ensure_tables()?;
        debug!("in-memory shard store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        self.write(|txn| {
            // Opening a table in a write transaction creates it if absent.
            txn.open_table(PLANS).map_err(map_err!(Table))?;
            txn.open_table(ITEMS).map_err(map_err!(Table))?;
            txn.open_table(ITEM_PARENTS).map_err(map_err!(Table))?;
            Ok(())
        })
    }

    fn read<T>(&self, f: impl FnOnce(&ReadTransaction) -> StateResult<T>) -> StateResult<T> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        f(&txn)
    }

    /// Run `f` in one write transaction: commit on success, abort on error.
    fn write<T>(&self, f: impl FnOnce(&WriteTransaction) -> StateResult<T>) -> StateResult<T> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        match f(&txn) {
            Ok(value) => {
                txn.commit().map_err(map_err!(Transaction))?;
                Ok(value)
            }
            Err(e) => {
                txn.abort().map_err(map_err!(Transaction))?;
                Err(e)
            }
        }
    }

    // ── Plans ──────────────────────────────────────────────────────

    /// Insert a new plan. Fails if the id is already taken.
    pub fn insert_plan(&self, plan: &Plan) -> StateResult<()> {
        let key = plan.id.to_string();
        let value = encode(plan)?;
        self.write(|txn| {
            let mut table = txn.open_table(PLANS).map_err(map_err!(Table))?;
            if table.get(key.as_str()).map_err(map_err!(Read))?.is_some() {
                return Err(StateError::AlreadyExists {
                    entity: "plan",
                    id: plan.id,
                });
            }
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            Ok(())
        })?;
        debug!(plan_id = %plan.id, "plan stored");
        Ok(())
    }

    /// Get a plan by id.
    pub fn get_plan(&self, id: Uuid) -> StateResult<Option<Plan>> {
        self.read(|txn| {
            let table = txn.open_table(PLANS).map_err(map_err!(Table))?;
            get_json(&table, &id.to_string())
        })
    }

    /// Apply `changes` if the stored version equals `changes.version`,
    /// bumping the version in the same commit.
    pub fn update_plan(&self, id: Uuid, changes: &PlanChanges) -> StateResult<Plan> {
        let key = id.to_string();
        let plan = self.write(|txn| {
            let mut table = txn.open_table(PLANS).map_err(map_err!(Table))?;
            let mut plan: Plan = get_json(&table, &key)?.ok_or(StateError::NotFound {
                entity: "plan",
                id,
            })?;
            check_version("plan", id, changes.version, plan.version)?;

            plan.apply(changes);
            plan.version += 1;
            plan.updated_at = Utc::now();

            let value = encode(&plan)?;
            table
                .insert(key.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            Ok(plan)
        })?;
        debug!(plan_id = %id, version = plan.version, "plan updated");
        Ok(plan)
    }

    /// Delete a plan and all of its items in one transaction.
    ///
    /// When `expected_version` is given it must match the stored version.
    /// Returns the number of items removed with the plan.
    pub fn delete_plan(&self, id: Uuid, expected_version: Option<u64>) -> StateResult<u32> {
        let key = id.to_string();
        let removed = self.write(|txn| {
            let mut plans = txn.open_table(PLANS).map_err(map_err!(Table))?;
            let plan: Plan = get_json(&plans, &key)?.ok_or(StateError::NotFound {
                entity: "plan",
                id,
            })?;
            if let Some(expected) = expected_version {
                check_version("plan", id, expected, plan.version)?;
            }
            plans.remove(key.as_str()).map_err(map_err!(Write))?;

            let mut items = txn.open_table(ITEMS).map_err(map_err!(Table))?;
            let mut parents = txn.open_table(ITEM_PARENTS).map_err(map_err!(Table))?;
            let children = load_children(&items, id)?;
            for item in &children {
                items
                    .remove(item_key(id, item.id).as_str())
                    .map_err(map_err!(Write))?;
                parents
                    .remove(item.id.to_string().as_str())
                    .map_err(map_err!(Write))?;
            }
            Ok(children.len() as u32)
        })?;
        debug!(plan_id = %id, items_removed = removed, "plan deleted");
        Ok(removed)
    }

    /// Number of plans in this shard.
    pub fn count_plans(&self) -> StateResult<u64> {
        self.read(|txn| {
            let table = txn.open_table(PLANS).map_err(map_err!(Table))?;
            let mut count = 0;
            for entry in table.iter().map_err(map_err!(Read))? {
                entry.map_err(map_err!(Read))?;
                count += 1;
            }
            Ok(count)
        })
    }

    /// Up to `limit` plans in this shard's own order for `sort`.
    ///
    /// Without a known sort field the natural key order is used.
    pub fn scan_plans(&self, limit: usize, sort: &[SortOrder]) -> StateResult<Vec<Plan>> {
        let comparator = PlanComparator::new(sort);
        self.read(|txn| {
            let table = txn.open_table(PLANS).map_err(map_err!(Table))?;
            let mut plans = Vec::new();
            for entry in table.iter().map_err(map_err!(Read))? {
                if comparator.is_unsorted() && plans.len() >= limit {
                    break;
                }
                let (_, value) = entry.map_err(map_err!(Read))?;
                plans.push(decode::<Plan>(value.value())?);
            }
            comparator.sort(&mut plans);
            plans.truncate(limit);
            Ok(plans)
        })
    }

    // ── Items ──────────────────────────────────────────────────────

    /// Append an item to a plan at position max + 1.
    ///
    /// The max lookup and the insert share one write transaction, and redb
    /// holds the database write lock until commit, so two inserts under the
    /// same plan can never observe the same maximum.
    pub fn add_item(&self, plan_id: Uuid, item_id: Uuid, new: NewItem) -> StateResult<Item> {
        let item = self.write(|txn| {
            let plans = txn.open_table(PLANS).map_err(map_err!(Table))?;
            if plans
                .get(plan_id.to_string().as_str())
                .map_err(map_err!(Read))?
                .is_none()
            {
                return Err(StateError::NotFound {
                    entity: "plan",
                    id: plan_id,
                });
            }

            let mut parents = txn.open_table(ITEM_PARENTS).map_err(map_err!(Table))?;
            let parent_key = item_id.to_string();
            if parents
                .get(parent_key.as_str())
                .map_err(map_err!(Read))?
                .is_some()
            {
                return Err(StateError::AlreadyExists {
                    entity: "item",
                    id: item_id,
                });
            }

            let mut items = txn.open_table(ITEMS).map_err(map_err!(Table))?;
            let max = load_children(&items, plan_id)?
                .last()
                .map_or(0, |item| item.position);
            let item = Item::create(item_id, plan_id, max + 1, new, Utc::now());

            let value = encode(&item)?;
            items
                .insert(item_key(plan_id, item_id).as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            let plan_key = plan_id.to_string();
            parents
                .insert(parent_key.as_str(), plan_key.as_str())
                .map_err(map_err!(Write))?;
            Ok(item)
        })?;
        debug!(%plan_id, item_id = %item.id, position = item.position, "item added");
        Ok(item)
    }

    /// Get an item by id.
    pub fn get_item(&self, item_id: Uuid) -> StateResult<Option<Item>> {
        self.read(|txn| {
            let parents = txn.open_table(ITEM_PARENTS).map_err(map_err!(Table))?;
            let plan_id = match parents
                .get(item_id.to_string().as_str())
                .map_err(map_err!(Read))?
            {
                Some(guard) => guard.value().to_string(),
                None => return Ok(None),
            };
            let items = txn.open_table(ITEMS).map_err(map_err!(Table))?;
            get_json(&items, &format!("{plan_id}:{item_id}"))
        })
    }

    /// All items of a plan in position order.
    pub fn list_items(&self, plan_id: Uuid) -> StateResult<Vec<Item>> {
        self.read(|txn| {
            let table = txn.open_table(ITEMS).map_err(map_err!(Table))?;
            load_children(&table, plan_id)
        })
    }

    /// Highest position under a plan, 0 when it has no items.
    pub fn max_position(&self, plan_id: Uuid) -> StateResult<u32> {
        Ok(self
            .list_items(plan_id)?
            .last()
            .map_or(0, |item| item.position))
    }

    /// Apply `changes` if the stored version equals `changes.version`.
    ///
    /// A requested position moves the item; siblings between the old and
    /// new slot shift by one so positions stay 1..=n.
    pub fn update_item(&self, item_id: Uuid, changes: &ItemChanges) -> StateResult<Item> {
        let item = self.write(|txn| {
            let plan_id = parent_of(txn, item_id)?;
            let mut items = txn.open_table(ITEMS).map_err(map_err!(Table))?;
            let mut siblings = load_children(&items, plan_id)?;
            let index = siblings
                .iter()
                .position(|item| item.id == item_id)
                .ok_or(StateError::NotFound {
                    entity: "item",
                    id: item_id,
                })?;
            check_version("item", item_id, changes.version, siblings[index].version)?;

            let mut item = siblings.remove(index);
            item.apply(changes);
            item.version += 1;

            let count = siblings.len() as u32 + 1;
            let target = changes.position.unwrap_or(item.position);
            if target == 0 || target > count {
                return Err(StateError::PositionOutOfRange {
                    requested: target,
                    max: count,
                });
            }
            siblings.insert((target - 1) as usize, item);

            let mut updated = None;
            for (index, sibling) in siblings.iter_mut().enumerate() {
                let position = index as u32 + 1;
                let is_target = sibling.id == item_id;
                if sibling.position == position && !is_target {
                    continue;
                }
                sibling.position = position;
                let value = encode(&*sibling)?;
                items
                    .insert(item_key(plan_id, sibling.id).as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
                if is_target {
                    updated = Some(sibling.clone());
                }
            }
            updated.ok_or(StateError::NotFound {
                entity: "item",
                id: item_id,
            })
        })?;
        debug!(%item_id, version = item.version, position = item.position, "item updated");
        Ok(item)
    }

    /// Delete an item and close the gap it leaves in its plan's positions.
    pub fn delete_item(&self, item_id: Uuid, expected_version: Option<u64>) -> StateResult<()> {
        self.write(|txn| {
            let plan_id = parent_of(txn, item_id)?;
            let mut items = txn.open_table(ITEMS).map_err(map_err!(Table))?;
            let siblings = load_children(&items, plan_id)?;
            let index = siblings
                .iter()
                .position(|item| item.id == item_id)
                .ok_or(StateError::NotFound {
                    entity: "item",
                    id: item_id,
                })?;
            if let Some(expected) = expected_version {
                check_version("item", item_id, expected, siblings[index].version)?;
            }

            items
                .remove(item_key(plan_id, item_id).as_str())
                .map_err(map_err!(Write))?;
            let mut parents = txn.open_table(ITEM_PARENTS).map_err(map_err!(Table))?;
            parents
                .remove(item_id.to_string().as_str())
                .map_err(map_err!(Write))?;

            for sibling in &siblings[index + 1..] {
                let mut shifted = sibling.clone();
                shifted.position -= 1;
                let value = encode(&shifted)?;
                items
                    .insert(item_key(plan_id, shifted.id).as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
            Ok(())
        })?;
        debug!(%item_id, "item deleted");
        Ok(())
    }

    // ── Stats ──────────────────────────────────────────────────────

    /// Plan and item counts.
    pub fn stats(&self) -> StateResult<ShardStats> {
        let plans = self.count_plans()?;
        let items = self.read(|txn| {
            let table = txn.open_table(ITEM_PARENTS).map_err(map_err!(Table))?;
            let mut count = 0;
            for entry in table.iter().map_err(map_err!(Read))? {
                entry.map_err(map_err!(Read))?;
                count += 1;
            }
            Ok(count)
        })?;
        Ok(ShardStats { plans, items })
    }
}

/// Resolve the owning plan of an item inside a write transaction.
fn parent_of(txn: &WriteTransaction, item_id: Uuid) -> StateResult<Uuid> {
    let parents = txn.open_table(ITEM_PARENTS).map_err(map_err!(Table))?;
    let guard = parents
        .get(item_id.to_string().as_str())
        .map_err(map_err!(Read))?
        .ok_or(StateError::NotFound {
            entity: "item",
            id: item_id,
        })?;
    guard.value().parse::<Uuid>().map_err(map_err!(Deserialize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use waypoint_core::{NewPlan, generate_id_for, shard_key_of};

    fn test_plan(title: &str) -> Plan {
        Plan::create(
            Uuid::new_v4(),
            NewPlan {
                title: title.to_string(),
                ..Default::default()
            },
            Utc::now(),
        )
    }

    fn test_item(name: &str) -> NewItem {
        NewItem {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn changes_for(plan: &Plan, title: &str) -> PlanChanges {
        PlanChanges {
            title: title.to_string(),
            version: plan.version,
            ..Default::default()
        }
    }

    fn item_changes(item: &Item, position: Option<u32>) -> ItemChanges {
        ItemChanges {
            name: item.name.clone(),
            position,
            version: item.version,
            ..Default::default()
        }
    }

    fn positions(store: &ShardStore, plan_id: Uuid) -> Vec<(String, u32)> {
        store
            .list_items(plan_id)
            .unwrap()
            .into_iter()
            .map(|i| (i.name, i.position))
            .collect()
    }

    fn add_child(store: &ShardStore, plan: &Plan, name: &str) -> Item {
        let id = generate_id_for(plan.shard_key()).unwrap();
        store.add_item(plan.id, id, test_item(name)).unwrap()
    }

    // ── Plan CRUD ──────────────────────────────────────────────────

    #[test]
    fn plan_insert_and_get() {
        let store = ShardStore::open_in_memory().unwrap();
        let plan = test_plan("Lisbon");

        store.insert_plan(&plan).unwrap();
        assert_eq!(store.get_plan(plan.id).unwrap(), Some(plan));
    }

    #[test]
    fn plan_get_nonexistent_returns_none() {
        let store = ShardStore::open_in_memory().unwrap();
        assert!(store.get_plan(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn plan_insert_duplicate_rejected() {
        let store = ShardStore::open_in_memory().unwrap();
        let plan = test_plan("Lisbon");
        store.insert_plan(&plan).unwrap();
        assert!(matches!(
            store.insert_plan(&plan),
            Err(StateError::AlreadyExists { entity: "plan", .. })
        ));
    }

    #[test]
    fn plan_version_counts_updates() {
        let store = ShardStore::open_in_memory().unwrap();
        let mut plan = test_plan("v0");
        store.insert_plan(&plan).unwrap();

        for n in 1..=5u64 {
            plan = store
                .update_plan(plan.id, &changes_for(&plan, &format!("v{n}")))
                .unwrap();
            assert_eq!(plan.version, n);
        }
        assert_eq!(store.get_plan(plan.id).unwrap().unwrap().title, "v5");
    }

    #[test]
    fn plan_stale_update_rejected_without_write() {
        let store = ShardStore::open_in_memory().unwrap();
        let plan = test_plan("original");
        store.insert_plan(&plan).unwrap();

        let stale = changes_for(&plan, "first");
        store.update_plan(plan.id, &stale).unwrap();

        let mut replay = stale.clone();
        replay.title = "second".to_string();
        match store.update_plan(plan.id, &replay) {
            Err(StateError::VersionConflict {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 0);
                assert_eq!(actual, 1);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
        let stored = store.get_plan(plan.id).unwrap().unwrap();
        assert_eq!(stored.title, "first");
        assert_eq!(stored.version, 1);
    }

    #[test]
    fn plan_update_missing_is_not_found() {
        let store = ShardStore::open_in_memory().unwrap();
        let plan = test_plan("ghost");
        assert!(matches!(
            store.update_plan(plan.id, &changes_for(&plan, "x")),
            Err(StateError::NotFound { entity: "plan", .. })
        ));
    }

    #[test]
    fn plan_delete_cascades_items() {
        let store = ShardStore::open_in_memory().unwrap();
        let plan = test_plan("cascade");
        let other = test_plan("bystander");
        store.insert_plan(&plan).unwrap();
        store.insert_plan(&other).unwrap();
        let a = add_child(&store, &plan, "a");
        add_child(&store, &plan, "b");
        add_child(&store, &other, "c");

        assert_eq!(store.delete_plan(plan.id, None).unwrap(), 2);
        assert!(store.get_plan(plan.id).unwrap().is_none());
        assert!(store.get_item(a.id).unwrap().is_none());
        assert!(store.list_items(plan.id).unwrap().is_empty());
        assert_eq!(store.list_items(other.id).unwrap().len(), 1);
        assert_eq!(store.stats().unwrap(), ShardStats { plans: 1, items: 1 });
    }

    #[test]
    fn plan_delete_checks_version_when_given() {
        let store = ShardStore::open_in_memory().unwrap();
        let plan = test_plan("guarded");
        store.insert_plan(&plan).unwrap();
        store.update_plan(plan.id, &changes_for(&plan, "bumped")).unwrap();

        assert!(matches!(
            store.delete_plan(plan.id, Some(0)),
            Err(StateError::VersionConflict { .. })
        ));
        assert!(store.get_plan(plan.id).unwrap().is_some());
        assert_eq!(store.delete_plan(plan.id, Some(1)).unwrap(), 0);
        assert!(matches!(
            store.delete_plan(plan.id, None),
            Err(StateError::NotFound { .. })
        ));
    }

    #[test]
    fn scan_sorts_and_limits_locally() {
        let store = ShardStore::open_in_memory().unwrap();
        for (title, day) in [("c", Some(3)), ("a", Some(1)), ("none", None), ("b", Some(2))] {
            let mut plan = test_plan(title);
            plan.start_date = day.and_then(|d| NaiveDate::from_ymd_opt(2025, 1, d));
            store.insert_plan(&plan).unwrap();
        }

        let top: Vec<String> = store
            .scan_plans(3, &[SortOrder::desc("startDate")])
            .unwrap()
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(top, ["c", "b", "a"]);

        assert_eq!(store.scan_plans(2, &[]).unwrap().len(), 2);
        assert_eq!(store.count_plans().unwrap(), 4);
    }

    // ── Items ──────────────────────────────────────────────────────

    #[test]
    fn items_get_sequential_positions() {
        let store = ShardStore::open_in_memory().unwrap();
        let plan = test_plan("ordered");
        store.insert_plan(&plan).unwrap();

        for name in ["a", "b", "c"] {
            add_child(&store, &plan, name);
        }
        assert_eq!(
            positions(&store, plan.id),
            [("a".into(), 1), ("b".into(), 2), ("c".into(), 3)]
        );
        assert_eq!(store.max_position(plan.id).unwrap(), 3);
    }

    #[test]
    fn item_lands_in_parent_shard() {
        let store = ShardStore::open_in_memory().unwrap();
        let plan = test_plan("colocated");
        store.insert_plan(&plan).unwrap();
        let item = add_child(&store, &plan, "stop");
        assert_eq!(shard_key_of(&item.id), plan.shard_key());
        assert_eq!(store.get_item(item.id).unwrap(), Some(item));
    }

    #[test]
    fn add_item_to_missing_plan_is_not_found() {
        let store = ShardStore::open_in_memory().unwrap();
        assert!(matches!(
            store.add_item(Uuid::new_v4(), Uuid::new_v4(), test_item("orphan")),
            Err(StateError::NotFound { entity: "plan", .. })
        ));
    }

    #[test]
    fn concurrent_adds_keep_positions_dense() {
        let store = ShardStore::open_in_memory().unwrap();
        let plan = test_plan("busy");
        store.insert_plan(&plan).unwrap();
        add_child(&store, &plan, "seed-1");
        add_child(&store, &plan, "seed-2");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let plan = plan.clone();
                std::thread::spawn(move || add_child(&store, &plan, &format!("t{i}")))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let got: Vec<u32> = store
            .list_items(plan.id)
            .unwrap()
            .iter()
            .map(|i| i.position)
            .collect();
        assert_eq!(got, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn item_update_bumps_version_and_checks_it() {
        let store = ShardStore::open_in_memory().unwrap();
        let plan = test_plan("edits");
        store.insert_plan(&plan).unwrap();
        let item = add_child(&store, &plan, "cafe");

        let mut changes = item_changes(&item, None);
        changes.notes = Some("window seat".to_string());
        let updated = store.update_item(item.id, &changes).unwrap();
        assert_eq!(updated.version, 1);
        assert_eq!(updated.position, 1);
        assert_eq!(updated.notes.as_deref(), Some("window seat"));

        assert!(matches!(
            store.update_item(item.id, &changes),
            Err(StateError::VersionConflict { entity: "item", .. })
        ));
    }

    #[test]
    fn item_move_shifts_siblings() {
        let store = ShardStore::open_in_memory().unwrap();
        let plan = test_plan("reorder");
        store.insert_plan(&plan).unwrap();
        let a = add_child(&store, &plan, "a");
        add_child(&store, &plan, "b");
        let c = add_child(&store, &plan, "c");

        store.update_item(c.id, &item_changes(&c, Some(1))).unwrap();
        assert_eq!(
            positions(&store, plan.id),
            [("c".into(), 1), ("a".into(), 2), ("b".into(), 3)]
        );

        let a = store.get_item(a.id).unwrap().unwrap();
        store.update_item(a.id, &item_changes(&a, Some(3))).unwrap();
        assert_eq!(
            positions(&store, plan.id),
            [("c".into(), 1), ("b".into(), 2), ("a".into(), 3)]
        );

        let a = store.get_item(a.id).unwrap().unwrap();
        assert!(matches!(
            store.update_item(a.id, &item_changes(&a, Some(4))),
            Err(StateError::PositionOutOfRange { requested: 4, max: 3 })
        ));
    }

    #[test]
    fn item_delete_compacts_positions() {
        let store = ShardStore::open_in_memory().unwrap();
        let plan = test_plan("gaps");
        store.insert_plan(&plan).unwrap();
        add_child(&store, &plan, "a");
        let b = add_child(&store, &plan, "b");
        add_child(&store, &plan, "c");

        store.delete_item(b.id, Some(0)).unwrap();
        assert_eq!(
            positions(&store, plan.id),
            [("a".into(), 1), ("c".into(), 2)]
        );
        assert!(matches!(
            store.delete_item(b.id, None),
            Err(StateError::NotFound { entity: "item", .. })
        ));

        add_child(&store, &plan, "d");
        assert_eq!(store.max_position(plan.id).unwrap(), 3);
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("db_a.redb");
        let plan = test_plan("durable");

        {
            let store = ShardStore::open(&db_path).unwrap();
            store.insert_plan(&plan).unwrap();
            add_child(&store, &plan, "stop");
        }

        let store = ShardStore::open(&db_path).unwrap();
        assert_eq!(store.get_plan(plan.id).unwrap().unwrap().title, "durable");
        assert_eq!(store.stats().unwrap(), ShardStats { plans: 1, items: 1 });
    }

    #[test]
    fn empty_store_operations() {
        let store = ShardStore::open_in_memory().unwrap();
        assert_eq!(store.count_plans().unwrap(), 0);
        assert!(store.scan_plans(10, &[SortOrder::asc("title")]).unwrap().is_empty());
        assert!(store.list_items(Uuid::new_v4()).unwrap().is_empty());
        assert!(store.get_item(Uuid::new_v4()).unwrap().is_none());
        assert_eq!(store.stats().unwrap(), ShardStats::default());
    }
}
