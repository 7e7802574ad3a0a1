//! Item operations. Items live in their plan's shard: new item ids are drawn
//! so that their shard key equals the parent's.

use tracing::{debug, info};
use uuid::Uuid;

use waypoint_core::{IdGenerator, Item, ItemChanges, NewItem, shard_key_of, validate};
use waypoint_state::StateError;

use crate::error::ServiceResult;
use crate::unit::UnitRunner;

pub struct ItemService {
    units: UnitRunner,
    ids: IdGenerator,
}

impl ItemService {
    pub fn new(units: UnitRunner, ids: IdGenerator) -> Self {
        Self { units, ids }
    }

    /// Append an item to a plan at the next position.
    pub async fn add_item(&self, plan_id: Uuid, new: NewItem) -> ServiceResult<Item> {
        validate::new_item(&new)?;
        let shard = shard_key_of(&plan_id);
        let item_id = self.ids.generate_for(shard)?;
        let item = self
            .units
            .run(shard, move |store| store.add_item(plan_id, item_id, new))
            .await?;
        info!(%plan_id, item_id = %item.id, position = item.position, "item added");
        Ok(item)
    }

    pub async fn get_item(&self, id: Uuid) -> ServiceResult<Item> {
        self.units
            .run(shard_key_of(&id), move |store| {
                store
                    .get_item(id)?
                    .ok_or(StateError::NotFound { entity: "item", id })
            })
            .await
    }

    /// Items of a plan in position order.
    pub async fn list_items(&self, plan_id: Uuid) -> ServiceResult<Vec<Item>> {
        self.units
            .run(shard_key_of(&plan_id), move |store| {
                if store.get_plan(plan_id)?.is_none() {
                    return Err(StateError::NotFound {
                        entity: "plan",
                        id: plan_id,
                    });
                }
                store.list_items(plan_id)
            })
            .await
    }

    /// Version-checked update; a requested position moves the item.
    pub async fn update_item(&self, id: Uuid, changes: ItemChanges) -> ServiceResult<Item> {
        validate::item_changes(&changes)?;
        let item = self
            .units
            .run(shard_key_of(&id), move |store| store.update_item(id, &changes))
            .await?;
        debug!(item_id = %id, version = item.version, position = item.position, "item updated");
        Ok(item)
    }

    /// Delete an item; later siblings move up one position.
    pub async fn delete_item(&self, id: Uuid, version: Option<u64>) -> ServiceResult<()> {
        self.units
            .run(shard_key_of(&id), move |store| store.delete_item(id, version))
            .await?;
        debug!(item_id = %id, "item deleted");
        Ok(())
    }
}
