//! Plan operations.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use waypoint_core::{
    IdGenerator, NewPlan, Page, PageRequest, Plan, PlanChanges, PlanDetail, PlanSummary,
    ShardKey, shard_key_of, validate,
};
use waypoint_query::{QueryError, ScatterGather};
use waypoint_state::{ShardStats, StateError};

use crate::error::{ServiceError, ServiceResult};
use crate::unit::UnitRunner;

pub struct PlanService {
    units: UnitRunner,
    query: ScatterGather,
    ids: IdGenerator,
}

impl PlanService {
    pub fn new(units: UnitRunner, query: ScatterGather, ids: IdGenerator) -> Self {
        Self { units, query, ids }
    }

    /// Create a plan on a randomly chosen mapped shard.
    pub async fn create_plan(&self, new: NewPlan) -> ServiceResult<Plan> {
        validate::new_plan(&new)?;
        let keys: Vec<ShardKey> = self.units.catalog().snapshot().keys().collect();
        if keys.is_empty() {
            return Err(ServiceError::Internal("shard map is empty".to_string()));
        }
        let pick = (Uuid::new_v4().as_u128() % keys.len() as u128) as usize;
        self.insert(keys[pick], new).await
    }

    /// Create a plan whose id places it on `shard`.
    pub async fn create_plan_in(&self, shard: ShardKey, new: NewPlan) -> ServiceResult<Plan> {
        validate::new_plan(&new)?;
        self.insert(shard, new).await
    }

    async fn insert(&self, shard: ShardKey, new: NewPlan) -> ServiceResult<Plan> {
        let id = self.ids.generate_for(shard)?;
        let plan = Plan::create(id, new, Utc::now());
        let stored = plan.clone();
        self.units
            .run(shard, move |store| store.insert_plan(&stored))
            .await?;
        info!(plan_id = %plan.id, shard = %shard, "plan created");
        Ok(plan)
    }

    /// The plan with its items in position order.
    pub async fn get_plan(&self, id: Uuid) -> ServiceResult<PlanDetail> {
        self.units
            .run(shard_key_of(&id), move |store| {
                let plan = store
                    .get_plan(id)?
                    .ok_or(StateError::NotFound { entity: "plan", id })?;
                let items = store.list_items(id)?;
                Ok(PlanDetail { plan, items })
            })
            .await
    }

    /// Version-checked update; `changes.version` is the version last read.
    pub async fn update_plan(&self, id: Uuid, changes: PlanChanges) -> ServiceResult<Plan> {
        validate::plan_changes(&changes)?;
        let plan = self
            .units
            .run(shard_key_of(&id), move |store| store.update_plan(id, &changes))
            .await?;
        debug!(plan_id = %id, version = plan.version, "plan updated");
        Ok(plan)
    }

    /// Delete a plan and its items. A given version must match.
    pub async fn delete_plan(&self, id: Uuid, version: Option<u64>) -> ServiceResult<()> {
        let removed = self
            .units
            .run(shard_key_of(&id), move |store| store.delete_plan(id, version))
            .await?;
        info!(plan_id = %id, items_removed = removed, "plan deleted");
        Ok(())
    }

    /// One page of all plans across every shard.
    pub async fn list_plans(&self, request: &PageRequest) -> ServiceResult<Page<PlanSummary>> {
        let map = self.units.catalog().snapshot();
        match self.query.list_plans_on(&map, request).await {
            Ok(page) => Ok(page),
            Err(e) => Err(self.aggregate_failure(map.generation(), e).await),
        }
    }

    /// Plan and item counts per database.
    pub async fn shard_stats(&self) -> ServiceResult<BTreeMap<ShardKey, ShardStats>> {
        let map = self.units.catalog().snapshot();
        match self.query.shard_stats_on(&map).await {
            Ok(stats) => Ok(stats),
            Err(e) => Err(self.aggregate_failure(map.generation(), e).await),
        }
    }

    async fn aggregate_failure(&self, observed: u64, e: QueryError) -> ServiceError {
        if let QueryError::Invalid(v) = e {
            return ServiceError::Validation(v);
        }
        if let Some(shard) = e.shard().filter(|_| e.is_shard_failure()) {
            // Recovery runs; only a failed reload changes the outcome.
            let recovered = self.units.shard_failure(shard, observed, e.to_string()).await;
            if let err @ ServiceError::ShardMapReload(_) = recovered {
                return err;
            }
        }
        ServiceError::AggregateQuery {
            reason: e.to_string(),
            retry_after: self.units.retry_after(),
        }
    }
}
