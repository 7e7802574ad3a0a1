//! waypoint-service: plan and item operations over a sharded catalog.
//!
//! Single-entity operations route by the entity id's shard key and run as
//! one unit of work on that shard. Listings go through scatter-gather.
//!
//! ```no_run
//! # async fn demo() -> Result<(), waypoint_service::ServiceError> {
//! use waypoint_core::{NewPlan, WaypointConfig};
//! use waypoint_service::Waypoint;
//!
//! let config = WaypointConfig::from_file("waypoint.toml".as_ref())
//!     .map_err(|e| waypoint_service::ServiceError::Internal(e.to_string()))?;
//! let waypoint = Waypoint::open(&config)?;
//! let plan = waypoint
//!     .plans()
//!     .create_plan(NewPlan { title: "Lisbon".into(), ..Default::default() })
//!     .await?;
//! let detail = waypoint.plans().get_plan(plan.id).await?;
//! assert_eq!(detail.plan.version, 0);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use waypoint_core::{IdGenerator, WaypointConfig};
use waypoint_query::ScatterGather;
use waypoint_shard::{CatalogHealth, ShardCatalog};

pub mod error;
pub mod items;
pub mod plans;
pub mod unit;

pub use error::{ErrorBody, ServiceError, ServiceResult};
pub use items::ItemService;
pub use plans::PlanService;
pub use unit::UnitRunner;

/// Catalog plus the services routed through it.
pub struct Waypoint {
    catalog: Arc<ShardCatalog>,
    plans: PlanService,
    items: ItemService,
}

impl Waypoint {
    /// Load the configured shard map and build the services.
    pub fn open(config: &WaypointConfig) -> ServiceResult<Self> {
        let catalog = ShardCatalog::open(&config.catalog, &config.pool)
            .map_err(|e| ServiceError::ShardMapReload(e.to_string()))?;
        Ok(Self::with_catalog(Arc::new(catalog), config))
    }

    /// Build the services over an existing catalog.
    pub fn with_catalog(catalog: Arc<ShardCatalog>, config: &WaypointConfig) -> Self {
        let units = UnitRunner::new(Arc::clone(&catalog), &config.catalog);
        let ids = IdGenerator::new(config.ids.max_draws);
        let query = ScatterGather::new(Arc::clone(&catalog), &config.query);
        Self {
            plans: PlanService::new(units.clone(), query, ids),
            items: ItemService::new(units, ids),
            catalog,
        }
    }

    pub fn plans(&self) -> &PlanService {
        &self.plans
    }

    pub fn items(&self) -> &ItemService {
        &self.items
    }

    pub fn catalog(&self) -> &Arc<ShardCatalog> {
        &self.catalog
    }

    /// Catalog state and fallback pool, for probes without a shard context.
    pub fn health(&self) -> CatalogHealth {
        self.catalog.health()
    }

    /// Reload the shard map from its configured source.
    pub fn reload(&self) -> ServiceResult<usize> {
        self.catalog
            .reload()
            .map_err(|e| ServiceError::ShardMapReload(e.to_string()))
    }
}
