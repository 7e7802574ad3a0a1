//! Shard catalog: owns the live shard map and its reload state machine.
//!
//! Readers take a snapshot (`Arc<ShardMap>`) and route against it; a reload
//! builds a complete replacement off to the side and swaps it in under a
//! short write lock. Pools dropped by a swap stay alive until their last
//! in-flight connection is returned.
//!
//! ```text
//! Serving --(storage failure)--> Reloading --(ok)--> Serving
//!                                          --(err)--> Degraded
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use waypoint_core::config::{CatalogConfig, PoolConfig};
use waypoint_core::{Endpoint, ShardKey};

use crate::context::ShardContext;
use crate::error::{ShardError, ShardResult};
use crate::map::ShardMap;
use crate::pool::ShardPool;
use crate::source::{self, MapSource};

/// Reload state of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CatalogState {
    /// Live map is current.
    Serving,
    /// A reload is building a replacement map.
    Reloading,
    /// The last reload failed; the previous map is still live.
    Degraded { reason: String },
}

/// Health probe payload for callers without a shard context.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogHealth {
    pub state: CatalogState,
    pub shards: usize,
    pub default_shard: Option<ShardKey>,
    pub default_endpoint: Option<String>,
}

pub struct ShardCatalog {
    live: RwLock<Arc<ShardMap>>,
    state: RwLock<CatalogState>,
    source: Box<dyn MapSource>,
    pool_config: PoolConfig,
    preferred_default: Option<ShardKey>,
    /// Serializes reloads; readers never take it.
    reload_lock: Mutex<()>,
}

impl ShardCatalog {
    /// An empty catalog. Nothing resolves until the first reload.
    pub fn new(
        source: Box<dyn MapSource>,
        pool_config: PoolConfig,
        preferred_default: Option<ShardKey>,
    ) -> Self {
        Self {
            live: RwLock::new(Arc::new(ShardMap::default())),
            state: RwLock::new(CatalogState::Serving),
            source,
            pool_config,
            preferred_default,
            reload_lock: Mutex::new(()),
        }
    }

    /// Build the configured source and load the first map.
    pub fn open(catalog: &CatalogConfig, pool: &PoolConfig) -> ShardResult<Self> {
        let source_config = catalog
            .source
            .as_ref()
            .ok_or_else(|| ShardError::Source("no shard map source configured".to_string()))?;
        let catalog = Self::new(
            source::from_config(source_config)?,
            pool.clone(),
            catalog.default_shard,
        );
        catalog.reload()?;
        Ok(catalog)
    }

    /// The live map. Routing decisions for one unit of work should use a
    /// single snapshot.
    pub fn snapshot(&self) -> Arc<ShardMap> {
        self.live.read().expect("catalog lock").clone()
    }

    pub fn resolve(&self, key: ShardKey) -> ShardResult<ShardPool> {
        self.snapshot().resolve(key).cloned()
    }

    pub fn resolve_current(&self, context: &ShardContext) -> ShardResult<(ShardKey, ShardPool)> {
        let map = self.snapshot();
        let (key, pool) = map.resolve_current(context)?;
        Ok((key, pool.clone()))
    }

    pub fn default_pool(&self) -> Option<ShardPool> {
        self.snapshot().default_pool().cloned()
    }

    pub fn state(&self) -> CatalogState {
        self.state.read().expect("catalog state lock").clone()
    }

    pub fn source(&self) -> &dyn MapSource {
        self.source.as_ref()
    }

    pub fn health(&self) -> CatalogHealth {
        let map = self.snapshot();
        CatalogHealth {
            state: self.state(),
            shards: map.len(),
            default_shard: map.default_key(),
            default_endpoint: map.default_pool().map(|pool| pool.endpoint().to_string()),
        }
    }

    /// Build a complete map from `source` without touching the live one.
    ///
    /// Pools of the live map are reused for unchanged endpoints; a drained
    /// pool is replaced by a fresh pool over the same database. Keys naming
    /// the same endpoint share one pool.
    pub fn load(&self, source: &dyn MapSource) -> ShardResult<ShardMap> {
        let mapping = source.load_mapping()?;
        let current = self.snapshot();

        let mut existing: HashMap<&Endpoint, &ShardPool> = HashMap::new();
        for (_, pool) in current.iter() {
            existing.entry(pool.endpoint()).or_insert(pool);
        }

        let mut opened: HashMap<Endpoint, ShardPool> = HashMap::new();
        let mut pools = BTreeMap::new();
        for (key, endpoint) in mapping {
            let pool = match opened.get(&endpoint) {
                Some(pool) => pool.clone(),
                None => {
                    let pool = match existing.get(&endpoint) {
                        Some(pool) if !pool.is_closed() => (*pool).clone(),
                        Some(pool) => pool.reconnect(&self.pool_config),
                        None => ShardPool::connect(&endpoint, &self.pool_config)?,
                    };
                    opened.insert(endpoint, pool.clone());
                    pool
                }
            };
            pools.insert(key, pool);
        }

        Ok(ShardMap::new(pools, self.preferred_default))
    }

    /// Atomically replace the live map, returning the previous one.
    pub fn swap(&self, map: ShardMap) -> Arc<ShardMap> {
        let (map, previous) = {
            let mut live = self.live.write().expect("catalog lock");
            let map = Arc::new(map.with_generation(live.generation() + 1));
            let previous = std::mem::replace(&mut *live, Arc::clone(&map));
            (map, previous)
        };

        let retired = previous
            .iter()
            .filter(|(_, old)| !map.iter().any(|(_, new)| new.same_pool(old)))
            .count();
        info!(
            shards = map.len(),
            default_shard = ?map.default_key(),
            generation = map.generation(),
            retired,
            "shard map swapped"
        );
        previous
    }

    /// Reload from the configured source.
    pub fn reload(&self) -> ShardResult<usize> {
        self.reload_from(self.source.as_ref())
    }

    /// Reload from an explicit source. On failure the live map is kept and
    /// the catalog becomes degraded.
    pub fn reload_from(&self, source: &dyn MapSource) -> ShardResult<usize> {
        let _reloading = self.reload_lock.lock().expect("catalog reload lock");
        self.reload_locked(source)
    }

    fn reload_locked(&self, source: &dyn MapSource) -> ShardResult<usize> {
        self.set_state(CatalogState::Reloading);
        debug!(source = %source.describe(), "reloading shard map");

        match self.load(source) {
            Ok(map) => {
                let shards = map.len();
                self.swap(map);
                self.set_state(CatalogState::Serving);
                Ok(shards)
            }
            Err(e) => {
                error!(source = %source.describe(), error = %e, "shard map reload failed");
                self.set_state(CatalogState::Degraded {
                    reason: e.to_string(),
                });
                Err(ShardError::ReloadFailed(e.to_string()))
            }
        }
    }

    /// React to a storage failure on `shard` seen against the map of
    /// generation `observed` by reloading from the configured source.
    ///
    /// Failures observed on a map that has since been replaced share the
    /// reload that replaced it: only the first of a burst reloads.
    pub fn recover(&self, shard: ShardKey, observed: u64, cause: &str) -> ShardResult<usize> {
        let _reloading = self.reload_lock.lock().expect("catalog reload lock");
        let live = self.snapshot();
        if live.generation() > observed {
            debug!(
                shard = %shard,
                observed,
                generation = live.generation(),
                "shard map already replaced"
            );
            return Ok(live.len());
        }
        warn!(shard = %shard, cause, "shard failure, reloading shard map");
        let shards = self.reload_locked(self.source.as_ref())?;
        info!(shard = %shard, shards, "shard map recovered");
        Ok(shards)
    }

    fn set_state(&self, state: CatalogState) {
        *self.state.write().expect("catalog state lock") = state;
    }
}
