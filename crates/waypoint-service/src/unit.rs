//! Unit-of-work runner.
//!
//! One unit of work binds a shard context, resolves the shard's pool from a
//! catalog snapshot, takes one connection, and runs a single store call on
//! the blocking pool. The context is cleared on every exit path.
//!
//! Pool and storage failures go through recovery: the catalog reloads its
//! map and the caller gets a retryable error, or a fatal one when the reload
//! itself fails.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use waypoint_core::ShardKey;
use waypoint_core::config::CatalogConfig;
use waypoint_shard::{ShardCatalog, ShardContext};
use waypoint_state::{ShardStore, StateResult};

use crate::error::{ServiceError, ServiceResult};

#[derive(Clone)]
pub struct UnitRunner {
    catalog: Arc<ShardCatalog>,
    reload_on_failure: bool,
    retry_after: Duration,
}

impl UnitRunner {
    pub fn new(catalog: Arc<ShardCatalog>, config: &CatalogConfig) -> Self {
        Self {
            catalog,
            reload_on_failure: config.reload_on_failure,
            retry_after: Duration::from_secs(config.retry_after_secs),
        }
    }

    pub fn catalog(&self) -> &Arc<ShardCatalog> {
        &self.catalog
    }

    pub fn retry_after(&self) -> Duration {
        self.retry_after
    }

    /// Run `op` against the shard named by `shard`.
    pub async fn run<T, F>(&self, shard: ShardKey, op: F) -> ServiceResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&ShardStore) -> StateResult<T> + Send + 'static,
    {
        let mut context = ShardContext::new();
        let bound = context.bind(shard);

        let map = self.catalog.snapshot();
        let observed = map.generation();
        let (shard, pool) = match map.resolve_current(&bound) {
            Ok((shard, pool)) => (shard, pool.clone()),
            Err(e) => return Err(self.shard_failure(shard, observed, e.to_string()).await),
        };
        let conn = match pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => return Err(self.shard_failure(shard, observed, e.to_string()).await),
        };

        let result = tokio::task::spawn_blocking(move || op(&conn))
            .await
            .map_err(|e| ServiceError::Internal(format!("unit of work on shard {shard}: {e}")))?;

        match result {
            Ok(value) => Ok(value),
            Err(e) if e.is_storage_failure() => {
                Err(self.shard_failure(shard, observed, e.to_string()).await)
            }
            Err(e) => {
                debug!(shard = %shard, error = %e, "unit of work rejected");
                Err(e.into())
            }
        }
    }

    /// Turn a pool or storage failure seen on the map of generation
    /// `observed` into the caller-visible error, reloading the shard map
    /// first when configured to.
    ///
    /// The reload runs on the blocking pool. Failures on a map that has
    /// already been replaced do not reload again.
    pub async fn shard_failure(
        &self,
        shard: ShardKey,
        observed: u64,
        reason: String,
    ) -> ServiceError {
        if !self.reload_on_failure {
            warn!(shard = %shard, %reason, "shard failure, reload disabled");
            return self.unavailable(shard, reason);
        }
        let catalog = Arc::clone(&self.catalog);
        let cause = reason.clone();
        let recovered =
            tokio::task::spawn_blocking(move || catalog.recover(shard, observed, &cause)).await;
        match recovered {
            Ok(Ok(_)) => self.unavailable(shard, reason),
            Ok(Err(e)) => ServiceError::ShardMapReload(e.to_string()),
            Err(e) => ServiceError::ShardMapReload(format!("reload task failed: {e}")),
        }
    }

    fn unavailable(&self, shard: ShardKey, reason: String) -> ServiceError {
        ServiceError::ShardUnavailable {
            shard,
            reason,
            retry_after: self.retry_after,
        }
    }
}
