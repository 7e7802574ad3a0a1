//! Per-shard connection pool.
//!
//! A pool owns one opened shard database and a semaphore sized to
//! `max_connections`. Holding a permit is holding a connection. Closing the
//! semaphore drains the pool: queued and future acquisitions fail, while
//! connections already handed out finish normally.

use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

use waypoint_core::Endpoint;
use waypoint_core::config::PoolConfig;
use waypoint_state::ShardStore;

use crate::error::{ShardError, ShardResult};

struct PoolInner {
    endpoint: Endpoint,
    store: ShardStore,
    permits: Arc<Semaphore>,
    max_connections: u32,
    acquire_timeout: Duration,
}

/// Reference-counted handle to one shard's pool.
#[derive(Clone)]
pub struct ShardPool {
    inner: Arc<PoolInner>,
}

impl std::fmt::Debug for ShardPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardPool")
            .field("endpoint", &self.inner.endpoint.to_string())
            .field("available", &self.available())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ShardPool {
    /// Open the database behind `endpoint` and wrap it in a pool.
    pub fn connect(endpoint: &Endpoint, config: &PoolConfig) -> ShardResult<Self> {
        let store = match endpoint {
            Endpoint::Memory { .. } => ShardStore::open_in_memory(),
            Endpoint::File { path } => ShardStore::open(path),
        }
        .map_err(|e| ShardError::Unavailable {
            shard: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        info!(endpoint = %endpoint, max_connections = config.max_connections, "shard pool opened");
        Ok(Self::with_store(endpoint.clone(), store, config))
    }

    fn with_store(endpoint: Endpoint, store: ShardStore, config: &PoolConfig) -> Self {
        let max_connections = config.max_connections.max(1);
        Self {
            inner: Arc::new(PoolInner {
                endpoint,
                store,
                permits: Arc::new(Semaphore::new(max_connections as usize)),
                max_connections,
                acquire_timeout: config.acquire_timeout(),
            }),
        }
    }

    /// A fresh pool over the same database, for replacing a drained pool
    /// without reopening the file.
    pub fn reconnect(&self, config: &PoolConfig) -> Self {
        debug!(endpoint = %self.inner.endpoint, "shard pool reconnected");
        Self::with_store(self.inner.endpoint.clone(), self.inner.store.clone(), config)
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    pub fn max_connections(&self) -> u32 {
        self.inner.max_connections
    }

    /// Connections currently free.
    pub fn available(&self) -> usize {
        self.inner.permits.available_permits()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.permits.is_closed()
    }

    /// Drain the pool. Subsequent acquisitions fail as unavailable.
    pub fn close(&self) {
        self.inner.permits.close();
        info!(endpoint = %self.inner.endpoint, "shard pool closed");
    }

    /// True when both handles point at the same pool.
    pub fn same_pool(&self, other: &ShardPool) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Take a connection, waiting at most the configured acquire timeout.
    pub async fn acquire(&self) -> ShardResult<ShardConn> {
        let shard = || self.inner.endpoint.to_string();
        let permit = tokio::time::timeout(
            self.inner.acquire_timeout,
            self.inner.permits.clone().acquire_owned(),
        )
        .await
        .map_err(|_| ShardError::AcquireTimeout {
            shard: shard(),
            waited_ms: self.inner.acquire_timeout.as_millis() as u64,
        })?
        .map_err(|_| ShardError::Unavailable {
            shard: shard(),
            reason: "pool closed".to_string(),
        })?;

        Ok(ShardConn {
            store: self.inner.store.clone(),
            _permit: permit,
        })
    }
}

/// A checked-out connection; returned to its pool on drop.
pub struct ShardConn {
    store: ShardStore,
    _permit: OwnedSemaphorePermit,
}

impl Deref for ShardConn {
    type Target = ShardStore;

    fn deref(&self) -> &ShardStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(name: &str) -> Endpoint {
        Endpoint::parse(&format!("memory://{name}")).unwrap()
    }

    fn small_pool() -> PoolConfig {
        PoolConfig {
            max_connections: 2,
            acquire_timeout_ms: 50,
        }
    }

    #[tokio::test]
    async fn acquire_and_release() {
        let pool = ShardPool::connect(&memory("db_a"), &small_pool()).unwrap();
        assert_eq!(pool.available(), 2);
        {
            let conn = pool.acquire().await.unwrap();
            assert_eq!(conn.count_plans().unwrap(), 0);
            assert_eq!(pool.available(), 1);
        }
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn exhausted_pool_times_out() {
        let pool = ShardPool::connect(&memory("db_a"), &small_pool()).unwrap();
        let _a = pool.acquire().await.unwrap();
        let _b = pool.acquire().await.unwrap();
        assert!(matches!(
            pool.acquire().await,
            Err(ShardError::AcquireTimeout { waited_ms: 50, .. })
        ));
    }

    #[tokio::test]
    async fn closed_pool_is_unavailable_but_lets_holders_finish() {
        let pool = ShardPool::connect(&memory("db_a"), &small_pool()).unwrap();
        let held = pool.acquire().await.unwrap();
        pool.close();

        assert!(matches!(
            pool.acquire().await,
            Err(ShardError::Unavailable { .. })
        ));
        assert_eq!(held.count_plans().unwrap(), 0);
    }

    #[tokio::test]
    async fn reconnect_shares_data() {
        let pool = ShardPool::connect(&memory("db_a"), &small_pool()).unwrap();
        let plan = waypoint_core::Plan::create(
            uuid::Uuid::new_v4(),
            waypoint_core::NewPlan {
                title: "kept".to_string(),
                ..Default::default()
            },
            chrono::Utc::now(),
        );
        pool.acquire().await.unwrap().insert_plan(&plan).unwrap();
        pool.close();

        let fresh = pool.reconnect(&small_pool());
        assert!(!fresh.is_closed());
        assert!(!fresh.same_pool(&pool));
        assert_eq!(fresh.acquire().await.unwrap().count_plans().unwrap(), 1);
    }
}
