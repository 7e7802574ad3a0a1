//! CatalogStore: the registry database holding the shard control table.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::StateResult;
use crate::store::{create_database, create_in_memory_database};
use crate::tables::SHARD_CATALOG;

/// Registry of `shard_key` → `endpoint` rows.
#[derive(Clone)]
pub struct CatalogStore {
    db: Arc<Database>,
}

impl CatalogStore {
    pub fn open(path: &Path) -> StateResult<Self> {
        let store = Self {
            db: Arc::new(create_database(path)?),
        };
        store.ensure_tables()?;
        debug!(?path, "catalog store opened");
        Ok(store)
    }

    pub fn open_in_memory() -> StateResult<Self> {
        let store = Self {
            db: Arc::new(create_in_memory_database()?),
        };
        store.ensure_tables()?;
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(SHARD_CATALOG).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Insert or replace the endpoint for a shard key.
    pub fn put_endpoint(&self, shard_key: &str, endpoint: &str) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(SHARD_CATALOG).map_err(map_err!(Table))?;
            table.insert(shard_key, endpoint).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%shard_key, %endpoint, "catalog row stored");
        Ok(())
    }

    /// Remove a shard key. Returns true if a row existed.
    pub fn remove_endpoint(&self, shard_key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed = {
            let mut table = txn.open_table(SHARD_CATALOG).map_err(map_err!(Table))?;
            table.remove(shard_key).map_err(map_err!(Write))?.is_some()
        };
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    /// Every row, keyed by shard key. Rows are returned as stored; callers
    /// validate keys and endpoints.
    pub fn list_endpoints(&self) -> StateResult<BTreeMap<String, String>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(SHARD_CATALOG).map_err(map_err!(Table))?;
        let mut rows = BTreeMap::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            rows.insert(key.value().to_string(), value.value().to_string());
        }
        Ok(rows)
    }
}
