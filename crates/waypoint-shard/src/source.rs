//! Shard map sources.
//!
//! A source yields the raw shard key → endpoint mapping. Every source is
//! validated the same way: all keys must be shard keys, all endpoints must
//! parse, and the mapping must not be empty.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use waypoint_core::config::SourceConfig;
use waypoint_core::{Endpoint, ShardKey};
use waypoint_state::CatalogStore;

use crate::error::{ShardError, ShardResult};

/// Anything that can produce a complete shard mapping.
pub trait MapSource: Send + Sync {
    /// Short description for logs, e.g. `file:/etc/waypoint/mapping.json`.
    fn describe(&self) -> String;

    /// Raw rows as stored by the source.
    fn fetch(&self) -> ShardResult<BTreeMap<String, String>>;

    /// Fetch and validate.
    fn load_mapping(&self) -> ShardResult<BTreeMap<ShardKey, Endpoint>> {
        let mapping = parse_mapping(self.fetch()?)?;
        debug!(source = %self.describe(), shards = mapping.len(), "shard mapping loaded");
        Ok(mapping)
    }
}

/// Validate raw rows into a typed mapping.
pub fn parse_mapping(raw: BTreeMap<String, String>) -> ShardResult<BTreeMap<ShardKey, Endpoint>> {
    if raw.is_empty() {
        return Err(ShardError::Source("shard mapping is empty".to_string()));
    }
    raw.into_iter()
        .map(|(key, uri)| {
            let shard: ShardKey = key
                .parse()
                .map_err(|_| ShardError::InvalidKey { key: key.clone() })?;
            let endpoint = Endpoint::parse(&uri)
                .map_err(|source| ShardError::InvalidEndpoint { key, source })?;
            Ok((shard, endpoint))
        })
        .collect()
}

/// JSON object file: `{ "0": "redb:///data/db_0.redb", ... }`.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MapSource for FileSource {
    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn fetch(&self) -> ShardResult<BTreeMap<String, String>> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            ShardError::Source(format!("reading {}: {e}", self.path.display()))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            ShardError::Source(format!("parsing {}: {e}", self.path.display()))
        })
    }
}

/// Mapping held in memory, typically from the config file.
pub struct InlineSource {
    shards: BTreeMap<String, String>,
}

impl InlineSource {
    pub fn new(shards: BTreeMap<String, String>) -> Self {
        Self { shards }
    }
}

impl MapSource for InlineSource {
    fn describe(&self) -> String {
        format!("inline:{} entries", self.shards.len())
    }

    fn fetch(&self) -> ShardResult<BTreeMap<String, String>> {
        Ok(self.shards.clone())
    }
}

/// Rows of the `shard_catalog` control table in a registry database.
pub struct ControlTableSource {
    store: CatalogStore,
    label: String,
}

impl ControlTableSource {
    pub fn new(store: CatalogStore, label: impl Into<String>) -> Self {
        Self {
            store,
            label: label.into(),
        }
    }

    /// Open the registry database named by `endpoint`.
    pub fn open(endpoint: &Endpoint) -> ShardResult<Self> {
        let store = match endpoint {
            Endpoint::Memory { .. } => CatalogStore::open_in_memory()?,
            Endpoint::File { path } => CatalogStore::open(path)?,
        };
        Ok(Self::new(store, endpoint.to_string()))
    }

    /// The registry, for operators upserting rows.
    pub fn store(&self) -> &CatalogStore {
        &self.store
    }
}

impl MapSource for ControlTableSource {
    fn describe(&self) -> String {
        format!("control_table:{}", self.label)
    }

    fn fetch(&self) -> ShardResult<BTreeMap<String, String>> {
        Ok(self.store.list_endpoints()?)
    }
}

/// Build the configured source.
pub fn from_config(config: &SourceConfig) -> ShardResult<Box<dyn MapSource>> {
    let source: Box<dyn MapSource> = match config {
        SourceConfig::File { path } => Box::new(FileSource::new(path.clone())),
        SourceConfig::Inline { shards } => Box::new(InlineSource::new(shards.clone())),
        SourceConfig::ControlTable { endpoint } => {
            let endpoint = Endpoint::parse(endpoint).map_err(|source| {
                ShardError::InvalidEndpoint {
                    key: "control_table".to_string(),
                    source,
                }
            })?;
            Box::new(ControlTableSource::open(&endpoint)?)
        }
    };
    Ok(source)
}
