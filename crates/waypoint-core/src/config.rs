//! waypoint.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::shard_key::{DEFAULT_MAX_DRAWS, ShardKey};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WaypointConfig {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub ids: IdConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Preferred fallback shard for callers without a shard context.
    pub default_shard: Option<ShardKey>,
    /// Reload the shard map when a shard's pool fails.
    #[serde(default = "default_true")]
    pub reload_on_failure: bool,
    /// Retry hint returned with shard-unavailable errors.
    #[serde(default = "default_retry_after_secs")]
    pub retry_after_secs: u64,
    pub source: Option<SourceConfig>,
}

/// Where the shard map is loaded from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// JSON object of shard key → endpoint.
    File { path: PathBuf },
    /// Mapping given directly in the config.
    Inline { shards: BTreeMap<String, String> },
    /// `shard_catalog` table in a registry database.
    ControlTable { endpoint: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_shard_timeout_ms")]
    pub shard_timeout_ms: u64,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdConfig {
    #[serde(default = "default_max_draws")]
    pub max_draws: u32,
}

fn default_true() -> bool {
    true
}

fn default_retry_after_secs() -> u64 {
    1
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout_ms() -> u64 {
    2_000
}

fn default_shard_timeout_ms() -> u64 {
    5_000
}

fn default_max_page_size() -> usize {
    2_000
}

fn default_max_draws() -> u32 {
    DEFAULT_MAX_DRAWS
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            default_shard: None,
            reload_on_failure: true,
            retry_after_secs: default_retry_after_secs(),
            source: None,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
        }
    }
}

impl PoolConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            shard_timeout_ms: default_shard_timeout_ms(),
            max_page_size: default_max_page_size(),
        }
    }
}

impl QueryConfig {
    pub fn shard_timeout(&self) -> Duration {
        Duration::from_millis(self.shard_timeout_ms)
    }
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            max_draws: default_max_draws(),
        }
    }
}

impl WaypointConfig {
    /// Load from a file. A relative file-source path is resolved against
    /// the config file's directory.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(SourceConfig::File { path: source }) = &mut config.catalog.source {
            if source.is_relative() {
                if let Some(dir) = path.parent() {
                    *source = dir.join(&*source);
                }
            }
        }
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Scaffold a config reading its shard map from `mapping`.
    pub fn scaffold(mapping: &Path) -> Self {
        WaypointConfig {
            catalog: CatalogConfig {
                default_shard: ShardKey::from_nibble(0),
                source: Some(SourceConfig::File {
                    path: mapping.to_path_buf(),
                }),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// A mapping of all 16 keys to on-disk databases under `data_dir`.
    pub fn scaffold_mapping(data_dir: &Path) -> BTreeMap<String, String> {
        ShardKey::all()
            .map(|key| {
                let path = data_dir.join(format!("db_{key}.redb"));
                (key.to_string(), format!("redb://{}", path.display()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal() {
        let config = WaypointConfig::from_toml_str("").unwrap();
        assert_eq!(config.pool.max_connections, 5);
        assert_eq!(config.query.shard_timeout(), Duration::from_secs(5));
        assert_eq!(config.ids.max_draws, 1024);
        assert!(config.catalog.reload_on_failure);
        assert!(config.catalog.source.is_none());
    }

    #[test]
    fn test_parse_full() {
        let toml_str = r#"
[catalog]
default_shard = "a"
reload_on_failure = false

[catalog.source]
type = "inline"
shards = { "0" = "memory://db_0", "a" = "memory://db_a" }

[pool]
max_connections = 2
acquire_timeout_ms = 50

[query]
shard_timeout_ms = 100
"#;
        let config = WaypointConfig::from_toml_str(toml_str).unwrap();
        assert_eq!(config.catalog.default_shard.unwrap().to_string(), "a");
        assert!(!config.catalog.reload_on_failure);
        match config.catalog.source.unwrap() {
            SourceConfig::Inline { shards } => assert_eq!(shards.len(), 2),
            other => panic!("unexpected source {other:?}"),
        }
        assert_eq!(config.pool.acquire_timeout(), Duration::from_millis(50));
        assert_eq!(config.query.max_page_size, 2000);
    }

    #[test]
    fn test_relative_file_source_resolved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("waypoint.toml");
        std::fs::write(
            &path,
            "[catalog.source]\ntype = \"file\"\npath = \"mapping.json\"\n",
        )
        .unwrap();

        let config = WaypointConfig::from_file(&path).unwrap();
        assert_eq!(
            config.catalog.source,
            Some(SourceConfig::File {
                path: dir.path().join("mapping.json")
            })
        );
    }

    #[test]
    fn test_scaffold_round_trips() {
        let config = WaypointConfig::scaffold(Path::new("mapping.json"));
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("mapping.json"));
        let back = WaypointConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(back.catalog.source, config.catalog.source);

        let mapping = WaypointConfig::scaffold_mapping(Path::new("/data"));
        assert_eq!(mapping.len(), 16);
        assert_eq!(mapping["f"], "redb:///data/db_f.redb");
    }
}
