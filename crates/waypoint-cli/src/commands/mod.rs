pub mod init;
pub mod plans;
pub mod shards;

use std::path::Path;

use anyhow::Context;
use waypoint_core::WaypointConfig;
use waypoint_service::Waypoint;

/// Load the config and the first shard map.
pub fn open(config: &Path) -> anyhow::Result<Waypoint> {
    let config = WaypointConfig::from_file(config)
        .with_context(|| format!("reading {}", config.display()))?;
    Ok(Waypoint::open(&config)?)
}
