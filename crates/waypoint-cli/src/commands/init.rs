//! `waypoint init`: scaffold a local 16-shard deployment.

use std::path::Path;

use anyhow::bail;
use waypoint_core::WaypointConfig;

pub fn init(path: &Path) -> anyhow::Result<()> {
    let config_path = path.join("waypoint.toml");
    if config_path.exists() {
        bail!("{} already exists", config_path.display());
    }

    let data_dir = path.join("data");
    std::fs::create_dir_all(&data_dir)?;

    let mapping_path = path.join("mapping.json");
    let mapping = WaypointConfig::scaffold_mapping(&data_dir);
    std::fs::write(&mapping_path, serde_json::to_string_pretty(&mapping)?)?;
    println!("✓ Generated {} ({} shards)", mapping_path.display(), mapping.len());

    // Relative, so the directory can be moved as a whole.
    let config = WaypointConfig::scaffold(Path::new("mapping.json"));
    std::fs::write(&config_path, config.to_toml_string()?)?;
    println!("✓ Generated {}", config_path.display());

    Ok(())
}
