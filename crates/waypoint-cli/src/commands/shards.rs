//! Shard map and per-shard inspection.

use std::path::Path;

use serde_json::json;
use tracing::info;

pub fn shards(config: &Path, format: &str) -> anyhow::Result<()> {
    let waypoint = super::open(config)?;
    let map = waypoint.catalog().snapshot();
    let health = waypoint.health();

    match format {
        "json" => {
            let shards: serde_json::Map<String, serde_json::Value> = map
                .iter()
                .map(|(key, pool)| (key.to_string(), json!(pool.endpoint().to_string())))
                .collect();
            let out = json!({ "health": health, "shards": shards });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        _ => {
            println!("{:<6} {:<6} {}", "SHARD", "CONNS", "ENDPOINT");
            for (key, pool) in map.iter() {
                let marker = if Some(key) == map.default_key() { " (default)" } else { "" };
                println!(
                    "{:<6} {:<6} {}{marker}",
                    key.to_string(),
                    pool.max_connections(),
                    pool.endpoint()
                );
            }
            println!("\n{} shards, state: {:?}", health.shards, health.state);
        }
    }
    Ok(())
}

pub async fn stats(config: &Path, format: &str) -> anyhow::Result<()> {
    let waypoint = super::open(config)?;
    let stats = waypoint.plans().shard_stats().await?;

    match format {
        "json" => {
            let out: serde_json::Map<String, serde_json::Value> = stats
                .iter()
                .map(|(key, s)| -> anyhow::Result<_> {
                    Ok((key.to_string(), serde_json::to_value(s)?))
                })
                .collect::<anyhow::Result<_>>()?;
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        _ => {
            println!("{:<6} {:>8} {:>8}", "SHARD", "PLANS", "ITEMS");
            for (key, s) in &stats {
                println!("{:<6} {:>8} {:>8}", key.to_string(), s.plans, s.items);
            }
            let plans: u64 = stats.values().map(|s| s.plans).sum();
            let items: u64 = stats.values().map(|s| s.items).sum();
            println!("{:<6} {:>8} {:>8}", "total", plans, items);
        }
    }
    Ok(())
}

/// Load the map source twice in this process: once on open, once on reload.
pub fn reload(config: &Path) -> anyhow::Result<()> {
    let waypoint = super::open(config)?;
    let shards = waypoint.reload()?;
    info!(shards, "shard map reloaded");
    println!(
        "✓ Source {} loads and reloads {shards} shards",
        waypoint.catalog().source().describe()
    );
    Ok(())
}
