//! Plan listings and sample data.

use std::path::Path;

use tracing::info;
use waypoint_core::{NewItem, NewPlan, PageRequest, SortOrder};

pub async fn list(
    config: &Path,
    offset: usize,
    limit: usize,
    sort: &[String],
    format: &str,
) -> anyhow::Result<()> {
    let waypoint = super::open(config)?;
    let mut request = PageRequest::new(offset, limit);
    request.sort = sort.iter().map(|s| SortOrder::parse(s)).collect();

    let page = waypoint.plans().list_plans(&request).await?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&page)?),
        _ => {
            println!("{:<36}  {:<10}  {:<24}  {}", "ID", "START", "TITLE", "VERSION");
            for plan in &page.content {
                let start = plan
                    .start_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{:<36}  {:<10}  {:<24}  {}", plan.id, start, plan.title, plan.version);
            }
            println!(
                "\n{} of {} plans, page {} of {}",
                page.content.len(),
                page.total_elements,
                offset / limit + 1,
                page.total_pages()
            );
        }
    }
    Ok(())
}

pub async fn seed(config: &Path, plans: usize, items: usize) -> anyhow::Result<()> {
    let waypoint = super::open(config)?;

    for n in 0..plans {
        let plan = waypoint
            .plans()
            .create_plan(NewPlan {
                title: format!("Sample plan {}", n + 1),
                ..Default::default()
            })
            .await?;
        for i in 0..items {
            waypoint
                .items()
                .add_item(
                    plan.id,
                    NewItem {
                        name: format!("Stop {}", i + 1),
                        ..Default::default()
                    },
                )
                .await?;
        }
        info!(plan_id = %plan.id, shard = %plan.shard_key(), items, "seeded plan");
    }

    println!("✓ Seeded {plans} plans with {items} items each");
    Ok(())
}
