use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "waypoint",
    about = "Waypoint: sharded trip plan storage",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Path to waypoint.toml
    #[arg(short, long, global = true, default_value = "waypoint.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a waypoint.toml and a 16-shard mapping backed by local files.
    Init {
        /// Directory for the config, mapping, and shard databases
        #[arg(short, long, default_value = ".")]
        path: PathBuf,
    },
    /// Show the live shard map and catalog health
    Shards {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Plan and item counts per shard
    Stats {
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Plan listings across all shards
    Plans {
        #[command(subcommand)]
        action: PlansAction,
    },
    /// Create sample plans with items spread over the mapped shards
    Seed {
        #[arg(short = 'n', long, default_value_t = 10)]
        plans: usize,
        /// Items added to each plan
        #[arg(short, long, default_value_t = 3)]
        items: usize,
    },
    /// Check the configured shard map source: load it, then reload it once
    Reload,
}

#[derive(Subcommand)]
enum PlansAction {
    /// One globally sorted page of plans
    List {
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Sort order as field,dir (e.g. startDate,desc). Repeatable.
        #[arg(short, long)]
        sort: Vec<String>,
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("waypoint=info".parse()?)
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { path } => commands::init::init(&path),
        Commands::Shards { format } => commands::shards::shards(&cli.config, &format),
        Commands::Stats { format } => commands::shards::stats(&cli.config, &format).await,
        Commands::Plans { action } => match action {
            PlansAction::List {
                offset,
                limit,
                sort,
                format,
            } => commands::plans::list(&cli.config, offset, limit, &sort, &format).await,
        },
        Commands::Seed { plans, items } => {
            commands::plans::seed(&cli.config, plans, items).await
        }
        Commands::Reload => commands::shards::reload(&cli.config),
    }
}
