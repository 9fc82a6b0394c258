//! Followgraph CLI: run follow graph operations against a data directory.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use followgraph::{EntityId, EntityRef, FollowGraph, FollowGraphConfig};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "followgraph", version, about = "Follow graph store CLI")]
struct Cli {
    /// RocksDB data directory (overrides FOLLOWGRAPH_DATA_PATH)
    #[arg(long, global = true)]
    data_path: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Make a user follow a user (or a tag with --tag)
    Follow {
        follower: Uuid,
        target: Uuid,
        #[arg(long)]
        tag: bool,
        /// Succeed silently if already following
        #[arg(long)]
        ensure: bool,
    },
    /// Remove a follow edge
    Unfollow {
        follower: Uuid,
        target: Uuid,
        #[arg(long)]
        tag: bool,
    },
    /// Check whether a follow edge exists
    IsFollowing {
        follower: Uuid,
        target: Uuid,
        #[arg(long)]
        tag: bool,
    },
    /// List followers of a user (or a tag with --tag)
    Followers {
        target: Uuid,
        #[arg(long)]
        tag: bool,
    },
    /// List what a user follows (users, or tags with --tag)
    Following {
        follower: Uuid,
        #[arg(long)]
        tag: bool,
    },
    /// Drop every edge of a deleted user
    PurgeUser { id: Uuid },
    /// Drop every edge of a deleted tag
    PurgeTag { id: Uuid },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = FollowGraphConfig::from_env().context("loading configuration")?;
    if let Some(path) = cli.data_path.clone() {
        config.data_path = Some(path);
    }

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_writer(std::io::stderr)
        .init();

    if config.data_path.is_none() {
        bail!("a data path is required: pass --data-path or set FOLLOWGRAPH_DATA_PATH");
    }

    let graph = FollowGraph::open(&config).context("opening follow graph")?;
    run(&graph, cli.command, &cli.format)
}

fn target_ref(id: Uuid, tag: bool) -> EntityRef {
    if tag {
        EntityRef::tag(id)
    } else {
        EntityRef::user(id)
    }
}

fn run(graph: &FollowGraph, command: Commands, format: &OutputFormat) -> anyhow::Result<()> {
    match command {
        Commands::Follow { follower, target, tag, ensure } => {
            let follower = EntityRef::user(follower);
            let target = target_ref(target, tag);
            let created = match (tag, ensure) {
                (false, false) => graph.users().add_edge(follower, target).map(|_| true)?,
                (false, true) => graph.users().ensure_edge(follower, target)?,
                (true, false) => graph.tags().add_edge(follower, target).map(|_| true)?,
                (true, true) => graph.tags().ensure_edge(follower, target)?,
            };
            print_flag(format, "created", created)
        }
        Commands::Unfollow { follower, target, tag } => {
            let follower = EntityRef::user(follower);
            let target = target_ref(target, tag);
            if tag {
                graph.tags().remove_edge(follower, target)?;
            } else {
                graph.users().remove_edge(follower, target)?;
            }
            print_flag(format, "removed", true)
        }
        Commands::IsFollowing { follower, target, tag } => {
            let follower = EntityRef::user(follower);
            let target = target_ref(target, tag);
            let following = if tag {
                graph.tags().is_edge(follower, target)?
            } else {
                graph.users().is_edge(follower, target)?
            };
            print_flag(format, "following", following)
        }
        Commands::Followers { target, tag } => {
            let target = target_ref(target, tag);
            let ids = if tag {
                graph.tags().list_followers(target)?
            } else {
                graph.users().list_followers(target)?
            };
            print_ids(format, "follower", &ids)
        }
        Commands::Following { follower, tag } => {
            let follower = EntityRef::user(follower);
            let ids = if tag {
                graph.tags().list_following(follower)?
            } else {
                graph.users().list_following(follower)?
            };
            print_ids(format, if tag { "tag" } else { "user" }, &ids)
        }
        Commands::PurgeUser { id } => {
            let removed = graph.remove_user(EntityId::new(id))?;
            print_count(format, removed)
        }
        Commands::PurgeTag { id } => {
            let removed = graph.remove_tag(EntityId::new(id))?;
            print_count(format, removed)
        }
    }
}

fn print_flag(format: &OutputFormat, key: &str, value: bool) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let mut obj = serde_json::Map::new();
            obj.insert(key.to_string(), serde_json::Value::Bool(value));
            println!("{}", serde_json::Value::Object(obj));
        }
        OutputFormat::Table => println!("{}: {}", key, value),
    }
    Ok(())
}

fn print_count(format: &OutputFormat, removed: usize) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "removed": removed })),
        OutputFormat::Table => println!("{} edge(s) removed", removed),
    }
    Ok(())
}

fn print_ids(format: &OutputFormat, header: &str, ids: &[EntityId]) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(ids)?);
        }
        OutputFormat::Table => {
            if ids.is_empty() {
                println!("(no results)");
                return Ok(());
            }

            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec![header]);
            for id in ids {
                table.add_row(vec![id.to_string()]);
            }

            println!("{}", table);
            println!("{} row(s)", ids.len());
        }
    }
    Ok(())
}
