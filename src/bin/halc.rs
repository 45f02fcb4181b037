//! halc: hal-cache command-line client
//!
//! Browse a HAL+JSON API through the cache: fetch, follow links, list
//! collection items and issue mutations.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hal_cache::{CacheConfig, Facade, HalCache, HypermediaApi, Target};
use serde_json::Value;

/// hal-cache command-line client
#[derive(Parser)]
#[command(name = "halc")]
#[command(version)]
#[command(about = "Browse a HAL+JSON API through hal-cache")]
struct Args {
    /// Config file (default: <config dir>/hal-cache/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// API root, overrides the config file
    #[arg(short, long, env = "HAL_CACHE_API_ROOT")]
    api_root: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch an entity and print it
    Get {
        /// URI of the entity (default: API root)
        #[arg(default_value = "")]
        uri: String,
        /// Force a reload
        #[arg(long)]
        reload: bool,
        /// Follow these relations in order
        #[arg(short, long)]
        follow: Vec<String>,
    },

    /// List the items of a collection
    Items {
        /// URI of the collection
        uri: String,
    },

    /// Create an entity under a collection
    Post {
        /// URI of the collection
        uri: String,
        /// JSON body
        data: String,
    },

    /// Update fields of an entity
    Patch {
        /// URI of the entity
        uri: String,
        /// JSON body
        data: String,
    },

    /// Delete an entity
    Delete {
        /// URI of the entity
        uri: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = CacheConfig::load(args.config.as_deref())?;
    if let Some(api_root) = args.api_root {
        config.api_root = api_root;
    }
    let cache = HalCache::builder().config(config).build()?;

    run(&cache, args.command).await
}

async fn run(api: &dyn HypermediaApi, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Get {
            uri,
            reload,
            follow,
        } => {
            let mut current = resolve(api.get(Target::from(uri), reload)?).await?;
            for relation in &follow {
                let next = current
                    .relation(relation)
                    .ok_or_else(|| format!("no relation \"{relation}\""))?;
                current = resolve(next).await?;
            }
            print(&current)?;
        }

        Command::Items { uri } => {
            let collection = resolve(api.get(Target::from(uri), false)?).await?;
            let items = collection.items().loaded().await?;
            if items.is_empty() {
                println!("no items");
            }
            for item in items {
                let item = resolve(item).await?;
                println!("{}", item.self_uri().unwrap_or("[unknown]"));
            }
        }

        Command::Post { uri, data } => {
            let created = api.post(Target::from(uri), &parse(&data)?).await?;
            print(&created)?;
        }

        Command::Patch { uri, data } => {
            let updated = api.patch(Target::from(uri), &parse(&data)?).await?;
            print(&updated)?;
        }

        Command::Delete { uri } => {
            api.delete(Target::from(uri.clone())).await?;
            println!("deleted {uri}");
        }
    }
    Ok(())
}

/// Wait for a facade to finish loading.
async fn resolve(facade: Facade) -> Result<Facade, Box<dyn std::error::Error>> {
    facade
        .loaded()
        .await?
        .ok_or_else(|| "entity did not resolve".into())
}

fn parse(data: &str) -> Result<Value, Box<dyn std::error::Error>> {
    Ok(serde_json::from_str(data)?)
}

fn print(facade: &Facade) -> Result<(), Box<dyn std::error::Error>> {
    let value = facade.to_value().unwrap_or(Value::Null);
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
