use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

use modularity::config::{load_config, AppConfig};
use modularity::discovery::{CacheReadError, HandlerLocator, RouteCacheStore};

#[derive(Parser)]
#[command(name = "modularity-cli")]
#[command(about = "Inspect module route discovery and its caches", long_about = None)]
struct Cli {
    /// Admin API base URL (remote commands)
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Admin API key (remote commands)
    #[arg(short, long, env = "MODULARITY_ADMIN_KEY", default_value = "")]
    key: String,

    /// Configuration file (offline commands)
    #[arg(short, long, default_value = "modularity.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show bootstrap status of a running server
    Status,
    /// List per-module discovery state of a running server
    Modules,
    /// List routes registered on a running server
    Routes,
    /// Scan a module's handler directory and compare with its durable cache
    Scan { module: String },
    /// Manage durable route caches
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Print a module's cached route table
    Show { module: String },
    /// Delete one module's cache, or every cache when no module is given
    Clear { module: Option<String> },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Status => remote(&cli.url, &cli.key, "/admin/status").await?,
        Commands::Modules => remote(&cli.url, &cli.key, "/admin/modules").await?,
        Commands::Routes => remote(&cli.url, &cli.key, "/admin/routes").await?,
        Commands::Scan { module } => {
            let config = load_config(&cli.config)?;
            print_json(&scan(&config, &module)?)?;
        }
        Commands::Cache { command } => {
            let config = load_config(&cli.config)?;
            let store = RouteCacheStore::from_config(&config.cache);
            match command {
                CacheCommands::Show { module } => {
                    let table = store.read(&module)?;
                    print_json(&json!({
                        "module": module,
                        "artifact": store.artifact_path(&module),
                        "signature": table.signature,
                        "routes": table.routes,
                    }))?;
                }
                CacheCommands::Clear { module: Some(module) } => {
                    if store.clear(&module)? {
                        println!("Removed {}", store.artifact_path(&module).display());
                    } else {
                        println!("No cache for module {module}");
                    }
                }
                CacheCommands::Clear { module: None } => {
                    let removed = store.clear_all()?;
                    println!("Removed {removed} cache file(s) from {}", store.dir().display());
                }
            }
        }
    }

    Ok(())
}

fn scan(config: &AppConfig, module: &str) -> Result<Value, Box<dyn std::error::Error>> {
    let locator = HandlerLocator::from_config(&config.discovery);
    let store = RouteCacheStore::from_config(&config.cache);
    let scan = locator.scan(module)?;

    let durable = match store.read(module) {
        Ok(table) if table.is_fresh(&scan.signature) => "fresh".to_string(),
        Ok(table) => format!("stale (cached {})", table.signature),
        Err(CacheReadError::Missing(_)) => "missing".to_string(),
        Err(e) => format!("unreadable: {e}"),
    };

    let units: Vec<Value> = scan
        .units
        .iter()
        .map(|unit| json!({ "path": unit.path, "last_modified": unit.last_modified }))
        .collect();

    Ok(json!({
        "module": module,
        "handler_path": locator.handler_path(module),
        "signature": scan.signature,
        "units": units,
        "durable": durable,
    }))
}

async fn remote(url: &str, key: &str, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {key}"))?);

    let res = reqwest::Client::new()
        .get(format!("{}{}", url.trim_end_matches('/'), path))
        .headers(headers)
        .send()
        .await?;

    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    print_json(&json)
}

fn print_json(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
