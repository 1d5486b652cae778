//! company-lookup proxy & CLI
//!
//! Dual-mode application:
//! - Server mode (default): HTTP lookup proxy in front of the company register
//! - CLI mode: client-side search, cache refresh and cache status
//!
//! Both sides keep a persistent company cache and fall back to fuzzy
//! matching over cached and builtin names when the upstream is unavailable.

mod cache;
mod cli;
mod client;
mod company;
mod config;
mod error;
mod http;
mod orchestrator;
mod registry;
mod search;
mod server;

use anyhow::Result;
use cache::{CacheStorage, CompanyCache, FileStorage, MemoryStorage};
use clap::Parser;
use cli::{Cli, Commands, ServeArgs};
use client::{ClientSearch, ProxyClient};
use config::{CacheConfig, RegistryConfig, ServerConfig};
use error::{validate_limit, AppError};
use orchestrator::SearchOrchestrator;
use registry::RegistryClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; everything also comes from flags or the environment
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_level = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with_writer(std::io::stderr) // Log to stderr to keep stdout clean
        .init();

    let result = match cli.command {
        Some(Commands::Serve(args)) => run_server(args).await,
        None => run_server(ServeArgs::parse_from(["serve"])).await,
        Some(Commands::Search(args)) => execute_search_cli(args).await,
        Some(Commands::Refresh(args)) => execute_refresh_cli(args).await,
        Some(Commands::Status(args)) => execute_status_cli(args),
    };

    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(get_exit_code(&e));
        }
    }
}

fn open_cache(config: &CacheConfig) -> Arc<CompanyCache> {
    let storage: Box<dyn CacheStorage> = Box::new(FileStorage::new(&config.path));
    Arc::new(CompanyCache::open(storage, config.ttl))
}

fn server_orchestrator(registry: &RegistryConfig, cache: &CacheConfig) -> Result<SearchOrchestrator> {
    let source = RegistryClient::new(&registry.base_url, &registry.credentials, registry.timeout)?;
    Ok(SearchOrchestrator::new(open_cache(cache), Arc::new(source)))
}

/// Run the lookup proxy until shutdown
async fn run_server(args: ServeArgs) -> Result<String> {
    let config = ServerConfig::from_args(&args)?;
    info!("Using company cache at {}", config.cache.path.display());
    debug!("Register at {} ({:?})", config.registry.base_url, config.registry.credentials);

    let orchestrator = server_orchestrator(&config.registry, &config.cache)?;
    server::serve(config.addr, server::AppState { orchestrator: Arc::new(orchestrator) }).await?;
    Ok(String::new())
}

/// Execute search command in CLI mode
async fn execute_search_cli(args: cli::SearchArgs) -> Result<String> {
    let limit = validate_limit(args.limit)?;
    let proxy_url = config::parse_base_url(&args.proxy_url)?;
    let timeout = config::timeout_secs(args.timeout)?;

    let cache = if args.ephemeral {
        Arc::new(CompanyCache::open(Box::new(MemoryStorage::new()), cache::DEFAULT_TTL))
    } else {
        let hours = cache::DEFAULT_TTL.as_secs() / 3600;
        open_cache(&CacheConfig::client(args.client_cache.clone(), hours)?)
    };

    let client = ClientSearch::new(cache, Arc::new(ProxyClient::new(&proxy_url, timeout)?));

    // Start the refresh ourselves so this process can wait for it before exiting
    let refresh = client.refresh_in_background();
    let names = client.search(&args.query, limit).await;
    if let Some(handle) = refresh {
        if tokio::time::timeout(timeout, handle).await.is_err() {
            debug!("Background refresh still running at exit");
        }
    }

    if names.is_empty() {
        Ok(format!("No companies found matching \"{}\"", args.query.trim()))
    } else {
        Ok(names.join("\n"))
    }
}

/// Execute refresh command in CLI mode
async fn execute_refresh_cli(args: cli::RefreshArgs) -> Result<String> {
    let registry = RegistryConfig::from_args(&args.registry)?;
    let cache = CacheConfig::from_args(&args.cache)?;
    let orchestrator = server_orchestrator(&registry, &cache)?;

    let added = orchestrator.refresh().await.map_err(AppError::from)?;
    Ok(format!(
        "Added {} new companies ({} cached in {})",
        added,
        orchestrator.cache().len(),
        cache.path.display()
    ))
}

/// Execute status command in CLI mode
fn execute_status_cli(args: cli::StatusArgs) -> Result<String> {
    let config = if args.client {
        CacheConfig::client(args.cache.cache_file.clone(), args.cache.ttl_hours)?
    } else {
        CacheConfig::from_args(&args.cache)?
    };
    let cache = open_cache(&config);
    Ok(format_status(&config, &cache))
}

fn format_status(config: &CacheConfig, cache: &CompanyCache) -> String {
    let mut lines = vec![
        format!("Cache file: {}", config.path.display()),
        format!("Companies: {}", cache.len()),
    ];

    if cache.is_empty() {
        lines.push("Last updated: never".to_string());
    } else {
        let updated = chrono::DateTime::from_timestamp_millis(cache.last_updated())
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| cache.last_updated().to_string());
        lines.push(format!("Last updated: {}", updated));
        lines.push(format!("Age: {}", format_age(cache.age())));
    }

    lines.push(format!("Valid: {}", if cache.is_valid() { "yes" } else { "no" }));
    lines.join("\n")
}

fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    match secs {
        s if s < 60 => format!("{}s", s),
        s if s < 3600 => format!("{}m", s / 60),
        s if s < 86_400 => format!("{}h {}m", s / 3600, (s % 3600) / 60),
        s => format!("{}d {}h", s / 86_400, (s % 86_400) / 3600),
    }
}

/// Map errors to exit codes
fn get_exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<AppError>() {
        Some(AppError::InvalidInput(_)) | Some(AppError::ConfigError(_)) => 1,
        Some(AppError::Source(_)) => 2,
        Some(AppError::StorageError(_)) => 3,
        _ => {
            let err_str = err.to_string().to_lowercase();
            if err_str.contains("address") || err_str.contains("bind") {
                4 // Could not listen
            } else {
                5 // Other application errors
            }
        }
    }
}
