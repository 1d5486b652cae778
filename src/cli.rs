//! CLI mode implementation
//!
//! Every option can also come from the environment (or a `.env` file), which
//! is how the register credentials are normally supplied.

use crate::client::DEFAULT_PROXY_URL;
use crate::registry::DEFAULT_REGISTRY_URL;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Company lookup proxy and client
#[derive(Parser)]
#[command(name = "company-lookup")]
#[command(about = "Cached company-name lookup proxy with fuzzy search", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output (no short flag to avoid conflicts)
    #[arg(long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the lookup proxy (default when no command is given)
    Serve(ServeArgs),
    /// Search company names through the proxy, with local fallback
    Search(SearchArgs),
    /// Pull the default company set from the register into the server cache
    Refresh(RefreshArgs),
    /// Show the state of a cache file
    Status(StatusArgs),
}

/// Proxy server arguments
#[derive(Parser, Debug, Clone)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[command(flatten)]
    pub registry: RegistryArgs,

    #[command(flatten)]
    pub cache: CacheArgs,
}

/// Upstream register connection
#[derive(Args, Debug, Clone)]
pub struct RegistryArgs {
    /// Register API base URL
    #[arg(long, env = "FCA_API_BASE_URL", default_value = DEFAULT_REGISTRY_URL)]
    pub registry_url: String,

    /// Register account email (x-auth-email)
    #[arg(long, env = "FCA_API_USERNAME", default_value = "", hide_env_values = true)]
    pub registry_username: String,

    /// Register API key (x-auth-key)
    #[arg(long, env = "FCA_API_KEY", default_value = "", hide_env_values = true)]
    pub registry_key: String,

    /// Register request timeout in seconds
    #[arg(long, env = "REGISTRY_TIMEOUT_SECS", default_value_t = 10)]
    pub registry_timeout: u64,
}

/// Server cache location and lifetime
#[derive(Args, Debug, Clone)]
pub struct CacheArgs {
    /// Cache file (defaults to the user cache directory)
    #[arg(long, env = "COMPANY_CACHE_FILE")]
    pub cache_file: Option<PathBuf>,

    /// Hours before cached data is considered stale
    #[arg(long, env = "CACHE_TTL_HOURS", default_value_t = 168)]
    pub ttl_hours: u64,
}

/// Client search arguments
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Company name or fragment
    #[arg(short = 'q', long)]
    pub query: String,

    /// Maximum number of results (default 5, max 100)
    #[arg(short = 'l', long, default_value_t = 5)]
    pub limit: usize,

    /// Base URL of the lookup proxy
    #[arg(long, env = "COMPANY_PROXY_URL", default_value = DEFAULT_PROXY_URL)]
    pub proxy_url: String,

    /// Proxy request timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout: u64,

    /// Local client cache file (defaults to the user cache directory)
    #[arg(long, env = "COMPANY_CLIENT_CACHE_FILE")]
    pub client_cache: Option<PathBuf>,

    /// Keep the local cache in memory only for this run
    #[arg(long)]
    pub ephemeral: bool,
}

/// Refresh command arguments
#[derive(Parser, Debug, Clone)]
pub struct RefreshArgs {
    #[command(flatten)]
    pub registry: RegistryArgs,

    #[command(flatten)]
    pub cache: CacheArgs,
}

/// Status command arguments
#[derive(Parser, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub cache: CacheArgs,

    /// Inspect the client cache instead of the server cache
    #[arg(long)]
    pub client: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_search_args() {
        let cli = Cli::try_parse_from(["company-lookup", "search", "-q", "aviva", "-l", "3", "--ephemeral"]).unwrap();
        match cli.command {
            Some(Commands::Search(args)) => {
                assert_eq!(args.query, "aviva");
                assert_eq!(args.limit, 3);
                assert!(args.ephemeral);
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn test_serve_flags() {
        let cli = Cli::try_parse_from([
            "company-lookup",
            "--verbose",
            "serve",
            "--port",
            "8080",
            "--cache-file",
            "/tmp/cache.json",
            "--ttl-hours",
            "24",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Some(Commands::Serve(args)) => {
                assert_eq!(args.port, 8080);
                assert_eq!(args.cache.cache_file, Some(PathBuf::from("/tmp/cache.json")));
                assert_eq!(args.cache.ttl_hours, 24);
            }
            _ => panic!("expected serve command"),
        }
    }

    #[test]
    fn test_no_command_is_allowed() {
        let cli = Cli::try_parse_from(["company-lookup"]).unwrap();
        assert!(cli.command.is_none());
    }
}
