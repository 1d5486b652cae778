//! Resolved runtime configuration
//!
//! Turns parsed CLI/env arguments into typed settings, validating URLs and
//! resolving default cache locations.

use crate::cli::{CacheArgs, RegistryArgs, ServeArgs};
use crate::error::AppError;
use crate::registry::RegistryCredentials;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

const APP_DIR: &str = "company-lookup";
const SERVER_CACHE_FILE: &str = "company-cache.json";
const CLIENT_CACHE_FILE: &str = "client-cache.json";

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub base_url: Url,
    pub credentials: RegistryCredentials,
    pub timeout: Duration,
}

impl RegistryConfig {
    pub fn from_args(args: &RegistryArgs) -> Result<Self, AppError> {
        Ok(Self {
            base_url: parse_base_url(&args.registry_url)?,
            credentials: RegistryCredentials {
                email: args.registry_username.trim().to_string(),
                key: args.registry_key.trim().to_string(),
            },
            timeout: timeout_secs(args.registry_timeout)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub path: PathBuf,
    pub ttl: Duration,
}

impl CacheConfig {
    /// Server cache settings; the file defaults to the user cache directory
    pub fn from_args(args: &CacheArgs) -> Result<Self, AppError> {
        Self::resolve(args.cache_file.clone(), args.ttl_hours, SERVER_CACHE_FILE)
    }

    /// Client cache location for `search`
    pub fn client(path: Option<PathBuf>, ttl_hours: u64) -> Result<Self, AppError> {
        Self::resolve(path, ttl_hours, CLIENT_CACHE_FILE)
    }

    fn resolve(path: Option<PathBuf>, ttl_hours: u64, default_file: &str) -> Result<Self, AppError> {
        if ttl_hours == 0 {
            return Err(AppError::ConfigError("Cache TTL must be at least one hour".to_string()));
        }
        let secs = ttl_hours
            .checked_mul(60 * 60)
            .ok_or_else(|| AppError::ConfigError(format!("Cache TTL of {} hours is too large", ttl_hours)))?;
        Ok(Self {
            path: path.unwrap_or_else(|| cache_dir().join(default_file)),
            ttl: Duration::from_secs(secs),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub registry: RegistryConfig,
    pub cache: CacheConfig,
}

impl ServerConfig {
    pub fn from_args(args: &ServeArgs) -> Result<Self, AppError> {
        let addr = format!("{}:{}", args.host, args.port)
            .parse::<SocketAddr>()
            .map_err(|e| AppError::ConfigError(format!("Invalid listen address {}:{}: {}", args.host, args.port, e)))?;
        Ok(Self {
            addr,
            registry: RegistryConfig::from_args(&args.registry)?,
            cache: CacheConfig::from_args(&args.cache)?,
        })
    }
}

/// Parse an http(s) base URL, keeping any path prefix
pub fn parse_base_url(raw: &str) -> Result<Url, AppError> {
    let url = Url::parse(raw.trim()).map_err(|e| AppError::ConfigError(format!("Invalid URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(AppError::ConfigError(format!(
            "Unsupported URL scheme '{}' in '{}'",
            other, raw
        ))),
    }
}

pub fn timeout_secs(secs: u64) -> Result<Duration, AppError> {
    if secs == 0 {
        return Err(AppError::ConfigError("Timeout must be at least one second".to_string()));
    }
    Ok(Duration::from_secs(secs))
}

/// Per-user cache directory for this tool
pub fn cache_dir() -> PathBuf {
    if let Some(xdg_cache) = std::env::var_os("XDG_CACHE_HOME") {
        PathBuf::from(xdg_cache).join(APP_DIR)
    } else if let Some(dir) = dirs::cache_dir() {
        dir.join(APP_DIR)
    } else {
        // Fallback to current directory
        PathBuf::from(".cache").join(APP_DIR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_args(url: &str) -> RegistryArgs {
        RegistryArgs {
            registry_url: url.to_string(),
            registry_username: " ops@example.com ".to_string(),
            registry_key: "secret".to_string(),
            registry_timeout: 10,
        }
    }

    #[test]
    fn test_parse_base_url() {
        assert!(parse_base_url("https://register.fca.org.uk/services").is_ok());
        assert!(parse_base_url("http://localhost:3000").is_ok());
        assert!(matches!(parse_base_url("ftp://example.com"), Err(AppError::ConfigError(_))));
        assert!(matches!(parse_base_url("not a url"), Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_registry_config() {
        let config = RegistryConfig::from_args(&registry_args("https://register.fca.org.uk/services")).unwrap();
        assert_eq!(config.credentials.email, "ops@example.com");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.base_url.path(), "/services");
    }

    #[test]
    fn test_cache_config_defaults_to_cache_dir() {
        let config = CacheConfig::from_args(&CacheArgs { cache_file: None, ttl_hours: 168 }).unwrap();
        assert!(config.path.ends_with("company-lookup/company-cache.json"));
        assert_eq!(config.ttl, crate::cache::DEFAULT_TTL);

        let client = CacheConfig::client(Some(PathBuf::from("/tmp/c.json")), 1).unwrap();
        assert_eq!(client.path, PathBuf::from("/tmp/c.json"));
        assert_eq!(client.ttl, Duration::from_secs(3600));
    }

    #[test]
    fn test_zero_values_are_rejected() {
        assert!(CacheConfig::from_args(&CacheArgs { cache_file: None, ttl_hours: 0 }).is_err());
        assert!(timeout_secs(0).is_err());
    }

    #[test]
    fn test_oversized_ttl_is_rejected() {
        assert!(matches!(
            CacheConfig::client(None, u64::MAX / 1000),
            Err(AppError::ConfigError(_))
        ));
        assert!(CacheConfig::from_args(&CacheArgs { cache_file: None, ttl_hours: u64::MAX }).is_err());
        assert!(CacheConfig::client(None, u64::MAX / 3600).is_ok());
    }

    #[test]
    fn test_server_config_address() {
        let args = ServeArgs {
            port: 8080,
            host: "127.0.0.1".to_string(),
            registry: registry_args("https://register.fca.org.uk/services"),
            cache: CacheArgs { cache_file: None, ttl_hours: 24 },
        };
        let config = ServerConfig::from_args(&args).unwrap();
        assert_eq!(config.addr.port(), 8080);

        let bad = ServeArgs { host: "not-an-ip".to_string(), ..args };
        assert!(matches!(ServerConfig::from_args(&bad), Err(AppError::ConfigError(_))));
    }
}
