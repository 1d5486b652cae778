//! HTTP client utilities
//!
//! Builds reqwest clients with a bounded timeout, optional default headers
//! (registry credentials) and system proxy support.

use crate::error::AppError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Proxy};
use std::time::Duration;
use url::Url;

/// Build a client with `timeout` and `headers` sent on every request
///
/// Recognized proxy env vars:
/// - HTTP_PROXY / http_proxy
/// - HTTPS_PROXY / https_proxy
/// - ALL_PROXY / all_proxy
/// - NO_PROXY / no_proxy
pub fn client_with_headers(timeout: Duration, headers: &[(&str, &str)]) -> Result<Client, AppError> {
    let mut default_headers = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| AppError::ConfigError(format!("Invalid header name {}: {}", name, e)))?;
        let mut value = HeaderValue::from_str(value)
            .map_err(|e| AppError::ConfigError(format!("Invalid value for header {}: {}", name.as_str(), e)))?;
        value.set_sensitive(true);
        default_headers.insert(name, value);
    }

    let mut builder = Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .default_headers(default_headers)
        .user_agent(concat!("company-lookup/", env!("CARGO_PKG_VERSION")));

    if let Some(proxy) = proxy_from_env() {
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| AppError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

/// Client with only a timeout
pub fn client_with_timeout(timeout: Duration) -> Result<Client, AppError> {
    client_with_headers(timeout, &[])
}

fn proxy_from_env() -> Option<Proxy> {
    let all = getenv_first(&["ALL_PROXY", "all_proxy"]);
    let https_proxy = getenv_first(&["HTTPS_PROXY", "https_proxy"]).or_else(|| all.clone());
    let http_proxy = getenv_first(&["HTTP_PROXY", "http_proxy"]).or(all);
    if https_proxy.is_none() && http_proxy.is_none() {
        return None;
    }

    let no_proxy = parse_no_proxy(&getenv_first(&["NO_PROXY", "no_proxy"]).unwrap_or_default());
    Some(Proxy::custom(move |url: &Url| {
        if should_bypass_proxy(url.host_str().unwrap_or(""), &no_proxy) {
            return None;
        }
        match url.scheme() {
            "https" => https_proxy.clone().or_else(|| http_proxy.clone()),
            "http" => http_proxy.clone().or_else(|| https_proxy.clone()),
            _ => None,
        }
    }))
}

fn getenv_first(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| std::env::var(k).ok())
        .find(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq)]
enum NoProxyRule {
    Wildcard,
    Domain(String), // matches suffix
    Exact(String),
}

fn parse_no_proxy(val: &str) -> Vec<NoProxyRule> {
    val.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|token| {
            if token == "*" {
                return NoProxyRule::Wildcard;
            }
            let t = token.trim_start_matches('.').to_ascii_lowercase();
            if t == "localhost" || t.parse::<std::net::IpAddr>().is_ok() {
                NoProxyRule::Exact(t)
            } else {
                NoProxyRule::Domain(t)
            }
        })
        .collect()
}

fn should_bypass_proxy(host: &str, rules: &[NoProxyRule]) -> bool {
    if host.is_empty() {
        return false;
    }
    let host = host.to_ascii_lowercase();
    rules.iter().any(|rule| match rule {
        NoProxyRule::Wildcard => true,
        NoProxyRule::Exact(exact) => host == *exact,
        NoProxyRule::Domain(suffix) => host == *suffix || host.ends_with(&format!(".{}", suffix)),
    })
}
