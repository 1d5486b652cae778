//! Client side of the lookup: talks to the proxy, keeps its own cache
//!
//! [`ClientSearch`] always asks the proxy first. When the proxy is down or
//! has nothing, it ranks its local cache plus the builtin names with the
//! fuzzy index. A stale local cache is refreshed by a detached task whose
//! only effect is a merge.

use crate::cache::{now_millis, CompanyCache};
use crate::company::{names, CompanyRecord};
use crate::error::{AppError, SourceError};
use crate::registry::{join_path, CompanySource, DEFAULT_SET_PAGE_SIZE};
use crate::search::{builtin_fallback, FuzzyIndex};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

/// Default proxy location
pub const DEFAULT_PROXY_URL: &str = "http://localhost:3000";

/// [`CompanySource`] backed by the proxy's own HTTP endpoints
pub struct ProxyClient {
    client: reqwest::Client,
    companies_url: Url,
    search_url: Url,
}

impl ProxyClient {
    pub fn new(base_url: &Url, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            client: crate::http::client_with_timeout(timeout)?,
            companies_url: join_path(base_url, "companies")?,
            search_url: join_path(base_url, "companies/search")?,
        })
    }

    async fn get_records(&self, url: Url, params: &[(&str, &str)]) -> Result<Vec<CompanyRecord>, SourceError> {
        let response = self.client.get(url).query(params).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(SourceError::upstream(status.as_u16(), &body));
        }

        let records: Vec<CompanyRecord> = serde_json::from_str(&body)?;
        Ok(records
            .into_iter()
            .filter(|r| !r.name.trim().is_empty())
            .collect())
    }
}

#[async_trait]
impl CompanySource for ProxyClient {
    async fn fetch(&self, query: &str, _page_size: usize) -> Result<Vec<CompanyRecord>, SourceError> {
        // The proxy applies its own result cap
        self.get_records(self.search_url.clone(), &[("q", query)]).await
    }

    async fn fetch_default_set(&self, page_size: usize) -> Result<Vec<CompanyRecord>, SourceError> {
        let limit = page_size.to_string();
        self.get_records(self.companies_url.clone(), &[("limit", limit.as_str())])
            .await
    }
}

/// Client-side search with proxy-first lookup and local fuzzy fallback
pub struct ClientSearch {
    cache: Arc<CompanyCache>,
    remote: Arc<dyn CompanySource>,
    index: FuzzyIndex,
    fallback: Vec<CompanyRecord>,
    initialized: OnceCell<()>,
    refresh_started: AtomicBool,
}

impl ClientSearch {
    pub fn new(cache: Arc<CompanyCache>, remote: Arc<dyn CompanySource>) -> Self {
        Self {
            cache,
            remote,
            index: FuzzyIndex::new(),
            fallback: builtin_fallback(),
            initialized: OnceCell::new(),
            refresh_started: AtomicBool::new(false),
        }
    }

    /// Ranked company names for `query`; never fails
    pub async fn search(&self, query: &str, limit: usize) -> Vec<String> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        self.init().await;
        self.refresh_in_background();

        match self.remote.fetch(query, limit).await {
            Ok(records) if !records.is_empty() => {
                debug!("Proxy returned {} matches for {:?}", records.len(), query);
                return names(&records).into_iter().take(limit).collect();
            }
            Ok(_) => debug!("Proxy had no matches for {:?}", query),
            Err(e) => warn!("Proxy search failed: {}", e),
        }

        debug!("Falling back to local search for {:?}", query);
        self.local_search(query, limit)
    }

    /// Fuzzy search over the local cache and builtin names only
    pub fn local_search(&self, query: &str, limit: usize) -> Vec<String> {
        let mut candidates = self.cache.all_records();
        candidates.extend(self.fallback.iter().cloned());
        self.index.top_matches(query, &candidates, limit)
    }

    /// Warm an invalid local cache from the proxy, once per session
    pub async fn init(&self) {
        self.initialized
            .get_or_init(|| async {
                if self.cache.is_valid() {
                    debug!("Local cache is valid with {} companies", self.cache.len());
                    return;
                }
                match self.remote.fetch_default_set(DEFAULT_SET_PAGE_SIZE).await {
                    Ok(records) => {
                        let added = self.cache.merge(&records);
                        info!("Loaded {} companies from proxy ({} new)", records.len(), added);
                    }
                    Err(e) => warn!("Could not warm local cache: {}", e),
                }
            })
            .await;
    }

    /// Spawn a refresh if the cache is past its refresh point
    ///
    /// Returns immediately; the spawned task only merges into the cache.
    /// At most one refresh is started per session.
    pub fn refresh_in_background(&self) -> Option<JoinHandle<()>> {
        if !self.cache.needs_refresh_at(now_millis()) {
            return None;
        }
        if self.refresh_started.swap(true, Ordering::AcqRel) {
            return None;
        }

        let cache = Arc::clone(&self.cache);
        let remote = Arc::clone(&self.remote);
        debug!("Local cache is due for refresh, refreshing in background");
        Some(tokio::spawn(async move {
            match remote.fetch_default_set(DEFAULT_SET_PAGE_SIZE).await {
                Ok(records) => {
                    let added = cache.merge(&records);
                    debug!("Background refresh added {} companies", added);
                }
                Err(e) => warn!("Background cache refresh failed: {}", e),
            }
        }))
    }
}
