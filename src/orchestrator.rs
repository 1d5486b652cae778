//! Server-side search orchestration
//!
//! Per call: cheap cache precheck, then the register (whose results are
//! merged into the cache), then a fuzzy fallback over cached and builtin
//! names if the register fails. Searches never fail; the worst case is an
//! empty result.

use crate::cache::CompanyCache;
use crate::company::{names, CompanyRecord};
use crate::error::SourceError;
use crate::registry::{CompanySource, DEFAULT_SET_PAGE_SIZE, SEARCH_PAGE_SIZE};
use crate::search::{builtin_fallback, FuzzyIndex};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct SearchOrchestrator {
    cache: Arc<CompanyCache>,
    source: Arc<dyn CompanySource>,
    index: FuzzyIndex,
    fallback: Vec<CompanyRecord>,
}

impl SearchOrchestrator {
    pub fn new(cache: Arc<CompanyCache>, source: Arc<dyn CompanySource>) -> Self {
        Self {
            cache,
            source,
            index: FuzzyIndex::new(),
            fallback: builtin_fallback(),
        }
    }

    pub fn cache(&self) -> &Arc<CompanyCache> {
        &self.cache
    }

    /// Ranked company names for `query`, at most `limit`
    pub async fn search(&self, query: &str, limit: usize) -> Vec<String> {
        names(&self.search_records(query, limit).await)
    }

    /// Like [`search`](Self::search) but keeps the record metadata
    pub async fn search_records(&self, query: &str, limit: usize) -> Vec<CompanyRecord> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let mut hits = self.cache.search(query);
        if !hits.is_empty() {
            debug!("Found {} matches for {:?} in cache", hits.len(), query);
            hits.truncate(limit);
            return hits;
        }

        match self.source.fetch(query, SEARCH_PAGE_SIZE).await {
            Ok(mut records) => {
                debug!("Register returned {} companies for {:?}", records.len(), query);
                if !records.is_empty() {
                    self.cache.merge(&records);
                }
                records.truncate(limit);
                records
            }
            Err(e) => {
                warn!("Register search for {:?} failed, using fallback: {}", query, e);
                self.fallback_records(query, limit)
            }
        }
    }

    /// Fuzzy ranking over cached records plus the builtin names
    pub fn fallback_records(&self, query: &str, limit: usize) -> Vec<CompanyRecord> {
        let mut candidates = self.cache.all_records();
        candidates.extend(self.fallback.iter().cloned());
        self.index.top_records(query, &candidates, limit)
    }

    /// The full company list: cached while valid, otherwise refreshed
    ///
    /// If the register cannot be reached the stale cache is served, or the
    /// builtin names when there is no cache at all.
    pub async fn list(&self, limit: usize) -> Vec<CompanyRecord> {
        let mut records = if self.cache.is_valid() {
            debug!("Using cached company list");
            self.cache.all_records()
        } else {
            info!("Cache invalid or empty, fetching default set from register");
            match self.source.fetch_default_set(DEFAULT_SET_PAGE_SIZE).await {
                Ok(fetched) if !fetched.is_empty() => {
                    self.cache.merge(&fetched);
                    fetched
                }
                Ok(_) => {
                    debug!("Register default set was empty");
                    self.cache.all_records()
                }
                Err(e) => {
                    warn!("Fetching default set failed: {}", e);
                    self.cache_or_fallback()
                }
            }
        };
        records.truncate(limit);
        records
    }

    /// Register lookup for `query`, degrading to the cache precheck
    pub async fn lookup(&self, query: &str, limit: usize) -> Vec<CompanyRecord> {
        let query = query.trim();
        if query.is_empty() {
            return self.list(limit).await;
        }

        let mut records = match self.source.fetch(query, limit.max(SEARCH_PAGE_SIZE)).await {
            Ok(records) => {
                if !records.is_empty() {
                    self.cache.merge(&records);
                }
                records
            }
            Err(e) => {
                warn!("Register lookup for {:?} failed, serving cache: {}", query, e);
                self.cache.search(query)
            }
        };
        records.truncate(limit);
        records
    }

    /// Pull the default set into the cache; returns how many were new
    pub async fn refresh(&self) -> Result<usize, SourceError> {
        let fetched = self.source.fetch_default_set(DEFAULT_SET_PAGE_SIZE).await?;
        let added = self.cache.merge(&fetched);
        info!("Refresh fetched {} companies, {} new", fetched.len(), added);
        Ok(added)
    }

    fn cache_or_fallback(&self) -> Vec<CompanyRecord> {
        let cached = self.cache.all_records();
        if cached.is_empty() {
            self.fallback.clone()
        } else {
            cached
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::{MemoryStorage, DEFAULT_TTL};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Source returning canned results and counting calls
    #[derive(Default)]
    pub(crate) struct StubSource {
        pub results: Mutex<Vec<Result<Vec<CompanyRecord>, SourceError>>>,
        pub default_set: Vec<CompanyRecord>,
        pub calls: AtomicUsize,
        pub queries: Mutex<Vec<String>>,
    }

    impl StubSource {
        pub(crate) fn failing() -> Self {
            Self::answering(vec![])
        }

        /// Each `fetch` pops the next result; once exhausted, fails with a transport error
        pub(crate) fn answering(results: Vec<Result<Vec<CompanyRecord>, SourceError>>) -> Self {
            Self {
                results: Mutex::new(results.into_iter().rev().collect()),
                ..Self::default()
            }
        }

        pub(crate) fn with_default_set(mut self, records: Vec<CompanyRecord>) -> Self {
            self.default_set = records;
            self
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompanySource for StubSource {
        async fn fetch(&self, query: &str, _page_size: usize) -> Result<Vec<CompanyRecord>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.queries.lock().unwrap().push(query.to_string());
            self.results
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(SourceError::Transport("connection refused".to_string())))
        }

        async fn fetch_default_set(&self, _page_size: usize) -> Result<Vec<CompanyRecord>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.default_set.is_empty() {
                Err(SourceError::Transport("connection refused".to_string()))
            } else {
                Ok(self.default_set.clone())
            }
        }
    }

    fn record(name: &str) -> CompanyRecord {
        CompanyRecord::named(name)
    }

    fn orchestrator(source: StubSource) -> (SearchOrchestrator, Arc<StubSource>) {
        let cache = Arc::new(CompanyCache::open(Box::new(MemoryStorage::new()), DEFAULT_TTL));
        let source = Arc::new(source);
        (SearchOrchestrator::new(cache, source.clone()), source)
    }

    #[tokio::test]
    async fn test_blank_query_never_reaches_register() {
        let (orch, source) = orchestrator(StubSource::failing());
        assert!(orch.search("", 5).await.is_empty());
        assert!(orch.search("   ", 5).await.is_empty());
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_register() {
        let (orch, source) = orchestrator(StubSource::failing());
        orch.cache().merge(&[record("Direct Line"), record("Hastings Direct"), record("Saga")]);

        assert_eq!(orch.search("direct", 1).await, vec!["Direct Line"]);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_register_results_are_merged() {
        let fetched = vec![
            CompanyRecord::new("Hiscox Insurance Company Limited", "113243", "Authorised"),
            CompanyRecord::new("Hiscox Underwriting Ltd", "", "Authorised"),
        ];
        let (orch, source) = orchestrator(StubSource::answering(vec![Ok(fetched.clone())]));

        assert_eq!(
            orch.search("hiscox", 1).await,
            vec!["Hiscox Insurance Company Limited"]
        );
        assert_eq!(orch.cache().all_records(), fetched);

        // Second search is served from the cache
        assert_eq!(orch.search("hiscox", 5).await.len(), 2);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_register_answer_is_empty_result() {
        let (orch, _) = orchestrator(StubSource::answering(vec![Ok(vec![])]));
        assert!(orch.search("aviva", 5).await.is_empty());
        assert!(orch.cache().is_empty());
    }

    #[tokio::test]
    async fn test_register_failure_never_fails_search() {
        let (orch, source) = orchestrator(StubSource::failing());
        let results = orch.search("zzz-no-match", 5).await;
        assert!(results.is_empty());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_fuzzy_builtin_names() {
        let (orch, _) = orchestrator(StubSource::answering(vec![Err(SourceError::upstream(
            500,
            "boom",
        ))]));
        // A typo misses the precheck but still ranks via edit distance
        let results = orch.search("zurih", 3).await;
        assert_eq!(results.first().map(String::as_str), Some("Zurich"));
    }

    #[tokio::test]
    async fn test_fallback_includes_cached_records() {
        let (orch, _) = orchestrator(StubSource::failing());
        orch.cache().merge(&[record("Quote Me Limited")]);
        let results = orch.fallback_records("qml", 5);
        assert_eq!(results[0].name, "Quote Me Limited");
    }

    #[tokio::test]
    async fn test_list_serves_valid_cache() {
        let (orch, source) = orchestrator(StubSource::failing());
        orch.cache().merge(&[record("Ageas"), record("Allianz")]);
        assert_eq!(orch.list(10).await.len(), 2);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_list_refreshes_and_merges() {
        let source = StubSource::failing().with_default_set(vec![record("Ageas"), record("AXA")]);
        let (orch, _) = orchestrator(source);
        assert_eq!(names(&orch.list(1).await), vec!["Ageas"]);
        assert_eq!(orch.cache().len(), 2);
    }

    #[tokio::test]
    async fn test_list_without_cache_or_register_serves_builtin() {
        let (orch, _) = orchestrator(StubSource::failing());
        let records = orch.list(100).await;
        assert_eq!(records.len(), 100);
        assert_eq!(records[0].name, "Admiral");
    }

    #[tokio::test]
    async fn test_lookup_degrades_to_cache() {
        let (orch, _) = orchestrator(StubSource::failing());
        orch.cache().merge(&[record("Sabre Insurance"), record("Saga")]);
        assert_eq!(names(&orch.lookup("sabre", 10).await), vec!["Sabre Insurance"]);
    }

    #[tokio::test]
    async fn test_refresh_reports_new_records() {
        let source = StubSource::failing().with_default_set(vec![record("Ageas"), record("AXA")]);
        let (orch, _) = orchestrator(source);
        orch.cache().merge(&[record("axa")]);
        assert_eq!(orch.refresh().await, Ok(1));

        let (orch, _) = orchestrator(StubSource::failing());
        assert!(matches!(orch.refresh().await, Err(SourceError::Transport(_))));
    }
}
