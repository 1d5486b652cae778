//! Company sources: the upstream financial services register
//!
//! [`CompanySource`] is the seam the orchestrators talk to. The register
//! client normalizes the upstream `{Data: [{Name, "Reference Number",
//! Status}]}` envelope into [`CompanyRecord`]s.

use crate::company::{CompanyRecord, UNKNOWN_STATUS};
use crate::error::{AppError, SourceError};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Query used to pull the default company set
pub const DEFAULT_SET_QUERY: &str = "Insurance";
/// Page size for the default company set
pub const DEFAULT_SET_PAGE_SIZE: usize = 100;
/// Page size for per-query searches
pub const SEARCH_PAGE_SIZE: usize = 20;
/// Default register endpoint base
pub const DEFAULT_REGISTRY_URL: &str = "https://register.fca.org.uk/services";

/// Anything that can look companies up remotely
#[async_trait]
pub trait CompanySource: Send + Sync {
    /// Companies matching `query`, at most `page_size` of them
    async fn fetch(&self, query: &str, page_size: usize) -> Result<Vec<CompanyRecord>, SourceError>;

    /// The broad default set used to warm a cache
    async fn fetch_default_set(&self, page_size: usize) -> Result<Vec<CompanyRecord>, SourceError>;
}

/// Opaque credentials for the register API
#[derive(Clone, Default)]
pub struct RegistryCredentials {
    pub email: String,
    pub key: String,
}

impl std::fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("email", &self.email)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Client for the register search endpoint
pub struct RegistryClient {
    client: reqwest::Client,
    search_url: Url,
}

impl RegistryClient {
    pub fn new(base_url: &Url, credentials: &RegistryCredentials, timeout: Duration) -> Result<Self, AppError> {
        if credentials.email.is_empty() || credentials.key.is_empty() {
            warn!("Register credentials are not configured; upstream calls will likely be rejected");
        }

        let client = crate::http::client_with_headers(
            timeout,
            &[
                ("x-auth-email", credentials.email.as_str()),
                ("x-auth-key", credentials.key.as_str()),
                ("content-type", "application/json"),
            ],
        )?;

        Ok(Self {
            client,
            search_url: join_path(base_url, "V0.1/Search")?,
        })
    }

    async fn search(&self, query: &str, page_size: usize) -> Result<Vec<CompanyRecord>, SourceError> {
        debug!("Searching register for {:?} (per_page={})", query, page_size);

        let page_size = page_size.to_string();
        let response = self
            .client
            .get(self.search_url.clone())
            .query(&[("q", query), ("type", "firm"), ("per_page", page_size.as_str())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!("Register returned {} for {:?}", status, query);
            return Err(SourceError::upstream(status.as_u16(), &body));
        }

        let records = parse_search_response(&body)?;
        debug!("Register returned {} companies for {:?}", records.len(), query);
        Ok(records)
    }
}

#[async_trait]
impl CompanySource for RegistryClient {
    async fn fetch(&self, query: &str, page_size: usize) -> Result<Vec<CompanyRecord>, SourceError> {
        self.search(query, page_size).await
    }

    async fn fetch_default_set(&self, page_size: usize) -> Result<Vec<CompanyRecord>, SourceError> {
        self.search(DEFAULT_SET_QUERY, page_size).await
    }
}

/// Append `path` to `base`, keeping any path the base already has
pub fn join_path(base: &Url, path: &str) -> Result<Url, AppError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path)
        .map_err(|e| AppError::ConfigError(format!("Invalid URL {}{}: {}", base, path, e)))
}

/// Top-level register response; `Data` is null when nothing matched
#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    #[serde(rename = "Data", default)]
    data: Option<Vec<Value>>,
}

/// One firm as the register reports it
#[derive(Debug, Deserialize)]
struct RegisteredFirm {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "Reference Number")]
    reference: Option<ReferenceNumber>,
    #[serde(rename = "Status")]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReferenceNumber {
    Text(String),
    Number(u64),
}

impl RegisteredFirm {
    fn into_record(self) -> Option<CompanyRecord> {
        let name = self.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())?;
        let reference = match self.reference {
            Some(ReferenceNumber::Text(text)) => text,
            Some(ReferenceNumber::Number(n)) => n.to_string(),
            None => String::new(),
        };
        let status = self
            .status
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_STATUS.to_string());
        Some(CompanyRecord::new(name, reference, status))
    }
}

/// Normalize a register search body into records
///
/// Entries without a usable name are dropped. Anything other than an
/// object with an array (or null) `Data` field is a format error.
pub fn parse_search_response(body: &str) -> Result<Vec<CompanyRecord>, SourceError> {
    let value: Value = serde_json::from_str(body)?;
    if !value.is_object() {
        return Err(SourceError::Format(format!("expected an object, got {}", excerpt(&value))));
    }

    let envelope: SearchEnvelope = serde_json::from_value(value)
        .map_err(|e| SourceError::Format(format!("Data is not an array: {}", e)))?;

    let entries = envelope.data.unwrap_or_default();
    let total = entries.len();
    let records: Vec<CompanyRecord> = entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value::<RegisteredFirm>(entry).ok())
        .filter_map(RegisteredFirm::into_record)
        .collect();

    if records.len() < total {
        debug!("Dropped {} register entries without a usable name", total - records.len());
    }
    Ok(records)
}

fn excerpt(value: &Value) -> String {
    value.to_string().chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn credentials() -> RegistryCredentials {
        RegistryCredentials {
            email: "ops@example.com".to_string(),
            key: "k3y".to_string(),
        }
    }

    fn client_for(server: &MockServer, timeout: Duration) -> RegistryClient {
        let base = Url::parse(&format!("{}/services", server.uri())).unwrap();
        RegistryClient::new(&base, &credentials(), timeout).unwrap()
    }

    #[test]
    fn test_parse_normalizes_fields() {
        let body = r#"{"Data":[
            {"Name":"Aviva Insurance Limited","Reference Number":"202153","Status":"Authorised"},
            {"Name":"Saga","Reference Number":110038},
            {"Reference Number":"1"},
            {"Name":"   "},
            "not an object"
        ]}"#;
        let records = parse_search_response(body).unwrap();
        assert_eq!(
            records,
            vec![
                CompanyRecord::new("Aviva Insurance Limited", "202153", "Authorised"),
                CompanyRecord::new("Saga", "110038", "Unknown"),
            ]
        );
    }

    #[test]
    fn test_parse_null_data_is_empty() {
        let body = r#"{"Status":"FSR-API-04-01-11","Message":"No search result found","Data":null}"#;
        assert!(parse_search_response(body).unwrap().is_empty());
        assert!(parse_search_response("{}").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_unexpected_shapes() {
        for body in [r#"[{"Name":"Aviva"}]"#, r#"{"Data":"Aviva"}"#, "not json", "42"] {
            match parse_search_response(body) {
                Err(SourceError::Format(_)) => {}
                other => panic!("expected format error for {}, got {:?}", body, other),
            }
        }
    }

    #[test]
    fn test_join_path_keeps_base_path() {
        let base = Url::parse("https://register.fca.org.uk/services").unwrap();
        assert_eq!(
            join_path(&base, "V0.1/Search").unwrap().as_str(),
            "https://register.fca.org.uk/services/V0.1/Search"
        );
        let base = Url::parse("http://localhost:3000/").unwrap();
        assert_eq!(join_path(&base, "companies").unwrap().as_str(), "http://localhost:3000/companies");
    }

    #[test]
    fn test_credentials_debug_hides_key() {
        let rendered = format!("{:?}", credentials());
        assert!(!rendered.contains("k3y"));
    }

    #[tokio::test]
    async fn test_fetch_sends_auth_and_params() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/V0.1/Search"))
            .and(query_param("q", "aviva"))
            .and(query_param("type", "firm"))
            .and(query_param("per_page", "20"))
            .and(header("x-auth-email", "ops@example.com"))
            .and(header("x-auth-key", "k3y"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"Data":[{"Name":"Aviva Insurance Limited","Reference Number":"202153","Status":"Authorised"}]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5));
        let records = client.fetch("aviva", SEARCH_PAGE_SIZE).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reference, "202153");
    }

    #[tokio::test]
    async fn test_default_set_uses_insurance_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/V0.1/Search"))
            .and(query_param("q", DEFAULT_SET_QUERY))
            .and(query_param("per_page", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"Data":[{"Name":"Ageas"}]}"#))
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5));
        let records = client.fetch_default_set(DEFAULT_SET_PAGE_SIZE).await.unwrap();
        assert_eq!(records, vec![CompanyRecord::named("Ageas")]);
    }

    #[tokio::test]
    async fn test_non_success_status_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Forbidden"))
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5));
        let err = client.fetch("aviva", 20).await.unwrap_err();
        assert_eq!(
            err,
            SourceError::Upstream {
                status: 403,
                body: "Forbidden".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_bad_body_is_format_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_secs(5));
        assert!(matches!(client.fetch("aviva", 20).await, Err(SourceError::Format(_))));
    }

    #[tokio::test]
    async fn test_timeout_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"Data":[]}"#)
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, Duration::from_millis(100));
        assert!(matches!(client.fetch("aviva", 20).await, Err(SourceError::Transport(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let base = Url::parse("http://127.0.0.1:9/services").unwrap();
        let client = RegistryClient::new(&base, &credentials(), Duration::from_millis(500)).unwrap();
        assert!(matches!(client.fetch("aviva", 20).await, Err(SourceError::Transport(_))));
    }
}
