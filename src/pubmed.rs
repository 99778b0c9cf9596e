//! NCBI E-utilities client.
//!
//! Retrieves PMIDs with `esearch` and the article XML with `efetch`, returning one
//! [`XmlNode`] blob per article for the pipeline.
//!
//! API Best Practices (per NCBI docs):
//! - At most 3 requests/s without an API key (10 with one)
//! - Send `tool` and `email` so NCBI can reach you before blocking
//! - Fetch IDs in chunks rather than one request per article

use crate::error::{PubmedError, Result};
use crate::xml::{split_articles, XmlNode};
use serde::Deserialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

/// E-utilities base URL
const EUTILS_BASE: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// `tool` parameter sent with every request
const TOOL_NAME: &str = "rustpubmed";

/// Maximum IDs per efetch request
const MAX_EFETCH_IDS: usize = 200;

/// Minimum interval between requests (3 requests/s)
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(340);

/// Search and fetch options
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Maximum number of PMIDs to retrieve
    pub max_results: usize,
    /// PMIDs per esearch page
    pub page_size: usize,
    /// esearch sort order
    pub sort: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_results: 50,
            page_size: 100,
            sort: "relevance".to_string(),
        }
    }
}

impl FetchOptions {
    fn validate(&self) -> Result<()> {
        if self.max_results == 0 {
            return Err(PubmedError::Validation("max_results must be positive".to_string()));
        }
        if self.page_size == 0 {
            return Err(PubmedError::Validation("page_size must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    count: Option<String>,
    #[serde(default)]
    idlist: Vec<String>,
    #[serde(rename = "ERROR", default)]
    error: Option<String>,
}

/// E-utilities client with rate limiting and retries
pub struct PubmedClient {
    client: reqwest::Client,
    api_key: Option<String>,
    email: Option<String>,
    max_retries: u32,
    last_request: Mutex<Option<Instant>>,
}

impl PubmedClient {
    /// Create a new PubmedClient
    ///
    /// # Arguments
    ///
    /// * `api_key` - Optional NCBI API key
    /// * `email` - Optional contact email sent with each request
    pub fn new(api_key: Option<String>, email: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("{}/{}", TOOL_NAME, env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| PubmedError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            email: email.filter(|e| !e.trim().is_empty()),
            max_retries: 3,
            last_request: Mutex::new(None),
        })
    }

    /// Search PubMed and fetch every hit as an article blob.
    pub async fn search(&self, query: &str, options: &FetchOptions) -> Result<Vec<XmlNode>> {
        let ids = self.search_ids(query, options).await?;
        if ids.is_empty() {
            info!(query, "No papers found for query");
            return Ok(Vec::new());
        }
        Ok(self.fetch_articles(&ids).await)
    }

    /// Page through esearch until `max_results` PMIDs or a short page.
    pub async fn search_ids(&self, query: &str, options: &FetchOptions) -> Result<Vec<String>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(PubmedError::Validation("Query cannot be empty".to_string()));
        }
        options.validate()?;

        info!(query, max_results = options.max_results, "Searching PubMed");

        let mut ids: Vec<String> = Vec::new();

        for retstart in (0..options.max_results).step_by(options.page_size) {
            let retmax = options.page_size.min(options.max_results - retstart);
            let url = self.esearch_url(query, retmax, retstart, &options.sort)?;
            let body = self.get_with_retry(url).await?;

            let response: ESearchResponse = serde_json::from_str(&body)?;
            let result = response.esearchresult;

            if let Some(error) = result.error {
                return Err(PubmedError::Api {
                    code: 200,
                    message: format!("esearch error: {}", error),
                });
            }

            debug!(
                retstart,
                page = result.idlist.len(),
                count = result.count.as_deref().unwrap_or("?"),
                "esearch page"
            );

            let page_len = result.idlist.len();
            ids.extend(result.idlist);

            if page_len < retmax {
                break;
            }
        }

        info!(found = ids.len(), "PubMed search complete");
        Ok(ids)
    }

    /// Fetch article XML for the given PMIDs, one blob per article.
    ///
    /// A chunk that fails to download or parse is logged and its articles omitted.
    pub async fn fetch_articles(&self, ids: &[String]) -> Vec<XmlNode> {
        let mut articles = Vec::with_capacity(ids.len());

        for (chunk_idx, chunk) in ids.chunks(MAX_EFETCH_IDS).enumerate() {
            let fetched = match self.efetch_url(chunk) {
                Ok(url) => self.get_with_retry(url).await,
                Err(e) => Err(e),
            };

            match fetched.and_then(|xml| split_articles(&xml)) {
                Ok(blobs) => {
                    if blobs.len() < chunk.len() {
                        warn!(
                            chunk = chunk_idx + 1,
                            requested = chunk.len(),
                            received = blobs.len(),
                            "efetch returned fewer articles than requested"
                        );
                    }
                    articles.extend(blobs);
                }
                Err(e) => {
                    warn!(
                        chunk = chunk_idx + 1,
                        ids = chunk.len(),
                        error = %e,
                        "efetch chunk failed, omitting its articles"
                    );
                }
            }
        }

        info!(requested = ids.len(), fetched = articles.len(), "Fetched articles");
        articles
    }

    fn esearch_url(&self, query: &str, retmax: usize, retstart: usize, sort: &str) -> Result<Url> {
        let retmax = retmax.to_string();
        let retstart = retstart.to_string();
        let mut params = vec![
            ("db", "pubmed"),
            ("term", query),
            ("retmax", retmax.as_str()),
            ("retstart", retstart.as_str()),
            ("retmode", "json"),
            ("sort", sort),
        ];
        self.push_identity(&mut params);
        build_url("esearch.fcgi", &params)
    }

    fn efetch_url(&self, ids: &[String]) -> Result<Url> {
        let id_list = ids.join(",");
        let mut params = vec![
            ("db", "pubmed"),
            ("id", id_list.as_str()),
            ("retmode", "xml"),
            ("rettype", "abstract"),
        ];
        self.push_identity(&mut params);
        build_url("efetch.fcgi", &params)
    }

    fn push_identity<'a>(&'a self, params: &mut Vec<(&'a str, &'a str)>) {
        params.push(("tool", TOOL_NAME));
        if let Some(email) = &self.email {
            params.push(("email", email.as_str()));
        }
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.as_str()));
        }
    }

    /// GET with exponential backoff; 429 honours the server's hint when larger.
    async fn get_with_retry(&self, url: Url) -> Result<String> {
        let mut backoff = Duration::from_millis(500);
        let mut last_error = None;

        for attempt in 0..self.max_retries {
            self.wait_for_rate_limit().await;

            match self.do_get(url.clone()).await {
                Ok(body) => return Ok(body),
                Err(PubmedError::RateLimited(secs)) => {
                    let wait = Duration::from_secs(secs).max(backoff);
                    warn!(
                        attempt = attempt + 1,
                        wait_secs = wait.as_secs(),
                        "Rate limited, waiting"
                    );
                    tokio::time::sleep(wait).await;
                    backoff *= 2;
                    last_error = Some(PubmedError::RateLimited(secs));
                }
                Err(e) => {
                    debug!(attempt = attempt + 1, error = %e, "Request failed");
                    if attempt < self.max_retries - 1 {
                        let jitter = Duration::from_millis(rand::random::<u64>() % 250);
                        tokio::time::sleep(backoff + jitter).await;
                        backoff *= 2;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            PubmedError::Config("Retry loop ran zero attempts".to_string())
        }))
    }

    async fn do_get(&self, url: Url) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(PubmedError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PubmedError::Api {
                code: status.as_u16() as i32,
                message: format!("E-utilities error: {} - {}", status, error_text.trim()),
            });
        }

        Ok(response.text().await?)
    }

    /// Wait for rate limit interval
    async fn wait_for_rate_limit(&self) {
        let wait = {
            let last = self.last_request.lock().ok();
            last.and_then(|l| *l)
                .map(|t| MIN_REQUEST_INTERVAL.saturating_sub(t.elapsed()))
        };

        if let Some(wait) = wait.filter(|w| !w.is_zero()) {
            tokio::time::sleep(wait).await;
        }

        if let Ok(mut last) = self.last_request.lock() {
            *last = Some(Instant::now());
        }
    }
}

fn build_url(endpoint: &str, params: &[(&str, &str)]) -> Result<Url> {
    Url::parse_with_params(&format!("{}/{}", EUTILS_BASE, endpoint), params)
        .map_err(|e| PubmedError::Config(format!("Invalid E-utilities URL: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_pairs(url: &Url) -> Vec<(String, String)> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_esearch_url() {
        let client = PubmedClient::new(Some("KEY".to_string()), Some("me@example.org".to_string())).unwrap();
        let url = client.esearch_url("cancer immunotherapy", 100, 200, "relevance").unwrap();

        assert!(url.as_str().starts_with("https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi?"));
        let pairs = query_pairs(&url);
        assert!(pairs.contains(&("term".to_string(), "cancer immunotherapy".to_string())));
        assert!(pairs.contains(&("retmax".to_string(), "100".to_string())));
        assert!(pairs.contains(&("retstart".to_string(), "200".to_string())));
        assert!(pairs.contains(&("retmode".to_string(), "json".to_string())));
        assert!(pairs.contains(&("api_key".to_string(), "KEY".to_string())));
        assert!(pairs.contains(&("email".to_string(), "me@example.org".to_string())));
        assert!(pairs.contains(&("tool".to_string(), TOOL_NAME.to_string())));
    }

    #[test]
    fn test_efetch_url_without_identity() {
        let client = PubmedClient::new(Some("  ".to_string()), None).unwrap();
        let ids = vec!["1".to_string(), "22".to_string()];
        let url = client.efetch_url(&ids).unwrap();

        let pairs = query_pairs(&url);
        assert!(pairs.contains(&("id".to_string(), "1,22".to_string())));
        assert!(pairs.contains(&("retmode".to_string(), "xml".to_string())));
        assert!(!pairs.iter().any(|(k, _)| k == "api_key" || k == "email"));
    }

    #[test]
    fn test_esearch_response_parsing() {
        let body = r#"{"header":{},"esearchresult":{"count":"2","retmax":"2","idlist":["38000001","38000002"]}}"#;
        let response: ESearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.esearchresult.idlist, vec!["38000001", "38000002"]);
        assert_eq!(response.esearchresult.error, None);

        let body = r#"{"esearchresult":{"ERROR":"Invalid query"}}"#;
        let response: ESearchResponse = serde_json::from_str(body).unwrap();
        assert!(response.esearchresult.idlist.is_empty());
        assert_eq!(response.esearchresult.error.as_deref(), Some("Invalid query"));
    }

    #[tokio::test]
    async fn test_search_validation() {
        let client = PubmedClient::new(None, None).unwrap();
        let err = client.search_ids("   ", &FetchOptions::default()).await.unwrap_err();
        assert!(matches!(err, PubmedError::Validation(_)));

        let options = FetchOptions {
            max_results: 0,
            ..Default::default()
        };
        let err = client.search_ids("kras", &options).await.unwrap_err();
        assert!(matches!(err, PubmedError::Validation(_)));
    }

    #[tokio::test]
    async fn test_fetch_nothing() {
        let client = PubmedClient::new(None, None).unwrap();
        assert!(client.fetch_articles(&[]).await.is_empty());
    }
}
