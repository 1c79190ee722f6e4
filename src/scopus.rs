//! Scopus API client.
//!
//! Implements [`CitationProvider`] on top of three Elsevier endpoints:
//!
//! - Search: `GET /content/search/scopus`
//! - Abstract retrieval: `GET /content/abstract/{doi|eid}/{id}?view=FULL`
//! - Citation overview: `GET /content/abstract/citations`
//!
//! Authentication is an API key (`X-ELS-APIKey`) plus an optional institutional token
//! (`X-ELS-Insttoken`). Scopus serialises single-element lists as bare objects, so list
//! fields go through [`OneOrMany`].

use crate::error::{ScopusBibError, Result};
use crate::provider::{
    Author, CitationProvider, CitationYearTable, ExternalRecord, IdKind, SubjectArea,
};
use async_trait::async_trait;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Elsevier API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.elsevier.com";

/// Results per search page (Scopus STANDARD view maximum)
const PAGE_SIZE: usize = 25;

/// Scopus refuses `start` offsets beyond this
pub const MAX_SEARCH_RESULTS: usize = 5000;

/// Connection settings for [`ScopusClient`]
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub api_key: String,
    pub inst_token: Option<String>,
    pub base_url: String,
    pub timeout: Duration,
    /// Retries after HTTP 429 before giving up
    pub max_retries: u32,
}

impl ClientOptions {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            inst_token: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 3,
        }
    }
}

/// Scopus API client
pub struct ScopusClient {
    client: reqwest::Client,
    options: ClientOptions,
}

impl ScopusClient {
    /// Create a new ScopusClient
    pub fn new(options: ClientOptions) -> Result<Self> {
        if options.api_key.trim().is_empty() {
            return Err(ScopusBibError::Config("Scopus API key is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .user_agent(concat!("scopusbib/", env!("CARGO_PKG_VERSION")))
            .timeout(options.timeout)
            .build()
            .map_err(|e| ScopusBibError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, options })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.options.base_url.trim_end_matches('/'), path)
    }

    /// GET a JSON document, backing off on HTTP 429.
    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let mut backoff = Duration::from_millis(500);
        let mut attempt = 0;

        loop {
            match self.do_get(url, query).await {
                Err(ScopusBibError::RateLimited(secs)) if attempt < self.options.max_retries => {
                    attempt += 1;
                    let wait = Duration::from_secs(secs).max(backoff);
                    warn!(
                        attempt = attempt,
                        wait_ms = wait.as_millis() as u64,
                        "Rate limited, waiting"
                    );
                    tokio::time::sleep(wait).await;
                    backoff *= 2;
                }
                other => return other,
            }
        }
    }

    async fn do_get<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        debug!(url = %url, query = ?query, "Scopus request");

        let mut request = self
            .client
            .get(url)
            .query(query)
            .header("Accept", "application/json")
            .header("X-ELS-APIKey", &self.options.api_key);

        if let Some(token) = &self.options.inst_token {
            request = request.header("X-ELS-Insttoken", token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(ScopusBibError::RateLimited(retry_after));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = service_error_text(&body)
                .unwrap_or_else(|| format!("Scopus API error: {}", status));

            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(ScopusBibError::NotFound(message));
            }
            return Err(ScopusBibError::Api {
                code: status.as_u16() as i32,
                message,
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| ScopusBibError::Parse(format!("Failed to parse Scopus response: {}", e)))
    }
}

#[async_trait]
impl CitationProvider for ScopusClient {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ExternalRecord>> {
        let url = self.url("/content/search/scopus");
        let limit = limit.min(MAX_SEARCH_RESULTS);
        let mut results: Vec<ExternalRecord> = Vec::new();
        let mut start = 0;

        info!(query = query, limit = limit, "Starting Scopus search");

        while start < limit {
            let count = PAGE_SIZE.min(limit - start);
            let page: SearchResponse = self
                .get_json(
                    &url,
                    &[
                        ("query", query.to_string()),
                        ("start", start.to_string()),
                        ("count", count.to_string()),
                        ("view", "STANDARD".to_string()),
                    ],
                )
                .await?;

            let total = page.results.total();
            let entries = parse_search_entries(page.results.entry);
            let fetched = entries.len();
            results.extend(entries);

            debug!(start = start, fetched = fetched, total = total, "Parsed search page");

            start += count;
            if fetched == 0 || start >= total {
                break;
            }
        }

        results.truncate(limit);
        info!(total = results.len(), "Scopus search complete");
        Ok(results)
    }

    async fn retrieve(&self, identifier: &str, kind: IdKind) -> Result<ExternalRecord> {
        let id = urlencoding::encode(identifier.trim()).replace("%2F", "/");
        let url = self.url(&format!("/content/abstract/{}/{}", kind.as_str(), id));

        let response: AbstractResponse = self
            .get_json(&url, &[("view", "FULL".to_string())])
            .await?;

        Ok(parse_abstract(response.retrieval))
    }

    async fn citation_counts(
        &self,
        identifier: &str,
        kind: IdKind,
        start_year: i32,
        end_year: i32,
    ) -> Result<CitationYearTable> {
        let url = self.url("/content/abstract/citations");
        let response: CitationResponse = self
            .get_json(
                &url,
                &[
                    (kind.as_str(), identifier.to_string()),
                    ("date", format!("{}-{}", start_year, end_year)),
                ],
            )
            .await?;

        let counts = parse_citation_counts(response.overview)?;
        Ok(CitationYearTable {
            identifier: identifier.to_string(),
            counts,
        })
    }
}

// === Scopus API Response Types ===

/// A JSON value that is either a single item or a list of items.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

fn list<T>(value: Option<OneOrMany<T>>) -> Vec<T> {
    value.map(OneOrMany::into_vec).unwrap_or_default()
}

/// `{"$": "..."}` text node
#[derive(Debug, Deserialize)]
struct TextNode {
    #[serde(rename = "$", default)]
    text: Option<serde_json::Value>,
}

impl TextNode {
    fn text(&self) -> Option<String> {
        let text = match self.text.as_ref()? {
            serde_json::Value::String(s) => s.trim().to_string(),
            serde_json::Value::Null => return None,
            other => other.to_string(),
        };
        Some(text).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "search-results")]
    results: SearchResults,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    #[serde(rename = "opensearch:totalResults", default)]
    total_results: Option<String>,
    #[serde(default)]
    entry: Option<OneOrMany<SearchEntry>>,
}

impl SearchResults {
    fn total(&self) -> usize {
        self.total_results
            .as_deref()
            .and_then(|t| t.parse().ok())
            .unwrap_or(0)
    }
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    #[serde(default)]
    eid: Option<String>,
    #[serde(rename = "dc:title", default)]
    title: Option<String>,
    #[serde(rename = "prism:doi", default)]
    doi: Option<String>,
    #[serde(rename = "prism:coverDate", default)]
    cover_date: Option<String>,
    #[serde(rename = "prism:publicationName", default)]
    publication_name: Option<String>,
    /// Set on the placeholder entry of an empty result set
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AbstractResponse {
    #[serde(rename = "abstracts-retrieval-response")]
    retrieval: AbstractRetrieval,
}

#[derive(Debug, Deserialize)]
struct AbstractRetrieval {
    #[serde(default)]
    coredata: Option<CoreData>,
    #[serde(default)]
    authors: Option<AuthorList>,
    #[serde(default)]
    authkeywords: Option<AuthKeywords>,
    #[serde(default)]
    idxterms: Option<IndexTerms>,
    #[serde(rename = "subject-areas", default)]
    subject_areas: Option<SubjectAreas>,
}

#[derive(Debug, Deserialize)]
struct CoreData {
    #[serde(default)]
    eid: Option<String>,
    #[serde(rename = "prism:doi", default)]
    doi: Option<String>,
    #[serde(rename = "dc:title", default)]
    title: Option<String>,
    #[serde(rename = "prism:coverDate", default)]
    cover_date: Option<String>,
    #[serde(rename = "prism:publicationName", default)]
    publication_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthorList {
    #[serde(default)]
    author: Option<OneOrMany<ScopusAuthor>>,
}

#[derive(Debug, Deserialize)]
struct ScopusAuthor {
    #[serde(rename = "ce:surname", default)]
    surname: Option<String>,
    #[serde(rename = "ce:given-name", default)]
    given_name: Option<String>,
    #[serde(rename = "preferred-name", default)]
    preferred_name: Option<PreferredName>,
}

#[derive(Debug, Deserialize)]
struct PreferredName {
    #[serde(rename = "ce:surname", default)]
    surname: Option<String>,
    #[serde(rename = "ce:given-name", default)]
    given_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AuthKeywords {
    #[serde(rename = "author-keyword", default)]
    keywords: Option<OneOrMany<TextNode>>,
}

#[derive(Debug, Deserialize)]
struct IndexTerms {
    #[serde(default)]
    mainterm: Option<OneOrMany<TextNode>>,
}

#[derive(Debug, Deserialize)]
struct SubjectAreas {
    #[serde(rename = "subject-area", default)]
    areas: Option<OneOrMany<ScopusSubjectArea>>,
}

#[derive(Debug, Deserialize)]
struct ScopusSubjectArea {
    #[serde(rename = "$", default)]
    name: Option<String>,
    #[serde(rename = "@abbrev", default)]
    abbrev: Option<String>,
    #[serde(rename = "@code", default)]
    code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CitationResponse {
    #[serde(rename = "abstract-citations-response")]
    overview: CitationOverview,
}

#[derive(Debug, Deserialize)]
struct CitationOverview {
    #[serde(rename = "citeInfoMatrix", default)]
    matrix: Option<CiteInfoMatrix>,
    #[serde(rename = "citeColumnTotalXML", default)]
    column_totals: Option<CiteColumnTotals>,
}

#[derive(Debug, Deserialize)]
struct CiteInfoMatrix {
    #[serde(rename = "citeInfoMatrixXML")]
    xml: CiteInfoMatrixXml,
}

#[derive(Debug, Deserialize)]
struct CiteInfoMatrixXml {
    #[serde(rename = "citationMatrix")]
    citation_matrix: CitationMatrix,
}

#[derive(Debug, Deserialize)]
struct CitationMatrix {
    #[serde(rename = "citeInfo", default)]
    cite_info: Option<OneOrMany<CiteInfo>>,
}

#[derive(Debug, Deserialize)]
struct CiteInfo {
    #[serde(default)]
    cc: Option<OneOrMany<TextNode>>,
}

#[derive(Debug, Deserialize)]
struct CiteColumnTotals {
    #[serde(rename = "citeCountHeader")]
    header: CiteCountHeader,
}

#[derive(Debug, Deserialize)]
struct CiteCountHeader {
    #[serde(rename = "columnHeading", default)]
    column_heading: Option<OneOrMany<TextNode>>,
}

#[derive(Debug, Deserialize)]
struct ServiceErrorResponse {
    #[serde(rename = "service-error")]
    service_error: ServiceError,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    status: ServiceStatus,
}

#[derive(Debug, Deserialize)]
struct ServiceStatus {
    #[serde(rename = "statusCode", default)]
    code: Option<String>,
    #[serde(rename = "statusText", default)]
    text: Option<String>,
}

/// Extract `statusCode: statusText` from a Scopus error body.
fn service_error_text(body: &str) -> Option<String> {
    let parsed: ServiceErrorResponse = serde_json::from_str(body).ok()?;
    let status = parsed.service_error.status;
    match (status.code, status.text) {
        (Some(code), Some(text)) => Some(format!("{}: {}", code, text)),
        (Some(code), None) => Some(code),
        (None, Some(text)) => Some(text),
        (None, None) => None,
    }
}

/// Convert search entries, dropping the empty-result placeholder.
fn parse_search_entries(entries: Option<OneOrMany<SearchEntry>>) -> Vec<ExternalRecord> {
    list(entries)
        .into_iter()
        .filter(|e| e.error.is_none())
        .map(|e| ExternalRecord {
            eid: non_blank(e.eid),
            doi: non_blank(e.doi),
            title: non_blank(e.title.map(|t| strip_html_tags(&t))),
            cover_date: non_blank(e.cover_date),
            publication_name: non_blank(e.publication_name),
            ..Default::default()
        })
        .collect()
}

/// Parse an abstract retrieval response into our record type
fn parse_abstract(retrieval: AbstractRetrieval) -> ExternalRecord {
    let core = retrieval.coredata;
    let (eid, doi, title, cover_date, publication_name) = match core {
        Some(c) => (c.eid, c.doi, c.title, c.cover_date, c.publication_name),
        None => (None, None, None, None, None),
    };

    let authors = list(retrieval.authors.and_then(|a| a.author))
        .into_iter()
        .map(|a| {
            let preferred = a.preferred_name.as_ref();
            Author {
                surname: non_blank(
                    a.surname
                        .clone()
                        .or_else(|| preferred.and_then(|p| p.surname.clone())),
                ),
                given_name: non_blank(
                    a.given_name
                        .clone()
                        .or_else(|| preferred.and_then(|p| p.given_name.clone())),
                ),
            }
        })
        .collect();

    let author_keywords = list(retrieval.authkeywords.and_then(|k| k.keywords))
        .iter()
        .filter_map(TextNode::text)
        .collect();

    let index_terms = list(retrieval.idxterms.and_then(|t| t.mainterm))
        .iter()
        .filter_map(TextNode::text)
        .collect();

    let subject_areas = list(retrieval.subject_areas.and_then(|s| s.areas))
        .into_iter()
        .filter_map(|sa| {
            Some(SubjectArea {
                area: non_blank(sa.name)?,
                abbreviation: sa.abbrev.unwrap_or_default(),
                code: sa.code.unwrap_or_default(),
            })
        })
        .collect();

    ExternalRecord {
        eid: non_blank(eid),
        doi: non_blank(doi),
        title: non_blank(title.map(|t| strip_html_tags(&t))),
        authors,
        cover_date: non_blank(cover_date),
        publication_name: non_blank(publication_name),
        author_keywords,
        index_terms,
        subject_areas,
    }
}

/// Zip the year headings with the first document's counts.
fn parse_citation_counts(overview: CitationOverview) -> Result<Vec<(i32, u64)>> {
    let years: Vec<i32> = list(overview.column_totals.and_then(|c| c.header.column_heading))
        .iter()
        .filter_map(TextNode::text)
        .map(|y| {
            y.parse()
                .map_err(|_| ScopusBibError::Parse(format!("Invalid citation year: {}", y)))
        })
        .collect::<Result<_>>()?;

    let first = list(overview.matrix.and_then(|m| m.xml.citation_matrix.cite_info))
        .into_iter()
        .next()
        .ok_or_else(|| ScopusBibError::Parse("Citation overview has no documents".to_string()))?;

    let counts: Vec<u64> = list(first.cc)
        .iter()
        .map(|c| {
            let text = c.text().unwrap_or_else(|| "0".to_string());
            text.parse()
                .map_err(|_| ScopusBibError::Parse(format!("Invalid citation count: {}", text)))
        })
        .collect::<Result<_>>()?;

    if counts.len() != years.len() {
        return Err(ScopusBibError::Parse(format!(
            "Citation overview has {} years but {} counts",
            years.len(),
            counts.len()
        )));
    }

    Ok(years.into_iter().zip(counts).collect())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Strip HTML tags from text (Scopus marks up sub/superscripts in titles)
fn strip_html_tags(text: &str) -> String {
    let re = Regex::new(r"<[^>]+>").unwrap_or_else(|_| Regex::new(r"").expect("Empty regex"));
    re.replace_all(text, "").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server, ServerGuard};

    fn client_for(server: &ServerGuard) -> ScopusClient {
        client_with_retries(server, 0)
    }

    fn client_with_retries(server: &ServerGuard, max_retries: u32) -> ScopusClient {
        let mut options = ClientOptions::new("test-key");
        options.base_url = server.url();
        options.max_retries = max_retries;
        ScopusClient::new(options).expect("client")
    }

    /// Search page body with entries `2-s2.0-{first}` .. `2-s2.0-{first + count - 1}`.
    fn search_page(total: usize, first: usize, count: usize) -> String {
        let entries: Vec<String> = (first..first + count)
            .map(|i| format!(r#"{{"eid": "2-s2.0-{}", "dc:title": "Paper {}"}}"#, i, i))
            .collect();
        format!(
            r#"{{"search-results": {{"opensearch:totalResults": "{}", "entry": [{}]}}}}"#,
            total,
            entries.join(",")
        )
    }

    #[test]
    fn test_strip_html_tags() {
        assert_eq!(strip_html_tags("CO<inf>2</inf> capture"), "CO2 capture");
        assert_eq!(strip_html_tags("No tags"), "No tags");
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let result = ScopusClient::new(ClientOptions::new("  "));
        assert!(matches!(result, Err(ScopusBibError::Config(_))));
    }

    #[test]
    fn test_service_error_text() {
        let body = r#"{"service-error":{"status":{"statusCode":"AUTHORIZATION_ERROR","statusText":"No APIKey provided"}}}"#;
        assert_eq!(
            service_error_text(body).as_deref(),
            Some("AUTHORIZATION_ERROR: No APIKey provided")
        );
        assert_eq!(service_error_text("not json"), None);
    }

    #[tokio::test]
    async fn test_search_parses_entries_and_skips_placeholder() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/content/search/scopus")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("query".into(), "TITLE({graph theory})".into()),
                Matcher::UrlEncoded("start".into(), "0".into()),
            ]))
            .match_header("X-ELS-APIKey", "test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"search-results": {
                    "opensearch:totalResults": "2",
                    "entry": [
                        {"eid": "2-s2.0-1", "dc:title": "Graph <i>Theory</i>", "prism:doi": "10.1/a",
                         "prism:coverDate": "2019-05-01", "prism:publicationName": "J. Graphs"},
                        {"eid": "2-s2.0-2", "dc:title": "Other", "prism:coverDate": "2020-01-01"}
                    ]
                }}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let results = client.search("TITLE({graph theory})", 25).await.expect("search");

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title.as_deref(), Some("Graph Theory"));
        assert_eq!(results[0].doi.as_deref(), Some("10.1/a"));
        assert_eq!(results[1].doi, None);
        assert_eq!(results[1].publication_year(), Some(2020));
    }

    #[tokio::test]
    async fn test_search_empty_result_set() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/content/search/scopus")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"search-results": {"opensearch:totalResults": "0",
                    "entry": [{"@_fa": "true", "error": "Result set was empty"}]}}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let results = client.search("TITLE({nothing})", 25).await.expect("search");
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_by_doi() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/content/abstract/doi/10.1000/graph")
            .match_query(Matcher::UrlEncoded("view".into(), "FULL".into()))
            .with_status(200)
            .with_body(
                r#"{"abstracts-retrieval-response": {
                    "coredata": {"eid": "2-s2.0-85000000001", "prism:doi": "10.1000/graph",
                                 "dc:title": "Graph Theory", "prism:coverDate": "2019-05-01",
                                 "prism:publicationName": "Journal of Graphs"},
                    "authors": {"author": [
                        {"ce:surname": "Smith", "ce:given-name": "Jane"},
                        {"ce:surname": "Lee", "preferred-name": {"ce:surname": "Lee", "ce:given-name": "Kim"}},
                        {"ce:surname": "Anonymous"}
                    ]},
                    "authkeywords": {"author-keyword": {"@_fa": "true", "$": "graphs"}},
                    "idxterms": null,
                    "subject-areas": {"subject-area": [
                        {"@_fa": "true", "$": "Discrete Mathematics and Combinatorics", "@code": "2607", "@abbrev": "MATH"}
                    ]}
                }}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let record = client
            .retrieve("10.1000/graph", IdKind::Doi)
            .await
            .expect("retrieve");

        assert_eq!(record.eid.as_deref(), Some("2-s2.0-85000000001"));
        assert_eq!(record.authors.len(), 3);
        assert_eq!(record.authors[1], Author::new("Lee", "Kim"));
        assert_eq!(record.authors[2].given_name, None);
        assert_eq!(record.author_keywords, vec!["graphs".to_string()]);
        assert!(record.index_terms.is_empty());
        assert_eq!(record.subject_areas[0].abbreviation, "MATH");
    }

    #[tokio::test]
    async fn test_retrieve_not_found() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/content/abstract/eid/2-s2.0-404")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(
                r#"{"service-error":{"status":{"statusCode":"RESOURCE_NOT_FOUND","statusText":"The resource specified cannot be found."}}}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .retrieve("2-s2.0-404", IdKind::Eid)
            .await
            .expect_err("should be not found");
        assert!(matches!(err, ScopusBibError::NotFound(msg) if msg.starts_with("RESOURCE_NOT_FOUND")));
    }

    #[tokio::test]
    async fn test_unauthorized_is_api_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/content/abstract/eid/2-s2.0-1")
            .match_query(Matcher::Any)
            .with_status(401)
            .with_body("{}")
            .create_async()
            .await;

        let client = client_for(&server);
        let err = client
            .retrieve("2-s2.0-1", IdKind::Eid)
            .await
            .expect_err("should fail");
        assert!(matches!(err, ScopusBibError::Api { code: 401, .. }));
    }

    #[tokio::test]
    async fn test_citation_counts() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/content/abstract/citations")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("doi".into(), "10.1000/graph".into()),
                Matcher::UrlEncoded("date".into(), "2019-2020".into()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"abstract-citations-response": {
                    "citeInfoMatrix": {"citeInfoMatrixXML": {"citationMatrix": {
                        "citeInfo": [{"dc:identifier": "SCOPUS_ID:85000000001", "cc": [{"$": "3"}, {"$": "5"}]}]
                    }}},
                    "citeColumnTotalXML": {"citeCountHeader": {
                        "columnHeading": [{"$": "2019"}, {"$": "2020"}]
                    }}
                }}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let table = client
            .citation_counts("10.1000/graph", IdKind::Doi, 2019, 2020)
            .await
            .expect("citations");
        assert_eq!(table.counts, vec![(2019, 3), (2020, 5)]);
    }

    #[test]
    fn test_citation_counts_single_year_object() {
        let json = r#"{
            "citeInfoMatrix": {"citeInfoMatrixXML": {"citationMatrix": {
                "citeInfo": {"cc": {"$": "7"}}
            }}},
            "citeColumnTotalXML": {"citeCountHeader": {"columnHeading": {"$": "2024"}}}
        }"#;
        let overview: CitationOverview = serde_json::from_str(json).expect("parse");
        assert_eq!(parse_citation_counts(overview).expect("counts"), vec![(2024, 7)]);
    }

    #[test]
    fn test_citation_counts_length_mismatch() {
        let json = r#"{
            "citeInfoMatrix": {"citeInfoMatrixXML": {"citationMatrix": {
                "citeInfo": [{"cc": [{"$": "1"}]}]
            }}},
            "citeColumnTotalXML": {"citeCountHeader": {"columnHeading": [{"$": "2023"}, {"$": "2024"}]}}
        }"#;
        let overview: CitationOverview = serde_json::from_str(json).expect("parse");
        assert!(matches!(
            parse_citation_counts(overview),
            Err(ScopusBibError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_rate_limited_request_is_retried() {
        let mut server = Server::new_async().await;
        let limited = server
            .mock("GET", "/content/abstract/eid/2-s2.0-1")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_header("Retry-After", "0")
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("GET", "/content/abstract/eid/2-s2.0-1")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"abstracts-retrieval-response": {
                    "coredata": {"eid": "2-s2.0-1", "dc:title": "Graph Theory", "prism:coverDate": "2019-05-01"}
                }}"#,
            )
            .expect(1)
            .create_async()
            .await;

        let client = client_with_retries(&server, 1);
        let record = client
            .retrieve("2-s2.0-1", IdKind::Eid)
            .await
            .expect("retried retrieve");

        assert_eq!(record.title.as_deref(), Some("Graph Theory"));
        limited.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn test_rate_limited_after_last_retry() {
        let mut server = Server::new_async().await;
        let limited = server
            .mock("GET", "/content/abstract/eid/2-s2.0-1")
            .match_query(Matcher::Any)
            .with_status(429)
            .with_header("Retry-After", "0")
            .expect(2)
            .create_async()
            .await;

        let client = client_with_retries(&server, 1);
        let err = client
            .retrieve("2-s2.0-1", IdKind::Eid)
            .await
            .expect_err("should stay rate limited");

        assert!(matches!(err, ScopusBibError::RateLimited(0)));
        limited.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_pages_until_total() {
        let mut server = Server::new_async().await;
        let first = server
            .mock("GET", "/content/search/scopus")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("start".into(), "0".into()),
                Matcher::UrlEncoded("count".into(), "25".into()),
            ]))
            .with_status(200)
            .with_body(search_page(30, 0, 25))
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/content/search/scopus")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("start".into(), "25".into()),
                Matcher::UrlEncoded("count".into(), "25".into()),
            ]))
            .with_status(200)
            .with_body(search_page(30, 25, 5))
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        let results = client.search("TITLE(paper)", 100).await.expect("search");

        let eids: Vec<String> = results.iter().filter_map(|r| r.eid.clone()).collect();
        let expected: Vec<String> = (0..30).map(|i| format!("2-s2.0-{}", i)).collect();
        assert_eq!(eids, expected);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_search_stops_at_limit() {
        let mut server = Server::new_async().await;
        let page = server
            .mock("GET", "/content/search/scopus")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("start".into(), "0".into()),
                Matcher::UrlEncoded("count".into(), "10".into()),
            ]))
            .with_status(200)
            .with_body(search_page(4000, 0, 10))
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server);
        let results = client.search("TITLE(paper)", 10).await.expect("search");

        assert_eq!(results.len(), 10);
        page.assert_async().await;
    }

    #[tokio::test]
    async fn test_title_match_reads_a_single_page() {
        use crate::matcher::{EntryMatcher, MatchOutcome, TitleMismatchPolicy};
        use crate::record::BibliographyRecord;

        let mut server = Server::new_async().await;
        let search = server
            .mock("GET", "/content/search/scopus")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"search-results": {"opensearch:totalResults": "4000",
                    "entry": [{"eid": "2-s2.0-7", "dc:title": "Introduction"}]}}"#,
            )
            .expect(1)
            .create_async()
            .await;
        let _abstract = server
            .mock("GET", "/content/abstract/eid/2-s2.0-7")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                r#"{"abstracts-retrieval-response": {
                    "coredata": {"eid": "2-s2.0-7", "dc:title": "Introduction", "prism:coverDate": "2001-01-01"}
                }}"#,
            )
            .create_async()
            .await;

        let client = client_for(&server);
        let mut record = BibliographyRecord::new("article", "intro");
        record.set_field("title", "Introduction");

        let outcome = EntryMatcher::new(&client, TitleMismatchPolicy::Reject)
            .find(&record)
            .await
            .expect("find");

        assert!(matches!(outcome, MatchOutcome::Matched(r) if r.eid.as_deref() == Some("2-s2.0-7")));
        search.assert_async().await;
    }
}
