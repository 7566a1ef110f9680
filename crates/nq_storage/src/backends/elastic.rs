use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use nq_core::{parse_date, ArticleRecord, ArticleStore, Error, Query, Result, ScoredCandidate};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::env;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use crate::BackendConfig;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Names of the source fields holding each part of an article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElasticFields {
    pub title: String,
    pub body: String,
    pub url: String,
    pub date: String,
}

impl Default for ElasticFields {
    fn default() -> Self {
        Self {
            title: "post_title".to_string(),
            body: "summary".to_string(),
            url: "lien1".to_string(),
            date: "date".to_string(),
        }
    }
}

#[derive(Clone)]
pub struct ElasticConfig {
    pub url: String,
    pub index: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub fields: ElasticFields,
    pub timeout: Duration,
    pub accept_invalid_certs: bool,
}

impl fmt::Debug for ElasticConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElasticConfig")
            .field("url", &self.url)
            .field("index", &self.index)
            .field("username", &self.username)
            .field("password", &self.password.as_deref().map(|_| "<redacted>"))
            .field("fields", &self.fields)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ElasticConfig {
    pub fn new() -> Self {
        let host = env::var("NQ_ES_URL").unwrap_or_else(|_| "http://localhost:9200".to_string());
        let index = env::var("NQ_ES_INDEX").unwrap_or_else(|_| "articles".to_string());
        Self {
            url: host,
            index,
            username: env::var("NQ_ES_USER").ok(),
            password: env::var("NQ_ES_PASSWORD").ok(),
            fields: ElasticFields::default(),
            timeout: DEFAULT_TIMEOUT,
            accept_invalid_certs: env::var("NQ_ES_INSECURE").map(|v| v == "1" || v == "true").unwrap_or(false),
        }
    }

    pub fn with_url(mut self, url: &str) -> Result<Self> {
        Url::parse(url).map_err(|e| Error::Config(format!("invalid search backend url '{}': {}", url, e)))?;
        self.url = url.trim_end_matches('/').to_string();
        Ok(self)
    }

    pub fn with_index(mut self, index: &str) -> Self {
        self.index = index.to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn search_url(&self) -> String {
        format!("{}/{}/_search", self.url.trim_end_matches('/'), self.index)
    }
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendConfig for ElasticConfig {
    fn get_url(&self) -> String {
        self.url.clone()
    }

    fn get_collection(&self) -> String {
        self.index.clone()
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    #[serde(rename = "_score")]
    score: Option<f32>,
    #[serde(rename = "_source", default)]
    source: Map<String, Value>,
}

/// Remote full-text index. Ranking is left to the search engine; this type
/// only shapes the request and maps hits back into articles.
pub struct ElasticStore {
    client: Client,
    config: ElasticConfig,
}

impl fmt::Debug for ElasticStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElasticStore")
            .field("client", &"<reqwest::Client>")
            .field("config", &self.config)
            .finish()
    }
}

impl ElasticStore {
    pub fn new(config: ElasticConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ElasticConfig {
        &self.config
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.username {
            Some(user) => request.basic_auth(user, self.config.password.as_deref()),
            None => request,
        }
    }

    /// Phrase matches outrank token matches and the title outranks the body.
    pub fn build_request(&self, query: &Query, size: usize) -> Value {
        let fields = &self.config.fields;
        let text = query.text.as_str();

        let mut bool_query = json!({
            "should": [
                { "match_phrase": { fields.title.as_str(): { "query": text, "boost": 4 } } },
                { "match_phrase": { fields.body.as_str(): { "query": text, "boost": 3 } } },
                { "match": { fields.title.as_str(): { "query": text, "boost": 2 } } },
                { "match": { fields.body.as_str(): { "query": text, "boost": 1 } } }
            ],
            "minimum_should_match": 1
        });

        if !query.range.is_unbounded() {
            let mut bounds = Map::new();
            if let Some(start) = query.range.start {
                bounds.insert("gte".to_string(), json!(start.format("%Y-%m-%d").to_string()));
            }
            if let Some(end) = query.range.end {
                bounds.insert("lte".to_string(), json!(end.format("%Y-%m-%d").to_string()));
            }
            bounds.insert("format".to_string(), json!("yyyy-MM-dd"));
            bool_query["filter"] = json!([{ "range": { fields.date.as_str(): bounds } }]);
        }

        json!({
            "query": { "bool": bool_query },
            "size": size,
            "track_scores": true,
            "_source": [fields.title, fields.body, fields.url, fields.date],
            "sort": [
                { "_score": { "order": "desc" } },
                { fields.date.as_str(): { "order": "desc", "unmapped_type": "date" } }
            ]
        })
    }

    fn to_candidate(&self, hit: Hit) -> ScoredCandidate {
        let fields = &self.config.fields;
        let url = text_field(&hit.source, &fields.url);
        let article = ArticleRecord {
            title: text_field(&hit.source, &fields.title),
            body: text_field(&hit.source, &fields.body),
            published_at: date_field(&hit.source, &fields.date),
            url: (!url.is_empty()).then_some(url),
            ..Default::default()
        };
        ScoredCandidate::new(article, hit.score.unwrap_or(0.0).max(0.0))
    }
}

#[async_trait]
impl ArticleStore for ElasticStore {
    fn name(&self) -> &str {
        "elastic"
    }

    async fn search(&self, query: &Query, limit: usize) -> Result<Vec<ScoredCandidate>> {
        let url = self.config.search_url();
        let body = self.build_request(query, limit);
        debug!("Search request to {}: {}", url, body);

        let response = self
            .authorize(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::SearchUnavailable(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!("Search backend answered {}: {}", status, detail);
            return Err(Error::SearchUnavailable(format!("{} returned {}: {}", url, status, detail)));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::SearchUnavailable(format!("malformed search response: {}", e)))?;

        let candidates: Vec<ScoredCandidate> = parsed.hits.hits.into_iter().map(|hit| self.to_candidate(hit)).collect();
        info!("🔍 {} hits for '{}'", candidates.len(), query.text);
        Ok(candidates)
    }

    /// A backend that answers with a non-2xx status is `SearchUnavailable`;
    /// one that cannot be reached at all is `Http`.
    async fn health(&self) -> Result<()> {
        let response = self.authorize(self.client.get(&self.config.url)).send().await?;
        if !response.status().is_success() {
            return Err(Error::SearchUnavailable(format!("{} returned {}", self.config.url, response.status())));
        }
        Ok(())
    }
}

fn text_field(source: &Map<String, Value>, field: &str) -> String {
    match source.get(field) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" "),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn date_field(source: &Map<String, Value>, field: &str) -> Option<NaiveDate> {
    match source.get(field)? {
        Value::String(s) => parse_date(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.date_naive()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nq_core::DateRange;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> ElasticStore {
        let config = ElasticConfig::new()
            .with_url(&server.uri())
            .unwrap()
            .with_index("idx")
            .with_timeout(Duration::from_secs(2));
        ElasticStore::new(config).unwrap()
    }

    #[test]
    fn test_request_shape() {
        let store = ElasticStore::new(ElasticConfig::new()).unwrap();
        let body = store.build_request(&Query::new("prix du carburant"), 5);

        assert_eq!(body["size"], 5);
        let should = body["query"]["bool"]["should"].as_array().unwrap();
        assert_eq!(should[0]["match_phrase"]["post_title"]["boost"], 4);
        assert_eq!(should[1]["match_phrase"]["summary"]["boost"], 3);
        assert_eq!(should[2]["match"]["post_title"]["query"], "prix du carburant");
        assert_eq!(body["sort"][0]["_score"]["order"], "desc");
        assert_eq!(body["sort"][1]["date"]["order"], "desc");
        assert!(body["query"]["bool"].get("filter").is_none());
    }

    #[test]
    fn test_request_carries_date_bounds() {
        let store = ElasticStore::new(ElasticConfig::new()).unwrap();
        let range = DateRange::new(NaiveDate::from_ymd_opt(2023, 1, 1), None);
        let body = store.build_request(&Query::new("eau").with_range(range), 3);

        let bounds = &body["query"]["bool"]["filter"][0]["range"]["date"];
        assert_eq!(bounds["gte"], "2023-01-01");
        assert!(bounds.get("lte").is_none());
    }

    #[tokio::test]
    async fn test_search_maps_hits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/idx/_search"))
            .and(body_partial_json(json!({ "size": 2 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": { "hits": [
                    { "_score": 7.5, "_source": {
                        "post_title": "Hausse du gasoil",
                        "summary": "Les prix grimpent",
                        "lien1": "https://medias24.com/a",
                        "date": "2023-04-02 10:00:00"
                    } },
                    { "_score": 3.0, "_source": { "post_title": "Sans date" } }
                ] }
            })))
            .mount(&server)
            .await;

        let found = store_for(&server).search(&Query::new("gasoil"), 2).await.unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].score, 7.5);
        assert_eq!(found[0].article.title, "Hausse du gasoil");
        assert_eq!(found[0].article.url.as_deref(), Some("https://medias24.com/a"));
        assert_eq!(found[0].article.published_at, NaiveDate::from_ymd_opt(2023, 4, 2));
        assert_eq!(found[1].article.body, "");
        assert_eq!(found[1].article.url, None);
    }

    #[tokio::test]
    async fn test_server_error_is_search_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = store_for(&server).search(&Query::new("gasoil"), 5).await.unwrap_err();
        assert!(matches!(err, Error::SearchUnavailable(msg) if msg.contains("500")));
    }

    #[tokio::test]
    async fn test_malformed_body_is_search_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = store_for(&server).search(&Query::new("gasoil"), 5).await.unwrap_err();
        assert!(matches!(err, Error::SearchUnavailable(_)));
    }

    #[tokio::test]
    async fn test_refused_connection_is_search_unavailable() {
        let config = ElasticConfig::new().with_url("http://127.0.0.1:9").unwrap();
        let store = ElasticStore::new(config).unwrap();
        let err = store.search(&Query::new("gasoil"), 5).await.unwrap_err();
        assert!(matches!(err, Error::SearchUnavailable(_)));
    }

    #[tokio::test]
    async fn test_health_reports_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        assert!(store_for(&server).health().await.is_ok());
    }

    #[tokio::test]
    async fn test_health_separates_bad_status_from_unreachable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let err = store_for(&server).health().await.unwrap_err();
        assert!(matches!(err, Error::SearchUnavailable(ref msg) if msg.contains("401")));

        let config = ElasticConfig::new().with_url("http://127.0.0.1:9").unwrap();
        let err = ElasticStore::new(config).unwrap().health().await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }

    #[test]
    fn test_debug_redacts_password() {
        let mut config = ElasticConfig::new();
        config.password = Some("secret".to_string());
        assert!(!format!("{:?}", config).contains("secret"));
    }
}
