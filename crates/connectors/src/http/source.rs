use crate::{
    error::SourceError,
    http::{
        extract::extract_records,
        retry::{RetryDisposition, RetryPolicy},
        settings::{AuthConfig, EndpointSettings},
    },
    options::SourceOptions,
    source::{RecordSource, SourceKind},
};
use async_trait::async_trait;
use model::{
    execution::errors::ConfigError,
    records::{row::Record, table::RecordTable},
};
use reqwest::{Client, StatusCode};
use serde_json::{Value as JsonValue, json};
use tracing::{debug, info, warn};

/// Reads records from a JSON HTTP endpoint.
pub struct EndpointSource {
    id: String,
    settings: EndpointSettings,
    client: Client,
    retry: RetryPolicy,
}

impl EndpointSource {
    pub fn new(id: &str, settings: EndpointSettings) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(!settings.verify_ssl)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("source `{id}`: HTTP client: {e}")))?;

        Ok(EndpointSource {
            id: id.to_string(),
            retry: RetryPolicy::with_retries(settings.retries),
            settings,
            client,
        })
    }

    pub fn from_options(id: &str, opts: &SourceOptions) -> Result<Self, ConfigError> {
        Self::new(id, EndpointSettings::from_options(opts)?)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn fetch_page(&self, page: Option<u64>) -> Result<Vec<Record>, SourceError> {
        let settings = &self.settings;
        let mut request = self
            .client
            .request(settings.method.clone(), settings.url.clone());

        for (name, value) in &settings.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let mut query = settings.params.clone();
        if let (Some(pagination), Some(page)) = (&settings.pagination, page) {
            query.push((pagination.page_param.clone(), page.to_string()));
            if let (Some(param), Some(size)) = (&pagination.size_param, pagination.page_size) {
                query.push((param.clone(), size.to_string()));
            }
        }
        if !query.is_empty() {
            request = request.query(&query);
        }

        request = match &settings.auth {
            AuthConfig::None => request,
            AuthConfig::Bearer { token } => request.bearer_auth(token.expose()),
            AuthConfig::ApiKey { header, key } => request.header(header.as_str(), key.expose()),
            AuthConfig::Basic { username, password } => {
                request.basic_auth(username, Some(password.expose()))
            }
        };

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Unavailable(e.without_url().to_string()))?;

        let status = response.status();
        let url = settings.redacted_url();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SourceError::Auth(format!("{url} returned {status}")));
        }
        if !status.is_success() {
            return Err(SourceError::Unavailable(format!("{url} returned {status}")));
        }

        let body: JsonValue = response.json().await.map_err(|e| {
            if e.is_timeout() {
                SourceError::Unavailable(format!("{url}: {}", e.without_url()))
            } else {
                SourceError::Format(format!("{url}: response is not valid JSON"))
            }
        })?;

        extract_records(&body, settings.data_path.as_deref())
    }

    async fn fetch_with_retry(&self, page: Option<u64>) -> Result<Vec<Record>, SourceError> {
        self.retry
            .run(
                || self.fetch_page(page),
                |err: &SourceError| {
                    if err.is_transient() {
                        warn!("Transient failure reading source `{}`: {err}", self.id);
                        RetryDisposition::Retry
                    } else {
                        RetryDisposition::Stop
                    }
                },
            )
            .await
    }
}

#[async_trait]
impl RecordSource for EndpointSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Api
    }

    fn describe(&self) -> serde_json::Value {
        let auth = match &self.settings.auth {
            AuthConfig::None => "none",
            AuthConfig::Bearer { .. } => "bearer",
            AuthConfig::ApiKey { .. } => "api_key",
            AuthConfig::Basic { .. } => "basic",
        };
        let header_names: Vec<&str> = self.settings.headers.iter().map(|(n, _)| n.as_str()).collect();
        let param_names: Vec<&str> = self.settings.params.iter().map(|(n, _)| n.as_str()).collect();

        json!({
            "id": self.id,
            "type": self.kind(),
            "url": self.settings.redacted_url(),
            "method": self.settings.method.as_str(),
            "auth_type": auth,
            "headers": header_names,
            "params": param_names,
            "data_path": self.settings.data_path,
            "timeout_secs": self.settings.timeout.as_secs(),
            "pagination": self.settings.pagination,
        })
    }

    /// Fetches every page. Any failing page fails the whole read so a
    /// partially paginated result is never returned.
    async fn read(&self) -> Result<RecordTable, SourceError> {
        info!("Requesting data from API: {}", self.settings.redacted_url());

        let Some(pagination) = &self.settings.pagination else {
            let records = self.fetch_with_retry(None).await?;
            return Ok(RecordTable::from_rows(records));
        };

        let mut records = Vec::new();
        let pages = (0..pagination.max_pages)
            .map_while(|offset| pagination.start.checked_add(offset));
        for page in pages {
            let batch = self.fetch_with_retry(Some(page)).await?;
            debug!("Source `{}` page {page}: {} rows", self.id, batch.len());
            if batch.is_empty() {
                break;
            }
            records.extend(batch);
        }

        Ok(RecordTable::from_rows(records))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::settings::Pagination;
    use model::core::{secret::Secret, value::Value};
    use reqwest::Url;
    use std::time::Duration;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path, query_param},
    };

    fn settings(server: &MockServer, route: &str) -> EndpointSettings {
        EndpointSettings::new(Url::parse(&format!("{}{route}", server.uri())).unwrap())
    }

    #[tokio::test]
    async fn test_bearer_request_and_data_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/activities"))
            .and(header("Authorization", "Bearer s3cret"))
            .and(query_param("team", "core"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"items": [{"cat": "A", "value": 5}, {"cat": "B", "value": 7}]}
            })))
            .mount(&server)
            .await;

        let mut cfg = settings(&server, "/activities");
        cfg.auth = AuthConfig::Bearer {
            token: Secret::new("s3cret"),
        };
        cfg.params = vec![("team".into(), "core".into())];
        cfg.data_path = Some("data.items".into());

        let table = EndpointSource::new("api", cfg).unwrap().read().await.unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[1].get_value("value"), Some(&Value::Int(7)));
    }

    #[tokio::test]
    async fn test_basic_and_api_key_auth() {
        let server = MockServer::start().await;
        Mock::given(path("/basic"))
            .and(header("Authorization", "Basic dXNlcjpwYXNz"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"a": 1}])))
            .mount(&server)
            .await;
        Mock::given(path("/key"))
            .and(header("X-Token", "k1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"a": 1}])))
            .mount(&server)
            .await;

        let mut basic = settings(&server, "/basic");
        basic.auth = AuthConfig::Basic {
            username: "user".into(),
            password: Secret::new("pass"),
        };
        let mut keyed = settings(&server, "/key");
        keyed.auth = AuthConfig::ApiKey {
            header: "X-Token".into(),
            key: Secret::new("k1"),
        };

        assert_eq!(EndpointSource::new("b", basic).unwrap().read().await.unwrap().len(), 1);
        assert_eq!(EndpointSource::new("k", keyed).unwrap().read().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_status_taxonomy() {
        let server = MockServer::start().await;
        Mock::given(path("/denied"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(path("/html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let read = |route: &str| {
            let source = EndpointSource::new("api", settings(&server, route)).unwrap();
            async move { source.read().await.unwrap_err().kind() }
        };

        assert_eq!(read("/denied").await, "SourceAuthError");
        assert_eq!(read("/broken").await, "SourceUnavailableError");
        assert_eq!(read("/html").await, "SourceFormatError");
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let mut cfg = settings(&server, "/slow");
        cfg.timeout = Duration::from_millis(200);

        let err = EndpointSource::new("slow", cfg).unwrap().read().await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_pagination_until_empty_page() {
        let server = MockServer::start().await;
        for (page, body) in [
            ("1", json!([{"n": 1}, {"n": 2}])),
            ("2", json!([{"n": 3}])),
            ("3", json!([])),
        ] {
            Mock::given(path("/pages"))
                .and(query_param("page", page))
                .and(query_param("size", "2"))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&server)
                .await;
        }

        let mut cfg = settings(&server, "/pages");
        cfg.pagination = Some(Pagination {
            page_param: "page".into(),
            start: 1,
            max_pages: 10,
            size_param: Some("size".into()),
            page_size: Some(2),
        });

        let table = EndpointSource::new("paged", cfg).unwrap().read().await.unwrap();
        assert_eq!(table.len(), 3);
    }

    #[tokio::test]
    async fn test_page_numbers_stop_at_u64_max() {
        let server = MockServer::start().await;
        for (page, body) in [(u64::MAX - 1, json!([{"n": 1}])), (u64::MAX, json!([{"n": 2}]))] {
            Mock::given(path("/pages"))
                .and(query_param("page", page.to_string().as_str()))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&server)
                .await;
        }

        let mut cfg = settings(&server, "/pages");
        cfg.pagination = Some(Pagination {
            page_param: "page".into(),
            start: u64::MAX - 1,
            max_pages: 10,
            size_param: None,
            page_size: None,
        });

        let table = EndpointSource::new("paged", cfg).unwrap().read().await.unwrap();
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_page_discards_whole_source() {
        let server = MockServer::start().await;
        Mock::given(path("/pages"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"n": 1}])))
            .mount(&server)
            .await;
        Mock::given(path("/pages"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let mut cfg = settings(&server, "/pages");
        cfg.pagination = Some(Pagination {
            page_param: "page".into(),
            start: 1,
            max_pages: 5,
            size_param: None,
            page_size: None,
        });

        let err = EndpointSource::new("paged", cfg).unwrap().read().await.unwrap_err();
        assert_eq!(err.kind(), "SourceUnavailableError");
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let server = MockServer::start().await;
        Mock::given(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"ok": true}])))
            .mount(&server)
            .await;

        let mut cfg = settings(&server, "/flaky");
        cfg.retries = 2;
        let source = EndpointSource::new("flaky", cfg)
            .unwrap()
            .with_retry_policy(RetryPolicy::with_retries(2).with_base_delay(Duration::ZERO));

        let table = source.read().await.unwrap();
        assert_eq!(table.rows[0].get_value("ok"), Some(&Value::Boolean(true)));
    }

    #[test]
    fn test_describe_redacts_credentials() {
        let mut cfg = EndpointSettings::new(Url::parse("https://api.test/x?key=abc").unwrap());
        cfg.auth = AuthConfig::Bearer {
            token: Secret::new("topsecret"),
        };
        cfg.headers = vec![("X-Session".into(), "session-value".into())];

        let description = EndpointSource::new("api", cfg).unwrap().describe().to_string();

        assert!(!description.contains("topsecret"));
        assert!(!description.contains("session-value"));
        assert!(!description.contains("abc"));
        assert!(description.contains("X-Session"));
    }
}
