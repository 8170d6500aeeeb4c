use crate::options::SourceOptions;
use model::{core::secret::Secret, execution::errors::ConfigError};
use reqwest::{
    Method, Url,
    header::{HeaderName, HeaderValue},
};
use serde::Serialize;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";
const DEFAULT_MAX_PAGES: u64 = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "auth_type", rename_all = "snake_case")]
pub enum AuthConfig {
    None,
    Bearer { token: Secret },
    ApiKey { header: String, key: Secret },
    Basic { username: String, password: Secret },
}

impl AuthConfig {
    fn from_options(opts: &SourceOptions) -> Result<Self, ConfigError> {
        let auth_type = opts.optional_str("auth_type")?.map(|s| s.to_ascii_lowercase());
        let secret = |key: &str| opts.required_str(key).map(Secret::from);

        match auth_type.as_deref() {
            None | Some("none") => Ok(AuthConfig::None),
            Some("bearer") => Ok(AuthConfig::Bearer {
                token: secret("auth_token")?,
            }),
            Some("api_key") => Ok(AuthConfig::ApiKey {
                header: opts
                    .optional_str("api_key_header")?
                    .unwrap_or_else(|| DEFAULT_API_KEY_HEADER.to_string()),
                key: secret("auth_token")?,
            }),
            Some("basic") => Ok(AuthConfig::Basic {
                username: opts.required_str("auth_username")?,
                password: secret("auth_password")?,
            }),
            Some(other) => Err(opts.invalid(
                "auth_type",
                &format!("unsupported `{other}` (expected bearer, basic, api_key or none)"),
            )),
        }
    }
}

/// Page-number pagination: the page parameter is incremented from `start`
/// until an empty page comes back or `max_pages` pages were fetched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pagination {
    pub page_param: String,
    pub start: u64,
    pub max_pages: u64,
    pub size_param: Option<String>,
    pub page_size: Option<u64>,
}

impl Pagination {
    fn from_options(opts: &SourceOptions) -> Result<Self, ConfigError> {
        let size_param = opts.optional_str("size_param")?;
        let page_size = match opts.get("page_size") {
            None => None,
            Some(_) => Some(opts.u64_or("page_size", 0)?),
        };
        if page_size.is_some() && size_param.is_none() {
            return Err(opts.invalid("page_size", "requires `size_param`"));
        }

        let max_pages = opts.u64_or("max_pages", DEFAULT_MAX_PAGES)?;
        if max_pages == 0 {
            return Err(opts.invalid("max_pages", "must be at least 1"));
        }

        Ok(Pagination {
            page_param: opts.optional_str("page_param")?.unwrap_or_else(|| "page".into()),
            start: opts.u64_or("start", 1)?,
            max_pages,
            size_param,
            page_size,
        })
    }
}

#[derive(Debug, Clone)]
pub struct EndpointSettings {
    pub url: Url,
    pub method: Method,
    pub auth: AuthConfig,
    pub headers: Vec<(String, String)>,
    pub params: Vec<(String, String)>,
    pub data_path: Option<String>,
    pub timeout: Duration,
    pub verify_ssl: bool,
    pub retries: usize,
    pub pagination: Option<Pagination>,
}

impl EndpointSettings {
    pub fn new(url: Url) -> Self {
        EndpointSettings {
            url,
            method: Method::GET,
            auth: AuthConfig::None,
            headers: Vec::new(),
            params: Vec::new(),
            data_path: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            verify_ssl: true,
            retries: 0,
            pagination: None,
        }
    }

    pub fn from_options(opts: &SourceOptions) -> Result<Self, ConfigError> {
        let raw_url = opts.required_str("url")?;
        let url = Url::parse(&raw_url).map_err(|e| opts.invalid("url", &e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(opts.invalid("url", "only http and https endpoints are supported"));
        }

        let method = match opts.optional_str("method")?.map(|m| m.to_ascii_uppercase()) {
            None => Method::GET,
            Some(m) if m == "GET" => Method::GET,
            Some(m) if m == "POST" => Method::POST,
            Some(m) => return Err(opts.invalid("method", &format!("unsupported `{m}`"))),
        };

        let timeout = opts.u64_or("timeout", DEFAULT_TIMEOUT_SECS)?;
        if timeout == 0 {
            return Err(opts.invalid("timeout", "must be at least 1 second"));
        }

        let headers = opts.string_map("headers")?;
        for (name, value) in &headers {
            if HeaderName::from_bytes(name.as_bytes()).is_err() || HeaderValue::from_str(value).is_err() {
                return Err(opts.invalid(&format!("headers.{name}"), "not a valid HTTP header"));
            }
        }

        let pagination = opts
            .nested("pagination")?
            .map(|p| Pagination::from_options(&p))
            .transpose()?;

        Ok(EndpointSettings {
            url,
            method,
            auth: AuthConfig::from_options(opts)?,
            headers,
            params: opts.string_map("params")?,
            data_path: opts.optional_str("data_path")?.filter(|p| !p.trim().is_empty()),
            timeout: Duration::from_secs(timeout),
            verify_ssl: opts.bool_or("verify_ssl", true)?,
            retries: opts.usize_or("retries", 0)?,
            pagination,
        })
    }

    /// URL without query string or credentials, safe to log.
    pub fn redacted_url(&self) -> String {
        let mut url = self.url.clone();
        url.set_query(None);
        let _ = url.set_password(None);
        let _ = url.set_username("");
        url.to_string()
    }
}
