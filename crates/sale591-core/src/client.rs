//! HTTP session and pacing for sale.591.com.tw
//!
//! Each search runs on its own [`SessionClient`]: a reqwest client with a
//! private cookie jar, so cookies set by the landing page and the region
//! cookie are sent on every search request of that run and nowhere else.

use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use reqwest::cookie::Jar;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{StatusCode, Url};
use tracing::debug;

use crate::error::{Result, SaleError};
use crate::parser::{extract_csrf_token, parse_search_page, SearchPage};
use crate::query::OffsetMode;

/// Base URL for the 591 sale site
pub const SALE591_BASE_URL: &str = "https://sale.591.com.tw";

/// Path of the internal search API, relative to the base URL
pub const SEARCH_PATH: &str = "/home/search/list-v2";

/// Header carrying the anti-forgery token on search requests
pub const CSRF_HEADER: &str = "X-CSRF-TOKEN";

/// Cookie selecting the region the site serves
pub const REGION_COOKIE: &str = "urlJumpIp";

/// Region used when the filter does not name one
pub const DEFAULT_REGION: &str = "1";

/// Parent domain the region cookie is scoped to
pub const DEFAULT_COOKIE_DOMAIN: &str = ".591.com.tw";

/// Default User-Agent mimicking desktop Safari
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15";

/// Lower bound of the randomized wait between pages
const MIN_DELAY_SECS: f64 = 1.0;

/// Configuration for the 591 search client
///
/// Treated as immutable once handed to a client; per-request headers are
/// built from copies.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Site root, landing page for the token (default: sale.591.com.tw)
    pub base_url: String,
    /// Upper bound of the wait between pages in seconds (default: 5.0)
    pub max_delay_secs: f64,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Browser identifier sent with every request
    pub user_agent: String,
    /// Extra headers sent with every request
    pub headers: Vec<(String, String)>,
    /// Domain for the region cookie; `None` scopes it to the base URL host
    pub cookie_domain: Option<String>,
    /// How `firstRow` is attached across pages
    pub offset_mode: OffsetMode,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: SALE591_BASE_URL.to_string(),
            max_delay_secs: 5.0,
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers: Vec::new(),
            cookie_domain: Some(DEFAULT_COOKIE_DOMAIN.to_string()),
            offset_mode: OffsetMode::Fresh,
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with `SALE591_*` environment variables.
    ///
    /// Recognized: `SALE591_BASE_URL`, `SALE591_MAX_DELAY_SECS`,
    /// `SALE591_TIMEOUT_SECS`, `SALE591_USER_AGENT`, `SALE591_COOKIE_DOMAIN`
    /// (empty value means host-only).
    ///
    /// # Errors
    /// `SaleError::ConfigError` if a variable is set but unparsable, or the
    /// resulting configuration fails [`ClientConfig::validate`].
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(base_url) = env_var::<String>("SALE591_BASE_URL")? {
            config.base_url = base_url;
        }
        if let Some(max_delay) = env_var::<f64>("SALE591_MAX_DELAY_SECS")? {
            config.max_delay_secs = max_delay;
        }
        if let Some(timeout) = env_var::<u64>("SALE591_TIMEOUT_SECS")? {
            config.timeout_secs = timeout;
        }
        if let Some(user_agent) = env_var::<String>("SALE591_USER_AGENT")? {
            config.user_agent = user_agent;
        }
        if let Some(domain) = env_var::<String>("SALE591_COOKIE_DOMAIN")? {
            config.cookie_domain = Some(domain).filter(|d| !d.trim().is_empty());
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges and the base URL.
    pub fn validate(&self) -> Result<()> {
        if !self.max_delay_secs.is_finite() || self.max_delay_secs <= 0.0 {
            return Err(SaleError::ConfigError(format!(
                "max_delay_secs must be a positive number, got {}",
                self.max_delay_secs
            )));
        }
        if Duration::try_from_secs_f64(self.max_delay_secs).is_err() {
            return Err(SaleError::ConfigError(format!(
                "max_delay_secs is too large, got {}",
                self.max_delay_secs
            )));
        }
        if self.timeout_secs == 0 {
            return Err(SaleError::ConfigError(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        let base_url = self.parsed_base_url()?;
        if let Some(domain) = &self.cookie_domain {
            let host = base_url.host_str().unwrap_or_default();
            if !domain_matches(host, domain) {
                return Err(SaleError::ConfigError(format!(
                    "cookie_domain {} does not cover base URL host {:?}",
                    domain, host
                )));
            }
        }
        Ok(())
    }

    fn parsed_base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .map_err(|e| SaleError::InvalidUrl(format!("{}: {}", self.base_url, e)))
    }

    /// Headers sent on every request: User-Agent plus the configured extras
    pub fn default_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, header_value(USER_AGENT.as_str(), &self.user_agent)?);
        for (name, value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                SaleError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            headers.insert(header_name, header_value(name, value)?);
        }
        Ok(headers)
    }

    /// Copy of the default headers with the CSRF token added
    pub fn request_headers(&self, csrf_token: &str) -> Result<HeaderMap> {
        let mut headers = self.default_headers()?;
        headers.insert(
            HeaderName::from_static("x-csrf-token"),
            header_value(CSRF_HEADER, csrf_token)?,
        );
        Ok(headers)
    }
}

/// Cookie domain matching: the host equals the domain or is a subdomain of it
fn domain_matches(host: &str, domain: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let domain = domain.trim_start_matches('.').to_ascii_lowercase();
    if domain.is_empty() {
        return false;
    }
    host == domain || host.ends_with(&format!(".{}", domain))
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| SaleError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

fn env_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| SaleError::ConfigError(format!("{}: {}", name, e))),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(SaleError::ConfigError(format!("{}: {}", name, e))),
    }
}

/// Source of the wait inserted between page requests
pub trait DelayPolicy: Send + Sync {
    /// Duration to wait before the next page
    fn next_delay(&self) -> Duration;
}

/// Uniformly random wait in `[min, max]`
#[derive(Debug, Clone)]
pub struct RandomDelay {
    min: Duration,
    max: Duration,
}

impl RandomDelay {
    /// Random wait between one second and `max_secs`.
    ///
    /// A `max_secs` below one second, or one too large to represent as a
    /// `Duration`, collapses the range to one second.
    ///
    /// # Example
    /// ```
    /// use sale591_core::client::{DelayPolicy, RandomDelay};
    /// use std::time::Duration;
    ///
    /// let delay = RandomDelay::new(5.0).next_delay();
    /// assert!(delay >= Duration::from_secs(1) && delay <= Duration::from_secs(5));
    /// ```
    pub fn new(max_secs: f64) -> Self {
        let min = Duration::from_secs_f64(MIN_DELAY_SECS);
        let max = Duration::try_from_secs_f64(max_secs)
            .ok()
            .filter(|max| *max > min)
            .unwrap_or(min);
        Self { min, max }
    }

    pub fn min(&self) -> Duration {
        self.min
    }

    pub fn max(&self) -> Duration {
        self.max
    }
}

impl DelayPolicy for RandomDelay {
    fn next_delay(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let range = self.min.as_secs_f64()..=self.max.as_secs_f64();
        let secs = rand::thread_rng().gen_range(range);
        Duration::from_secs_f64(secs)
    }
}

/// Same wait every time
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl DelayPolicy for FixedDelay {
    fn next_delay(&self) -> Duration {
        self.0
    }
}

/// No wait at all
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl DelayPolicy for NoDelay {
    fn next_delay(&self) -> Duration {
        Duration::ZERO
    }
}

/// Outcome of one search page request
#[derive(Debug)]
pub enum PageResponse {
    /// Success status and a decoded body
    Page(SearchPage),
    /// Non-success status; the body is not read
    Failed(StatusCode),
}

/// Cookie-carrying session bound to one search run
pub struct SessionClient {
    /// Underlying HTTP client
    client: reqwest::Client,
    /// Cookie jar shared with `client`
    jar: Arc<Jar>,
    base_url: Url,
    config: ClientConfig,
}

impl SessionClient {
    /// Open a fresh session with an empty cookie jar.
    ///
    /// # Errors
    /// Returns an error if the configuration does not validate or the HTTP
    /// client cannot be created
    pub fn open(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let base_url = config.parsed_base_url()?;
        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            jar,
            base_url,
            config: config.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Load the landing page and read its CSRF token.
    ///
    /// Cookies the page sets land in the session jar.
    ///
    /// # Errors
    /// - `SaleError::HttpError` - transport failure
    /// - `SaleError::MissingToken` - no `csrf-token` meta element
    pub async fn fetch_csrf_token(&self) -> Result<String> {
        let response = self
            .client
            .get(self.base_url.clone())
            .headers(self.config.default_headers()?)
            .send()
            .await?;
        let status = response.status();
        let html = response.text().await?;

        match extract_csrf_token(&html)? {
            Some(token) => {
                debug!(%status, "fetched csrf token");
                Ok(token)
            }
            None => Err(SaleError::MissingToken(self.base_url.to_string())),
        }
    }

    /// Put the region cookie into the session jar
    pub fn set_region_cookie(&self, region: &str) {
        let cookie = match &self.config.cookie_domain {
            Some(domain) => format!(
                "{}={}; Domain={}; Path=/",
                REGION_COOKIE, region, domain
            ),
            None => format!("{}={}; Path=/", REGION_COOKIE, region),
        };
        debug!(%cookie, "setting region cookie");
        self.jar.add_cookie_str(&cookie, &self.base_url);
    }

    /// Full URL of the search endpoint for a query string
    pub fn search_url(&self, query: &str) -> Result<Url> {
        let raw = format!(
            "{}{}?{}",
            self.base_url.as_str().trim_end_matches('/'),
            SEARCH_PATH,
            query
        );
        Url::parse(&raw).map_err(|e| SaleError::InvalidUrl(format!("{}: {}", raw, e)))
    }

    /// Request one page of search results.
    ///
    /// # Errors
    /// - `SaleError::HttpError` - transport failure
    /// - `SaleError::ParseError` - success status with an undecodable body
    pub async fn fetch_search_page(
        &self,
        query: &str,
        headers: &HeaderMap,
    ) -> Result<PageResponse> {
        let url = self.search_url(query)?;
        let response = self.client.get(url).headers(headers.clone()).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Ok(PageResponse::Failed(status));
        }

        let body = response.text().await?;
        parse_search_page(&body).map(PageResponse::Page)
    }
}
