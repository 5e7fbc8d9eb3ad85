//! Main 591 search API
//!
//! Ties the session client, query builder and parsers together into one
//! paginated search.

use tokio::time::sleep;
use tracing::{info, warn};

use crate::client::{
    ClientConfig, DelayPolicy, PageResponse, RandomDelay, SessionClient, DEFAULT_REGION,
};
use crate::error::Result;
use crate::query::{first_row, SearchQuery};
use crate::types::{SearchFilter, SearchResult, SortSpec};

/// Paginated search client for sale.591.com.tw
///
/// Every call to [`SearchClient::search`] opens its own cookie session, so a
/// client can be reused for any number of independent searches.
///
/// # Example
/// ```no_run
/// use sale591_core::{SearchClient, SearchFilter};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = SearchClient::new()?;
///     let filter = SearchFilter::new().with("regionid", 3).with("section", 40);
///
///     let result = client.search(Some(&filter), None, 2).await?;
///     println!("{} listings of {}", result.listings.len(), result.total_count);
///
///     Ok(())
/// }
/// ```
pub struct SearchClient {
    config: ClientConfig,
    delay: Box<dyn DelayPolicy>,
}

impl SearchClient {
    /// Create a client with default configuration.
    ///
    /// # Errors
    /// Returns an error if the default configuration is rejected.
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a client with custom configuration.
    ///
    /// The wait between pages is random in `[1, max_delay_secs]` seconds.
    ///
    /// # Errors
    /// `SaleError::ConfigError` or `SaleError::InvalidUrl` if the
    /// configuration does not validate.
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let delay = RandomDelay::new(config.max_delay_secs);
        Ok(Self {
            config,
            delay: Box::new(delay),
        })
    }

    /// Replace the wait between pages.
    pub fn with_delay(mut self, delay: impl DelayPolicy + 'static) -> Self {
        self.delay = Box::new(delay);
        self
    }

    /// Run a paginated search.
    ///
    /// Fetches the landing page for cookies and the CSRF token, then requests
    /// up to `want_page` pages of 30 listings each. A page answered with a
    /// non-success status ends pagination; whatever was collected is
    /// returned with `halted_on` set.
    ///
    /// # Arguments
    /// * `filter` - Filter parameters, `region` also selects the region cookie
    /// * `sort` - Sort parameters, appended after the filter
    /// * `want_page` - Number of pages to request
    ///
    /// # Errors
    /// - `SaleError::MissingToken` - landing page has no token; no search
    ///   request is sent
    /// - `SaleError::HttpError` - transport failure on any request
    /// - `SaleError::ParseError` - a success page carried an undecodable body
    pub async fn search(
        &self,
        filter: Option<&SearchFilter>,
        sort: Option<&SortSpec>,
        want_page: u32,
    ) -> Result<SearchResult> {
        let session = SessionClient::open(&self.config)?;

        let token = session.fetch_csrf_token().await?;
        let headers = self.config.request_headers(&token)?;

        let mut query = SearchQuery::new(filter, sort, self.config.offset_mode);

        let region = filter
            .and_then(|f| f.get("region"))
            .map(|v| v.to_string())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        session.set_region_cookie(&region);

        let mut result = SearchResult::default();

        for page in 0..want_page {
            if page > 0 {
                sleep(self.delay.next_delay()).await;
            }

            let page_query = query.page(page);
            info!(page, first_row = first_row(page), "requesting search page");

            match session.fetch_search_page(&page_query, &headers).await? {
                PageResponse::Page(data) => {
                    result.total_count = data.total;
                    result.listings.extend(data.house_list);
                    result.pages_fetched += 1;
                }
                PageResponse::Failed(status) => {
                    warn!(
                        %status,
                        page,
                        collected = result.listings.len(),
                        "search request failed, returning partial results"
                    );
                    result.halted_on = Some(status.as_u16());
                    break;
                }
            }
        }

        info!(
            total = result.total_count,
            listings = result.listings.len(),
            pages = result.pages_fetched,
            "search finished"
        );
        Ok(result)
    }
}
