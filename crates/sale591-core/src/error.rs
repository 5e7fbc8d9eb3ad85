//! Error types for the 591 search scraper
//!
//! A non-success status on a paginated request is not an error here: the
//! scraper stops and returns what it collected (see `SearchResult::halted_on`).

use thiserror::Error;

/// Error type for 591 scraper operations
#[derive(Error, Debug)]
pub enum SaleError {
    /// Network or transport failure (timeouts, DNS, connection reset)
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// The landing page carried no usable `csrf-token` meta element
    #[error("CSRF token not found on {0}")]
    MissingToken(String),

    /// A search response body could not be decoded
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Invalid URL format
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A configured header name or value is not valid HTTP
    #[error("Invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    /// Configuration value out of range or unparsable
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

/// Result type alias for 591 scraper operations
pub type Result<T> = std::result::Result<T, SaleError>;
