//! 591 Sale Scraper Core Library
//!
//! This crate queries the internal search API of sale.591.com.tw and
//! returns the raw listings.
//!
//! # Features
//! - Per-search cookie session with CSRF token handshake
//! - Ordered filter and sort parameters passed through verbatim
//! - Paginated fetch, 30 listings per page, with a randomized polite delay
//! - Partial results when a page request fails

pub mod client;
pub mod error;
pub mod parser;
pub mod query;
pub mod scraper;
pub mod types;

// Re-export main types for convenience
pub use client::{ClientConfig, DelayPolicy, FixedDelay, NoDelay, RandomDelay, SessionClient};
pub use error::{Result, SaleError};
pub use query::{OffsetMode, SearchQuery, PAGE_SIZE};
pub use scraper::SearchClient;
pub use types::{ListingRecord, ParamValue, Params, SearchFilter, SearchResult, SortSpec};
