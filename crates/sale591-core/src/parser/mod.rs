//! Parsers for 591 responses
//!
//! - `token`: pull the CSRF token out of the landing page HTML
//! - `listing`: decode a search API page

pub mod listing;
pub mod token;

pub use listing::{parse_search_page, SearchPage};
pub use token::extract_csrf_token;
