//! Query string construction for the search endpoint
//!
//! Parameters are rendered verbatim as `&key=value`; percent-encoding of
//! non-ASCII bytes is left to the URL parser when the request is built.

use crate::types::{SearchFilter, SortSpec};

/// Fixed parameters every search request starts with
pub const BASE_QUERY: &str = "type=2&category=1&shType=list";

/// Number of listings the API returns per page
pub const PAGE_SIZE: u32 = 30;

/// How the `firstRow` offset is attached to successive page queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OffsetMode {
    /// Each page gets the base query plus exactly one `firstRow`
    #[default]
    Fresh,
    /// Each page appends its `firstRow` to the previous page's query, so
    /// page `n` carries `n + 1` offsets and the server honors the last one
    Accumulate,
}

/// Query builder for one search run
#[derive(Debug, Clone)]
pub struct SearchQuery {
    base: String,
    mode: OffsetMode,
    running: String,
}

impl SearchQuery {
    /// Build the base query from the fixed parameters, the filter, then the sort.
    pub fn new(filter: Option<&SearchFilter>, sort: Option<&SortSpec>, mode: OffsetMode) -> Self {
        let mut base = String::from(BASE_QUERY);
        for params in [filter, sort].into_iter().flatten() {
            for (key, value) in params.iter() {
                base.push('&');
                base.push_str(key);
                base.push('=');
                base.push_str(&value.to_string());
            }
        }

        Self {
            running: base.clone(),
            base,
            mode,
        }
    }

    /// The query without any `firstRow` offset
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Query string for the given zero-based page.
    ///
    /// In `Accumulate` mode pages must be requested in order; each call
    /// extends the running query.
    pub fn page(&mut self, page: u32) -> String {
        let suffix = format!("&firstRow={}", first_row(page));
        match self.mode {
            OffsetMode::Fresh => format!("{}{}", self.base, suffix),
            OffsetMode::Accumulate => {
                self.running.push_str(&suffix);
                self.running.clone()
            }
        }
    }
}

/// Offset of the first listing on a zero-based page
pub fn first_row(page: u32) -> u64 {
    u64::from(page) * u64::from(PAGE_SIZE)
}
