//! Data types for the 591 search scraper
//!
//! Filter and sort parameters are kept in insertion order because the remote
//! query string is built by walking them front to back.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A raw listing as returned by the search API.
///
/// The remote schema is not ours, so listings are passed through untouched.
pub type ListingRecord = serde_json::Value;

/// A query parameter value: either text or an integer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(n) => write!(f, "{}", n),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

/// Insertion-ordered parameter mapping.
///
/// Inserting a key that already exists replaces the value but keeps the
/// original position, the same way a dictionary would.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    entries: Vec<(String, ParamValue)>,
}

/// Filter constraints (region, price range, area, keywords, ...)
pub type SearchFilter = Params;

/// Sort keys, appended to the query after the filter
pub type SortSpec = Params;

impl Params {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a parameter
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Builder-style `insert`
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

/// Aggregate result of one paginated search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    /// `data.total` of the last successfully parsed page (0 if none)
    pub total_count: u64,
    /// Listings of every fetched page, in page order
    pub listings: Vec<ListingRecord>,
    /// Number of search pages that returned a success status
    pub pages_fetched: u32,
    /// Status code that stopped pagination early, if any
    pub halted_on: Option<u16>,
}

impl SearchResult {
    /// Whether pagination stopped on a failed request
    pub fn is_partial(&self) -> bool {
        self.halted_on.is_some()
    }

    /// Split into `(total_count, listings)`
    pub fn into_parts(self) -> (u64, Vec<ListingRecord>) {
        (self.total_count, self.listings)
    }
}
