//! Search API page decoding.
//!
//! The endpoint answers with `{ "data": { "total": ..., "house_list": [...] } }`.
//! Everything else in the body is ignored, and listings stay opaque.

use serde::{Deserialize, Deserializer};

use crate::error::{Result, SaleError};
use crate::types::ListingRecord;

/// One decoded page of search results
#[derive(Debug, Clone, Deserialize)]
pub struct SearchPage {
    /// Total number of matching listings reported by the server
    #[serde(deserialize_with = "deserialize_total")]
    pub total: u64,
    /// Listings on this page
    pub house_list: Vec<ListingRecord>,
}

#[derive(Deserialize)]
struct Envelope {
    data: SearchPage,
}

/// Parse a search API response body.
///
/// # Errors
/// `SaleError::ParseError` if the body is not JSON or `data.total` /
/// `data.house_list` are missing or malformed.
pub fn parse_search_page(body: &str) -> Result<SearchPage> {
    serde_json::from_str::<Envelope>(body)
        .map(|envelope| envelope.data)
        .map_err(|e| SaleError::ParseError(e.to_string()))
}

/// `total` shows up both as a JSON number and as a numeric string
/// (sometimes with thousands separators).
fn deserialize_total<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Total {
        Number(u64),
        Text(String),
    }

    match Total::deserialize(deserializer)? {
        Total::Number(n) => Ok(n),
        Total::Text(s) => s
            .trim()
            .replace(',', "")
            .parse::<u64>()
            .map_err(|_| serde::de::Error::custom(format!("invalid total: {:?}", s))),
    }
}
