//! CSRF token extraction from the 591 landing page.

use scraper::{Html, Selector};

use crate::error::{Result, SaleError};

/// Selector for the anti-forgery meta element
const CSRF_META_SELECTOR: &str = r#"meta[name="csrf-token"]"#;

/// Extract the CSRF token from landing page HTML.
///
/// # Returns
/// * `Ok(Some(token))` when the meta element carries a non-blank `content`
/// * `Ok(None)` when the element or its `content` is missing
/// * `Err(SaleError::ParseError)` if the selector cannot be built
///
/// # Examples
/// ```
/// use sale591_core::parser::extract_csrf_token;
///
/// let html = r#"<html><head><meta name="csrf-token" content="abc123"></head></html>"#;
/// assert_eq!(extract_csrf_token(html).unwrap(), Some("abc123".to_string()));
/// assert_eq!(extract_csrf_token("<html></html>").unwrap(), None);
/// ```
pub fn extract_csrf_token(html: &str) -> Result<Option<String>> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(CSRF_META_SELECTOR)
        .map_err(|e| SaleError::ParseError(format!("Invalid selector: {:?}", e)))?;

    let token = document
        .select(&selector)
        .next()
        .and_then(|meta| meta.value().attr("content"))
        .filter(|content| !content.trim().is_empty())
        .map(str::to_string);

    Ok(token)
}
