//! Pagination support for GitHub list endpoints.
//!
//! GitHub announces further pages through the `Link` response header. A page
//! without a `rel="next"` link is the last one.

use serde::{Deserialize, Serialize};
use url::Url;

/// One page of a list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagedResponse<T> {
    /// Items in this page, in the order GitHub returned them
    pub items: Vec<T>,

    /// Number of the page these items came from (1-based)
    pub page: u32,

    /// Pagination metadata
    pub pagination: Pagination,
}

/// Pagination metadata extracted from Link headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// URL for next page (if available)
    pub next: Option<String>,

    /// URL for previous page (if available)
    pub prev: Option<String>,

    /// URL for first page (if available)
    pub first: Option<String>,

    /// URL for last page (if available)
    pub last: Option<String>,
}

impl Pagination {
    /// Check if there are more pages available.
    pub fn has_next(&self) -> bool {
        self.next.is_some()
    }

    /// Page number of the last page, if GitHub reported one.
    pub fn last_page(&self) -> Option<u32> {
        self.last.as_deref().and_then(extract_page_number)
    }
}

impl<T> PagedResponse<T> {
    /// Check if there are more pages available.
    pub fn has_next(&self) -> bool {
        self.pagination.has_next()
    }

    /// Get the next page number from the pagination URL.
    ///
    /// Only a page number greater than the current one counts, so a
    /// malformed link can never send enumeration backwards or in circles.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use gh_languages_sdk::client::{PagedResponse, Pagination};
    ///
    /// let pagination = Pagination {
    ///     next: Some("https://api.github.com/orgs/acme/repos?per_page=100&page=3".to_string()),
    ///     ..Pagination::default()
    /// };
    ///
    /// let response = PagedResponse {
    ///     items: vec![1, 2, 3],
    ///     page: 2,
    ///     pagination,
    /// };
    ///
    /// assert_eq!(response.next_page_number(), Some(3));
    /// ```
    pub fn next_page_number(&self) -> Option<u32> {
        self.pagination
            .next
            .as_deref()
            .and_then(extract_page_number)
            .filter(|next| *next > self.page)
    }

    /// Check if this is the last page.
    pub fn is_last_page(&self) -> bool {
        self.next_page_number().is_none()
    }
}

/// Parse pagination metadata from Link header.
///
/// GitHub returns Link headers like:
/// `<https://api.github.com/resource?page=2>; rel="next", <https://api.github.com/resource?page=5>; rel="last"`
pub fn parse_link_header(link_header: Option<&str>) -> Pagination {
    let mut pagination = Pagination::default();

    let Some(header) = link_header else {
        return pagination;
    };

    for link in header.split(',') {
        let mut parts = link.split(';');
        let Some(target) = parts.next() else {
            continue;
        };

        let target = target.trim();
        if !(target.starts_with('<') && target.ends_with('>')) {
            continue;
        }
        let target = target[1..target.len() - 1].to_string();

        for param in parts {
            let Some(rel) = param.trim().strip_prefix("rel=") else {
                continue;
            };

            for rel in rel.trim_matches('"').split_whitespace() {
                match rel {
                    "next" => pagination.next = Some(target.clone()),
                    "prev" => pagination.prev = Some(target.clone()),
                    "first" => pagination.first = Some(target.clone()),
                    "last" => pagination.last = Some(target.clone()),
                    _ => {}
                }
            }
        }
    }

    pagination
}

/// Extract the `page` query parameter from a URL.
///
/// Returns `None` for unparseable URLs, a missing parameter, or a page
/// number of zero.
///
/// # Examples
///
/// ```rust
/// use gh_languages_sdk::client::extract_page_number;
///
/// let url = "https://api.github.com/orgs/acme/repos?per_page=100&page=3";
/// assert_eq!(extract_page_number(url), Some(3));
/// assert_eq!(extract_page_number("https://api.github.com/orgs/acme/repos"), None);
/// ```
pub fn extract_page_number(url: &str) -> Option<u32> {
    let url = Url::parse(url).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse::<u32>().ok())
        .filter(|page| *page > 0)
}

#[cfg(test)]
#[path = "pagination_tests.rs"]
mod tests;
