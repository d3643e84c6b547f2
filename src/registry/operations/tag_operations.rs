//! Tag listing for registry client
//!
//! Implements `GET /v2/{name}/tags/list` with `Link`-header pagination. Each
//! follow-up request goes to the same endpoint with the query parameters taken
//! from the `rel="next"` link.

use crate::error::handlers::{HttpErrorHandler, NetworkErrorHandler};
use crate::error::{RegistryError, Result};
use crate::registry::auth::Authorization;
use regex::Regex;
use reqwest::header::LINK;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::{debug, trace};
use url::form_urlencoded;

static NEXT_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^<(.*)>; rel="next"$"#).expect("link pattern is valid"));

/// Query parameters to send with the next tags request
pub type Cursor = Vec<(String, String)>;

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// One page of a tag listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPage {
    pub tags: Vec<String>,
    pub next: Option<Cursor>,
}

/// Extract the query parameters of a `<url>; rel="next"` link header.
///
/// Returns `None` when the header does not match, so pagination stops.
pub fn parse_next_link(header: &str) -> Option<Cursor> {
    let caps = NEXT_LINK_RE.captures(header.trim())?;
    let link = caps.get(1)?.as_str();
    let query = link.split_once('?').map(|(_, q)| q).unwrap_or("");
    Some(
        form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect(),
    )
}

#[derive(Debug, Clone)]
pub struct TagOperations {
    client: Client,
    base_url: String,
    page_size: usize,
}

impl TagOperations {
    pub fn new(client: Client, base_url: String, page_size: usize) -> Self {
        Self {
            client,
            base_url,
            page_size,
        }
    }

    /// Fetch every tag of `repository`, following pagination links in order.
    pub async fn list_tags(&self, repository: &str, authorization: &Authorization) -> Result<Vec<String>> {
        let mut all_tags = Vec::new();
        let mut seen_cursors: HashSet<Cursor> = HashSet::new();
        let mut cursor = vec![("n".to_string(), self.page_size.to_string())];
        let mut pages = 0usize;

        loop {
            let page = self.fetch_page(repository, &cursor, authorization).await?;
            pages += 1;
            trace!("Page {} of {} held {} tags", pages, repository, page.tags.len());
            all_tags.extend(page.tags);

            match page.next {
                Some(next) if !next.is_empty() && seen_cursors.insert(next.clone()) => cursor = next,
                Some(next) if !next.is_empty() => {
                    debug!("Pagination cursor repeated for {}, stopping", repository);
                    break;
                }
                _ => break,
            }
        }

        debug!("Listed {} tags for {} in {} page(s)", all_tags.len(), repository, pages);
        Ok(all_tags)
    }

    pub async fn fetch_page(
        &self,
        repository: &str,
        cursor: &[(String, String)],
        authorization: &Authorization,
    ) -> Result<TagPage> {
        let url = format!("{}/{}/tags/list", self.base_url, repository);

        let request = authorization.apply(self.client.get(&url).query(cursor));
        let response = request
            .send()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, &url))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(HttpErrorHandler::handle_tags_error(status, &url));
        }

        let next = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_link);

        let body = response
            .text()
            .await
            .map_err(|e| NetworkErrorHandler::handle_network_error(&e, &url))?;
        let parsed: TagsResponse = serde_json::from_str(&body).map_err(|e| {
            RegistryError::registry(&url, Some(status.as_u16()), format!("Failed to parse tags response: {}", e))
        })?;

        Ok(TagPage {
            tags: parsed.tags.unwrap_or_default(),
            next,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_relative_next_link() {
        let cursor = parse_next_link(r#"</v2/app/tags/list?last=v1.9&n=1000>; rel="next""#).unwrap();
        assert_eq!(
            cursor,
            vec![
                ("last".to_string(), "v1.9".to_string()),
                ("n".to_string(), "1000".to_string()),
            ]
        );
    }

    #[test]
    fn decodes_escaped_cursor_values() {
        let cursor = parse_next_link(r#"<https://r.example.com/v2/a/tags/list?n=2&last=1.0%2Bbuild>; rel="next""#).unwrap();
        assert!(cursor.contains(&("last".to_string(), "1.0+build".to_string())));
    }

    #[test]
    fn malformed_link_stops_pagination() {
        assert!(parse_next_link(r#"</v2/app/tags/list?last=x>; rel="prev""#).is_none());
        assert!(parse_next_link("garbage").is_none());
        assert_eq!(parse_next_link(r#"</v2/app/tags/list>; rel="next""#), Some(vec![]));
    }

    #[test]
    fn null_tags_is_an_empty_page() {
        let parsed: TagsResponse = serde_json::from_str(r#"{"name":"app","tags":null}"#).unwrap();
        assert!(parsed.tags.unwrap_or_default().is_empty());
    }
}
