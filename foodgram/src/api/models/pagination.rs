//! Page-number pagination shared by the paginated list endpoints.
//!
//! Clients pass `page` (1-based) and `limit`. A malformed or non-positive `limit` falls back
//! to the configured default and large values are capped at the configured maximum, while a
//! malformed page or a page past the end is a 404. Responses carry absolute `next`/`previous`
//! links that keep every other query parameter.

use axum::http::Uri;
use serde::{Deserialize, Serialize};
use url::Url;
use utoipa::{IntoParams, ToSchema};

use crate::config::{Config, PaginationConfig};
use crate::errors::{Error, Result};

pub const PAGE_PARAM: &str = "page";
pub const LIMIT_PARAM: &str = "limit";

/// Raw pagination query parameters, validated by [`Pagination::resolve`]
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
pub struct Pagination {
    /// Page number, starting at 1
    #[param(value_type = Option<i64>, minimum = 1)]
    #[schema(value_type = Option<i64>)]
    pub page: Option<String>,

    /// Items per page (default 6, capped at the configured maximum)
    #[param(value_type = Option<i64>, minimum = 1)]
    #[schema(value_type = Option<i64>)]
    pub limit: Option<String>,
}

/// A validated page request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

fn invalid_page() -> Error {
    Error::EmptyResult {
        message: "Invalid page.".to_string(),
    }
}

impl Pagination {
    /// Take `page` and `limit` out of already parsed query pairs
    pub fn from_pairs(pairs: &[(String, String)]) -> Self {
        let get = |name: &str| pairs.iter().rev().find(|(key, _)| key == name).map(|(_, value)| value.clone());
        Self {
            page: get(PAGE_PARAM),
            limit: get(LIMIT_PARAM),
        }
    }

    pub fn resolve(&self, config: &PaginationConfig) -> Result<PageRequest> {
        let page = match self.page.as_deref().map(str::trim) {
            None | Some("") => 1,
            Some(raw) => raw.parse::<i64>().ok().filter(|page| *page >= 1).ok_or_else(invalid_page)?,
        };

        let limit = self
            .limit
            .as_deref()
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|limit| *limit > 0)
            .map(|limit| limit.min(config.max_page_size))
            .unwrap_or(config.default_page_size);

        Ok(PageRequest { page, limit })
    }
}

impl PageRequest {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Reject pages past the end. The first page always exists, even when empty.
    pub fn ensure_exists(&self, count: i64) -> Result<()> {
        if self.page > 1 && self.offset() >= count {
            return Err(invalid_page());
        }
        Ok(())
    }

    pub fn has_next(&self, count: i64) -> bool {
        self.page.saturating_mul(self.limit) < count
    }
}

/// Absolute link to `page` of the current request, keeping the other query parameters.
/// Page 1 is written without a page parameter.
pub fn page_link(config: &Config, uri: &Uri, page: i64) -> Option<String> {
    let mut url = Url::parse(&config.absolute_url(uri.path())).ok()?;

    let mut pairs: Vec<(String, String)> = url::form_urlencoded::parse(uri.query().unwrap_or_default().as_bytes())
        .into_owned()
        .filter(|(key, _)| key != PAGE_PARAM)
        .collect();
    if page > 1 {
        pairs.push((PAGE_PARAM.to_string(), page.to_string()));
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(&pairs);
    }
    Some(url.to_string())
}

/// One page of results
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T: ToSchema> {
    /// Total number of items across all pages
    pub count: i64,
    /// Link to the next page, if any
    pub next: Option<String>,
    /// Link to the previous page, if any
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T: ToSchema> PaginatedResponse<T> {
    pub fn new(results: Vec<T>, count: i64, page: PageRequest, config: &Config, uri: &Uri) -> Self {
        let next = if page.has_next(count) {
            page_link(config, uri, page.page + 1)
        } else {
            None
        };
        let previous = if page.page > 1 {
            page_link(config, uri, page.page - 1)
        } else {
            None
        };

        Self {
            count,
            next,
            previous,
            results,
        }
    }
}
