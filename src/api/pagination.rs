//! Page-number pagination for list endpoints.

use axum::http::{HeaderMap, Uri};
use serde::Serialize;

use crate::{Result, StoreError};

pub const PAGE_SIZE: i64 = 10;

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// The requested page, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageNumber(i64);

impl PageNumber {
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        match raw {
            None | Some("") => Ok(Self(1)),
            Some(s) => s.parse::<i64>().ok().filter(|n| *n >= 1).map(Self).ok_or(StoreError::InvalidPage),
        }
    }

    pub fn offset(&self) -> i64 { (self.0 - 1) * PAGE_SIZE }
    pub fn limit(&self) -> i64 { PAGE_SIZE }

    /// Wraps one page of `results`; pages past the end are an error except the first.
    pub fn paginate<T>(&self, count: i64, results: Vec<T>, uri: &Uri, headers: &HeaderMap) -> Result<Paginated<T>> {
        if self.0 > 1 && self.offset() >= count { return Err(StoreError::InvalidPage); }
        let next = (self.offset() + PAGE_SIZE < count).then(|| page_link(uri, headers, self.0 + 1));
        let previous = (self.0 > 1).then(|| page_link(uri, headers, self.0 - 1));
        Ok(Paginated { count, next, previous, results })
    }
}

/// Absolute link to `page` keeping every other query parameter; page 1 drops the parameter.
fn page_link(uri: &Uri, headers: &HeaderMap, page: i64) -> String {
    let host = headers.get(axum::http::header::HOST).and_then(|h| h.to_str().ok()).unwrap_or("localhost");
    let mut params: Vec<String> = uri
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|p| !p.is_empty() && !p.starts_with("page=") && *p != "page")
        .map(str::to_string)
        .collect();
    if page > 1 { params.push(format!("page={page}")); }
    let query = if params.is_empty() { String::new() } else { format!("?{}", params.join("&")) };
    format!("http://{host}{}{query}", uri.path())
}
