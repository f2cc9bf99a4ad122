use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: usize = 100;

/// Query parameters for page-based list endpoints (`?page=1&pageSize=10`).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageParams {
    #[serde(default = "default_page")]
    pub page: usize,

    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    10
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl PageParams {
    /// Page number, never below 1.
    pub fn page(&self) -> usize {
        self.page.max(1)
    }

    /// Page size clamped to `1..=MAX_PAGE_SIZE`.
    pub fn limit(&self) -> usize {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    /// Row offset of the first item on this page. Saturates, and stays
    /// within `i64` so it can be bound as a SQL parameter.
    pub fn offset(&self) -> usize {
        (self.page() - 1)
            .saturating_mul(self.limit())
            .min(usize::try_from(i64::MAX).unwrap_or(usize::MAX))
    }
}

/// One page of results plus the numbers a client needs to paginate.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

impl<T: Serialize> Page<T> {
    pub fn new(items: Vec<T>, total: usize, params: &PageParams) -> Self {
        let page_size = params.limit();
        Self {
            items,
            total,
            page: params.page(),
            page_size,
            total_pages: total.div_ceil(page_size),
        }
    }
}

/// Generate a new random ID (UUIDv4, no dashes).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Fixed-width UTC timestamp used in indexed columns, so that string
/// comparison in SQL matches chronological order.
pub fn sortable_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}
