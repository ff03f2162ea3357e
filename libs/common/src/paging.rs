//! Offset pagination
//!
//! Page sizes above [`MAX_PAGE_SIZE`] are clamped silently rather than
//! rejected. Slices are only deterministic when the source is ordered by a
//! stable key before paging.

use serde::{Deserialize, Serialize};

/// Largest page a caller can ask for
pub const MAX_PAGE_SIZE: u32 = 50;
/// Page size used when the caller does not ask for one
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Requested page, already clamped into its valid range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagingParams {
    page_number: u32,
    page_size: u32,
}

impl Default for PagingParams {
    fn default() -> Self {
        Self {
            page_number: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PagingParams {
    /// Page numbers start at 1; sizes are clamped into `1..=MAX_PAGE_SIZE`
    pub fn new(page_number: u32, page_size: u32) -> Self {
        Self {
            page_number: page_number.max(1),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Build from optional query values, falling back to the defaults
    pub fn from_query(page_number: Option<u32>, page_size: Option<u32>) -> Self {
        Self::new(
            page_number.unwrap_or(1),
            page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        )
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Number of items to skip before this page
    pub fn offset(&self) -> i64 {
        (self.page_number as i64 - 1) * self.page_size as i64
    }

    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }

    /// The following page with the same size
    pub fn next(&self) -> Self {
        Self::new(self.page_number.saturating_add(1), self.page_size)
    }
}

/// A page of items plus the metadata needed to ask for the others
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagedList<T> {
    pub items: Vec<T>,
    pub current_page: u32,
    pub page_size: u32,
    pub total_count: u64,
    pub total_pages: u32,
}

impl<T> PagedList<T> {
    /// Wrap a slice that was already cut at the source
    pub fn new(items: Vec<T>, total_count: u64, params: PagingParams) -> Self {
        Self {
            items,
            current_page: params.page_number(),
            page_size: params.page_size(),
            total_count,
            total_pages: total_pages(total_count, params.page_size()),
        }
    }

    /// Cut the requested page out of an in-memory, already ordered sequence
    pub fn paginate<I>(source: I, params: PagingParams) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let all: Vec<T> = source.into_iter().collect();
        let total_count = all.len() as u64;
        let items = all
            .into_iter()
            .skip(params.offset() as usize)
            .take(params.page_size() as usize)
            .collect();

        Self::new(items, total_count, params)
    }

    pub fn header(&self) -> PaginationHeader {
        PaginationHeader {
            current_page: self.current_page,
            items_per_page: self.page_size,
            total_items: self.total_count,
            total_pages: self.total_pages,
        }
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }
}

/// `ceil(total_count / page_size)`
pub fn total_pages(total_count: u64, page_size: u32) -> u32 {
    let page_size = page_size.max(1) as u64;
    total_count.div_ceil(page_size) as u32
}

/// Page metadata carried in the `Pagination` response header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationHeader {
    pub current_page: u32,
    pub items_per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl PaginationHeader {
    /// Name of the response header carrying the JSON metadata
    pub const NAME: &'static str = "Pagination";

    pub fn to_header_value(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_header_value(value: &str) -> serde_json::Result<Self> {
        serde_json::from_str(value)
    }
}
