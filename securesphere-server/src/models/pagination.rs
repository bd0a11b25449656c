//! Page/per-page handling for list endpoints

use serde::{Deserialize, Serialize};

const MAX_PER_PAGE: u32 = 100;
const DEFAULT_PER_PAGE: u32 = 25;

/// Clamped page window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// 1-indexed
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, DEFAULT_PER_PAGE)
    }
}

/// One page of results plus the overall count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
    /// At least 1, even for an empty listing
    pub total_pages: u32,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, page: Pagination) -> Self {
        let count = u32::try_from(total.max(0)).unwrap_or(u32::MAX);
        Self {
            items,
            total,
            page: page.page,
            per_page: page.per_page,
            total_pages: count.div_ceil(page.per_page).max(1),
        }
    }
}

/// `?page=&per_page=` query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl From<PaginationParams> for Pagination {
    fn from(params: PaginationParams) -> Self {
        Self::new(
            params.page.unwrap_or(1),
            params.per_page.unwrap_or(DEFAULT_PER_PAGE),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets() {
        assert_eq!(Pagination::new(1, 10).offset(), 0);
        assert_eq!(Pagination::new(3, 25).offset(), 50);
    }

    #[test]
    fn clamps() {
        assert_eq!(Pagination::new(0, 10).page, 1);
        assert_eq!(Pagination::new(1, 0).per_page, 1);
        assert_eq!(Pagination::new(1, 500).per_page, 100);
    }

    #[test]
    fn defaults_from_params() {
        let p = Pagination::from(PaginationParams::default());
        assert_eq!(p, Pagination::new(1, 25));
    }

    #[test]
    fn page_count() {
        let page: Paginated<u32> = Paginated::new(vec![1, 2], 51, Pagination::new(1, 25));
        assert_eq!(page.total_pages, 3);

        let empty: Paginated<()> = Paginated::new(vec![], 0, Pagination::default());
        assert_eq!(empty.total_pages, 1);
    }

    #[test]
    fn total_pages_is_serialized() {
        let page: Paginated<u32> = Paginated::new(vec![7], 26, Pagination::new(2, 25));
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["total_pages"], 2);
        assert_eq!(json["page"], 2);
    }
}
