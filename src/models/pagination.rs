// src/models/pagination.rs

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Bare `?page=&limit=` query for list endpoints without filters.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.limit)
    }
}

/// Normalized page request: `page >= 1`, `1 <= limit <= MAX_PAGE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Page {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub has_next: bool,
}

impl PageMeta {
    pub fn new(total: i64, page: Page) -> Self {
        let total = total.max(0);
        let total_pages = (total + page.limit - 1) / page.limit;
        Self {
            total,
            page: page.page,
            limit: page.limit,
            total_pages,
            has_next: page.page < total_pages,
        }
    }
}

/// List envelope: `{"data": [...], "meta": {...}}`.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, page: Page) -> Self {
        Self {
            data,
            meta: PageMeta::new(total, page),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamping() {
        assert_eq!(Page::new(None, None), Page { page: 1, limit: 20 });
        assert_eq!(Page::new(Some(0), Some(0)), Page { page: 1, limit: 1 });
        assert_eq!(Page::new(Some(-4), Some(1_000)), Page { page: 1, limit: 100 });
        assert_eq!(Page::new(Some(3), Some(10)).offset(), 20);
    }

    #[test]
    fn meta_counts_pages() {
        let meta = PageMeta::new(45, Page::new(Some(2), Some(20)));
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next);

        let meta = PageMeta::new(40, Page::new(Some(2), Some(20)));
        assert_eq!(meta.total_pages, 2);
        assert!(!meta.has_next);

        let meta = PageMeta::new(0, Page::new(None, None));
        assert_eq!(meta.total_pages, 0);
        assert!(!meta.has_next);
    }

    #[test]
    fn envelope_shape() {
        let page = Paginated::new(vec![1, 2], 2, Page::new(None, None));
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["data"], serde_json::json!([1, 2]));
        assert_eq!(json["meta"]["total"], 2);
        assert_eq!(json["meta"]["page"], 1);
    }
}
