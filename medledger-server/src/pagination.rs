//! Pagination parameters and metadata for list endpoints.

use serde::{Deserialize, Serialize};

/// Standard pagination query parameters (`page`, `limit`).
#[derive(Debug, Clone, Deserialize)]
pub struct PaginationParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PaginationParams {
    /// Page number, minimum 1.
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Page size, clamped to [1, 100], default 20.
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(20).clamp(1, 100)
    }

    /// Offset for SQL queries.
    pub fn offset(&self) -> i64 {
        ((self.page() - 1) * self.limit()) as i64
    }

    pub fn meta(&self, total: i64) -> PaginationMeta {
        let limit = self.limit();
        PaginationMeta {
            page: self.page(),
            limit,
            total,
            total_pages: ((total as f64) / (limit as f64)).ceil() as u32,
        }
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: Some(1),
            limit: Some(20),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: u32,
    pub limit: u32,
    pub total: i64,
    pub total_pages: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let params = PaginationParams {
            page: None,
            limit: None,
        };
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), 20);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn limit_is_clamped_to_valid_range() {
        let params = PaginationParams {
            page: Some(0),
            limit: Some(500),
        };
        assert_eq!(params.page(), 1);
        assert_eq!(params.limit(), 100);

        let params = PaginationParams {
            page: Some(1),
            limit: Some(0),
        };
        assert_eq!(params.limit(), 1);
    }

    #[test]
    fn offset_reflects_page_and_limit() {
        let params = PaginationParams {
            page: Some(3),
            limit: Some(10),
        };
        assert_eq!(params.offset(), 20);
    }

    #[test]
    fn meta_computes_total_pages() {
        let params = PaginationParams {
            page: Some(1),
            limit: Some(20),
        };
        assert_eq!(params.meta(100).total_pages, 5);
        assert_eq!(params.meta(101).total_pages, 6);
        assert_eq!(params.meta(0).total_pages, 0);
    }
}
