//! Page-based pagination.
//!
//! ```rust
//! use charcoal_query::{Expression, Pagination};
//!
//! let pagination = Pagination::new().page(2).num_per_page(25);
//! assert_eq!(pagination.sql().unwrap(), " LIMIT 25, 25");
//! assert_eq!(pagination.offset(), 25);
//!
//! // No limit at all.
//! assert_eq!(Pagination::new().sql().unwrap(), "");
//! ```

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};
use crate::expression::{Expression, ExpressionMeta, SqlCompiler};

/// Pagination of a collection query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    /// Name, active flag and data bag.
    #[serde(flatten)]
    pub meta: ExpressionMeta,
    /// Page number, starting at 1.
    #[serde(default = "first_page")]
    pub page: u64,
    /// Rows per page; 0 means unlimited.
    #[serde(default, alias = "numPerPage")]
    pub num_per_page: u64,
    /// Raw LIMIT clause overriding the page computation.
    #[serde(default)]
    pub condition: Option<String>,
}

fn first_page() -> u64 {
    1
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            meta: ExpressionMeta::default(),
            page: 1,
            num_per_page: 0,
            condition: None,
        }
    }
}

impl Pagination {
    /// Create unlimited pagination.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create pagination for one page.
    pub fn paged(page: u64, num_per_page: u64) -> Self {
        Self::new().page(page).num_per_page(num_per_page)
    }

    /// Create pagination from a raw clause, e.g. `" LIMIT 5"`.
    pub fn raw(condition: impl Into<String>) -> Self {
        Self {
            condition: Some(condition.into()),
            ..Self::default()
        }
    }

    /// Set the page. Page 0 is treated as page 1.
    pub fn page(mut self, page: u64) -> Self {
        self.set_page(page);
        self
    }

    /// Set the rows per page.
    pub fn num_per_page(mut self, num_per_page: u64) -> Self {
        self.num_per_page = num_per_page;
        self
    }

    /// Set the page in place. Page 0 is treated as page 1.
    pub fn set_page(&mut self, page: u64) {
        self.page = page.max(1);
    }

    /// Set the rows per page in place.
    pub fn set_num_per_page(&mut self, num_per_page: u64) {
        self.num_per_page = num_per_page;
    }

    /// Deactivate pagination.
    pub fn inactive(mut self) -> Self {
        self.meta.active = false;
        self
    }

    /// Number of rows per page.
    pub fn limit(&self) -> u64 {
        self.num_per_page
    }

    /// Number of rows skipped before the current page.
    pub fn offset(&self) -> u64 {
        let offset = self
            .page
            .max(1)
            .saturating_sub(1)
            .saturating_mul(self.num_per_page);
        offset.min(i64::MAX as u64)
    }

    /// Whether a LIMIT clause will be produced.
    pub fn is_limited(&self) -> bool {
        self.meta.active && (self.condition.is_some() || self.num_per_page > 0)
    }
}

impl Expression for Pagination {
    fn meta(&self) -> &ExpressionMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ExpressionMeta {
        &mut self.meta
    }

    fn compile(&self, _compiler: &mut SqlCompiler<'_>) -> QueryResult<String> {
        if !self.meta.active {
            return Ok(String::new());
        }

        if let Some(condition) = &self.condition {
            let condition = condition.trim();
            if condition.is_empty() {
                return Err(QueryError::invalid_pagination("raw pagination clause is empty"));
            }
            return Ok(format!(" {}", condition));
        }

        if self.num_per_page == 0 {
            return Ok(String::new());
        }

        let mut sql = String::with_capacity(32);
        let _ = write!(sql, " LIMIT {}, {}", self.offset(), self.num_per_page);
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_limit_clause() {
        assert_eq!(Pagination::paged(2, 25).sql().unwrap(), " LIMIT 25, 25");
        assert_eq!(Pagination::paged(5, 50).sql().unwrap(), " LIMIT 200, 50");
        assert_eq!(Pagination::paged(1, 10).sql().unwrap(), " LIMIT 0, 10");
    }

    #[test]
    fn test_unlimited() {
        assert_eq!(Pagination::paged(3, 0).sql().unwrap(), "");
        assert!(!Pagination::paged(3, 0).is_limited());
    }

    #[test]
    fn test_page_zero_clamps() {
        let pagination = Pagination::paged(0, 10);
        assert_eq!(pagination.page, 1);
        assert_eq!(pagination.offset(), 0);
    }

    #[test]
    fn test_offset_saturates() {
        let pagination = Pagination::paged(u64::MAX, u64::MAX);
        assert_eq!(pagination.offset(), i64::MAX as u64);
    }

    #[test]
    fn test_raw_clause() {
        assert_eq!(Pagination::raw("LIMIT 5 ").sql().unwrap(), " LIMIT 5");
        let err = Pagination::raw("  ").sql().unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidPagination);
    }

    #[test]
    fn test_inactive() {
        assert_eq!(Pagination::paged(2, 10).inactive().sql().unwrap(), "");
    }

    #[test]
    fn test_deserialize() {
        let pagination: Pagination =
            serde_json::from_value(serde_json::json!({ "page": 3, "numPerPage": 20 })).unwrap();
        assert_eq!(pagination.sql().unwrap(), " LIMIT 40, 20");
    }
}
