//! Paging parameters for [`Repo::list_page_with_count`](crate::Repo::list_page_with_count)
//!
//! # Example
//!
//! ```rust
//! use dborm::Pagination;
//!
//! // Get the first 20 results
//! let page1 = Pagination::first_page(20);
//! assert_eq!(page1.offset, 0);
//! assert_eq!(page1.limit, 20);
//!
//! // Get the third page
//! let page3 = Pagination::page(3, 20);
//! assert_eq!(page3.offset, 40);
//! ```

/// Offset and limit for one page of results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Number of results to skip
    pub offset: u64,
    /// Maximum number of results to return
    pub limit: u64,
}

impl Pagination {
    /// Create new pagination parameters
    #[must_use]
    pub const fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    /// Create pagination for the first page with the given limit
    #[must_use]
    pub const fn first_page(limit: u64) -> Self {
        Self { offset: 0, limit }
    }

    /// Create pagination for a specific page number (1-indexed)
    ///
    /// Page 0 is treated as page 1. Offsets past `u64::MAX` are clamped.
    #[must_use]
    pub const fn page(page_number: u64, page_size: u64) -> Self {
        let offset = page_number.saturating_sub(1).saturating_mul(page_size);
        Self {
            offset,
            limit: page_size,
        }
    }

    /// Number of pages needed for `total` rows at this page size
    #[must_use]
    pub const fn page_count(&self, total: u64) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        total.div_ceil(self.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 20,
        }
    }
}
