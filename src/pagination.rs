// Pagination engine
// Turns raw page/page_size input into a clamped window and derives page metadata

use serde::{Deserialize, Serialize};

/// Upper bound for `page_size`
pub const MAX_PAGE_SIZE: i64 = 100;

/// Smallest accepted `page_size`; zero and negative sizes collapse here
pub const MIN_PAGE_SIZE: i64 = 1;

/// Sanitized pagination window
///
/// - `page < 1` becomes `1`
/// - `page_size` is clamped into `[1, 100]`; zero or negative sizes become `1`
///   rather than falling back to a default of 10
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    page: i64,
    page_size: i64,
}

/// Metadata derived from a window and the unfiltered total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub page: i64,
    pub page_size: i64,
    pub total_count: i64,
    pub total_pages: i64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl PageWindow {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE),
        }
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    /// Row offset for SQL `OFFSET`
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }

    /// Row count for SQL `LIMIT`
    pub fn limit(&self) -> i64 {
        self.page_size
    }

    /// Applies the window to rows already sorted in memory.
    pub fn slice<T>(&self, rows: Vec<T>) -> Vec<T> {
        let offset = usize::try_from(self.offset()).unwrap_or(usize::MAX);
        let limit = usize::try_from(self.limit()).unwrap_or(usize::MAX);
        rows.into_iter().skip(offset).take(limit).collect()
    }

    pub fn metadata(&self, total_count: i64) -> PageMetadata {
        paginate(self.page, self.page_size, total_count)
    }
}

/// Computes pagination metadata for raw input.
///
/// `total_pages` is `0` when there are no rows, otherwise
/// `ceil(total_count / page_size)`. A page past the end keeps its number;
/// callers get an empty data window with the true total.
pub fn paginate(page: i64, page_size: i64, total_count: i64) -> PageMetadata {
    let window = PageWindow {
        page: page.max(1),
        page_size: page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE),
    };
    let total_count = total_count.max(0);
    let total_pages = if total_count == 0 {
        0
    } else {
        (total_count + window.page_size - 1) / window.page_size
    };

    PageMetadata {
        page: window.page,
        page_size: window.page_size,
        total_count,
        total_pages,
        has_previous: window.page > 1,
        has_next: window.page < total_pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_below_one_becomes_one() {
        assert_eq!(PageWindow::new(0, 10).page(), 1);
        assert_eq!(PageWindow::new(-5, 10).page(), 1);
    }

    #[test]
    fn test_zero_page_size_collapses_to_one() {
        assert_eq!(PageWindow::new(1, 0).page_size(), 1);
        assert_eq!(PageWindow::new(1, -20).page_size(), 1);
    }

    #[test]
    fn test_page_size_clamped_to_max() {
        assert_eq!(PageWindow::new(1, 1000).page_size(), MAX_PAGE_SIZE);
        assert_eq!(PageWindow::new(1, 100).page_size(), 100);
    }

    #[test]
    fn test_offset_and_limit() {
        let window = PageWindow::new(3, 20);
        assert_eq!(window.offset(), 40);
        assert_eq!(window.limit(), 20);
    }

    #[test]
    fn test_zero_total_has_zero_pages() {
        let meta = paginate(1, 10, 0);
        assert_eq!(meta.total_pages, 0);
        assert!(!meta.has_next);
        assert!(!meta.has_previous);
    }

    #[test]
    fn test_page_zero_size_zero_over_three_rows() {
        let meta = paginate(0, 0, 3);
        assert_eq!(meta.page, 1);
        assert_eq!(meta.page_size, 1);
        assert_eq!(meta.total_count, 3);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next);
    }

    #[test]
    fn test_page_past_end_keeps_number() {
        let meta = paginate(10, 5, 12);
        assert_eq!(meta.page, 10);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_previous);
        assert!(!meta.has_next);
    }

    #[test]
    fn test_slice_past_end_is_empty() {
        let window = PageWindow::new(4, 2);
        assert!(window.slice(vec![1, 2, 3, 4, 5]).is_empty());
        let window = PageWindow::new(2, 2);
        assert_eq!(window.slice(vec![1, 2, 3, 4, 5]), vec![3, 4]);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_non_positive_page_size_is_one(page_size in i64::MIN..=0) {
            prop_assert_eq!(PageWindow::new(1, page_size).page_size(), 1);
        }

        #[test]
        fn prop_page_below_one_is_one(page in i64::MIN..1) {
            prop_assert_eq!(paginate(page, 10, 50).page, 1);
        }

        #[test]
        fn prop_total_pages_is_ceiling(total in 0i64..100_000, page_size in 1i64..=100) {
            let meta = paginate(1, page_size, total);
            if total == 0 {
                prop_assert_eq!(meta.total_pages, 0);
            } else {
                let expected = (total as f64 / page_size as f64).ceil() as i64;
                prop_assert_eq!(meta.total_pages, expected);
                prop_assert!(meta.total_pages > 0);
            }
        }

        #[test]
        fn prop_page_size_always_in_bounds(page_size in any::<i64>()) {
            let size = PageWindow::new(1, page_size).page_size();
            prop_assert!((MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&size));
        }
    }
}
