//! Pagination metadata and page-window planning.
//!
//! This module derives the pager's view of a list: how many pages exist
//! for a given total, whether next/previous navigation is possible, and
//! which page numbers (with ellipsis markers for elided ranges) a bounded
//! pager should render regardless of how many pages there are.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default number of page numbers in the sliding window
pub const DEFAULT_MAX_PAGES_TO_SHOW: u32 = 3;

/// Derived pagination metadata for a loaded result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginationResult {
    pub total_count: u64,
    pub current_page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl PaginationResult {
    /// Compute metadata for `total_count` rows split into pages of `page_size`.
    ///
    /// `current_page` is taken as-is; clamping it to the new bounds is the
    /// controller's decision.
    pub fn compute(total_count: u64, page_size: u32, current_page: u32) -> Self {
        let total_pages = total_pages(total_count, page_size);
        Self {
            total_count,
            current_page,
            page_size,
            total_pages,
            has_next_page: current_page < total_pages,
            has_prev_page: current_page > 1,
        }
    }

    /// Highest page the current page may point at
    pub fn max_page(&self) -> u32 {
        self.total_pages.max(1)
    }

    /// 0-based row offset of the current page, for `offset`/`limit` queries
    pub fn offset(&self) -> u64 {
        u64::from(self.current_page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// `ceil(total_count / page_size)`, 0 for an empty result set
pub fn total_pages(total_count: u64, page_size: u32) -> u32 {
    if total_count == 0 || page_size == 0 {
        return 0;
    }
    let pages = total_count.div_ceil(u64::from(page_size));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

/// One entry of a page window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", tag = "kind", content = "page")]
pub enum PageEntry {
    Page(u32),
    Ellipsis,
}

impl PageEntry {
    pub fn page(&self) -> Option<u32> {
        match self {
            PageEntry::Page(n) => Some(*n),
            PageEntry::Ellipsis => None,
        }
    }
}

impl fmt::Display for PageEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageEntry::Page(n) => write!(f, "{}", n),
            PageEntry::Ellipsis => f.write_str("…"),
        }
    }
}

/// Plans the bounded set of page numbers a pager renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindowPlanner {
    max_pages_to_show: u32,
}

impl Default for PageWindowPlanner {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAGES_TO_SHOW)
    }
}

impl PageWindowPlanner {
    /// A `max_pages_to_show` of 0 is treated as 1
    pub fn new(max_pages_to_show: u32) -> Self {
        Self {
            max_pages_to_show: max_pages_to_show.max(1),
        }
    }

    pub fn max_pages_to_show(&self) -> u32 {
        self.max_pages_to_show
    }

    /// Page numbers and ellipsis markers to render.
    ///
    /// The window of `max_pages_to_show` pages is centred on the current page
    /// and re-anchored when it runs into the last page. Page 1 and the last
    /// page are always present; an ellipsis separates them from the window
    /// only when at least one page is elided, so `1, 2` and
    /// `total - 1, total` are rendered as adjacent pages.
    pub fn plan(&self, current_page: u32, total_pages: u32) -> Vec<PageEntry> {
        if total_pages == 0 {
            return Vec::new();
        }

        let current_page = current_page.clamp(1, total_pages);
        let max = self.max_pages_to_show;
        let half = max / 2;

        let mut start_page = current_page.saturating_sub(half).max(1);
        let end_page = total_pages.min(start_page.saturating_add(max - 1));
        if end_page - start_page + 1 < max {
            start_page = (end_page + 1).saturating_sub(max).max(1);
        }

        let mut pages = Vec::with_capacity(max as usize + 4);

        if start_page > 1 {
            pages.push(PageEntry::Page(1));
            if start_page != 2 {
                pages.push(PageEntry::Ellipsis);
            }
        }

        pages.extend((start_page..=end_page).map(PageEntry::Page));

        if end_page < total_pages {
            if end_page != total_pages - 1 {
                pages.push(PageEntry::Ellipsis);
            }
            pages.push(PageEntry::Page(total_pages));
        }

        pages
    }
}

/// Convenience wrapper over [`PageWindowPlanner::plan`]
pub fn plan_page_window(current_page: u32, total_pages: u32, max_pages_to_show: u32) -> Vec<PageEntry> {
    PageWindowPlanner::new(max_pages_to_show).plan(current_page, total_pages)
}

/// Render a plan as text, e.g. `1 2 3 … 10`
pub fn format_plan(plan: &[PageEntry], current_page: u32) -> String {
    plan.iter()
        .map(|entry| match entry {
            PageEntry::Page(n) if *n == current_page => format!("[{}]", n),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use PageEntry::{Ellipsis, Page};

    #[test]
    fn test_first_page_of_ten() {
        assert_eq!(
            plan_page_window(1, 10, 3),
            vec![Page(1), Page(2), Page(3), Ellipsis, Page(10)]
        );
    }

    #[test]
    fn test_last_page_of_ten() {
        assert_eq!(
            plan_page_window(10, 10, 3),
            vec![Page(1), Ellipsis, Page(8), Page(9), Page(10)]
        );
    }

    #[test]
    fn test_adjacent_boundaries_omit_ellipsis() {
        // window 2..=4 touches both boundary pages
        assert_eq!(
            plan_page_window(3, 5, 3),
            vec![Page(1), Page(2), Page(3), Page(4), Page(5)]
        );
    }

    #[test]
    fn test_middle_page_has_both_ellipses() {
        assert_eq!(
            plan_page_window(5, 10, 3),
            vec![Page(1), Ellipsis, Page(4), Page(5), Page(6), Ellipsis, Page(10)]
        );
    }

    #[test]
    fn test_gap_of_exactly_one_page_still_uses_ellipsis() {
        // start_page == 3 elides only page 2, which is still an ellipsis
        assert_eq!(
            plan_page_window(4, 10, 3),
            vec![Page(1), Ellipsis, Page(3), Page(4), Page(5), Ellipsis, Page(10)]
        );
    }

    #[test]
    fn test_zero_pages_is_empty() {
        assert!(plan_page_window(1, 0, 3).is_empty());
    }

    #[test]
    fn test_stale_current_page_is_clamped() {
        assert_eq!(plan_page_window(12, 3, 3), plan_page_window(3, 3, 3));
        assert_eq!(plan_page_window(0, 3, 3), plan_page_window(1, 3, 3));
    }

    #[test]
    fn test_single_page() {
        assert_eq!(plan_page_window(1, 1, 3), vec![Page(1)]);
    }

    #[test]
    fn test_fewer_pages_than_window() {
        assert_eq!(plan_page_window(2, 2, 5), vec![Page(1), Page(2)]);
    }

    #[test]
    fn test_even_window_width() {
        assert_eq!(
            plan_page_window(5, 10, 4),
            vec![Page(1), Ellipsis, Page(3), Page(4), Page(5), Page(6), Ellipsis, Page(10)]
        );
    }

    #[test]
    fn test_zero_window_treated_as_one() {
        assert_eq!(
            plan_page_window(5, 9, 0),
            vec![Page(1), Ellipsis, Page(5), Ellipsis, Page(9)]
        );
    }

    #[test]
    fn test_window_bound_and_boundary_reachability() {
        for max in 1..=7 {
            for total in 0..=40 {
                for current in 1..=total.max(1) {
                    let plan = plan_page_window(current, total, max);
                    let pages: Vec<u32> = plan.iter().filter_map(PageEntry::page).collect();

                    assert!(pages.len() as u32 <= max + 2, "max={} total={} current={}", max, total, current);
                    assert!(plan.iter().filter(|e| **e == Ellipsis).count() <= 2);
                    assert!(pages.windows(2).all(|w| w[0] < w[1]), "pages ascend");

                    if total > 0 {
                        assert_eq!(pages.first(), Some(&1));
                        assert_eq!(pages.last(), Some(&total));
                    }
                }
            }
        }
    }

    #[test]
    fn test_ellipsis_only_where_pages_are_elided() {
        for total in 1..=30 {
            for current in 1..=total {
                let plan = plan_page_window(current, total, 3);
                for (i, entry) in plan.iter().enumerate() {
                    if *entry == Ellipsis {
                        let before = plan[i - 1].page().unwrap();
                        let after = plan[i + 1].page().unwrap();
                        assert!(after - before > 1);
                    } else if i > 0 {
                        if let (Some(a), Some(b)) = (plan[i - 1].page(), entry.page()) {
                            assert_eq!(b, a + 1, "adjacent pages without ellipsis");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_pagination_result_empty() {
        let result = PaginationResult::compute(0, 20, 1);
        assert_eq!(result.total_pages, 0);
        assert!(!result.has_next_page);
        assert!(!result.has_prev_page);
        assert_eq!(result.max_page(), 1);
    }

    #[test]
    fn test_pagination_result_navigation_flags() {
        let result = PaginationResult::compute(95, 20, 1);
        assert_eq!(result.total_pages, 5);
        assert!(result.has_next_page);
        assert!(!result.has_prev_page);

        let result = PaginationResult::compute(95, 20, 5);
        assert!(!result.has_next_page);
        assert!(result.has_prev_page);
        assert_eq!(result.offset(), 80);
    }

    #[test]
    fn test_total_pages_exact_multiple() {
        assert_eq!(total_pages(100, 20), 5);
        assert_eq!(total_pages(101, 20), 6);
        assert_eq!(total_pages(1, 100), 1);
    }

    #[test]
    fn test_format_plan_marks_current() {
        let plan = plan_page_window(2, 10, 3);
        assert_eq!(format_plan(&plan, 2), "1 [2] 3 … 10");
    }
}
