//! Query state and the pipeline entry points.

use crate::filter::{Filters, matches_text};
use crate::page::{DerivedPage, total_pages};
use crate::sort::SortSpec;
use propsync_types::Property;
use serde::{Deserialize, Serialize};

/// Rows per page when nothing else is configured.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Everything that shapes the derived page besides the cache itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryState {
    /// Free-text term matched against name, owner, description and address.
    pub search: String,
    pub filters: Filters,
    pub sort: SortSpec,
    /// 1-based page index.
    pub page: usize,
    pub page_size: usize,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            search: String::new(),
            filters: Filters::default(),
            sort: SortSpec::default(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl QueryState {
    /// Returns true when the listing passes the search term and every filter.
    pub fn matches(&self, property: &Property) -> bool {
        matches_text(property, &self.search) && self.filters.matches(property)
    }

    /// Pulls `page` back into `[1, max(1, total_pages)]` for the given
    /// filtered count. Returns true if the page changed.
    pub fn clamp_page(&mut self, filtered_count: usize) -> bool {
        let last = total_pages(filtered_count, self.page_size).max(1);
        let clamped = self.page.clamp(1, last);
        let changed = clamped != self.page;
        self.page = clamped;
        changed
    }
}

/// Runs the filter and sort stages.
pub fn filter_and_sort(snapshot: &[Property], query: &QueryState) -> Vec<Property> {
    let mut filtered: Vec<Property> = snapshot
        .iter()
        .filter(|p| query.matches(p))
        .cloned()
        .collect();
    query.sort.sort(&mut filtered);
    filtered
}

/// Runs the full pipeline: filter, sort, paginate.
///
/// The requested page is used as is; callers that keep the page in range
/// clamp it first with [`QueryState::clamp_page`].
pub fn derive(snapshot: &[Property], query: &QueryState) -> DerivedPage {
    let filtered = filter_and_sort(snapshot, query);
    DerivedPage::from_filtered(&filtered, query.page, query.page_size)
}
