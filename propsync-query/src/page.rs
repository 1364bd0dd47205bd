//! Page slicing and the derived page.

use propsync_types::Property;
use serde::Serialize;

/// Number of pages needed for `count` items. Zero items need zero pages.
pub fn total_pages(count: usize, page_size: usize) -> usize {
    if page_size == 0 {
        return 0;
    }
    count.div_ceil(page_size)
}

/// Returns the 1-based `page` of `items`.
///
/// Page 0, a zero page size, or a page past the end all yield an empty
/// slice.
pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> &[T] {
    if page == 0 || page_size == 0 {
        return &[];
    }
    let start = (page - 1).saturating_mul(page_size);
    if start >= items.len() {
        return &[];
    }
    let end = start.saturating_add(page_size).min(items.len());
    &items[start..end]
}

/// The filtered, sorted, paginated view of the cache at one instant.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedPage {
    /// Listings on the requested page.
    pub items: Vec<Property>,
    /// The 1-based page these items belong to.
    pub page: usize,
    pub page_size: usize,
    /// Number of listings that passed the filter stage.
    pub total_count: usize,
    pub total_pages: usize,
}

impl DerivedPage {
    /// Builds a page from an already filtered and sorted list.
    pub fn from_filtered(filtered: &[Property], page: usize, page_size: usize) -> Self {
        Self {
            items: paginate(filtered, page, page_size).to_vec(),
            page,
            page_size,
            total_count: filtered.len(),
            total_pages: total_pages(filtered.len(), page_size),
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
