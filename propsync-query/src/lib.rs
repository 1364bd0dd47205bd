//! Query pipeline for propsync.
//!
//! Derives the page a user sees from a snapshot of the local listing cache
//! and the current [`QueryState`]. The stages always run in the same order:
//!
//! 1. **Filter**: every active predicate must hold (conjunction).
//! 2. **Sort**: one key, ascending or descending; ties keep filter order.
//! 3. **Paginate**: slice `[(page-1)*size, page*size)`; a page past the end
//!    is empty, never an error.
//!
//! Everything here is a pure function of its inputs. The pipeline is rerun
//! from scratch on every change.
//!
//! # Example
//!
//! ```
//! use propsync_query::{QueryState, derive};
//!
//! let query = QueryState::default();
//! let page = derive(&[], &query);
//! assert_eq!(page.total_count, 0);
//! assert!(page.items.is_empty());
//! ```

mod filter;
mod page;
mod query;
mod sort;

pub use filter::Filters;
pub use page::{DerivedPage, paginate, total_pages};
pub use query::{DEFAULT_PAGE_SIZE, QueryState, derive, filter_and_sort};
pub use sort::{SortDirection, SortKey, SortSpec, compare_text};
