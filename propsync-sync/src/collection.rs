//! The live collection: listing cache, query state and derived page kept
//! consistent under one lock.
//!
//! Every write (a full fetch, a patch from a notification or a mutation, a
//! query change) recomputes the derived page before the lock is released,
//! so a reader never sees a cache that disagrees with the page built from
//! it. Readers get clones.

use crate::cache::{ApplyOutcome, ListingCache};
use parking_lot::Mutex;
use propsync_query::{
    DerivedPage, Filters, QueryState, SortDirection, SortKey, SortSpec, filter_and_sort,
};
use propsync_types::{EventEnvelope, Property, PropertyId, PropertyKind, PropertyStatus};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, trace};

/// A consistent snapshot of everything a list view needs.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionView {
    pub page: DerivedPage,
    pub query: QueryState,
    /// The listing open in the detail view, if any.
    pub selected: Option<Property>,
    /// Number of cached listings before filtering.
    pub cached: usize,
    /// Bumped on every change.
    pub revision: u64,
}

struct Inner {
    cache: ListingCache,
    query: QueryState,
    derived: DerivedPage,
    selected: Option<Property>,
    revision: u64,
}

impl Inner {
    /// Reruns the pipeline and pulls the page back into range.
    fn recompute(&mut self) {
        let filtered = filter_and_sort(self.cache.as_slice(), &self.query);
        if self.query.clamp_page(filtered.len()) {
            debug!(page = self.query.page, "page clamped after recompute");
        }
        self.derived = DerivedPage::from_filtered(&filtered, self.query.page, self.query.page_size);
        self.revision += 1;
    }

    fn apply_upsert(&mut self, listing: Property) -> ApplyOutcome {
        if self.selected.as_ref().is_some_and(|s| s.id == listing.id) {
            self.selected = Some(listing.clone());
        }
        self.cache.upsert(listing)
    }

    fn apply_remove(&mut self, id: PropertyId) -> ApplyOutcome {
        if self.selected.as_ref().is_some_and(|s| s.id == id) {
            self.selected = None;
        }
        self.cache.remove(id)
    }
}

/// Shared handle to the collection. Clones refer to the same state.
#[derive(Clone)]
pub struct LiveCollection {
    inner: Arc<Mutex<Inner>>,
    changes: Arc<watch::Sender<u64>>,
}

impl Default for LiveCollection {
    fn default() -> Self {
        Self::new(QueryState::default())
    }
}

impl LiveCollection {
    pub fn new(mut query: QueryState) -> Self {
        query.page_size = query.page_size.max(1);
        let mut inner = Inner {
            cache: ListingCache::new(),
            query,
            derived: DerivedPage::default(),
            selected: None,
            revision: 0,
        };
        inner.recompute();
        let (tx, _) = watch::channel(inner.revision);
        Self {
            inner: Arc::new(Mutex::new(inner)),
            changes: Arc::new(tx),
        }
    }

    /// Runs `f` under the lock, then recomputes and publishes the revision.
    fn write<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.inner.lock();
        let result = f(&mut *inner);
        inner.recompute();
        self.changes.send_replace(inner.revision);
        result
    }

    // ── Cache writes ─────────────────────────────────────────────

    /// Replaces the cache with the result of a full fetch.
    pub fn replace_all(&self, listings: Vec<Property>) {
        self.write(|inner| inner.cache.replace_all(listings));
    }

    /// Replaces the cache and adopts the page the server answered with.
    pub fn replace_all_with_page(&self, listings: Vec<Property>, page: usize) {
        self.write(|inner| {
            inner.cache.replace_all(listings);
            inner.query.page = page.max(1);
        });
    }

    /// A listing came into existence. Acts as an update if the id is known.
    pub fn apply_create(&self, listing: Property) -> ApplyOutcome {
        self.write(|inner| inner.apply_upsert(listing))
    }

    /// A listing changed. Unknown ids are inserted.
    pub fn apply_update(&self, listing: Property) -> ApplyOutcome {
        self.write(|inner| inner.apply_upsert(listing))
    }

    /// A listing went away. Unknown ids are a no-op.
    pub fn apply_delete(&self, id: PropertyId) -> ApplyOutcome {
        let outcome = self.write(|inner| inner.apply_remove(id));
        if !outcome.changed() {
            trace!(%id, "delete for unknown listing");
        }
        outcome
    }

    /// Routes an envelope to the matching patch. Connection greetings leave
    /// the collection untouched.
    pub fn apply_envelope(&self, envelope: &EventEnvelope) -> ApplyOutcome {
        match envelope {
            EventEnvelope::Connection { .. } => ApplyOutcome::Unchanged,
            EventEnvelope::PropertyCreated(p) => self.apply_create(p.clone()),
            EventEnvelope::PropertyUpdated(p) => self.apply_update(p.clone()),
            EventEnvelope::PropertyDeleted(p) => self.apply_delete(p.id),
        }
    }

    // ── Reads ────────────────────────────────────────────────────

    pub fn view(&self) -> CollectionView {
        let inner = self.inner.lock();
        CollectionView {
            page: inner.derived.clone(),
            query: inner.query.clone(),
            selected: inner.selected.clone(),
            cached: inner.cache.len(),
            revision: inner.revision,
        }
    }

    /// The current derived page.
    pub fn derived(&self) -> DerivedPage {
        self.inner.lock().derived.clone()
    }

    pub fn query(&self) -> QueryState {
        self.inner.lock().query.clone()
    }

    /// Every cached listing, in cache order.
    pub fn snapshot(&self) -> Vec<Property> {
        self.inner.lock().cache.as_slice().to_vec()
    }

    pub fn get(&self, id: PropertyId) -> Option<Property> {
        self.inner.lock().cache.get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().cache.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.inner.lock().revision
    }

    /// Watches the revision counter.
    pub fn changes(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    // ── Selected listing ─────────────────────────────────────────

    pub fn selected(&self) -> Option<Property> {
        self.inner.lock().selected.clone()
    }

    pub fn select(&self, listing: Property) {
        self.write(|inner| inner.selected = Some(listing));
    }

    pub fn clear_selected(&self) {
        self.write(|inner| inner.selected = None);
    }

    // ── Query navigation ─────────────────────────────────────────

    /// Replaces the whole query state. The page is clamped as usual.
    pub fn set_query(&self, query: QueryState) {
        self.write(|inner| {
            inner.query = query;
            inner.query.page_size = inner.query.page_size.max(1);
        });
    }

    pub fn set_search(&self, term: impl Into<String>) {
        let term = term.into();
        self.write(|inner| {
            inner.query.search = term;
            inner.query.page = 1;
        });
    }

    pub fn set_filters(&self, filters: Filters) {
        self.write(|inner| {
            inner.query.filters = filters;
            inner.query.page = 1;
        });
    }

    /// Filters on listing type only, leaving the other filters alone.
    pub fn set_kind_filter(&self, kind: Option<PropertyKind>) {
        self.write(|inner| {
            inner.query.filters.kind = kind;
            inner.query.page = 1;
        });
    }

    /// Filters on status only, leaving the other filters alone.
    pub fn set_status_filter(&self, status: Option<PropertyStatus>) {
        self.write(|inner| {
            inner.query.filters.status = status;
            inner.query.page = 1;
        });
    }

    /// Changes the sort order. The page is kept.
    pub fn set_sorting(&self, key: SortKey, direction: SortDirection) {
        self.write(|inner| inner.query.sort = SortSpec::new(key, direction));
    }

    pub fn set_page_size(&self, size: usize) {
        self.write(|inner| inner.query.page_size = size.max(1));
    }

    /// Moves to `page` if it exists. Returns false and changes nothing
    /// otherwise.
    pub fn go_to_page(&self, page: usize) -> bool {
        self.navigate(|_| Some(page))
    }

    pub fn next_page(&self) -> bool {
        self.navigate(|derived| derived.has_next().then(|| derived.page + 1))
    }

    pub fn previous_page(&self) -> bool {
        self.navigate(|derived| derived.has_previous().then(|| derived.page - 1))
    }

    fn navigate(&self, target: impl FnOnce(&DerivedPage) -> Option<usize>) -> bool {
        let mut inner = self.inner.lock();
        let Some(page) = target(&inner.derived) else {
            return false;
        };
        if page < 1 || page > inner.derived.total_pages {
            return false;
        }
        inner.query.page = page;
        inner.recompute();
        self.changes.send_replace(inner.revision);
        true
    }

    /// Back to the default query, keeping the page size.
    pub fn clear_filters(&self) {
        self.write(|inner| {
            let page_size = inner.query.page_size;
            inner.query = QueryState {
                page_size,
                ..QueryState::default()
            };
        });
    }
}

impl std::fmt::Debug for LiveCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("LiveCollection")
            .field("cached", &inner.cache.len())
            .field("query", &inner.query)
            .field("revision", &inner.revision)
            .finish()
    }
}
