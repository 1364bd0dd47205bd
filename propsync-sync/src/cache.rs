//! The local listing cache.
//!
//! An ordered set of listings keyed by id. Order only matters as the input
//! order of the filter stage: a full fetch keeps the server's order and new
//! listings go to the front.

use propsync_types::{Property, PropertyId};
use std::collections::HashSet;
use tracing::debug;

/// What a patch did to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Inserted,
    Replaced,
    Removed,
    /// The patch had nothing to act on.
    Unchanged,
}

impl ApplyOutcome {
    /// Whether the cache contents changed.
    pub fn changed(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListingCache {
    entries: Vec<Property>,
}

impl ListingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole contents. A later duplicate of an id replaces the
    /// earlier one in its position.
    pub fn replace_all(&mut self, listings: Vec<Property>) {
        let mut entries: Vec<Property> = Vec::with_capacity(listings.len());
        for listing in listings {
            match entries.iter_mut().find(|p| p.id == listing.id) {
                Some(existing) => {
                    debug!(id = %listing.id, "duplicate id in full fetch");
                    *existing = listing;
                }
                None => entries.push(listing),
            }
        }
        self.entries = entries;
    }

    /// Inserts a new listing at the front, or replaces it in place when the
    /// id is already present.
    pub fn upsert(&mut self, listing: Property) -> ApplyOutcome {
        match self.position(listing.id) {
            Some(index) => {
                self.entries[index] = listing;
                ApplyOutcome::Replaced
            }
            None => {
                self.entries.insert(0, listing);
                ApplyOutcome::Inserted
            }
        }
    }

    /// Removes a listing. Unknown ids are left alone.
    pub fn remove(&mut self, id: PropertyId) -> ApplyOutcome {
        match self.position(id) {
            Some(index) => {
                self.entries.remove(index);
                ApplyOutcome::Removed
            }
            None => ApplyOutcome::Unchanged,
        }
    }

    pub fn get(&self, id: PropertyId) -> Option<&Property> {
        self.entries.iter().find(|p| p.id == id)
    }

    pub fn contains(&self, id: PropertyId) -> bool {
        self.position(id).is_some()
    }

    pub fn as_slice(&self) -> &[Property] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids in cache order.
    pub fn ids(&self) -> Vec<PropertyId> {
        self.entries.iter().map(|p| p.id).collect()
    }

    /// Returns true if no id occurs twice.
    pub fn is_consistent(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.entries.len());
        self.entries.iter().all(|p| seen.insert(p.id))
    }

    fn position(&self, id: PropertyId) -> Option<usize> {
        self.entries.iter().position(|p| p.id == id)
    }
}
