//! Mutation coordinator.
//!
//! Sends user-driven reads and writes to the backing store and folds each
//! successful outcome into the [`LiveCollection`]. A notification about the
//! same listing may arrive before or after the response; both carry a full
//! snapshot and go through the same upsert, so whichever is applied last
//! wins and the cache never holds the listing twice.
//!
//! On failure the cache is left as it was, an error alert is raised and
//! the error is returned to the caller.

use crate::alert::AlertSink;
use crate::api::{FetchParams, PropertyApi, PropertyPage};
use crate::collection::LiveCollection;
use crate::error::SyncResult;
use propsync_types::{CreatePropertyRequest, Property, PropertyId, PropertyPatch};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct MutationCoordinator {
    api: Arc<dyn PropertyApi>,
    collection: LiveCollection,
    alerts: Arc<dyn AlertSink>,
}

impl MutationCoordinator {
    pub fn new(
        api: Arc<dyn PropertyApi>,
        collection: LiveCollection,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            api,
            collection,
            alerts,
        }
    }

    pub fn collection(&self) -> &LiveCollection {
        &self.collection
    }

    /// Full fetch: replaces the cache and adopts the returned page.
    pub async fn fetch(&self, params: &FetchParams) -> SyncResult<PropertyPage> {
        match self.api.fetch_properties(params).await {
            Ok(page) => {
                debug!(rows = page.data.len(), total = page.total, "fetched listings");
                self.collection.replace_all_with_page(page.data.clone(), page.page);
                if params.is_filtered() {
                    self.alerts.success(&format!(
                        "Found {} properties matching your criteria",
                        page.data.len()
                    ));
                }
                Ok(page)
            }
            Err(e) => {
                warn!(error = %e, "fetch failed");
                self.alerts.error(&format!("Failed to load properties: {e}"));
                Err(e)
            }
        }
    }

    /// Loads one listing and makes it the selected one.
    pub async fn fetch_one(&self, id: PropertyId) -> SyncResult<Property> {
        match self.api.get_property(id).await {
            Ok(listing) => {
                self.collection.select(listing.clone());
                Ok(listing)
            }
            Err(e) => {
                warn!(%id, error = %e, "fetch failed");
                self.alerts.error(&format!("Failed to load property: {e}"));
                Err(e)
            }
        }
    }

    pub async fn create(&self, request: &CreatePropertyRequest) -> SyncResult<Property> {
        match self.api.create_property(request).await {
            Ok(listing) => {
                self.collection.apply_create(listing.clone());
                self.alerts
                    .success(&format!("Property \"{}\" created successfully", listing.name));
                Ok(listing)
            }
            Err(e) => Err(self.failed("create", e)),
        }
    }

    pub async fn update(&self, id: PropertyId, patch: &PropertyPatch) -> SyncResult<Property> {
        match self.api.update_property(id, patch).await {
            Ok(listing) => {
                self.collection.apply_update(listing.clone());
                self.alerts
                    .success(&format!("Property \"{}\" updated successfully", listing.name));
                Ok(listing)
            }
            Err(e) => Err(self.failed("update", e)),
        }
    }

    pub async fn delete(&self, id: PropertyId) -> SyncResult<()> {
        let name = self
            .collection
            .get(id)
            .map(|p| p.name)
            .unwrap_or_else(|| "Property".to_string());

        match self.api.delete_property(id).await {
            Ok(()) => {
                self.collection.apply_delete(id);
                self.alerts
                    .success(&format!("Property \"{name}\" deleted successfully"));
                Ok(())
            }
            Err(e) => Err(self.failed("delete", e)),
        }
    }

    fn failed<E: std::fmt::Display>(&self, verb: &str, e: E) -> E {
        warn!(error = %e, "{verb} failed");
        self.alerts.error(&format!("Failed to {verb} property: {e}"));
        e
    }
}
