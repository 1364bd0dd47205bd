//! The backing store as seen by the engine.
//!
//! [`PropertyApi`] is the only way the engine reaches the store. The HTTP
//! implementation lives in [`crate::http::RestPropertyApi`]; [`mock`] holds
//! an in-memory one for tests and offline embedding.

use crate::error::SyncResult;
use async_trait::async_trait;
use propsync_query::{SortDirection, SortKey};
use propsync_types::{
    CreatePropertyRequest, Property, PropertyId, PropertyKind, PropertyPatch, PropertyStatus,
};
use serde::{Deserialize, Serialize};

/// Query parameters of a list request. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<SortKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortDirection>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<PropertyKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PropertyStatus>,
}

impl FetchParams {
    /// Whether the request narrows the result set (search, type or status).
    pub fn is_filtered(&self) -> bool {
        self.search.as_deref().is_some_and(|s| !s.is_empty())
            || self.kind.is_some()
            || self.status.is_some()
    }
}

/// One page of a list response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyPage {
    pub data: Vec<Property>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

#[async_trait]
pub trait PropertyApi: Send + Sync {
    async fn fetch_properties(&self, params: &FetchParams) -> SyncResult<PropertyPage>;

    async fn get_property(&self, id: PropertyId) -> SyncResult<Property>;

    async fn create_property(&self, request: &CreatePropertyRequest) -> SyncResult<Property>;

    async fn update_property(&self, id: PropertyId, patch: &PropertyPatch) -> SyncResult<Property>;

    async fn delete_property(&self, id: PropertyId) -> SyncResult<()>;
}

/// In-memory store.
pub mod mock {
    use super::*;
    use crate::error::SyncError;
    use parking_lot::Mutex;
    use propsync_query::{
        DEFAULT_PAGE_SIZE, Filters, QueryState, SortSpec, filter_and_sort, paginate,
    };

    #[derive(Default)]
    struct Store {
        listings: Vec<Property>,
        next_id: u64,
        fail_next: Option<SyncError>,
        calls: usize,
    }

    /// Keeps listings in a vector and assigns ids from 1 upwards.
    #[derive(Default)]
    pub struct InMemoryPropertyApi {
        store: Mutex<Store>,
    }

    impl InMemoryPropertyApi {
        pub fn new() -> Self {
            Self::default()
        }

        /// Starts with the given listings. New ids continue after the
        /// highest one seen.
        pub fn with_listings(listings: Vec<Property>) -> Self {
            let next_id = listings.iter().map(|p| p.id.get()).max().unwrap_or(0);
            Self {
                store: Mutex::new(Store {
                    listings,
                    next_id,
                    ..Store::default()
                }),
            }
        }

        /// Makes the next call fail with `error`.
        pub fn fail_next(&self, error: SyncError) {
            self.store.lock().fail_next = Some(error);
        }

        /// Number of calls made so far, failed ones included.
        pub fn calls(&self) -> usize {
            self.store.lock().calls
        }

        pub fn listings(&self) -> Vec<Property> {
            self.store.lock().listings.clone()
        }

        fn begin(&self) -> SyncResult<parking_lot::MutexGuard<'_, Store>> {
            let mut store = self.store.lock();
            store.calls += 1;
            match store.fail_next.take() {
                Some(err) => Err(err),
                None => Ok(store),
            }
        }
    }

    fn not_found(id: PropertyId) -> SyncError {
        SyncError::NotFound(id.to_string())
    }

    #[async_trait]
    impl PropertyApi for InMemoryPropertyApi {
        async fn fetch_properties(&self, params: &FetchParams) -> SyncResult<PropertyPage> {
            let store = self.begin()?;
            let page = params.page.unwrap_or(1);
            let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);
            let query = QueryState {
                search: params.search.clone().unwrap_or_default(),
                filters: Filters {
                    kind: params.kind,
                    status: params.status,
                    ..Filters::default()
                },
                sort: SortSpec::new(
                    params.sort_by.unwrap_or_default(),
                    params.sort_order.unwrap_or_default(),
                ),
                page,
                page_size: limit,
            };
            let matching = filter_and_sort(&store.listings, &query);
            Ok(PropertyPage {
                data: paginate(&matching, page, limit).to_vec(),
                total: matching.len(),
                page,
                limit,
            })
        }

        async fn get_property(&self, id: PropertyId) -> SyncResult<Property> {
            let store = self.begin()?;
            store
                .listings
                .iter()
                .find(|p| p.id == id)
                .cloned()
                .ok_or_else(|| not_found(id))
        }

        async fn create_property(&self, request: &CreatePropertyRequest) -> SyncResult<Property> {
            let mut store = self.begin()?;
            store.next_id += 1;
            let listing = Property {
                id: PropertyId::new(store.next_id),
                name: request.name.clone(),
                kind: request.kind,
                owner: request.owner.clone(),
                price: request.price,
                status: request.status,
                latitude: request.latitude,
                longitude: request.longitude,
                description: request.description.clone(),
                bedrooms: request.bedrooms,
                bathrooms: request.bathrooms,
                square_feet: request.square_feet,
                address: request.address.clone(),
                images: None,
                created_at: String::new(),
                updated_at: String::new(),
            };
            store.listings.insert(0, listing.clone());
            Ok(listing)
        }

        async fn update_property(&self, id: PropertyId, patch: &PropertyPatch) -> SyncResult<Property> {
            let mut store = self.begin()?;
            let listing = store
                .listings
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| not_found(id))?;
            apply_patch(listing, patch);
            Ok(listing.clone())
        }

        async fn delete_property(&self, id: PropertyId) -> SyncResult<()> {
            let mut store = self.begin()?;
            let before = store.listings.len();
            store.listings.retain(|p| p.id != id);
            if store.listings.len() == before {
                return Err(not_found(id));
            }
            Ok(())
        }
    }

    fn apply_patch(listing: &mut Property, patch: &PropertyPatch) {
        if let Some(name) = &patch.name {
            listing.name = name.clone();
        }
        if let Some(kind) = patch.kind {
            listing.kind = kind;
        }
        if let Some(owner) = &patch.owner {
            listing.owner = owner.clone();
        }
        if let Some(price) = patch.price {
            listing.price = price;
        }
        if let Some(status) = patch.status {
            listing.status = status;
        }
        if let Some(latitude) = patch.latitude {
            listing.latitude = latitude;
        }
        if let Some(longitude) = patch.longitude {
            listing.longitude = longitude;
        }
        if patch.description.is_some() {
            listing.description = patch.description.clone();
        }
        if patch.bedrooms.is_some() {
            listing.bedrooms = patch.bedrooms;
        }
        if patch.bathrooms.is_some() {
            listing.bathrooms = patch.bathrooms;
        }
        if patch.square_feet.is_some() {
            listing.square_feet = patch.square_feet;
        }
        if patch.address.is_some() {
            listing.address = patch.address.clone();
        }
    }
}
