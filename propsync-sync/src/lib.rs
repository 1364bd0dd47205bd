//! Live-update reconciliation engine for propsync.
//!
//! Keeps a local copy of the listing store current while the user browses
//! it, by merging real-time notifications from the relay with the outcome of
//! the user's own requests.
//!
//! # Architecture
//!
//! ## Components
//!
//! - **Channel**: owns one server-sent event stream and its reconnect policy
//! - **Registry**: fans each decoded envelope out to subscribers, isolating
//!   their failures from each other and from the channel
//! - **Collection**: the listing cache, query state and derived page, kept
//!   consistent under one lock
//! - **Coordinator**: applies create/update/delete results to the collection
//! - **Session**: the context object tying the above together
//!
//! ## Data flow
//!
//! 1. The channel reads a frame, decodes an [`EventEnvelope`](propsync_types::EventEnvelope)
//! 2. The registry hands it to each subscriber in registration order
//! 3. The session's reconciler patches the collection; its notifier raises an alert
//! 4. The collection reruns the query pipeline before releasing its lock
//!
//! User actions take the other path: coordinator, store, collection.
//!
//! # Example
//!
//! ```
//! use propsync_sync::{ApplyOutcome, LiveCollection};
//! use propsync_types::{EventEnvelope, Property};
//!
//! let collection = LiveCollection::default();
//! let listing: Property = serde_json::from_str(r#"{
//!     "id": 1, "name": "Loft", "type": "rental", "owner": "Ana",
//!     "price": 1200, "status": "available", "latitude": 0, "longitude": 0
//! }"#).unwrap();
//!
//! let outcome = collection.apply_envelope(&EventEnvelope::PropertyCreated(listing));
//! assert_eq!(outcome, ApplyOutcome::Inserted);
//! assert_eq!(collection.derived().total_count, 1);
//! ```

pub mod alert;
pub mod api;
mod cache;
pub mod channel;
mod collection;
mod coordinator;
mod engine;
mod error;
pub mod http;
mod registry;
pub mod sse;
pub mod state;
pub mod transport;

pub use alert::{Alert, AlertSink, RecordingAlertSink, Severity, TracingAlertSink};
pub use api::{FetchParams, PropertyApi, PropertyPage};
pub use cache::{ApplyOutcome, ListingCache};
pub use channel::{ChannelConfig, NotificationChannel};
pub use collection::{CollectionView, LiveCollection};
pub use coordinator::MutationCoordinator;
pub use engine::{LiveConfig, LiveSession};
pub use error::{SyncError, SyncResult};
pub use http::{RestApiConfig, RestPropertyApi, SseTransport};
pub use registry::{Callback, DispatchReport, SubscriberRegistry, SubscriptionId};
pub use state::{ConnectionState, ConnectionTracker, ReconnectPolicy};
pub use transport::{ChunkStream, EventTransport};
