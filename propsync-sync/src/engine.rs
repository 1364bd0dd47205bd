//! Live session: wires the channel, the collection and the coordinator
//! together.
//!
//! A [`LiveSession`] is an explicit context object. Nothing in this crate is
//! process-global; an embedder that wants two independent views of the
//! store creates two sessions.

use crate::alert::{AlertSink, realtime_alert};
use crate::api::PropertyApi;
use crate::channel::{ChannelConfig, NotificationChannel};
use crate::collection::LiveCollection;
use crate::coordinator::MutationCoordinator;
use crate::error::SyncResult;
use crate::http::{RestApiConfig, RestPropertyApi, SseTransport};
use crate::registry::{SubscriberRegistry, SubscriptionId};
use crate::transport::EventTransport;
use parking_lot::Mutex;
use propsync_query::QueryState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Configuration for a live session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub channel: ChannelConfig,
    pub api: RestApiConfig,
}

impl LiveConfig {
    /// Parses a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> SyncResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn initial_query(&self) -> QueryState {
        QueryState {
            page_size: self.api.default_page_size.max(1),
            ..QueryState::default()
        }
    }
}

pub struct LiveSession {
    channel: NotificationChannel,
    collection: LiveCollection,
    coordinator: MutationCoordinator,
    alerts: Arc<dyn AlertSink>,
    subscriptions: Mutex<Vec<SubscriptionId>>,
}

impl LiveSession {
    pub fn new(
        config: &LiveConfig,
        api: Arc<dyn PropertyApi>,
        transport: Arc<dyn EventTransport>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let collection = LiveCollection::new(config.initial_query());
        let channel =
            NotificationChannel::new(transport, config.channel.reconnect, Arc::clone(&alerts));
        let coordinator =
            MutationCoordinator::new(api, collection.clone(), Arc::clone(&alerts));
        Self {
            channel,
            collection,
            coordinator,
            alerts,
            subscriptions: Mutex::new(Vec::new()),
        }
    }

    /// Builds a session that talks HTTP to the endpoints in `config`.
    pub fn from_config(config: &LiveConfig, alerts: Arc<dyn AlertSink>) -> SyncResult<Self> {
        let api = RestPropertyApi::new(config.api.clone())?;
        let transport = SseTransport::new(config.channel.events_url.clone())?;
        Ok(Self::new(config, Arc::new(api), Arc::new(transport), alerts))
    }

    /// Installs the built-in subscribers and connects. Calling it again
    /// while started does nothing.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut subscriptions = self.subscriptions.lock();
        if !subscriptions.is_empty() {
            debug!("live session already started");
            return;
        }

        let registry = self.channel.registry();

        let collection = self.collection.clone();
        subscriptions.push(registry.subscribe(move |envelope| {
            collection.apply_envelope(envelope);
            Ok(())
        }));

        let alerts = Arc::clone(&self.alerts);
        subscriptions.push(registry.subscribe(move |envelope| {
            if let Some((severity, message)) = realtime_alert(envelope) {
                alerts.alert(severity, &message);
            }
            Ok(())
        }));

        self.channel.connect();
        info!("live session started");
    }

    /// Removes the built-in subscribers and disconnects.
    pub fn shutdown(&self) {
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        if subscriptions.is_empty() {
            return;
        }
        for id in subscriptions {
            self.channel.registry().unsubscribe(id);
        }
        self.channel.disconnect();
        info!("live session stopped");
    }

    pub fn is_started(&self) -> bool {
        !self.subscriptions.lock().is_empty()
    }

    pub fn channel(&self) -> &NotificationChannel {
        &self.channel
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        self.channel.registry()
    }

    pub fn collection(&self) -> &LiveCollection {
        &self.collection
    }

    pub fn coordinator(&self) -> &MutationCoordinator {
        &self.coordinator
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}
