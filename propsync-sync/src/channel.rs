//! The notification channel.
//!
//! Owns one long-lived event stream. A background task opens the stream,
//! decodes each message into an [`EventEnvelope`] and hands it to the
//! [`SubscriberRegistry`]. When the stream fails or ends the task backs off
//! per the [`ReconnectPolicy`] and tries again, until the retry budget is
//! spent.
//!
//! Every `connect` and `disconnect` bumps a generation number. A task only
//! touches the connection state while its own generation is still current,
//! and checks the generation again before each dispatch. The check and the
//! dispatch are not atomic: the registry runs subscribers without the state
//! lock held, so they may call back into the channel. An envelope whose
//! dispatch already began when `disconnect` or `connect` is called can still
//! reach subscribers after that call returns; nothing after it does.
//! Subscribers that must not see any further envelope unsubscribe before
//! disconnecting, as [`LiveSession::shutdown`](crate::LiveSession::shutdown)
//! does.

use crate::alert::AlertSink;
use crate::error::SyncResult;
use crate::http::SseTransport;
use crate::registry::{DispatchReport, SubscriberRegistry};
use crate::sse::SseDecoder;
use crate::state::{ConnectionState, ConnectionTracker, ReconnectPolicy};
use crate::transport::{ChunkStream, EventTransport};
use futures::StreamExt;
use parking_lot::Mutex;
use propsync_types::{Decoded, EventEnvelope};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Alert raised when the retry budget is spent.
pub const GIVE_UP_MESSAGE: &str = "Lost connection to real-time updates";

/// Configuration for the notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// URL of the relay's event stream.
    pub events_url: String,
    pub reconnect: ReconnectPolicy,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            events_url: "http://localhost:3002/api/events".to_string(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

struct ChannelState {
    tracker: ConnectionTracker,
    generation: u64,
}

struct Shared {
    transport: Arc<dyn EventTransport>,
    registry: Arc<SubscriberRegistry>,
    alerts: Arc<dyn AlertSink>,
    state: Mutex<ChannelState>,
    state_tx: watch::Sender<ConnectionState>,
}

impl Shared {
    /// Applies `f` to the tracker if `generation` is still current.
    fn update<R>(&self, generation: u64, f: impl FnOnce(&mut ConnectionTracker) -> R) -> Option<R> {
        let mut state = self.state.lock();
        if state.generation != generation {
            return None;
        }
        let result = f(&mut state.tracker);
        self.state_tx.send_if_modified(|current| {
            let next = state.tracker.state();
            let changed = *current != next;
            *current = next;
            changed
        });
        Some(result)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state.lock().generation == generation
    }
}

pub struct NotificationChannel {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationChannel {
    pub fn new(
        transport: Arc<dyn EventTransport>,
        policy: ReconnectPolicy,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self::with_registry(transport, policy, alerts, Arc::new(SubscriberRegistry::new()))
    }

    /// Creates a channel that dispatches into an existing registry.
    pub fn with_registry(
        transport: Arc<dyn EventTransport>,
        policy: ReconnectPolicy,
        alerts: Arc<dyn AlertSink>,
        registry: Arc<SubscriberRegistry>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        Self {
            shared: Arc::new(Shared {
                transport,
                registry,
                alerts,
                state: Mutex::new(ChannelState {
                    tracker: ConnectionTracker::new(policy),
                    generation: 0,
                }),
                state_tx,
            }),
            task: Mutex::new(None),
        }
    }

    /// Creates a channel over HTTP from configuration.
    pub fn from_config(config: &ChannelConfig, alerts: Arc<dyn AlertSink>) -> SyncResult<Self> {
        let transport = SseTransport::new(config.events_url.clone())?;
        Ok(Self::new(Arc::new(transport), config.reconnect, alerts))
    }

    /// Starts the stream. A running stream is torn down first, and the
    /// retry budget starts over.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(&self) {
        let mut task = self.task.lock();
        if let Some(previous) = task.take() {
            previous.abort();
        }

        let generation = {
            let mut state = self.shared.state.lock();
            state.generation += 1;
            state.tracker.connect();
            self.shared.state_tx.send_replace(state.tracker.state());
            state.generation
        };
        info!(endpoint = %self.shared.transport.endpoint(), "connecting to event stream");
        *task = Some(tokio::spawn(run(Arc::clone(&self.shared), generation)));
    }

    /// Stops the stream and any pending reconnect. Safe to call at any time,
    /// any number of times.
    pub fn disconnect(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
            debug!("event stream task aborted");
        }
        let mut state = self.shared.state.lock();
        state.generation += 1;
        state.tracker.closed();
        self.shared.state_tx.send_replace(state.tracker.state());
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state.lock().tracker.state()
    }

    /// Consecutive failures since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.shared.state.lock().tracker.attempts()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    pub fn policy(&self) -> ReconnectPolicy {
        *self.shared.state.lock().tracker.policy()
    }

    /// Watches the connection state.
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state_tx.subscribe()
    }

    /// The registry envelopes are dispatched to.
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.shared.registry
    }

    /// Dispatches `envelope` as if it had arrived on the stream.
    pub fn simulate(&self, envelope: &EventEnvelope) -> DispatchReport {
        debug!(kind = %envelope.kind(), "dispatching simulated event");
        self.shared.registry.dispatch(envelope)
    }
}

impl Drop for NotificationChannel {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

impl std::fmt::Debug for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationChannel")
            .field("endpoint", &self.shared.transport.endpoint())
            .field("state", &self.state())
            .field("attempts", &self.reconnect_attempts())
            .finish()
    }
}

async fn run(shared: Arc<Shared>, generation: u64) {
    loop {
        match shared.transport.open().await {
            Ok(stream) => {
                if shared.update(generation, |t| t.opened()).is_none() {
                    return;
                }
                info!("event stream open");
                pump(&shared, generation, stream).await;
            }
            Err(e) => warn!(error = %e, "failed to open event stream"),
        }

        let delay = match shared.update(generation, |t| (t.failed(), t.attempts())) {
            None => return,
            Some((None, attempts)) => {
                error!(attempts, "giving up on event stream");
                shared.alerts.error(GIVE_UP_MESSAGE);
                return;
            }
            Some((Some(delay), attempt)) => {
                info!(attempt, delay_ms = delay.as_millis() as u64, "reconnecting to event stream");
                delay
            }
        };

        tokio::time::sleep(delay).await;
        if shared.update(generation, |t| t.retry()).is_none() {
            return;
        }
    }
}

/// Reads the stream until it ends or fails.
async fn pump(shared: &Shared, generation: u64, mut stream: ChunkStream) {
    let mut decoder = SseDecoder::new();
    while let Some(chunk) = stream.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "event stream failed");
                return;
            }
        };

        for frame in decoder.feed(&bytes) {
            if !frame.is_message() {
                debug!(event = ?frame.event, "skipping named event");
                continue;
            }
            match EventEnvelope::decode(&frame.data) {
                Ok(Decoded::Envelope(envelope)) => {
                    if !shared.is_current(generation) {
                        return;
                    }
                    debug!(kind = %envelope.kind(), "event received");
                    shared.registry.dispatch(&envelope);
                }
                Ok(Decoded::Ignored { kind }) => debug!(%kind, "ignoring unknown event kind"),
                Err(e) => warn!(error = %e, "dropping malformed event"),
            }
        }
    }
    info!("event stream closed by server");
}
