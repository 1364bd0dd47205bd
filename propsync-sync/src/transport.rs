//! Transport layer abstraction.
//!
//! The notification channel only needs one thing from the network: open a
//! long-lived stream and hand back its body as raw byte chunks. Framing and
//! decoding happen above this layer, so the channel works the same over
//! HTTP ([`crate::http::SseTransport`]) or the in-memory mock used in tests.

use crate::error::SyncResult;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Raw body chunks of an open event stream. The stream ending, or yielding
/// an error, means the connection dropped.
pub type ChunkStream = BoxStream<'static, SyncResult<Vec<u8>>>;

/// Something that can open a server-sent event stream.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Opens a new stream. Each call is an independent connection attempt.
    async fn open(&self) -> SyncResult<ChunkStream>;

    /// Human-readable description of the endpoint, for logs.
    fn endpoint(&self) -> String;
}

/// A scripted transport for testing.
pub mod mock {
    use super::*;
    use crate::error::SyncError;
    use futures::StreamExt;
    use parking_lot::Mutex;
    use propsync_types::EventEnvelope;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    enum Outcome {
        Fail(String),
        Accept(mpsc::UnboundedReceiver<SyncResult<Vec<u8>>>),
    }

    /// Replays a script of connection outcomes, one per `open` call.
    ///
    /// Once the script runs out every further `open` fails.
    #[derive(Clone, Default)]
    pub struct MockTransport {
        script: Arc<Mutex<VecDeque<Outcome>>>,
        opens: Arc<Mutex<Vec<Instant>>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes the next unscripted `open` fail.
        pub fn fail_next(&self, reason: impl Into<String>) {
            self.script.lock().push_back(Outcome::Fail(reason.into()));
        }

        /// Makes the next unscripted `open` succeed. The returned handle
        /// feeds that stream.
        pub fn accept_next(&self) -> MockStream {
            let (tx, rx) = mpsc::unbounded_channel();
            self.script.lock().push_back(Outcome::Accept(rx));
            MockStream { tx }
        }

        /// Number of `open` calls so far.
        pub fn open_count(&self) -> usize {
            self.opens.lock().len()
        }

        /// When each `open` call happened, on the tokio clock.
        pub fn open_instants(&self) -> Vec<Instant> {
            self.opens.lock().clone()
        }
    }

    #[async_trait]
    impl EventTransport for MockTransport {
        async fn open(&self) -> SyncResult<ChunkStream> {
            self.opens.lock().push(Instant::now());
            let next = self.script.lock().pop_front();
            match next {
                Some(Outcome::Accept(rx)) => Ok(futures::stream::unfold(rx, |mut rx| async move {
                    rx.recv().await.map(|item| (item, rx))
                })
                .boxed()),
                Some(Outcome::Fail(reason)) => Err(SyncError::Network(reason)),
                None => Err(SyncError::Network("no scripted connection".into())),
            }
        }

        fn endpoint(&self) -> String {
            "mock://events".to_string()
        }
    }

    /// Feeds one accepted mock stream. Dropping it (or calling
    /// [`MockStream::close`]) ends the stream.
    #[derive(Debug, Clone)]
    pub struct MockStream {
        tx: mpsc::UnboundedSender<SyncResult<Vec<u8>>>,
    }

    impl MockStream {
        /// Sends raw bytes exactly as given.
        pub fn send_raw(&self, bytes: impl Into<Vec<u8>>) -> bool {
            self.tx.send(Ok(bytes.into())).is_ok()
        }

        /// Sends one framed `data:` event.
        pub fn send_data(&self, payload: &str) -> bool {
            self.send_raw(format!("data: {payload}\n\n"))
        }

        /// Sends one framed envelope.
        pub fn send_envelope(&self, envelope: &EventEnvelope) -> bool {
            match envelope.encode() {
                Ok(payload) => self.send_data(&payload),
                Err(_) => false,
            }
        }

        /// Breaks the stream with a transport error.
        pub fn fail(&self, reason: impl Into<String>) -> bool {
            self.tx.send(Err(SyncError::Network(reason.into()))).is_ok()
        }

        /// Ends the stream cleanly, as a server closing the response would.
        pub fn close(self) {}

        /// Whether the reading side is still attached.
        pub fn is_attached(&self) -> bool {
            !self.tx.is_closed()
        }
    }
}
