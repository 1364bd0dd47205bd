use super::check_status;
use crate::error::{SyncError, SyncResult};
use crate::transport::{ChunkStream, EventTransport};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Opens the relay's event stream with a streaming GET.
///
/// The client has a connect timeout but no overall request timeout; the
/// response body is expected to stay open indefinitely.
#[derive(Debug, Clone)]
pub struct SseTransport {
    client: Client,
    url: String,
}

impl SseTransport {
    pub fn new(url: impl Into<String>) -> SyncResult<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| SyncError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self::with_client(client, url))
    }

    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl EventTransport for SseTransport {
    async fn open(&self) -> SyncResult<ChunkStream> {
        debug!(url = %self.url, "opening event stream");
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;
        let response = check_status(response).await?;

        Ok(response
            .bytes_stream()
            .map_ok(|bytes| bytes.to_vec())
            .map_err(SyncError::from)
            .boxed())
    }

    fn endpoint(&self) -> String {
        self.url.clone()
    }
}
