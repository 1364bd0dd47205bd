use super::check_status;
use crate::api::{FetchParams, PropertyApi, PropertyPage};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use propsync_query::DEFAULT_PAGE_SIZE;
use propsync_types::{CreatePropertyRequest, Property, PropertyId, PropertyPatch};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Header carrying the unpaginated row count, when the server sends it.
const TOTAL_COUNT_HEADER: &str = "x-total-count";

/// Configuration for [`RestPropertyApi`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestApiConfig {
    /// Base URL, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout (ms).
    pub timeout_ms: u64,
    /// Page size assumed when a list request does not name one.
    pub default_page_size: usize,
}

impl Default for RestApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3001".to_string(),
            timeout_ms: 10_000,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// JSON client for the listing store.
#[derive(Debug, Clone)]
pub struct RestPropertyApi {
    client: Client,
    config: RestApiConfig,
}

impl RestPropertyApi {
    pub fn new(config: RestApiConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| SyncError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RestApiConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> SyncResult<T> {
    let response = check_status(response).await?;
    let body = response.bytes().await?;
    serde_json::from_slice(&body)
        .map_err(|e| SyncError::Protocol(format!("unexpected response body: {e}")))
}

#[async_trait]
impl PropertyApi for RestPropertyApi {
    async fn fetch_properties(&self, params: &FetchParams) -> SyncResult<PropertyPage> {
        debug!(?params, "fetching listings");
        let response = self
            .client
            .get(self.url("/properties"))
            .query(params)
            .send()
            .await?;

        let total_header = response
            .headers()
            .get(TOTAL_COUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<usize>().ok());
        let data: Vec<Property> = read_json(response).await?;

        Ok(PropertyPage {
            total: total_header.unwrap_or(data.len()),
            page: params.page.unwrap_or(1),
            limit: params.limit.unwrap_or(self.config.default_page_size),
            data,
        })
    }

    async fn get_property(&self, id: PropertyId) -> SyncResult<Property> {
        let response = self
            .client
            .get(self.url(&format!("/properties/{id}")))
            .send()
            .await?;
        read_json(response).await
    }

    async fn create_property(&self, request: &CreatePropertyRequest) -> SyncResult<Property> {
        let response = self
            .client
            .post(self.url("/properties"))
            .json(request)
            .send()
            .await?;
        read_json(response).await
    }

    async fn update_property(&self, id: PropertyId, patch: &PropertyPatch) -> SyncResult<Property> {
        let response = self
            .client
            .put(self.url(&format!("/properties/{id}")))
            .json(patch)
            .send()
            .await?;
        read_json(response).await
    }

    async fn delete_property(&self, id: PropertyId) -> SyncResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("/properties/{id}")))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}
