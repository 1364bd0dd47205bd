//! HTTP implementations of the engine's collaborators.
//!
//! - [`SseTransport`]: streaming GET against the notification relay
//! - [`RestPropertyApi`]: JSON client for the backing store

mod rest;
mod sse;

pub use rest::{RestApiConfig, RestPropertyApi};
pub use sse::SseTransport;

use crate::error::{SyncError, SyncResult};
use reqwest::Response;

/// Turns a non-2xx response into [`SyncError::Http`], keeping the body as
/// the message.
pub(crate) async fn check_status(response: Response) -> SyncResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = if body.is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        body
    };
    Err(SyncError::Http {
        status: status.as_u16(),
        message,
    })
}
