//! Core `AnalysisService` trait and `HttpAnalysisClient` implementation.
//!
//! `HttpAnalysisClient` talks to two endpoints:
//!
//! * the camera snapshot URL (`GET`, raw image bytes back);
//! * the analysis service (`POST {base}/api/analyze`, multipart image in,
//!   synthesised speech out; `POST {base}/api/analyze/cancel` to abandon a
//!   run by id).
//!
//! All connection details are read from the shared [`ConfigStore`] on every
//! call, so dashboard edits apply to the next request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use thiserror::Error;
use uuid::Uuid;

use crate::config::ConfigStore;

// ---------------------------------------------------------------------------
// RemoteError
// ---------------------------------------------------------------------------

/// Errors that can occur while talking to the camera or analysis service.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// The base URL or credential is missing.
    #[error("analysis service is not configured")]
    NotConfigured,

    /// HTTP transport or connection error.
    #[error("request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// The server answered with a non-success status.
    #[error("API {code}: {message}")]
    Status { code: u16, message: String },

    /// A 200 response whose body could not be read or was empty.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RemoteError::Timeout
        } else {
            RemoteError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// AnalysisService trait
// ---------------------------------------------------------------------------

/// Request/response access to the camera and the remote analysis service.
///
/// Implementors must be `Send + Sync` so they can be shared as
/// `Arc<dyn AnalysisService>` between the pipeline task and `cancel()`.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Fetch one still image from the camera.
    async fn capture(&self) -> Result<Bytes, RemoteError>;

    /// Send `image` for analysis; returns the spoken report as audio bytes.
    /// `workflow_id` lets the server correlate a later cancel notice.
    async fn analyze(&self, image: Bytes, workflow_id: Uuid) -> Result<Bytes, RemoteError>;

    /// Ask the server to abandon the run identified by `workflow_id`.
    async fn cancel_remote(&self, workflow_id: Uuid) -> Result<(), RemoteError>;
}

// ---------------------------------------------------------------------------
// HttpAnalysisClient
// ---------------------------------------------------------------------------

pub struct HttpAnalysisClient {
    client: reqwest::Client,
    config: Arc<ConfigStore>,
}

impl HttpAnalysisClient {
    /// Build a client reading its endpoints from `config`.
    ///
    /// Timeouts are applied per request because each endpoint has its own.
    pub fn new(config: Arc<ConfigStore>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client, config }
    }
}

#[async_trait]
impl AnalysisService for HttpAnalysisClient {
    async fn capture(&self) -> Result<Bytes, RemoteError> {
        let remote = self.config.remote();

        let response = self
            .client
            .get(&remote.capture_url)
            .timeout(Duration::from_secs(remote.capture_timeout_secs))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                code: status.as_u16(),
                message: error_message_from_body(&body),
            });
        }

        non_empty(response.bytes().await?)
    }

    async fn analyze(&self, image: Bytes, workflow_id: Uuid) -> Result<Bytes, RemoteError> {
        let remote = self.config.remote();
        if !remote.is_configured() {
            return Err(RemoteError::NotConfigured);
        }

        let part = Part::bytes(image.to_vec())
            .file_name("image.jpg")
            .mime_str("image/jpeg")?;
        let form = Form::new().part("file", part);

        let id = workflow_id.to_string();
        let key = remote.api_key.clone().unwrap_or_default();

        log::debug!("remote: analyze request {id}");
        let response = self
            .client
            .post(remote.endpoint("/api/analyze"))
            .query(&[("api_key", key.as_str()), ("id", id.as_str())])
            .multipart(form)
            .timeout(Duration::from_secs(remote.analyze_timeout_secs))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message_from_body(&body);
            log::warn!("remote: analyze {id} failed: {} - {message}", status.as_u16());
            return Err(RemoteError::Status {
                code: status.as_u16(),
                message,
            });
        }

        non_empty(response.bytes().await?)
    }

    async fn cancel_remote(&self, workflow_id: Uuid) -> Result<(), RemoteError> {
        let remote = self.config.remote();
        if remote.base_url.trim().is_empty() {
            return Err(RemoteError::NotConfigured);
        }

        let id = workflow_id.to_string();
        log::info!("remote: sending cancellation for {id}");
        let response = self
            .client
            .post(remote.endpoint("/api/analyze/cancel"))
            .query(&[("id", id.as_str())])
            .timeout(Duration::from_secs(remote.cancel_timeout_secs))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status {
                code: status.as_u16(),
                message: error_message_from_body(&response.text().await.unwrap_or_default()),
            });
        }
        Ok(())
    }
}

fn non_empty(body: Bytes) -> Result<Bytes, RemoteError> {
    if body.is_empty() {
        Err(RemoteError::InvalidResponse("empty body".into()))
    } else {
        Ok(body)
    }
}

/// Prefer the `message` field of a JSON error body, else the raw text.
pub fn error_message_from_body(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json.get("message")?.as_str().map(str::to_owned))
        .unwrap_or_else(|| body.trim().to_owned())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
