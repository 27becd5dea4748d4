//! GNS3 v2 REST client
//!
//! Thin request/response wrapper: one HTTP call per operation, a client-wide
//! request timeout, no retries. Status codes are mapped as follows:
//!
//! | Call                 | Success          | Anything else            |
//! |----------------------|------------------|--------------------------|
//! | list / nodes         | 2xx + JSON body  | `Rejected { status }`    |
//! | create / duplicate   | 2xx + JSON body  | `Rejected { status }`    |
//! | start / stop / delete| 2xx, body ignored| `Rejected { status }`    |
//!
//! Connection failures, timeouts and undecodable bodies become
//! [`BackendError::Unavailable`].

use super::{BackendError, BackendResult, LabBackend, NodeInfo, ProjectInfo};
use crate::config::BackendConfig;
use crate::error::{RangeError, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

/// Longest backend error text, in bytes, carried into a `Rejected` error
const MAX_ERROR_BODY: usize = 256;

/// REST client for a GNS3-compatible server
#[derive(Clone)]
pub struct Gns3Client {
    client: Client,
    server_url: String,
    api_base: String,
    credentials: Option<(String, Option<String>)>,
}

/// Error payload shape used by GNS3 (`{"message": ..., "status": ...}`)
#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl Gns3Client {
    /// Build a client from explicit configuration
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| RangeError::Config(format!("Cannot build backend HTTP client: {}", e)))?;

        Ok(Self {
            client,
            server_url: config.url.trim_end_matches('/').to_string(),
            api_base: config.api_base(),
            credentials: config
                .username
                .clone()
                .map(|user| (user, config.password.clone())),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.api_base, path);
        debug!("GNS3 {} {}", method, url);
        let builder = self.client.request(method, url);
        match &self.credentials {
            Some((user, password)) => builder.basic_auth(user, password.as_deref()),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> BackendResult<Response> {
        let response = builder.send().await.map_err(|e| {
            warn!("GNS3 request failed: {}", e);
            BackendError::from(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or(body);
        let message = truncate_message(message);
        debug!("GNS3 rejected request with {}: {}", status, message);

        Err(BackendError::Rejected {
            status: status.as_u16(),
            message,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> BackendResult<T> {
        let response = self.send(builder).await?;
        response.json::<T>().await.map_err(BackendError::from)
    }

    async fn send_empty(&self, builder: RequestBuilder) -> BackendResult<()> {
        self.send(builder).await.map(|_| ())
    }
}

#[async_trait]
impl LabBackend for Gns3Client {
    async fn list_projects(&self) -> BackendResult<Vec<ProjectInfo>> {
        self.send_json(self.request(Method::GET, "/projects")).await
    }

    async fn create_project(&self, name: &str) -> BackendResult<ProjectInfo> {
        let body = serde_json::json!({ "name": name });
        self.send_json(self.request(Method::POST, "/projects").json(&body))
            .await
    }

    async fn duplicate_project(
        &self,
        source_id: &str,
        new_name: &str,
    ) -> BackendResult<ProjectInfo> {
        let body = serde_json::json!({ "name": new_name });
        let path = format!("/projects/{}/duplicate", source_id);
        self.send_json(self.request(Method::POST, &path).json(&body))
            .await
    }

    async fn list_nodes(&self, project_id: &str) -> BackendResult<Vec<NodeInfo>> {
        let path = format!("/projects/{}/nodes", project_id);
        self.send_json(self.request(Method::GET, &path)).await
    }

    async fn start_project(&self, project_id: &str) -> BackendResult<()> {
        let path = format!("/projects/{}/nodes/start", project_id);
        self.send_empty(self.request(Method::POST, &path)).await
    }

    async fn stop_project(&self, project_id: &str) -> BackendResult<()> {
        let path = format!("/projects/{}/nodes/stop", project_id);
        self.send_empty(self.request(Method::POST, &path)).await
    }

    async fn delete_project(&self, project_id: &str) -> BackendResult<()> {
        let path = format!("/projects/{}", project_id);
        self.send_empty(self.request(Method::DELETE, &path)).await
    }

    fn web_ui_url(&self, project_id: &str) -> Option<String> {
        Some(format!(
            "{}/static/web-ui/server/1/project/{}",
            self.server_url, project_id
        ))
    }
}

/// Cut to at most `MAX_ERROR_BODY` bytes without splitting a character
fn truncate_message(mut message: String) -> String {
    if message.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }
    message
}
