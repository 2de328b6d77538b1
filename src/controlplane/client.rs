//! Control plane client interface and HTTP implementation.
//!
//! The engine only talks to the control plane through the [`ControlPlane`]
//! trait. [`HttpControlPlane`] is the production implementation speaking
//! JSON over HTTP; tests substitute a generated mock.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, trace};

#[cfg(test)]
use mockall::automock;

use crate::error::{ConfigError, ControlPlaneError, RemoteCall, Result};

use super::types::{ApiError, ConfigResult, InfoResult, ResourceUpload, StatusSnapshot};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Capability interface of the remote control plane.
///
/// Implementations must be safe to share between concurrent reads; the
/// engine keeps no state between calls.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Opens a session scoped to one model.
    async fn open_session(&self, model: &str) -> Result<()>;

    /// Releases a session opened by [`ControlPlane::open_session`].
    fn close_session(&self, model: &str);

    /// Fetches the full status snapshot of a model.
    async fn status(&self, model: &str) -> Result<StatusSnapshot>;

    /// Looks up applications by tag, one result per tag.
    async fn application_info(&self, model: &str, tags: &[String]) -> Result<Vec<InfoResult>>;

    /// Fetches the composed configuration of one application.
    async fn application_config(&self, model: &str, application: &str) -> Result<ConfigResult>;

    /// Uploads one resource for an application.
    async fn upload_resource(&self, model: &str, upload: &ResourceUpload) -> Result<()>;
}

/// HTTP client for the control plane API.
#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    /// HTTP client.
    client: Client,
    /// Base URL of the API.
    base_url: Url,
    /// Bearer token.
    api_token: String,
}

/// Request body of the info lookup.
#[derive(Debug, Serialize)]
struct InfoRequest<'a> {
    entities: Vec<TagEntity<'a>>,
}

#[derive(Debug, Serialize)]
struct TagEntity<'a> {
    tag: &'a str,
}

/// Response body of the info lookup.
#[derive(Debug, serde::Deserialize)]
struct InfoResponse {
    #[serde(default)]
    results: Vec<InfoResult>,
}

impl HttpControlPlane {
    /// Creates a new control plane client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: &str, api_token: &str) -> Result<Self> {
        Self::with_timeout(base_url, api_token, DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a client with a custom timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not a hierarchical URL or the HTTP
    /// client cannot be created.
    pub fn with_timeout(base_url: &str, api_token: &str, timeout_secs: u64) -> Result<Self> {
        let base = Url::parse(base_url.trim_end_matches('/'))
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                ConfigError::validation(
                    format!("Invalid controller URL '{base_url}'"),
                    "controller.url",
                )
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                ControlPlaneError::network(
                    RemoteCall::OpenSession,
                    format!("Failed to create HTTP client: {e}"),
                )
            })?;

        Ok(Self {
            client,
            base_url: base,
            api_token: api_token.to_string(),
        })
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Sends a GET and decodes the JSON body.
    async fn get_json<T: DeserializeOwned>(
        &self,
        call: RemoteCall,
        segments: &[&str],
    ) -> Result<T> {
        let url = self.url(segments);
        trace!("GET {} ({call})", url.path());

        let response = self
            .client
            .get(url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_token))
            .send()
            .await
            .map_err(|e| ControlPlaneError::network(call, format!("Request failed: {e}")))?;

        let response = Self::check_status(call, response).await?;
        Self::decode(call, response).await
    }

    /// Sends a POST with a JSON body and decodes the JSON response.
    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        call: RemoteCall,
        segments: &[&str],
        body: &B,
    ) -> Result<T> {
        let url = self.url(segments);
        trace!("POST {} ({call})", url.path());

        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_token))
            .json(body)
            .send()
            .await
            .map_err(|e| ControlPlaneError::network(call, format!("Request failed: {e}")))?;

        let response = Self::check_status(call, response).await?;
        Self::decode(call, response).await
    }

    /// Maps non-success statuses to tagged errors.
    async fn check_status(call: RemoteCall, response: Response) -> Result<Response> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ControlPlaneError::Authentication {
                call,
                message: String::from("Invalid API token"),
            }
            .into());
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (code, message) = match serde_json::from_str::<ApiError>(&body) {
                Ok(error) => (error.code, error.message),
                Err(_) => (status.as_u16().to_string(), body),
            };
            return Err(ControlPlaneError::Remote {
                call,
                code,
                message,
            }
            .into());
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(call: RemoteCall, response: Response) -> Result<T> {
        response.json().await.map_err(|e| {
            ControlPlaneError::invalid_response(call, format!("Failed to parse response: {e}"))
                .into()
        })
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn open_session(&self, model: &str) -> Result<()> {
        debug!("Opening session for model {model}");
        let _: serde_json::Value = self
            .get_json(RemoteCall::OpenSession, &["models", model])
            .await?;
        Ok(())
    }

    fn close_session(&self, model: &str) {
        // Requests are independent; nothing is held server side.
        debug!("Closing session for model {model}");
    }

    async fn status(&self, model: &str) -> Result<StatusSnapshot> {
        self.get_json(RemoteCall::Status, &["models", model, "status"])
            .await
    }

    async fn application_info(&self, model: &str, tags: &[String]) -> Result<Vec<InfoResult>> {
        let request = InfoRequest {
            entities: tags.iter().map(|tag| TagEntity { tag }).collect(),
        };

        let response: InfoResponse = self
            .post_json(
                RemoteCall::ApplicationInfo,
                &["models", model, "applications", "info"],
                &request,
            )
            .await?;

        Ok(response.results)
    }

    async fn application_config(&self, model: &str, application: &str) -> Result<ConfigResult> {
        self.get_json(
            RemoteCall::ApplicationConfig,
            &["models", model, "applications", application, "config"],
        )
        .await
    }

    async fn upload_resource(&self, model: &str, upload: &ResourceUpload) -> Result<()> {
        let call = RemoteCall::UploadResource;
        let url = self.url(&[
            "models",
            model,
            "applications",
            &upload.application,
            "resources",
            &upload.resource,
        ]);
        trace!("PUT {} ({} bytes)", url.path(), upload.content.len());

        let response = self
            .client
            .put(url)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_token))
            .query(&[
                ("filename", upload.filename.as_str()),
                ("revision", upload.revision.as_str()),
            ])
            .body(upload.content.clone())
            .send()
            .await
            .map_err(|e| ControlPlaneError::network(call, format!("Request failed: {e}")))?;

        Self::check_status(call, response).await?;
        Ok(())
    }
}
