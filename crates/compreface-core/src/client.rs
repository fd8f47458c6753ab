//! CompreFace service handles over HTTP.
//!
//! One [`CompreFace`] per configuration entry; one [`FaceService`] per
//! capability with a configured API key. Only the recognize call is issued;
//! its JSON body is handed back untouched for [`crate::recognized_person`].

use crate::types::Capability;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const API_KEY_HEADER: &str = "x-api-key";

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("failed to read image {path}: {source}")]
    ReadImage {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),
    #[error("service returned {status} with a non-JSON body")]
    Status { status: u16 },
    #[error("invalid JSON in response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0} service cannot recognize faces")]
    WrongCapability(Capability),
}

/// Submits an image for face recognition.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, image: &Path) -> Result<serde_json::Value, ClientError>;
}

/// Connection to one CompreFace server.
#[derive(Debug, Clone)]
pub struct CompreFace {
    base_url: String,
    http: reqwest::Client,
}

impl CompreFace {
    /// `base_url` includes scheme and port, e.g. `http://10.0.0.5:8000`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(base_url, http))
    }

    pub fn with_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url, http }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Bind a service handle to its API key.
    pub fn init_service(&self, capability: Capability, api_key: &str) -> FaceService {
        tracing::debug!(%capability, base_url = %self.base_url, "service handle created");
        FaceService {
            capability,
            endpoint: format!("{}{}", self.base_url, capability.endpoint_path()),
            api_key: api_key.to_string(),
            http: self.http.clone(),
        }
    }
}

/// A CompreFace service bound to its API key.
#[derive(Clone)]
pub struct FaceService {
    capability: Capability,
    endpoint: String,
    api_key: String,
    http: reqwest::Client,
}

impl FaceService {
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl std::fmt::Debug for FaceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaceService")
            .field("capability", &self.capability)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Recognizer for FaceService {
    async fn recognize(&self, image: &Path) -> Result<serde_json::Value, ClientError> {
        if self.capability != Capability::Recognition {
            return Err(ClientError::WrongCapability(self.capability));
        }

        let data = tokio::fs::read(image)
            .await
            .map_err(|source| ClientError::ReadImage {
                path: image.display().to_string(),
                source,
            })?;

        let file_name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.jpg".to_string());
        let form = Form::new().part(
            "file",
            Part::bytes(data).file_name(file_name).mime_str("image/jpeg")?,
        );

        let resp = self
            .http
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.bytes().await?;

        // CompreFace reports "no face found" and similar as non-2xx JSON.
        match serde_json::from_slice::<serde_json::Value>(&body) {
            Ok(json) => {
                tracing::debug!(status = status.as_u16(), "recognize response received");
                Ok(json)
            }
            Err(_) if !status.is_success() => Err(ClientError::Status {
                status: status.as_u16(),
            }),
            Err(e) => Err(ClientError::Decode(e)),
        }
    }
}
