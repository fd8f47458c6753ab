//! Snapshot capture to a file.

use crate::device::DeviceRegistry;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("unknown camera device: {0}")]
    UnknownDevice(String),
    #[error("snapshot request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("camera returned HTTP {0}")]
    Status(u16),
    #[error("failed to write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Asks a camera to write one frame to `path`.
///
/// Completion is not signalled beyond the returned `Ok`; callers poll for
/// the file.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn snapshot(&self, device_id: &str, path: &Path) -> Result<(), SnapshotError>;
}

/// Fetches the device's snapshot URL and writes the image.
pub struct HttpSnapshotProvider {
    http: reqwest::Client,
    devices: DeviceRegistry,
}

impl HttpSnapshotProvider {
    pub fn new(devices: DeviceRegistry) -> Result<Self, SnapshotError> {
        let http = reqwest::Client::builder().timeout(SNAPSHOT_TIMEOUT).build()?;
        Ok(Self { http, devices })
    }
}

#[async_trait]
impl SnapshotProvider for HttpSnapshotProvider {
    async fn snapshot(&self, device_id: &str, path: &Path) -> Result<(), SnapshotError> {
        let device = self
            .devices
            .get(device_id)
            .ok_or_else(|| SnapshotError::UnknownDevice(device_id.to_string()))?;

        let resp = self.http.get(&device.snapshot_url).send().await?;
        if !resp.status().is_success() {
            return Err(SnapshotError::Status(resp.status().as_u16()));
        }
        let data = resp.bytes().await?;

        // Write beside the target and rename so pollers never see a partial file.
        let partial = path.with_extension("part");
        let write_err = |source: std::io::Error| SnapshotError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        tokio::fs::write(&partial, &data).await.map_err(write_err)?;
        tokio::fs::rename(&partial, path).await.map_err(write_err)?;

        tracing::debug!(
            device = device_id,
            path = %path.display(),
            bytes = data.len(),
            "snapshot written"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compreface_core::CameraDevice;
    use wiremock::matchers::{method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> HttpSnapshotProvider {
        let registry = DeviceRegistry::new([CameraDevice {
            id: "front".into(),
            name: "Front Door".into(),
            snapshot_url: format!("{}/snapshot.jpg", server.uri()),
        }]);
        HttpSnapshotProvider::new(registry).unwrap()
    }

    #[tokio::test]
    async fn test_snapshot_written_to_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(url_path("/snapshot.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg-bytes".to_vec()))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("sub/recognition_image_tmp.jpg");
        let provider = provider_for(&server);

        provider.snapshot("front", &target).await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), b"jpeg-bytes");
        assert!(!target.with_extension("part").exists());
    }

    #[tokio::test]
    async fn test_unknown_device() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let provider = provider_for(&server);

        let err = provider
            .snapshot("garage", &dir.path().join("x.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::UnknownDevice(id) if id == "garage"));
    }

    #[tokio::test]
    async fn test_camera_error_status_writes_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("x.jpg");
        let provider = provider_for(&server);

        let err = provider.snapshot("front", &target).await.unwrap_err();
        assert!(matches!(err, SnapshotError::Status(503)));
        assert!(!target.exists());
    }
}
