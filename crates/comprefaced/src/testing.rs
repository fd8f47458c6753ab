//! Test doubles for the host resolver, camera and recognition service.

use async_trait::async_trait;
use compreface_camera::{SnapshotError, SnapshotProvider};
use compreface_core::{ClientError, EntryData, HostError, HostResolver, Recognizer};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn entry(host: &str, recognize: &str, verify: &str, detect: &str) -> EntryData {
    EntryData {
        host: host.into(),
        port: 8000,
        recognize_api_key: recognize.into(),
        verify_api_key: verify.into(),
        detect_api_key: detect.into(),
    }
}

/// Resolves a fixed set of names.
pub struct StaticResolver(Vec<String>);

impl StaticResolver {
    pub fn new<const N: usize>(hosts: [&str; N]) -> Self {
        Self(hosts.iter().map(|h| h.to_string()).collect())
    }
}

#[async_trait]
impl HostResolver for StaticResolver {
    async fn resolve(&self, host: &str) -> Result<(), HostError> {
        let name = compreface_core::host::hostname(host)?;
        if self.0.iter().any(|known| known == name) {
            Ok(())
        } else {
            Err(HostError::NoAddresses(name.to_string()))
        }
    }
}

/// Camera that accepts the request and never writes anything.
pub struct NoSnapshots;

#[async_trait]
impl SnapshotProvider for NoSnapshots {
    async fn snapshot(&self, _device_id: &str, _path: &Path) -> Result<(), SnapshotError> {
        Ok(())
    }
}

/// Camera remembering the requested path; the test writes the file itself.
#[derive(Default)]
pub struct PendingSnapshots {
    requested: Mutex<Option<PathBuf>>,
}

impl PendingSnapshots {
    pub fn requested(&self) -> Option<PathBuf> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl SnapshotProvider for PendingSnapshots {
    async fn snapshot(&self, _device_id: &str, path: &Path) -> Result<(), SnapshotError> {
        *self.requested.lock().unwrap() = Some(path.to_path_buf());
        Ok(())
    }
}

/// Camera writing a small file, optionally after a delay in the background.
#[derive(Default)]
pub struct FileSnapshots {
    delay: Option<Duration>,
    fail: bool,
}

impl FileSnapshots {
    pub fn delayed(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            delay: None,
            fail: true,
        }
    }
}

#[async_trait]
impl SnapshotProvider for FileSnapshots {
    async fn snapshot(&self, device_id: &str, path: &Path) -> Result<(), SnapshotError> {
        if self.fail {
            return Err(SnapshotError::UnknownDevice(device_id.to_string()));
        }

        match self.delay {
            None => std::fs::write(path, b"jpeg").map_err(|source| SnapshotError::Write {
                path: path.to_path_buf(),
                source,
            }),
            Some(delay) => {
                let path = path.to_path_buf();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tokio::fs::write(&path, b"jpeg").await;
                });
                Ok(())
            }
        }
    }
}

/// Recognition service returning a canned response.
pub struct FakeRecognizer {
    response: Option<serde_json::Value>,
    calls: AtomicUsize,
}

impl FakeRecognizer {
    pub fn responding(response: serde_json::Value) -> Self {
        Self {
            response: Some(response),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            response: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Recognizer for FakeRecognizer {
    async fn recognize(&self, image: &Path) -> Result<serde_json::Value, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(image.exists(), "recognize called before the image exists");
        self.response
            .clone()
            .ok_or(ClientError::Status { status: 500 })
    }
}

/// Captured log output of a test-local subscriber.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
        let buffer = self.clone();
        tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || buffer.clone())
            .finish()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
