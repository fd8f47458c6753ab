//! Entry lifecycle: setup from the store, unload, reload, and routing of
//! `update` calls to sensors.

use crate::config::Config;
use crate::context::{self, LoadedEntry, SetupError, SetupParams};
use crate::sensor::{SensorInfo, SequenceError, SequenceTimings};
use compreface_camera::{DeviceRegistry, HttpSnapshotProvider, SnapshotError, SnapshotProvider};
use compreface_core::{Capability, HostResolver, RecognitionOutcome, Store, StoreError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

const STARTUP_MESSAGE: &str = "Starting CompreFace...";

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("no entry configured; run `compreface setup`")]
    NotConfigured,
    #[error("no sensor matches {0}")]
    UnknownSensor(String),
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("setup failed: {0}")]
    Setup(#[from] SetupError),
    #[error("camera: {0}")]
    Camera(#[from] SnapshotError),
    #[error(transparent)]
    Sequence(#[from] SequenceError),
}

/// Daemon status as reported over D-Bus.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub version: &'static str,
    pub configured: bool,
    pub base_url: Option<String>,
    pub capabilities: Vec<Capability>,
    pub sensors: usize,
}

pub struct Bridge {
    config: Config,
    resolver: Arc<dyn HostResolver>,
    timings: SequenceTimings,
    entry: RwLock<Option<LoadedEntry>>,
}

impl Bridge {
    pub fn new(config: Config, resolver: Arc<dyn HostResolver>) -> Self {
        Self {
            config,
            resolver,
            timings: SequenceTimings::default(),
            entry: RwLock::new(None),
        }
    }

    #[cfg(test)]
    pub fn with_timings(mut self, timings: SequenceTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Set up the stored entry. Replaces whatever was loaded before.
    pub async fn setup(&self) -> Result<(), BridgeError> {
        let mut slot = self.entry.write().await;
        if let Some(previous) = slot.take() {
            previous.unload();
        }
        *slot = Some(self.load().await?);
        Ok(())
    }

    /// Tear down the sensors and drop the entry context.
    pub async fn unload(&self) {
        if let Some(loaded) = self.entry.write().await.take() {
            loaded.unload();
        }
    }

    /// Full unload followed by a full setup, re-reading the store.
    pub async fn reload(&self) -> Result<(), BridgeError> {
        tracing::info!("reloading entry");
        self.setup().await
    }

    async fn load(&self) -> Result<LoadedEntry, BridgeError> {
        let store = Store::load(&self.config.store_path)?;
        let data = store.entry.ok_or(BridgeError::NotConfigured)?;

        // Every setup starts from an unloaded entry.
        tracing::info!("{STARTUP_MESSAGE}");

        if let Err(e) = tokio::fs::create_dir_all(&self.config.image_temp_dir).await {
            tracing::warn!(
                dir = %self.config.image_temp_dir.display(),
                error = %e,
                "cannot create image temp dir"
            );
        }

        let devices = DeviceRegistry::new(store.cameras);
        if devices.is_empty() {
            tracing::warn!("no cameras in the store; snapshots will fail");
        } else {
            tracing::debug!(cameras = devices.len(), "camera registry loaded");
        }
        let snapshots: Arc<dyn SnapshotProvider> = Arc::new(HttpSnapshotProvider::new(devices.clone())?);

        let loaded = context::setup_entry(
            data,
            SetupParams {
                options: &store.options,
                devices: &devices,
                resolver: self.resolver.as_ref(),
                snapshots,
                image_temp_dir: self.config.image_temp_dir.clone(),
                timings: self.timings,
            },
        )
        .await?;
        Ok(loaded)
    }

    /// Run the `update` service call on the sensor matching `target`.
    pub async fn update(&self, target: &str) -> Result<RecognitionOutcome, BridgeError> {
        let sensor = {
            let slot = self.entry.read().await;
            let loaded = slot.as_ref().ok_or(BridgeError::NotConfigured)?;
            loaded
                .sensor(target)
                .ok_or_else(|| BridgeError::UnknownSensor(target.to_string()))?
        };
        Ok(sensor.update().await?)
    }

    pub async fn sensors(&self) -> Vec<SensorInfo> {
        self.entry
            .read()
            .await
            .as_ref()
            .map(|loaded| loaded.sensors.iter().map(|s| s.info()).collect())
            .unwrap_or_default()
    }

    pub async fn status(&self) -> Status {
        let slot = self.entry.read().await;
        match slot.as_ref() {
            Some(loaded) => Status {
                version: env!("CARGO_PKG_VERSION"),
                configured: true,
                base_url: Some(loaded.context.data.base_url()),
                capabilities: loaded.context.services.enabled(),
                sensors: loaded.sensors.len(),
            },
            None => Status {
                version: env!("CARGO_PKG_VERSION"),
                configured: false,
                base_url: None,
                capabilities: Vec::new(),
                sensors: 0,
            },
        }
    }
}
