//! Per-entry context: service handles and everything a sensor needs.
//!
//! One context is built per entry setup and shared with every sensor of that
//! entry. Reloading builds a fresh one; nothing is looked up globally.

use crate::sensor::{self, RecognitionSensor, SequenceTimings};
use compreface_camera::{DeviceRegistry, SnapshotProvider};
use compreface_core::{
    Capability, ClientError, CompreFace, EntryData, EntryOptions, FaceService, HostError,
    HostResolver, Recognizer,
};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("invalid host: {0}")]
    InvalidHost(#[from] HostError),
    #[error("client: {0}")]
    Client(#[from] ClientError),
}

/// Live service handle per capability; `None` marks a capability without
/// an API key.
#[derive(Clone, Default)]
pub struct ServiceHandles {
    pub recognition: Option<Arc<dyn Recognizer>>,
    pub verification: Option<FaceService>,
    pub detection: Option<FaceService>,
}

impl ServiceHandles {
    pub fn from_entry(compre_face: &CompreFace, data: &EntryData) -> Self {
        let init = |capability| {
            data.api_key(capability)
                .map(|key| compre_face.init_service(capability, key))
        };

        Self {
            recognition: init(Capability::Recognition)
                .map(|svc| Arc::new(svc) as Arc<dyn Recognizer>),
            verification: init(Capability::Verification),
            detection: init(Capability::Detection),
        }
    }

    pub fn enabled(&self) -> Vec<Capability> {
        let mut enabled = Vec::new();
        if self.recognition.is_some() {
            enabled.push(Capability::Recognition);
        }
        if self.verification.is_some() {
            enabled.push(Capability::Verification);
        }
        if self.detection.is_some() {
            enabled.push(Capability::Detection);
        }
        enabled
    }
}

pub struct EntryContext {
    pub data: EntryData,
    pub services: ServiceHandles,
    pub snapshots: Arc<dyn SnapshotProvider>,
    /// Directory receiving the temporary snapshot images.
    pub image_temp_dir: PathBuf,
    pub timings: SequenceTimings,
}

/// A set-up entry: its context and the sensors built on it.
pub struct LoadedEntry {
    pub context: Arc<EntryContext>,
    pub sensors: Vec<Arc<RecognitionSensor>>,
}

impl LoadedEntry {
    /// Sensor by entity id or unique id (the camera device id).
    pub fn sensor(&self, target: &str) -> Option<Arc<RecognitionSensor>> {
        self.sensors
            .iter()
            .find(|s| s.entity_id() == target || s.unique_id() == target)
            .cloned()
    }

    pub fn unload(self) {
        tracing::info!(sensors = self.sensors.len(), "sensor platform unloaded");
    }
}

/// Inputs of an entry setup besides the entry record itself.
pub struct SetupParams<'a> {
    pub options: &'a EntryOptions,
    pub devices: &'a DeviceRegistry,
    pub resolver: &'a dyn HostResolver,
    pub snapshots: Arc<dyn SnapshotProvider>,
    pub image_temp_dir: PathBuf,
    pub timings: SequenceTimings,
}

/// Validate the host, build the service handles, then the sensor platform.
///
/// An unresolvable host aborts the setup with nothing built.
pub async fn setup_entry(data: EntryData, params: SetupParams<'_>) -> Result<LoadedEntry, SetupError> {
    if let Err(e) = params.resolver.resolve(&data.host).await {
        tracing::error!(host = %data.host, error = %e, "invalid host");
        return Err(e.into());
    }

    let compre_face = CompreFace::new(data.base_url())?;
    let services = ServiceHandles::from_entry(&compre_face, &data);
    tracing::info!(
        base_url = %compre_face.base_url(),
        capabilities = ?services.enabled(),
        "service handles ready"
    );

    let context = Arc::new(EntryContext {
        data,
        services,
        snapshots: params.snapshots,
        image_temp_dir: params.image_temp_dir,
        timings: params.timings,
    });

    let sensors = sensor::setup_platform(&context, params.options, params.devices);
    Ok(LoadedEntry { context, sensors })
}
