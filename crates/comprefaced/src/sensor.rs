//! Recognition sensors and the `update` sequence.

use crate::context::EntryContext;
use crate::wait::{self, WaitPolicy};
use chrono::{DateTime, Local};
use compreface_camera::{DeviceRegistry, SnapshotError};
use compreface_core::{recognized_person, Capability, ClientError, EntryOptions, RecognitionOutcome, NO_PERSON};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

const NAME_SUFFIX: &str = "CompreFace Recognition Sensor";

#[derive(Error, Debug)]
pub enum SequenceError {
    #[error("snapshot: {0}")]
    Snapshot(#[from] SnapshotError),
    #[error("recognition: {0}")]
    Recognition(#[from] ClientError),
}

/// Polling policies of the update sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceTimings {
    pub acquire: WaitPolicy,
    pub cleanup: WaitPolicy,
}

impl Default for SequenceTimings {
    fn default() -> Self {
        Self {
            acquire: WaitPolicy::ACQUIRE,
            cleanup: WaitPolicy::CLEANUP,
        }
    }
}

/// Sensor state as reported over D-Bus.
#[derive(Debug, Clone, Serialize)]
pub struct SensorInfo {
    pub entity_id: String,
    pub unique_id: String,
    pub name: String,
    pub state: String,
}

/// Build one sensor per camera selected for recognition.
///
/// Cameras selected for verification or detection get no sensor.
pub fn setup_platform(
    context: &Arc<EntryContext>,
    options: &EntryOptions,
    devices: &DeviceRegistry,
) -> Vec<Arc<RecognitionSensor>> {
    for capability in [Capability::Verification, Capability::Detection] {
        if let Some(ids) = options.devices(capability) {
            tracing::debug!(%capability, count = ids.len(), "no sensor type for capability; devices ignored");
        }
    }

    let Some(camera_ids) = options.devices(Capability::Recognition) else {
        tracing::info!("no recognition cameras selected");
        return Vec::new();
    };

    camera_ids
        .iter()
        .map(|id| {
            if devices.get(id).is_none() {
                tracing::warn!(device = %id, "camera not in registry; naming sensor after its id");
            }
            let sensor = RecognitionSensor::new(Arc::clone(context), id, devices.display_name(id));
            tracing::info!(entity = %sensor.entity_id, device = %id, "sensor added");
            Arc::new(sensor)
        })
        .collect()
}

/// Last recognized person seen by one camera.
pub struct RecognitionSensor {
    context: Arc<EntryContext>,
    camera_device_id: String,
    name: String,
    entity_id: String,
    person: Mutex<String>,
}

impl RecognitionSensor {
    pub fn new(context: Arc<EntryContext>, camera_device_id: &str, device_name: &str) -> Self {
        let name = format!("{device_name} {NAME_SUFFIX}");
        Self {
            context,
            camera_device_id: camera_device_id.to_string(),
            entity_id: format!("sensor.{}", slugify(&name)),
            name,
            person: Mutex::new(NO_PERSON.to_string()),
        }
    }

    /// The backing camera device id.
    pub fn unique_id(&self) -> &str {
        &self.camera_device_id
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> String {
        self.person
            .lock()
            .map(|p| p.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn set_state(&self, person: &str) {
        let mut guard = self.person.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = person.to_string();
    }

    pub fn info(&self) -> SensorInfo {
        SensorInfo {
            entity_id: self.entity_id.clone(),
            unique_id: self.camera_device_id.clone(),
            name: self.name().to_string(),
            state: self.state(),
        }
    }

    /// Snapshot, wait for the file, recognize, schedule cleanup, report.
    ///
    /// A snapshot that never lands, a missing recognition handle and an
    /// unexpected response shape all end as `"none"`. Errors from the camera
    /// or the recognition service propagate. Cleanup runs detached and is not
    /// awaited.
    pub async fn update(&self) -> Result<RecognitionOutcome, SequenceError> {
        let ctx = &self.context;
        let image = temp_image_path(&ctx.image_temp_dir, Local::now());
        tracing::info!(
            entity = %self.entity_id,
            device = %self.camera_device_id,
            path = %image.display(),
            "update requested"
        );

        ctx.snapshots.snapshot(&self.camera_device_id, &image).await?;

        let success = wait::wait_for_file(&image, ctx.timings.acquire).await;

        let person = if !success {
            tracing::warn!(
                entity = %self.entity_id,
                timeout = ?ctx.timings.acquire.timeout,
                "snapshot did not appear in time"
            );
            Ok(NO_PERSON.to_string())
        } else {
            match &ctx.services.recognition {
                Some(recognition) => recognition
                    .recognize(&image)
                    .await
                    .map(|response| recognized_person(&response)),
                None => {
                    tracing::warn!(entity = %self.entity_id, "recognition service not configured");
                    Ok(NO_PERSON.to_string())
                }
            }
        };

        // Detached.
        drop(wait::spawn_cleanup(image, ctx.timings.cleanup));

        let person = person?;
        self.set_state(&person);
        tracing::info!(entity = %self.entity_id, success, person = %person, "update finished");

        Ok(RecognitionOutcome { success, person })
    }
}

/// `recognition_image_tmp_<YYYYmmddHHMMSS>_<8 hex>.jpg` in `dir`.
///
/// The random suffix keeps two requests within the same second apart.
pub fn temp_image_path(dir: &Path, now: DateTime<Local>) -> PathBuf {
    let token = uuid::Uuid::new_v4().simple().to_string();
    dir.join(format!(
        "recognition_image_tmp_{}_{}.jpg",
        now.format("%Y%m%d%H%M%S"),
        &token[..8]
    ))
}

/// Lowercase ASCII alphanumerics joined by single underscores.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}
