use crate::bridge::{Bridge, BridgeError};
use std::sync::Arc;
use zbus::interface;

pub const BUS_NAME: &str = "org.compreface.Bridge1";
pub const OBJECT_PATH: &str = "/org/compreface/Bridge1";

/// D-Bus interface for the CompreFace bridge daemon.
///
/// Bus name: org.compreface.Bridge1
/// Object path: /org/compreface/Bridge1
pub struct BridgeService {
    bridge: Arc<Bridge>,
}

impl BridgeService {
    pub fn new(bridge: Arc<Bridge>) -> Self {
        Self { bridge }
    }
}

#[interface(name = "org.compreface.Bridge1")]
impl BridgeService {
    /// Run recognition on a sensor's camera; returns `{"success", "person"}` JSON.
    async fn update(&self, target: &str) -> zbus::fdo::Result<String> {
        tracing::info!(target, "update requested");
        let outcome = self.bridge.update(target).await.map_err(to_fdo)?;
        to_json(&outcome)
    }

    /// List sensors with their current state.
    async fn list_sensors(&self) -> zbus::fdo::Result<String> {
        to_json(&self.bridge.sensors().await)
    }

    /// Return daemon status information.
    async fn status(&self) -> zbus::fdo::Result<String> {
        to_json(&self.bridge.status().await)
    }

    /// Unload and set up the entry again from the store.
    async fn reload(&self) -> zbus::fdo::Result<bool> {
        self.bridge.reload().await.map_err(to_fdo)?;
        Ok(true)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> zbus::fdo::Result<String> {
    serde_json::to_string(value).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
}

fn to_fdo(err: BridgeError) -> zbus::fdo::Error {
    tracing::warn!(error = %err, "request failed");
    match err {
        BridgeError::UnknownSensor(_) => zbus::fdo::Error::InvalidArgs(err.to_string()),
        _ => zbus::fdo::Error::Failed(err.to_string()),
    }
}
