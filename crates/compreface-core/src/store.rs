//! On-disk record of the configuration entry, its options and the known
//! camera devices.
//!
//! ```toml
//! [entry]
//! host = "10.0.0.5"
//! port = 8000
//! recognize_api_key = "..."
//!
//! [options]
//! recognition_camera_devices = ["front_door"]
//!
//! [[cameras]]
//! id = "front_door"
//! name = "Front Door"
//! snapshot_url = "http://10.0.0.20/snapshot.jpg"
//! ```
//!
//! The file holds at most one `[entry]`.

use crate::types::{EntryData, EntryOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid store file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to encode store: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// A camera that can feed a sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraDevice {
    pub id: String,
    pub name: String,
    /// URL returning a single JPEG frame.
    pub snapshot_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Store {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<EntryData>,
    #[serde(default)]
    pub options: EntryOptions,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cameras: Vec<CameraDevice>,
}

/// `$XDG_CONFIG_HOME/compreface/store.toml`, falling back to `~/.config`.
pub fn default_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        })
        .join("compreface")
        .join("store.toml")
}

impl Store {
    /// Load the store; a missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no store file yet");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        toml::from_str(&text).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write the store, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let text = toml::to_string_pretty(self)?;
        let write_err = |source: std::io::Error| StoreError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, text).map_err(write_err)?;
        tracing::debug!(path = %path.display(), "store saved");
        Ok(())
    }

    pub fn camera(&self, id: &str) -> Option<&CameraDevice> {
        self.cameras.iter().find(|c| c.id == id)
    }
}
