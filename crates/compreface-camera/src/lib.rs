//! compreface-camera: Camera access for the CompreFace bridge.
//!
//! Keeps the registry of known camera devices and writes snapshots from
//! them to files the recognition sequence polls for.

pub mod device;
pub mod snapshot;

pub use device::DeviceRegistry;
pub use snapshot::{HttpSnapshotProvider, SnapshotError, SnapshotProvider};
