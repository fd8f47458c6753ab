//! Camera device registry.
//!
//! Maps device ids to the cameras listed in the store. Sensors take their
//! display name from here and the snapshot provider its URL.

use compreface_core::CameraDevice;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: HashMap<String, CameraDevice>,
}

impl DeviceRegistry {
    pub fn new(devices: impl IntoIterator<Item = CameraDevice>) -> Self {
        let mut map = HashMap::new();
        for device in devices {
            if let Some(prev) = map.insert(device.id.clone(), device) {
                tracing::warn!(device = %prev.id, "duplicate camera id; keeping the last entry");
            }
        }
        Self { devices: map }
    }

    pub fn get(&self, id: &str) -> Option<&CameraDevice> {
        self.devices.get(id)
    }

    /// Registered name of the device, falling back to its id.
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.get(id).map(|d| d.name.as_str()).unwrap_or(id)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
