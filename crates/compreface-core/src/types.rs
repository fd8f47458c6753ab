use serde::{Deserialize, Serialize};

/// Sensor state when nobody was recognized.
pub const NO_PERSON: &str = "none";

/// Minimum similarity (exclusive) for a subject to count as recognized.
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

/// A CompreFace service an API key can unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Recognition,
    Verification,
    Detection,
}

impl Capability {
    /// Fixed order used by the options flow and by status reporting.
    pub const ALL: [Capability; 3] = [
        Capability::Recognition,
        Capability::Verification,
        Capability::Detection,
    ];

    /// Options-flow step id.
    pub fn step_id(&self) -> &'static str {
        match self {
            Capability::Recognition => "recognition",
            Capability::Verification => "verification",
            Capability::Detection => "detection",
        }
    }

    /// Options field holding the selected camera devices.
    pub fn devices_field(&self) -> &'static str {
        match self {
            Capability::Recognition => "recognition_camera_devices",
            Capability::Verification => "verification_camera_devices",
            Capability::Detection => "detection_camera_devices",
        }
    }

    /// Entry-data field holding the API key.
    pub fn api_key_field(&self) -> &'static str {
        match self {
            Capability::Recognition => "recognize_api_key",
            Capability::Verification => "verify_api_key",
            Capability::Detection => "detect_api_key",
        }
    }

    /// CompreFace REST path for this service.
    pub fn endpoint_path(&self) -> &'static str {
        match self {
            Capability::Recognition => "/api/v1/recognition/recognize",
            Capability::Verification => "/api/v1/verification/verify",
            Capability::Detection => "/api/v1/detection/detect",
        }
    }

    pub fn from_step_id(step_id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.step_id() == step_id)
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.step_id())
    }
}

/// Connection settings of the configuration entry.
///
/// An empty API key disables the matching capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryData {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub recognize_api_key: String,
    #[serde(default)]
    pub verify_api_key: String,
    #[serde(default)]
    pub detect_api_key: String,
}

impl EntryData {
    /// API key for `capability`, or `None` when the capability is disabled.
    pub fn api_key(&self, capability: Capability) -> Option<&str> {
        let key = match capability {
            Capability::Recognition => &self.recognize_api_key,
            Capability::Verification => &self.verify_api_key,
            Capability::Detection => &self.detect_api_key,
        };
        (!key.is_empty()).then_some(key.as_str())
    }

    pub fn enabled_capabilities(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| self.api_key(*c).is_some())
            .collect()
    }

    pub fn has_any_api_key(&self) -> bool {
        !self.enabled_capabilities().is_empty()
    }

    /// Service base URL; `http://` is assumed when the host carries no scheme.
    pub fn base_url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            format!("{host}:{}", self.port)
        } else {
            format!("http://{host}:{}", self.port)
        }
    }
}

/// Camera selections made in the options flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recognition_camera_devices: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_camera_devices: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_camera_devices: Option<Vec<String>>,
}

impl EntryOptions {
    pub fn devices(&self, capability: Capability) -> Option<&[String]> {
        match capability {
            Capability::Recognition => self.recognition_camera_devices.as_deref(),
            Capability::Verification => self.verification_camera_devices.as_deref(),
            Capability::Detection => self.detection_camera_devices.as_deref(),
        }
    }

    pub fn set_devices(&mut self, capability: Capability, devices: Vec<String>) {
        let slot = match capability {
            Capability::Recognition => &mut self.recognition_camera_devices,
            Capability::Verification => &mut self.verification_camera_devices,
            Capability::Detection => &mut self.detection_camera_devices,
        };
        *slot = Some(devices);
    }
}

/// Reply of the `update` service call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecognitionOutcome {
    /// Whether the snapshot file appeared in time.
    pub success: bool,
    /// Recognized subject label, or [`NO_PERSON`].
    pub person: String,
}

impl RecognitionOutcome {
    pub fn nobody(success: bool) -> Self {
        Self {
            success,
            person: NO_PERSON.to_string(),
        }
    }
}

/// A ranked subject from a recognition response.
#[derive(Debug, Clone, PartialEq)]
pub struct Subject {
    pub label: String,
    pub similarity: f64,
}

/// Top-ranked subject of the first detected face.
///
/// CompreFace ranks `result[].subjects[]` by descending similarity, so only
/// the first entry of each list is considered. Returns `None` on any shape
/// mismatch instead of failing.
pub fn top_subject(response: &serde_json::Value) -> Option<Subject> {
    let subject = response
        .get("result")?
        .as_array()?
        .first()?
        .get("subjects")?
        .as_array()?
        .first()?;

    Some(Subject {
        label: subject.get("subject")?.as_str()?.to_string(),
        similarity: subject.get("similarity")?.as_f64()?,
    })
}

/// Person label for a recognition response: the top subject when its
/// similarity is strictly above [`SIMILARITY_THRESHOLD`], else [`NO_PERSON`].
pub fn recognized_person(response: &serde_json::Value) -> String {
    match top_subject(response) {
        Some(subject) if subject.similarity > SIMILARITY_THRESHOLD => subject.label,
        _ => NO_PERSON.to_string(),
    }
}
