use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
///
/// The entry, its options and the camera list live in the store file; this
/// only covers process-level settings.
#[derive(Debug, Clone)]
pub struct Config {
    /// Store file holding the entry, options and cameras.
    pub store_path: PathBuf,
    /// Directory receiving temporary snapshot images.
    pub image_temp_dir: PathBuf,
    /// Serve on the system bus instead of the session bus.
    pub system_bus: bool,
}

impl Config {
    /// Load configuration from `COMPREFACE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let store_path = std::env::var("COMPREFACE_STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| compreface_core::store::default_path());

        let image_temp_dir = std::env::var("COMPREFACE_IMAGE_TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("compreface"));

        Self {
            store_path,
            image_temp_dir,
            system_bus: std::env::var("COMPREFACE_SYSTEM_BUS")
                .map(|v| v == "1")
                .unwrap_or(false),
        }
    }
}
