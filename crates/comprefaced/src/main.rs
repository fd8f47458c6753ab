use anyhow::Result;
use compreface_core::DnsResolver;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod bridge;
mod config;
mod context;
mod dbus_interface;
mod sensor;
#[cfg(test)]
mod testing;
mod wait;

use bridge::{Bridge, BridgeError};
use dbus_interface::{BridgeService, BUS_NAME, OBJECT_PATH};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = config::Config::from_env();
    tracing::info!(
        store = %config.store_path.display(),
        images = %config.image_temp_dir.display(),
        "comprefaced starting"
    );

    let bridge = Arc::new(Bridge::new(config.clone(), Arc::new(DnsResolver)));
    match bridge.setup().await {
        Ok(()) => {}
        Err(BridgeError::NotConfigured) => {
            tracing::info!("no entry configured yet; waiting for `compreface setup` and a reload")
        }
        Err(e) => tracing::error!(error = %e, "entry setup failed"),
    }

    let builder = if config.system_bus {
        zbus::connection::Builder::system()?
    } else {
        zbus::connection::Builder::session()?
    };
    let _conn = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, BridgeService::new(Arc::clone(&bridge)))?
        .build()
        .await?;

    tracing::info!(bus = BUS_NAME, "comprefaced ready");

    // Keep running until signaled
    tokio::signal::ctrl_c().await?;
    tracing::info!("comprefaced shutting down");
    bridge.unload().await;

    Ok(())
}
