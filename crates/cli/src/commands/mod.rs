pub mod chat;
pub mod init;
pub mod status;
pub mod tools;

use std::sync::Arc;
use toolrelay_catalog::{StaticCatalog, load_manifest};
use toolrelay_config::AppConfig;
use tracing::warn;

/// The catalog named by `[catalog] manifest_path`, or an empty one.
pub async fn load_catalog(config: &AppConfig) -> Result<Arc<StaticCatalog>, Box<dyn std::error::Error>> {
    match config.manifest_path() {
        Some(path) => {
            let catalog = load_manifest(&path)
                .await
                .map_err(|e| format!("Failed to load tool manifest: {e}"))?;
            Ok(Arc::new(catalog))
        }
        None => {
            warn!("No tool manifest configured; the model will answer without tools");
            Ok(Arc::new(StaticCatalog::new()))
        }
    }
}
