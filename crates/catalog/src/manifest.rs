//! JSON tool manifests.
//!
//! ```json
//! {
//!   "tools": [
//!     {
//!       "name": "orders.lookup",
//!       "description": "Find the status of an order",
//!       "inputs": {"type": "object", "properties": {"order_id": {"type": "string"}}},
//!       "tags": ["orders"],
//!       "call": {"type": "http", "url": "https://${ORDERS_HOST}/orders", "method": "GET",
//!                "headers": {"Authorization": "Bearer ${ORDERS_TOKEN}"}}
//!     }
//!   ]
//! }
//! ```

use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use toolrelay_core::error::CatalogError;
use toolrelay_core::tool::ToolDescriptor;
use tracing::info;

use crate::http::{HttpCall, HttpHandler};
use crate::static_catalog::StaticCatalog;

#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub tools: Vec<ManifestTool>,
}

#[derive(Debug, Deserialize)]
pub struct ManifestTool {
    #[serde(flatten)]
    pub descriptor: ToolDescriptor,
    pub call: CallTemplate,
}

/// How a manifest tool is invoked.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallTemplate {
    Http(HttpCall),
}

impl Manifest {
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        serde_json::from_str(json).map_err(|e| CatalogError::Manifest(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::Manifest(format!("{}: {e}", path.display())))?;
        Self::from_json(&content)
    }

    /// Register every tool into `catalog`.
    pub async fn register_into(self, catalog: &StaticCatalog) -> Result<usize, CatalogError> {
        let count = self.tools.len();
        for tool in self.tools {
            if tool.descriptor.name.trim().is_empty() {
                return Err(CatalogError::Manifest("tool with empty name".into()));
            }
            let handler = match tool.call {
                CallTemplate::Http(call) => HttpHandler::new(tool.descriptor.name.clone(), call),
            };
            catalog.register(tool.descriptor, Arc::new(handler)).await;
        }
        Ok(count)
    }
}

/// Build a catalog from a manifest file.
pub async fn load_manifest(path: &Path) -> Result<StaticCatalog, CatalogError> {
    let catalog = StaticCatalog::new();
    let count = Manifest::from_file(path)?.register_into(&catalog).await?;
    info!(path = %path.display(), tools = count, "Loaded tool manifest");
    Ok(catalog)
}
