//! Reference tool catalog for toolrelay.
//!
//! [`StaticCatalog`] answers relevance queries by keyword scoring over tool
//! names, tags and descriptions, and dispatches invocations to registered
//! [`ToolHandler`]s. HTTP tools can be declared in a JSON manifest.

pub mod http;
pub mod manifest;
pub mod static_catalog;

pub use http::{HttpCall, HttpHandler};
pub use manifest::{CallTemplate, Manifest, load_manifest};
pub use static_catalog::{FnHandler, StaticCatalog, ToolHandler, handler_fn};
