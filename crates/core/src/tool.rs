//! Tool catalog trait — the abstraction over discoverable, invocable tools.
//!
//! The catalog answers relevance queries with tool descriptors and dispatches
//! invocations by canonical name. Where the tools actually run (HTTP services,
//! CLIs, browser automation) is the catalog's business, not the loop's.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::CatalogError;

/// A tool as the catalog knows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Canonical, globally unique name (may contain `.` or other separators)
    pub name: String,

    /// What the tool does (sent to the model)
    #[serde(default)]
    pub description: String,

    /// JSON-Schema-like description of the arguments
    #[serde(default = "empty_object", alias = "inputs", alias = "parameters")]
    pub input_schema: serde_json::Value,

    /// Free-form keywords used for relevance search
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

fn empty_object() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// The outcome of invoking one tool: a value, or an error message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolInvocationResult {
    Ok(serde_json::Value),
    Err(String),
}

impl ToolInvocationResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// The JSON the model sees: the value itself, or `{"error": message}`.
    pub fn to_content(&self) -> serde_json::Value {
        match self {
            Self::Ok(value) => value.clone(),
            Self::Err(message) => serde_json::json!({ "error": message }),
        }
    }
}

/// A tool invocation result keyed by the model's tool-call id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// The call id from the model's turn
    pub call_id: String,

    /// The name the model used
    pub vendor_name: String,

    /// The name the catalog was asked to invoke
    pub canonical_name: String,

    pub result: ToolInvocationResult,

    pub duration_ms: u64,
}

/// The catalog the orchestration loop discovers and invokes tools through.
#[async_trait]
pub trait ToolCatalog: Send + Sync {
    /// Return up to `limit` tools relevant to `query`. An empty result is not an error.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ToolDescriptor>, CatalogError>;

    /// Invoke the tool called `canonical_name` with `arguments` exactly as given.
    async fn invoke(
        &self,
        canonical_name: &str,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value, CatalogError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn descriptor_accepts_inputs_alias() {
        let desc: ToolDescriptor = serde_json::from_value(json!({
            "name": "news.top_headlines",
            "description": "Top headlines",
            "inputs": {"type": "object", "properties": {"country": {"type": "string"}}}
        }))
        .unwrap();
        assert_eq!(desc.name, "news.top_headlines");
        assert_eq!(desc.input_schema["properties"]["country"]["type"], "string");
        assert!(desc.tags.is_empty());
    }

    #[test]
    fn descriptor_defaults_schema() {
        let desc: ToolDescriptor = serde_json::from_value(json!({"name": "ping"})).unwrap();
        assert_eq!(desc.input_schema["type"], "object");
        assert_eq!(desc.description, "");
    }

    #[test]
    fn error_result_renders_envelope() {
        let result = ToolInvocationResult::Err("not found".into());
        assert!(!result.is_ok());
        assert_eq!(result.to_content(), json!({"error": "not found"}));
    }

    #[test]
    fn ok_result_renders_value() {
        let result = ToolInvocationResult::Ok(json!({"status": "shipped"}));
        assert_eq!(result.to_content()["status"], "shipped");
    }
}
