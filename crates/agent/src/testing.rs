//! Scripted provider and catalog for loop tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use toolrelay_core::error::{CatalogError, ProviderError};
use toolrelay_core::provider::{ModelToolCall, ModelTurn, Provider, ProviderRequest};
use toolrelay_core::tool::{ToolCatalog, ToolDescriptor};

pub fn tool_call(id: &str, vendor_name: &str, arguments: Value) -> ModelToolCall {
    ModelToolCall {
        id: id.into(),
        vendor_name: vendor_name.into(),
        arguments,
    }
}

pub fn tool_use(calls: Vec<ModelToolCall>) -> ModelTurn {
    ModelTurn::from_parts(Vec::new(), calls, true, "scripted")
}

/// Replies with queued turns, then with `repeat` if set.
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<ModelTurn>>,
    repeat: Option<ModelTurn>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<ModelTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(turn: ModelTurn) -> Self {
        Self {
            repeat: Some(turn),
            ..Self::new(Vec::new())
        }
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ModelTurn, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let next = self.turns.lock().unwrap().pop_front();
        next.or_else(|| self.repeat.clone())
            .ok_or_else(|| ProviderError::MalformedResponse("script exhausted".into()))
    }
}

/// Returns every tool on search; answers invocations from a fixed table.
///
/// An argument `sleep_ms` delays the invocation.
pub struct ScriptedCatalog {
    tools: Vec<ToolDescriptor>,
    responses: HashMap<String, Result<Value, CatalogError>>,
    search_error: Option<CatalogError>,
    invocations: Mutex<Vec<(String, Value)>>,
}

impl ScriptedCatalog {
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        Self {
            tools,
            responses: HashMap::new(),
            search_error: None,
            invocations: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: CatalogError) -> Self {
        Self {
            search_error: Some(error),
            ..Self::new(Vec::new())
        }
    }

    pub fn with_response(mut self, name: &str, response: Result<Value, CatalogError>) -> Self {
        self.responses.insert(name.to_string(), response);
        self
    }

    pub fn invocations(&self) -> Vec<(String, Value)> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolCatalog for ScriptedCatalog {
    async fn search(&self, _query: &str, limit: usize) -> Result<Vec<ToolDescriptor>, CatalogError> {
        match &self.search_error {
            Some(e) => Err(e.clone()),
            None => Ok(self.tools.iter().take(limit).cloned().collect()),
        }
    }

    async fn invoke(&self, canonical_name: &str, arguments: Value) -> Result<Value, CatalogError> {
        if let Some(ms) = arguments.get("sleep_ms").and_then(Value::as_u64) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        self.invocations
            .lock()
            .unwrap()
            .push((canonical_name.to_string(), arguments));
        self.responses
            .get(canonical_name)
            .cloned()
            .unwrap_or_else(|| Err(CatalogError::NotFound(canonical_name.to_string())))
    }
}
