//! HTTP-backed tools.
//!
//! A call template names the endpoint; the model's arguments become query
//! parameters (GET) or the JSON body (everything else). `${VAR}` placeholders
//! in the URL and header values are filled in when the tool is called, so
//! secrets never appear in the manifest or in tool descriptors.

use async_trait::async_trait;
use regex_lite::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;
use toolrelay_core::error::CatalogError;
use tracing::{debug, warn};

use crate::static_catalog::ToolHandler;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
});

/// Where an HTTP tool sends its request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpCall {
    pub url: String,

    #[serde(default = "default_method", alias = "http_method")]
    pub method: String,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Invokes one [`HttpCall`].
pub struct HttpHandler {
    tool_name: String,
    call: HttpCall,
    variables: HashMap<String, String>,
    client: reqwest::Client,
}

impl HttpHandler {
    pub fn new(tool_name: impl Into<String>, call: HttpCall) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            tool_name: tool_name.into(),
            call,
            variables: HashMap::new(),
            client,
        }
    }

    /// Variables consulted before the process environment.
    pub fn with_variables(mut self, variables: HashMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    fn lookup(&self, key: &str) -> Option<String> {
        self.variables
            .get(key)
            .cloned()
            .or_else(|| std::env::var(key).ok())
    }

    /// Replace every `${VAR}`; an unset variable is an invocation error.
    fn substitute(&self, template: &str) -> Result<String, CatalogError> {
        let mut missing: Option<String> = None;
        let out = PLACEHOLDER.replace_all(template, |caps: &Captures| {
            let key = &caps[1];
            match self.lookup(key) {
                Some(v) => v,
                None => {
                    missing.get_or_insert_with(|| key.to_string());
                    String::new()
                }
            }
        });

        match missing {
            Some(key) => Err(CatalogError::Invocation {
                tool_name: self.tool_name.clone(),
                reason: format!("variable '{key}' is not set"),
            }),
            None => Ok(out.into_owned()),
        }
    }

    fn invocation_error(&self, reason: impl Into<String>) -> CatalogError {
        CatalogError::Invocation {
            tool_name: self.tool_name.clone(),
            reason: reason.into(),
        }
    }
}

/// Scalar arguments as query pairs; nested values are sent as JSON text.
fn query_pairs(arguments: &Value) -> Vec<(String, String)> {
    match arguments {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), v)
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl ToolHandler for HttpHandler {
    async fn call(&self, arguments: Value) -> Result<Value, CatalogError> {
        let arguments = match arguments {
            Value::Null => Value::Object(Default::default()),
            Value::Object(_) => arguments,
            other => {
                return Err(CatalogError::InvalidArguments(format!(
                    "{} expects a JSON object, got {other}",
                    self.tool_name
                )));
            }
        };
        let url = self.substitute(&self.call.url)?;
        let method = reqwest::Method::from_bytes(self.call.method.to_uppercase().as_bytes())
            .map_err(|_| self.invocation_error(format!("invalid HTTP method '{}'", self.call.method)))?;

        let mut request = self.client.request(method.clone(), &url);
        for (name, value) in &self.call.headers {
            request = request.header(name, self.substitute(value)?);
        }

        request = if method == reqwest::Method::GET {
            request.query(&query_pairs(&arguments))
        } else {
            request.json(&arguments)
        };

        debug!(tool = %self.tool_name, %method, "Calling HTTP tool");

        let response = request.send().await.map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                CatalogError::Unreachable(format!("{}: {e}", self.tool_name))
            } else {
                self.invocation_error(e.to_string())
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.invocation_error(e.to_string()))?;

        if !status.is_success() {
            return Err(self.invocation_error(format!("HTTP {}: {}", status.as_u16(), body.trim())));
        }

        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}
