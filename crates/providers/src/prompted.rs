//! Prompted tool calling for endpoints without native tool support.
//!
//! Wraps any [`Provider`] and never sends it tool definitions. Instead the
//! tool list goes into the system prompt together with an instruction to
//! answer with `{"tool_name": ..., "arguments": {...}}`, and the reply text
//! is scanned for that object.
//!
//! Extraction order: a fenced ```` ```json ```` block first, then the first
//! bare JSON object carrying both keys. Anything else is a plain answer.

use async_trait::async_trait;
use regex_lite::Regex;
use serde_json::Value;
use std::sync::{Arc, LazyLock};
use toolrelay_core::error::ProviderError;
use toolrelay_core::message::{ConversationTurn, Role, Segment};
use toolrelay_core::naming::NamePolicy;
use toolrelay_core::provider::*;
use tracing::debug;

use crate::http::content_to_string;

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```json\s*(\{.*?\})\s*```").expect("fenced JSON pattern is valid")
});

const TOOL_INSTRUCTION: &str = "When you need to use a tool, you MUST respond with a JSON object \
with 'tool_name' and 'arguments' keys. Do not add any other text. The arguments must be a JSON object. \
For example: {\"tool_name\": \"some_tool\", \"arguments\": {\"arg1\": \"value1\"}}.";

/// A provider adapter that emulates tool calling through the prompt.
pub struct PromptedProvider {
    name: String,
    inner: Arc<dyn Provider>,
}

impl PromptedProvider {
    pub fn new(inner: Arc<dyn Provider>) -> Self {
        Self {
            name: format!("{}+prompted", inner.name()),
            inner,
        }
    }

    /// System prompt with the tool list appended.
    fn build_system_prompt(base: Option<&str>, tools: &[VendorToolSpec]) -> Option<String> {
        if tools.is_empty() {
            return base.map(str::to_string);
        }

        let listing: Vec<Value> = tools
            .iter()
            .map(|t| {
                serde_json::json!({
                    "name": t.vendor_name,
                    "description": t.description,
                    "inputs": t.input_schema,
                })
            })
            .collect();
        let listing = serde_json::to_string_pretty(&listing).unwrap_or_default();

        let base = base.unwrap_or("You are a helpful assistant.");
        Some(format!(
            "{base}\n\n{TOOL_INSTRUCTION}\nHere are the available tools:\n{listing}"
        ))
    }

    /// Rewrite tool-call and tool-result turns as plain text.
    fn flatten_turns(turns: &[ConversationTurn]) -> Vec<ConversationTurn> {
        let mut result: Vec<ConversationTurn> = Vec::with_capacity(turns.len());
        let mut pending_outputs: Vec<String> = Vec::new();

        for turn in turns {
            match turn.role {
                Role::ToolResult => {
                    for seg in &turn.segments {
                        if let Segment::ToolResult { content, .. } = seg {
                            pending_outputs.push(content_to_string(content));
                        }
                    }
                    continue;
                }
                Role::User => {
                    Self::flush_outputs(&mut result, &mut pending_outputs);
                    result.push(turn.clone());
                }
                Role::Assistant => {
                    Self::flush_outputs(&mut result, &mut pending_outputs);
                    let mut lines: Vec<String> = Vec::new();
                    let text = turn.text();
                    if !text.is_empty() {
                        lines.push(text);
                    }
                    for (_, name, arguments) in turn.tool_calls() {
                        lines.push(
                            serde_json::json!({"tool_name": name, "arguments": arguments})
                                .to_string(),
                        );
                    }
                    result.push(ConversationTurn::assistant(lines.join("\n")));
                }
            }
        }

        Self::flush_outputs(&mut result, &mut pending_outputs);
        result
    }

    fn flush_outputs(result: &mut Vec<ConversationTurn>, outputs: &mut Vec<String>) {
        if outputs.is_empty() {
            return;
        }
        let joined = outputs.drain(..).collect::<Vec<_>>().join("\n");
        result.push(ConversationTurn::user(format!(
            "Tool output: {joined}\nPlease use the tool output to answer the user's request."
        )));
    }

    /// Find a `{"tool_name", "arguments"}` object in model text.
    ///
    /// Returns the call and the text with the JSON removed.
    pub fn extract_tool_call(text: &str) -> Option<(ModelToolCall, String)> {
        if let Some(caps) = FENCED_JSON.captures(text) {
            let whole = caps.get(0)?;
            let body = caps.get(1)?;
            if let Some(call) = Self::parse_call(body.as_str()) {
                let rest = format!("{}{}", &text[..whole.start()], &text[whole.end()..]);
                return Some((call, rest.trim().to_string()));
            }
        }

        for (start, ch) in text.char_indices() {
            if ch != '{' {
                continue;
            }
            let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
            if let Some(Ok(value)) = stream.next() {
                let end = start + stream.byte_offset();
                if let Some(call) = Self::call_from_value(value) {
                    let rest = format!("{}{}", &text[..start], &text[end..]);
                    return Some((call, rest.trim().to_string()));
                }
            }
        }

        None
    }

    fn parse_call(json: &str) -> Option<ModelToolCall> {
        serde_json::from_str::<Value>(json)
            .ok()
            .and_then(Self::call_from_value)
    }

    fn call_from_value(value: Value) -> Option<ModelToolCall> {
        let mut obj = match value {
            Value::Object(obj) => obj,
            _ => return None,
        };
        let tool_name = obj.get("tool_name")?.as_str()?.to_string();
        let arguments = obj.remove("arguments")?;
        if !arguments.is_object() {
            return None;
        }
        Some(ModelToolCall {
            id: format!("call_{}", uuid::Uuid::new_v4().simple()),
            vendor_name: tool_name,
            arguments,
        })
    }
}

#[async_trait]
impl Provider for PromptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn name_policy(&self) -> NamePolicy {
        self.inner.name_policy()
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ModelTurn, ProviderError> {
        let inner_request = ProviderRequest {
            system_prompt: Self::build_system_prompt(request.system_prompt.as_deref(), &request.tools),
            turns: Self::flatten_turns(&request.turns),
            tools: Vec::new(),
            ..request
        };

        let reply = self.inner.complete(inner_request).await?;
        if reply.is_error() || !reply.tool_calls.is_empty() {
            return Ok(reply);
        }

        let text = reply.joined_text();
        let mut turn = match Self::extract_tool_call(&text) {
            Some((call, rest)) => {
                debug!(provider = %self.name, tool = %call.vendor_name, "Extracted prompted tool call");
                ModelTurn::from_parts(vec![rest], vec![call], true, reply.model)
            }
            None => ModelTurn::from_parts(vec![text], Vec::new(), false, reply.model),
        };
        turn.usage = reply.usage;
        Ok(turn)
    }
}
