//! OpenAI-compatible provider implementation.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, Fireworks AI,
//! and any OpenAI-compatible endpoint.
//!
//! Tool calls use native function calling: `tools[].function` in the
//! request, `tool_calls` with JSON-string arguments in the response, and one
//! `tool` message per result.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use toolrelay_core::error::ProviderError;
use toolrelay_core::message::{ConversationTurn, Role, Segment};
use toolrelay_core::provider::*;
use tracing::debug;

use crate::http::{build_client, check_status, content_to_string, decode_json, transport_error};

/// An OpenAI-compatible LLM provider.
///
/// This handles the vast majority of LLM providers since most expose
/// an OpenAI-compatible `/v1/chat/completions` endpoint.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: build_client(Duration::from_secs(120)),
        }
    }

    /// Create an OpenRouter provider (convenience constructor).
    pub fn openrouter(api_key: impl Into<String>) -> Self {
        Self::new("openrouter", "https://openrouter.ai/api/v1", api_key)
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama", // Ollama doesn't need a real key
        )
    }

    /// Convert turns to OpenAI API format.
    fn to_api_messages(system_prompt: Option<&str>, turns: &[ConversationTurn]) -> Vec<ApiMessage> {
        let mut messages = Vec::with_capacity(turns.len() + 1);

        if let Some(system) = system_prompt {
            messages.push(ApiMessage::text("system", system));
        }

        for turn in turns {
            match turn.role {
                Role::User => messages.push(ApiMessage::text("user", turn.text())),
                Role::Assistant => {
                    let tool_calls: Vec<ApiToolCall> = turn
                        .tool_calls()
                        .map(|(id, name, arguments)| ApiToolCall {
                            id: id.to_string(),
                            r#type: "function".into(),
                            function: ApiFunction {
                                name: name.to_string(),
                                arguments: arguments.to_string(),
                            },
                        })
                        .collect();

                    let text = turn.text();
                    messages.push(ApiMessage {
                        role: "assistant".into(),
                        content: (!text.is_empty() || tool_calls.is_empty()).then_some(text),
                        tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                        tool_call_id: None,
                    });
                }
                Role::ToolResult => {
                    for seg in &turn.segments {
                        if let Segment::ToolResult {
                            tool_call_id,
                            content,
                            ..
                        } = seg
                        {
                            messages.push(ApiMessage {
                                role: "tool".into(),
                                content: Some(content_to_string(content)),
                                tool_calls: None,
                                tool_call_id: Some(tool_call_id.clone()),
                            });
                        }
                    }
                }
            }
        }

        messages
    }

    /// Convert vendor tool specs to OpenAI API format.
    fn to_api_tools(tools: &[VendorToolSpec]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.vendor_name.clone(),
                    description: t.description.clone(),
                    parameters: t.input_schema.clone(),
                },
            })
            .collect()
    }

    /// Convert an API response to a `ModelTurn`.
    fn response_to_model_turn(api_response: ApiResponse) -> Result<ModelTurn, ProviderError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("No choices in response".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| -> Result<ModelToolCall, ProviderError> {
                let arguments = if tc.function.arguments.trim().is_empty() {
                    serde_json::json!({})
                } else {
                    serde_json::from_str(&tc.function.arguments).map_err(|e| {
                        ProviderError::MalformedResponse(format!(
                            "arguments for '{}' are not JSON: {e}",
                            tc.function.name
                        ))
                    })?
                };
                Ok(ModelToolCall {
                    id: tc.id,
                    vendor_name: tc.function.name,
                    arguments,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let claims_tool_use = choice.finish_reason.as_deref() == Some("tool_calls");
        let text = choice.message.content.into_iter().collect();

        let mut turn = ModelTurn::from_parts(text, tool_calls, claims_tool_use, api_response.model);
        if let Some(u) = api_response.usage {
            turn = turn.with_usage(Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });
        }
        Ok(turn)
    }
}

#[async_trait]
impl toolrelay_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ModelTurn, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(request.system_prompt.as_deref(), &request.turns),
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        debug!(provider = %self.name, model = %request.model, tools = request.tools.len(), "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status(response, &self.name).await?;
        let api_response: ApiResponse = decode_json(response, &self.name).await?;

        Self::response_to_model_turn(api_response)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl ApiMessage {
    fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
