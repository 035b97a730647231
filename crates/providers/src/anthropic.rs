//! Anthropic native provider implementation.
//!
//! Uses Anthropic's Messages API directly (not OpenAI-compatible proxy).
//!
//! Features:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Native tool use with `tool_use` / `tool_result` content blocks

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use toolrelay_core::error::ProviderError;
use toolrelay_core::message::{ConversationTurn, Role, Segment};
use toolrelay_core::provider::*;
use tracing::debug;

use crate::http::{build_client, check_status, content_to_string, decode_json, transport_error};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            name: "anthropic".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: build_client(Duration::from_secs(300)),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Convert turns to Anthropic API format with content blocks.
    ///
    /// Consecutive tool results are folded into one `user` message; the API
    /// rejects two user messages in a row.
    fn to_api_messages(turns: &[ConversationTurn]) -> Vec<AnthropicMessage> {
        let mut result: Vec<AnthropicMessage> = Vec::new();

        for turn in turns {
            match turn.role {
                Role::User => {
                    result.push(AnthropicMessage {
                        role: "user".into(),
                        content: AnthropicContent::Text(turn.text()),
                    });
                }
                Role::Assistant => {
                    if turn.tool_calls().next().is_none() {
                        result.push(AnthropicMessage {
                            role: "assistant".into(),
                            content: AnthropicContent::Text(turn.text()),
                        });
                        continue;
                    }

                    let blocks = turn
                        .segments
                        .iter()
                        .filter_map(|seg| match seg {
                            Segment::Text { text } if !text.is_empty() => {
                                Some(ContentBlock::Text { text: text.clone() })
                            }
                            Segment::ToolCall {
                                tool_call_id,
                                tool_name,
                                arguments,
                            } => Some(ContentBlock::ToolUse {
                                id: tool_call_id.clone(),
                                name: tool_name.clone(),
                                input: arguments.clone(),
                            }),
                            _ => None,
                        })
                        .collect();

                    result.push(AnthropicMessage {
                        role: "assistant".into(),
                        content: AnthropicContent::Blocks(blocks),
                    });
                }
                Role::ToolResult => {
                    let blocks: Vec<ContentBlock> = turn
                        .segments
                        .iter()
                        .filter_map(|seg| match seg {
                            Segment::ToolResult {
                                tool_call_id,
                                content,
                                is_error,
                            } => Some(ContentBlock::ToolResult {
                                tool_use_id: tool_call_id.clone(),
                                content: content_to_string(content),
                                is_error: *is_error,
                            }),
                            _ => None,
                        })
                        .collect();

                    match result.last_mut() {
                        Some(AnthropicMessage {
                            role,
                            content: AnthropicContent::Blocks(existing),
                        }) if role == "user" => existing.extend(blocks),
                        _ => result.push(AnthropicMessage {
                            role: "user".into(),
                            content: AnthropicContent::Blocks(blocks),
                        }),
                    }
                }
            }
        }

        result
    }

    /// Convert vendor tool specs to Anthropic format.
    fn to_api_tools(tools: &[VendorToolSpec]) -> Vec<AnthropicTool> {
        tools
            .iter()
            .map(|t| AnthropicTool {
                name: t.vendor_name.clone(),
                description: t.description.clone(),
                input_schema: t.input_schema.clone(),
            })
            .collect()
    }

    /// Convert an Anthropic API response to a `ModelTurn`.
    fn response_to_model_turn(resp: AnthropicResponse) -> ModelTurn {
        let mut text_segments = Vec::new();
        let mut tool_calls = Vec::new();

        for block in resp.content {
            match block {
                ResponseContentBlock::Text { text } => text_segments.push(text),
                ResponseContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ModelToolCall {
                        id,
                        vendor_name: name,
                        arguments: input,
                    });
                }
                ResponseContentBlock::Other => {}
            }
        }

        let claims_tool_use = resp.stop_reason.as_deref() == Some("tool_use");

        ModelTurn::from_parts(text_segments, tool_calls, claims_tool_use, resp.model).with_usage(
            Usage {
                prompt_tokens: resp.usage.input_tokens,
                completion_tokens: resp.usage.output_tokens,
                total_tokens: resp.usage.input_tokens + resp.usage.output_tokens,
            },
        )
    }
}

#[async_trait]
impl toolrelay_core::Provider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ModelTurn, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NotConfigured(
                "anthropic: set ANTHROPIC_API_KEY or providers.anthropic.api_key".into(),
            ));
        }

        let url = format!("{}/v1/messages", self.base_url);
        let max_tokens = request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.turns),
            "max_tokens": max_tokens,
            "temperature": request.temperature,
        });

        if let Some(ref sys) = request.system_prompt {
            body["system"] = serde_json::json!(sys);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        debug!(provider = "anthropic", model = %request.model, tools = request.tools.len(), "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let response = check_status(response, "anthropic").await?;
        let api_resp: AnthropicResponse = decode_json(response, "anthropic").await?;

        Ok(Self::response_to_model_turn(api_resp))
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: AnthropicContent,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum AnthropicContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: String,
    content: Vec<ResponseContentBlock>,
    usage: AnthropicUsage,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    /// Thinking and other block kinds carry nothing the loop uses
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}
