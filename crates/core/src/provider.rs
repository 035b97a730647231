//! Provider trait — the abstraction over model gateways.
//!
//! A Provider knows how to send a conversation plus a set of vendor tool specs
//! to one LLM vendor and normalize whatever comes back into a [`ModelTurn`].
//!
//! Implementations: Anthropic Messages API, OpenAI-compatible chat
//! completions, and a prompted JSON adapter for endpoints without native tool
//! calling.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::message::ConversationTurn;
use crate::naming::NamePolicy;

/// Everything a provider needs for one completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "claude-sonnet-4-20250514", "gpt-4o-mini")
    pub model: String,

    /// Full conversation history, oldest first
    pub turns: Vec<ConversationTurn>,

    /// Tools the model may call, already in vendor naming
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<VendorToolSpec>,

    /// Optional system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A tool as presented to one vendor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorToolSpec {
    /// Name in the vendor's alphabet, within its length limit
    pub vendor_name: String,

    pub description: String,

    /// Projected schema: `{"type":"object","properties":..,"required":..}`
    pub input_schema: serde_json::Value,
}

/// A tool call the model asked for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelToolCall {
    pub id: String,
    pub vendor_name: String,
    pub arguments: serde_json::Value,
}

/// Why the model stopped.
#[derive(Debug, Clone)]
pub enum StopReason {
    /// Plain answer, no tool use
    Text,
    /// One or more tool calls requested
    ToolUse,
    /// Transport failure or a response that could not be understood
    Error(ProviderError),
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A vendor-neutral model response.
#[derive(Debug, Clone)]
pub struct ModelTurn {
    pub text_segments: Vec<String>,
    pub tool_calls: Vec<ModelToolCall>,
    pub stop_reason: StopReason,
    pub usage: Option<Usage>,
    /// Which model actually responded (may differ from requested)
    pub model: String,
}

impl ModelTurn {
    /// Classify a parsed response.
    ///
    /// Tool calls always win. A vendor that claims tool use without any tool
    /// call blocks produced a malformed response.
    pub fn from_parts(
        text_segments: Vec<String>,
        tool_calls: Vec<ModelToolCall>,
        vendor_claims_tool_use: bool,
        model: impl Into<String>,
    ) -> Self {
        let text_segments: Vec<String> = text_segments
            .into_iter()
            .filter(|t| !t.trim().is_empty())
            .collect();

        let stop_reason = if !tool_calls.is_empty() {
            StopReason::ToolUse
        } else if vendor_claims_tool_use {
            StopReason::Error(ProviderError::MalformedResponse(
                "stop reason is tool use but no tool calls were returned".into(),
            ))
        } else {
            StopReason::Text
        };

        Self {
            text_segments,
            tool_calls,
            stop_reason,
            usage: None,
            model: model.into(),
        }
    }

    /// A plain text turn.
    pub fn text(text: impl Into<String>) -> Self {
        Self::from_parts(vec![text.into()], Vec::new(), false, "")
    }

    /// A turn describing a failure.
    pub fn failed(error: ProviderError) -> Self {
        Self {
            text_segments: Vec::new(),
            tool_calls: Vec::new(),
            stop_reason: StopReason::Error(error),
            usage: None,
            model: String::new(),
        }
    }

    pub fn with_usage(mut self, usage: Usage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Text segments joined with newlines.
    pub fn joined_text(&self) -> String {
        self.text_segments.join("\n")
    }

    pub fn is_error(&self) -> bool {
        matches!(self.stop_reason, StopReason::Error(_))
    }
}

/// The core Provider trait.
///
/// Adapters implement `complete()` and may fail with `?`; the orchestration
/// loop calls `complete_turn()`, which never fails and folds errors into
/// [`StopReason::Error`]. Providers do not retry.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "anthropic", "openai").
    fn name(&self) -> &str;

    /// Tool-name rules of this vendor.
    fn name_policy(&self) -> NamePolicy {
        NamePolicy::default()
    }

    /// Send a request and normalize the response.
    async fn complete(&self, request: ProviderRequest) -> Result<ModelTurn, ProviderError>;

    /// Send a request; failures become an error turn.
    async fn complete_turn(&self, request: ProviderRequest) -> ModelTurn {
        match self.complete(request).await {
            Ok(turn) => turn,
            Err(e) => ModelTurn::failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(id: &str) -> ModelToolCall {
        ModelToolCall {
            id: id.into(),
            vendor_name: "orders_lookup".into(),
            arguments: json!({"order_id": "A1"}),
        }
    }

    #[test]
    fn plain_text_classified_as_text() {
        let turn = ModelTurn::from_parts(vec!["Hello".into()], vec![], false, "m");
        assert!(matches!(turn.stop_reason, StopReason::Text));
        assert_eq!(turn.joined_text(), "Hello");
    }

    #[test]
    fn tool_calls_win_over_vendor_stop_reason() {
        // OpenAI-compatible servers sometimes report "stop" alongside tool calls
        let turn = ModelTurn::from_parts(vec!["Checking".into()], vec![call("c1")], false, "m");
        assert!(matches!(turn.stop_reason, StopReason::ToolUse));
        assert_eq!(turn.text_segments, vec!["Checking".to_string()]);
    }

    #[test]
    fn claimed_tool_use_without_calls_is_malformed() {
        let turn = ModelTurn::from_parts(vec![], vec![], true, "m");
        match turn.stop_reason {
            StopReason::Error(ProviderError::MalformedResponse(msg)) => {
                assert!(msg.contains("no tool calls"));
            }
            other => panic!("expected malformed error, got {other:?}"),
        }
    }

    #[test]
    fn blank_text_segments_dropped() {
        let turn = ModelTurn::from_parts(vec!["  ".into(), "x".into()], vec![], false, "m");
        assert_eq!(turn.text_segments, vec!["x".to_string()]);
    }

    struct Failing;

    #[async_trait]
    impl Provider for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        async fn complete(&self, _request: ProviderRequest) -> Result<ModelTurn, ProviderError> {
            Err(ProviderError::Network("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn complete_turn_folds_errors() {
        let request = ProviderRequest {
            model: "m".into(),
            turns: vec![],
            tools: vec![],
            system_prompt: None,
            temperature: default_temperature(),
            max_tokens: None,
        };
        let turn = Failing.complete_turn(request).await;
        assert!(turn.is_error());
        assert!(turn.tool_calls.is_empty());
    }

    #[test]
    fn vendor_tool_spec_serialization() {
        let spec = VendorToolSpec {
            vendor_name: "orders_lookup".into(),
            description: "Look up an order".into(),
            input_schema: json!({"type": "object", "properties": {}, "required": []}),
        };
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("orders_lookup"));
    }
}
