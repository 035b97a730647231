//! Conversation turn domain types.
//!
//! A conversation is an append-only sequence of turns. Each turn is attributed
//! to the user, the assistant, or a tool result, and carries an ordered list of
//! segments: plain text, tool calls requested by the assistant, or the result
//! of one tool call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a session (one controller, one history).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who a turn is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// The end user
    User,
    /// The model
    Assistant,
    /// The outcome of one tool call, fed back to the model
    ToolResult,
}

/// One piece of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    Text {
        text: String,
    },

    /// A tool call requested by the assistant. `tool_name` is the vendor name
    /// the model used, since the history is replayed to the same vendor.
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },

    ToolResult {
        tool_call_id: String,
        content: serde_json::Value,
        #[serde(default)]
        is_error: bool,
    },
}

/// A single turn in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: String,
    pub role: Role,
    pub segments: Vec<Segment>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    fn with_segments(role: Role, segments: Vec<Segment>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            segments,
            timestamp: Utc::now(),
        }
    }

    /// Create a user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_segments(Role::User, vec![Segment::Text { text: text.into() }])
    }

    /// Create a plain-text assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_segments(Role::Assistant, vec![Segment::Text { text: text.into() }])
    }

    /// Create an assistant turn from arbitrary segments (commentary + tool calls).
    pub fn assistant_segments(segments: Vec<Segment>) -> Self {
        Self::with_segments(Role::Assistant, segments)
    }

    /// Create a tool-result turn answering `tool_call_id`.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        content: serde_json::Value,
        is_error: bool,
    ) -> Self {
        Self::with_segments(
            Role::ToolResult,
            vec![Segment::ToolResult {
                tool_call_id: tool_call_id.into(),
                content,
                is_error,
            }],
        )
    }

    /// All text segments joined with newlines.
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Tool call segments as `(id, name, arguments)`.
    pub fn tool_calls(&self) -> impl Iterator<Item = (&str, &str, &serde_json::Value)> {
        self.segments.iter().filter_map(|s| match s {
            Segment::ToolCall {
                tool_call_id,
                tool_name,
                arguments,
            } => Some((tool_call_id.as_str(), tool_name.as_str(), arguments)),
            _ => None,
        })
    }

    /// The call id this turn answers, if it is a tool result.
    pub fn answered_call_id(&self) -> Option<&str> {
        self.segments.iter().find_map(|s| match s {
            Segment::ToolResult { tool_call_id, .. } => Some(tool_call_id.as_str()),
            _ => None,
        })
    }
}

/// Append-only ordered turns of one session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationHistory {
    turns: Vec<ConversationTurn>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: Vec<ConversationTurn>) -> Self {
        Self { turns }
    }

    pub fn push(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    pub fn extend(&mut self, turns: impl IntoIterator<Item = ConversationTurn>) {
        self.turns.extend(turns);
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    pub fn into_turns(self) -> Vec<ConversationTurn> {
        self.turns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_user_turn() {
        let turn = ConversationTurn::user("Where is my order?");
        assert_eq!(turn.role, Role::User);
        assert_eq!(turn.text(), "Where is my order?");
        assert_eq!(turn.tool_calls().count(), 0);
    }

    #[test]
    fn assistant_segments_keep_order() {
        let turn = ConversationTurn::assistant_segments(vec![
            Segment::Text { text: "Let me check.".into() },
            Segment::ToolCall {
                tool_call_id: "call_1".into(),
                tool_name: "orders_lookup".into(),
                arguments: json!({"order_id": "A1"}),
            },
        ]);
        assert_eq!(turn.text(), "Let me check.");
        let calls: Vec<_> = turn.tool_calls().collect();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "call_1");
        assert_eq!(calls[0].1, "orders_lookup");
    }

    #[test]
    fn tool_result_answers_call() {
        let turn = ConversationTurn::tool_result("call_9", json!({"status": "shipped"}), false);
        assert_eq!(turn.role, Role::ToolResult);
        assert_eq!(turn.answered_call_id(), Some("call_9"));
    }

    #[test]
    fn segment_serialization_is_tagged() {
        let seg = Segment::ToolResult {
            tool_call_id: "c".into(),
            content: json!({"error": "not found"}),
            is_error: true,
        };
        let value = serde_json::to_value(&seg).unwrap();
        assert_eq!(value["type"], "tool_result");
        assert_eq!(value["content"]["error"], "not found");
    }

    #[test]
    fn history_serde_preserves_turns() {
        let mut history = ConversationHistory::new();
        history.push(ConversationTurn::user("hi"));
        history.push(ConversationTurn::assistant("hello"));

        let json = serde_json::to_string(&history).unwrap();
        let restored: ConversationHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.turns()[1].text(), "hello");
    }
}
