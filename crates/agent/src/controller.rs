//! The per-session orchestration state machine.
//!
//! One user turn drives one pass:
//! `AwaitingInput → Searching → Completing → (ExecutingTools → FollowUpCompleting)* → PlainAnswer`.
//!
//! A turn runs against a staged copy of the history and name mapping. Both
//! are committed only when the turn reaches a plain answer, so a failed or
//! cancelled turn leaves the session exactly as it was.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use toolrelay_config::AppConfig;
use toolrelay_core::error::{CatalogError, ProviderError};
use toolrelay_core::event::{DomainEvent, EventBus};
use toolrelay_core::message::{ConversationHistory, ConversationTurn, Segment, SessionId};
use toolrelay_core::provider::{ModelTurn, Provider, ProviderRequest, StopReason, VendorToolSpec};
use toolrelay_core::tool::ToolCatalog;
use tracing::{debug, info, warn};

use crate::invoker::ToolInvoker;
use crate::translator::{NameMapping, SchemaTranslator, TranslateError};

/// Where a session is in its current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    AwaitingInput,
    Searching,
    Completing,
    ExecutingTools,
    FollowUpCompleting,
    PlainAnswer,
    Error,
}

impl std::fmt::Display for ControllerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::AwaitingInput => "awaiting_input",
            Self::Searching => "searching",
            Self::Completing => "completing",
            Self::ExecutingTools => "executing_tools",
            Self::FollowUpCompleting => "follow_up_completing",
            Self::PlainAnswer => "plain_answer",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Why a turn did not reach a plain answer.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("tool discovery failed: {0}")]
    Discovery(CatalogError),

    #[error("model completion failed: {0}")]
    Completion(ProviderError),

    #[error(transparent)]
    NameCollision(#[from] TranslateError),

    #[error("the model was still calling tools after {max_rounds} round(s)")]
    RoundLimitExceeded { max_rounds: u32 },

    #[error("turn cancelled")]
    Cancelled,
}

impl TurnError {
    /// Whether submitting the same user text again may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Discovery(_) | Self::Cancelled => true,
            Self::Completion(e) => !matches!(
                e,
                ProviderError::AuthenticationFailed(_)
                    | ProviderError::NotConfigured(_)
                    | ProviderError::ModelNotFound(_)
            ),
            Self::NameCollision(_) | Self::RoundLimitExceeded { .. } => false,
        }
    }
}

/// The result of a turn that reached a plain answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub final_text: String,

    /// Text the model produced alongside tool calls, in order
    pub commentary: Vec<String>,

    /// Tool execution rounds the turn took
    pub rounds: u32,

    /// Tool calls executed across all rounds
    pub tool_calls: usize,
}

/// History and name mapping of one session, serialized together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub turns: ConversationHistory,
    pub mapping: NameMapping,
}

/// Knobs of the loop.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
    pub search_limit: usize,
    pub max_rounds: u32,
    pub parallel_tool_calls: bool,
    pub tool_timeout: Option<Duration>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-20250514".into(),
            temperature: 0.7,
            max_tokens: None,
            system_prompt: None,
            search_limit: 10,
            max_rounds: 5,
            parallel_tool_calls: true,
            tool_timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl ControllerConfig {
    /// Resolve loop settings for the configured default provider.
    pub fn from_app_config(config: &AppConfig) -> Self {
        let model = config
            .providers
            .get(&config.default_provider)
            .and_then(|p| p.default_model.clone())
            .unwrap_or_else(|| config.default_model.clone());

        let orchestration = &config.orchestration;
        Self {
            model,
            temperature: config.default_temperature,
            max_tokens: Some(config.default_max_tokens),
            system_prompt: orchestration.system_prompt.clone(),
            search_limit: orchestration.search_limit,
            max_rounds: orchestration.max_rounds,
            parallel_tool_calls: orchestration.parallel_tool_calls,
            tool_timeout: match orchestration.tool_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

/// Drives one session's turns through discovery, completion and tool rounds.
pub struct ConversationController {
    session_id: SessionId,

    provider: Arc<dyn Provider>,

    catalog: Arc<dyn ToolCatalog>,

    translator: SchemaTranslator,

    invoker: ToolInvoker,

    config: ControllerConfig,

    /// Committed history
    history: ConversationHistory,

    /// Committed vendor/canonical name mapping
    mapping: NameMapping,

    state: ControllerState,

    event_bus: Arc<EventBus>,
}

impl ConversationController {
    pub fn new(
        session_id: SessionId,
        provider: Arc<dyn Provider>,
        catalog: Arc<dyn ToolCatalog>,
        mut config: ControllerConfig,
    ) -> Self {
        config.max_rounds = config.max_rounds.max(1);
        let translator = SchemaTranslator::new(provider.name_policy());
        let invoker = ToolInvoker::new(catalog.clone())
            .with_parallel(config.parallel_tool_calls)
            .with_timeout(config.tool_timeout);

        Self {
            session_id,
            provider,
            catalog,
            translator,
            invoker,
            config,
            history: ConversationHistory::new(),
            mapping: NameMapping::new(),
            state: ControllerState::AwaitingInput,
            event_bus: Arc::new(EventBus::default()),
        }
    }

    /// Publish events to a shared bus instead of a private one.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.config.max_rounds = max_rounds.max(1);
        self
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.config.search_limit = limit;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_parallel_tool_calls(mut self, parallel: bool) -> Self {
        self.config.parallel_tool_calls = parallel;
        self.invoker = ToolInvoker::new(self.catalog.clone())
            .with_parallel(parallel)
            .with_timeout(self.config.tool_timeout);
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.tool_timeout = timeout;
        self.invoker = ToolInvoker::new(self.catalog.clone())
            .with_parallel(self.config.parallel_tool_calls)
            .with_timeout(timeout);
        self
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn mapping(&self) -> &NameMapping {
        &self.mapping
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id.clone(),
            turns: self.history.clone(),
            mapping: self.mapping.clone(),
        }
    }

    /// Replace history and mapping with those of `snapshot`.
    pub fn restore(&mut self, snapshot: SessionSnapshot) {
        debug!(
            session_id = %self.session_id,
            turns = snapshot.turns.len(),
            tools = snapshot.mapping.len(),
            "Restoring session"
        );
        self.history = snapshot.turns;
        self.mapping = snapshot.mapping;
        self.state = ControllerState::AwaitingInput;
    }

    /// Run one user turn to a plain answer.
    pub async fn submit_turn(&mut self, user_text: &str) -> Result<TurnOutcome, TurnError> {
        self.submit_turn_cancellable(user_text, &CancellationToken::new()).await
    }

    /// Like [`submit_turn`](Self::submit_turn), abandoned when `cancel` fires.
    ///
    /// Tool calls already running finish in the background; their results
    /// are dropped.
    pub async fn submit_turn_cancellable(
        &mut self,
        user_text: &str,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, TurnError> {
        info!(
            session_id = %self.session_id,
            history_len = self.history.len(),
            "Processing user turn"
        );
        self.event_bus.publish(DomainEvent::TurnStarted {
            session_id: self.session_id.to_string(),
            content_preview: user_text.chars().take(100).collect(),
            timestamp: Utc::now(),
        });

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TurnError::Cancelled),
            result = self.run_turn(user_text) => result,
        };

        match &result {
            Ok(outcome) => {
                info!(
                    session_id = %self.session_id,
                    rounds = outcome.rounds,
                    tool_calls = outcome.tool_calls,
                    "Turn completed"
                );
                self.event_bus.publish(DomainEvent::TurnCompleted {
                    session_id: self.session_id.to_string(),
                    rounds: outcome.rounds,
                    tool_calls: outcome.tool_calls,
                    timestamp: Utc::now(),
                });
                self.transition(ControllerState::AwaitingInput);
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Turn failed");
                self.transition(ControllerState::Error);
                self.event_bus.publish(DomainEvent::TurnFailed {
                    session_id: self.session_id.to_string(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
                self.transition(ControllerState::AwaitingInput);
            }
        }

        result
    }

    /// The state machine proper. Commits history and mapping on success only.
    async fn run_turn(&mut self, user_text: &str) -> Result<TurnOutcome, TurnError> {
        let mut staged_turns = vec![ConversationTurn::user(user_text)];
        let mut staged_mapping = self.mapping.clone();

        // Discovery
        self.transition(ControllerState::Searching);
        let descriptors = self
            .catalog
            .search(user_text, self.config.search_limit)
            .await
            .map_err(TurnError::Discovery)?;

        debug!(session_id = %self.session_id, tools = descriptors.len(), "Tools discovered");
        self.event_bus.publish(DomainEvent::ToolsDiscovered {
            session_id: self.session_id.to_string(),
            tool_names: descriptors.iter().map(|d| d.name.clone()).collect(),
            timestamp: Utc::now(),
        });

        let translation = self.translator.translate(&descriptors, &staged_mapping)?;
        staged_mapping.merge(translation.mapping)?;
        let specs = translation.specs;

        self.transition(ControllerState::Completing);

        let mut rounds: u32 = 0;
        let mut commentary = Vec::new();
        let mut tool_calls = 0;

        loop {
            let request = self.build_request(&staged_turns, &specs);
            let turn = self.provider.complete_turn(request).await;
            self.record_completion(&turn);

            match turn.stop_reason {
                StopReason::Error(e) => return Err(TurnError::Completion(e)),

                StopReason::Text => {
                    let final_text = turn.joined_text();
                    staged_turns.push(ConversationTurn::assistant(final_text.clone()));

                    self.transition(ControllerState::PlainAnswer);
                    self.history.extend(staged_turns);
                    self.mapping = staged_mapping;

                    return Ok(TurnOutcome {
                        final_text,
                        commentary,
                        rounds,
                        tool_calls,
                    });
                }

                StopReason::ToolUse => {
                    if rounds >= self.config.max_rounds {
                        return Err(TurnError::RoundLimitExceeded {
                            max_rounds: self.config.max_rounds,
                        });
                    }
                    rounds += 1;
                    self.transition(ControllerState::ExecutingTools);

                    for text in &turn.text_segments {
                        info!(session_id = %self.session_id, round = rounds, "Model commentary: {text}");
                        self.event_bus.publish(DomainEvent::CommentaryEmitted {
                            session_id: self.session_id.to_string(),
                            round: rounds,
                            text: text.clone(),
                            timestamp: Utc::now(),
                        });
                    }
                    commentary.extend(turn.text_segments.iter().cloned());

                    let mut segments: Vec<Segment> = turn
                        .text_segments
                        .iter()
                        .map(|text| Segment::Text { text: text.clone() })
                        .collect();
                    segments.extend(turn.tool_calls.iter().map(|call| Segment::ToolCall {
                        tool_call_id: call.id.clone(),
                        tool_name: call.vendor_name.clone(),
                        arguments: call.arguments.clone(),
                    }));
                    staged_turns.push(ConversationTurn::assistant_segments(segments));

                    debug!(
                        session_id = %self.session_id,
                        round = rounds,
                        calls = turn.tool_calls.len(),
                        "Executing tool calls"
                    );
                    let outcomes = self.invoker.invoke_all(&turn.tool_calls, &staged_mapping).await;
                    tool_calls += outcomes.len();

                    for outcome in outcomes {
                        self.event_bus.publish(DomainEvent::ToolInvoked {
                            session_id: self.session_id.to_string(),
                            call_id: outcome.call_id.clone(),
                            vendor_name: outcome.vendor_name.clone(),
                            canonical_name: outcome.canonical_name.clone(),
                            success: outcome.result.is_ok(),
                            duration_ms: outcome.duration_ms,
                            timestamp: Utc::now(),
                        });
                        staged_turns.push(ConversationTurn::tool_result(
                            outcome.call_id,
                            outcome.result.to_content(),
                            !outcome.result.is_ok(),
                        ));
                    }

                    self.transition(ControllerState::FollowUpCompleting);
                }
            }
        }
    }

    fn build_request(&self, staged: &[ConversationTurn], specs: &[VendorToolSpec]) -> ProviderRequest {
        let turns = self
            .history
            .turns()
            .iter()
            .chain(staged.iter())
            .cloned()
            .collect();

        ProviderRequest {
            model: self.config.model.clone(),
            turns,
            tools: specs.to_vec(),
            system_prompt: self.config.system_prompt.clone(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }

    fn record_completion(&self, turn: &ModelTurn) {
        let stop_reason = match &turn.stop_reason {
            StopReason::Text => "text",
            StopReason::ToolUse => "tool_use",
            StopReason::Error(_) => "error",
        };
        debug!(
            session_id = %self.session_id,
            model = %turn.model,
            stop_reason,
            tool_calls = turn.tool_calls.len(),
            "Completion received"
        );
        self.event_bus.publish(DomainEvent::CompletionReceived {
            session_id: self.session_id.to_string(),
            model: turn.model.clone(),
            stop_reason: stop_reason.into(),
            tool_calls: turn.tool_calls.len(),
            tokens_used: turn.usage.as_ref().map(|u| u.total_tokens),
            timestamp: Utc::now(),
        });
    }

    fn transition(&mut self, to: ControllerState) {
        if self.state == to {
            return;
        }
        let from = std::mem::replace(&mut self.state, to);
        self.event_bus.publish(DomainEvent::StateChanged {
            session_id: self.session_id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            timestamp: Utc::now(),
        });
    }
}
