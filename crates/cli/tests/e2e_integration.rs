//! End-to-end integration tests for the toolrelay orchestration loop.
//!
//! These tests exercise the full pipeline from user text to final answer:
//! catalog search, schema translation, provider adapters, tool invocation
//! and the follow-up completion.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use toolrelay_agent::{ControllerConfig, ConversationController, SessionManager, TurnError};
use toolrelay_catalog::{StaticCatalog, handler_fn, load_manifest};
use toolrelay_config::AppConfig;
use toolrelay_core::error::{CatalogError, ProviderError};
use toolrelay_core::event::{DomainEvent, EventBus};
use toolrelay_core::message::{Segment, SessionId};
use toolrelay_core::provider::{ModelToolCall, ModelTurn, Provider, ProviderRequest};
use toolrelay_core::tool::ToolDescriptor;
use toolrelay_providers::{OpenAiCompatProvider, PromptedProvider};

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted turns in sequence.
struct ScriptedProvider {
    turns: Mutex<VecDeque<ModelTurn>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(turns: Vec<ModelTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn tool_then_text(calls: Vec<ModelToolCall>, answer: &str) -> Self {
        Self::new(vec![
            ModelTurn::from_parts(Vec::new(), calls, true, "mock"),
            ModelTurn::text(answer),
        ])
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ModelTurn, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let next = self.turns.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| panic!("ScriptedProvider exhausted")))
    }
}

fn make_tool_call(id: &str, name: &str, args: Value) -> ModelToolCall {
    ModelToolCall {
        id: id.into(),
        vendor_name: name.into(),
        arguments: args,
    }
}

async fn orders_catalog() -> Arc<StaticCatalog> {
    let catalog = StaticCatalog::new();
    catalog
        .register(
            ToolDescriptor::new(
                "orders.lookup",
                "Find the shipping status of a customer order",
                json!({
                    "type": "object",
                    "properties": {"order_id": {"type": "string"}},
                    "required": ["order_id"]
                }),
            )
            .with_tags(["order", "shipping"]),
            handler_fn(|args| async move {
                match args["order_id"].as_str() {
                    Some("A1") => Ok(json!({"status": "shipped"})),
                    _ => Err(CatalogError::Remote("not found".into())),
                }
            }),
        )
        .await;
    catalog
        .register(
            ToolDescriptor::new("weather.today", "Current weather for a city", json!({}))
                .with_tags(["forecast"]),
            handler_fn(|_| async { Ok(json!({"temp_c": 21})) }),
        )
        .await;
    Arc::new(catalog)
}

// ── Local HTTP server ────────────────────────────────────────────────────

/// Serve one canned response per connection, in order. Yields raw requests.
async fn serve_sequence(responses: Vec<(u16, String)>) -> (String, tokio::task::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let mut requests = Vec::new();
        for (status, body) in responses {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 8192];
            while !request_complete(&raw) {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            requests.push(String::from_utf8_lossy(&raw).into_owned());
        }
        requests
    });
    (format!("http://{addr}"), handle)
}

fn request_complete(raw: &[u8]) -> bool {
    let text = String::from_utf8_lossy(raw);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let content_length = text[..header_end]
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    raw.len() >= header_end + 4 + content_length
}

fn request_body(raw: &str) -> Value {
    let body = raw.split_once("\r\n\r\n").map(|(_, b)| b).unwrap_or_default();
    serde_json::from_str(body).unwrap()
}

// ── E2E: scripted model ──────────────────────────────────────────────────

#[tokio::test]
async fn e2e_orders_lookup_scenario() {
    let provider = Arc::new(ScriptedProvider::tool_then_text(
        vec![make_tool_call("call_1", "orders_lookup", json!({"order_id": "A1"}))],
        "Your order A1 has shipped.",
    ));
    let mut controller = ConversationController::new(
        SessionId::from("e2e"),
        provider.clone(),
        orders_catalog().await,
        ControllerConfig::default(),
    );

    let outcome = controller.submit_turn("Where is my order A1?").await.unwrap();
    assert!(outcome.final_text.contains("shipped"));

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].tools[0].vendor_name, "orders_lookup");
    assert_eq!(
        requests[0].tools[0].input_schema,
        json!({"type": "object", "properties": {"order_id": {"type": "string"}}, "required": ["order_id"]})
    );

    let follow_up = &requests[1].turns;
    match &follow_up[2].segments[0] {
        Segment::ToolResult { tool_call_id, content, is_error } => {
            assert_eq!(tool_call_id, "call_1");
            assert_eq!(content, &json!({"status": "shipped"}));
            assert!(!is_error);
        }
        other => panic!("expected a tool result, got {other:?}"),
    }
}

#[tokio::test]
async fn e2e_not_found_reaches_plain_answer() {
    let provider = Arc::new(ScriptedProvider::tool_then_text(
        vec![make_tool_call("call_1", "orders_lookup", json!({"order_id": "Q7"}))],
        "I couldn't find order Q7.",
    ));
    let mut controller = ConversationController::new(
        SessionId::from("e2e"),
        provider.clone(),
        orders_catalog().await,
        ControllerConfig::default(),
    );

    let outcome = controller.submit_turn("Where is my order Q7?").await.unwrap();
    assert_eq!(outcome.final_text, "I couldn't find order Q7.");

    let follow_up = &provider.requests()[1].turns;
    match &follow_up[2].segments[0] {
        Segment::ToolResult { content, is_error, .. } => {
            assert_eq!(content, &json!({"error": "not found"}));
            assert!(is_error);
        }
        other => panic!("expected a tool result, got {other:?}"),
    }
}

#[tokio::test]
async fn e2e_events_follow_state_machine() {
    let provider = Arc::new(ScriptedProvider::tool_then_text(
        vec![make_tool_call("call_1", "orders_lookup", json!({"order_id": "A1"}))],
        "Shipped.",
    ));
    let bus = Arc::new(EventBus::new(128));
    let mut rx = bus.subscribe();
    let manager = SessionManager::with_components(
        provider,
        orders_catalog().await,
        ControllerConfig::default(),
        bus,
    );

    manager.submit_turn(&SessionId::from("s1"), "order A1").await.unwrap();

    let mut states = Vec::new();
    let mut invoked = 0;
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.session_id(), "s1");
        match event.as_ref() {
            DomainEvent::StateChanged { to, .. } => states.push(to.clone()),
            DomainEvent::ToolInvoked { canonical_name, success, .. } => {
                assert_eq!(canonical_name, "orders.lookup");
                assert!(success);
                invoked += 1;
            }
            _ => {}
        }
    }
    assert_eq!(invoked, 1);
    assert_eq!(
        states,
        vec![
            "searching",
            "completing",
            "executing_tools",
            "follow_up_completing",
            "plain_answer",
            "awaiting_input",
        ]
    );
}

#[tokio::test]
async fn e2e_round_limit_is_reported() {
    let always_tool: Vec<ModelTurn> = (0..3)
        .map(|i| {
            ModelTurn::from_parts(
                Vec::new(),
                vec![make_tool_call(&format!("call_{i}"), "weather_today", json!({}))],
                true,
                "mock",
            )
        })
        .collect();
    let provider = Arc::new(ScriptedProvider::new(always_tool));
    let mut controller = ConversationController::new(
        SessionId::from("e2e"),
        provider.clone(),
        orders_catalog().await,
        ControllerConfig::default(),
    )
    .with_max_rounds(2);

    let err = controller.submit_turn("weather forecast").await.unwrap_err();
    assert!(matches!(err, TurnError::RoundLimitExceeded { max_rounds: 2 }));
    assert_eq!(provider.requests().len(), 3);
    assert!(controller.history().is_empty());
}

// ── E2E: real adapters over HTTP ─────────────────────────────────────────

#[tokio::test]
async fn e2e_openai_compatible_adapter_round_trip() {
    let tool_call_response = json!({
        "model": "gpt-test",
        "choices": [{
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_abc",
                    "type": "function",
                    "function": {"name": "orders_lookup", "arguments": "{\"order_id\":\"A1\"}"}
                }]
            },
            "finish_reason": "tool_calls"
        }],
        "usage": {"prompt_tokens": 20, "completion_tokens": 8, "total_tokens": 28}
    });
    let answer_response = json!({
        "model": "gpt-test",
        "choices": [{
            "message": {"role": "assistant", "content": "Order A1 has shipped."},
            "finish_reason": "stop"
        }]
    });
    let (url, server) = serve_sequence(vec![
        (200, tool_call_response.to_string()),
        (200, answer_response.to_string()),
    ])
    .await;

    let provider = Arc::new(OpenAiCompatProvider::new("test", url, "sk-test"));
    let mut controller = ConversationController::new(
        SessionId::from("http"),
        provider,
        orders_catalog().await,
        ControllerConfig {
            model: "gpt-test".into(),
            ..ControllerConfig::default()
        },
    )
    .with_system_prompt("You help customers track orders.");

    let outcome = controller.submit_turn("Where is order A1?").await.unwrap();
    assert_eq!(outcome.final_text, "Order A1 has shipped.");
    assert_eq!(outcome.tool_calls, 1);

    let requests = server.await.unwrap();
    let first = request_body(&requests[0]);
    assert_eq!(first["messages"][0]["role"], "system");
    assert_eq!(first["tools"][0]["function"]["name"], "orders_lookup");

    let second = request_body(&requests[1]);
    let messages = second["messages"].as_array().unwrap();
    let tool_message = messages.iter().find(|m| m["role"] == "tool").unwrap();
    assert_eq!(tool_message["tool_call_id"], "call_abc");
    let content: Value = serde_json::from_str(tool_message["content"].as_str().unwrap()).unwrap();
    assert_eq!(content, json!({"status": "shipped"}));
}

#[tokio::test]
async fn e2e_provider_error_keeps_session_retryable() {
    let (url, _server) = serve_sequence(vec![(500, r#"{"error":"boom"}"#.into())]).await;
    let provider = Arc::new(OpenAiCompatProvider::new("test", url, "sk-test"));
    let mut controller = ConversationController::new(
        SessionId::from("http"),
        provider,
        orders_catalog().await,
        ControllerConfig::default(),
    );

    let err = controller.submit_turn("Where is order A1?").await.unwrap_err();
    assert!(matches!(err, TurnError::Completion(ProviderError::ApiError { status_code: 500, .. })));
    assert!(err.is_retryable());
    assert!(controller.history().is_empty());
}

#[tokio::test]
async fn e2e_prompted_adapter_extracts_tool_call() {
    let inner = Arc::new(ScriptedProvider::new(vec![
        ModelTurn::text(
            "I'll look that up.\n```json\n{\"tool_name\": \"orders_lookup\", \"arguments\": {\"order_id\": \"A1\"}}\n```",
        ),
        ModelTurn::text("Good news: order A1 has shipped."),
    ]));
    let provider = Arc::new(PromptedProvider::new(inner.clone()));
    let mut controller = ConversationController::new(
        SessionId::from("prompted"),
        provider,
        orders_catalog().await,
        ControllerConfig::default(),
    );

    let outcome = controller.submit_turn("Where is order A1?").await.unwrap();
    assert!(outcome.final_text.contains("shipped"));
    assert_eq!(outcome.commentary, vec!["I'll look that up.".to_string()]);

    let requests = inner.requests();
    assert!(requests[0].tools.is_empty());
    assert!(requests[0].system_prompt.as_deref().unwrap().contains("orders_lookup"));
    let last = requests[1].turns.last().unwrap().text();
    assert!(last.starts_with("Tool output:"));
    assert!(last.contains("shipped"));
}

#[tokio::test]
async fn e2e_manifest_catalog_calls_http_tool() {
    let (tool_url, tool_server) = serve_sequence(vec![(200, r#"{"status":"shipped"}"#.into())]).await;
    let manifest = json!({
        "tools": [{
            "name": "orders.lookup",
            "description": "Find the shipping status of an order",
            "inputs": {"type": "object", "properties": {"order_id": {"type": "string"}}},
            "tags": ["order"],
            "call": {"type": "http", "url": format!("{tool_url}/orders"), "method": "GET"}
        }]
    });
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(manifest.to_string().as_bytes()).unwrap();
    let catalog = Arc::new(load_manifest(file.path()).await.unwrap());

    let provider = Arc::new(ScriptedProvider::tool_then_text(
        vec![make_tool_call("call_1", "orders_lookup", json!({"order_id": "A1"}))],
        "It has shipped.",
    ));
    let mut controller = ConversationController::new(
        SessionId::from("manifest"),
        provider,
        catalog,
        ControllerConfig::default(),
    );

    controller.submit_turn("order A1 status").await.unwrap();

    let requests = tool_server.await.unwrap();
    assert!(requests[0].starts_with("GET /orders?order_id=A1 "));
}

// ── E2E: configuration ───────────────────────────────────────────────────

#[tokio::test]
async fn e2e_config_file_drives_controller() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(
        br#"
default_provider = "openai"

[orchestration]
search_limit = 1
max_rounds = 1
tool_timeout_secs = 0

[providers.openai]
default_model = "gpt-4o-mini"
"#,
    )
    .unwrap();
    let config = AppConfig::load_from(file.path()).unwrap();
    let controller_config = ControllerConfig::from_app_config(&config);
    assert_eq!(controller_config.model, "gpt-4o-mini");
    assert_eq!(controller_config.search_limit, 1);
    assert_eq!(controller_config.tool_timeout, None);

    let provider = Arc::new(ScriptedProvider::new(vec![ModelTurn::text("ok")]));
    let mut controller = ConversationController::new(
        SessionId::from("cfg"),
        provider.clone(),
        orders_catalog().await,
        controller_config,
    );
    controller.submit_turn("shipping forecast").await.unwrap();

    let requests = provider.requests();
    assert_eq!(requests[0].model, "gpt-4o-mini");
    assert_eq!(requests[0].tools.len(), 1);
}
