//! `toolrelay chat` — Interactive or single-message chat mode.

use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use toolrelay_agent::{ControllerConfig, SessionManager, TurnError, TurnOutcome};
use toolrelay_config::AppConfig;
use toolrelay_core::error::ProviderError;
use toolrelay_core::event::EventBus;
use toolrelay_core::message::SessionId;

pub async fn run(message: Option<String>, session: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let provider = match toolrelay_providers::build_from_config(&config) {
        Ok(provider) => provider,
        Err(ProviderError::NotConfigured(reason)) => {
            print_key_help(&reason);
            return Err("No API key found. See above for setup instructions.".into());
        }
        Err(e) => return Err(format!("Failed to build provider: {e}").into()),
    };

    let catalog = super::load_catalog(&config).await?;
    let tool_count = catalog.len().await;

    let controller_config = ControllerConfig::from_app_config(&config);
    let model = controller_config.model.clone();
    let manager = SessionManager::with_components(
        provider.clone(),
        catalog,
        controller_config,
        Arc::new(EventBus::default()),
    );
    let session_id = session.map(|s| SessionId::from(&s)).unwrap_or_default();

    if let Some(msg) = message {
        // Single message mode
        eprint!("  Thinking...");
        let outcome = manager.submit_turn(&session_id, &msg).await;
        eprint!("\r              \r");
        let outcome = outcome?;
        for note in &outcome.commentary {
            eprintln!("  ({note})");
        }
        println!("{}", outcome.final_text);
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        toolrelay chat — Interactive Mode     ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", provider.name());
    println!("  Model:     {model}");
    println!("  Tools:     {tool_count} in catalog");
    println!("  Session:   {session_id}");
    println!();
    println!("  Type your message and press Enter.");
    println!("  Ctrl+C cancels a running turn; type 'exit' to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print!("  You > ");
    std::io::stdout().flush()?;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }
        if line.is_empty() {
            print!("  You > ");
            std::io::stdout().flush()?;
            continue;
        }

        let cancel = CancellationToken::new();
        let watcher = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    cancel.cancel();
                }
            })
        };

        eprint!("  ...");
        let result = manager
            .submit_turn_cancellable(&session_id, line, &cancel)
            .await;
        watcher.abort();
        eprint!("\r     \r");

        print_result(result);

        print!("  You > ");
        std::io::stdout().flush()?;
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}

fn print_result(result: Result<TurnOutcome, TurnError>) {
    match result {
        Ok(outcome) => {
            println!();
            for note in &outcome.commentary {
                println!("  ({note})");
            }
            for line in outcome.final_text.lines() {
                println!("  Assistant > {line}");
            }
            if outcome.tool_calls > 0 {
                println!(
                    "  [{} tool call(s) in {} round(s)]",
                    outcome.tool_calls, outcome.rounds
                );
            }
            println!();
        }
        Err(e) => {
            eprintln!("  [Error] {e}");
            if e.is_retryable() {
                eprintln!("  (the conversation is unchanged; you can send the message again)");
            }
            println!();
        }
    }
}

fn print_key_help(reason: &str) {
    eprintln!();
    eprintln!("  ERROR: {reason}");
    eprintln!();
    eprintln!("  Set one of these environment variables:");
    eprintln!("    export ANTHROPIC_API_KEY=sk-ant-...     (anthropic)");
    eprintln!("    export OPENAI_API_KEY=sk-...            (openai)");
    eprintln!("    export OPENROUTER_API_KEY=sk-or-v1-...  (openrouter)");
    eprintln!("    export TOOLRELAY_API_KEY=...            (any provider)");
    eprintln!();
    eprintln!("  Or add it to your config file:");
    eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
    eprintln!();
}
