//! Integration tests that invoke the real LLM CLI.
//!
//! These tests are `#[ignore]` by default. They require the `claude` CLI on
//! PATH with valid credentials.
//!
//! Run explicitly with:
//! ```bash
//! cargo test -p debate-agents --test cli_integration -- --ignored
//! ```

use std::time::Duration;

use debate_agents::claude_cli::{check_cli_available, invoke_claude, ClaudeCliConfig};
use debate_agents::test_support::sample_request;
use debate_agents::{Analyst, CliAnalyst};
use debate_models::config::default_personas;
use debate_models::{validate_opinion, PositionState};

fn config(model: &str, timeout_s: u64) -> ClaudeCliConfig {
    ClaudeCliConfig {
        command: "claude".to_string(),
        model: model.to_string(),
        timeout: Duration::from_secs(timeout_s),
    }
}

#[tokio::test]
#[ignore]
async fn cli_is_available() {
    assert!(
        check_cli_available("claude").await,
        "claude CLI not found on PATH"
    );
}

/// A real persona reply must survive the strict reply parser and the
/// position rules against a flat genesis state.
#[tokio::test]
#[ignore]
async fn persona_reply_is_a_legal_opinion() {
    if !check_cli_available("claude").await {
        eprintln!("Skipping: claude CLI not available");
        return;
    }

    let persona = default_personas().remove(0);
    let analyst = CliAnalyst::new(
        persona,
        "claude".to_string(),
        "claude-3-5-haiku-latest",
        Duration::from_secs(120),
    );
    let request = sample_request("MDfinAnalyst");

    let reply = analyst
        .evaluate(&request)
        .await
        .unwrap_or_else(|e| panic!("analyst reply was not usable: {e}"));

    let validated = validate_opinion(
        PositionState::of(&request.yesterday),
        reply.decision,
        reply.positionsize,
        reply.reported_position(),
    );
    assert!(validated.is_ok(), "illegal opinion from a flat state: {reply:?}");
    assert!(!reply.content.is_empty());
}

#[tokio::test]
#[ignore]
async fn cli_reports_errors_for_invalid_model() {
    if !check_cli_available("claude").await {
        eprintln!("Skipping: claude CLI not available");
        return;
    }

    let result = invoke_claude("You are a test.", "hello", &config("nonexistent-model-12345", 15)).await;
    assert!(result.is_err(), "Expected error for invalid model, got: {:?}", result.ok());
}
