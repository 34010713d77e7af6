use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::AgentError;

/// How one analyst invokes the LLM CLI.
#[derive(Debug, Clone)]
pub struct ClaudeCliConfig {
    /// Executable to run. Anything accepting the `claude -p` argument shape works.
    pub command: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for ClaudeCliConfig {
    fn default() -> Self {
        Self {
            command: "claude".to_string(),
            model: "claude-3-5-haiku-latest".to_string(),
            timeout: Duration::from_secs(180),
        }
    }
}

/// Invoke the CLI with a system prompt and user prompt.
/// Returns the raw stdout text.
pub async fn invoke_claude(
    system_prompt: &str,
    user_prompt: &str,
    config: &ClaudeCliConfig,
) -> Result<String, AgentError> {
    debug!(command = %config.command, model = %config.model, prompt_len = user_prompt.len(), "Invoking LLM CLI");

    let result = tokio::time::timeout(config.timeout, async {
        Command::new(&config.command)
            .args([
                "-p",
                user_prompt,
                "--system-prompt",
                system_prompt,
                "--model",
                &config.model,
                "--output-format",
                "text",
            ])
            .kill_on_drop(true)
            .output()
            .await
    })
    .await
    .map_err(|_| AgentError::Timeout(config.timeout.as_secs()))?
    .map_err(|e| AgentError::Cli(format!("Failed to spawn {}: {e}", config.command)))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        warn!(status = %result.status, stderr = %stderr, "LLM CLI failed");
        return Err(AgentError::Cli(format!(
            "{} exited {}: {}",
            config.command, result.status, stderr
        )));
    }

    let stdout = String::from_utf8_lossy(&result.stdout).to_string();
    if stdout.trim().is_empty() {
        return Err(AgentError::Cli("CLI returned empty response".to_string()));
    }

    Ok(stdout)
}

/// Check if the CLI is available on the system.
pub async fn check_cli_available(command: &str) -> bool {
    match Command::new(command).arg("--version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ClaudeCliConfig::default();
        assert_eq!(config.command, "claude");
        assert_eq!(config.timeout, Duration::from_secs(180));
    }

    #[tokio::test]
    async fn missing_command_is_a_cli_error() {
        let config = ClaudeCliConfig {
            command: "definitely-not-an-llm-cli".to_string(),
            ..ClaudeCliConfig::default()
        };
        let err = invoke_claude("system", "user", &config).await.unwrap_err();
        assert!(matches!(err, AgentError::Cli(_)));
        assert!(!check_cli_available("definitely-not-an-llm-cli").await);
    }
}
