use std::time::Duration;

use async_trait::async_trait;
use debate_models::{AnalystReply, AnalystRequest, PersonaConfig};

use crate::claude_cli::{invoke_claude, ClaudeCliConfig};
use crate::error::AgentError;
use crate::parser::parse_analyst_reply;
use crate::prompts::render_system_prompt;

/// One debate participant. Mockable for testing.
#[async_trait]
pub trait Analyst: Send + Sync {
    fn name(&self) -> &str;
    fn persona(&self) -> &PersonaConfig;

    async fn evaluate(&self, request: &AnalystRequest) -> Result<AnalystReply, AgentError>;
}

/// An analyst backed by the LLM CLI.
pub struct CliAnalyst {
    pub persona: PersonaConfig,
    pub cli_config: ClaudeCliConfig,
}

impl CliAnalyst {
    pub fn new(persona: PersonaConfig, command: String, default_model: &str, timeout: Duration) -> Self {
        let model = persona
            .model
            .clone()
            .unwrap_or_else(|| default_model.to_string());
        Self {
            persona,
            cli_config: ClaudeCliConfig {
                command,
                model,
                timeout,
            },
        }
    }
}

#[async_trait]
impl Analyst for CliAnalyst {
    fn name(&self) -> &str {
        &self.persona.name
    }

    fn persona(&self) -> &PersonaConfig {
        &self.persona
    }

    async fn evaluate(&self, request: &AnalystRequest) -> Result<AnalystReply, AgentError> {
        if !self.persona.enabled {
            return Err(AgentError::Disabled(self.persona.name.clone()));
        }

        let system_prompt = render_system_prompt(&self.persona, &request.key.ticker, &request.company);
        let user_prompt = serde_json::to_string_pretty(request)?;
        let raw_output = invoke_claude(&system_prompt, &user_prompt, &self.cli_config).await?;
        parse_analyst_reply(&raw_output)
    }
}
