//! Scripted analysts and fixtures for runner tests.
//!
//! `ScriptedAnalyst` skips the LLM entirely: it returns a fixed reply (or a
//! fixed failure) and remembers every request it was given, so tests can
//! assert on what the runner handed each persona.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use debate_models::{
    AnalystReply, AnalystRequest, DailyState, DataFolder, DebateKey, Decision, PersonaConfig,
    PriceQuote,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::analyst::Analyst;
use crate::error::AgentError;

enum Script {
    Reply(AnalystReply),
    Fail(String),
}

pub struct ScriptedAnalyst {
    persona: PersonaConfig,
    script: Script,
    delay: Option<Duration>,
    requests: Mutex<Vec<AnalystRequest>>,
}

impl ScriptedAnalyst {
    pub fn reply(name: &str, decision: Decision, positionsize: Decimal) -> Self {
        Self {
            persona: scripted_persona(name),
            script: Script::Reply(AnalystReply {
                decision,
                positionsize,
                position: None,
                content: format!("{name} proposes {decision} at {positionsize}"),
            }),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn buy(name: &str, positionsize: Decimal) -> Self {
        Self::reply(name, Decision::Buy, positionsize)
    }

    pub fn sell(name: &str, positionsize: Decimal) -> Self {
        Self::reply(name, Decision::Sell, positionsize)
    }

    pub fn hold(name: &str, positionsize: Decimal) -> Self {
        Self::reply(name, Decision::Hold, positionsize)
    }

    pub fn failing(name: &str) -> Self {
        let mut analyst = Self::hold(name, Decimal::ZERO);
        analyst.script = Script::Fail(format!("{name} is unavailable"));
        analyst
    }

    /// Report a `position` flag explicitly instead of leaving it to be derived.
    pub fn with_position_flag(mut self, position: bool) -> Self {
        if let Script::Reply(reply) = &mut self.script {
            reply.position = Some(position);
        }
        self
    }

    pub fn with_persona(mut self, folders: &[DataFolder], include_timeseries: bool) -> Self {
        self.persona.folders = folders.to_vec();
        self.persona.include_timeseries = include_timeseries;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far, in call order.
    pub fn requests(&self) -> Vec<AnalystRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Analyst for ScriptedAnalyst {
    fn name(&self) -> &str {
        &self.persona.name
    }

    fn persona(&self) -> &PersonaConfig {
        &self.persona
    }

    async fn evaluate(&self, request: &AnalystRequest) -> Result<AnalystReply, AgentError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.script {
            Script::Reply(reply) => Ok(reply.clone()),
            Script::Fail(message) => Err(AgentError::Cli(message.clone())),
        }
    }
}

fn scripted_persona(name: &str) -> PersonaConfig {
    PersonaConfig {
        name: name.to_string(),
        template_version: 1,
        folders: vec![DataFolder::Historical],
        include_timeseries: false,
        instructions: format!("You are {name}."),
        enabled: true,
        model: None,
    }
}

/// HistoricalData records in the ingestion layout (`Date` as `%d-%m-%Y`).
pub fn historical_records(opens: &[(NaiveDate, f64)]) -> Vec<Value> {
    opens
        .iter()
        .map(|(date, open)| {
            json!({
                "Date": date.format("%d-%m-%Y").to_string(),
                "Open": open,
                "Close": open,
            })
        })
        .collect()
}

/// A request for the TSLA track with a flat genesis state.
pub fn sample_request(agent: &str) -> AnalystRequest {
    let key = DebateKey::new("TSLA", "GPT3.5", "V2");
    let date = NaiveDate::from_ymd_opt(2024, 4, 4).unwrap_or_default();
    let mut yesterday = DailyState::genesis(&key, date.pred_opt().unwrap_or(date));
    yesterday.id = Some(1);

    AnalystRequest {
        request_id: Uuid::new_v4(),
        date,
        key,
        company: "Tesla".to_string(),
        agent: agent.to_string(),
        yesterday,
        price: PriceQuote {
            ticker: "TSLA".to_string(),
            open: Decimal::new(17175, 2),
            date,
        },
        data: json!({"HistoricalData": [{"Date": "04-04-2024", "Open": 171.75}]}),
        open_series: None,
    }
}
