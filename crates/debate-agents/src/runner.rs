use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use debate_data::DataReader;
use debate_models::{
    aggregate, compose_content, validate_opinion, Aggregation, AnalystRequest, DailyState,
    DebateKey, DebateSettings, Decision, Normalization, PositionState, PriceQuote,
    ProposerOpinion, RunMode, ValidatedOpinion,
};
use debate_store::{Ledger, StoreError};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::analyst::Analyst;
use crate::error::{AgentError, RunError};
use crate::transcript::write_transcript;

#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub expected_opinions: usize,
    pub run_mode: RunMode,
    /// Budget for the whole analyst phase of a day.
    pub total_timeout: Duration,
    pub timeseries_points: usize,
    pub transcript_dir: Option<PathBuf>,
}

impl From<&DebateSettings> for RunnerSettings {
    fn from(settings: &DebateSettings) -> Self {
        Self {
            expected_opinions: settings.expected_opinions,
            run_mode: settings.run_mode,
            total_timeout: Duration::from_secs(settings.total_timeout_seconds),
            timeseries_points: settings.timeseries_points,
            transcript_dir: settings.transcript_dir.as_ref().map(PathBuf::from),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalystStatus {
    Recorded {
        opinion_id: i64,
        decision: Decision,
        positionsize: Decimal,
        normalizations: Vec<Normalization>,
    },
    /// Written by an earlier run of the same day; reused as is.
    AlreadyRecorded,
    Failed {
        error: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalystOutcome {
    pub agent: String,
    pub elapsed_ms: u64,
    #[serde(flatten)]
    pub status: AnalystStatus,
}

impl AnalystOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, AnalystStatus::Failed { .. })
    }
}

/// Everything that happened on one trading day. Also the transcript format.
#[derive(Debug, Clone, Serialize)]
pub struct DayReport {
    pub date: NaiveDate,
    pub key: DebateKey,
    /// `None` when only the aggregation step ran.
    pub run_mode: Option<RunMode>,
    pub price: Option<PriceQuote>,
    pub outcomes: Vec<AnalystOutcome>,
    pub aggregation: Aggregation,
    pub state: DailyState,
    pub elapsed_ms: u64,
}

/// Inputs shared by every analyst of one day.
struct DayContext {
    key: DebateKey,
    company: String,
    date: NaiveDate,
    yesterday: DailyState,
    state_id: i64,
    price: PriceQuote,
    data: Arc<DataReader>,
    ledger: Arc<Ledger>,
    timeseries_points: usize,
}

/// Runs the daily debate for one track: collect opinions, aggregate, persist.
pub struct DebateRunner {
    key: DebateKey,
    company: String,
    analysts: Vec<Arc<dyn Analyst>>,
    data: Arc<DataReader>,
    ledger: Arc<Ledger>,
    settings: RunnerSettings,
}

impl DebateRunner {
    pub fn new(
        key: DebateKey,
        company: String,
        analysts: Vec<Arc<dyn Analyst>>,
        data: Arc<DataReader>,
        ledger: Arc<Ledger>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            key,
            company,
            analysts,
            data,
            ledger,
            settings,
        }
    }

    pub fn key(&self) -> &DebateKey {
        &self.key
    }

    /// Run a full day: every analyst, then aggregation.
    pub async fn run_day(&self, date: NaiveDate) -> Result<DayReport, RunError> {
        let start = Instant::now();
        let yesterday = self.yesterday(date)?;
        let state_id = yesterday.id.ok_or_else(|| {
            RunError::Store(StoreError::Corrupt(format!(
                "latest state of {} has no row id",
                self.key
            )))
        })?;
        info!(
            key = %self.key,
            date = %date,
            yesterday = %yesterday.date,
            positionsize = %yesterday.positionsize,
            analysts = self.analysts.len(),
            "Starting debate day"
        );

        // Without today's price no opinion can be priced; nothing is fabricated.
        let price = self.data.latest_open(&self.key.ticker).await?;
        if price.date != date {
            warn!(key = %self.key, date = %date, price_date = %price.date, "Newest price is not from the run date");
        }

        let committed: HashSet<String> = self
            .ledger
            .opinions_for(date, &self.key)?
            .into_iter()
            .map(|o| o.agent)
            .collect();

        let mut outcomes = Vec::new();
        let mut pending = Vec::new();
        for analyst in &self.analysts {
            if committed.contains(analyst.name()) {
                info!(agent = %analyst.name(), "Opinion already recorded, reusing");
                outcomes.push(AnalystOutcome {
                    agent: analyst.name().to_string(),
                    elapsed_ms: 0,
                    status: AnalystStatus::AlreadyRecorded,
                });
            } else {
                pending.push(Arc::clone(analyst));
            }
        }

        let ctx = Arc::new(DayContext {
            key: self.key.clone(),
            company: self.company.clone(),
            date,
            yesterday: yesterday.clone(),
            state_id,
            price: price.clone(),
            data: Arc::clone(&self.data),
            ledger: Arc::clone(&self.ledger),
            timeseries_points: self.settings.timeseries_points,
        });

        let deadline = Instant::now() + self.settings.total_timeout;
        let ran = match self.settings.run_mode {
            RunMode::Sequential => self.run_sequential(pending, ctx, deadline).await,
            RunMode::Parallel => self.run_parallel(pending, ctx, deadline).await,
        };
        outcomes.extend(ran);

        let failed = outcomes.iter().filter(|o| o.is_failure()).count();
        if failed > 0 {
            warn!(key = %self.key, failed, total = outcomes.len(), "Some analysts produced no opinion");
        }

        let (aggregation, state) = self.finish_day(&yesterday, date, Some(price.open.to_string()))?;
        let report = DayReport {
            date,
            key: self.key.clone(),
            run_mode: Some(self.settings.run_mode),
            price: Some(price),
            outcomes,
            aggregation,
            state,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        record_transcript(&self.settings, &report);
        Ok(report)
    }

    /// Aggregate opinions already committed for `date` without running any analyst.
    pub async fn aggregate_day(&self, date: NaiveDate) -> Result<DayReport, RunError> {
        aggregate_committed(&self.ledger, &self.key, &self.settings, date)
    }

    fn yesterday(&self, date: NaiveDate) -> Result<DailyState, RunError> {
        prior_state(&self.ledger, &self.key, date)
    }

    async fn run_sequential(
        &self,
        pending: Vec<Arc<dyn Analyst>>,
        ctx: Arc<DayContext>,
        deadline: Instant,
    ) -> Vec<AnalystOutcome> {
        let mut outcomes = Vec::with_capacity(pending.len());
        for analyst in pending {
            let agent = analyst.name().to_string();
            if Instant::now() >= deadline {
                outcomes.push(self.timed_out(agent));
                continue;
            }
            match tokio::time::timeout_at(deadline, run_analyst(analyst, Arc::clone(&ctx))).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(_) => outcomes.push(self.timed_out(agent)),
            }
        }
        outcomes
    }

    async fn run_parallel(
        &self,
        pending: Vec<Arc<dyn Analyst>>,
        ctx: Arc<DayContext>,
        deadline: Instant,
    ) -> Vec<AnalystOutcome> {
        let handles: Vec<_> = pending
            .into_iter()
            .map(|analyst| {
                let agent = analyst.name().to_string();
                (agent, tokio::spawn(run_analyst(analyst, Arc::clone(&ctx))))
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (agent, mut handle) in handles {
            match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(Ok(outcome)) => outcomes.push(outcome),
                Ok(Err(e)) => {
                    error!(agent = %agent, error = %e, "Analyst task panicked");
                    outcomes.push(AnalystOutcome {
                        agent,
                        elapsed_ms: 0,
                        status: AnalystStatus::Failed {
                            error: format!("task failed: {e}"),
                        },
                    });
                }
                Err(_) => {
                    handle.abort();
                    outcomes.push(self.timed_out(agent));
                }
            }
        }
        outcomes
    }

    fn timed_out(&self, agent: String) -> AnalystOutcome {
        let seconds = self.settings.total_timeout.as_secs();
        warn!(agent = %agent, timeout_s = seconds, "Total timeout reached before analyst finished");
        AnalystOutcome {
            agent,
            elapsed_ms: 0,
            status: AnalystStatus::Failed {
                error: format!("total timeout of {seconds}s reached"),
            },
        }
    }

    fn finish_day(
        &self,
        yesterday: &DailyState,
        date: NaiveDate,
        price: Option<String>,
    ) -> Result<(Aggregation, DailyState), RunError> {
        close_day(&self.ledger, &self.key, self.settings.expected_opinions, yesterday, date, price)
    }
}

/// Close a day from the opinions already in the ledger. Needs no market data.
pub fn aggregate_committed(
    ledger: &Ledger,
    key: &DebateKey,
    settings: &RunnerSettings,
    date: NaiveDate,
) -> Result<DayReport, RunError> {
    let start = Instant::now();
    let yesterday = prior_state(ledger, key, date)?;
    let (aggregation, state) = close_day(ledger, key, settings.expected_opinions, &yesterday, date, None)?;
    let report = DayReport {
        date,
        key: key.clone(),
        run_mode: None,
        price: None,
        outcomes: Vec::new(),
        aggregation,
        state,
        elapsed_ms: start.elapsed().as_millis() as u64,
    };
    record_transcript(settings, &report);
    Ok(report)
}

fn prior_state(ledger: &Ledger, key: &DebateKey, date: NaiveDate) -> Result<DailyState, RunError> {
    let yesterday = ledger
        .latest_state(key)?
        .ok_or_else(|| RunError::NoPriorState(key.to_string()))?;
    if yesterday.date >= date {
        return Err(RunError::AlreadyRecorded {
            key: key.to_string(),
            date: yesterday.date,
        });
    }
    Ok(yesterday)
}

/// Read back the day's opinions, aggregate them and append today's state.
fn close_day(
    ledger: &Ledger,
    key: &DebateKey,
    expected_opinions: usize,
    yesterday: &DailyState,
    date: NaiveDate,
    price: Option<String>,
) -> Result<(Aggregation, DailyState), RunError> {
    let opinions = ledger.opinions_for(date, key)?;
    let aggregation = aggregate(yesterday, &opinions, expected_opinions)?;
    for n in &aggregation.normalizations {
        warn!(agent = %n.agent, normalization = ?n.normalization, "Normalized opinion during aggregation");
    }

    let price = price
        .or_else(|| opinions.first().map(|o| o.price.clone()))
        .unwrap_or_else(|| "-".to_string());
    let content = compose_content(&opinions);
    let mut state = aggregation
        .clone()
        .into_daily_state(yesterday, content, price);
    let id = ledger.insert_daily_state(&state)?;
    state.id = Some(id);

    info!(
        key = %key,
        date = %date,
        decision = %state.decision,
        tied = aggregation.tied,
        buy = aggregation.tally.buy,
        sell = aggregation.tally.sell,
        hold = aggregation.tally.hold,
        positionsize = %state.positionsize,
        "Recorded daily state"
    );
    Ok((aggregation, state))
}

/// The day is already committed here, so a failed write is only logged.
fn record_transcript(settings: &RunnerSettings, report: &DayReport) {
    if let Some(dir) = &settings.transcript_dir {
        if let Err(e) = write_transcript(dir, report) {
            warn!(key = %report.key, date = %report.date, dir = %dir.display(), error = %e, "Failed to write transcript");
        }
    }
}

async fn run_analyst(analyst: Arc<dyn Analyst>, ctx: Arc<DayContext>) -> AnalystOutcome {
    let start = Instant::now();
    let agent = analyst.name().to_string();

    let status = match record_opinion(analyst.as_ref(), &ctx).await {
        Ok((opinion_id, validated)) => {
            info!(
                agent = %agent,
                decision = %validated.decision,
                positionsize = %validated.positionsize,
                elapsed_ms = start.elapsed().as_millis(),
                "Opinion recorded"
            );
            AnalystStatus::Recorded {
                opinion_id,
                decision: validated.decision,
                positionsize: validated.positionsize,
                normalizations: validated.normalizations,
            }
        }
        Err(AgentError::Store(StoreError::DuplicateOpinion { .. })) => {
            info!(agent = %agent, "Opinion was recorded concurrently, reusing");
            AnalystStatus::AlreadyRecorded
        }
        Err(e) => {
            warn!(agent = %agent, error = %e, elapsed_ms = start.elapsed().as_millis(), "Analyst failed");
            AnalystStatus::Failed {
                error: e.to_string(),
            }
        }
    };

    AnalystOutcome {
        agent,
        elapsed_ms: start.elapsed().as_millis() as u64,
        status,
    }
}

/// Build the request, ask the analyst, check the reply against yesterday, write it.
async fn record_opinion(
    analyst: &dyn Analyst,
    ctx: &DayContext,
) -> Result<(i64, ValidatedOpinion), AgentError> {
    let persona = analyst.persona();
    let ticker = &ctx.key.ticker;

    let data = ctx.data.snapshot(ticker, &persona.folders).await?;
    let open_series = if persona.include_timeseries {
        Some(ctx.data.open_series(ticker, ctx.timeseries_points).await?)
    } else {
        None
    };

    let request = AnalystRequest {
        request_id: Uuid::new_v4(),
        date: ctx.date,
        key: ctx.key.clone(),
        company: ctx.company.clone(),
        agent: analyst.name().to_string(),
        yesterday: ctx.yesterday.clone(),
        price: ctx.price.clone(),
        data,
        open_series,
    };
    debug!(agent = %request.agent, request_id = %request.request_id, "Evaluating");

    let reply = analyst.evaluate(&request).await?;
    let validated = validate_opinion(
        PositionState::of(&ctx.yesterday),
        reply.decision,
        reply.positionsize,
        reply.reported_position(),
    )?;
    for n in &validated.normalizations {
        warn!(agent = %request.agent, normalization = ?n, "Normalized analyst reply");
    }

    let opinion = ProposerOpinion {
        key: ctx.state_id,
        date: ctx.date,
        ticker: ctx.key.ticker.clone(),
        agent: request.agent.clone(),
        model: ctx.key.model.clone(),
        version: ctx.key.version.clone(),
        content: reply.content,
        decision: validated.decision,
        price: ctx.price.open.to_string(),
        position: validated.position,
        positionsize: validated.positionsize,
    };
    let id = ctx.ledger.insert_opinion(&opinion)?;
    Ok((id, validated))
}
