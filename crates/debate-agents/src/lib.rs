pub mod analyst;
pub mod claude_cli;
pub mod error;
pub mod parser;
pub mod prompts;
pub mod runner;
pub mod transcript;

pub mod test_support;

pub use analyst::{Analyst, CliAnalyst};
pub use error::{AgentError, RunError};
pub use runner::{
    aggregate_committed, AnalystOutcome, AnalystStatus, DayReport, DebateRunner, RunnerSettings,
};
