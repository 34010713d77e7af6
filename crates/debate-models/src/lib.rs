pub mod aggregate;
pub mod agent_message;
pub mod config;
pub mod decision;
pub mod folder;
pub mod position;
pub mod schema;
pub mod state;

pub use aggregate::{aggregate, compose_content, AggregateError, Aggregation, AgentNormalization, Tally};
pub use agent_message::{AnalystReply, AnalystRequest, PriceQuote};
pub use config::{ConfigError, DataConfig, DebateConfig, DebateSettings, PersonaConfig, RunMode, StoreConfig};
pub use decision::{Decision, DecisionParseError, Vote};
pub use folder::DataFolder;
pub use position::{
    max_position_size, validate_opinion, Action, Normalization, PositionError, PositionState,
    Transition, ValidatedOpinion, MAX_POSITION_SHARES,
};
pub use state::{DailyState, DebateKey, ProposerOpinion, GENESIS_CONTENT};
