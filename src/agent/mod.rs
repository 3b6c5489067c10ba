//! Agent module: SQL guard, tool registry, and turn orchestration

pub mod guard;
pub mod orchestrator;
pub mod tools;

pub use guard::{clean_and_correct_sql, VettedSql};
pub use orchestrator::{Orchestrator, OrchestratorOptions, TurnOutcome};
pub use tools::{ToolId, ToolRegistry};
