//! The react loop and the per-run state around it.
//!
//! - `AgentEngine`: schedules model steps and tool calls for one task
//! - `RunContext` / `RunControl`: run identity, stop/pause/cancel handle
//! - `SharedContext`: key-value state explicitly shared between runs
//! - `PromptBuilder`: system and task prompts built during planning

pub mod context;
pub mod control;
pub mod engine;
pub mod prompt;
pub mod shared;

pub use context::RunContext;
pub use control::RunControl;
pub use engine::{AgentEngine, RunOutcome, RunReport, RunState};
pub use prompt::PromptBuilder;
pub use shared::SharedContext;
