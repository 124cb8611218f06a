//! GenAI semantic-convention attribute names.
//!
//! Spans declare these fields up front (usage as `Empty`) and fill them with
//! `Span::record` once the run reports its totals.

pub const GEN_AI_OPERATION_NAME: &str = "gen_ai.operation.name";
pub const GEN_AI_AGENT_ID: &str = "gen_ai.agent.id";
pub const GEN_AI_AGENT_NAME: &str = "gen_ai.agent.name";

pub const GEN_AI_USAGE_INPUT_TOKENS: &str = "gen_ai.usage.input_tokens";
pub const GEN_AI_USAGE_OUTPUT_TOKENS: &str = "gen_ai.usage.output_tokens";

/// `gen_ai.operation.name` for a whole agent run.
pub const OP_INVOKE_AGENT: &str = "invoke_agent";
