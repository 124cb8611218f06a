//! Tool trait definition.

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use ravel_types::error::ToolError;
use ravel_types::tool::{ToolResult, ToolSchema};

use crate::agent::SharedContext;

/// Per-call context handed to a tool.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub run_id: Uuid,
    pub call_id: String,
    /// Key-value state shared with other runs that were given the same context.
    pub shared: SharedContext,
    /// Cancelled when the step (or the whole run) is cancelled.
    pub cancellation: CancellationToken,
}

/// A capability the model can call.
///
/// Uses native async fn in traits (RPITIT). Wrap in [`BoxTool`](super::BoxTool)
/// for dynamic dispatch.
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema of the arguments object.
    fn input_schema(&self) -> Value;

    /// Run the tool. `args` is always a JSON object.
    ///
    /// Returning `Err` and returning a result with `is_error` both count as a
    /// failed call.
    fn execute(
        &self,
        args: Value,
        ctx: &ToolContext,
    ) -> impl std::future::Future<Output = Result<ToolResult, ToolError>> + Send;

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}
