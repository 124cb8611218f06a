//! BoxTool -- object-safe dynamic dispatch wrapper for Tool.
//!
//! 1. `ToolDyn` is the object-safe twin of [`Tool`] with a boxed future
//! 2. Every `T: Tool` gets `ToolDyn` through a blanket impl
//! 3. `BoxTool` holds an `Arc<dyn ToolDyn>` and delegates

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use ravel_types::error::ToolError;
use ravel_types::tool::{ToolResult, ToolSchema};

use super::definition::{Tool, ToolContext};

/// Object-safe version of [`Tool`].
pub trait ToolDyn: Send + Sync {
    fn execute_boxed<'a>(
        &'a self,
        args: Value,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = Result<ToolResult, ToolError>> + Send + 'a>>;
}

impl<T: Tool> ToolDyn for T {
    fn execute_boxed<'a>(
        &'a self,
        args: Value,
        ctx: &'a ToolContext,
    ) -> Pin<Box<dyn Future<Output = Result<ToolResult, ToolError>> + Send + 'a>> {
        Box::pin(self.execute(args, ctx))
    }
}

/// Type-erased tool. Cloning shares the underlying tool.
#[derive(Clone)]
pub struct BoxTool {
    inner: Arc<dyn ToolDyn>,
    schema: ToolSchema,
}

impl BoxTool {
    pub fn new<T: Tool + 'static>(tool: T) -> Self {
        let schema = Tool::schema(&tool);
        Self {
            inner: Arc::new(tool),
            schema,
        }
    }

    pub fn name(&self) -> &str {
        &self.schema.name
    }

    pub fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    pub async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolResult, ToolError> {
        self.inner.execute_boxed(args, ctx).await
    }
}

impl std::fmt::Debug for BoxTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxTool").field("name", &self.schema.name).finish()
    }
}
