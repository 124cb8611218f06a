//! Tool registry: the set of tools a run can call.
//!
//! Static tools are registered up front. When a discovery client is attached,
//! `refresh` re-lists it and the discovered tools shadow static tools with the
//! same name from then on.

use std::collections::BTreeMap;
use std::sync::Arc;

use ravel_types::error::ToolError;
use ravel_types::tool::ToolSchema;

use super::box_tool::BoxTool;
use super::definition::Tool;
use super::discovery::{DiscoveredTool, ToolDiscovery};

/// Name-indexed tool set with optional discovery.
///
/// Cloning is cheap; each run works on its own clone so discovery refreshes
/// stay run-local.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, BoxTool>,
    discovery: Option<Arc<dyn ToolDiscovery>>,
    /// `None` until discovery has run at least once.
    discovered: Option<BTreeMap<String, BoxTool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a static tool, replacing any previous one with the same name.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_boxed(BoxTool::new(tool));
    }

    pub fn register_boxed(&mut self, tool: BoxTool) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn with_discovery(mut self, discovery: Arc<dyn ToolDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    pub fn has_discovery(&self) -> bool {
        self.discovery.is_some()
    }

    /// Re-list the discovery client. Returns the number of discovered tools.
    ///
    /// On failure the previously discovered set is kept.
    pub async fn refresh(&mut self, query: Option<&str>) -> Result<usize, ToolError> {
        let Some(discovery) = self.discovery.clone() else {
            return Ok(0);
        };

        let schemas = discovery.list_tools(query).await?;
        let discovered: BTreeMap<String, BoxTool> = schemas
            .into_iter()
            .map(|schema| {
                let name = schema.name.clone();
                let tool = BoxTool::new(DiscoveredTool::new(schema, Arc::clone(&discovery)));
                (name, tool)
            })
            .collect();

        let count = discovered.len();
        tracing::debug!(count, "Refreshed discovered tools");
        self.discovered = Some(discovered);
        Ok(count)
    }

    /// Look up a tool; discovered tools win over static ones.
    pub fn get(&self, name: &str) -> Option<&BoxTool> {
        self.discovered
            .as_ref()
            .and_then(|discovered| discovered.get(name))
            .or_else(|| self.tools.get(name))
    }

    /// Schemas of every callable tool, sorted by name.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        let mut merged: BTreeMap<&str, &BoxTool> =
            self.tools.iter().map(|(k, v)| (k.as_str(), v)).collect();
        if let Some(discovered) = &self.discovered {
            merged.extend(discovered.iter().map(|(k, v)| (k.as_str(), v)));
        }
        merged.into_values().map(|tool| tool.schema().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.schemas().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty() && self.discovered.as_ref().is_none_or(BTreeMap::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::SharedContext;
    use crate::tool::ToolContext;
    use futures_util::future::BoxFuture;
    use ravel_types::tool::ToolResult;
    use serde_json::{Value, json};
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    struct Echo;

    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes its input"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::text(format!("static {args}")))
        }
    }

    struct Catalogue {
        fail: bool,
    }

    impl ToolDiscovery for Catalogue {
        fn list_tools<'a>(
            &'a self,
            _query: Option<&'a str>,
        ) -> BoxFuture<'a, Result<Vec<ToolSchema>, ToolError>> {
            Box::pin(async move {
                if self.fail {
                    return Err(ToolError::Discovery("server down".to_string()));
                }
                Ok(vec![
                    ToolSchema {
                        name: "echo".to_string(),
                        description: "Remote echo".to_string(),
                        input_schema: json!({"type": "object"}),
                    },
                    ToolSchema {
                        name: "search".to_string(),
                        description: "Remote search".to_string(),
                        input_schema: json!({"type": "object"}),
                    },
                ])
            })
        }

        fn call_tool<'a>(
            &'a self,
            name: &'a str,
            _args: Value,
        ) -> BoxFuture<'a, Result<ToolResult, ToolError>> {
            Box::pin(async move { Ok(ToolResult::text(format!("remote {name}"))) })
        }
    }

    fn ctx() -> ToolContext {
        ToolContext {
            run_id: Uuid::now_v7(),
            call_id: "c1".to_string(),
            shared: SharedContext::new(),
            cancellation: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn static_tool_executes() {
        let mut registry = ToolRegistry::new();
        registry.register(Echo);

        let tool = registry.get("echo").unwrap();
        let result = tool.execute(json!({"x": 1}), &ctx()).await.unwrap();
        assert_eq!(
            result.into_output().to_text(),
            "static {\"x\":1}".to_string()
        );
        assert!(registry.get("missing").is_none());
    }

    #[tokio::test]
    async fn discovered_tools_override_static_after_refresh() {
        let mut registry = ToolRegistry::new().with_discovery(Arc::new(Catalogue { fail: false }));
        registry.register(Echo);
        assert_eq!(registry.get("echo").unwrap().schema().description, "Echoes its input");

        assert_eq!(registry.refresh(None).await.unwrap(), 2);
        let echo = registry.get("echo").unwrap();
        assert_eq!(echo.schema().description, "Remote echo");
        let result = echo.execute(json!({}), &ctx()).await.unwrap();
        assert_eq!(result.into_output().to_text(), "remote echo");

        let names: Vec<String> = registry.schemas().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["echo", "search"]);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_set() {
        let mut registry = ToolRegistry::new().with_discovery(Arc::new(Catalogue { fail: true }));
        registry.register(Echo);

        assert!(matches!(
            registry.refresh(None).await,
            Err(ToolError::Discovery(_))
        ));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("echo").is_some());
    }

    #[tokio::test]
    async fn refresh_without_discovery_is_a_no_op() {
        let mut registry = ToolRegistry::new();
        assert_eq!(registry.refresh(Some("anything")).await.unwrap(), 0);
        assert!(registry.is_empty());
    }
}
