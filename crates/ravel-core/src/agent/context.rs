//! Per-run context: identity, shared state and control.
//!
//! `RunContext` is what a caller hands to [`AgentEngine::run`](super::AgentEngine::run).
//! `child()` derives the context for a nested run: same shared state, a fresh
//! run id, and a control whose token is cancelled with the parent's.

use ravel_types::event::RunMeta;
use uuid::Uuid;

use super::control::RunControl;
use super::shared::SharedContext;

#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    /// Caller-assigned task identifier, copied into every notification.
    pub task_id: Option<String>,
    /// Caller-assigned node identifier (e.g. a plan node), likewise.
    pub node_id: Option<String>,
    pub shared: SharedContext,
    pub control: RunControl,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new(SharedContext::new())
    }
}

impl RunContext {
    /// Root context over `shared`.
    pub fn new(shared: SharedContext) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            task_id: None,
            node_id: None,
            shared,
            control: RunControl::new(),
        }
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    /// Context for a nested run.
    ///
    /// Cancelling the parent cancels the child, never the reverse. Stop and
    /// pause are not inherited.
    pub fn child(&self) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            task_id: self.task_id.clone(),
            node_id: self.node_id.clone(),
            shared: self.shared.clone(),
            control: RunControl::with_token(self.control.token().child_token()),
        }
    }

    /// Notification metadata for an agent running in this context.
    pub fn meta(&self, agent_name: &str) -> RunMeta {
        RunMeta {
            run_id: self.run_id,
            agent_name: agent_name.to_string(),
            task_id: self.task_id.clone(),
            node_id: self.node_id.clone(),
        }
    }
}
