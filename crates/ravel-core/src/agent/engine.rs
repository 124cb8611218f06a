//! React-loop scheduler for Ravel agents.
//!
//! `AgentEngine` drives one task to completion: it plans the prompts, then
//! alternates model steps (through the retry policy and stream assembler) with
//! tool execution until the model answers in plain text, the run is stopped,
//! or the step budget runs out.
//!
//! State machine (each transition is logged at debug level):
//!
//! ```text
//! Planning -> Stepping -> ToolExecuting -> Stepping ... -> Done | Aborted | Unfinished
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use ravel_types::config::{AgentConfig, EngineConfig, MemoryConfig};
use ravel_types::error::ToolError;
use ravel_types::event::{AgentEvent, RunMeta};
use ravel_types::llm::{LlmRequest, Usage};
use ravel_types::message::{ContentPart, Message};
use ravel_types::tool::ToolResult;

use crate::error::EngineError;
use crate::event::{AgentObserver, NoopObserver};
use crate::llm::LlmProvider;
use crate::memory::{ConversationMemory, tokens};
use crate::retry::RetryPolicy;
use crate::stream::{StepOutput, assemble};
use crate::tool::{ToolContext, ToolRegistry};

use super::context::RunContext;
use super::prompt::PromptBuilder;

/// Final text reported when the step budget runs out.
pub const UNFINISHED: &str = "Unfinished";

/// Phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Planning,
    Stepping,
    ToolExecuting,
    Done,
    Aborted,
    Unfinished,
}

/// How a run ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The model answered in plain text.
    Completed(String),
    /// `RunControl::stop` was called with this value.
    Stopped(String),
    /// `max_steps` was reached without an answer.
    Unfinished,
}

impl RunOutcome {
    pub fn text(&self) -> &str {
        match self {
            RunOutcome::Completed(text) | RunOutcome::Stopped(text) => text,
            RunOutcome::Unfinished => UNFINISHED,
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Model steps taken.
    pub steps: u32,
    /// Usage summed over every step.
    pub usage: Usage,
    pub consecutive_tool_errors: u32,
    pub total_tool_errors: u32,
    /// The bounded conversation window at the end of the run.
    pub history: Vec<Message>,
}

/// Drives agent runs. One engine can serve many concurrent runs.
pub struct AgentEngine {
    config: AgentConfig,
    memory_config: MemoryConfig,
    retry: RetryPolicy,
    provider: Arc<dyn LlmProvider>,
    tools: ToolRegistry,
    observer: Arc<dyn AgentObserver>,
}

impl AgentEngine {
    pub fn new(config: &EngineConfig, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            config: config.agent.clone(),
            memory_config: config.memory,
            retry: RetryPolicy::new(config.retry),
            provider,
            tools: ToolRegistry::new(),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn AgentObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Run `task` from an empty history.
    pub async fn run(&self, task: &str, ctx: &RunContext) -> Result<RunReport, EngineError> {
        self.run_with_history(task, Vec::new(), ctx).await
    }

    /// Run `task` on top of a previously persisted history.
    ///
    /// The restored messages go through the memory limits and repair before
    /// the task prompt is appended.
    pub async fn run_with_history(
        &self,
        task: &str,
        history: Vec<Message>,
        ctx: &RunContext,
    ) -> Result<RunReport, EngineError> {
        let meta = ctx.meta(&self.config.name);
        let span = info_span!(
            "agent.run",
            run_id = %meta.run_id,
            agent = %meta.agent_name,
            provider = self.provider.name(),
        );
        self.drive(task, history, ctx, meta).instrument(span).await
    }

    async fn drive(
        &self,
        task: &str,
        history: Vec<Message>,
        ctx: &RunContext,
        meta: RunMeta,
    ) -> Result<RunReport, EngineError> {
        let mut tracker = Tracker::default();
        let control = &ctx.control;

        let system = PromptBuilder::system_prompt(&self.config, Utc::now());
        let mut memory = ConversationMemory::new(self.memory_config);
        memory.set_system_prompt_tokens(tokens::estimate_text(&system));
        if !history.is_empty() {
            memory.restore(history);
        }
        memory.push(Message::user(PromptBuilder::task_prompt(task)));
        let mut tools = self.tools.clone();

        let outcome = loop {
            if tracker.steps >= self.config.max_steps {
                warn!(max_steps = self.config.max_steps, "Step budget exhausted");
                tracker.transition(RunState::Unfinished);
                break RunOutcome::Unfinished;
            }
            if control.is_cancelled() {
                return Err(tracker.abort(EngineError::Cancelled));
            }
            if control.is_paused() {
                info!(step = tracker.steps, "Run paused");
                control.wait_while_paused().await;
                if control.is_cancelled() {
                    return Err(tracker.abort(EngineError::Cancelled));
                }
                info!(step = tracker.steps, "Run resumed");
            }
            if let Some(value) = control.stop_value() {
                tracker.transition(RunState::Done);
                break RunOutcome::Stopped(value);
            }

            tracker.steps += 1;
            tracker.transition(RunState::Stepping);
            let step_token = control.token().child_token();

            let output = match self
                .step(&mut memory, &mut tools, &system, &meta, &step_token, tracker.steps)
                .await
            {
                Ok(output) => output,
                Err(EngineError::Cancelled) => return Err(tracker.abort(EngineError::Cancelled)),
                Err(err) => {
                    self.observer.notify(&AgentEvent::Error {
                        meta: meta.clone(),
                        error: err.to_string(),
                    });
                    return Err(tracker.abort(err));
                }
            };
            tracker.usage.add(&output.usage);

            if step_token.is_cancelled() {
                return Err(tracker.abort(EngineError::Cancelled));
            }
            if let Some(value) = control.stop_value() {
                tracker.transition(RunState::Done);
                break RunOutcome::Stopped(value);
            }

            if !output.has_tool_calls() {
                let text = output.text().unwrap_or_default().to_string();
                memory.push(Message::assistant(output.parts));
                tracker.transition(RunState::Done);
                break RunOutcome::Completed(text);
            }

            tracker.transition(RunState::ToolExecuting);
            let parts = dedupe_calls(output.parts);
            let mut results = Vec::new();
            let mut stopped = None;

            for part in &parts {
                let ContentPart::ToolCall {
                    id,
                    name,
                    input,
                    input_error,
                } = part
                else {
                    continue;
                };
                if step_token.is_cancelled() {
                    return Err(tracker.abort(EngineError::Cancelled));
                }

                let call = PendingCall {
                    id,
                    name,
                    input,
                    input_error: input_error.as_deref(),
                };
                let (result, failure) =
                    match self.execute_call(&tools, call, ctx, &meta, &step_token).await {
                        Ok(executed) => executed,
                        Err(err) => return Err(tracker.abort(err)),
                    };
                results.push(result);

                match failure {
                    None => tracker.consecutive_tool_errors = 0,
                    Some(err) => {
                        tracker.consecutive_tool_errors += 1;
                        tracker.total_tool_errors += 1;
                        if tracker.consecutive_tool_errors >= self.config.max_consecutive_tool_errors {
                            warn!(
                                consecutive = tracker.consecutive_tool_errors,
                                error = %err,
                                "Too many consecutive tool failures"
                            );
                            let err = EngineError::ToolFailure {
                                consecutive: tracker.consecutive_tool_errors,
                                source: err,
                            };
                            self.observer.notify(&AgentEvent::Error {
                                meta: meta.clone(),
                                error: err.to_string(),
                            });
                            return Err(tracker.abort(err));
                        }
                    }
                }

                if let Some(value) = control.stop_value() {
                    stopped = Some(value);
                    break;
                }
                if step_token.is_cancelled() {
                    return Err(tracker.abort(EngineError::Cancelled));
                }
            }

            if let Some(value) = stopped {
                debug!(executed = results.len(), "Stopped during tool execution");
                tracker.transition(RunState::Done);
                break RunOutcome::Stopped(value);
            }

            memory.append([Message::assistant(parts), Message::tool(results)]);
        };

        info!(
            steps = tracker.steps,
            total_tool_errors = tracker.total_tool_errors,
            total_tokens = tracker.usage.total_tokens,
            outcome = outcome.text(),
            "Run finished"
        );

        Ok(RunReport {
            outcome,
            steps: tracker.steps,
            usage: tracker.usage,
            consecutive_tool_errors: tracker.consecutive_tool_errors,
            total_tool_errors: tracker.total_tool_errors,
            history: memory.messages().to_vec(),
        })
    }

    /// One model invocation, retried per the retry policy.
    async fn step(
        &self,
        memory: &mut ConversationMemory,
        tools: &mut ToolRegistry,
        system: &str,
        meta: &RunMeta,
        cancel: &CancellationToken,
        step: u32,
    ) -> Result<StepOutput, EngineError> {
        if tools.has_discovery() {
            if let Err(err) = tools.refresh(None).await {
                warn!(error = %err, "Tool discovery failed, keeping previous tool set");
            }
        }
        let schemas = tools.schemas();

        let span = info_span!(
            "gen_ai.step",
            step,
            gen_ai.system = self.provider.name(),
            gen_ai.request.tools = schemas.len(),
            messages = memory.len(),
        );

        let provider = &self.provider;
        let observer = self.observer.as_ref();
        let schemas = &schemas;
        self.retry
            .invoke(memory, cancel, move |messages| {
                let request = LlmRequest {
                    system: Some(system.to_string()),
                    messages,
                    tools: schemas.clone(),
                    ..LlmRequest::default()
                };
                assemble(provider.stream(request), observer, meta, cancel)
            })
            .instrument(span)
            .await
    }

    /// Execute one call and turn its outcome into a tool-result part.
    ///
    /// Returns the failure alongside the part when the call failed; only
    /// cancellation is an `Err`.
    async fn execute_call(
        &self,
        tools: &ToolRegistry,
        call: PendingCall<'_>,
        ctx: &RunContext,
        meta: &RunMeta,
        cancel: &CancellationToken,
    ) -> Result<(ContentPart, Option<ToolError>), EngineError> {
        let span = info_span!("tool.execute", tool = call.name, call_id = call.id);
        let execution = run_tool(tools, &call, ctx, cancel).instrument(span);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            result = execution => result,
        };

        let (output, failure) = match result {
            Ok(result) if result.is_error => {
                let output = result.into_output();
                let message = output
                    .to_text()
                    .trim_start_matches("Error:")
                    .trim()
                    .to_string();
                let err = ToolError::Execution {
                    tool: call.name.to_string(),
                    message,
                };
                (output, Some(err))
            }
            Ok(result) => (result.into_output(), None),
            Err(err) => {
                let output = ToolResult::error(err.to_string()).into_output();
                (output, Some(err))
            }
        };

        match &failure {
            Some(err) => warn!(tool = call.name, call_id = call.id, error = %err, "Tool call failed"),
            None => debug!(tool = call.name, call_id = call.id, "Tool call succeeded"),
        }

        self.observer.notify(&AgentEvent::ToolResult {
            meta: meta.clone(),
            tool_call_id: call.id.to_string(),
            tool_name: call.name.to_string(),
            output: output.clone(),
            is_error: failure.is_some(),
        });

        Ok((ContentPart::tool_result(call.id, call.name, output), failure))
    }
}

struct PendingCall<'a> {
    id: &'a str,
    name: &'a str,
    input: &'a Value,
    input_error: Option<&'a str>,
}

async fn run_tool(
    tools: &ToolRegistry,
    call: &PendingCall<'_>,
    ctx: &RunContext,
    cancel: &CancellationToken,
) -> Result<ToolResult, ToolError> {
    if let Some(message) = call.input_error {
        return Err(ToolError::InvalidInput {
            tool: call.name.to_string(),
            message: message.to_string(),
        });
    }
    let tool = tools
        .get(call.name)
        .ok_or_else(|| ToolError::NotFound(call.name.to_string()))?;

    let tool_ctx = ToolContext {
        run_id: ctx.run_id,
        call_id: call.id.to_string(),
        shared: ctx.shared.clone(),
        cancellation: cancel.clone(),
    };
    tool.execute(call.input.clone(), &tool_ctx).await
}

/// Drop repeated tool calls by id; the first occurrence wins.
fn dedupe_calls(parts: Vec<ContentPart>) -> Vec<ContentPart> {
    let mut seen = HashSet::new();
    parts
        .into_iter()
        .filter(|part| match part.tool_call_id() {
            Some(id) if !seen.insert(id.to_string()) => {
                debug!(call_id = id, "Dropping duplicate tool call");
                false
            }
            _ => true,
        })
        .collect()
}

#[derive(Default)]
struct Tracker {
    state: RunState,
    steps: u32,
    usage: Usage,
    consecutive_tool_errors: u32,
    total_tool_errors: u32,
}

impl Tracker {
    fn transition(&mut self, next: RunState) {
        debug!(from = ?self.state, to = ?next, step = self.steps, "Run state transition");
        self.state = next;
    }

    fn abort(&mut self, err: EngineError) -> EngineError {
        self.transition(RunState::Aborted);
        err
    }
}
