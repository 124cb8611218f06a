//! Stream assembler: turns provider events into text and tool-call units.
//!
//! Text and reasoning arrive as start/delta/end triples and are reported with
//! their running text; tool calls arrive either as start/delta*/call sequences
//! or as a single atomic call event. Every text or reasoning stream reports
//! `done = true` exactly once, whether it was closed by the provider or
//! force-closed by a tool call, a finish event, or the end of the stream.

use futures_util::StreamExt;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use ravel_types::event::{AgentEvent, RunMeta};
use ravel_types::llm::{FinishReason, LlmError, StreamEvent, StreamUsage, Usage};
use ravel_types::message::ContentPart;

use crate::error::EngineError;
use crate::event::AgentObserver;
use crate::llm::LlmStream;

/// Finalized result of one model invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    /// Merged text first (if any), then tool calls in terminal-event order.
    pub parts: Vec<ContentPart>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

impl StepOutput {
    /// No text and no tool calls.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn text(&self) -> Option<&str> {
        self.parts.iter().find_map(|part| match part {
            ContentPart::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ContentPart> {
        self.parts
            .iter()
            .filter(|part| matches!(part, ContentPart::ToolCall { .. }))
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls().next().is_some()
    }
}

#[derive(Debug, Clone, Copy)]
enum ChannelKind {
    Text,
    Thinking,
}

/// The currently open text or reasoning stream.
#[derive(Debug)]
struct OpenStream {
    stream_id: Uuid,
    text: String,
}

#[derive(Debug)]
struct Channel {
    kind: ChannelKind,
    open: Option<OpenStream>,
    /// Text of every stream on this channel, concatenated.
    merged: String,
}

impl Channel {
    fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            open: None,
            merged: String::new(),
        }
    }

    fn event(&self, meta: &RunMeta, stream: &OpenStream, done: bool) -> AgentEvent {
        let meta = meta.clone();
        let stream_id = stream.stream_id;
        let text = stream.text.clone();
        match self.kind {
            ChannelKind::Text => AgentEvent::Text {
                meta,
                stream_id,
                text,
                done,
            },
            ChannelKind::Thinking => AgentEvent::Thinking {
                meta,
                stream_id,
                text,
                done,
            },
        }
    }
}

/// Arguments of a tool call that has started but not yet terminated.
#[derive(Debug)]
struct PendingCall {
    id: String,
    name: String,
    buffer: String,
}

/// Incremental state of a single model invocation.
///
/// Feed events with [`apply`](Self::apply); once it reports a finish (or the
/// stream ends) call [`finish`](Self::finish).
pub struct StreamAssembler<'a> {
    observer: &'a dyn AgentObserver,
    meta: RunMeta,
    text: Channel,
    reasoning: Channel,
    /// In start order, which is the order they are force-finalized in.
    pending: Vec<PendingCall>,
    calls: Vec<ContentPart>,
}

impl<'a> StreamAssembler<'a> {
    pub fn new(observer: &'a dyn AgentObserver, meta: RunMeta) -> Self {
        Self {
            observer,
            meta,
            text: Channel::new(ChannelKind::Text),
            reasoning: Channel::new(ChannelKind::Thinking),
            pending: Vec::new(),
            calls: Vec::new(),
        }
    }

    /// Apply one event. Returns the finish reason and usage once the provider
    /// signals completion; an `error` event fails the whole invocation.
    pub fn apply(
        &mut self,
        event: StreamEvent,
    ) -> Result<Option<(FinishReason, Option<StreamUsage>)>, LlmError> {
        match event {
            StreamEvent::TextStart { .. } => self.open(ChannelKind::Text),
            StreamEvent::TextDelta { delta, .. } => self.append(ChannelKind::Text, &delta),
            StreamEvent::TextEnd { .. } => self.close(ChannelKind::Text),

            StreamEvent::ReasoningStart { .. } => self.open(ChannelKind::Thinking),
            StreamEvent::ReasoningDelta { delta, .. } => {
                self.append(ChannelKind::Thinking, &delta)
            }
            StreamEvent::ReasoningEnd { .. } => self.close(ChannelKind::Thinking),

            StreamEvent::ToolInputStart { id, tool_name } => {
                if let Some(existing) = self.pending.iter_mut().find(|p| p.id == id) {
                    existing.name = tool_name;
                } else {
                    self.pending.push(PendingCall {
                        id,
                        name: tool_name,
                        buffer: String::new(),
                    });
                }
            }
            StreamEvent::ToolInputDelta { id, delta } => {
                let Some(idx) = self.pending.iter().position(|p| p.id == id) else {
                    tracing::debug!(call_id = %id, "Tool input delta for unknown call, ignoring");
                    return Ok(None);
                };
                self.pending[idx].buffer.push_str(&delta);
                self.close(ChannelKind::Text);
                let pending = &self.pending[idx];
                self.observer.notify(&AgentEvent::ToolStreaming {
                    meta: self.meta.clone(),
                    tool_call_id: pending.id.clone(),
                    tool_name: pending.name.clone(),
                    params_text: pending.buffer.clone(),
                });
            }
            StreamEvent::ToolCall {
                id,
                tool_name,
                input,
            } => {
                let pending = self
                    .pending
                    .iter()
                    .position(|p| p.id == id)
                    .map(|idx| self.pending.remove(idx));
                let (started_name, buffer) = match pending {
                    Some(p) => (Some(p.name), p.buffer),
                    None => (None, String::new()),
                };
                let name = tool_name
                    .filter(|n| !n.is_empty())
                    .or(started_name)
                    .unwrap_or_default();
                let (input, input_error) = resolve_input(input, &buffer);
                self.finalize_call(id, name, input, input_error);
            }

            StreamEvent::File { media_type, data } => {
                self.observer.notify(&AgentEvent::File {
                    meta: self.meta.clone(),
                    media_type,
                    data,
                });
            }

            StreamEvent::Error { message } => {
                return Err(LlmError::Provider { message });
            }

            StreamEvent::Finish {
                finish_reason,
                usage,
            } => return Ok(Some((finish_reason, usage))),
        }
        Ok(None)
    }

    /// Force-close open streams, finalize unterminated tool calls, report the
    /// finish, and produce the step result.
    pub fn finish(mut self, finish_reason: FinishReason, usage: Option<StreamUsage>) -> StepOutput {
        self.close(ChannelKind::Text);
        self.close(ChannelKind::Thinking);

        for pending in std::mem::take(&mut self.pending) {
            tracing::debug!(call_id = %pending.id, tool = %pending.name, "Finalizing unterminated tool call");
            let (input, input_error) = resolve_input(None, &pending.buffer);
            self.finalize_call(pending.id, pending.name, input, input_error);
        }

        let usage = usage.map(Usage::from).unwrap_or_default();
        self.observer.notify(&AgentEvent::Finish {
            meta: self.meta.clone(),
            finish_reason,
            usage,
        });

        let mut parts = Vec::with_capacity(self.calls.len() + 1);
        if !self.text.merged.is_empty() {
            parts.push(ContentPart::text(std::mem::take(&mut self.text.merged)));
        }
        parts.append(&mut self.calls);

        StepOutput {
            parts,
            finish_reason,
            usage,
        }
    }

    fn channel(&mut self, kind: ChannelKind) -> &mut Channel {
        match kind {
            ChannelKind::Text => &mut self.text,
            ChannelKind::Thinking => &mut self.reasoning,
        }
    }

    fn open(&mut self, kind: ChannelKind) {
        self.close(kind);
        self.channel(kind).open = Some(OpenStream {
            stream_id: Uuid::now_v7(),
            text: String::new(),
        });
    }

    fn append(&mut self, kind: ChannelKind, delta: &str) {
        let meta = self.meta.clone();
        let channel = self.channel(kind);
        let stream = channel.open.get_or_insert_with(|| OpenStream {
            stream_id: Uuid::now_v7(),
            text: String::new(),
        });
        stream.text.push_str(delta);
        channel.merged.push_str(delta);

        let Some(stream) = channel.open.as_ref() else {
            return;
        };
        let event = channel.event(&meta, stream, false);
        self.observer.notify(&event);
    }

    /// Idempotent: a closed channel reports nothing.
    fn close(&mut self, kind: ChannelKind) {
        let meta = self.meta.clone();
        let channel = self.channel(kind);
        if let Some(stream) = channel.open.take() {
            let event = channel.event(&meta, &stream, true);
            self.observer.notify(&event);
        }
    }

    fn finalize_call(&mut self, id: String, name: String, input: Value, input_error: Option<String>) {
        self.close(ChannelKind::Text);
        if let Some(error) = &input_error {
            tracing::warn!(call_id = %id, tool = %name, %error, "Tool call input is not a JSON object");
        }
        self.observer.notify(&AgentEvent::ToolUse {
            meta: self.meta.clone(),
            tool_call_id: id.clone(),
            tool_name: name.clone(),
            params: input.clone(),
        });
        self.calls.push(ContentPart::ToolCall {
            id,
            name,
            input,
            input_error,
        });
    }
}

/// Resolve a tool call's input into a JSON object.
///
/// `input` wins when present and non-empty; otherwise the buffered argument
/// text is used. Anything that is not an object becomes `{}` plus a reason.
fn resolve_input(input: Option<Value>, buffer: &str) -> (Value, Option<String>) {
    let empty = || Value::Object(Map::new());
    let raw = match input {
        Some(Value::Object(map)) => return (Value::Object(map), None),
        Some(Value::String(text)) if !text.trim().is_empty() => text,
        Some(Value::Null) | None => buffer.to_string(),
        Some(Value::String(_)) => buffer.to_string(),
        Some(other) => {
            return (
                empty(),
                Some(format!("expected a JSON object, got {}", json_kind(&other))),
            );
        }
    };

    if raw.trim().is_empty() {
        return (empty(), None);
    }
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::Object(map)) => (Value::Object(map), None),
        Ok(other) => (
            empty(),
            Some(format!("expected a JSON object, got {}", json_kind(&other))),
        ),
        Err(e) => (empty(), Some(format!("invalid JSON arguments: {e}"))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Consume a provider stream into a [`StepOutput`], reporting progress to
/// `observer`.
///
/// Waiting for each event races `cancel`; a cancelled step returns
/// [`EngineError::Cancelled`] without finalizing anything. A stream that ends
/// without a finish event is finalized with [`FinishReason::Unknown`].
pub async fn assemble(
    mut stream: LlmStream,
    observer: &dyn AgentObserver,
    meta: &RunMeta,
    cancel: &CancellationToken,
) -> Result<StepOutput, EngineError> {
    let mut assembler = StreamAssembler::new(observer, meta.clone());

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            next = stream.next() => next,
        };

        let Some(item) = next else {
            tracing::debug!("Stream ended without a finish event");
            return Ok(assembler.finish(FinishReason::Unknown, None));
        };

        if let Some((finish_reason, usage)) = assembler.apply(item?)? {
            return Ok(assembler.finish(finish_reason, usage));
        }
    }
}
