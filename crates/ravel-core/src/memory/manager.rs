//! Conversation memory manager.
//!
//! `ConversationMemory` owns the running history of one agent run. After every
//! append it repairs the window, then evicts the oldest turns until both the
//! message-count cap and the token budget hold.
//!
//! Eviction works on whole turns: an assistant tool-call message and its
//! tool message leave together. The latest user message is never evicted;
//! when it is the oldest turn left, the turns after it go first. A window
//! holding only that message may stay over the token budget.

use std::ops::Range;

use chrono::Duration;
use uuid::Uuid;

use ravel_types::config::MemoryConfig;
use ravel_types::message::{ContentPart, Message, OutputSegment, Role, ToolOutput};

use super::tokens;

/// Text of the placeholder result synthesized for a call that has none.
pub const MISSING_RESULT: &str = "Error: No result";

/// Marker appended to content shortened by compression.
pub const TRUNCATION_MARKER: &str = "...";

/// Bounded message history with structural invariants.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    messages: Vec<Message>,
    config: MemoryConfig,
    /// Constant contribution of the system prompt to every estimate.
    system_prompt_tokens: usize,
    compression_passes: u32,
}

impl ConversationMemory {
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            messages: Vec::new(),
            config,
            system_prompt_tokens: 0,
            compression_passes: 0,
        }
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Set the token cost of the system prompt, counted against the budget.
    pub fn set_system_prompt_tokens(&mut self, tokens: usize) {
        self.system_prompt_tokens = tokens;
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of compression passes run so far.
    pub fn compression_count(&self) -> u32 {
        self.compression_passes
    }

    /// Append messages, then trim and repair.
    pub fn append(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.messages.extend(messages);
        self.enforce_limits();
    }

    pub fn push(&mut self, message: Message) {
        self.append([message]);
    }

    /// Replace the history with previously persisted messages.
    ///
    /// The restored list goes through the same limits and repair as an append.
    pub fn restore(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.enforce_limits();
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Estimated tokens of the whole window, system prompt included.
    pub fn estimate_tokens(&self) -> usize {
        self.system_prompt_tokens + tokens::estimate_messages(&self.messages)
    }

    /// Remove the message with `id`.
    ///
    /// With `cascade`, the paired half of a call/result pair goes too: the
    /// following tool message for an assistant tool-call message, or the
    /// preceding assistant tool-call message for a tool message. Returns the
    /// number of messages removed; repair runs afterwards.
    pub fn remove_by_id(&mut self, id: Uuid, cascade: bool) -> usize {
        let Some(idx) = self.messages.iter().position(|m| m.id == id) else {
            return 0;
        };

        let mut range = idx..idx + 1;
        if cascade {
            let message = &self.messages[idx];
            if message.role == Role::Assistant
                && message.has_tool_calls()
                && self
                    .messages
                    .get(idx + 1)
                    .is_some_and(|next| next.role == Role::Tool)
            {
                range.end += 1;
            } else if message.role == Role::Tool
                && idx > 0
                && self.messages[idx - 1].role == Role::Assistant
                && self.messages[idx - 1].has_tool_calls()
            {
                range.start -= 1;
            }
        }

        let removed = range.len();
        self.messages.drain(range);
        tracing::debug!(%id, cascade, removed, "Removed messages by id");
        self.repair();
        removed
    }

    /// Truncate long assistant text and tool-result strings to
    /// `compression_max_length` characters plus [`TRUNCATION_MARKER`].
    ///
    /// Never removes messages. Returns the number of parts shortened.
    pub fn compress(&mut self) -> usize {
        let max = self.config.compression_max_length;
        let mut truncated = 0;

        for message in &mut self.messages {
            match message.role {
                Role::Assistant => {
                    for part in &mut message.content {
                        if let ContentPart::Text { text } = part {
                            truncated += usize::from(truncate_in_place(text, max));
                        }
                    }
                }
                Role::Tool => {
                    for part in &mut message.content {
                        if let ContentPart::ToolResult { output, .. } = part {
                            truncated += truncate_output(output, max);
                        }
                    }
                }
                Role::System | Role::User => {}
            }
        }

        self.compression_passes += 1;
        tracing::info!(
            pass = self.compression_passes,
            truncated,
            tokens = self.estimate_tokens(),
            "Compressed conversation memory"
        );
        self.repair();
        truncated
    }

    /// Restore structural invariants. Idempotent.
    ///
    /// - everything before the first user message is dropped (all of it when
    ///   there is no user message);
    /// - an assistant tool-call message not followed by a tool message gets a
    ///   synthesized one with [`MISSING_RESULT`] for every call, timestamped
    ///   1ms after it; a following tool message missing some ids gets the
    ///   missing placeholders appended;
    /// - tool messages not directly after an assistant tool-call message are
    ///   dropped;
    /// - consecutive user messages with identical content are collapsed.
    ///   This runs last because dropping orphans can make user turns adjacent.
    pub fn repair(&mut self) {
        let before = self.messages.len();

        match self.messages.iter().position(|m| m.role == Role::User) {
            Some(first_user) => {
                self.messages.drain(..first_user);
            }
            None => self.messages.clear(),
        }

        let mut repaired = Vec::with_capacity(self.messages.len());
        let mut synthesized = 0usize;
        let mut orphans = 0usize;
        let mut iter = std::mem::take(&mut self.messages).into_iter().peekable();

        while let Some(message) = iter.next() {
            if message.role == Role::Tool {
                // Paired tool messages are consumed together with their
                // assistant message below.
                orphans += 1;
                continue;
            }
            if message.role != Role::Assistant || !message.has_tool_calls() {
                repaired.push(message);
                continue;
            }

            let calls: Vec<(String, String)> = message
                .content
                .iter()
                .filter_map(|part| match part {
                    ContentPart::ToolCall { id, name, .. } => Some((id.clone(), name.clone())),
                    _ => None,
                })
                .collect();
            let placeholder_time = message.timestamp + Duration::milliseconds(1);
            repaired.push(message);

            match iter.next_if(|next| next.role == Role::Tool) {
                Some(mut results) => {
                    let missing: Vec<ContentPart> = calls
                        .into_iter()
                        .filter(|(id, _)| !results.tool_result_ids().contains(&id.as_str()))
                        .map(|(id, name)| missing_result(id, name))
                        .collect();
                    synthesized += missing.len();
                    results.content.extend(missing);
                    repaired.push(results);
                }
                None => {
                    synthesized += calls.len();
                    let parts = calls
                        .into_iter()
                        .map(|(id, name)| missing_result(id, name))
                        .collect();
                    repaired.push(Message::tool(parts).with_timestamp(placeholder_time));
                }
            }
        }

        repaired.dedup_by(|later, earlier| {
            later.role == Role::User
                && earlier.role == Role::User
                && later.content == earlier.content
        });
        self.messages = repaired;

        if before != self.messages.len() || synthesized > 0 || orphans > 0 {
            tracing::debug!(
                before,
                after = self.messages.len(),
                synthesized,
                orphans,
                "Repaired conversation memory"
            );
        }
    }

    fn enforce_limits(&mut self) {
        self.repair();

        let mut evicted = 0usize;
        while self.over_limits() {
            let Some(turn) = self.oldest_evictable_turn() else {
                break;
            };
            evicted += turn.len();
            self.messages.drain(turn);
        }

        if evicted > 0 {
            // Turns leave whole, so this only drops a leading non-user turn.
            self.repair();
            tracing::debug!(
                evicted,
                messages = self.messages.len(),
                tokens = self.estimate_tokens(),
                budget = self.config.max_tokens,
                "Evicted turns over memory limits"
            );
        }
    }

    fn over_limits(&self) -> bool {
        self.messages.len() > self.config.max_messages
            || self.estimate_tokens() > self.config.max_tokens
    }

    /// Index range of the oldest turn that may be evicted, skipping the
    /// latest user message.
    fn oldest_evictable_turn(&self) -> Option<Range<usize>> {
        let anchor = self.messages.iter().rposition(|m| m.role == Role::User);
        let start = if anchor == Some(0) { 1 } else { 0 };
        let first = self.messages.get(start)?;

        let paired = first.role == Role::Assistant
            && first.has_tool_calls()
            && self
                .messages
                .get(start + 1)
                .is_some_and(|next| next.role == Role::Tool);
        Some(start..start + if paired { 2 } else { 1 })
    }
}

fn missing_result(id: String, name: String) -> ContentPart {
    ContentPart::tool_result(id, name, ToolOutput::ErrorText(MISSING_RESULT.to_string()))
}

/// Shorten `text` to `max` characters plus the marker. Returns whether it
/// changed; text already cut at `max` is left alone.
fn truncate_in_place(text: &mut String, max: usize) -> bool {
    match text.char_indices().nth(max) {
        Some((cut, _)) if &text[cut..] == TRUNCATION_MARKER => false,
        Some((cut, _)) => {
            text.truncate(cut);
            text.push_str(TRUNCATION_MARKER);
            true
        }
        None => false,
    }
}

fn truncate_output(output: &mut ToolOutput, max: usize) -> usize {
    match output {
        ToolOutput::Text(text) | ToolOutput::ErrorText(text) => {
            usize::from(truncate_in_place(text, max))
        }
        ToolOutput::Json(value) => {
            let mut text = value.to_string();
            if truncate_in_place(&mut text, max) {
                *output = ToolOutput::Text(text);
                1
            } else {
                0
            }
        }
        ToolOutput::Content(segments) => segments
            .iter_mut()
            .map(|segment| match segment {
                OutputSegment::Text { text } => usize::from(truncate_in_place(text, max)),
                OutputSegment::Media { .. } => 0,
            })
            .sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory() -> ConversationMemory {
        ConversationMemory::new(MemoryConfig::default())
    }

    fn call_pair(ids: &[&str]) -> (Message, Message) {
        let calls = ids
            .iter()
            .map(|id| ContentPart::tool_call(*id, "lookup", json!({})))
            .collect();
        let results = ids
            .iter()
            .map(|id| ContentPart::tool_result(*id, "lookup", ToolOutput::Text("ok".to_string())))
            .collect();
        (Message::assistant(calls), Message::tool(results))
    }

    fn roles(memory: &ConversationMemory) -> Vec<Role> {
        memory.messages().iter().map(|m| m.role).collect()
    }

    #[test]
    fn count_cap_drops_oldest_first() {
        let mut memory = ConversationMemory::new(MemoryConfig {
            max_messages: 3,
            ..MemoryConfig::default()
        });
        for i in 0..5 {
            memory.push(Message::user(format!("turn {i}")));
        }
        let texts: Vec<String> = memory.messages().iter().map(Message::text).collect();
        assert_eq!(texts, vec!["turn 2", "turn 3", "turn 4"]);
    }

    #[test]
    fn history_over_both_caps_satisfies_both_and_starts_with_user() {
        let config = MemoryConfig {
            max_messages: 6,
            max_tokens: 60,
            compression_max_length: 4000,
        };
        let mut memory = ConversationMemory::new(config);
        let mut batch = Vec::new();
        for i in 0..6 {
            batch.push(Message::user(format!("question {i} {}", "x".repeat(40))));
            batch.push(Message::assistant(vec![ContentPart::text(format!(
                "answer {i} {}",
                "y".repeat(40)
            ))]));
        }
        memory.append(batch);

        assert!(memory.len() <= 6);
        assert!(memory.estimate_tokens() <= 60);
        assert_eq!(memory.messages()[0].role, Role::User);
    }

    #[test]
    fn latest_user_turn_survives_an_impossible_budget() {
        let mut memory = ConversationMemory::new(MemoryConfig {
            max_tokens: 1,
            ..MemoryConfig::default()
        });
        let (assistant, results) = call_pair(&["a"]);
        memory.append(vec![
            Message::user("an older question"),
            Message::assistant(vec![ContentPart::text("an older answer")]),
            Message::user("a question far longer than one token"),
            assistant,
            results,
        ]);

        assert_eq!(roles(&memory), vec![Role::User]);
        assert_eq!(memory.messages()[0].text(), "a question far longer than one token");
        assert!(memory.estimate_tokens() > 1);
    }

    #[test]
    fn tool_loop_keeps_task_and_evicts_oldest_pairs() {
        let mut memory = ConversationMemory::new(MemoryConfig {
            max_messages: 5,
            ..MemoryConfig::default()
        });
        memory.push(Message::user("the task"));

        let mut pairs = Vec::new();
        for step in 0..6 {
            let id = format!("call-{step}");
            let (assistant, results) = call_pair(&[id.as_str()]);
            pairs.push(assistant.id);
            memory.append([assistant, results]);

            assert!(memory.len() <= 5);
            assert_eq!(memory.messages()[0].text(), "the task");
        }

        assert_eq!(
            roles(&memory),
            vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant, Role::Tool]
        );
        let kept: Vec<Uuid> = memory
            .messages()
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.id)
            .collect();
        assert_eq!(kept, pairs[4..].to_vec());
    }

    #[test]
    fn synthesized_result_does_not_break_the_count_cap() {
        let mut memory = ConversationMemory::new(MemoryConfig {
            max_messages: 3,
            ..MemoryConfig::default()
        });
        let (first, first_results) = call_pair(&["a"]);
        let (second, _) = call_pair(&["b"]);
        memory.append(vec![Message::user("go"), first, first_results, second]);

        assert_eq!(memory.len(), 3);
        assert_eq!(roles(&memory), vec![Role::User, Role::Assistant, Role::Tool]);
        assert_eq!(memory.messages()[2].tool_result_ids(), vec!["b"]);
    }

    #[test]
    fn system_prompt_tokens_count_against_budget() {
        let mut memory = ConversationMemory::new(MemoryConfig {
            max_tokens: 20,
            ..MemoryConfig::default()
        });
        memory.set_system_prompt_tokens(15);
        memory.append(vec![
            Message::user("first question here"),
            Message::user("second question"),
        ]);
        assert_eq!(memory.len(), 1);
        assert_eq!(memory.messages()[0].text(), "second question");
    }

    #[test]
    fn repair_drops_leading_non_user_messages() {
        let mut memory = memory();
        memory.append(vec![
            Message::assistant(vec![ContentPart::text("stray")]),
            Message::user("hello"),
        ]);
        assert_eq!(roles(&memory), vec![Role::User]);

        memory.restore(vec![Message::assistant(vec![ContentPart::text("only")])]);
        assert!(memory.is_empty());
    }

    #[test]
    fn repair_collapses_duplicate_user_turns() {
        let mut memory = memory();
        let first = Message::user("same");
        let second = Message::user("same");
        memory.append(vec![first.clone(), second, Message::user("different")]);
        assert_eq!(memory.len(), 2);
        assert_eq!(memory.messages()[0].id, first.id);
    }

    #[test]
    fn repair_synthesizes_missing_tool_message() {
        let mut memory = memory();
        let (assistant, _) = call_pair(&["a", "b"]);
        let assistant_time = assistant.timestamp;
        memory.append(vec![Message::user("go"), assistant]);

        assert_eq!(roles(&memory), vec![Role::User, Role::Assistant, Role::Tool]);
        let placeholder = &memory.messages()[2];
        assert_eq!(placeholder.tool_result_ids(), vec!["a", "b"]);
        assert_eq!(
            placeholder.timestamp,
            assistant_time + Duration::milliseconds(1)
        );
        assert!(matches!(
            &placeholder.content[0],
            ContentPart::ToolResult { output: ToolOutput::ErrorText(text), .. } if text == MISSING_RESULT
        ));
    }

    #[test]
    fn repair_fills_partially_answered_calls() {
        let mut memory = memory();
        let (assistant, _) = call_pair(&["a", "b"]);
        let partial = Message::tool(vec![ContentPart::tool_result(
            "a",
            "lookup",
            ToolOutput::Text("done".to_string()),
        )]);
        memory.append(vec![Message::user("go"), assistant, partial]);

        assert_eq!(memory.len(), 3);
        assert_eq!(memory.messages()[2].tool_result_ids(), vec!["a", "b"]);
    }

    #[test]
    fn repair_drops_orphan_tool_messages() {
        let mut memory = memory();
        let (_, results) = call_pair(&["a"]);
        memory.append(vec![Message::user("go"), results, Message::user("next")]);
        assert_eq!(roles(&memory), vec![Role::User, Role::User]);
    }

    #[test]
    fn dropping_orphans_never_leaves_adjacent_duplicates() {
        let mut memory = memory();
        let (_, results) = call_pair(&["a"]);
        memory.append(vec![Message::user("same"), results, Message::user("same")]);
        assert_eq!(memory.len(), 1);

        let snapshot = memory.messages().to_vec();
        memory.repair();
        assert_eq!(memory.messages(), snapshot.as_slice());
    }

    #[test]
    fn well_formed_pair_is_unchanged_and_repair_is_idempotent() {
        let mut memory = memory();
        let (assistant, results) = call_pair(&["a", "b", "c"]);
        let expected = vec![
            Message::user("go"),
            assistant,
            results,
            Message::assistant(vec![ContentPart::text("done")]),
        ];
        memory.append(expected.clone());
        assert_eq!(memory.messages(), expected.as_slice());

        memory.repair();
        memory.repair();
        assert_eq!(memory.messages(), expected.as_slice());
    }

    #[test]
    fn remove_by_id_cascades_across_pair() {
        let mut memory = memory();
        let (assistant, results) = call_pair(&["a"]);
        let assistant_id = assistant.id;
        let results_id = results.id;
        memory.append(vec![Message::user("go"), assistant.clone(), results.clone()]);

        let mut from_call = memory.clone();
        assert_eq!(from_call.remove_by_id(assistant_id, true), 2);
        assert_eq!(roles(&from_call), vec![Role::User]);

        let mut from_result = memory.clone();
        assert_eq!(from_result.remove_by_id(results_id, true), 2);
        assert_eq!(roles(&from_result), vec![Role::User]);

        assert_eq!(memory.remove_by_id(Uuid::now_v7(), true), 0);
        assert_eq!(memory.len(), 3);
    }

    #[test]
    fn remove_by_id_without_cascade_repairs_the_pair() {
        let mut memory = memory();
        let (assistant, results) = call_pair(&["a"]);
        let results_id = results.id;
        memory.append(vec![Message::user("go"), assistant, results]);

        assert_eq!(memory.remove_by_id(results_id, false), 1);
        // The call gets a placeholder result again.
        assert_eq!(roles(&memory), vec![Role::User, Role::Assistant, Role::Tool]);
    }

    #[test]
    fn compress_truncates_assistant_text_and_tool_results() {
        let mut memory = ConversationMemory::new(MemoryConfig {
            compression_max_length: 5,
            ..MemoryConfig::default()
        });
        memory.append(vec![
            Message::user("a long user question stays intact"),
            Message::assistant(vec![
                ContentPart::text("a long assistant answer"),
                ContentPart::tool_call("c1", "lookup", json!({})),
            ]),
            Message::tool(vec![ContentPart::tool_result(
                "c1",
                "lookup",
                ToolOutput::Text("一二三四五六七".to_string()),
            )]),
        ]);
        let count_before = memory.len();

        assert_eq!(memory.compress(), 2);
        assert_eq!(memory.len(), count_before);
        assert_eq!(memory.compression_count(), 1);

        let messages = memory.messages();
        assert_eq!(messages[0].text(), "a long user question stays intact");
        assert_eq!(messages[1].text(), "a lon...");
        assert!(matches!(
            &messages[2].content[0],
            ContentPart::ToolResult { output: ToolOutput::Text(text), .. } if text == "一二三四五..."
        ));

        // Already short enough now: the pass is counted, nothing changes.
        assert_eq!(memory.compress(), 0);
        assert_eq!(memory.compression_count(), 2);
    }

    #[test]
    fn compress_flattens_long_json_results() {
        let mut output = ToolOutput::Json(json!({"payload": "abcdefghij"}));
        assert_eq!(truncate_output(&mut output, 4), 1);
        assert_eq!(output, ToolOutput::Text("{\"pa...".to_string()));
    }
}
