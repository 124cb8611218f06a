//! Coarse token estimation.
//!
//! Each CJK character counts as one token; every four other characters round
//! up to one token. Counting is per message so short parts do not each round
//! up on their own.

use ravel_types::message::{ContentPart, Message};

/// Whether `c` falls in a CJK script block (ideographs, kana, hangul, and
/// their punctuation / fullwidth forms).
pub fn is_cjk(c: char) -> bool {
    matches!(
        c as u32,
        0x3000..=0x303F
            | 0x3040..=0x309F
            | 0x30A0..=0x30FF
            | 0x3400..=0x4DBF
            | 0x4E00..=0x9FFF
            | 0xAC00..=0xD7AF
            | 0xF900..=0xFAFF
            | 0xFF00..=0xFFEF
            | 0x20000..=0x2A6DF
    )
}

#[derive(Debug, Default, Clone, Copy)]
struct CharCount {
    cjk: usize,
    other: usize,
}

impl CharCount {
    fn add(&mut self, text: &str) {
        for c in text.chars() {
            if is_cjk(c) {
                self.cjk += 1;
            } else {
                self.other += 1;
            }
        }
    }

    fn tokens(self) -> usize {
        self.cjk + self.other.div_ceil(4)
    }
}

/// Estimated tokens of a piece of text.
pub fn estimate_text(text: &str) -> usize {
    let mut count = CharCount::default();
    count.add(text);
    count.tokens()
}

/// Estimated tokens of one message. Binary file payloads are not counted.
pub fn estimate_message(message: &Message) -> usize {
    let mut count = CharCount::default();
    for part in &message.content {
        match part {
            ContentPart::Text { text } | ContentPart::Reasoning { text } => count.add(text),
            ContentPart::ToolCall { name, input, .. } => {
                count.add(name);
                count.add(&input.to_string());
            }
            ContentPart::ToolResult { name, output, .. } => {
                count.add(name);
                count.add(&output.to_text());
            }
            ContentPart::File { media_type, .. } => count.add(media_type),
        }
    }
    count.tokens()
}

pub fn estimate_messages(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message).sum()
}
