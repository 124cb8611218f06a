//! Replay provider: serves recorded stream scripts instead of calling a model.
//!
//! A script is JSON lines, one model invocation per line:
//!
//! ```text
//! [{"type":"text_delta","id":"t","delta":"Hi"},{"type":"finish","finish_reason":"stop"}]
//! {"fail":"connection reset"}
//! ```
//!
//! An array is streamed event by event. An object with `fail` makes that
//! invocation fail with a transport error. Blank lines and `#` comments are
//! skipped. Each call to `stream` consumes the next line.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use async_stream::stream;
use serde::Deserialize;

use ravel_core::llm::{LlmProvider, LlmStream, error_stream};
use ravel_types::llm::{LlmError, LlmRequest, StreamEvent};

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("failed to read script {path}: {message}")]
    Io { path: String, message: String },

    #[error("script line {line}: {message}")]
    Parse { line: usize, message: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ScriptStep {
    Events(Vec<StreamEvent>),
    Failure { fail: String },
}

pub struct ReplayProvider {
    name: String,
    steps: Mutex<VecDeque<ScriptStep>>,
    total: usize,
}

impl ReplayProvider {
    /// Parse a script from JSON-lines text.
    pub fn from_jsonl(name: impl Into<String>, content: &str) -> Result<Self, ReplayError> {
        let mut steps = VecDeque::new();
        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let step: ScriptStep = serde_json::from_str(line).map_err(|e| ReplayError::Parse {
                line: idx + 1,
                message: e.to_string(),
            })?;
            steps.push_back(step);
        }

        let total = steps.len();
        Ok(Self {
            name: name.into(),
            steps: Mutex::new(steps),
            total,
        })
    }

    /// Read and parse a script file.
    pub async fn load(name: impl Into<String>, path: &Path) -> Result<Self, ReplayError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ReplayError::Io {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        Self::from_jsonl(name, &content)
    }

    /// Invocations left in the script.
    pub fn remaining(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<ScriptStep>> {
        self.steps.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LlmProvider for ReplayProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn stream(&self, request: LlmRequest) -> LlmStream {
        let next = self.lock().pop_front();
        let served = self.total - self.remaining();
        tracing::debug!(
            provider = %self.name,
            step = served,
            of = self.total,
            messages = request.messages.len(),
            "Replaying scripted invocation"
        );

        match next {
            Some(ScriptStep::Events(events)) => Box::pin(stream! {
                for event in events {
                    yield Ok::<_, LlmError>(event);
                }
            }),
            Some(ScriptStep::Failure { fail }) => error_stream(LlmError::Stream(fail)),
            None => error_stream(LlmError::InvalidRequest(format!(
                "replay script exhausted after {} invocations",
                self.total
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use ravel_types::llm::FinishReason;
    use tempfile::TempDir;

    const SCRIPT: &str = r#"
# first call answers with a tool call
[{"type":"tool_call","id":"c1","tool_name":"echo","input":{"text":"hi"}},{"type":"finish","finish_reason":"tool_calls"}]

{"fail":"connection reset"}
[{"type":"text_delta","id":"t","delta":"done"},{"type":"finish","finish_reason":"stop","usage":{"prompt_tokens":5}}]
"#;

    async fn collect(provider: &ReplayProvider) -> Vec<Result<StreamEvent, LlmError>> {
        provider.stream(LlmRequest::default()).collect().await
    }

    #[tokio::test]
    async fn serves_one_line_per_call() {
        let provider = ReplayProvider::from_jsonl("replay", SCRIPT).unwrap();
        assert_eq!(provider.remaining(), 3);

        let first = collect(&provider).await;
        assert_eq!(first.len(), 2);
        assert!(matches!(
            &first[0],
            Ok(StreamEvent::ToolCall { id, tool_name: Some(name), .. }) if id == "c1" && name == "echo"
        ));
        assert!(matches!(
            first[1],
            Ok(StreamEvent::Finish { finish_reason: FinishReason::ToolCalls, .. })
        ));

        let second = collect(&provider).await;
        assert!(matches!(&second[..], [Err(LlmError::Stream(m))] if m == "connection reset"));

        let third = collect(&provider).await;
        assert_eq!(third.len(), 2);
        assert_eq!(provider.remaining(), 0);
    }

    #[tokio::test]
    async fn exhausted_script_fails_without_retry() {
        let provider = ReplayProvider::from_jsonl("replay", "").unwrap();
        let events = collect(&provider).await;
        match &events[..] {
            [Err(err)] => {
                assert!(matches!(err, LlmError::InvalidRequest(_)));
                assert!(!err.is_retryable());
            }
            other => panic!("expected one error, got {other:?}"),
        }
    }

    #[test]
    fn bad_line_reports_its_number() {
        let err = ReplayProvider::from_jsonl("replay", "\n[]\n{oops}\n").err().unwrap();
        assert!(matches!(err, ReplayError::Parse { line: 3, .. }));
    }

    #[tokio::test]
    async fn loads_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("steps.jsonl");
        tokio::fs::write(&path, SCRIPT).await.unwrap();

        let provider = ReplayProvider::load("replay", &path).await.unwrap();
        assert_eq!(provider.name(), "replay");
        assert_eq!(provider.remaining(), 3);

        let missing = ReplayProvider::load("replay", &tmp.path().join("nope.jsonl")).await;
        assert!(matches!(missing, Err(ReplayError::Io { .. })));
    }
}
