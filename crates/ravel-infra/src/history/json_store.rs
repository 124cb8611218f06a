//! JSON-file implementation of [`HistoryStore`].
//!
//! Each history lives in `{dir}/{key}.json` as a pretty-printed JSON array of
//! messages. Writes go to a temporary sibling first and are renamed into place.

use std::path::{Path, PathBuf};

use ravel_core::repository::HistoryStore;
use ravel_types::error::RepositoryError;
use ravel_types::message::Message;

#[derive(Debug, Clone)]
pub struct JsonFileHistoryStore {
    dir: PathBuf,
}

impl JsonFileHistoryStore {
    /// Store histories under `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`. Characters outside `[A-Za-z0-9_-]` become `_`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{name}.json"))
    }
}

fn io_error(path: &Path, err: std::io::Error) -> RepositoryError {
    RepositoryError::Io(format!("{}: {err}", path.display()))
}

impl HistoryStore for JsonFileHistoryStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<Message>>, RepositoryError> {
        let path = self.path_for(key);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(io_error(&path, err)),
        };

        let messages: Vec<Message> = serde_json::from_str(&content)
            .map_err(|e| RepositoryError::Serialization(format!("{}: {e}", path.display())))?;
        tracing::debug!(key, count = messages.len(), "Loaded history");
        Ok(Some(messages))
    }

    async fn save(&self, key: &str, messages: &[Message]) -> Result<(), RepositoryError> {
        let path = self.path_for(key);
        let json = serde_json::to_string_pretty(messages)
            .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_error(&self.dir, e))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| io_error(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_error(&path, e))?;

        tracing::debug!(key, count = messages.len(), path = %path.display(), "Saved history");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, RepositoryError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(io_error(&path, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ravel_types::message::{ContentPart, ToolOutput};
    use serde_json::json;
    use tempfile::TempDir;

    fn conversation() -> Vec<Message> {
        vec![
            Message::user("weather in Oslo?"),
            Message::assistant(vec![ContentPart::tool_call(
                "c1",
                "weather",
                json!({"city": "Oslo"}),
            )]),
            Message::tool(vec![ContentPart::tool_result(
                "c1",
                "weather",
                ToolOutput::Json(json!({"temp_c": 4})),
            )]),
            Message::assistant(vec![ContentPart::text("4 degrees.")]),
        ]
    }

    #[tokio::test]
    async fn save_then_load() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileHistoryStore::new(tmp.path().join("histories"));

        store.save("run-1", &conversation()).await.unwrap();
        let loaded = store.load("run-1").await.unwrap().unwrap();

        assert_eq!(loaded, conversation_with_ids(&loaded));
        assert_eq!(loaded.len(), 4);
        assert_eq!(loaded[3].text(), "4 degrees.");
        assert_eq!(loaded[1].tool_call_ids(), vec!["c1"]);
    }

    // Ids and timestamps are fresh per construction; compare structure only.
    fn conversation_with_ids(loaded: &[Message]) -> Vec<Message> {
        conversation()
            .into_iter()
            .zip(loaded)
            .map(|(mut message, original)| {
                message.id = original.id;
                message.timestamp = original.timestamp;
                message
            })
            .collect()
    }

    #[tokio::test]
    async fn missing_key_loads_none() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileHistoryStore::new(tmp.path());
        assert!(store.load("nothing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_overwrites_and_delete_reports_existence() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileHistoryStore::new(tmp.path());

        store.save("k", &conversation()).await.unwrap();
        store.save("k", &[Message::user("again")]).await.unwrap();
        assert_eq!(store.load("k").await.unwrap().unwrap().len(), 1);
        assert!(!store.path_for("k").with_extension("json.tmp").exists());

        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert!(store.load("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_serialization_error() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileHistoryStore::new(tmp.path());
        tokio::fs::write(store.path_for("bad"), "[{not json")
            .await
            .unwrap();

        let err = store.load("bad").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Serialization(_)));
    }

    #[test]
    fn keys_cannot_escape_the_directory() {
        let store = JsonFileHistoryStore::new("/data");
        assert_eq!(
            store.path_for("../etc/passwd"),
            PathBuf::from("/data/___etc_passwd.json")
        );
    }
}
