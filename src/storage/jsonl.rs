//! JSON Lines file log.

use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{AuditSink, StorageError};

/// Append-only log storing one JSON record per line.
///
/// The file is opened in append mode and shared behind a mutex, so every
/// record lands as one complete line even when many tasks append at once.
/// A write that fails partway is cut back off the file before the next one.
pub struct JsonlLog<T> {
    path: PathBuf,
    file: Mutex<LogFile>,
    _record: PhantomData<fn() -> T>,
}

#[derive(Debug)]
struct LogFile {
    file: File,
    /// Length to truncate back to before the next write.
    torn_at: Option<u64>,
}

impl<T> std::fmt::Debug for JsonlLog<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonlLog").field("path", &self.path).finish()
    }
}

impl<T> JsonlLog<T> {
    /// Opens (or creates) the log at `path`, creating parent directories.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: Mutex::new(LogFile {
                file,
                torn_at: None,
            }),
            _record: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T: Serialize> JsonlLog<T> {
    /// Serializes `record` and appends it as a single line.
    pub async fn write(&self, record: &T) -> Result<(), StorageError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut log = self.file.lock().await;
        if let Some(len) = log.torn_at {
            log.file.set_len(len).await?;
            log.torn_at = None;
            tracing::debug!(path = %self.path.display(), len, "Removed partial record");
        }

        let start = log.file.metadata().await?.len();
        if let Err(e) = write_line(&mut log.file, line.as_bytes()).await {
            log.torn_at = match log.file.set_len(start).await {
                Ok(()) => None,
                Err(_) => Some(start),
            };
            return Err(e.into());
        }
        Ok(())
    }
}

async fn write_line(file: &mut File, line: &[u8]) -> std::io::Result<()> {
    file.write_all(line).await?;
    file.flush().await
}

impl<T: DeserializeOwned> JsonlLog<T> {
    /// Reads every record currently in the log. Blank lines are skipped.
    pub async fn read_all(&self) -> Result<Vec<T>, StorageError> {
        read_records(&self.path).await
    }
}

/// Reads all records from a JSON Lines file. A missing file is empty.
pub async fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StorageError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line).map_err(|e| StorageError::InvalidRecord {
                line: index + 1,
                message: e.to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl<T> AuditSink<T> for JsonlLog<T>
where
    T: Serialize + Send + Sync,
{
    async fn append(&self, record: &T) -> Result<(), StorageError> {
        self.write(record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::PersonaEdit;
    use serde::Deserialize;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        id: usize,
        text: String,
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let log = JsonlLog::<Sample>::open(temp_dir.path().join("log.jsonl"))
            .await
            .expect("open log");

        for id in 0..3 {
            log.append(&Sample {
                id,
                text: format!("line {id}\nwith newline"),
            })
            .await
            .expect("append");
        }

        let records = log.read_all().await.expect("read");
        assert_eq!(records.len(), 3);
        assert_eq!(records[2].id, 2);
        assert_eq!(records[0].text, "line 0\nwith newline");
    }

    #[tokio::test]
    async fn test_partial_line_is_removed_before_next_append() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("log.jsonl");
        let log = JsonlLog::<Sample>::open(&path).await.expect("open log");

        log.append(&Sample {
            id: 1,
            text: "first".to_string(),
        })
        .await
        .expect("append");

        // Leave the file as an interrupted write would.
        {
            let mut state = log.file.lock().await;
            let len = state.file.metadata().await.expect("metadata").len();
            state
                .file
                .write_all(b"{\"id\": 2, \"te")
                .await
                .expect("partial write");
            state.file.flush().await.expect("flush");
            state.torn_at = Some(len);
        }

        log.append(&Sample {
            id: 3,
            text: "third".to_string(),
        })
        .await
        .expect("append after torn write");

        let records = log.read_all().await.expect("every line parses");
        let ids: Vec<usize> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_creates_parent_directories() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("nested").join("deeper").join("log.jsonl");

        let log = JsonlLog::<Sample>::open(&path).await.expect("open log");
        assert!(path.exists());
        assert_eq!(log.path(), path.as_path());
    }

    #[tokio::test]
    async fn test_reopen_appends() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("log.jsonl");

        {
            let log = JsonlLog::<Sample>::open(&path).await.expect("open log");
            log.append(&Sample { id: 1, text: "a".into() })
                .await
                .expect("append");
        }
        let log = JsonlLog::<Sample>::open(&path).await.expect("reopen log");
        log.append(&Sample { id: 2, text: "b".into() })
            .await
            .expect("append");

        let ids: Vec<usize> = log.read_all().await.expect("read").iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let log = Arc::new(
            JsonlLog::<Sample>::open(temp_dir.path().join("log.jsonl"))
                .await
                .expect("open log"),
        );

        let handles: Vec<_> = (0..50)
            .map(|id| {
                let log = log.clone();
                tokio::spawn(async move {
                    log.append(&Sample {
                        id,
                        text: "x".repeat(2048),
                    })
                    .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.expect("join").expect("append");
        }

        let mut ids: Vec<usize> = log.read_all().await.expect("read").iter().map(|s| s.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_identical_edits_are_both_kept() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let log = JsonlLog::<PersonaEdit>::open(temp_dir.path().join("updated_personas.jsonl"))
            .await
            .expect("open log");

        let edit = PersonaEdit::new("agent-1", "Maya", "A nurse");
        log.append(&edit).await.expect("append");
        log.append(&edit).await.expect("append");

        let content = std::fs::read_to_string(log.path()).expect("read file");
        assert_eq!(content.lines().count(), 2);
        assert_eq!(log.read_all().await.expect("read").len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_line_reports_position() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("log.jsonl");
        std::fs::write(&path, "{\"id\":1,\"text\":\"a\"}\n\nnot json\n").expect("write");

        let err = read_records::<Sample>(&path).await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidRecord { line: 3, .. }));
    }

    #[tokio::test]
    async fn test_read_missing_file_is_empty() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let records = read_records::<Sample>(&temp_dir.path().join("absent.jsonl"))
            .await
            .expect("read");
        assert!(records.is_empty());
    }
}
