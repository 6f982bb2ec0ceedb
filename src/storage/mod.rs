//! Append-only audit logs.
//!
//! Two JSON Lines streams are written while the service runs:
//!
//! - **Simulation log** (`simulation_log.jsonl`): one [`LogEntry`] per
//!   successful task.
//! - **Persona edit log** (`updated_personas.jsonl`): one [`PersonaEdit`] per
//!   edit request, never deduplicated.
//!
//! Writers depend on the [`AuditSink`] trait so tests can capture records in
//! memory with [`MemorySink`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use persona_forge::storage::{AuditSink, SimulationLog};
//!
//! let log = SimulationLog::open("logs/simulation_log.jsonl").await?;
//! log.append(&entry).await?;
//! let entries = log.read_all().await?;
//! ```

pub mod jsonl;
pub mod records;

pub use jsonl::JsonlLog;
pub use records::{LogEntry, PersonaEdit};

use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while writing or reading audit logs.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to read or write to the filesystem.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to serialize or deserialize a record.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A line of the log could not be parsed.
    #[error("Invalid record at line {line}: {message}")]
    InvalidRecord { line: usize, message: String },
}

/// Log of completed simulation tasks.
pub type SimulationLog = JsonlLog<LogEntry>;

/// Log of persona edits.
pub type PersonaEditLog = JsonlLog<PersonaEdit>;

/// Destination for audit records.
#[async_trait]
pub trait AuditSink<T>: Send + Sync
where
    T: Send + Sync,
{
    /// Appends one record. Each record is written whole or not at all.
    async fn append(&self, record: &T) -> Result<(), StorageError>;
}

/// In-memory sink that keeps every appended record.
#[derive(Debug)]
pub struct MemorySink<T> {
    records: Mutex<Vec<T>>,
}

impl<T> Default for MemorySink<T> {
    fn default() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Clone> MemorySink<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the records appended so far.
    pub fn records(&self) -> Vec<T> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl<T> AuditSink<T> for MemorySink<T>
where
    T: Clone + Send + Sync,
{
    async fn append(&self, record: &T) -> Result<(), StorageError> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        records.push(record.clone());
        Ok(())
    }
}
