/*!
 * Translation history.
 *
 * Completed jobs are recorded through a `TranslationStore`. The pipeline
 * treats the store as best effort: a failed write is logged and the job
 * still completes. Daily quotas count records per caller.
 */

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;

pub mod connection;
pub mod schema;
pub mod sqlite;

pub use connection::DatabaseConnection;
pub use sqlite::SqliteStore;

/// One completed translation job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationRecord {
    pub job_id: String,
    /// Opaque caller identity; `None` for anonymous submissions
    pub caller_id: Option<String>,
    pub file_name: String,
    /// Hex SHA-256 of the submitted bytes
    pub source_sha256: String,
    pub source_language: String,
    pub target_language: String,
    /// Translator name
    pub provider: String,
    pub output_path: PathBuf,
    pub fallback: bool,
    pub created_at: DateTime<Utc>,
}

/// Persistence for completed translations
#[async_trait]
pub trait TranslationStore: Send + Sync + Debug {
    /// Store one record
    async fn record(&self, record: TranslationRecord) -> Result<()>;

    /// Records of `caller_id` created at or after `since`
    async fn count_since(&self, caller_id: &str, since: DateTime<Utc>) -> Result<u64>;

    /// Newest records of `caller_id` first
    async fn list_for_caller(&self, caller_id: &str, limit: usize) -> Result<Vec<TranslationRecord>>;
}

/// Fixed-width UTC timestamp; lexical order equals time order
pub(crate) fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

/// Process-local store, used when no database is configured
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<Vec<TranslationRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl TranslationStore for MemoryStore {
    async fn record(&self, record: TranslationRecord) -> Result<()> {
        self.records.write().push(record);
        Ok(())
    }

    async fn count_since(&self, caller_id: &str, since: DateTime<Utc>) -> Result<u64> {
        Ok(self
            .records
            .read()
            .iter()
            .filter(|r| r.caller_id.as_deref() == Some(caller_id) && r.created_at >= since)
            .count() as u64)
    }

    async fn list_for_caller(&self, caller_id: &str, limit: usize) -> Result<Vec<TranslationRecord>> {
        let mut records: Vec<TranslationRecord> = self
            .records
            .read()
            .iter()
            .filter(|r| r.caller_id.as_deref() == Some(caller_id))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }
}
