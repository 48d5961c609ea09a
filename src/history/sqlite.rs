/*!
 * SQLite-backed translation store.
 */

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{params, Row};
use std::path::{Path, PathBuf};

use super::connection::DatabaseConnection;
use super::{format_timestamp, parse_timestamp, TranslationRecord, TranslationStore};

/// Translation store on a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: DatabaseConnection,
}

impl SqliteStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Open the database file, creating it and its schema if needed
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new(path)?))
    }

    /// Store at the default location under the user's data directory
    pub fn open_default() -> Result<Self> {
        Self::open(DatabaseConnection::default_database_path()?)
    }

    /// In-memory store (for testing)
    pub fn new_in_memory() -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new_in_memory()?))
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<TranslationRecord> {
        let created_at: String = row.get(9)?;
        let created_at = parse_timestamp(&created_at).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, e.into())
        })?;

        Ok(TranslationRecord {
            job_id: row.get(0)?,
            caller_id: row.get(1)?,
            file_name: row.get(2)?,
            source_sha256: row.get(3)?,
            source_language: row.get(4)?,
            target_language: row.get(5)?,
            provider: row.get(6)?,
            output_path: PathBuf::from(row.get::<_, String>(7)?),
            fallback: row.get(8)?,
            created_at,
        })
    }
}

#[async_trait]
impl TranslationStore for SqliteStore {
    async fn record(&self, record: TranslationRecord) -> Result<()> {
        self.db
            .execute_async(move |conn| {
                conn.execute(
                    r#"
                    INSERT INTO translations (
                        job_id, caller_id, file_name, source_sha256, source_language,
                        target_language, provider, output_path, fallback, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    "#,
                    params![
                        record.job_id,
                        record.caller_id,
                        record.file_name,
                        record.source_sha256,
                        record.source_language,
                        record.target_language,
                        record.provider,
                        record.output_path.to_string_lossy(),
                        record.fallback,
                        format_timestamp(&record.created_at),
                    ],
                )?;
                debug!("Recorded translation {}", record.job_id);
                Ok(())
            })
            .await
    }

    async fn count_since(&self, caller_id: &str, since: DateTime<Utc>) -> Result<u64> {
        let caller_id = caller_id.to_string();
        let since = format_timestamp(&since);

        self.db
            .execute_async(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM translations WHERE caller_id = ?1 AND created_at >= ?2",
                    params![caller_id, since],
                    |row| row.get(0),
                )?;
                Ok(count.max(0) as u64)
            })
            .await
    }

    async fn list_for_caller(&self, caller_id: &str, limit: usize) -> Result<Vec<TranslationRecord>> {
        let caller_id = caller_id.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT job_id, caller_id, file_name, source_sha256, source_language,
                           target_language, provider, output_path, fallback, created_at
                    FROM translations WHERE caller_id = ?1
                    ORDER BY created_at DESC LIMIT ?2
                    "#,
                )?;

                let records = stmt
                    .query_map(params![caller_id, limit], Self::from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(records)
            })
            .await
    }
}
