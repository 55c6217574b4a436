use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use signalpost_core::{ContentDraft, ContentType, CoreError, DraftRef, DraftStore, StoreError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

#[cfg(test)]
mod tests;

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "create_content_drafts",
        "CREATE TABLE IF NOT EXISTS content_drafts (
            id TEXT PRIMARY KEY,
            text TEXT NOT NULL,
            content_type TEXT NOT NULL,
            target_length INTEGER NOT NULL,
            source_keyword TEXT,
            relevance_score REAL,
            created_at TEXT NOT NULL,
            scheduled_for TEXT,
            used_at TEXT
        )",
    ),
    (
        "index_content_drafts_schedule",
        "CREATE INDEX IF NOT EXISTS idx_content_drafts_schedule
            ON content_drafts (used_at, scheduled_for)",
    ),
];

const DRAFT_COLUMNS: &str = "id, text, content_type, target_length, source_keyword, \
     relevance_score, created_at, scheduled_for, used_at";

/// A draft as persisted, with its scheduling state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredDraft {
    pub draft_ref: DraftRef,
    pub text: String,
    pub content_type: ContentType,
    pub target_length: usize,
    pub source_keyword: Option<String>,
    pub relevance_score: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub used_at: Option<DateTime<Utc>>,
}

impl StoredDraft {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let content_type: String = row.try_get("content_type")?;
        let target_length: i64 = row.try_get("target_length")?;
        Ok(Self {
            draft_ref: DraftRef(row.try_get("id")?),
            text: row.try_get("text")?,
            content_type: ContentType::from_intent(&content_type),
            target_length: target_length.max(0) as usize,
            source_keyword: row.try_get("source_keyword")?,
            relevance_score: row.try_get("relevance_score")?,
            created_at: row.try_get("created_at")?,
            scheduled_for: row.try_get("scheduled_for")?,
            used_at: row.try_get("used_at")?,
        })
    }
}

/// SQLite-backed draft store.
pub struct Database {
    connection_string: String,
    pool: Option<SqlitePool>,
}

impl Database {
    pub fn new(connection_string: String) -> Self {
        Self {
            connection_string,
            pool: None,
        }
    }

    pub async fn connect(&mut self) -> Result<(), CoreError> {
        let options = SqliteConnectOptions::from_str(&self.connection_string)
            .map_err(|e| StoreError::ConnectionFailed {
                reason: e.to_string(),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        info!("Connected to draft store");
        self.pool = Some(pool);
        Ok(())
    }

    fn pool(&self) -> Result<&SqlitePool, CoreError> {
        self.pool.as_ref().ok_or_else(|| {
            StoreError::ConnectionFailed {
                reason: "not connected".to_string(),
            }
            .into()
        })
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        let pool = self.pool()?;
        for (name, statement) in MIGRATIONS {
            sqlx::query(statement)
                .execute(pool)
                .await
                .map_err(|e| {
                    debug!("Migration {} failed: {}", name, e);
                    StoreError::MigrationFailed {
                        migration: name.to_string(),
                    }
                })?;
        }
        debug!("Applied {} migrations", MIGRATIONS.len());
        Ok(())
    }

    pub async fn get_draft(&self, draft: &DraftRef) -> Result<StoredDraft, CoreError> {
        let query = format!("SELECT {} FROM content_drafts WHERE id = ?", DRAFT_COLUMNS);
        let row = sqlx::query(&query)
            .bind(&draft.0)
            .fetch_optional(self.pool()?)
            .await
            .map_err(StoreError::from)?
            .ok_or_else(|| StoreError::DraftNotFound {
                draft_id: draft.0.clone(),
            })?;
        Ok(StoredDraft::from_row(&row).map_err(StoreError::from)?)
    }

    /// Drafts not yet posted: scheduled ones by time, then unscheduled by age.
    pub async fn unused_drafts(&self) -> Result<Vec<StoredDraft>, CoreError> {
        let query = format!(
            "SELECT {} FROM content_drafts WHERE used_at IS NULL \
             ORDER BY scheduled_for IS NULL, scheduled_for, created_at",
            DRAFT_COLUMNS
        );
        let rows = sqlx::query(&query)
            .fetch_all(self.pool()?)
            .await
            .map_err(StoreError::from)?;
        rows.iter()
            .map(|row| StoredDraft::from_row(row).map_err(|e| CoreError::from(StoreError::from(e))))
            .collect()
    }

    async fn update_draft(
        &self,
        draft: &DraftRef,
        statement: &str,
        value: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let result = sqlx::query(statement)
            .bind(value)
            .bind(&draft.0)
            .execute(self.pool()?)
            .await
            .map_err(StoreError::from)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::DraftNotFound {
                draft_id: draft.0.clone(),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl DraftStore for Database {
    async fn save_draft(&self, draft: &ContentDraft) -> Result<DraftRef, CoreError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO content_drafts \
             (id, text, content_type, target_length, source_keyword, relevance_score, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&draft.text)
        .bind(draft.content_type.as_str())
        .bind(draft.target_length as i64)
        .bind(draft.source_topic.as_ref().map(|topic| topic.keyword.clone()))
        .bind(draft.source_topic.as_ref().map(|topic| topic.relevance_score))
        .bind(Utc::now())
        .execute(self.pool()?)
        .await
        .map_err(StoreError::from)?;

        debug!("Saved draft {}", id);
        Ok(DraftRef(id))
    }

    async fn schedule_draft(
        &self,
        draft: &DraftRef,
        publish_at: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        self.update_draft(
            draft,
            "UPDATE content_drafts SET scheduled_for = ? WHERE id = ?",
            publish_at,
        )
        .await
    }

    async fn mark_draft_used(&self, draft: &DraftRef) -> Result<(), CoreError> {
        self.update_draft(
            draft,
            "UPDATE content_drafts SET used_at = ? WHERE id = ?",
            Utc::now(),
        )
        .await
    }
}
