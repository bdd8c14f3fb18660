use sqlx::FromRow;

use super::{EnergyStore, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
    Success,
    Error,
    ManualSuccess,
    ManualError,
}

impl CollectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionStatus::Success => "success",
            CollectionStatus::Error => "error",
            CollectionStatus::ManualSuccess => "manual_success",
            CollectionStatus::ManualError => "manual_error",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CollectionLogRow {
    pub id: i64,
    pub status: String,
    pub records_inserted: i64,
    pub records_updated: i64,
    pub error_message: Option<String>,
    pub execution_time_ms: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillStatus {
    InProgress,
    Completed,
    Failed,
}

impl BackfillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackfillStatus::InProgress => "in_progress",
            BackfillStatus::Completed => "completed",
            BackfillStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct BackfillProgressRow {
    pub id: i64,
    pub source: String,
    pub start_date: String,
    pub end_date: String,
    pub last_processed_date: Option<String>,
    pub records_processed: i64,
    pub status: String,
    pub error_message: Option<String>,
    pub started_at: String,
    pub finished_at: Option<String>,
}

impl EnergyStore {
    /// Every scheduled or manual run leaves exactly one log row, success or
    /// not.
    pub async fn log_collection(
        &self,
        status: CollectionStatus,
        records_inserted: u64,
        records_updated: u64,
        error_message: Option<&str>,
        execution_time_ms: u64,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO data_collection_logs
                 (status, records_inserted, records_updated, error_message, execution_time_ms)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(status.as_str())
        .bind(records_inserted as i64)
        .bind(records_updated as i64)
        .bind(error_message)
        .bind(execution_time_ms as i64)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn collection_logs(&self, limit: i64) -> Result<Vec<CollectionLogRow>, StoreError> {
        let rows = sqlx::query_as::<_, CollectionLogRow>(
            "SELECT id, status, records_inserted, records_updated,
                    error_message, execution_time_ms, created_at
             FROM data_collection_logs
             ORDER BY id DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    pub async fn create_backfill_progress(
        &self,
        source: &str,
        start_date: &str,
        end_date: &str,
    ) -> Result<i64, StoreError> {
        let row = sqlx::query_as::<_, (i64,)>(
            "INSERT INTO backfill_progress (source, start_date, end_date, status)
             VALUES (?, ?, ?, 'in_progress')
             RETURNING id",
        )
        .bind(source)
        .bind(start_date)
        .bind(end_date)
        .fetch_one(self.pool())
        .await?;
        Ok(row.0)
    }

    /// Advances a running backfill. `last_processed_date` and `error_message`
    /// only overwrite when provided; an error from chunk 3 survives chunks 4
    /// and 5 succeeding.
    pub async fn update_backfill_progress(
        &self,
        id: i64,
        last_processed_date: Option<&str>,
        records_processed: u64,
        error_message: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE backfill_progress SET
                 last_processed_date = COALESCE(?, last_processed_date),
                 records_processed = ?,
                 error_message = COALESCE(?, error_message)
             WHERE id = ?",
        )
        .bind(last_processed_date)
        .bind(records_processed as i64)
        .bind(error_message)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn complete_backfill_progress(
        &self,
        id: i64,
        status: BackfillStatus,
        error_message: Option<&str>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE backfill_progress SET
                 status = ?,
                 error_message = COALESCE(?, error_message),
                 finished_at = datetime('now')
             WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(error_message)
        .bind(id)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn backfill_progress(&self, id: i64) -> Result<BackfillProgressRow, StoreError> {
        let row = sqlx::query_as::<_, BackfillProgressRow>(
            "SELECT id, source, start_date, end_date, last_processed_date,
                    records_processed, status, error_message, started_at, finished_at
             FROM backfill_progress
             WHERE id = ?",
        )
        .bind(id)
        .fetch_one(self.pool())
        .await?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> EnergyStore {
        let store = EnergyStore::in_memory().await.unwrap();
        store.run_migrations().await.unwrap();
        store
    }

    #[tokio::test]
    async fn collection_log_keeps_newest_first() {
        let store = store().await;
        store
            .log_collection(CollectionStatus::Success, 24, 0, None, 1500)
            .await
            .unwrap();
        store
            .log_collection(CollectionStatus::Error, 0, 0, Some("upstream timeout"), 30000)
            .await
            .unwrap();

        let logs = store.collection_logs(10).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].status, "error");
        assert_eq!(logs[0].error_message.as_deref(), Some("upstream timeout"));
        assert_eq!(logs[1].records_inserted, 24);
    }

    #[tokio::test]
    async fn backfill_error_survives_later_updates() {
        let store = store().await;
        let id = store
            .create_backfill_progress("generation", "2024-01-01", "2024-06-30")
            .await
            .unwrap();

        store
            .update_backfill_progress(id, Some("2024-01-07"), 168, None)
            .await
            .unwrap();
        store
            .update_backfill_progress(id, None, 168, Some("chunk 2 failed: http 500"))
            .await
            .unwrap();
        store
            .update_backfill_progress(id, Some("2024-01-21"), 336, None)
            .await
            .unwrap();
        store
            .complete_backfill_progress(id, BackfillStatus::Completed, None)
            .await
            .unwrap();

        let row = store.backfill_progress(id).await.unwrap();
        assert_eq!(row.status, "completed");
        assert_eq!(row.records_processed, 336);
        assert_eq!(row.last_processed_date.as_deref(), Some("2024-01-21"));
        assert_eq!(row.error_message.as_deref(), Some("chunk 2 failed: http 500"));
        assert!(row.finished_at.is_some());
    }
}
