use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use freightdesk_application::{AuditLogRepository, AuditRecordFilter};
use freightdesk_core::{AppError, AppResult};
use freightdesk_domain::{AuditLogRecord, EventType, NewAuditLogRecord};

#[cfg(test)]
mod tests;

const INSERT_BATCH_SIZE: usize = 500;

const FILTER_CLAUSE: &str = r#"
    ($1::TEXT IS NULL OR event_type = $1)
    AND ($2::TIMESTAMPTZ IS NULL OR created_at < $2)
    AND ($3::TIMESTAMPTZ IS NULL OR created_at >= $3)
"#;

/// PostgreSQL-backed repository for the live `audit_logs` table.
#[derive(Clone)]
pub struct PostgresAuditLogRepository {
    pool: PgPool,
}

impl PostgresAuditLogRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AuditLogRow {
    id: i64,
    event_type: String,
    action: String,
    actor_id: Option<i64>,
    created_at: DateTime<Utc>,
    additional_data: Option<Value>,
}

impl TryFrom<AuditLogRow> for AuditLogRecord {
    type Error = AppError;

    fn try_from(row: AuditLogRow) -> Result<Self, Self::Error> {
        let event_type = EventType::new(row.event_type).map_err(|error| {
            AppError::Internal(format!("audit log {} has an invalid event type: {error}", row.id))
        })?;

        Ok(Self {
            id: row.id,
            event_type,
            action: row.action,
            actor_id: row.actor_id,
            created_at: row.created_at,
            additional_data: row.additional_data,
        })
    }
}

#[derive(Debug, FromRow)]
struct EventTypeCountRow {
    event_type: String,
    record_count: i64,
}

fn to_count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

/// Rows written outside the application may carry names the domain rejects;
/// those types are left out of retention runs instead of failing them.
fn stored_event_type(name: String) -> Option<EventType> {
    match EventType::new(name.as_str()) {
        Ok(event_type) => Some(event_type),
        Err(error) => {
            tracing::warn!(
                event_type = %name,
                error = %error,
                "skipping invalid stored event type"
            );
            None
        }
    }
}

#[async_trait]
impl AuditLogRepository for PostgresAuditLogRepository {
    async fn append_record(&self, record: NewAuditLogRecord) -> AppResult<AuditLogRecord> {
        let row = sqlx::query_as::<_, AuditLogRow>(
            r#"
            INSERT INTO audit_logs (event_type, action, actor_id, additional_data)
            VALUES ($1, $2, $3, $4)
            RETURNING id, event_type, action, actor_id, created_at, additional_data
            "#,
        )
        .bind(record.event_type().as_str())
        .bind(record.action())
        .bind(record.actor_id())
        .bind(record.additional_data())
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to append audit log for event type '{}': {error}",
                record.event_type()
            ))
        })?;

        AuditLogRecord::try_from(row)
    }

    async fn list_event_types(&self) -> AppResult<Vec<EventType>> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT event_type
            FROM audit_logs
            ORDER BY event_type
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to list audit log event types: {error}"))
        })?;

        Ok(names.into_iter().filter_map(stored_event_type).collect())
    }

    async fn record_counts_by_event_type(&self) -> AppResult<BTreeMap<EventType, u64>> {
        let rows = sqlx::query_as::<_, EventTypeCountRow>(
            r#"
            SELECT event_type, COUNT(*) AS record_count
            FROM audit_logs
            GROUP BY event_type
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to count audit logs by event type: {error}"))
        })?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let count = to_count(row.record_count);
                stored_event_type(row.event_type).map(|event_type| (event_type, count))
            })
            .collect())
    }

    async fn count_records(&self, filter: &AuditRecordFilter) -> AppResult<u64> {
        let count = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM audit_logs WHERE {FILTER_CLAUSE}"
        ))
        .bind(filter.event_type.as_ref().map(EventType::as_str))
        .bind(filter.created_before)
        .bind(filter.created_at_or_after)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to count audit logs: {error}")))?;

        Ok(to_count(count))
    }

    async fn oldest_record_at(
        &self,
        filter: &AuditRecordFilter,
    ) -> AppResult<Option<DateTime<Utc>>> {
        sqlx::query_scalar::<_, Option<DateTime<Utc>>>(&format!(
            "SELECT MIN(created_at) FROM audit_logs WHERE {FILTER_CLAUSE}"
        ))
        .bind(filter.event_type.as_ref().map(EventType::as_str))
        .bind(filter.created_before)
        .bind(filter.created_at_or_after)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find oldest audit log: {error}"))
        })
    }

    async fn find_records(&self, filter: &AuditRecordFilter) -> AppResult<Vec<AuditLogRecord>> {
        let rows = sqlx::query_as::<_, AuditLogRow>(&format!(
            r#"
            SELECT id, event_type, action, actor_id, created_at, additional_data
            FROM audit_logs
            WHERE {FILTER_CLAUSE}
            ORDER BY created_at, id
            "#
        ))
        .bind(filter.event_type.as_ref().map(EventType::as_str))
        .bind(filter.created_before)
        .bind(filter.created_at_or_after)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to select audit logs: {error}")))?;

        rows.into_iter().map(AuditLogRecord::try_from).collect()
    }

    async fn delete_by_ids(&self, ids: &[i64]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query("DELETE FROM audit_logs WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to delete archived audit logs: {error}"))
            })?;

        Ok(result.rows_affected())
    }

    async fn delete_records(&self, filter: &AuditRecordFilter) -> AppResult<u64> {
        filter.require_cutoff()?;

        let result = sqlx::query(&format!("DELETE FROM audit_logs WHERE {FILTER_CLAUSE}"))
            .bind(filter.event_type.as_ref().map(EventType::as_str))
            .bind(filter.created_before)
            .bind(filter.created_at_or_after)
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to purge expired audit logs: {error}"))
            })?;

        Ok(result.rows_affected())
    }

    async fn insert_records(&self, records: &[AuditLogRecord]) -> AppResult<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to start audit log restore transaction: {error}"))
        })?;

        let mut inserted = 0_u64;
        for batch in records.chunks(INSERT_BATCH_SIZE) {
            let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(
                "INSERT INTO audit_logs (id, event_type, action, actor_id, created_at, additional_data) ",
            );
            builder.push_values(batch, |mut row, record| {
                row.push_bind(record.id)
                    .push_bind(record.event_type.as_str())
                    .push_bind(record.action.as_str())
                    .push_bind(record.actor_id)
                    .push_bind(record.created_at)
                    .push_bind(record.additional_data.as_ref());
            });

            let result = builder
                .build()
                .execute(&mut *transaction)
                .await
                .map_err(|error| {
                    let duplicate = error
                        .as_database_error()
                        .is_some_and(|database_error| database_error.is_unique_violation());
                    if duplicate {
                        AppError::Conflict(format!(
                            "restored audit logs collide with existing ids: {error}"
                        ))
                    } else {
                        AppError::Internal(format!("failed to restore audit logs: {error}"))
                    }
                })?;
            inserted = inserted.saturating_add(result.rows_affected());
        }

        // Explicit ids bypass the sequence.
        sqlx::query(
            r#"
            SELECT setval(
                pg_get_serial_sequence('audit_logs', 'id'),
                GREATEST((SELECT MAX(id) FROM audit_logs), 1)
            )
            "#,
        )
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to advance audit log id sequence: {error}"))
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit audit log restore: {error}"))
        })?;

        Ok(inserted)
    }
}
