use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use freightdesk_application::RetentionPolicyStore;
use freightdesk_core::{AppError, AppResult};
use freightdesk_domain::{EventType, RetentionDays, RetentionPolicy};

/// Settings key holding the per-type retention map.
pub const RETENTION_POLICY_SETTING_KEY: &str = "retention_policy";

/// PostgreSQL-backed store for the `retention_policy` setting.
///
/// The stored JSON object maps event types to days. When the row is absent the
/// shipped defaults apply, and the first write persists them alongside the
/// changed window.
#[derive(Clone)]
pub struct PostgresRetentionPolicyStore {
    pool: PgPool,
    default_days: RetentionDays,
}

impl PostgresRetentionPolicyStore {
    /// Creates a store with the global fallback window.
    #[must_use]
    pub fn new(pool: PgPool, default_days: RetentionDays) -> Self {
        Self { pool, default_days }
    }
}

fn policy_from_value(
    default_days: RetentionDays,
    value: Option<Value>,
) -> AppResult<RetentionPolicy> {
    let Some(value) = value else {
        return Ok(RetentionPolicy::seeded(default_days));
    };

    let entries = serde_json::from_value::<BTreeMap<EventType, RetentionDays>>(value)
        .map_err(|error| {
            AppError::Internal(format!("stored retention policy is malformed: {error}"))
        })?;

    Ok(RetentionPolicy::from_entries(default_days, entries))
}

#[async_trait]
impl RetentionPolicyStore for PostgresRetentionPolicyStore {
    async fn load_policy(&self) -> AppResult<RetentionPolicy> {
        let value = sqlx::query_scalar::<_, Value>("SELECT value FROM settings WHERE key = $1")
            .bind(RETENTION_POLICY_SETTING_KEY)
            .fetch_optional(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to load retention policy: {error}"))
            })?;

        policy_from_value(self.default_days, value)
    }

    async fn set_retention_days(
        &self,
        event_type: &EventType,
        days: RetentionDays,
    ) -> AppResult<RetentionPolicy> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to start retention policy transaction: {error}"
            ))
        })?;

        let current = sqlx::query_scalar::<_, Value>(
            "SELECT value FROM settings WHERE key = $1 FOR UPDATE",
        )
        .bind(RETENTION_POLICY_SETTING_KEY)
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to lock retention policy: {error}"))
        })?;

        let mut policy = policy_from_value(self.default_days, current)?;
        policy.set(event_type.clone(), days);

        let value = serde_json::to_value(policy.entries()).map_err(|error| {
            AppError::Internal(format!("failed to serialize retention policy: {error}"))
        })?;

        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, updated_at = now()
            "#,
        )
        .bind(RETENTION_POLICY_SETTING_KEY)
        .bind(&value)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to store retention policy for event type '{event_type}': {error}"
            ))
        })?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit retention policy: {error}"))
        })?;

        Ok(policy)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use sqlx::postgres::PgPoolOptions;

    use super::*;

    async fn test_pool() -> Option<PgPool> {
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            return None;
        };

        let pool = match PgPoolOptions::new()
            .max_connections(1)
            .connect(database_url.as_str())
            .await
        {
            Ok(pool) => pool,
            Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
        };

        if let Err(error) = crate::MIGRATOR.run(&pool).await {
            panic!("failed to run migrations for retention policy tests: {error}");
        }

        Some(pool)
    }

    fn days(value: u16) -> RetentionDays {
        RetentionDays::new(value).unwrap_or_else(|error| panic!("{error}"))
    }

    #[test]
    fn stored_map_replaces_seeded_defaults() {
        let policy = policy_from_value(days(365), Some(json!({ "security": 400 })));
        let Ok(policy) = policy else {
            panic!("stored policy should parse");
        };
        assert_eq!(policy.entries().len(), 1);
        assert_eq!(
            policy.retention_days_for(&EventType::system()).days(),
            365
        );

        let seeded = policy_from_value(days(365), None).unwrap_or_default();
        assert!(seeded.is_configured(&EventType::system()));

        assert!(policy_from_value(days(365), Some(json!({ "security": 0 }))).is_err());
    }

    #[tokio::test]
    async fn update_persists_and_reloads() {
        let Some(pool) = test_pool().await else {
            return;
        };

        let store = PostgresRetentionPolicyStore::new(pool, days(365));
        let event_type = EventType::new("security").unwrap_or_else(|error| panic!("{error}"));

        let updated = store.set_retention_days(&event_type, days(400)).await;
        assert!(updated.is_ok());

        let reloaded = store.load_policy().await.unwrap_or_default();
        assert_eq!(reloaded.retention_days_for(&event_type).days(), 400);
    }
}
