//! PostgreSQL advisory-lock lease coordinator for deployments without Redis.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use tokio::sync::Mutex;

use freightdesk_application::{ArchivalLease, ArchivalLeaseCoordinator};
use freightdesk_core::{AppError, AppResult};

use crate::redis_archival_lease_coordinator::validate_lease_request;

struct HeldLock {
    scope_key: String,
    connection: PoolConnection<Postgres>,
}

/// Session-level advisory locks shared by every process on one database.
///
/// Each held lease pins one pooled connection; the lock lives exactly as long
/// as that session, so `lease_seconds` only bounds the Redis backend.
pub struct PostgresAdvisoryLeaseCoordinator {
    pool: PgPool,
    held: Mutex<HashMap<String, HeldLock>>,
}

impl PostgresAdvisoryLeaseCoordinator {
    /// Creates a coordinator drawing lock sessions from `pool`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            held: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ArchivalLeaseCoordinator for PostgresAdvisoryLeaseCoordinator {
    async fn try_acquire_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<ArchivalLease>> {
        validate_lease_request(scope_key, holder_id, lease_seconds)?;

        let mut connection = self.pool.acquire().await.map_err(|error| {
            AppError::Internal(format!("failed to acquire lease connection: {error}"))
        })?;

        let acquired = sqlx::query_scalar::<_, bool>(
            "SELECT pg_try_advisory_lock(hashtextextended($1, 0))",
        )
        .bind(scope_key)
        .fetch_one(&mut *connection)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to acquire retention lease: {error}"))
        })?;

        if !acquired {
            return Ok(None);
        }

        let token = format!("{holder_id}:{}", uuid::Uuid::new_v4());
        self.held.lock().await.insert(
            token.clone(),
            HeldLock {
                scope_key: scope_key.to_owned(),
                connection,
            },
        );

        tracing::debug!(scope_key, holder_id, "acquired advisory retention lease");

        Ok(Some(ArchivalLease {
            scope_key: scope_key.to_owned(),
            token,
            holder_id: holder_id.to_owned(),
        }))
    }

    async fn renew_lease(&self, lease: &ArchivalLease, lease_seconds: u32) -> AppResult<bool> {
        validate_lease_request(
            lease.scope_key.as_str(),
            lease.holder_id.as_str(),
            lease_seconds,
        )?;

        Ok(self
            .held
            .lock()
            .await
            .get(&lease.token)
            .is_some_and(|held| held.scope_key == lease.scope_key))
    }

    async fn release_lease(&self, lease: &ArchivalLease) -> AppResult<()> {
        let Some(mut held) = self.held.lock().await.remove(&lease.token) else {
            tracing::warn!(
                scope_key = %lease.scope_key,
                holder_id = %lease.holder_id,
                "advisory retention lease was not held at release"
            );
            return Ok(());
        };

        let unlocked = sqlx::query_scalar::<_, bool>(
            "SELECT pg_advisory_unlock(hashtextextended($1, 0))",
        )
        .bind(held.scope_key.as_str())
        .fetch_one(&mut *held.connection)
        .await;

        match unlocked {
            Ok(true) => Ok(()),
            Ok(false) => {
                held.connection.close_on_drop();
                Err(AppError::Internal(format!(
                    "advisory lock for '{}' was not held by its session",
                    lease.scope_key
                )))
            }
            Err(error) => {
                // Ending the session drops every advisory lock it holds.
                held.connection.close_on_drop();
                Err(AppError::Internal(format!(
                    "failed to release retention lease: {error}"
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use sqlx::postgres::PgPoolOptions;

    use super::*;

    async fn test_pool() -> Option<PgPool> {
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            return None;
        };

        match PgPoolOptions::new()
            .max_connections(4)
            .connect(database_url.as_str())
            .await
        {
            Ok(pool) => Some(pool),
            Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
        }
    }

    #[tokio::test]
    async fn separate_coordinators_exclude_each_other() {
        let Some(pool) = test_pool().await else {
            return;
        };
        let scope_key = format!("audit-retention:test_{}", uuid::Uuid::new_v4().simple());
        let first = PostgresAdvisoryLeaseCoordinator::new(pool.clone());
        let second = PostgresAdvisoryLeaseCoordinator::new(pool);

        let acquired = first
            .try_acquire_lease(scope_key.as_str(), "console-a", 60)
            .await
            .unwrap_or_else(|error| panic!("{error}"));
        let Some(lease) = acquired else {
            panic!("first coordinator should acquire the lease");
        };

        let blocked = second
            .try_acquire_lease(scope_key.as_str(), "worker-b", 60)
            .await;
        assert!(matches!(blocked, Ok(None)));
        assert!(matches!(first.renew_lease(&lease, 60).await, Ok(true)));
        assert!(matches!(second.renew_lease(&lease, 60).await, Ok(false)));

        assert!(first.release_lease(&lease).await.is_ok());
        let after_release = second
            .try_acquire_lease(scope_key.as_str(), "worker-b", 60)
            .await
            .unwrap_or_else(|error| panic!("{error}"));
        let Some(second_lease) = after_release else {
            panic!("lease should be free after release");
        };
        assert!(second.release_lease(&second_lease).await.is_ok());
    }
}
