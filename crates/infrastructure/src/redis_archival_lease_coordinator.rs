//! Redis-backed distributed lease coordinator for retention runs.

use async_trait::async_trait;
use redis::Script;

use freightdesk_application::{ArchivalLease, ArchivalLeaseCoordinator};
use freightdesk_core::{AppError, AppResult};

const RELEASE_LEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
else
  return 0
end
"#;

const RENEW_LEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('EXPIRE', KEYS[1], ARGV[2])
else
  return 0
end
"#;

/// Redis implementation of retention lease coordination.
#[derive(Clone)]
pub struct RedisArchivalLeaseCoordinator {
    client: redis::Client,
    key_prefix: String,
}

impl RedisArchivalLeaseCoordinator {
    /// Creates one coordinator adapter.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, scope_key: &str) -> String {
        format!("{}:{scope_key}", self.key_prefix)
    }
}

pub(crate) fn validate_lease_request(
    scope_key: &str,
    holder_id: &str,
    lease_seconds: u32,
) -> AppResult<()> {
    if scope_key.trim().is_empty() {
        return Err(AppError::Validation(
            "retention lease scope_key must not be empty".to_owned(),
        ));
    }

    if holder_id.trim().is_empty() {
        return Err(AppError::Validation(
            "retention lease holder_id must not be empty".to_owned(),
        ));
    }

    if lease_seconds == 0 {
        return Err(AppError::Validation(
            "retention lease_seconds must be greater than zero".to_owned(),
        ));
    }

    Ok(())
}

#[async_trait]
impl ArchivalLeaseCoordinator for RedisArchivalLeaseCoordinator {
    async fn try_acquire_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<ArchivalLease>> {
        validate_lease_request(scope_key, holder_id, lease_seconds)?;

        let key = self.key_for(scope_key);
        let token = format!("{holder_id}:{}", uuid::Uuid::new_v4());

        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        let reply = redis::cmd("SET")
            .arg(key.as_str())
            .arg(token.as_str())
            .arg("NX")
            .arg("EX")
            .arg(u64::from(lease_seconds))
            .query_async::<Option<String>>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to acquire retention lease: {error}"))
            })?;

        if reply.is_none() {
            return Ok(None);
        }

        tracing::debug!(scope_key, holder_id, lease_seconds, "acquired retention lease");

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

        let key = self.key_for(lease.scope_key.as_str());
        let script = Script::new(RENEW_LEASE_SCRIPT);

        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        let renewed = script
            .key(key)
            .arg(lease.token.as_str())
            .arg(i64::from(lease_seconds))
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to renew retention lease: {error}"))
            })?;

        Ok(renewed > 0)
    }

    async fn release_lease(&self, lease: &ArchivalLease) -> AppResult<()> {
        let key = self.key_for(lease.scope_key.as_str());
        let script = Script::new(RELEASE_LEASE_SCRIPT);

        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))?;

        let released = script
            .key(key)
            .arg(lease.token.as_str())
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to release retention lease: {error}"))
            })?;

        if released == 0 {
            tracing::warn!(
                scope_key = %lease.scope_key,
                holder_id = %lease.holder_id,
                "retention lease expired before release"
            );
        }

        Ok(())
    }
}
