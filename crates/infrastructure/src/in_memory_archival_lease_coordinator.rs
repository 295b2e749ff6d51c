use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use freightdesk_application::{ArchivalLease, ArchivalLeaseCoordinator};
use freightdesk_core::AppResult;

use crate::redis_archival_lease_coordinator::validate_lease_request;

#[derive(Debug, Clone)]
struct LeaseEntry {
    token: String,
    expires_at: Instant,
}

/// Process-local lease coordinator for single-instance deployments.
#[derive(Debug, Default)]
pub struct InMemoryArchivalLeaseCoordinator {
    leases: Mutex<HashMap<String, LeaseEntry>>,
}

impl InMemoryArchivalLeaseCoordinator {
    /// Creates a coordinator with no held leases.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ArchivalLeaseCoordinator for InMemoryArchivalLeaseCoordinator {
    async fn try_acquire_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<ArchivalLease>> {
        validate_lease_request(scope_key, holder_id, lease_seconds)?;

        let now = Instant::now();
        let mut leases = self.leases.lock().await;
        if leases
            .get(scope_key)
            .is_some_and(|entry| entry.expires_at > now)
        {
            return Ok(None);
        }

        let token = format!("{holder_id}:{}", uuid::Uuid::new_v4());
        leases.insert(
            scope_key.to_owned(),
            LeaseEntry {
                token: token.clone(),
                expires_at: now + Duration::from_secs(u64::from(lease_seconds)),
            },
        );

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

        let now = Instant::now();
        let mut leases = self.leases.lock().await;
        let Some(entry) = leases
            .get_mut(&lease.scope_key)
            .filter(|entry| entry.token == lease.token && entry.expires_at > now)
        else {
            return Ok(false);
        };

        entry.expires_at = now + Duration::from_secs(u64::from(lease_seconds));
        Ok(true)
    }

    async fn release_lease(&self, lease: &ArchivalLease) -> AppResult<()> {
        let mut leases = self.leases.lock().await;
        if leases
            .get(&lease.scope_key)
            .is_some_and(|entry| entry.token == lease.token)
        {
            leases.remove(&lease.scope_key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_holder_waits_until_release() {
        let coordinator = InMemoryArchivalLeaseCoordinator::new();

        let first = coordinator
            .try_acquire_lease("audit-retention:security", "worker-a", 60)
            .await
            .unwrap_or_default();
        let Some(first) = first else {
            panic!("first holder should acquire the lease");
        };

        let second = coordinator
            .try_acquire_lease("audit-retention:security", "worker-b", 60)
            .await;
        assert!(matches!(second, Ok(None)));

        let other_scope = coordinator
            .try_acquire_lease("audit-retention:api", "worker-b", 60)
            .await;
        assert!(matches!(other_scope, Ok(Some(_))));

        assert!(coordinator.release_lease(&first).await.is_ok());
        let after_release = coordinator
            .try_acquire_lease("audit-retention:security", "worker-b", 60)
            .await;
        assert!(matches!(after_release, Ok(Some(_))));
    }

    #[tokio::test]
    async fn stale_token_does_not_release_new_holder() {
        let coordinator = InMemoryArchivalLeaseCoordinator::new();
        let stale = ArchivalLease {
            scope_key: "audit-retention:security".to_owned(),
            token: "worker-a:stale".to_owned(),
            holder_id: "worker-a".to_owned(),
        };

        let current = coordinator
            .try_acquire_lease("audit-retention:security", "worker-b", 60)
            .await;
        assert!(matches!(current, Ok(Some(_))));

        assert!(coordinator.release_lease(&stale).await.is_ok());
        let blocked = coordinator
            .try_acquire_lease("audit-retention:security", "worker-c", 60)
            .await;
        assert!(matches!(blocked, Ok(None)));
    }

    #[tokio::test]
    async fn renewal_requires_the_current_token() {
        let coordinator = InMemoryArchivalLeaseCoordinator::new();
        let acquired = coordinator
            .try_acquire_lease("audit-retention:security", "worker-a", 60)
            .await
            .unwrap_or_default();
        let Some(lease) = acquired else {
            panic!("holder should acquire the lease");
        };
        let stale = ArchivalLease {
            token: "worker-a:stale".to_owned(),
            ..lease.clone()
        };

        assert!(matches!(coordinator.renew_lease(&lease, 120).await, Ok(true)));
        assert!(matches!(coordinator.renew_lease(&stale, 120).await, Ok(false)));

        assert!(coordinator.release_lease(&lease).await.is_ok());
        assert!(matches!(coordinator.renew_lease(&lease, 120).await, Ok(false)));
    }

    #[tokio::test]
    async fn rejects_zero_lease_seconds() {
        let coordinator = InMemoryArchivalLeaseCoordinator::new();
        let result = coordinator
            .try_acquire_lease("audit-retention:security", "worker-a", 0)
            .await;
        assert!(result.is_err());
    }
}
